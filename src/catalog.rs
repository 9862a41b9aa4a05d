//! Catalog proxy: search and track lookups against the Spotify Web API using the cached
//! client-credentials token.
//!
//! Responses are passed through as-is (status, content type, body), so a caller acting as an
//! HTTP proxy can forward them to its own client unchanged. A `401` additionally drops the
//! cached token so the next call refreshes it.

// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::{
		Method, Request, StatusCode,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	cache::TokenCache,
	error::{ConfigError, UpstreamError},
	http::{Endpoint, ProxyHttpClient},
	oauth::{self, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// Largest page size accepted by the search endpoint.
pub const MAX_SEARCH_LIMIT: u8 = 50;
/// Page size used when none is requested.
pub const DEFAULT_SEARCH_LIMIT: u8 = 10;

/// Item types accepted by the search endpoint's `type` parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
	/// Albums.
	Album,
	/// Artists.
	Artist,
	/// Playlists.
	Playlist,
	#[default]
	/// Tracks.
	Track,
	/// Podcast shows.
	Show,
	/// Podcast episodes.
	Episode,
	/// Audiobooks.
	Audiobook,
}
impl SearchKind {
	/// Returns the query-parameter spelling.
	pub const fn as_str(self) -> &'static str {
		match self {
			SearchKind::Album => "album",
			SearchKind::Artist => "artist",
			SearchKind::Playlist => "playlist",
			SearchKind::Track => "track",
			SearchKind::Show => "show",
			SearchKind::Episode => "episode",
			SearchKind::Audiobook => "audiobook",
		}
	}
}
impl Display for SearchKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Parameters for [`CatalogClient::search`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
	/// Free-text query; must not be blank.
	pub query: String,
	/// Item types to search; defaults to tracks when empty.
	pub kinds: Vec<SearchKind>,
	/// Page size, `1..=50`.
	pub limit: u8,
	/// Index of the first result.
	pub offset: Option<u32>,
	/// ISO 3166-1 alpha-2 market code.
	pub market: Option<String>,
}
impl SearchRequest {
	/// Creates a track search for `query` with the default page size.
	pub fn new(query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			kinds: vec![SearchKind::Track],
			limit: DEFAULT_SEARCH_LIMIT,
			offset: None,
			market: None,
		}
	}

	/// Replaces the searched item types.
	pub fn with_kinds<I>(mut self, kinds: I) -> Self
	where
		I: IntoIterator<Item = SearchKind>,
	{
		self.kinds = kinds.into_iter().collect();

		self
	}

	/// Overrides the page size.
	pub fn with_limit(mut self, limit: u8) -> Self {
		self.limit = limit;

		self
	}

	/// Sets the result offset.
	pub fn with_offset(mut self, offset: u32) -> Self {
		self.offset = Some(offset);

		self
	}

	/// Restricts results to a market.
	pub fn with_market(mut self, market: impl Into<String>) -> Self {
		self.market = Some(market.into());

		self
	}

	fn validate(&self) -> Result<()> {
		if self.query.trim().is_empty() {
			return Err(invalid("Search query is required"));
		}
		if !(1..=MAX_SEARCH_LIMIT).contains(&self.limit) {
			return Err(invalid(format!(
				"Search limit must be between 1 and {MAX_SEARCH_LIMIT}, got {}",
				self.limit
			)));
		}

		Ok(())
	}

	fn kinds_param(&self) -> String {
		if self.kinds.is_empty() {
			return SearchKind::default().as_str().into();
		}

		let mut seen = Vec::with_capacity(self.kinds.len());

		for kind in &self.kinds {
			if !seen.contains(&kind.as_str()) {
				seen.push(kind.as_str());
			}
		}

		seen.join(",")
	}

	fn apply(&self, url: &mut Url) {
		let mut pairs = url.query_pairs_mut();

		pairs
			.append_pair("q", &self.query)
			.append_pair("type", &self.kinds_param())
			.append_pair("limit", &self.limit.to_string());

		if let Some(offset) = self.offset {
			pairs.append_pair("offset", &offset.to_string());
		}
		if let Some(market) = &self.market {
			pairs.append_pair("market", market);
		}
	}
}

/// Upstream catalog response passed through to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogResponse {
	/// HTTP status returned by the catalog API.
	pub status: u16,
	/// `Content-Type` header, when present.
	pub content_type: Option<String>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl CatalogResponse {
	fn from_http(response: HttpResponse) -> Self {
		let status = response.status().as_u16();
		let content_type = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);

		Self { status, content_type, body: response.into_body() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}

	/// Deserializes the body as JSON.
	pub fn json<T>(&self) -> Result<T, UpstreamError>
	where
		T: DeserializeOwned,
	{
		oauth::parse_json(Endpoint::Catalog, Some(self.status), &self.body)
	}
}

/// Catalog API client sharing a [`TokenCache`] with its host.
pub struct CatalogClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Token source; its transport and settings are reused for catalog calls.
	pub tokens: TokenCache<C, M>,
}
impl<C, M> CatalogClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Wraps a token cache; clones of the cache keep sharing the same token.
	pub fn new(tokens: TokenCache<C, M>) -> Self {
		Self { tokens }
	}

	/// Runs `GET {api_base}search` for `request`.
	///
	/// A blank query or out-of-range limit is rejected with [`Error::InvalidRequest`] before a
	/// token is fetched.
	pub async fn search(&self, request: &SearchRequest) -> Result<CatalogResponse> {
		const KIND: CallKind = CallKind::CatalogSearch;

		request.validate()?;

		let span = CallSpan::new(KIND, "search");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut url = self.endpoint("search")?;

				request.apply(&mut url);

				self.get(url).await
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Runs `GET {api_base}tracks/{id}`.
	///
	/// The id must be a non-empty ASCII alphanumeric Spotify id.
	pub async fn track(&self, id: &str) -> Result<CatalogResponse> {
		const KIND: CallKind = CallKind::CatalogTrack;

		if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
			return Err(invalid(format!("Track id `{id}` is not a valid Spotify id")));
		}

		let span = CallSpan::new(KIND, "track");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.endpoint(&format!("tracks/{id}"))?;

				self.get(url).await
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	fn endpoint(&self, path: &str) -> Result<Url> {
		let base = self.tokens.settings.api_base()?;

		base.join(path)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "catalog", source }.into())
	}

	async fn get(&self, url: Url) -> Result<CatalogResponse> {
		let token = self.tokens.get_token().await?;
		let request: HttpRequest = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(AUTHORIZATION, token.bearer())
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let (response, _meta) = oauth::dispatch(
			self.tokens.http_client.as_ref(),
			self.tokens.transport_mapper.as_ref(),
			Endpoint::Catalog,
			request,
		)
		.await?;

		if response.status() == StatusCode::UNAUTHORIZED {
			self.tokens.invalidate_if(&token);
		}

		Ok(CatalogResponse::from_http(response))
	}
}
impl<C, M> Clone for CatalogClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { tokens: self.tokens.clone() }
	}
}
impl<C, M> Debug for CatalogClient<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CatalogClient").field("tokens", &self.tokens).finish()
	}
}

fn invalid(reason: impl Into<String>) -> Error {
	Error::InvalidRequest { reason: reason.into() }
}
