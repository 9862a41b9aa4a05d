//! Client-credentials token cache.
//!
//! [`TokenCache::get_token`] serves the cached bearer token while the injected clock is
//! strictly before its expiry and otherwise exchanges the configured client credentials for a
//! fresh one. The entry is an `Option<CachedToken>` behind one lock, so the token and its
//! expiry are always replaced together and the lock is never held across an `.await`.
//!
//! Concurrent callers that find an expired entry may each refresh; the last successful
//! response wins. [`TokenCache::coalesce_refreshes`] switches to a single-flight mode where
//! racing callers wait for the first refresh and reuse its result.

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	config::SpotifySettings,
	http::ProxyHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
	token::{AccessToken, CachedToken},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

const KIND: CallKind = CallKind::Token;

#[cfg(feature = "reqwest")]
/// Token cache specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenCache = TokenCache<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Shared, in-process cache for one client-credentials access token.
///
/// Clones share the same entry, transport, and clock.
pub struct TokenCache<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Credentials, endpoints, and safety margin.
	pub settings: Arc<SpotifySettings>,
	/// Time source for expiry decisions.
	pub clock: Arc<dyn Clock>,
	entry: Arc<RwLock<Option<CachedToken>>>,
	refresh_guard: Option<Arc<AsyncMutex<()>>>,
}
impl<C, M> TokenCache<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an empty cache that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		settings: SpotifySettings,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			settings: Arc::new(settings),
			clock: Arc::new(SystemClock),
			entry: Default::default(),
			refresh_guard: None,
		}
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Serializes refreshes so concurrent callers share one outbound token request.
	pub fn coalesce_refreshes(mut self) -> Self {
		self.refresh_guard = Some(Default::default());

		self
	}

	/// Returns a valid bearer token, fetching a new one when the cached entry has expired.
	///
	/// # Errors
	///
	/// - [`Error::Config`] when the client id or secret is unset or blank (checked before any
	///   network access) or the token URL is invalid.
	/// - [`Error::Upstream`] when the token endpoint is unreachable, answers with a non-success
	///   status, or returns an unusable body. The previous entry is left untouched.
	pub async fn get_token(&self) -> Result<AccessToken> {
		if let Some(token) = self.cached_token() {
			obs::record_call_outcome(KIND, CallOutcome::CacheHit);

			return Ok(token);
		}

		let (result, outcome) =
			CallSpan::new(KIND, "get_token").instrument(self.wait_or_refresh()).await;

		obs::record_call_outcome(KIND, outcome);

		result
	}

	/// Returns a snapshot of the current entry, expired or not.
	pub fn cached(&self) -> Option<CachedToken> {
		self.entry.read().clone()
	}

	/// Drops the current entry so the next [`get_token`](Self::get_token) fetches a new token.
	pub fn invalidate(&self) {
		*self.entry.write() = None;
	}

	/// Drops the current entry only if it still holds `rejected`.
	///
	/// A token that was replaced since the rejected request went out stays cached. Returns
	/// whether an entry was removed.
	pub fn invalidate_if(&self, rejected: &AccessToken) -> bool {
		let mut entry = self.entry.write();

		if entry.as_ref().is_some_and(|cached| &cached.access_token == rejected) {
			*entry = None;

			true
		} else {
			false
		}
	}

	fn cached_token(&self) -> Option<AccessToken> {
		let now = self.clock.now();

		self.entry
			.read()
			.as_ref()
			.filter(|entry| entry.is_valid_at(now))
			.map(|entry| entry.access_token.clone())
	}

	// Returns the outcome to record alongside the result: a caller that waited on the
	// single-flight guard and found a fresh entry is a cache hit, not a refresh.
	async fn wait_or_refresh(&self) -> (Result<AccessToken>, CallOutcome) {
		let singleflight = match &self.refresh_guard {
			Some(guard) => Some(guard.lock().await),
			None => None,
		};

		if singleflight.is_some()
			&& let Some(token) = self.cached_token()
		{
			return (Ok(token), CallOutcome::CacheHit);
		}

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = self.refresh().await;
		let outcome = if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure };

		(result, outcome)
	}

	async fn refresh(&self) -> Result<AccessToken> {
		let credentials = self.settings.credentials()?;
		let token_url = self.settings.token_endpoint()?;
		let margin = self.settings.safety_margin()?;
		let response = oauth::exchange_client_credentials(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			&token_url,
			&credentials,
		)
		.await?;
		let entry = CachedToken::from_response(response, self.clock.now(), margin)?;
		let token = entry.access_token.clone();

		*self.entry.write() = Some(entry);

		Ok(token)
	}
}
#[cfg(feature = "reqwest")]
impl TokenCache<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an empty cache with its own reqwest-backed transport and the system clock.
	pub fn new(settings: SpotifySettings) -> Self {
		Self::with_http_client(
			settings,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for TokenCache<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			settings: self.settings.clone(),
			clock: self.clock.clone(),
			entry: self.entry.clone(),
			refresh_guard: self.refresh_guard.clone(),
		}
	}
}
impl<C, M> Debug for TokenCache<C, M>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("settings", &self.settings)
			.field("entry", &*self.entry.read())
			.field("coalesce_refreshes", &self.refresh_guard.is_some())
			.finish()
	}
}
