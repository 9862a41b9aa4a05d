//! Outbound HTTP for the token endpoint and the catalog API.
//!
//! Everything goes through [`ProxyHttpClient`], so tests can swap in scripted transports. A
//! handle reports the last status and `Retry-After` hint through a [`ResponseMetadataSlot`],
//! which error mapping reads when a call fails.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Upstream endpoints the proxy talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// Client-credentials token endpoint.
	Token,
	/// Catalog (Web API) endpoint.
	Catalog,
}
impl Endpoint {
	/// Returns a stable label for error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Endpoint::Token => "token",
			Endpoint::Catalog => "catalog",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Transport shared by a [`TokenCache`](crate::cache::TokenCache) and its clones.
///
/// Each outbound request gets its own handle from [`with_metadata`](Self::with_metadata).
pub trait ProxyHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-request handle.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle for one request. The handle clears `slot` before sending and stores
	/// the response status once headers arrive.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Status and retry hint of the last response seen by a handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status, absent when the request never got a response.
	pub status: Option<u16>,
	/// `Retry-After`, relative to when the response arrived.
	pub retry_after: Option<Duration>,
}

/// Shared cell a handle writes [`ResponseMetadata`] into.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the stored metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Removes and returns the stored metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Default transport: a shared [`ReqwestClient`].
///
/// Spotify's token endpoint never redirects, so a custom client passed to
/// [`with_client`](Self::with_client) can keep reqwest's redirect policy or disable it.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps a preconfigured client (timeouts, proxies, TLS roots).
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl ProxyHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.0.clone(), slot }
	}
}

/// Per-request reqwest handle that fills its [`ResponseMetadataSlot`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl ReqwestHandle {
	async fn send(
		self,
		request: HttpRequest,
	) -> Result<HttpResponse, HttpClientError<ReqwestError>> {
		self.slot.take();

		let request = request.try_into().map_err(Box::new)?;
		let upstream = self.client.execute(request).await.map_err(Box::new)?;
		let status = upstream.status();
		let headers = upstream.headers().clone();

		self.slot.store(ResponseMetadata {
			status: Some(status.as_u16()),
			retry_after: retry_after(&headers, OffsetDateTime::now_utc()),
		});

		let body = upstream.bytes().await.map_err(Box::new)?;
		let mut response = HttpResponse::new(body.to_vec());

		*response.status_mut() = status;
		*response.headers_mut() = headers;

		Ok(response)
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(self.clone().send(request))
	}
}

// `Retry-After` is either delta-seconds or an HTTP date; past dates carry no hint.
#[cfg(feature = "reqwest")]
fn retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(seconds) = raw.parse::<i64>() {
		return (seconds >= 0).then(|| Duration::seconds(seconds));
	}

	let delta = OffsetDateTime::parse(raw, &Rfc2822).ok()? - now;

	delta.is_positive().then_some(delta)
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let now = datetime!(2025-01-01 00:00 UTC);
		let mut headers = HeaderMap::new();

		assert_eq!(retry_after(&headers, now), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("17"));

		assert_eq!(retry_after(&headers, now), Some(Duration::seconds(17)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 01 Jan 2025 00:01:30 +0000"));

		assert_eq!(retry_after(&headers, now), Some(Duration::seconds(90)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Mon, 01 Jan 2001 00:00:00 +0000"));

		assert_eq!(retry_after(&headers, now), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("-3"));

		assert_eq!(retry_after(&headers, now), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("later"));

		assert_eq!(retry_after(&headers, now), None);
	}

	#[test]
	fn metadata_slot_take_clears_value() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(429), retry_after: None });

		assert_eq!(slot.clone().take().and_then(|meta| meta.status), Some(429));
		assert_eq!(slot.take(), None);
	}

	#[test]
	fn endpoint_labels_are_stable() {
		assert_eq!(Endpoint::Token.to_string(), "token");
		assert_eq!(Endpoint::Catalog.as_str(), "catalog");
	}
}
