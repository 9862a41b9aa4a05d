// std
use std::collections::VecDeque;
// self
use spotify_proxy::{
	_preludet::*,
	cache::TokenCache,
	catalog::CatalogClient,
	clock::{Clock, ManualClock},
	config::SpotifySettings,
	error::{ConfigError, Error, Result, TransportError, UpstreamError},
	http::{Endpoint, ProxyHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode},
	},
};

#[derive(Debug)]
enum FakeTransportError {
	Refused,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Refused => write!(f, "Connection refused."),
		}
	}
}
impl StdError for FakeTransportError {}

enum Scripted {
	Respond(u16, &'static str),
	// Answers after the given number of scheduler yields.
	Slow(u16, &'static str, usize),
	Refuse,
}

#[derive(Clone, Default)]
struct ScriptedHttpClient {
	script: Arc<Mutex<VecDeque<Scripted>>>,
	requests: Arc<Mutex<Vec<HttpRequest>>>,
}
impl ScriptedHttpClient {
	fn push(&self, step: Scripted) -> &Self {
		self.script.lock().push_back(step);

		self
	}

	fn calls(&self) -> usize {
		self.requests.lock().len()
	}
}
impl ProxyHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { client: self.clone(), slot }
	}
}

struct ScriptedHandle {
	client: ScriptedHttpClient,
	slot: ResponseMetadataSlot,
}
impl<'a> AsyncHttpClient<'a> for ScriptedHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		self.client.requests.lock().push(request);

		let step = self.client.script.lock().pop_front();
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			let (status, body, pauses) =
				match step.expect("Transport was called more often than scripted.") {
					Scripted::Respond(status, body) => (status, body, 1),
					Scripted::Slow(status, body, pauses) => (status, body, pauses),
					Scripted::Refuse => {
						tokio::task::yield_now().await;

						return Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Refused)));
					},
				};

			// Suspend so concurrent callers interleave like real network calls.
			for _ in 0..pauses {
				tokio::task::yield_now().await;
			}

			let status = StatusCode::from_u16(status).expect("Scripted status should be valid.");
			let mut response = HttpResponse::new(body.as_bytes().to_vec());

			*response.status_mut() = status;
			slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after: None });

			Ok(response)
		})
	}
}

struct FakeMapper;
impl TransportErrorMapper<FakeTransportError> for FakeMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		_metadata: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) =>
				TransportError::network(endpoint.as_str(), *inner).into(),
			other => TransportError::network(endpoint.as_str(), other).into(),
		}
	}
}

type FakeCache = TokenCache<ScriptedHttpClient, FakeMapper>;

fn configured() -> SpotifySettings {
	SpotifySettings::default()
		.with_client_id(TEST_CLIENT_ID)
		.with_client_secret(TEST_CLIENT_SECRET)
		.with_token_url("https://accounts.example.com/api/token")
}

fn build(settings: SpotifySettings) -> (FakeCache, ScriptedHttpClient, ManualClock) {
	let transport = ScriptedHttpClient::default();
	let clock = ManualClock::default();
	let shared: Arc<dyn Clock> = Arc::new(clock.clone());
	let cache = TokenCache::with_http_client(settings, transport.clone(), FakeMapper)
		.with_clock(shared);

	(cache, transport, clock)
}

#[tokio::test]
async fn token_is_reused_until_safety_margin() {
	let (cache, transport, clock) = build(configured());

	transport
		.push(Scripted::Respond(200, "{\"access_token\":\"abc\",\"expires_in\":3600}"))
		.push(Scripted::Respond(200, "{\"access_token\":\"def\",\"token_type\":\"Bearer\",\"expires_in\":3600}"));

	let first = cache.get_token().await.expect("Initial fetch should succeed.");

	assert_eq!(first.expose(), "abc");
	assert_eq!(transport.calls(), 1);

	clock.advance(Duration::seconds(10));

	let second = cache.get_token().await.expect("Cached token should be served.");

	assert_eq!(second, first);
	assert_eq!(transport.calls(), 1);

	clock.advance(Duration::seconds(3600 - 30 - 10 - 1));

	let still_cached = cache.get_token().await.expect("Token is valid one second before expiry.");

	assert_eq!(still_cached.expose(), "abc");
	assert_eq!(transport.calls(), 1);

	clock.advance(Duration::seconds(1));

	let refreshed = cache.get_token().await.expect("Expired token should be refreshed.");

	assert_eq!(refreshed.expose(), "def");
	assert_eq!(transport.calls(), 2);

	let entry = cache.cached().expect("Refreshed entry should be cached.");

	assert_eq!(entry.token_type.as_deref(), Some("Bearer"));
	assert_eq!(entry.issued_at, clock.now());
	assert_eq!(entry.expires_at, clock.now() + Duration::seconds(3570));
}

#[tokio::test]
async fn token_request_carries_basic_credentials() {
	let (cache, transport, _clock) = build(configured());

	transport.push(Scripted::Respond(200, "{\"access_token\":\"abc\",\"expires_in\":3600}"));
	cache.get_token().await.expect("Fetch should succeed.");

	let requests = transport.requests.lock();
	let request = requests.first().expect("One request should be recorded.");

	assert_eq!(request.method(), "POST");
	assert_eq!(request.uri(), "https://accounts.example.com/api/token");
	assert_eq!(
		request.headers().get("authorization").and_then(|value| value.to_str().ok()),
		Some("Basic dGVzdC1jbGllbnQ6dGVzdC1zZWNyZXQ=")
	);
	assert_eq!(request.body().as_slice(), b"grant_type=client_credentials");
}

#[tokio::test]
async fn unset_credentials_fail_without_network() {
	let (cache, transport, _clock) =
		build(SpotifySettings::default().with_client_id(TEST_CLIENT_ID));
	let err = cache.get_token().await.expect_err("Missing secret should be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::MissingClientSecret)));
	assert_eq!(transport.calls(), 0);

	let (cache, transport, _clock) = build(SpotifySettings::default());
	let err = cache.get_token().await.expect_err("Missing id should be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::MissingClientId)));
	assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn oversized_margin_fails_without_network() {
	let (cache, transport, _clock) = build(configured().with_safety_margin_seconds(u64::MAX));
	let err = cache.get_token().await.expect_err("An unbounded margin should be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::SafetyMarginTooLarge { .. })));
	assert_eq!(transport.calls(), 0);
	assert!(cache.cached().is_none());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_entry() {
	let (cache, transport, clock) = build(configured());

	transport
		.push(Scripted::Respond(200, "{\"access_token\":\"abc\",\"expires_in\":60}"))
		.push(Scripted::Respond(
			503,
			"{\"error\":\"temporarily_unavailable\",\"error_description\":\"Try later\"}",
		))
		.push(Scripted::Refuse)
		.push(Scripted::Respond(200, "{\"access_token\":\"xyz\",\"expires_in\":60}"));

	cache.get_token().await.expect("Initial fetch should succeed.");

	let before = cache.cached().expect("Entry should be cached.");

	clock.advance(Duration::seconds(31));

	let err = cache.get_token().await.expect_err("503 should surface as an upstream error.");

	match err {
		Error::Upstream(UpstreamError::TokenEndpoint { status, message, description, .. }) => {
			assert_eq!(status, 503);
			assert_eq!(message, "temporarily_unavailable");
			assert_eq!(description.as_deref(), Some("Try later"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
	assert_eq!(cache.cached(), Some(before.clone()));

	let err = cache.get_token().await.expect_err("Transport failures should surface.");

	assert!(matches!(
		err,
		Error::Upstream(UpstreamError::Transport(TransportError::Network { .. }))
	));
	assert!(StdError::source(&err).is_some());
	assert_eq!(cache.cached(), Some(before));

	let recovered = cache.get_token().await.expect("The next call should retry the fetch.");

	assert_eq!(recovered.expose(), "xyz");
	assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn malformed_bodies_are_upstream_errors() {
	let (cache, transport, _clock) = build(configured());

	transport
		.push(Scripted::Respond(200, "{\"access_token\":\"abc\"}"))
		.push(Scripted::Respond(200, "{\"access_token\":\"\",\"expires_in\":3600}"))
		.push(Scripted::Respond(200, "{\"access_token\":\"abc\",\"expires_in\":-1}"));

	let err = cache.get_token().await.expect_err("Missing expires_in should fail.");

	match err {
		Error::Upstream(UpstreamError::ResponseParse { source, status, .. }) => {
			assert_eq!(status, Some(200));
			assert!(source.to_string().contains("expires_in"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let err = cache.get_token().await.expect_err("Empty tokens should fail.");

	assert!(matches!(err, Error::Upstream(UpstreamError::EmptyAccessToken)));

	let err = cache.get_token().await.expect_err("Negative lifetimes should fail.");

	assert!(matches!(err, Error::Upstream(UpstreamError::InvalidExpiresIn { value: -1 })));
	assert!(cache.cached().is_none());
}

#[tokio::test]
async fn concurrent_callers_may_refresh_twice() {
	let (cache, transport, _clock) = build(configured());

	transport
		.push(Scripted::Respond(200, "{\"access_token\":\"one\",\"expires_in\":600}"))
		.push(Scripted::Respond(200, "{\"access_token\":\"two\",\"expires_in\":600}"));

	let (first, second) = tokio::join!(cache.get_token(), cache.get_token());

	first.expect("First racing call should succeed.");
	second.expect("Second racing call should succeed.");

	assert_eq!(transport.calls(), 2);

	let winner = cache.cached().expect("One of the racing responses should be cached.");

	assert!(matches!(winner.access_token.expose(), "one" | "two"));
}

#[tokio::test]
async fn coalesced_refreshes_request_once() {
	let (cache, transport, _clock) = build(configured());
	let cache = cache.coalesce_refreshes();

	transport.push(Scripted::Respond(200, "{\"access_token\":\"shared\",\"expires_in\":600}"));

	let (first, second) = tokio::join!(cache.get_token(), cache.get_token());

	assert_eq!(first.expect("First call should succeed.").expose(), "shared");
	assert_eq!(second.expect("Second call should succeed.").expose(), "shared");
	assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn stale_unauthorized_response_keeps_newer_token() {
	let (cache, transport, clock) = build(configured());
	let catalog = CatalogClient::new(cache.clone());

	transport
		.push(Scripted::Respond(200, "{\"access_token\":\"first\",\"expires_in\":100}"))
		.push(Scripted::Slow(401, "{\"error\":{\"status\":401}}", 5))
		.push(Scripted::Respond(200, "{\"access_token\":\"second\",\"expires_in\":3600}"));

	let (lookup, refreshed) = tokio::join!(catalog.track("abc123"), async {
		// Start once the first token is cached and its catalog request is in flight.
		while cache.cached().is_none() {
			tokio::task::yield_now().await;
		}

		clock.advance(Duration::seconds(200));

		cache.get_token().await
	});

	assert_eq!(lookup.expect("Track lookup should complete.").status, 401);
	assert_eq!(refreshed.expect("Refresh should succeed.").expose(), "second");
	assert_eq!(transport.calls(), 3);

	let entry = cache.cached().expect("The newer token should survive the stale 401.");

	assert_eq!(entry.access_token.expose(), "second");
}
