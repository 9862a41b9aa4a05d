//! Spotify client-credentials token cache and catalog proxy: one cached bearer token per
//! process, refreshed on expiry, shared by every outbound catalog call.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Re-exports and helpers for integration tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		cache::{ReqwestTokenCache, TokenCache},
		clock::{Clock, ManualClock},
		config::SpotifySettings,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
	};

	/// Client identifier used by test settings.
	pub const TEST_CLIENT_ID: &str = "test-client";
	/// Client secret used by test settings.
	pub const TEST_CLIENT_SECRET: &str = "test-secret";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Settings pointing at a mock server's `/api/token` and `/v1/` routes.
	pub fn test_settings(server_url: impl Fn(&str) -> String) -> SpotifySettings {
		SpotifySettings::default()
			.with_client_id(TEST_CLIENT_ID)
			.with_client_secret(TEST_CLIENT_SECRET)
			.with_token_url(server_url("/api/token"))
			.with_api_base_url(server_url("/v1/"))
	}

	/// Constructs a [`TokenCache`] backed by the insecure reqwest transport and a
	/// [`ManualClock`] the test can advance.
	pub fn build_reqwest_test_cache(settings: SpotifySettings) -> (ReqwestTokenCache, ManualClock) {
		let clock = ManualClock::default();
		let shared: Arc<dyn Clock> = Arc::new(clock.clone());
		let cache = TokenCache::with_http_client(
			settings,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_clock(shared);

		(cache, clock)
	}
}

mod _prelude {
	pub use std::{
		borrow::Cow,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
