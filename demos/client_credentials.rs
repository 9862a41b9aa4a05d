//! Demonstrates the token cache with the default reqwest transport against a mock token
//! endpoint: the first call exchanges credentials, the second is served from the cache.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use spotify_proxy::{
	cache::TokenCache,
	config::SpotifySettings,
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token").body("grant_type=client_credentials");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let settings = SpotifySettings::default()
		.with_client_id("demo-client")
		.with_client_secret("super-secret")
		.with_token_url(server.url("/api/token"));
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let cache = <TokenCache<ReqwestHttpClient, ReqwestTransportErrorMapper>>::with_http_client(
		settings,
		http_client,
		Arc::new(ReqwestTransportErrorMapper),
	);
	let first = cache.get_token().await?;
	let second = cache.get_token().await?;

	println!("Reusable access token: {}.", first.expose());
	println!("Served from cache: {}.", first == second);

	if let Some(entry) = cache.cached() {
		println!("Cached until {}.", entry.expires_at);
	}

	token_mock.assert_async().await;

	Ok(())
}
