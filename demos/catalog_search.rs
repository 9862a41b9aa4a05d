//! Demonstrates a catalog search proxied through the shared token cache. Settings come from
//! `SPOTIFY_*` variables when `SPOTIFY_CLIENT_ID` is set; otherwise a mock Spotify is started.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use spotify_proxy::{
	cache::TokenCache,
	catalog::{CatalogClient, SearchRequest},
	config::SpotifySettings,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let query = std::env::args().nth(1).unwrap_or_else(|| "daft punk".into());
	let server = MockServer::start_async().await;
	let settings = SpotifySettings::from_env()?;
	let settings = if settings.client_id.is_some() {
		settings
	} else {
		server
			.mock_async(|when, then| {
				when.method(POST).path("/api/token");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"access_token\":\"demo\",\"token_type\":\"Bearer\",\"expires_in\":3600}");
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/v1/search").header("authorization", "Bearer demo");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"tracks\":{\"items\":[{\"name\":\"One More Time\"}]}}");
			})
			.await;

		settings
			.with_client_id("demo-client")
			.with_client_secret("demo-secret")
			.with_token_url(server.url("/api/token"))
			.with_api_base_url(server.url("/v1/"))
	};
	let catalog = CatalogClient::new(TokenCache::new(settings));
	let response = catalog.search(&SearchRequest::new(query).with_limit(3)).await?;

	println!("HTTP {}: {}", response.status, response.text());

	Ok(())
}
