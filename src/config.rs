//! Spotify settings as supplied by the hosting application.
//!
//! Settings mirror the host's `Spotify` configuration section (`ClientId`, `ClientSecret`,
//! ...). Credentials stay optional here and are only checked by [`SpotifySettings::credentials`],
//! which the token cache calls before every refresh so a missing secret surfaces as a
//! [`ConfigError`] on the request that needs it.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{ClientId, ClientSecret};
// self
use crate::{_prelude::*, error::ConfigError};

/// Spotify Accounts client-credentials endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
/// Spotify Web API base, including the version segment.
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1/";
/// Seconds shaved off every token lifetime so a token never expires mid-request.
pub const DEFAULT_SAFETY_MARGIN_SECONDS: u64 = 30;
/// Largest accepted safety margin (one day).
pub const MAX_SAFETY_MARGIN_SECONDS: u64 = 86_400;
/// Name of the settings section read by [`SpotifySettings::from_app_settings_json`].
pub const SETTINGS_SECTION: &str = "Spotify";

const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
const ENV_TOKEN_URL: &str = "SPOTIFY_TOKEN_URL";
const ENV_API_BASE_URL: &str = "SPOTIFY_API_BASE_URL";
const ENV_SAFETY_MARGIN: &str = "SPOTIFY_SAFETY_MARGIN_SECONDS";

/// Spotify client settings.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SpotifySettings {
	/// OAuth 2.0 client identifier.
	pub client_id: Option<String>,
	/// OAuth 2.0 client secret.
	pub client_secret: Option<String>,
	/// Client-credentials token endpoint.
	pub token_url: String,
	/// Catalog API base URL.
	pub api_base_url: String,
	/// Seconds subtracted from each reported token lifetime.
	pub safety_margin_seconds: u64,
}
impl SpotifySettings {
	/// Parses a bare settings section (`{"ClientId": ..., "ClientSecret": ...}`).
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);

		let settings: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Settings { source })?;

		settings.safety_margin()?;

		Ok(settings)
	}

	/// Parses a whole application settings document and extracts its `Spotify` section.
	pub fn from_app_settings_json(raw: &str) -> Result<Self, ConfigError> {
		#[derive(Deserialize)]
		struct AppSettings {
			#[serde(rename = "Spotify")]
			spotify: Option<SpotifySettings>,
		}

		let mut de = serde_json::Deserializer::from_str(raw);
		let document: AppSettings = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Settings { source })?;

		let settings =
			document.spotify.ok_or(ConfigError::MissingSection { section: SETTINGS_SECTION })?;

		settings.safety_margin()?;

		Ok(settings)
	}

	/// Reads settings from `SPOTIFY_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads settings through an arbitrary variable lookup; unset keys keep their defaults.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut settings = Self {
			client_id: lookup(ENV_CLIENT_ID),
			client_secret: lookup(ENV_CLIENT_SECRET),
			..Self::default()
		};

		if let Some(url) = lookup(ENV_TOKEN_URL) {
			settings.token_url = url;
		}
		if let Some(url) = lookup(ENV_API_BASE_URL) {
			settings.api_base_url = url;
		}
		if let Some(raw) = lookup(ENV_SAFETY_MARGIN) {
			settings.safety_margin_seconds = raw
				.trim()
				.parse()
				.map_err(|_| ConfigError::InvalidVariable { key: ENV_SAFETY_MARGIN, value: raw })?;
		}

		settings.safety_margin()?;

		Ok(settings)
	}

	/// Sets the client identifier.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Overrides the token endpoint.
	pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
		self.token_url = url.into();

		self
	}

	/// Overrides the catalog API base URL.
	pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
		self.api_base_url = url.into();

		self
	}

	/// Overrides the safety margin.
	pub fn with_safety_margin_seconds(mut self, seconds: u64) -> Self {
		self.safety_margin_seconds = seconds;

		self
	}

	/// Returns validated credentials, rejecting unset or blank values.
	pub fn credentials(&self) -> Result<ClientCredentials, ConfigError> {
		let client_id = non_blank(self.client_id.as_deref()).ok_or(ConfigError::MissingClientId)?;
		let client_secret =
			non_blank(self.client_secret.as_deref()).ok_or(ConfigError::MissingClientSecret)?;

		Ok(ClientCredentials {
			client_id: ClientId::new(client_id.to_owned()),
			client_secret: ClientSecret::new(client_secret.to_owned()),
		})
	}

	/// Parses the token endpoint.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		parse_endpoint("token", &self.token_url)
	}

	/// Parses the catalog API base, ensuring it ends with `/` so relative joins append.
	pub fn api_base(&self) -> Result<Url, ConfigError> {
		let mut url = parse_endpoint("catalog", &self.api_base_url)?;

		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		Ok(url)
	}

	/// Safety margin as a [`Duration`], rejecting values above [`MAX_SAFETY_MARGIN_SECONDS`].
	pub fn safety_margin(&self) -> Result<Duration, ConfigError> {
		let seconds = self.safety_margin_seconds;

		if seconds > MAX_SAFETY_MARGIN_SECONDS {
			return Err(ConfigError::SafetyMarginTooLarge {
				seconds,
				max: MAX_SAFETY_MARGIN_SECONDS,
			});
		}

		// Bounded above, so the conversion cannot truncate.
		Ok(Duration::seconds(seconds as i64))
	}
}
impl Default for SpotifySettings {
	fn default() -> Self {
		Self {
			client_id: None,
			client_secret: None,
			token_url: DEFAULT_TOKEN_URL.into(),
			api_base_url: DEFAULT_API_BASE_URL.into(),
			safety_margin_seconds: DEFAULT_SAFETY_MARGIN_SECONDS,
		}
	}
}
impl Debug for SpotifySettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SpotifySettings")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("token_url", &self.token_url)
			.field("api_base_url", &self.api_base_url)
			.field("safety_margin_seconds", &self.safety_margin_seconds)
			.finish()
	}
}

/// Validated client identifier and secret.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
	/// OAuth 2.0 client identifier.
	pub client_id: ClientId,
	/// OAuth 2.0 client secret.
	pub client_secret: ClientSecret,
}
impl ClientCredentials {
	/// `Authorization` header value for HTTP Basic client authentication.
	pub fn basic_authorization(&self) -> String {
		let pair = format!("{}:{}", self.client_id.as_str(), self.client_secret.secret());

		format!("Basic {}", STANDARD.encode(pair))
	}
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.filter(|v| !v.trim().is_empty())
}

fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint { endpoint, source })?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		_ => Err(ConfigError::UnsupportedScheme { endpoint, url: url.to_string() }),
	}
}
