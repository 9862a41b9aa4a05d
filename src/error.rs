//! Proxy-level error types shared by the token cache, transports, and catalog calls.

// self
use crate::_prelude::*;

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical proxy error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fatal to the calling request.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint or catalog API failure; surfaced without retry.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// Catalog request rejected before any token or network work.
	#[error("Catalog request is invalid: {reason}.")]
	InvalidRequest {
		/// Human-readable validation failure.
		reason: String,
	},
}
impl From<TransportError> for Error {
	fn from(e: TransportError) -> Self {
		Self::Upstream(e.into())
	}
}

/// Configuration and validation failures raised before talking to Spotify.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client identifier is unset or blank.
	#[error("Spotify client id is not configured.")]
	MissingClientId,
	/// Client secret is unset or blank.
	#[error("Spotify client secret is not configured.")]
	MissingClientSecret,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Configured endpoint cannot be parsed.
	#[error("The {endpoint} URL is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configured endpoint uses a scheme other than HTTP(S).
	#[error("The {endpoint} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Settings document could not be deserialized.
	#[error("Spotify settings are malformed.")]
	Settings {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Settings document lacks the `Spotify` section.
	#[error("Settings document has no `{section}` section.")]
	MissingSection {
		/// Expected section name.
		section: &'static str,
	},
	/// Configured safety margin exceeds the accepted bound.
	#[error("Safety margin of {seconds}s exceeds the {max}s limit.")]
	SafetyMarginTooLarge {
		/// Configured margin.
		seconds: u64,
		/// Largest accepted margin.
		max: u64,
	},
	/// Environment variable holds a value of the wrong shape.
	#[error("Environment variable `{key}` is invalid: {value}.")]
	InvalidVariable {
		/// Variable name.
		key: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures reported by, or while reaching, the token endpoint and catalog API.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint returned HTTP {status}: {message}.")]
	TokenEndpoint {
		/// HTTP status code.
		status: u16,
		/// Provider `error` field or a body preview.
		message: String,
		/// Provider `error_description` field, when supplied.
		description: Option<String>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream responded with JSON that could not be parsed.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token response carried an empty `access_token`.
	#[error("Token endpoint returned an empty access token.")]
	EmptyAccessToken,
	/// Token response carried a non-positive or unrepresentable `expires_in`.
	#[error("Token endpoint returned an unusable expires_in value: {value}.")]
	InvalidExpiresIn {
		/// Raw `expires_in` seconds.
		value: i64,
	},
	/// Request exceeded the transport's timeout.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Network or IO failure.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl UpstreamError {
	/// HTTP status attached to the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::TokenEndpoint { status, .. } => Some(*status),
			Self::ResponseParse { status, .. } | Self::Timeout { status, .. } => *status,
			_ => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
