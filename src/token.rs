//! Access-token values: the redacted secret, the token endpoint's wire response, and the cached
//! entry derived from it.

// self
use crate::{_prelude::*, error::UpstreamError};

/// Redacted bearer token wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Formats the `Authorization` header value for outbound API calls.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// Returns `true` if the token carries no characters.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Successful client-credentials response body.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
	/// Issued bearer token.
	pub access_token: AccessToken,
	/// Token type reported by the provider (Spotify sends `Bearer`).
	#[serde(default)]
	pub token_type: Option<String>,
	/// Lifetime in seconds.
	pub expires_in: i64,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &self.access_token)
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Token held by the cache together with the instant it stops being served.
///
/// The pair is always replaced as one value, so readers never see a token with another
/// token's expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
	/// Bearer token; callers must avoid logging it.
	pub access_token: AccessToken,
	/// Token type reported by the provider.
	pub token_type: Option<String>,
	/// Instant the response was received.
	pub issued_at: OffsetDateTime,
	/// `issued_at + expires_in - safety_margin`.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Derives a cache entry from a token response received at `now`.
	pub fn from_response(
		response: TokenResponse,
		now: OffsetDateTime,
		safety_margin: Duration,
	) -> Result<Self, UpstreamError> {
		if response.access_token.is_empty() {
			return Err(UpstreamError::EmptyAccessToken);
		}

		let value = response.expires_in;

		if value <= 0 {
			return Err(UpstreamError::InvalidExpiresIn { value });
		}

		let expires_at = now
			.checked_add(Duration::seconds(value))
			.and_then(|instant| instant.checked_sub(safety_margin))
			.ok_or(UpstreamError::InvalidExpiresIn { value })?;

		Ok(Self {
			access_token: response.access_token,
			token_type: response.token_type,
			issued_at: now,
			expires_at,
		})
	}

	/// Returns `true` while the token may still be served at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		!self.access_token.is_empty() && instant < self.expires_at
	}

	/// Time left before the entry expires; zero once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
