//! Client-credentials exchange against the token endpoint, plus the request dispatch and
//! transport error mapping shared with catalog calls.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	config::ClientCredentials,
	error::{ConfigError, TransportError, UpstreamError},
	http::{Endpoint, ProxyHttpClient, ResponseMetadata, ResponseMetadataSlot},
	token::TokenResponse,
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Maps HTTP transport failures into proxy [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a proxy error.
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::network(endpoint.as_str(), std::io::Error::other(message)).into(),
			_ => TransportError::network(
				endpoint.as_str(),
				std::io::Error::other("unrecognized HTTP client failure"),
			)
			.into(),
		}
	}
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

/// Performs the client-credentials grant and returns the parsed token response.
pub(crate) async fn exchange_client_credentials<C, M>(
	http_client: &C,
	mapper: &M,
	token_url: &Url,
	credentials: &ClientCredentials,
) -> Result<TokenResponse>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let request = client_credentials_request(token_url, credentials)?;
	let (response, meta) = dispatch(http_client, mapper, Endpoint::Token, request).await?;
	let status = response.status();

	if !status.is_success() {
		return Err(token_endpoint_error(&response, meta.as_ref()).into());
	}

	Ok(parse_json(Endpoint::Token, Some(status.as_u16()), response.body())?)
}

/// Sends `request` through a metadata-instrumented handle.
pub(crate) async fn dispatch<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: Endpoint,
	request: HttpRequest,
) -> Result<(HttpResponse, Option<ResponseMetadata>)>
where
	C: ?Sized + ProxyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());

	match handle.call(request).await {
		Ok(response) => Ok((response, slot.take())),
		Err(err) => Err(mapper.map_transport_error(endpoint, slot.take().as_ref(), err)),
	}
}

/// Deserializes a JSON body, keeping the path of the failing field.
pub(crate) fn parse_json<T>(
	endpoint: Endpoint,
	status: Option<u16>,
	body: &[u8],
) -> Result<T, UpstreamError>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| UpstreamError::ResponseParse {
		endpoint: endpoint.as_str(),
		source,
		status,
	})
}

fn client_credentials_request(
	token_url: &Url,
	credentials: &ClientCredentials,
) -> Result<HttpRequest, ConfigError> {
	let body = FormSerializer::new(String::new())
		.append_pair("grant_type", "client_credentials")
		.finish();

	Ok(Request::builder()
		.method(Method::POST)
		.uri(token_url.as_str())
		.header(AUTHORIZATION, credentials.basic_authorization())
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(ACCEPT, "application/json")
		.body(body.into_bytes())?)
}

fn token_endpoint_error(response: &HttpResponse, meta: Option<&ResponseMetadata>) -> UpstreamError {
	let status = response.status().as_u16();
	let retry_after = meta.and_then(|value| value.retry_after);

	match serde_json::from_slice::<OAuthErrorBody>(response.body()) {
		Ok(body) => UpstreamError::TokenEndpoint {
			status,
			message: body.error,
			description: body.error_description,
			retry_after,
		},
		Err(_) => UpstreamError::TokenEndpoint {
			status,
			message: body_preview(response.body()),
			description: None,
			retry_after,
		},
	}
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return "empty response body".into();
	}

	trimmed.chars().take(BODY_PREVIEW_LIMIT).collect()
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return UpstreamError::Timeout {
			endpoint: endpoint.as_str(),
			status: meta
				.and_then(|value| value.status)
				.or_else(|| err.status().map(|code| code.as_u16())),
		}
		.into();
	}

	TransportError::network(endpoint.as_str(), err).into()
}
