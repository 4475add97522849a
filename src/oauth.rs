//! Request dispatch shared by every endpoint plus transport error classification.
//!
//! All outbound calls funnel through [`dispatch`]: it binds a fresh [`ResponseMetadataSlot`] to the
//! transport handle, and routes transport failures through the configured
//! [`TransportErrorMapper`]. [`ensure_success`] and [`parse_json`] then turn the raw response into
//! either the expected payload or an [`HttpStatusError`]/[`PayloadError`].

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, HttpStatusError, PayloadError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient, parse_retry_after},
	obs,
	provider::Endpoint,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Maps HTTP transport failures into client [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted while calling `endpoint` into a client error.
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
			HttpClientError::Reqwest(inner) => {
				let inner = *inner;

				if inner.is_builder() {
					return ConfigError::from(inner).into();
				}
				if inner.is_timeout() {
					let status = meta
						.and_then(|value| value.status)
						.or_else(|| inner.status().map(|code| code.as_u16()));

					return TransportError::Timeout { endpoint, status }.into();
				}

				TransportError::network(endpoint, inner).into()
			},
			other => map_common_transport_error(endpoint, other),
		}
	}
}

/// Classifies the transport-agnostic [`HttpClientError`] variants.
///
/// Custom mappers can delegate here after handling their transport-specific variant.
pub fn map_common_transport_error<E>(endpoint: Endpoint, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::Network { endpoint, source: inner }.into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
		_ => TransportError::Other { endpoint, message: "unclassified transport failure".into() }
			.into(),
	}
}

/// Sends `request` through a metadata-bound handle and maps transport failures.
pub(crate) async fn dispatch<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: Endpoint,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());

	handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(endpoint, slot.take().as_ref(), err))
}

/// Passes 2xx responses through; anything else becomes an [`HttpStatusError`].
pub(crate) fn ensure_success(endpoint: Endpoint, response: HttpResponse) -> Result<HttpResponse> {
	let status = response.status();

	obs::record_http_response(endpoint, status.as_u16());

	if status.is_success() {
		return Ok(response);
	}

	let body = String::from_utf8_lossy(response.body());
	let err = HttpStatusError::new(
		endpoint,
		status.as_u16(),
		status.canonical_reason().unwrap_or_default(),
		&body,
	)
	.with_retry_after(parse_retry_after(response.headers()));

	Err(err.into())
}

/// Deserializes a JSON body, reporting the failing field path on error.
pub(crate) fn parse_json<T>(endpoint: Endpoint, response: &HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut de).map_err(|source| {
		PayloadError::Malformed { endpoint, source, status: Some(response.status().as_u16()) }
			.into()
	})
}

/// Builds an `application/x-www-form-urlencoded` POST.
pub(crate) fn form_request(url: &Url, fields: &[(&str, &str)]) -> Result<HttpRequest> {
	let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish();

	oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE)
		.body(body.into_bytes())
		.map_err(|e| ConfigError::from(e).into())
}

/// Builds a JSON request with an optional bearer token and caller headers.
///
/// `Content-Type: application/json` is always set first so `headers` may override it.
pub(crate) fn json_request(
	method: Method,
	url: &Url,
	bearer: Option<&str>,
	headers: &[(String, String)],
	body: Vec<u8>,
) -> Result<HttpRequest> {
	let mut request = oauth2::http::Request::builder()
		.method(method)
		.uri(url.as_str())
		.body(body)
		.map_err(ConfigError::from)?;
	let map = request.headers_mut();

	map.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
	map.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));

	if let Some(token) = bearer {
		map.insert(oauth2::http::header::AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
	}

	for (name, value) in headers {
		let name = HeaderName::from_bytes(name.as_bytes())
			.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;

		map.insert(name, header_value(value)?);
	}

	Ok(request)
}

fn header_value(raw: &str) -> Result<HeaderValue> {
	HeaderValue::from_str(raw).map_err(|e| ConfigError::from(oauth2::http::Error::from(e)).into())
}
