//! Client-level error types shared across flows, transports, and stores.

// self
use crate::{_prelude::*, provider::Endpoint};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maximum number of characters kept from a response body for diagnostics.
pub const BODY_EXCERPT_LIMIT: usize = 400;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// A required value was absent, so no network call was made.
	#[error(transparent)]
	Precondition(#[from] PreconditionError),
	/// An endpoint answered with a non-2xx status.
	#[error(transparent)]
	Http(#[from] HttpStatusError),
	/// An endpoint answered 2xx without the expected payload.
	#[error(transparent)]
	Payload(#[from] PayloadError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Authorization server redirected back with an `error` parameter instead of a code.
	#[error("Authorization was denied: {error}{}.", describe(.description))]
	AuthorizationDenied {
		/// OAuth `error` value from the redirect.
		error: String,
		/// Optional `error_description` value from the redirect.
		description: Option<String>,
	},
	/// Resource server answered with a non-zero envelope code.
	#[error("Server rejected the request with code {code}{}.", describe(.message))]
	Rejected {
		/// Envelope `code` field.
		code: i64,
		/// Envelope `message` field, if supplied.
		message: Option<String>,
	},
	/// The token set changed while a refresh was in flight; its result was discarded.
	#[error("Token set changed while the refresh was in flight.")]
	Superseded,
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
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
	/// Provider descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Provider configuration could not be parsed.
	#[error("Provider configuration is malformed.")]
	MalformedDescriptor {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A URL could not be parsed.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Requested PKCE verifier length is outside RFC 7636 bounds.
	#[error("PKCE verifier length {length} is outside the 43..=128 range.")]
	VerifierLength {
		/// Requested length.
		length: usize,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Attempt identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
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

/// Fail-fast conditions detected before any network call.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PreconditionError {
	/// No verifier was stored for the attempt (or it already expired or was consumed).
	#[error("Missing PKCE code_verifier for attempt `{attempt}`.")]
	MissingVerifier {
		/// Attempt (state) value the caller supplied.
		attempt: String,
	},
	/// Neither the current token set nor the caller supplied a refresh token.
	#[error("No refresh token available.")]
	MissingRefreshToken,
	/// The current token set has no access token.
	#[error("No access token available.")]
	MissingAccessToken,
	/// The current token set has no ID token but the client presents ID tokens as bearer.
	#[error("No ID token available.")]
	MissingIdToken,
	/// The redirect carried neither `code` nor `error`.
	#[error("Authorization redirect is missing the `{param}` parameter.")]
	MissingCallbackParam {
		/// Missing query parameter.
		param: &'static str,
	},
}

/// Non-2xx response captured for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{} failed ({status}): {body}", operation(.endpoint))]
pub struct HttpStatusError {
	/// Endpoint that produced the response.
	pub endpoint: Endpoint,
	/// HTTP status code.
	pub status: u16,
	/// Canonical reason phrase for the status, empty when unknown.
	pub status_text: String,
	/// Response body, truncated to [`BODY_EXCERPT_LIMIT`] characters.
	pub body: String,
	/// Retry-After hint, when the server supplied one.
	pub retry_after: Option<Duration>,
}
impl HttpStatusError {
	/// Builds the error, truncating `body` to [`BODY_EXCERPT_LIMIT`] characters.
	pub fn new(
		endpoint: Endpoint,
		status: u16,
		status_text: impl Into<String>,
		body: &str,
	) -> Self {
		Self {
			endpoint,
			status,
			status_text: status_text.into(),
			body: excerpt(body),
			retry_after: None,
		}
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}
}

/// 2xx responses that do not carry what the flow needs.
#[derive(Debug, ThisError)]
pub enum PayloadError {
	/// Token response lacked `access_token`.
	#[error("No access_token in token response.")]
	MissingAccessToken,
	/// Token response lacked `id_token` while the client presents ID tokens as bearer.
	#[error("No id_token in token response.")]
	MissingIdToken,
	/// Successful envelope without `data`.
	#[error("The {endpoint} endpoint returned an envelope without data.")]
	MissingData {
		/// Endpoint that produced the envelope.
		endpoint: Endpoint,
	},
	/// Body could not be parsed as the expected JSON shape.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	Malformed {
		/// Endpoint that produced the body.
		endpoint: Endpoint,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request timed out before a response arrived.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// HTTP status code, when one was observed.
		status: Option<u16>,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Transport-specific failure without a richer classification.
	#[error("HTTP client error occurred while calling the {endpoint} endpoint: {message}.")]
	Other {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: Endpoint,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Truncates `body` to [`BODY_EXCERPT_LIMIT`] characters, marking the cut with `…`.
pub fn excerpt(body: &str) -> String {
	if body.chars().count() <= BODY_EXCERPT_LIMIT {
		return body.to_owned();
	}

	let mut out = body.chars().take(BODY_EXCERPT_LIMIT - 1).collect::<String>();

	out.push('…');

	out
}

fn operation(endpoint: &Endpoint) -> &'static str {
	endpoint.operation()
}

fn describe(detail: &Option<String>) -> String {
	detail.as_deref().map(|value| format!(": {value}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn excerpt_caps_long_bodies() {
		let long = "x".repeat(1_000);
		let cut = excerpt(&long);

		assert_eq!(cut.chars().count(), BODY_EXCERPT_LIMIT);
		assert!(cut.ends_with('…'));
		assert_eq!(excerpt("invalid_grant"), "invalid_grant");
	}

	#[test]
	fn excerpt_counts_characters_not_bytes() {
		let body = "é".repeat(BODY_EXCERPT_LIMIT);

		assert_eq!(excerpt(&body), body);
	}

	#[test]
	fn http_status_error_formats_operation_and_status() {
		let err = HttpStatusError::new(Endpoint::Token, 400, "Bad Request", "invalid_grant");

		assert_eq!(err.to_string(), "Token exchange failed (400): invalid_grant");

		let err = HttpStatusError::new(Endpoint::Protected, 503, "", "down");

		assert_eq!(err.to_string(), "Backend call failed (503): down");
	}

	#[test]
	fn rejected_error_includes_optional_message() {
		let with = Error::Rejected { code: 7, message: Some("expired".into()) };
		let without = Error::Rejected { code: 7, message: None };

		assert_eq!(with.to_string(), "Server rejected the request with code 7: expired.");
		assert_eq!(without.to_string(), "Server rejected the request with code 7.");
	}
}
