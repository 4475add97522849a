//! Protected resource call made with the current bearer token.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, AUTHORIZATION},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ConfigError,
	flows::Client,
	http::TokenHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::Endpoint,
};

/// Successful protected resource response. The payload is passed through uninterpreted.
#[derive(Clone, Debug, PartialEq)]
pub struct ProtectedResponse {
	/// HTTP status (always 2xx).
	pub status: u16,
	/// Body as JSON when it parses, otherwise as a string; an empty body becomes `null`.
	pub body: Value,
}

impl<C, M> Client<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Calls the protected endpoint with the bearer selected from the current token set.
	pub async fn call_protected(&self) -> Result<ProtectedResponse> {
		const KIND: FlowKind = FlowKind::ProtectedCall;

		let span = FlowSpan::new(KIND, "call_protected");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let bearer = self.current_bearer()?;

				self.fetch_protected(&bearer).await
			})
			.await;

		obs::finish(KIND, result)
	}

	pub(crate) async fn fetch_protected(&self, bearer: &TokenSecret) -> Result<ProtectedResponse> {
		let request = Request::builder()
			.method(Method::GET)
			.uri(self.descriptor.endpoints.protected.as_str())
			.header(AUTHORIZATION, bearer.bearer_header())
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let response = oauth::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			Endpoint::Protected,
			request,
		)
		.await?;
		let response = oauth::ensure_success(Endpoint::Protected, response)?;
		let status = response.status().as_u16();
		let body = passthrough_body(response.body());

		Ok(ProtectedResponse { status, body })
	}
}

/// Empty bodies become `null`, JSON is parsed, anything else is kept as text.
fn passthrough_body(raw: &[u8]) -> Value {
	if raw.iter().all(u8::is_ascii_whitespace) {
		return Value::Null;
	}

	serde_json::from_slice(raw)
		.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()))
}
