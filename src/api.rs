//! Generic JSON API caller for the resource server.
//!
//! Requests carry an optional structured body: `GET`/`HEAD` bodies are flattened into the query
//! string, every other method sends them as JSON. Responses are parsed as a
//! [`ResponseEnvelope`], the `{code, data, message}` wrapper the resource server uses.

// crates.io
use oauth2::{HttpRequest, http::Method};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, PayloadError},
	flows::Client,
	http::TokenHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::Endpoint,
};

/// One call through the generic API caller.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Target URL.
	pub url: Url,
	/// Optional structured body.
	pub body: Option<Value>,
	/// Bearer token attached as `Authorization`, when present and non-empty.
	pub bearer: Option<TokenSecret>,
	/// Extra headers applied last, so they can override `Content-Type`.
	pub headers: Vec<(String, String)>,
}
impl ApiRequest {
	/// Creates a request without body, bearer, or extra headers.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, body: None, bearer: None, headers: Vec::new() }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Sets the structured body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` into the structured body.
	pub fn with_json<T>(self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body).map_err(ConfigError::RequestBody)?;

		Ok(self.with_body(value))
	}

	/// Attaches a bearer token.
	pub fn with_bearer(mut self, token: impl Into<TokenSecret>) -> Self {
		self.bearer = Some(token.into());

		self
	}

	/// Adds an extra header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Lowers the request into the transport representation.
	pub fn into_http(self) -> Result<HttpRequest> {
		let ApiRequest { method, mut url, body, bearer, headers } = self;
		let payload = if method == Method::GET || method == Method::HEAD {
			if let Some(Value::Object(map)) = &body {
				append_query(&mut url, map);
			}

			Vec::new()
		} else {
			match &body {
				Some(value) => serde_json::to_vec(value).map_err(ConfigError::RequestBody)?,
				None => Vec::new(),
			}
		};
		let bearer = bearer.as_ref().map(TokenSecret::expose).filter(|token| !token.is_empty());

		oauth::json_request(method, &url, bearer, &headers, payload)
	}
}

/// `{code, data, message}` wrapper returned by the resource server; `code == 0` means success.
///
/// Unknown members (such as the server's `uiText` block) are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResponseEnvelope<T> {
	/// Application status code.
	pub code: i64,
	/// Payload, present on success.
	pub data: Option<T>,
	/// Optional human-readable message.
	#[serde(default)]
	pub message: Option<String>,
}
impl<T> ResponseEnvelope<T> {
	/// Returns true when `code == 0`.
	pub fn is_success(&self) -> bool {
		self.code == 0
	}

	/// Fails with [`Error::Rejected`] unless `code == 0`.
	pub fn ensure_success(&self) -> Result<()> {
		if self.is_success() {
			Ok(())
		} else {
			Err(Error::Rejected { code: self.code, message: self.message.clone() })
		}
	}

	/// Unwraps `data` from a successful envelope.
	pub fn into_data(self, endpoint: Endpoint) -> Result<T> {
		self.ensure_success()?;

		self.data.ok_or_else(|| PayloadError::MissingData { endpoint }.into())
	}
}

/// Flattens a JSON object into `application/x-www-form-urlencoded` pairs.
///
/// `null` members are skipped, arrays repeat the key once per item, strings are used raw, and
/// every other value (numbers, booleans, nested objects) is rendered as JSON text. Non-object
/// inputs yield no pairs.
pub fn query_pairs(value: &Value) -> Vec<(String, String)> {
	let Value::Object(map) = value else {
		return Vec::new();
	};
	let mut pairs = Vec::new();

	for (key, member) in map {
		match member {
			Value::Null => {},
			Value::Array(items) =>
				pairs.extend(items.iter().map(|item| (key.clone(), render(item)))),
			other => pairs.push((key.clone(), render(other))),
		}
	}

	pairs
}

/// Encodes [`query_pairs`] as a query string (without the leading `?`).
pub fn query_string(value: &Value) -> String {
	url::form_urlencoded::Serializer::new(String::new()).extend_pairs(query_pairs(value)).finish()
}

fn append_query(url: &mut Url, map: &Map<String, Value>) {
	let pairs = query_pairs(&Value::Object(map.clone()));

	if !pairs.is_empty() {
		url.query_pairs_mut().extend_pairs(pairs);
	}
}

fn render(value: &Value) -> String {
	match value {
		Value::String(raw) => raw.clone(),
		other => other.to_string(),
	}
}

impl<C, M> Client<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Sends `request` and parses the 2xx body as a [`ResponseEnvelope`].
	///
	/// The envelope is returned as-is; a non-zero `code` is left for the caller to inspect.
	pub async fn call_api<T>(&self, request: ApiRequest) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		const KIND: FlowKind = FlowKind::ApiCall;

		let span = FlowSpan::new(KIND, "call_api");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send_api(Endpoint::Api, request)).await;

		obs::finish(KIND, result)
	}

	pub(crate) async fn send_api<T>(
		&self,
		endpoint: Endpoint,
		request: ApiRequest,
	) -> Result<ResponseEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		let request = request.into_http()?;
		let response = oauth::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			endpoint,
			request,
		)
		.await?;
		let response = oauth::ensure_success(endpoint, response)?;

		oauth::parse_json(endpoint, &response)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::header::{AUTHORIZATION, CONTENT_TYPE};
	use serde_json::json;
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("URL fixture should parse.")
	}

	#[test]
	fn query_flattening_matches_browser_rules() {
		let body = json!({
			"name": "a b",
			"skip": null,
			"ids": [1, 2],
			"flag": true,
			"filter": { "k": "v" }
		});

		let mut pairs = query_pairs(&body);

		pairs.sort();

		assert_eq!(
			pairs,
			vec![
				("filter".to_owned(), r#"{"k":"v"}"#.to_owned()),
				("flag".to_owned(), "true".to_owned()),
				("ids".to_owned(), "1".to_owned()),
				("ids".to_owned(), "2".to_owned()),
				("name".to_owned(), "a b".to_owned()),
			]
		);
		assert_eq!(query_string(&json!({ "q": "a b&c" })), "q=a+b%26c");
		assert!(query_pairs(&json!("scalar")).is_empty());
	}

	#[test]
	fn get_bodies_become_query_strings() {
		let request = ApiRequest::get(url("https://api.example.com/items?page=1"))
			.with_body(json!({ "size": 10 }))
			.with_bearer("at1")
			.into_http()
			.expect("GET request should lower.");

		assert_eq!(request.uri().to_string(), "https://api.example.com/items?page=1&size=10");
		assert!(request.body().is_empty());
		assert_eq!(request.headers()[AUTHORIZATION], "Bearer at1");
		assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
	}

	#[test]
	fn post_bodies_are_json_and_empty_bearer_is_dropped() {
		let request = ApiRequest::post(url("https://api.example.com/auth/refresh"))
			.with_json(&json!({ "refreshToken": "rt1" }))
			.expect("Body should serialize.")
			.with_bearer("")
			.into_http()
			.expect("POST request should lower.");

		assert_eq!(request.body().as_slice(), br#"{"refreshToken":"rt1"}"#);
		assert!(request.headers().get(AUTHORIZATION).is_none());
	}

	#[test]
	fn envelopes_distinguish_rejection_and_missing_data() {
		let ok: ResponseEnvelope<String> = serde_json::from_str(
			r#"{"code":0,"data":"x","uiText":{"version":"1","isUptoDate":true}}"#,
		)
		.expect("Envelope should parse.");

		assert_eq!(ok.into_data(Endpoint::Api).expect("Data should unwrap."), "x");

		let rejected: ResponseEnvelope<String> =
			serde_json::from_str(r#"{"code":401,"message":"expired"}"#)
				.expect("Envelope should parse.");

		assert!(matches!(
			rejected.into_data(Endpoint::Api),
			Err(Error::Rejected { code: 401, message: Some(_) })
		));

		let empty: ResponseEnvelope<String> =
			serde_json::from_str(r#"{"code":0}"#).expect("Envelope should parse.");

		assert!(matches!(
			empty.into_data(Endpoint::Refresh),
			Err(Error::Payload(PayloadError::MissingData { endpoint: Endpoint::Refresh }))
		));
	}
}
