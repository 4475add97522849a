//! Authorization Code + PKCE: authorize redirect, code exchange, and the follow-up protected call.
//!
//! [`Client::start_authorization`] stores a fresh verifier under a new attempt id and returns the
//! authorize URL. When the redirect comes back, [`Client::exchange_code`] redeems the verifier,
//! posts the code to the token endpoint, installs the resulting [`TokenSet`] as `current`, and
//! proves it by calling the protected endpoint. Each step is mirrored in the attempt's
//! [`ExchangeStatus`].

pub mod attempt;
pub mod pkce;
pub mod session;

pub use attempt::{AttemptSnapshot, ExchangeOutcome, ExchangeStatus};
pub use pkce::{
	PkceCodeChallengeMethod, PkcePair, PkceVerifier, derive_challenge, generate_verifier,
};
pub use session::{AuthorizationSession, CallbackParams};

// self
use crate::{
	_prelude::*,
	auth::{AttemptId, TokenSecret, TokenSet},
	error::{PayloadError, PreconditionError},
	flows::{BearerSource, Client},
	http::TokenHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::Endpoint,
};

/// Store key holding the most recently issued ID token.
pub const LAST_ID_TOKEN_KEY: &str = "oidc.last_id_token";

#[derive(Debug, Default, Deserialize)]
struct TokenEndpointResponse {
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
}
impl TokenEndpointResponse {
	fn into_token_set(self, bearer_source: BearerSource) -> Result<TokenSet> {
		let present = |value: Option<String>| value.filter(|value| !value.is_empty());
		let id_token = present(self.id_token);

		if bearer_source == BearerSource::IdToken && id_token.is_none() {
			return Err(PayloadError::MissingIdToken.into());
		}

		let access_token = present(self.access_token).ok_or(PayloadError::MissingAccessToken)?;

		Ok(TokenSet {
			id_token: id_token.map(TokenSecret::from),
			access_token: access_token.into(),
			refresh_token: present(self.refresh_token).map(TokenSecret::from),
			issued_at: OffsetDateTime::now_utc(),
		})
	}
}

impl<C, M> Client<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Generates a PKCE pair, stores its verifier under a new attempt id, and builds the authorize
	/// URL.
	///
	/// Verifiers of abandoned attempts that outlived the TTL are purged first.
	pub async fn start_authorization(&self) -> Result<AuthorizationSession> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "start_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let attempt = AttemptId::generate();
				let pkce = PkcePair::with_length(self.settings.verifier_len)?;

				self.verifiers.purge_expired().await?;
				self.verifiers.put(&attempt, &pkce.verifier).await?;

				Ok(AuthorizationSession::new(
					&self.descriptor,
					&self.settings,
					attempt,
					&pkce,
					OffsetDateTime::now_utc(),
				))
			})
			.await;

		obs::finish(KIND, result)
	}

	/// Exchanges `code` for tokens using the verifier stored for `state`, then calls the protected
	/// endpoint with the new bearer.
	///
	/// A code that was already observed yields [`ExchangeOutcome::Suppressed`] without any
	/// request. If another exchange starts while this one is in flight, this one reports
	/// [`ExchangeOutcome::Stale`] and its tokens are not installed.
	pub async fn exchange_code(&self, state: &str, code: &str) -> Result<ExchangeOutcome> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let generation = match self.attempts.begin(state, code) {
			Ok(generation) => generation,
			Err(status) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Discarded);

				return Ok(ExchangeOutcome::Suppressed { status });
			},
		};
		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_exchange(generation, state, code)).await;
		let result = match result {
			Err(err) =>
				if self.attempts.fail(generation, err.to_string()) {
					Err(err)
				} else {
					Ok(ExchangeOutcome::Stale)
				},
			ok => ok,
		};

		match &result {
			Ok(ExchangeOutcome::Completed(_)) =>
				obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Discarded),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Parses the redirect URL and runs [`exchange_code`](Self::exchange_code).
	///
	/// When the authorization server reports an error instead of a code, the attempt's verifier
	/// is discarded and [`Error::AuthorizationDenied`] is returned.
	pub async fn exchange_callback(&self, redirect: &Url) -> Result<ExchangeOutcome> {
		match CallbackParams::from_url(redirect) {
			Ok(params) => self.exchange_code(&params.state, &params.code).await,
			Err(err @ Error::AuthorizationDenied { .. }) => {
				let state = redirect
					.query_pairs()
					.find(|(key, _)| key == "state")
					.and_then(|(_, value)| AttemptId::new(value).ok());

				if let Some(attempt) = state {
					self.verifiers.expire(&attempt).await?;
				}

				Err(err)
			},
			Err(err) => Err(err),
		}
	}

	/// Status of the most recent attempt (`Idle` before any code was observed).
	pub fn exchange_status(&self) -> ExchangeStatus {
		self.attempts.status()
	}

	/// Snapshot of the most recent attempt.
	pub fn attempt(&self) -> Option<AttemptSnapshot> {
		self.attempts.latest()
	}

	/// ID token persisted by the last successful exchange, for display.
	pub async fn last_id_token(&self) -> Result<Option<TokenSecret>> {
		Ok(self.store.get(LAST_ID_TOKEN_KEY).await?.map(TokenSecret::from))
	}

	pub(crate) fn current_bearer(&self) -> Result<TokenSecret> {
		let tokens = self.lifecycle.current().ok_or(PreconditionError::MissingAccessToken)?;

		Ok(self.settings.bearer_source.select(&tokens)?.clone())
	}

	async fn run_exchange(
		&self,
		generation: u64,
		state: &str,
		code: &str,
	) -> Result<ExchangeOutcome> {
		let verifier = match AttemptId::new(state) {
			Ok(attempt) => self.verifiers.take(&attempt).await?,
			Err(_) => None,
		}
		.ok_or_else(|| PreconditionError::MissingVerifier { attempt: state.to_owned() })?;
		let request = oauth::form_request(
			&self.descriptor.endpoints.token,
			&[
				("grant_type", "authorization_code"),
				("client_id", self.settings.client_id.as_str()),
				("redirect_uri", self.settings.redirect_uri.as_str()),
				("code", code),
				("code_verifier", verifier.secret()),
			],
		)?;
		let response = oauth::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			Endpoint::Token,
			request,
		)
		.await?;
		let response = oauth::ensure_success(Endpoint::Token, response)?;
		let payload: TokenEndpointResponse = oauth::parse_json(Endpoint::Token, &response)?;
		let tokens = payload.into_token_set(self.settings.bearer_source)?;
		let id_token = tokens.id_token.clone();

		if !self.attempts.advance_with(generation, ExchangeStatus::CallingApi, || {
			self.lifecycle.install(tokens)
		}) {
			return Ok(ExchangeOutcome::Stale);
		}
		if let Some(id_token) = id_token {
			self.store.set(LAST_ID_TOKEN_KEY, id_token.expose().to_owned()).await?;
		}

		let bearer = self.current_bearer()?;
		let protected = self.fetch_protected(&bearer).await?;

		if self.attempts.advance(generation, ExchangeStatus::Done) {
			Ok(ExchangeOutcome::Completed(protected))
		} else {
			Ok(ExchangeOutcome::Stale)
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(raw: &str) -> TokenEndpointResponse {
		serde_json::from_str(raw).expect("Token response fixture should parse.")
	}

	#[test]
	fn token_payload_requires_access_token() {
		let err = response(r#"{"id_token":"idt1","access_token":""}"#)
			.into_token_set(BearerSource::AccessToken)
			.expect_err("Empty access tokens must be rejected.");

		assert_eq!(err.to_string(), "No access_token in token response.");
	}

	#[test]
	fn id_token_bearer_requires_id_token() {
		let err = response(r#"{"access_token":"at1"}"#)
			.into_token_set(BearerSource::IdToken)
			.expect_err("Missing ID tokens must be rejected for ID-token bearers.");

		assert_eq!(err.to_string(), "No id_token in token response.");
	}

	#[test]
	fn token_payload_maps_every_token() {
		let tokens = response(
			r#"{"id_token":"idt1","access_token":"at1","refresh_token":"rt1","token_type":"Bearer"}"#,
		)
		.into_token_set(BearerSource::IdToken)
		.expect("Complete payload should convert.");

		assert_eq!(tokens.id_token.as_ref().map(TokenSecret::expose), Some("idt1"));
		assert_eq!(tokens.access_token.expose(), "at1");
		assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("rt1"));
	}
}
