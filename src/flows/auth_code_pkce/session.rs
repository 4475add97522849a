//! Authorize-redirect construction and callback parsing.

// self
use crate::{
	_prelude::*,
	auth::AttemptId,
	error::PreconditionError,
	flows::{
		ClientSettings,
		auth_code_pkce::pkce::{PkceCodeChallengeMethod, PkcePair},
	},
	provider::ProviderDescriptor,
};

/// Everything the host needs to send the user to the authorization server.
///
/// The verifier itself is not part of the session; it lives in the verifier store keyed by
/// [`attempt`](Self::attempt) until the callback redeems it.
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Attempt id, sent as `state`.
	pub attempt: AttemptId,
	/// Fully-formed authorize URL.
	pub authorize_url: Url,
	/// Redirect URI embedded in the authorize URL.
	pub redirect_uri: Url,
	/// PKCE code challenge derived from the stored verifier.
	pub code_challenge: String,
	/// PKCE challenge method (currently always `S256`).
	pub code_challenge_method: PkceCodeChallengeMethod,
	/// Instant after which the stored verifier is no longer redeemable.
	pub expires_at: OffsetDateTime,
}
impl AuthorizationSession {
	pub(crate) fn new(
		descriptor: &ProviderDescriptor,
		settings: &ClientSettings,
		attempt: AttemptId,
		pkce: &PkcePair,
		now: OffsetDateTime,
	) -> Self {
		let authorize_url = build_authorize_url(descriptor, settings, &attempt, pkce);

		Self {
			attempt,
			authorize_url,
			redirect_uri: settings.redirect_uri.clone(),
			code_challenge: pkce.challenge.clone(),
			code_challenge_method: pkce.method,
			expires_at: now + settings.verifier_ttl,
		}
	}
}

/// Query parameters the authorization server appends to the redirect URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackParams {
	/// Authorization code.
	pub code: String,
	/// Returned `state`, i.e. the attempt id.
	pub state: String,
}
impl CallbackParams {
	/// Extracts `code` and `state` from the redirect URL.
	///
	/// An `error` parameter becomes [`Error::AuthorizationDenied`]; a missing `code` or `state`
	/// is a precondition failure.
	pub fn from_url(redirect: &Url) -> Result<Self> {
		let mut code = None;
		let mut state = None;
		let mut error = None;
		let mut description = None;

		for (key, value) in redirect.query_pairs() {
			let slot = match key.as_ref() {
				"code" => &mut code,
				"state" => &mut state,
				"error" => &mut error,
				"error_description" => &mut description,
				_ => continue,
			};

			*slot = Some(value.into_owned()).filter(|value| !value.is_empty());
		}

		if let Some(error) = error {
			return Err(Error::AuthorizationDenied { error, description });
		}

		let code = code.ok_or(PreconditionError::MissingCallbackParam { param: "code" })?;
		let state = state.ok_or(PreconditionError::MissingCallbackParam { param: "state" })?;

		Ok(Self { code, state })
	}
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	settings: &ClientSettings,
	attempt: &AttemptId,
	pkce: &PkcePair,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &settings.client_id);
	pairs.append_pair("redirect_uri", settings.redirect_uri.as_str());

	if let Some(scope) = settings.scope.joined(' ') {
		pairs.append_pair("scope", &scope);
	}

	pairs.append_pair("state", attempt);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());

	drop(pairs);

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::ProviderId;

	fn descriptor() -> ProviderDescriptor {
		ProviderDescriptor::builder(ProviderId::new("okta").expect("Provider id should be valid."))
			.authorization_endpoint(
				Url::parse("https://idp.example.com/oauth2/v1/authorize?prompt=login")
					.expect("Authorize URL fixture should parse."),
			)
			.token_endpoint(
				Url::parse("https://idp.example.com/oauth2/v1/token")
					.expect("Token URL fixture should parse."),
			)
			.protected_endpoint(
				Url::parse("http://localhost:8081/api/protected")
					.expect("Protected URL fixture should parse."),
			)
			.api_base(
				Url::parse("http://localhost:12345/api/v1/").expect("API base should parse."),
			)
			.build()
			.expect("Descriptor fixture should build.")
	}

	#[test]
	fn authorize_url_carries_every_parameter() {
		let settings = ClientSettings::parse("spa-client", "http://localhost:3000/callback")
			.expect("Settings fixture should parse.");
		let attempt = AttemptId::new("state-1").expect("Attempt fixture should be valid.");
		let pkce = PkcePair::generate();
		let now = OffsetDateTime::now_utc();
		let session = AuthorizationSession::new(&descriptor(), &settings, attempt, &pkce, now);
		let query = session.authorize_url.query_pairs().into_owned().collect::<HashMap<_, _>>();

		assert_eq!(query["prompt"], "login");
		assert_eq!(query["response_type"], "code");
		assert_eq!(query["client_id"], "spa-client");
		assert_eq!(query["redirect_uri"], "http://localhost:3000/callback");
		assert_eq!(query["scope"], "openid profile email");
		assert_eq!(query["state"], "state-1");
		assert_eq!(query["code_challenge"], pkce.challenge);
		assert_eq!(query["code_challenge_method"], "S256");
		assert!(!session.authorize_url.as_str().contains(pkce.verifier.secret()));
		assert_eq!(session.expires_at, now + Duration::minutes(10));
	}

	#[test]
	fn callback_parsing_covers_success_denial_and_gaps() {
		let ok = Url::parse("http://localhost:3000/callback?code=abc123&state=s1")
			.expect("Callback fixture should parse.");

		assert_eq!(
			CallbackParams::from_url(&ok).expect("Callback should parse."),
			CallbackParams { code: "abc123".into(), state: "s1".into() }
		);

		let denied = Url::parse(
			"http://localhost:3000/callback?error=access_denied&error_description=User+said+no&state=s1",
		)
		.expect("Denied fixture should parse.");

		match CallbackParams::from_url(&denied) {
			Err(Error::AuthorizationDenied { error, description }) => {
				assert_eq!(error, "access_denied");
				assert_eq!(description.as_deref(), Some("User said no"));
			},
			other => panic!("Expected an authorization denial, got {other:?}."),
		}

		let missing = Url::parse("http://localhost:3000/callback?state=s1")
			.expect("Missing-code fixture should parse.");

		assert!(matches!(
			CallbackParams::from_url(&missing),
			Err(Error::Precondition(PreconditionError::MissingCallbackParam { param: "code" }))
		));
	}
}
