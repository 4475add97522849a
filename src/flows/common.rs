//! Client settings shared by every flow.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret, TokenSet},
	error::{ConfigError, PreconditionError},
	flows::auth_code_pkce::pkce::{DEFAULT_VERIFIER_LEN, MAX_VERIFIER_LEN, MIN_VERIFIER_LEN},
};

/// Which token the client presents as `Authorization: Bearer` to the resource server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BearerSource {
	/// Present the access token.
	#[default]
	AccessToken,
	/// Present the OpenID Connect ID token (resource servers that validate ID tokens).
	IdToken,
}
impl BearerSource {
	/// Picks the configured token out of `tokens`.
	pub fn select<'a>(self, tokens: &'a TokenSet) -> Result<&'a TokenSecret, PreconditionError> {
		match self {
			BearerSource::AccessToken => Ok(&tokens.access_token),
			BearerSource::IdToken =>
				tokens.id_token.as_ref().ok_or(PreconditionError::MissingIdToken),
		}
	}
}

/// Public-client registration plus local policy knobs.
#[derive(Clone, Debug)]
pub struct ClientSettings {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Redirect URI registered with the authorization server.
	pub redirect_uri: Url,
	/// Scopes requested at the authorization endpoint.
	pub scope: ScopeSet,
	/// PKCE verifier length in characters.
	pub verifier_len: usize,
	/// Token presented to the resource server.
	pub bearer_source: BearerSource,
	/// How long a stored verifier stays redeemable.
	pub verifier_ttl: Duration,
}
impl ClientSettings {
	/// Default lifetime of a stored verifier.
	pub const DEFAULT_VERIFIER_TTL: Duration = Duration::minutes(10);

	/// Creates settings requesting `openid profile email`.
	pub fn new(client_id: impl Into<String>, redirect_uri: Url) -> Self {
		Self {
			client_id: client_id.into(),
			redirect_uri,
			scope: ScopeSet::new(["openid", "profile", "email"]).unwrap_or_default(),
			verifier_len: DEFAULT_VERIFIER_LEN,
			bearer_source: BearerSource::default(),
			verifier_ttl: Self::DEFAULT_VERIFIER_TTL,
		}
	}

	/// Parses the redirect URI before building the settings.
	pub fn parse(client_id: impl Into<String>, redirect_uri: &str) -> Result<Self> {
		let parsed = Url::parse(redirect_uri).map_err(|source| ConfigError::InvalidUrl {
			url: redirect_uri.to_owned(),
			source,
		})?;

		Ok(Self::new(client_id, parsed))
	}

	/// Replaces the requested scopes.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Overrides the verifier length; must fall within `43..=128`.
	pub fn with_verifier_len(mut self, length: usize) -> Result<Self> {
		if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&length) {
			return Err(ConfigError::VerifierLength { length }.into());
		}

		self.verifier_len = length;

		Ok(self)
	}

	/// Selects which token is presented as bearer.
	pub fn with_bearer_source(mut self, source: BearerSource) -> Self {
		self.bearer_source = source;

		self
	}

	/// Overrides the verifier lifetime; negative values clamp to zero.
	pub fn with_verifier_ttl(mut self, ttl: Duration) -> Self {
		self.verifier_ttl = if ttl.is_negative() { Duration::ZERO } else { ttl };

		self
	}
}
