//! Token set issued by the authorization server and rotated by the resource server.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors raised by [`TokenSetBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenSetBuilderError {
	/// A token set always carries an access token.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// One generation of tokens: the access token plus whatever the server issued with it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
	/// OpenID Connect ID token, when the provider issued one.
	pub id_token: Option<TokenSecret>,
	/// Access token presented to the resource server.
	pub access_token: TokenSecret,
	/// Refresh token used to obtain the next generation.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the set was received.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
}
impl TokenSet {
	/// Starts building a token set.
	pub fn builder() -> TokenSetBuilder {
		TokenSetBuilder::default()
	}

	/// Returns a copy with new access/refresh tokens, carrying the ID token forward.
	pub fn rotated(
		&self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		issued_at: OffsetDateTime,
	) -> Self {
		Self { id_token: self.id_token.clone(), access_token, refresh_token, issued_at }
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("id_token_set", &self.id_token.is_some())
			.field("access_token", &self.access_token)
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("issued_at", &self.issued_at)
			.finish()
	}
}

/// Builder for [`TokenSet`].
#[derive(Clone, Debug, Default)]
pub struct TokenSetBuilder {
	id_token: Option<TokenSecret>,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
}
impl TokenSetBuilder {
	/// Sets the ID token.
	pub fn id_token(mut self, value: impl Into<TokenSecret>) -> Self {
		self.id_token = Some(value.into());

		self
	}

	/// Sets the access token.
	pub fn access_token(mut self, value: impl Into<TokenSecret>) -> Self {
		self.access_token = Some(value.into());

		self
	}

	/// Sets the refresh token.
	pub fn refresh_token(mut self, value: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(value.into());

		self
	}

	/// Overrides the issue instant (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Validates and builds the token set.
	pub fn build(self) -> Result<TokenSet, TokenSetBuilderError> {
		let access_token = self.access_token.ok_or(TokenSetBuilderError::MissingAccessToken)?;

		Ok(TokenSet {
			id_token: self.id_token,
			access_token,
			refresh_token: self.refresh_token,
			issued_at: self.issued_at.unwrap_or_else(OffsetDateTime::now_utc),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builder_requires_access_token() {
		let err = TokenSet::builder().refresh_token("rt1").build().expect_err("Builder must fail.");

		assert_eq!(err, TokenSetBuilderError::MissingAccessToken);
	}

	#[test]
	fn rotation_carries_id_token_forward() {
		let first = TokenSet::builder()
			.id_token("idt1")
			.access_token("at1")
			.refresh_token("rt1")
			.build()
			.expect("Token set fixture should build.");
		let later = first.issued_at + Duration::minutes(5);
		let second = first.rotated("at2".into(), Some("rt2".into()), later);

		assert_eq!(second.id_token, first.id_token);
		assert_eq!(second.access_token.expose(), "at2");
		assert_eq!(second.refresh_token.as_ref().map(TokenSecret::expose), Some("rt2"));
		assert_eq!(second.issued_at, later);
	}

	#[test]
	fn debug_output_hides_secrets() {
		let set = TokenSet::builder()
			.access_token("at-secret")
			.refresh_token("rt-secret")
			.build()
			.expect("Token set fixture should build.");
		let rendered = format!("{set:?}");

		assert!(!rendered.contains("at-secret"));
		assert!(!rendered.contains("rt-secret"));
	}
}
