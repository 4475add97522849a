//! PKCE verifier generation and S256 challenge derivation (RFC 7636).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::seq::IndexedRandom;
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::ConfigError};

/// Characters allowed in a code verifier (`[A-Za-z0-9-._~]`).
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Shortest verifier RFC 7636 allows.
pub const MIN_VERIFIER_LEN: usize = 43;
/// Longest verifier RFC 7636 allows.
pub const MAX_VERIFIER_LEN: usize = 128;
/// Verifier length used when none is configured.
pub const DEFAULT_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Secret half of a PKCE pair. Only its challenge ever leaves the client before the exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkceVerifier(String);
impl PkceVerifier {
	/// Wraps an existing verifier string (for example one read back from storage).
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw verifier sent as `code_verifier` during the exchange.
	pub fn secret(&self) -> &str {
		&self.0
	}

	/// S256 challenge for this verifier.
	pub fn challenge(&self) -> String {
		derive_challenge(&self.0)
	}
}
impl Debug for PkceVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("PkceVerifier(<redacted>)")
	}
}
impl Display for PkceVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Verifier plus its derived challenge.
#[derive(Clone, Debug)]
pub struct PkcePair {
	/// Secret verifier.
	pub verifier: PkceVerifier,
	/// `BASE64URL(SHA256(verifier))` without padding.
	pub challenge: String,
	/// Challenge method (always `S256`).
	pub method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Generates a pair with the default verifier length.
	pub fn generate() -> Self {
		Self::from_verifier(PkceVerifier(random_verifier(DEFAULT_VERIFIER_LEN)))
	}

	/// Generates a pair with a verifier of `length` characters.
	pub fn with_length(length: usize) -> Result<Self> {
		Ok(Self::from_verifier(generate_verifier(length)?))
	}

	/// Derives the challenge for an existing verifier.
	pub fn from_verifier(verifier: PkceVerifier) -> Self {
		let challenge = verifier.challenge();

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

/// Draws a verifier of `length` characters from the unreserved set using the thread CSPRNG.
pub fn generate_verifier(length: usize) -> Result<PkceVerifier> {
	if !(MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&length) {
		return Err(ConfigError::VerifierLength { length }.into());
	}

	Ok(PkceVerifier(random_verifier(length)))
}

/// Computes `BASE64URL-NOPAD(SHA256(verifier))`.
pub fn derive_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_verifier(length: usize) -> String {
	let mut rng = rand::rng();

	(0..length).filter_map(|_| UNRESERVED.choose(&mut rng).copied().map(char::from)).collect()
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{PkceCodeChallenge, PkceCodeVerifier};
	// self
	use super::*;

	#[test]
	fn verifiers_respect_length_and_charset() {
		for length in MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN {
			let verifier = generate_verifier(length).expect("In-range lengths must succeed.");

			assert_eq!(verifier.secret().len(), length);
			assert!(verifier.secret().bytes().all(|b| UNRESERVED.contains(&b)));

			let challenge = verifier.challenge();

			assert_eq!(challenge.len(), 43);
			assert!(!challenge.contains(['+', '/', '=']));
			assert_eq!(challenge, derive_challenge(verifier.secret()), "Challenge is deterministic.");
		}
	}

	#[test]
	fn out_of_range_lengths_are_configuration_errors() {
		for length in [0, 42, 129] {
			let err = generate_verifier(length).expect_err("Out-of-range lengths must fail.");

			assert!(matches!(
				err,
				Error::Config(ConfigError::VerifierLength { length: l }) if l == length
			));
		}
	}

	#[test]
	fn challenge_matches_rfc_7636_appendix_b() {
		assert_eq!(
			derive_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn challenge_agrees_with_oauth2_crate() {
		let verifier = generate_verifier(DEFAULT_VERIFIER_LEN).expect("Default length is valid.");
		let expected = PkceCodeChallenge::from_code_verifier_sha256(&PkceCodeVerifier::new(
			verifier.secret().to_owned(),
		));

		assert_eq!(verifier.challenge(), expected.as_str());
		assert_eq!(expected.method().as_str(), PkceCodeChallengeMethod::S256.as_str());
	}

	#[test]
	fn verifier_formatters_redact() {
		let pair = PkcePair::generate();

		assert_eq!(format!("{:?}", pair.verifier), "PkceVerifier(<redacted>)");
		assert!(!format!("{pair:?}").contains(pair.verifier.secret()));
	}
}
