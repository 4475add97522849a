//! Provider-facing configuration: which endpoints the client talks to.
//!
//! `descriptor` exposes validated metadata ([`ProviderDescriptor`]) covering the authorization
//! server (authorize + token endpoints) and the resource server (refresh, revoke, and the
//! protected smoke-test endpoint). Endpoints must use HTTPS unless they point at a loopback host.

pub mod descriptor;

pub use descriptor::*;

// self
use crate::_prelude::*;

/// Endpoints the client calls, used to label errors, spans, and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
	/// Authorization server's token endpoint (code exchange).
	Token,
	/// Resource server's refresh endpoint.
	Refresh,
	/// Resource server's revoke endpoint.
	Revoke,
	/// Protected resource used to prove the token set works.
	Protected,
	/// Arbitrary URL called through the generic API caller.
	Api,
}
impl Endpoint {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Endpoint::Token => "token",
			Endpoint::Refresh => "refresh",
			Endpoint::Revoke => "revoke",
			Endpoint::Protected => "protected",
			Endpoint::Api => "api",
		}
	}

	/// Human-readable operation name used as the prefix of HTTP failure messages.
	pub const fn operation(self) -> &'static str {
		match self {
			Endpoint::Token => "Token exchange",
			Endpoint::Refresh => "Token refresh",
			Endpoint::Revoke => "Token revocation",
			Endpoint::Protected => "Backend call",
			Endpoint::Api => "API call",
		}
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
