//! Optional observability helpers for client flows.
//!
//! # Feature Flags
//!
//! - `tracing` wraps every flow in an `oauth2_pkce.flow` span with `flow` and `stage` fields and
//!   emits a debug event on each exchange state transition.
//! - `metrics` increments `oauth2_pkce_flow_total`, labeled by `flow` and `outcome`, and
//!   `oauth2_pkce_http_response_total`, labeled by `endpoint` and status `class`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization code exchange, including the follow-up protected call.
	AuthorizationCode,
	/// Standalone protected resource call.
	ProtectedCall,
	/// Token refresh against the resource server.
	Refresh,
	/// Token revocation against the resource server.
	Revoke,
	/// Generic API call.
	ApiCall,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::ProtectedCall => "protected_call",
			FlowKind::Refresh => "refresh",
			FlowKind::Revoke => "revoke",
			FlowKind::ApiCall => "api_call",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Call ignored because an identical one was in flight or newer state won.
	Discarded,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Discarded => "discarded",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records `Success`/`Failure` for a finished flow and passes the result through.
pub(crate) fn finish<T>(kind: FlowKind, result: Result<T>) -> Result<T> {
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	record_flow_outcome(kind, outcome);

	result
}
