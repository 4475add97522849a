// self
use crate::{
	obs::{FlowKind, FlowOutcome},
	provider::Endpoint,
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_pkce_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counts one HTTP response from `endpoint`, bucketed by status class (`2xx`, `4xx`, ...).
pub fn record_http_response(endpoint: Endpoint, status: u16) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_pkce_http_response_total",
			"endpoint" => endpoint.as_str(),
			"class" => status_class(status)
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (endpoint, status);
	}
}

#[cfg_attr(not(any(test, feature = "metrics")), allow(dead_code))]
fn status_class(status: u16) -> &'static str {
	match status {
		100..=199 => "1xx",
		200..=299 => "2xx",
		300..=399 => "3xx",
		400..=499 => "4xx",
		500..=599 => "5xx",
		_ => "other",
	}
}
