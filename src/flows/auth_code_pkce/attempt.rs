//! Exchange state machine bookkeeping: one tracked attempt, guarded by a generation counter.

// std
use std::collections::VecDeque;
// self
use crate::{_prelude::*, flows::protected::ProtectedResponse, obs};

/// Per-attempt exchange state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExchangeStatus {
	/// No code observed yet.
	Idle,
	/// Code + verifier posted to the token endpoint.
	Exchanging,
	/// Tokens installed; protected resource call in flight.
	CallingApi,
	/// Protected resource accepted the new bearer.
	Done,
	/// Exchange or protected call failed.
	Error,
}
impl ExchangeStatus {
	/// Returns a stable label suitable for logs and UI.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeStatus::Idle => "idle",
			ExchangeStatus::Exchanging => "exchanging",
			ExchangeStatus::CallingApi => "calling-api",
			ExchangeStatus::Done => "done",
			ExchangeStatus::Error => "error",
		}
	}

	/// Returns true for `Done` and `Error`.
	pub const fn is_terminal(self) -> bool {
		matches!(self, ExchangeStatus::Done | ExchangeStatus::Error)
	}

	fn can_advance_to(self, next: ExchangeStatus) -> bool {
		matches!(
			(self, next),
			(ExchangeStatus::Idle, ExchangeStatus::Exchanging)
				| (ExchangeStatus::Exchanging, ExchangeStatus::CallingApi | ExchangeStatus::Error)
				| (ExchangeStatus::CallingApi, ExchangeStatus::Done | ExchangeStatus::Error)
		)
	}
}
impl Display for ExchangeStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Observable record of one login attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptSnapshot {
	/// `state` value the attempt was started with.
	pub attempt: String,
	/// Authorization code being exchanged.
	pub code: String,
	/// Monotonic attempt counter; newer attempts have larger generations.
	pub generation: u64,
	/// Current state.
	pub status: ExchangeStatus,
	/// Every state visited, oldest first.
	pub history: Vec<ExchangeStatus>,
	/// Failure message when `status` is `Error`.
	pub error: Option<String>,
}

/// Result of [`Client::exchange_code`](crate::flows::Client::exchange_code).
#[derive(Clone, Debug, PartialEq)]
pub enum ExchangeOutcome {
	/// Tokens installed and the protected resource answered.
	Completed(ProtectedResponse),
	/// The same code is already being (or was) exchanged; no request was sent.
	Suppressed {
		/// Status of the attempt that owns the code.
		status: ExchangeStatus,
	},
	/// A newer attempt started while this one was in flight; its result was discarded.
	Stale,
}

/// Upper bound on remembered finished codes; in-flight codes are never evicted.
const SEEN_CODE_LIMIT: usize = 64;

/// Tracks the latest attempt plus every code already started. The lock is never held across
/// `.await`.
#[derive(Debug, Default)]
pub(crate) struct AttemptTracker {
	inner: Mutex<TrackerState>,
}
#[derive(Debug, Default)]
struct TrackerState {
	generation: u64,
	latest: Option<AttemptSnapshot>,
	seen: VecDeque<SeenCode>,
}
impl TrackerState {
	fn remember(&mut self, code: &str, generation: u64) {
		self.seen.push_back(SeenCode {
			code: code.to_owned(),
			generation,
			status: ExchangeStatus::Exchanging,
		});

		while self.seen.len() > SEEN_CODE_LIMIT {
			let Some(idx) = self.seen.iter().position(|seen| seen.status.is_terminal()) else {
				break;
			};

			self.seen.remove(idx);
		}
	}

	fn record(&mut self, generation: u64, status: ExchangeStatus) {
		if let Some(seen) = self.seen.iter_mut().find(|seen| seen.generation == generation) {
			seen.status = status;
		}
	}

	/// Marks a superseded attempt as finished so its code reports a terminal status.
	fn retire(&mut self, generation: u64) {
		let in_flight = self
			.seen
			.iter_mut()
			.find(|seen| seen.generation == generation && !seen.status.is_terminal());

		if let Some(seen) = in_flight {
			seen.status = ExchangeStatus::Error;
		}
	}

	fn is_current(&self, generation: u64) -> bool {
		self.latest.as_ref().is_some_and(|latest| latest.generation == generation)
	}

	fn current_mut(&mut self, generation: u64) -> Option<&mut AttemptSnapshot> {
		self.latest.as_mut().filter(|latest| latest.generation == generation)
	}
}
#[derive(Debug)]
struct SeenCode {
	code: String,
	generation: u64,
	status: ExchangeStatus,
}
impl AttemptTracker {
	/// Starts an attempt for `code` and moves it to `Exchanging`.
	///
	/// Returns the owning attempt's status instead when the same code was already observed,
	/// whether or not that attempt is still the latest one.
	pub(crate) fn begin(&self, attempt: &str, code: &str) -> Result<u64, ExchangeStatus> {
		let mut state = self.inner.lock();

		if let Some(seen) = state.seen.iter().find(|seen| seen.code == code) {
			return Err(seen.status);
		}

		state.generation += 1;

		let generation = state.generation;
		let mut snapshot = AttemptSnapshot {
			attempt: attempt.to_owned(),
			code: code.to_owned(),
			generation,
			status: ExchangeStatus::Idle,
			history: vec![ExchangeStatus::Idle],
			error: None,
		};

		transition(&mut snapshot, ExchangeStatus::Exchanging);

		state.latest = Some(snapshot);
		state.remember(code, generation);

		Ok(generation)
	}

	/// Moves attempt `generation` to `next`; false when a newer attempt replaced it.
	pub(crate) fn advance(&self, generation: u64, next: ExchangeStatus) -> bool {
		self.advance_with(generation, next, || ())
	}

	/// Like [`advance`](Self::advance), running `effect` under the tracker lock only when the
	/// attempt is still current.
	pub(crate) fn advance_with(
		&self,
		generation: u64,
		next: ExchangeStatus,
		effect: impl FnOnce(),
	) -> bool {
		let mut state = self.inner.lock();

		if !state.is_current(generation) {
			state.retire(generation);

			return false;
		}

		let Some(latest) = state.current_mut(generation) else { return false };

		if !latest.status.can_advance_to(next) {
			return false;
		}

		effect();
		transition(latest, next);
		state.record(generation, next);

		true
	}

	/// Moves attempt `generation` to `Error`, recording `message`.
	pub(crate) fn fail(&self, generation: u64, message: String) -> bool {
		let mut state = self.inner.lock();

		if !state.is_current(generation) {
			state.retire(generation);

			return false;
		}

		let Some(latest) = state.current_mut(generation) else { return false };

		if !latest.status.can_advance_to(ExchangeStatus::Error) {
			return false;
		}

		latest.error = Some(message);
		transition(latest, ExchangeStatus::Error);
		state.record(generation, ExchangeStatus::Error);

		true
	}

	pub(crate) fn latest(&self) -> Option<AttemptSnapshot> {
		self.inner.lock().latest.clone()
	}

	pub(crate) fn status(&self) -> ExchangeStatus {
		self.inner.lock().latest.as_ref().map_or(ExchangeStatus::Idle, |latest| latest.status)
	}
}

fn transition(snapshot: &mut AttemptSnapshot, next: ExchangeStatus) {
	obs::trace_transition(&snapshot.attempt, snapshot.status.as_str(), next.as_str());

	snapshot.status = next;
	snapshot.history.push(next);
}
