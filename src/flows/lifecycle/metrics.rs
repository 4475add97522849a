// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh and revoke calls.
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
	refresh_attempts: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_failures: AtomicU64,
	revoke_attempts: AtomicU64,
	revoke_successes: AtomicU64,
	revoke_failures: AtomicU64,
}
impl LifecycleMetrics {
	/// Total refresh calls.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Refresh calls that rotated the token set.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_successes.load(Ordering::Relaxed)
	}

	/// Refresh calls that left the token set unchanged.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Total revoke calls.
	pub fn revoke_attempts(&self) -> u64 {
		self.revoke_attempts.load(Ordering::Relaxed)
	}

	/// Revoke calls the server accepted.
	pub fn revoke_successes(&self) -> u64 {
		self.revoke_successes.load(Ordering::Relaxed)
	}

	/// Revoke calls that failed.
	pub fn revoke_failures(&self) -> u64 {
		self.revoke_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_refresh<T, E>(&self, result: &Result<T, E>) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);

		match result {
			Ok(_) => self.refresh_successes.fetch_add(1, Ordering::Relaxed),
			Err(_) => self.refresh_failures.fetch_add(1, Ordering::Relaxed),
		};
	}

	pub(crate) fn record_revoke<T, E>(&self, result: &Result<T, E>) {
		self.revoke_attempts.fetch_add(1, Ordering::Relaxed);

		match result {
			Ok(_) => self.revoke_successes.fetch_add(1, Ordering::Relaxed),
			Err(_) => self.revoke_failures.fetch_add(1, Ordering::Relaxed),
		};
	}
}
