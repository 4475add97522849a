//! Keyed PKCE verifier storage spanning the authorize redirect and the callback.
//!
//! Each login attempt stores its verifier under `pkce.verifier/<attempt>` together with its
//! creation time; `pkce.index` lists the pending attempts so abandoned entries can be purged.
//! Entries are read once: [`VerifierStore::take`] deletes the entry whether or not the exchange
//! that follows succeeds. [`Client::start_authorization`](crate::flows::Client::start_authorization)
//! sweeps expired entries before storing a new one.

// self
use crate::{
	_prelude::*,
	auth::AttemptId,
	flows::auth_code_pkce::pkce::PkceVerifier,
	store::{KeyValueStore, StoreError},
};

const ENTRY_PREFIX: &str = "pkce.verifier/";
const INDEX_KEY: &str = "pkce.index";

#[derive(Serialize, Deserialize)]
struct VerifierEntry {
	verifier: PkceVerifier,
	#[serde(with = "time::serde::rfc3339")]
	created_at: OffsetDateTime,
}

/// Verifier persistence keyed by attempt id, layered over a [`KeyValueStore`].
pub struct VerifierStore {
	store: Arc<dyn KeyValueStore>,
	ttl: Duration,
	index_guard: AsyncMutex<()>,
}
impl VerifierStore {
	/// Creates a store whose entries expire `ttl` after being written.
	pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
		Self { store, ttl, index_guard: AsyncMutex::new(()) }
	}

	/// Lifetime applied to new and existing entries.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Persists `verifier` for `attempt`, replacing any earlier entry for the same attempt.
	pub async fn put(&self, attempt: &AttemptId, verifier: &PkceVerifier) -> Result<()> {
		let entry =
			VerifierEntry { verifier: verifier.clone(), created_at: OffsetDateTime::now_utc() };
		let raw = serde_json::to_string(&entry).map_err(serialization)?;
		let _guard = self.index_guard.lock().await;
		let mut index = self.read_index().await?;

		self.store.set(&entry_key(attempt), raw).await?;

		if !index.contains(attempt) {
			index.push(attempt.clone());
			self.write_index(&index).await?;
		}

		Ok(())
	}

	/// Removes and returns the verifier for `attempt`.
	///
	/// Returns `None` when no entry exists or the entry outlived the TTL; either way the entry is
	/// gone afterwards.
	pub async fn take(&self, attempt: &AttemptId) -> Result<Option<PkceVerifier>> {
		let _guard = self.index_guard.lock().await;
		let entry = self.remove_locked(attempt).await?;
		let now = OffsetDateTime::now_utc();

		Ok(entry.filter(|entry| !self.is_expired(entry, now)).map(|entry| entry.verifier))
	}

	/// Drops the entry for `attempt` without reading it. Returns whether an entry existed.
	pub async fn expire(&self, attempt: &AttemptId) -> Result<bool> {
		let _guard = self.index_guard.lock().await;

		Ok(self.remove_locked(attempt).await?.is_some())
	}

	/// Deletes every entry older than the TTL and returns the attempts that were purged.
	pub async fn purge_expired(&self) -> Result<Vec<AttemptId>> {
		let _guard = self.index_guard.lock().await;
		let index = self.read_index().await?;
		let now = OffsetDateTime::now_utc();
		let mut kept = Vec::with_capacity(index.len());
		let mut purged = Vec::new();

		for attempt in index {
			let key = entry_key(&attempt);

			// Index entries without a payload are dropped silently.
			let Some(raw) = self.store.get(&key).await? else { continue };

			if self.is_expired(&decode_entry(&raw)?, now) {
				self.store.delete(&key).await?;
				purged.push(attempt);
			} else {
				kept.push(attempt);
			}
		}

		self.write_index(&kept).await?;

		Ok(purged)
	}

	/// Attempts that still have a stored verifier, in creation order.
	pub async fn pending(&self) -> Result<Vec<AttemptId>> {
		self.read_index().await
	}

	async fn remove_locked(&self, attempt: &AttemptId) -> Result<Option<VerifierEntry>> {
		let removed = self.store.delete(&entry_key(attempt)).await?;
		let mut index = self.read_index().await?;
		let before = index.len();

		index.retain(|candidate| candidate != attempt);

		if index.len() != before {
			self.write_index(&index).await?;
		}

		removed.as_deref().map(decode_entry).transpose()
	}

	async fn read_index(&self) -> Result<Vec<AttemptId>> {
		match self.store.get(INDEX_KEY).await? {
			Some(raw) => serde_json::from_str(&raw).map_err(serialization),
			None => Ok(Vec::new()),
		}
	}

	async fn write_index(&self, index: &[AttemptId]) -> Result<()> {
		if index.is_empty() {
			self.store.delete(INDEX_KEY).await?;

			return Ok(());
		}

		let raw = serde_json::to_string(index).map_err(serialization)?;

		Ok(self.store.set(INDEX_KEY, raw).await?)
	}

	fn is_expired(&self, entry: &VerifierEntry, now: OffsetDateTime) -> bool {
		now - entry.created_at >= self.ttl
	}
}
impl Debug for VerifierStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VerifierStore").field("ttl", &self.ttl).finish()
	}
}

fn entry_key(attempt: &AttemptId) -> String {
	format!("{ENTRY_PREFIX}{attempt}")
}

fn decode_entry(raw: &str) -> Result<VerifierEntry> {
	serde_json::from_str(raw).map_err(serialization)
}

fn serialization(e: serde_json::Error) -> Error {
	StoreError::Serialization { message: format!("Verifier entry could not be encoded: {e}") }
		.into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{flows::auth_code_pkce::pkce::PkcePair, store::MemoryStore};

	fn attempt(raw: &str) -> AttemptId {
		AttemptId::new(raw).expect("Attempt fixture should be valid.")
	}

	fn store(ttl: Duration) -> (VerifierStore, MemoryStore) {
		let backend = MemoryStore::default();

		(VerifierStore::new(Arc::new(backend.clone()), ttl), backend)
	}

	#[tokio::test]
	async fn take_is_read_once() {
		let (verifiers, backend) = store(Duration::minutes(10));
		let pair = PkcePair::generate();
		let id = attempt("state-1");

		verifiers.put(&id, &pair.verifier).await.expect("Put should succeed.");

		assert_eq!(verifiers.pending().await.expect("Index should load."), vec![id.clone()]);
		assert_eq!(verifiers.take(&id).await.expect("Take should succeed."), Some(pair.verifier));
		assert_eq!(verifiers.take(&id).await.expect("Second take should succeed."), None);
		assert!(backend.is_empty(), "Entry and index must both be gone: {:?}.", backend.keys());
	}

	#[tokio::test]
	async fn attempts_are_isolated() {
		let (verifiers, _) = store(Duration::minutes(10));
		let first = PkcePair::generate();
		let second = PkcePair::generate();

		verifiers.put(&attempt("a"), &first.verifier).await.expect("Put should succeed.");
		verifiers.put(&attempt("b"), &second.verifier).await.expect("Put should succeed.");

		assert!(verifiers.expire(&attempt("a")).await.expect("Expire should succeed."));
		assert!(!verifiers.expire(&attempt("a")).await.expect("Expire should succeed."));
		assert_eq!(
			verifiers.take(&attempt("b")).await.expect("Take should succeed."),
			Some(second.verifier)
		);
	}

	#[tokio::test]
	async fn expired_entries_are_not_redeemable() {
		let (verifiers, backend) = store(Duration::ZERO);
		let pair = PkcePair::generate();

		verifiers.put(&attempt("old"), &pair.verifier).await.expect("Put should succeed.");

		assert_eq!(verifiers.take(&attempt("old")).await.expect("Take should succeed."), None);

		verifiers.put(&attempt("older"), &pair.verifier).await.expect("Put should succeed.");

		let purged = verifiers.purge_expired().await.expect("Purge should succeed.");

		assert_eq!(purged, vec![attempt("older")]);
		assert!(backend.is_empty());
	}

	#[tokio::test]
	async fn purge_keeps_live_entries() {
		let (verifiers, _) = store(Duration::minutes(10));
		let pair = PkcePair::generate();

		verifiers.put(&attempt("live"), &pair.verifier).await.expect("Put should succeed.");

		assert!(verifiers.purge_expired().await.expect("Purge should succeed.").is_empty());
		assert_eq!(verifiers.pending().await.expect("Index should load."), vec![attempt("live")]);
	}
}
