//! In-process [`KeyValueStore`] for tests, demos, and single-process hosts.

// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreFuture},
};

/// Thread-safe map-backed store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<String, String>>>);
impl MemoryStore {
	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Snapshot of the stored keys, sorted.
	pub fn keys(&self) -> Vec<String> {
		let mut keys = self.0.read().keys().cloned().collect::<Vec<_>>();

		keys.sort();

		keys
	}
}
impl KeyValueStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let value = self.0.read().get(key).cloned();

		Box::pin(async move { Ok(value) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		self.0.write().insert(key.to_owned(), value);

		Box::pin(async { Ok(()) })
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let removed = self.0.write().remove(key);

		Box::pin(async move { Ok(removed) })
	}
}
