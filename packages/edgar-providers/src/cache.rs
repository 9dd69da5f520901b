use std::{hash::Hash, sync::Mutex};

use ahash::AHashMap;
use time::{Duration, OffsetDateTime};

/// Read-mostly TTL cache. Advisory only: a miss or a poisoned lock costs a
/// refetch, never correctness, so lock failures fall back to the inner state.
#[derive(Debug)]
pub struct TtlCache<K, V> {
	ttl: Duration,
	entries: Mutex<AHashMap<K, (OffsetDateTime, V)>>,
}
impl<K, V> TtlCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, entries: Mutex::new(AHashMap::new()) }
	}

	pub fn get(&self, key: &K, now: OffsetDateTime) -> Option<V> {
		let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let (stored_at, value) = entries.get(key)?;

		if now - *stored_at > self.ttl {
			return None;
		}

		Some(value.clone())
	}

	pub fn insert(&self, key: K, value: V, now: OffsetDateTime) {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		entries.insert(key, (now, value));
	}

	pub fn purge_expired(&self, now: OffsetDateTime) {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		entries.retain(|_, (stored_at, _)| now - *stored_at <= self.ttl);
	}
}
