use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::types::StreamKey;

/// Mutex-guarded map whose compound operations are atomic.
pub struct SyncMap<K, V> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V> SyncMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts `value` only if `key` is absent. Returns true iff it was inserted.
    pub fn try_add(&self, key: K, value: V) -> bool {
        self.update(key, |current| match current {
            Some(_) => (None, false),
            None => (Some(value), true),
        })
    }

    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.inner.lock().insert(key, value)
    }

    /// Idempotent.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().remove(key)
    }

    /// Removes `key` only if its current value satisfies `pred`.
    pub fn remove_if(&self, key: &K, pred: impl FnOnce(&V) -> bool) -> bool {
        let mut map = self.inner.lock();
        if map.get(key).is_some_and(pred) {
            map.remove(key);
            true
        } else {
            false
        }
    }

    /// Keeps only the entries for which `keep` returns true. Returns how many were dropped.
    pub fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|k, v| keep(k, v));
        before - map.len()
    }

    /// For inspection only; never gate an insert on it.
    pub fn has(&self, key: &K) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Read-modify-write under one lock. `f` sees the current value and returns
    /// an optional replacement along with the caller's result.
    pub fn update<R>(&self, key: K, f: impl FnOnce(Option<&V>) -> (Option<V>, R)) -> R {
        let mut map = self.inner.lock();
        let (replacement, result) = f(map.get(&key));
        if let Some(v) = replacement {
            map.insert(key, v);
        }
        result
    }
}

impl<K: Eq + Hash, V> Default for SyncMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`ActiveStreams::claim`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Claim {
    /// Nobody tails this key yet; the caller owns it now.
    New,
    /// The key is tailed but the container restarted since; the caller owns the new instance.
    Restarted,
    /// Already tailed; do nothing.
    Held,
}

impl Claim {
    pub fn should_start(self) -> bool {
        !matches!(self, Claim::Held)
    }
}

/// Streams currently being tailed, with the start time of the tailed container instance.
#[derive(Default)]
pub struct ActiveStreams {
    streams: SyncMap<StreamKey, Option<OffsetDateTime>>,
}

impl ActiveStreams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, key: &StreamKey, started_at: Option<OffsetDateTime>) -> Claim {
        self.streams.update(key.clone(), |current| match current {
            None => (Some(started_at), Claim::New),
            Some(prev) if is_newer(started_at, *prev) => (Some(started_at), Claim::Restarted),
            Some(_) => (None, Claim::Held),
        })
    }

    /// Frees the slot unless it has since been claimed by a newer instance.
    pub fn release(&self, key: &StreamKey, started_at: Option<OffsetDateTime>) -> bool {
        self.streams.remove_if(key, |current| *current == started_at)
    }

    /// Drops every slot of a deleted pod, including finished streams that kept theirs.
    pub fn forget_pod(&self, pod: &str) -> usize {
        self.streams.retain(|key, _| key.pod != pod)
    }

    pub fn has(&self, key: &StreamKey) -> bool {
        self.streams.has(key)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

fn is_newer(seen: Option<OffsetDateTime>, recorded: Option<OffsetDateTime>) -> bool {
    match (seen, recorded) {
        (Some(seen), Some(recorded)) => seen > recorded,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cluster::fake::at;

    #[test]
    fn try_add_only_inserts_once() {
        let set: SyncMap<String, ()> = SyncMap::new();
        assert!(set.try_add("a".into(), ()));
        assert!(!set.try_add("a".into(), ()));
        assert!(set.has(&"a".to_string()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let set: SyncMap<String, ()> = SyncMap::new();
        set.put("a".into(), ());
        assert!(set.remove(&"a".to_string()).is_some());
        assert!(set.remove(&"a".to_string()).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn newer_start_time_is_a_restart() {
        let active = ActiveStreams::new();
        let key = StreamKey::new("web-1", "app");

        assert_eq!(active.claim(&key, at(0)), Claim::New);
        assert_eq!(active.claim(&key, at(0)), Claim::Held);
        assert_eq!(active.claim(&key, at(-5)), Claim::Held);
        assert_eq!(active.claim(&key, at(30)), Claim::Restarted);
        assert_eq!(active.claim(&key, at(30)), Claim::Held);
    }

    #[test]
    fn forget_pod_drops_only_that_pod() {
        let active = ActiveStreams::new();
        active.claim(&StreamKey::new("web-1", "app"), at(0));
        active.claim(&StreamKey::new("web-1", "sidecar"), at(0));
        active.claim(&StreamKey::new("web-10", "app"), at(0));

        assert_eq!(active.forget_pod("web-1"), 2);
        assert!(active.has(&StreamKey::new("web-10", "app")));
        assert_eq!(active.claim(&StreamKey::new("web-1", "app"), at(0)), Claim::New);
    }

    #[test]
    fn missing_start_time_never_restarts() {
        let active = ActiveStreams::new();
        let key = StreamKey::new("web-1", "app");

        assert_eq!(active.claim(&key, None), Claim::New);
        assert_eq!(active.claim(&key, at(10)), Claim::Held);
    }

    #[test]
    fn superseded_release_keeps_replacement() {
        let active = ActiveStreams::new();
        let key = StreamKey::new("web-1", "app");

        active.claim(&key, at(0));
        active.claim(&key, at(30));

        assert!(!active.release(&key, at(0)));
        assert!(active.has(&key));
        assert!(active.release(&key, at(30)));
        assert!(!active.has(&key));
        assert_eq!(active.claim(&key, at(30)), Claim::New);
    }

    #[test]
    fn concurrent_claims_yield_a_single_owner() {
        let active = Arc::new(ActiveStreams::new());
        let key = StreamKey::new("web-1", "app");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let active = Arc::clone(&active);
                let key = key.clone();
                std::thread::spawn(move || active.claim(&key, at(0)))
            })
            .collect();

        let owners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| c.should_start())
            .count();

        assert_eq!(owners, 1);
        assert_eq!(active.len(), 1);
    }
}
