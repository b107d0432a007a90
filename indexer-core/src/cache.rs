use hashbrown::HashSet;
use std::sync::RwLock;

/// Shared set of tracked fids, consulted on every relevance check. A small
/// leaf trait around the membership test mirrors the teacher's pattern of
/// wrapping an otherwise-external system (`Chron`, `ConnectionPool`) behind a
/// narrow interface: a future networked cache could implement this without
/// any caller change.
pub trait TargetSetCache: Send + Sync {
    fn add(&self, fid: i64);
    fn remove(&self, fid: i64);
    fn contains(&self, fid: i64) -> bool;
    fn size(&self) -> usize;
    fn members(&self) -> Vec<i64>;
    fn replace_all(&self, fids: Vec<i64>);
}

/// In-process implementation backing both the target set and the
/// client-target set; the registry owns one of each.
#[derive(Default)]
pub struct InMemorySetCache {
    inner: RwLock<HashSet<i64>>,
}

impl InMemorySetCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TargetSetCache for InMemorySetCache {
    fn add(&self, fid: i64) {
        self.inner.write().expect("target set cache lock poisoned").insert(fid);
    }

    fn remove(&self, fid: i64) {
        self.inner.write().expect("target set cache lock poisoned").remove(&fid);
    }

    fn contains(&self, fid: i64) -> bool {
        self.inner.read().expect("target set cache lock poisoned").contains(&fid)
    }

    fn size(&self) -> usize {
        self.inner.read().expect("target set cache lock poisoned").len()
    }

    fn members(&self) -> Vec<i64> {
        self.inner.read().expect("target set cache lock poisoned").iter().copied().collect()
    }

    fn replace_all(&self, fids: Vec<i64>) {
        let mut guard = self.inner.write().expect("target set cache lock poisoned");
        guard.clear();
        guard.extend(fids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_round_trip() {
        let cache = InMemorySetCache::new();
        cache.add(42);
        assert!(cache.contains(42));
        cache.remove(42);
        assert!(!cache.contains(42));
    }

    #[test]
    fn replace_all_drops_prior_members() {
        let cache = InMemorySetCache::new();
        cache.add(1);
        cache.add(2);
        cache.replace_all(vec![3, 4, 5]);
        assert_eq!(cache.size(), 3);
        assert!(!cache.contains(1));
        assert!(cache.contains(4));
    }
}
