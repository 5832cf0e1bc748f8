use crate::list::{HList, HMList};

/// The operations both list flavors expose.
pub trait ConcurrentSet {
    fn new() -> Self;

    /// Adds `key`; false if it was already present.
    fn insert(&self, key: usize) -> bool;

    /// Removes `key`; false if it was absent.
    fn remove(&self, key: usize) -> bool;

    /// Whether `key` is present.
    fn contains(&self, key: usize) -> bool;
}

impl ConcurrentSet for HList {
    fn new() -> Self {
        HList::new()
    }

    fn insert(&self, key: usize) -> bool {
        HList::insert(self, key)
    }

    fn remove(&self, key: usize) -> bool {
        HList::remove(self, key)
    }

    fn contains(&self, key: usize) -> bool {
        HList::contains(self, key)
    }
}

impl ConcurrentSet for HMList {
    fn new() -> Self {
        HMList::new()
    }

    fn insert(&self, key: usize) -> bool {
        HMList::insert(self, key)
    }

    fn remove(&self, key: usize) -> bool {
        HMList::remove(self, key)
    }

    fn contains(&self, key: usize) -> bool {
        HMList::contains(self, key)
    }
}
