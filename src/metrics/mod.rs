//! Named counter store
//!
//! Backs the `/record/:name` and `/value/:name` endpoints. Each name lives in
//! its own `DashMap` entry, so increments on one name are serialized under that
//! entry's shard lock while unrelated names proceed in parallel.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Outcome of [`MetricsStore::increment_or_create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    /// Value observed immediately before the increment (0 when created)
    pub previous: u64,
    pub created: bool,
}

impl Increment {
    /// Value after the increment
    pub const fn current(self) -> u64 {
        self.previous + 1
    }
}

#[derive(Debug, Default)]
pub struct MetricsStore {
    metrics: DashMap<String, u64>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `name` by one, creating it with value 1 if unseen.
    pub fn increment_or_create(&self, name: &str) -> Increment {
        // Fast path: no key allocation for names that already exist
        if let Some(mut value) = self.metrics.get_mut(name) {
            let previous = *value;
            *value += 1;
            return Increment { previous, created: false };
        }

        match self.metrics.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                let previous = *entry.get();
                *entry.get_mut() += 1;
                Increment { previous, created: false }
            }
            Entry::Vacant(entry) => {
                entry.insert(1);
                Increment { previous: 0, created: true }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.metrics.get(name).map(|value| *value)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }
}
