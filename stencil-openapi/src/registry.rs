//! Component schema deduplication

use parking_lot::Mutex;
use std::collections::HashSet;

/// Names of the component schemas already emitted.
///
/// Shared across threads for the life of the process; insertion is
/// insert-if-absent under a lock, so a schema is produced once no matter how
/// many endpoints or synthesis runs reference its type.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    names: Mutex<HashSet<String>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name`; `true` only for the first caller
    pub fn register_once(&self, name: &str) -> bool {
        let mut names = self.names.lock();
        if names.contains(name) {
            return false;
        }
        names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.lock().iter().cloned().collect();
        names.sort();
        names
    }
}
