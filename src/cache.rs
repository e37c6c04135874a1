//! Caller-owned cache of loaded trials.

use crate::error::Result;
use crate::store::load_trial;
use crate::trial::Trial;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Loaded trials keyed by test case name.
///
/// Trials are immutable once written, so a cached handle stays valid until
/// the caller re-runs the case and calls [`invalidate`](Self::invalidate).
#[derive(Debug, Default)]
pub struct TrialCache {
    trials: HashMap<String, Arc<Trial>>,
}

impl TrialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached trial for `name`, loading it from `root` on first use.
    /// Failed loads are not cached.
    pub fn get_or_load(&mut self, name: &str, root: &Path) -> Result<Arc<Trial>> {
        if let Some(trial) = self.trials.get(name) {
            return Ok(Arc::clone(trial));
        }

        debug!(test_case = name, root = %root.display(), "Loading trial into cache");
        let trial = Arc::new(load_trial(root)?);
        self.trials.insert(name.to_string(), Arc::clone(&trial));
        Ok(trial)
    }

    pub fn invalidate(&mut self, name: &str) -> bool {
        self.trials.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.trials.clear();
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}
