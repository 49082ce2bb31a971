use crate::error::Error;
use crate::Formula;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

/// Bounded cache mapping expression text to its built formula.
///
/// When the entry count exceeds `maximum_size`, least-recently-used entries
/// are evicted until `reduction_size` remain. The interior lock is held
/// across a miss's build, which keeps `get_or_build` linearizable; builds
/// are parse-time cheap. Build failures are returned to the caller and
/// never cached.
pub struct FormulaCache {
    maximum_size: usize,
    reduction_size: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    ticks: u64,
}

struct CacheEntry {
    formula: Formula,
    last_used: u64,
}

impl FormulaCache {
    pub fn new(maximum_size: usize, reduction_size: usize) -> Self {
        FormulaCache {
            maximum_size,
            reduction_size,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                ticks: 0,
            }),
        }
    }

    pub fn get_or_build<F>(&self, source: &str, build: F) -> Result<Formula, Error>
    where
        F: FnOnce() -> Result<Formula, Error>,
    {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.ticks += 1;
        let now = inner.ticks;

        if let Some(entry) = inner.entries.get_mut(source) {
            entry.last_used = now;
            return Ok(entry.formula.clone());
        }

        let formula = build()?;
        inner.entries.insert(
            source.to_string(),
            CacheEntry {
                formula: formula.clone(),
                last_used: now,
            },
        );
        if inner.entries.len() > self.maximum_size {
            self.trim(&mut inner);
        }
        Ok(formula)
    }

    fn trim(&self, inner: &mut CacheInner) {
        let mut by_age: Vec<(u64, String)> = inner
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        by_age.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let excess = inner.entries.len().saturating_sub(self.reduction_size);
        for (_, key) in by_age.into_iter().take(excess) {
            inner.entries.remove(&key);
        }
        debug!(
            "trimmed formula cache to {} entries (reduction size {})",
            inner.entries.len(),
            self.reduction_size
        );
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(guard) => guard.entries.len(),
            Err(poisoned) => poisoned.into_inner().entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
