use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::aggregate::ComparisonResult;

/// Headline numbers of a stored result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub match_percentage: f64,
    pub total_differences: usize,
    pub field_differences: usize,
    pub missing_in_target: usize,
    pub missing_in_source: usize,
    pub timestamp: DateTime<Utc>,
}

impl From<&ComparisonResult> for ResultSummary {
    fn from(result: &ComparisonResult) -> Self {
        Self {
            match_percentage: result.summary.match_percentage,
            total_differences: result.summary.total_differences,
            field_differences: result.summary.field_differences,
            missing_in_target: result.summary.missing_in_target,
            missing_in_source: result.summary.missing_in_source,
            timestamp: result.timestamp,
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    results: HashMap<String, Arc<ComparisonResult>>,
    /// Names in the order they were last stored.
    order: VecDeque<String>,
}

/// Thread-safe map from comparison name to its most recent result.
///
/// Storing under an existing name replaces the previous result. With a
/// capacity bound, storing a new name evicts the oldest one.
#[derive(Debug, Default)]
pub struct ResultRegistry {
    entries: Mutex<Entries>,
    capacity: Option<usize>,
}

impl ResultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry keeping at most `capacity` names (minimum one).
    pub fn bounded(capacity: usize) -> Self {
        Self {
            entries: Mutex::default(),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn store(&self, result: ComparisonResult) -> Arc<ComparisonResult> {
        let name = result.name.clone();
        let result = Arc::new(result);
        let mut entries = self.lock();

        entries.order.retain(|existing| *existing != name);
        entries.order.push_back(name.clone());
        entries.results.insert(name, Arc::clone(&result));

        if let Some(capacity) = self.capacity {
            while entries.order.len() > capacity {
                if let Some(evicted) = entries.order.pop_front() {
                    debug!(comparison = %evicted, "evicting oldest stored result");
                    entries.results.remove(&evicted);
                }
            }
        }
        result
    }

    pub fn get(&self, name: &str) -> Option<Arc<ComparisonResult>> {
        self.lock().results.get(name).cloned()
    }

    pub fn summary(&self, name: &str) -> Option<ResultSummary> {
        self.lock()
            .results
            .get(name)
            .map(|result| ResultSummary::from(result.as_ref()))
    }

    /// Summaries of every stored result, ordered by name.
    pub fn summaries(&self) -> BTreeMap<String, ResultSummary> {
        self.lock()
            .results
            .iter()
            .map(|(name, result)| (name.clone(), ResultSummary::from(result.as_ref())))
            .collect()
    }

    /// Stored names, oldest first.
    pub fn names(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ComparisonResult>> {
        let mut entries = self.lock();
        entries.order.retain(|existing| existing != name);
        entries.results.remove(name)
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.results.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every critical section leaves both maps readable, so poisoning is
    // recovered from.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
