//! Dedup ledger: which items are done, and what their text looked like.

use std::collections::{HashMap, HashSet};

/// What a rescan of one processed item found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// No fingerprint was on record; one is now stored.
    FirstSeen,
    /// Stored fingerprint matches.
    Unchanged,
    /// Stored fingerprint differs from the current text.
    Changed { previous: String },
}

/// Processed ids plus the last seen fingerprint per id.
#[derive(Debug, Default)]
pub struct DedupLedger {
    processed: HashSet<String>,
    fingerprints: HashMap<String, String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, item_id: &str) -> bool {
        self.processed.contains(item_id)
    }

    /// Record a full pass through both stages. Ids are never removed.
    pub fn mark_processed(&mut self, item_id: &str, fingerprint: String) {
        self.processed.insert(item_id.to_string());
        self.fingerprints.insert(item_id.to_string(), fingerprint);
    }

    /// Restore a processed id loaded from the store. Without a fingerprint
    /// the next rescan records one as a first observation.
    pub fn restore(&mut self, item_id: &str, fingerprint: Option<String>) {
        self.processed.insert(item_id.to_string());
        if let Some(fingerprint) = fingerprint {
            self.fingerprints.insert(item_id.to_string(), fingerprint);
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Processed ids, sorted for stable scan order.
    pub fn processed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.processed.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn fingerprint(&self, item_id: &str) -> Option<&str> {
        self.fingerprints.get(item_id).map(String::as_str)
    }

    pub fn set_fingerprint(&mut self, item_id: &str, fingerprint: String) {
        self.fingerprints.insert(item_id.to_string(), fingerprint);
    }

    /// Compare `current` with the stored fingerprint without modifying a
    /// mismatch; first observations are recorded.
    pub fn observe(&mut self, item_id: &str, current: &str) -> Observation {
        match self.fingerprints.get(item_id) {
            None => {
                self.fingerprints
                    .insert(item_id.to_string(), current.to_string());
                Observation::FirstSeen
            }
            Some(stored) if stored == current => Observation::Unchanged,
            Some(stored) => Observation::Changed {
                previous: stored.clone(),
            },
        }
    }
}
