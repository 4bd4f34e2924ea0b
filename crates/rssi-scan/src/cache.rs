//! Target to frequency index.
//!
//! The cache is owned by the scheduler and never shared, so it needs no
//! locking. It is rebuilt from scratch on every full discovery and only grows
//! between discoveries.

use std::collections::{BTreeSet, HashMap};

use crate::model::{AccessPointRecord, Targets};

/// Last known frequencies per BSSID and per SSID.
///
/// A BSSID maps to a single frequency (latest observation wins). An SSID maps
/// to a set, since several radios may broadcast the same network name on
/// different channels.
#[derive(Debug, Default, Clone)]
pub struct FrequencyCache {
    by_bssid: HashMap<String, u32>,
    by_ssid: HashMap<String, BTreeSet<u32>>,
}

impl FrequencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frequencies where any of `targets` was last seen, sorted and unique.
    ///
    /// An empty result means the cache cannot narrow the scan and the caller
    /// must run a full discovery.
    pub fn resolve(&self, targets: &Targets) -> BTreeSet<u32> {
        let mut freqs = BTreeSet::new();
        for target in targets.iter() {
            if let Some(ssid_freqs) = self.by_ssid.get(target) {
                freqs.extend(ssid_freqs.iter().copied());
            }
            if let Some(freq) = self.by_bssid.get(&target.to_lowercase()) {
                freqs.insert(*freq);
            }
        }
        freqs
    }

    /// Merge observations into the cache without removing anything.
    pub fn record(&mut self, records: &[AccessPointRecord]) {
        for record in records {
            let Some(freq) = record.freq_mhz else {
                continue;
            };
            if let Some(bssid) = record.bssid.as_deref() {
                self.by_bssid.insert(bssid.to_lowercase(), freq);
            }
            if let Some(ssid) = record.trimmed_ssid() {
                self.by_ssid.entry(ssid.to_string()).or_default().insert(freq);
            }
        }
    }

    /// Replace the cache contents with `records`.
    pub fn rebuild(&mut self, records: &[AccessPointRecord]) {
        self.by_bssid.clear();
        self.by_ssid.clear();
        self.record(records);
    }

    pub fn is_empty(&self) -> bool {
        self.by_bssid.is_empty() && self.by_ssid.is_empty()
    }

    pub fn bssid_count(&self) -> usize {
        self.by_bssid.len()
    }

    pub fn ssid_count(&self) -> usize {
        self.by_ssid.len()
    }
}
