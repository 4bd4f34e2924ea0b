//! Records, batches and target sets passed between pipeline stages.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};

/// One access point observed in one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessPointRecord {
    /// Lowercase MAC address.
    pub bssid: Option<String>,
    /// Network name; `None` for hidden networks.
    pub ssid: Option<String>,
    pub signal_dbm: Option<f64>,
    pub freq_mhz: Option<u32>,
    /// Derived from `freq_mhz`.
    pub channel: Option<u32>,
}

impl AccessPointRecord {
    /// SSID with surrounding whitespace removed, `None` if empty.
    pub fn trimmed_ssid(&self) -> Option<&str> {
        self.ssid
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// The records captured by one scheduler cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBatch {
    /// Instant the cycle started.
    pub timestamp: DateTime<Utc>,
    pub interface: String,
    pub records: Vec<AccessPointRecord>,
}

impl ScanBatch {
    pub fn new(
        timestamp: DateTime<Utc>,
        interface: impl Into<String>,
        records: Vec<AccessPointRecord>,
    ) -> Self {
        Self {
            timestamp,
            interface: interface.into(),
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// SSIDs and/or BSSIDs of interest.
///
/// SSIDs compare case-sensitively, BSSIDs case-insensitively. An empty set
/// matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    names: BTreeSet<String>,
    folded: HashSet<String>,
}

impl Targets {
    /// Build a target set; items are trimmed and empty items dropped.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = items
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let folded = names.iter().map(|s| s.to_lowercase()).collect();
        Self { names, folded }
    }

    /// Parse a comma-separated list such as `"HomeWiFi, Office-AP"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Targets in sorted order, as configured.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Whether `record` should be kept.
    pub fn matches(&self, record: &AccessPointRecord) -> bool {
        if self.is_empty() {
            return true;
        }
        if let Some(ssid) = record.trimmed_ssid()
            && self.names.contains(ssid)
        {
            return true;
        }
        record
            .bssid
            .as_deref()
            .is_some_and(|bssid| self.folded.contains(&bssid.to_lowercase()))
    }

    /// Whether any record in `records` matches.
    pub fn any_match(&self, records: &[AccessPointRecord]) -> bool {
        records.iter().any(|r| self.matches(r))
    }
}

impl std::fmt::Display for Targets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "None (log all)");
        }
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(","))
    }
}
