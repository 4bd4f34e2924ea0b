//! `iw dev <iface> scan` output parsing.
//!
//! The output consists of BSS stanzas, each starting with:
//! ```text
//! BSS aa:bb:cc:dd:ee:ff(on wlan0)
//! ```
//! followed by indented key-value lines. Only frequency, signal and SSID are
//! extracted; everything else is ignored. Parsing never fails: malformed
//! fields are skipped and the rest of the stanza is kept.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::AccessPointRecord;

static BSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^BSS\s+([0-9a-fA-F:]{17})\b").unwrap());
static FREQ_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*freq:\s*(\d+)").unwrap());
static SIGNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*signal:\s*([+-]?\d+(?:\.\d+)?)\s*dBm").unwrap());
static SSID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*SSID:\s*(.*)$").unwrap());

/// Map a center frequency to its channel number.
///
/// - 2.4 GHz (2400..2500): `2412 + 5 * (ch - 1)`, channels 1..=14
/// - 5 GHz (4900..=5900): `5000 + 5 * ch`, channels 1..=199
///
/// Anything else, or a computed channel outside those ranges, yields `None`.
///
/// # Examples
/// ```
/// use rssi_scan::freq_to_channel;
///
/// assert_eq!(freq_to_channel(2437), Some(6));
/// assert_eq!(freq_to_channel(5180), Some(36));
/// assert_eq!(freq_to_channel(2484), None);
/// ```
pub fn freq_to_channel(freq_mhz: u32) -> Option<u32> {
    let freq = i64::from(freq_mhz);
    if (2400..2500).contains(&freq) {
        let ch = ((freq - 2412) as f64 / 5.0).round() as i64 + 1;
        return (1..=14).contains(&ch).then_some(ch as u32);
    }
    if (4900..=5900).contains(&freq) {
        let ch = ((freq - 5000) as f64 / 5.0).round() as i64;
        return (1..200).contains(&ch).then_some(ch as u32);
    }
    None
}

/// Parse one scan's output into one record per BSS stanza, in input order.
///
/// Lines before the first `BSS` announcement are ignored.
pub fn parse_scan_output<I, S>(lines: I) -> Vec<AccessPointRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut records = Vec::new();
    let mut current: Option<AccessPointRecord> = None;

    for line in lines {
        let line = line.as_ref().trim_end_matches(['\r', '\n']);

        if let Some(caps) = BSS_RE.captures(line) {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = Some(AccessPointRecord {
                bssid: Some(caps[1].to_lowercase()),
                ..Default::default()
            });
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some(caps) = FREQ_RE.captures(line) {
            let freq = caps[1].parse::<u32>().ok().filter(|f| *f > 0);
            record.freq_mhz = freq;
            record.channel = freq.and_then(freq_to_channel);
        } else if let Some(caps) = SIGNAL_RE.captures(line) {
            if let Ok(signal) = caps[1].parse::<f64>() {
                record.signal_dbm = Some(signal);
            }
        } else if let Some(caps) = SSID_RE.captures(line) {
            let ssid = caps[1].trim();
            record.ssid = (!ssid.is_empty()).then(|| ssid.to_string());
        }
    }

    if let Some(done) = current {
        records.push(done);
    }
    records
}
