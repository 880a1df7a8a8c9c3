//! Timestamp gate for WiFi scan batches.
//!
//! Scan completions arrive on their own schedule and may overlap or come
//! back out of order. Only a batch strictly newer than the last accepted one
//! replaces the current result set, and the replacement is a single swap of
//! an immutable [`GatedScan`].

use crate::config::SsidFilter;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// One access point as reported by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    pub bssid: String,
    pub rssi: i32,
    pub frequency_mhz: i32,
    pub last_seen: i64,
}

/// The last accepted scan after SSID filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatedScan {
    /// Scan timestamp of the accepted batch; 0 before the first acceptance.
    pub timestamp: i64,
    pub results: Vec<AccessPoint>,
}

impl GatedScan {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

pub struct WifiResultGate {
    current: RwLock<Arc<GatedScan>>,
}

impl WifiResultGate {
    pub fn new() -> Self {
        WifiResultGate {
            current: RwLock::new(Arc::new(GatedScan::default())),
        }
    }

    /// Offer a scan batch. Returns the filtered AP count if accepted, `None`
    /// if `scan_timestamp` is not newer than the current high-water mark.
    pub fn submit(
        &self,
        results: Vec<AccessPoint>,
        scan_timestamp: i64,
        filter: &SsidFilter,
    ) -> Option<usize> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if scan_timestamp <= current.timestamp {
            log::debug!(
                "[wifi] dropping scan at {} (last accepted {})",
                scan_timestamp,
                current.timestamp
            );
            return None;
        }

        let total = results.len();
        let filtered: Vec<AccessPoint> = results
            .into_iter()
            .filter(|ap| filter.matches(&ap.ssid))
            .collect();
        let count = filtered.len();

        *current = Arc::new(GatedScan {
            timestamp: scan_timestamp,
            results: filtered,
        });

        log::debug!(
            "[wifi] accepted scan at {}: {}/{} APs match '{}'",
            scan_timestamp,
            count,
            total,
            filter.pattern()
        );
        Some(count)
    }

    /// The current gated scan. Holding the returned `Arc` keeps a consistent
    /// view even if a newer scan is accepted meanwhile.
    pub fn current(&self) -> Arc<GatedScan> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*current)
    }

    pub fn last_successful_timestamp(&self) -> i64 {
        self.current().timestamp
    }

    pub fn detected_ap_count(&self) -> usize {
        self.current().len()
    }
}

impl Default for WifiResultGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ap(ssid: &str, rssi: i32) -> AccessPoint {
        AccessPoint {
            ssid: ssid.to_string(),
            bssid: format!("00:11:22:33:44:{:02x}", rssi.unsigned_abs() as u8),
            rssi,
            frequency_mhz: 2412,
            last_seen: 0,
        }
    }

    fn filter() -> SsidFilter {
        SsidFilter::new("TA.*").unwrap()
    }

    #[test]
    fn test_monotonic_acceptance() {
        let gate = WifiResultGate::new();
        let filter = filter();
        let mut accepted = Vec::new();

        for ts in [5, 3, 10, 7] {
            if gate.submit(vec![ap("TA-1", -50)], ts, &filter).is_some() {
                accepted.push(gate.last_successful_timestamp());
            }
        }

        assert_eq!(accepted, vec![5, 10]);
        assert_eq!(gate.last_successful_timestamp(), 10);
    }

    #[test]
    fn test_equal_timestamp_rejected() {
        let gate = WifiResultGate::new();
        let filter = filter();
        assert_eq!(gate.submit(vec![ap("TA-1", -40)], 7, &filter), Some(1));
        assert_eq!(
            gate.submit(vec![ap("TA-1", -40), ap("TA-2", -41)], 7, &filter),
            None
        );
        assert_eq!(gate.detected_ap_count(), 1);
    }

    #[test]
    fn test_non_positive_timestamp_rejected_initially() {
        let gate = WifiResultGate::new();
        assert_eq!(gate.submit(vec![ap("TA-1", -40)], 0, &filter()), None);
        assert!(gate.current().is_empty());
    }

    #[test]
    fn test_filtering_by_pattern() {
        let gate = WifiResultGate::new();
        let results = vec![ap("TA-1", -40), ap("eduroam", -60), ap("TA-2", -70), ap("xTA", -80)];
        assert_eq!(gate.submit(results, 1, &filter()), Some(2));

        let current = gate.current();
        let ssids: Vec<&str> = current.results.iter().map(|a| a.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["TA-1", "TA-2"]);
    }

    #[test]
    fn test_accepted_empty_scan_clears_results() {
        let gate = WifiResultGate::new();
        let filter = filter();
        gate.submit(vec![ap("TA-1", -40)], 1, &filter);
        assert_eq!(gate.submit(vec![ap("other", -40)], 2, &filter), Some(0));
        assert!(gate.current().is_empty());
        assert_eq!(gate.last_successful_timestamp(), 2);
    }

    #[test]
    fn test_reader_holds_consistent_snapshot() {
        let gate = WifiResultGate::new();
        let filter = filter();
        gate.submit(vec![ap("TA-1", -40), ap("TA-2", -41)], 1, &filter);

        let held = gate.current();
        gate.submit(vec![ap("TA-3", -42)], 2, &filter);

        assert_eq!(held.timestamp, 1);
        assert_eq!(held.len(), 2);
        assert_eq!(gate.current().len(), 1);
    }

    #[test]
    fn test_concurrent_submit_and_read() {
        let gate = Arc::new(WifiResultGate::new());
        let writer = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let filter = SsidFilter::new("TA.*").unwrap();
                for ts in 1..500i64 {
                    let n = (ts % 5) as usize + 1;
                    let results = (0..n)
                        .map(|i| AccessPoint {
                            ssid: format!("TA-{}", i),
                            bssid: String::new(),
                            rssi: -50,
                            frequency_mhz: 2412,
                            last_seen: ts,
                        })
                        .collect();
                    gate.submit(results, ts, &filter);
                }
            })
        };

        for _ in 0..500 {
            let scan = gate.current();
            // Every AP in an accepted batch carries that batch's timestamp.
            assert!(scan.results.iter().all(|a| a.last_seen == scan.timestamp));
        }
        writer.join().unwrap();
        assert_eq!(gate.last_successful_timestamp(), 499);
    }
}
