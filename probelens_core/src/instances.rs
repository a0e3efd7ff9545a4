//! Scan-instance identification.
//!
//! A scan instance is one contiguous probing burst attributable to a single
//! radio session. Records sharing a MAC address are folded together when the
//! same-instance predicate holds against the burst's seed record:
//!
//! 1. WPS rule: both records carry WPS and the same UUID-E.
//! 2. Sequence rule: identical information-element fingerprint and a
//!    sequence number strictly inside `(seed.sn, seed.sn + 5)`.
//!
//! The predicate is evaluated seed-vs-candidate, never candidate-vs-member.
//! A later record joins an instance if it matches the *seed*, even when it
//! would not match another already-joined member. This ordering sensitivity
//! is observable behaviour inherited from the reference pipeline and must
//! not be "fixed" into a symmetric predicate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::similarity::is_informative_ssid;

/// Sequence-rule window: a candidate joins when
/// `seed.sn < candidate.sn < seed.sn + SEQUENCE_WINDOW`.
pub const SEQUENCE_WINDOW: i64 = 5;

// ============================================================================
// INPUT RECORD
// ============================================================================

/// One probe request, as handed over by the capture/extraction collaborator.
///
/// Immutable input: the resolver never rewrites records, it only groups them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRecord {
    /// Transmitter MAC address (possibly randomized per burst)
    pub mac: String,

    /// Capture date, `YYYY-MM-DD`
    pub date: String,

    /// Capture time of day, millisecond precision
    pub time: String,

    /// Whether the frame carried a WPS vendor information element
    pub has_wps: bool,

    /// WPS UUID-E attribute, empty when absent
    pub uuid_e: String,

    /// Signature of the ordered 802.11 information elements
    pub ie_fingerprint: String,

    /// 12-bit frame sequence number; `None` when unavailable or unparseable
    pub sequence_number: Option<i64>,

    /// Requested network name; empty or `"Wildcard"` for undirected probes
    pub ssid: String,
}

impl ProbeRecord {
    /// Identity key used to suppress duplicate physical records: two rows
    /// with the same MAC and timestamp are the same frame.
    fn dedup_key(&self) -> (String, String, String) {
        (self.date.clone(), self.time.clone(), self.mac.clone())
    }
}

// ============================================================================
// SCAN INSTANCE
// ============================================================================

/// One probing burst by one radio session.
///
/// `has_wps`, `uuid_e` and `ie_fingerprint` are frozen from the seed record;
/// folded members are not re-validated against them. `ssids` is the union of
/// informative SSIDs (empty and wildcard excluded) across all members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanInstance {
    pub mac: String,
    pub has_wps: bool,
    pub uuid_e: String,
    pub ie_fingerprint: String,
    pub ssids: BTreeSet<String>,
}

impl ScanInstance {
    fn seeded_from(record: &ProbeRecord) -> Self {
        let mut ssids = BTreeSet::new();
        if is_informative_ssid(&record.ssid) {
            ssids.insert(record.ssid.clone());
        }
        Self {
            mac: record.mac.clone(),
            has_wps: record.has_wps,
            uuid_e: record.uuid_e.clone(),
            ie_fingerprint: record.ie_fingerprint.clone(),
            ssids,
        }
    }

    fn fold(&mut self, record: &ProbeRecord) {
        if is_informative_ssid(&record.ssid) {
            self.ssids.insert(record.ssid.clone());
        }
    }

    /// Number of SSIDs that carry identity signal. The resolver excludes
    /// wildcard and empty values at fold time, but instances deserialized
    /// from elsewhere may still carry them, so the count filters instead of
    /// trusting the set size.
    pub fn informative_ssid_count(&self) -> usize {
        self.ssids
            .iter()
            .filter(|s| is_informative_ssid(s))
            .count()
    }
}

// ============================================================================
// SAME-INSTANCE PREDICATE
// ============================================================================

/// Decides whether `candidate` belongs to the burst seeded by `seed`.
///
/// Callers guarantee both records share a MAC address; the predicate does
/// not re-check it.
///
/// The sequence rule compares plain integers with no 12-bit wraparound
/// handling: a burst crossing 4095 -> 0 is split into two instances. Known
/// limitation, preserved on purpose.
pub fn same_instance(seed: &ProbeRecord, candidate: &ProbeRecord) -> bool {
    // WPS rule: a shared UUID-E between two WPS frames is definitive.
    if seed.has_wps && candidate.has_wps && seed.uuid_e == candidate.uuid_e {
        return true;
    }

    // Sequence rule: same chipset signature, sequence number strictly
    // inside the seed's window. Unparseable sequence numbers disable the
    // rule (non-match, not an error).
    if seed.ie_fingerprint == candidate.ie_fingerprint {
        if let (Some(sn1), Some(sn2)) = (seed.sequence_number, candidate.sequence_number) {
            if sn1 < sn2 && sn2 < sn1 + SEQUENCE_WINDOW {
                return true;
            }
        }
    }

    false
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Groups probe records into scan instances.
///
/// Records are partitioned by MAC (grouping has no cross-MAC effect), then
/// greedily clustered in original order: each unprocessed record opens a new
/// instance and absorbs every later unprocessed record in its MAC group that
/// matches it as seed. Duplicate rows - identical `(date, time, mac)` - are
/// consumed by their first occurrence and never seed or join again.
///
/// Empty input yields empty output.
pub fn resolve_instances(records: &[ProbeRecord]) -> Vec<ScanInstance> {
    // Partition by MAC, preserving first-appearance group order and the
    // original record order inside each group.
    let mut group_index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&ProbeRecord>> = Vec::new();
    for record in records {
        match group_index.get(record.mac.as_str()) {
            Some(&idx) => groups[idx].push(record),
            None => {
                group_index.insert(record.mac.as_str(), groups.len());
                groups.push(vec![record]);
            }
        }
    }

    let mut instances = Vec::new();
    let mut processed: HashSet<(String, String, String)> = HashSet::new();

    for group in &groups {
        for (i, seed) in group.iter().enumerate() {
            let seed_key = seed.dedup_key();
            if processed.contains(&seed_key) {
                continue;
            }
            processed.insert(seed_key);

            let mut instance = ScanInstance::seeded_from(seed);

            for (j, candidate) in group.iter().enumerate() {
                if i == j {
                    continue;
                }
                let key = candidate.dedup_key();
                if processed.contains(&key) {
                    continue;
                }
                if same_instance(seed, candidate) {
                    processed.insert(key);
                    instance.fold(candidate);
                }
            }

            instances.push(instance);
        }
    }

    instances
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(mac: &str, sn: i64, ssid: &str) -> ProbeRecord {
        ProbeRecord {
            mac: mac.to_string(),
            date: "2025-03-14".to_string(),
            time: format!("10:00:{:02}.000", sn.rem_euclid(60)),
            has_wps: false,
            uuid_e: String::new(),
            ie_fingerprint: "0:0,1:8,50:4".to_string(),
            sequence_number: Some(sn),
            ssid: ssid.to_string(),
        }
    }

    fn wps_record(mac: &str, uuid_e: &str, sn: Option<i64>) -> ProbeRecord {
        // Distinct timestamps keep the dedup key from collapsing the rows.
        ProbeRecord {
            has_wps: true,
            uuid_e: uuid_e.to_string(),
            sequence_number: sn,
            ..record(mac, sn.unwrap_or(59), "")
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(resolve_instances(&[]).is_empty());
    }

    #[test]
    fn test_sequence_window_inside() {
        // sn 10 and 12: 10 < 12 < 15, same burst
        let records = vec![record("aa:bb", 10, "home"), record("aa:bb", 12, "cafe")];
        let instances = resolve_instances(&records);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].ssids.len(), 2);
    }

    #[test]
    fn test_sequence_window_boundary() {
        // sn 10 and 15: 15 is not strictly below 10 + 5, different bursts
        let records = vec![record("aa:bb", 10, "home"), record("aa:bb", 15, "cafe")];
        assert_eq!(resolve_instances(&records).len(), 2);

        // sn 10 and 16 likewise
        let records = vec![record("aa:bb", 10, "home"), record("aa:bb", 16, "cafe")];
        assert_eq!(resolve_instances(&records).len(), 2);

        // sn 10 and 14 is the last joining offset
        let records = vec![record("aa:bb", 10, "home"), record("aa:bb", 14, "cafe")];
        assert_eq!(resolve_instances(&records).len(), 1);
    }

    #[test]
    fn test_sequence_rule_is_directional() {
        // Candidate sn below the seed's never joins; the window opens forward.
        let records = vec![record("aa:bb", 12, "home"), record("aa:bb", 10, "cafe")];
        assert_eq!(resolve_instances(&records).len(), 2);
    }

    #[test]
    fn test_wps_rule_ignores_sequence_numbers() {
        let records = vec![
            wps_record("aa:bb", "uuid-1", Some(10)),
            wps_record("aa:bb", "uuid-1", Some(4000)),
            wps_record("aa:bb", "uuid-1", None),
        ];
        assert_eq!(resolve_instances(&records).len(), 1);
    }

    #[test]
    fn test_wps_rule_requires_both_wps() {
        let mut non_wps = wps_record("aa:bb", "uuid-1", Some(500));
        non_wps.has_wps = false;
        let records = vec![wps_record("aa:bb", "uuid-1", Some(10)), non_wps];
        assert_eq!(resolve_instances(&records).len(), 2);
    }

    #[test]
    fn test_missing_sequence_number_disables_sequence_rule() {
        let mut r1 = record("aa:bb", 10, "home");
        r1.sequence_number = None;
        let records = vec![r1, record("aa:bb", 12, "cafe")];
        assert_eq!(resolve_instances(&records).len(), 2);
    }

    #[test]
    fn test_no_cross_mac_grouping() {
        let records = vec![record("aa:bb", 10, "home"), record("cc:dd", 11, "home")];
        assert_eq!(resolve_instances(&records).len(), 2);
    }

    #[test]
    fn test_duplicate_rows_consumed_once() {
        let twin = record("aa:bb", 10, "home");
        let records = vec![twin.clone(), twin, record("aa:bb", 30, "cafe")];
        let instances = resolve_instances(&records);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].ssids.len(), 1);
    }

    #[test]
    fn test_seed_fields_frozen() {
        let mut r2 = record("aa:bb", 12, "cafe");
        r2.uuid_e = "later-uuid".to_string();
        let records = vec![record("aa:bb", 10, "home"), r2];
        let instances = resolve_instances(&records);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].uuid_e, "");
    }

    #[test]
    fn test_wildcard_and_empty_ssids_not_stored() {
        let records = vec![
            record("aa:bb", 10, "Wildcard"),
            record("aa:bb", 12, ""),
            record("aa:bb", 13, "home"),
        ];
        let instances = resolve_instances(&records);
        assert_eq!(instances.len(), 1);
        assert_eq!(
            instances[0].ssids.iter().collect::<Vec<_>>(),
            vec!["home"]
        );
    }

    #[test]
    fn test_asymmetric_folding_uses_seed_only() {
        // sn 10, 13, 16: both 13 and 16 are checked against the seed (10).
        // 13 joins; 16 does not (not < 15), even though 13 < 16 < 18 would
        // hold member-vs-candidate. 16 then seeds its own instance.
        let records = vec![
            record("aa:bb", 10, "a"),
            record("aa:bb", 13, "b"),
            record("aa:bb", 16, "c"),
        ];
        let instances = resolve_instances(&records);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].ssids.len(), 2);
        assert_eq!(instances[1].ssids.len(), 1);
    }

    proptest! {
        /// Every non-duplicate record lands in exactly one instance. Each
        /// record is given a unique SSID so membership is observable: the
        /// instance SSID sets must partition the full SSID population.
        #[test]
        fn prop_instances_partition_records(
            sns in proptest::collection::vec(0i64..64, 1..40),
            macs in proptest::collection::vec(0u8..4, 1..40),
        ) {
            let n = sns.len().min(macs.len());
            let records: Vec<ProbeRecord> = (0..n)
                .map(|k| {
                    let mut r = record(
                        &format!("02:00:00:00:00:{:02x}", macs[k]),
                        sns[k],
                        &format!("net-{}", k),
                    );
                    // Make the dedup key unique per row
                    r.time = format!("10:{:02}:{:02}.000", k / 60, k % 60);
                    r
                })
                .collect();

            let instances = resolve_instances(&records);
            prop_assert!(!instances.is_empty());

            let total_ssids: usize = instances.iter().map(|i| i.ssids.len()).sum();
            let union: BTreeSet<&String> =
                instances.iter().flat_map(|i| i.ssids.iter()).collect();

            // No record lost, none folded twice
            prop_assert_eq!(total_ssids, n);
            prop_assert_eq!(union.len(), n);

            // Instances never mix MACs
            for inst in &instances {
                for ssid in &inst.ssids {
                    let k: usize = ssid.trim_start_matches("net-").parse().unwrap();
                    prop_assert_eq!(&records[k].mac, &inst.mac);
                }
            }
        }
    }
}
