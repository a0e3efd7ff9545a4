//! Device identification - merging scan instances across randomized MACs.
//!
//! Each instance starts as its own singleton device. Every unordered pair of
//! instances is then tested with the same-device predicate and matching pairs
//! are merged, union-find style: the slot holding the pair's first instance
//! absorbs the other, the loser is tombstoned in place so slot indices stay
//! stable while the pairwise loop keeps running, and a final compaction pass
//! drops the tombstones.
//!
//! The pairwise pass is O(n²) in the instance count. That is acceptable
//! because instances are orders of magnitude fewer than raw frames, but it
//! is the scaling limit of this stage; canopy pre-bucketing by MAC or IE
//! fingerprint would cut it down if that ever changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::instances::ScanInstance;
use crate::similarity::jaccard;

/// Minimum number of informative SSIDs an instance must disclose before it
/// is worth attempting identity linking at all.
pub const MIN_LINKABLE_SSIDS: usize = 2;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the device resolver.
#[derive(Debug, Clone)]
pub struct DeviceLinkConfig {
    /// Jaccard score two SSID sets must *exceed* (strictly) for the
    /// IE-fingerprint rule to merge two instances (default: 0.5)
    pub similarity_threshold: f64,
}

impl Default for DeviceLinkConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
        }
    }
}

// ============================================================================
// DEVICE
// ============================================================================

/// A physical device hypothesized behind one or more scan instances.
///
/// `has_wps`, `uuid_e` and `ie_fingerprint` are frozen from the surviving
/// slot's seed instance and never revised by merges, even when absorbed
/// instances disagree. Which slot survives depends on the merge order, so
/// the seed is not always the lowest-index member. Known provenance quirk,
/// preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// MAC addresses in first-seen order, duplicates suppressed
    pub macs: Vec<String>,
    pub has_wps: bool,
    pub uuid_e: String,
    pub ie_fingerprint: String,
    /// Union of member instances' SSID sets
    pub ssids: BTreeSet<String>,
    /// Original indices of the member instances (bookkeeping)
    pub instance_indices: BTreeSet<usize>,
}

impl Device {
    fn seeded_from(index: usize, instance: &ScanInstance) -> Self {
        Self {
            macs: vec![instance.mac.clone()],
            has_wps: instance.has_wps,
            uuid_e: instance.uuid_e.clone(),
            ie_fingerprint: instance.ie_fingerprint.clone(),
            ssids: instance.ssids.clone(),
            instance_indices: BTreeSet::from([index]),
        }
    }

    /// Absorbs `other` into this device: MACs are unioned preserving
    /// first-seen order, SSID sets and instance indices are unioned.
    fn absorb(&mut self, other: Device) {
        for mac in other.macs {
            if !self.macs.contains(&mac) {
                self.macs.push(mac);
            }
        }
        self.ssids.extend(other.ssids);
        self.instance_indices.extend(other.instance_indices);
    }

    /// Number of scan instances merged into this device.
    pub fn instance_count(&self) -> usize {
        self.instance_indices.len()
    }
}

// ============================================================================
// SAME-DEVICE PREDICATE
// ============================================================================

/// Pairwise same-device test. Rule order matters:
///
/// 1. Identical MAC is definitive.
/// 2. If both instances carry WPS, the UUID-E comparison is authoritative
///    in *both* directions - a mismatch is a hard negative that must not
///    fall through to the fingerprint rule.
/// 3. Matching IE fingerprints merge only when SSID similarity strictly
///    exceeds the threshold.
pub fn same_device(a: &ScanInstance, b: &ScanInstance, threshold: f64) -> bool {
    if a.mac == b.mac {
        return true;
    }

    if a.has_wps && b.has_wps {
        return a.uuid_e == b.uuid_e;
    }

    if a.ie_fingerprint == b.ie_fingerprint {
        return jaccard(&a.ssids, &b.ssids) > threshold;
    }

    false
}

/// Caller-side pre-filter: instances disclosing fewer than
/// [`MIN_LINKABLE_SSIDS`] informative SSIDs carry too little signal for
/// identity linking and are excluded before the pairwise pass.
pub fn eligible_for_linking(instance: &ScanInstance) -> bool {
    instance.informative_ssid_count() >= MIN_LINKABLE_SSIDS
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Merges scan instances into devices.
///
/// The input is taken as-is; callers running the full pipeline apply
/// [`eligible_for_linking`] first. Every instance index appears in exactly
/// one emitted device. Zero instances yield zero devices.
pub fn resolve_devices(instances: &[ScanInstance], config: &DeviceLinkConfig) -> Vec<Device> {
    // Arena of device slots. Merged-away slots become None instead of being
    // removed, so slot indices stay valid for the rest of the double loop.
    let mut slots: Vec<Option<Device>> = instances
        .iter()
        .enumerate()
        .map(|(i, inst)| Some(Device::seeded_from(i, inst)))
        .collect();

    // instance index -> current slot
    let mut slot_of: Vec<usize> = (0..instances.len()).collect();

    for i in 0..instances.len() {
        for j in (i + 1)..instances.len() {
            if slot_of[i] == slot_of[j] {
                continue;
            }
            if !same_device(&instances[i], &instances[j], config.similarity_threshold) {
                continue;
            }

            let winner = slot_of[i];
            let loser = slot_of[j];

            // Tombstone the loser and fold its members into the winner.
            let absorbed = slots[loser]
                .take()
                .expect("live slot map points at a tombstoned device");
            for &member in &absorbed.instance_indices {
                slot_of[member] = winner;
            }
            slots[winner]
                .as_mut()
                .expect("winner slot tombstoned while still mapped")
                .absorb(absorbed);
        }
    }

    // Compaction: drop tombstones, keep arena order.
    slots.into_iter().flatten().collect()
}

// ============================================================================
// TESTS
// ============================================================================
