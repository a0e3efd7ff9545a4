//! SSID-set similarity.
//!
//! Probe requests may name the networks a client prefers. Two bursts that
//! ask for mostly the same networks were plausibly sent by the same device;
//! the device resolver scores that overlap with the Jaccard ratio computed
//! here, and both stages share the informative-SSID filter.

use std::collections::BTreeSet;

/// Sentinel SSID for an undirected (broadcast) probe. Carries no preference
/// information, so it never participates in similarity.
pub const WILDCARD_SSID: &str = "Wildcard";

/// Returns true for SSID values that carry identity signal: non-empty and
/// not the broadcast wildcard.
#[inline]
pub fn is_informative_ssid(ssid: &str) -> bool {
    !ssid.is_empty() && ssid != WILDCARD_SSID
}

/// Jaccard similarity of two SSID sets, in `[0.0, 1.0]`.
///
/// Both inputs are first stripped of empty strings and [`WILDCARD_SSID`].
/// If either cleaned set is empty the result is `0.0` - with no disclosed
/// preference on one side there is no meaningful comparison, and the floor
/// is deliberate rather than an error.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let cleaned_a: BTreeSet<&str> = a
        .iter()
        .map(String::as_str)
        .filter(|s| is_informative_ssid(s))
        .collect();
    let cleaned_b: BTreeSet<&str> = b
        .iter()
        .map(String::as_str)
        .filter(|s| is_informative_ssid(s))
        .collect();

    if cleaned_a.is_empty() || cleaned_b.is_empty() {
        return 0.0;
    }

    let intersection = cleaned_a.intersection(&cleaned_b).count();
    let union = cleaned_a.union(&cleaned_b).count();

    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_set_floors_to_zero() {
        assert_eq!(jaccard(&set(&[]), &set(&["home"])), 0.0);
        assert_eq!(jaccard(&set(&["home"]), &set(&[])), 0.0);
        assert_eq!(jaccard(&set(&[]), &set(&[])), 0.0);
    }

    #[test]
    fn test_identical_singletons() {
        assert_relative_eq!(jaccard(&set(&["a"]), &set(&["a"])), 1.0);
    }

    #[test]
    fn test_partial_overlap() {
        // |{b}| / |{a,b,c}| = 1/3
        assert_relative_eq!(
            jaccard(&set(&["a", "b"]), &set(&["b", "c"])),
            1.0 / 3.0
        );
    }

    #[test]
    fn test_wildcard_never_counts() {
        assert_eq!(jaccard(&set(&["Wildcard"]), &set(&["Wildcard"])), 0.0);
        // Wildcard on one side must not inflate the union either
        assert_relative_eq!(
            jaccard(&set(&["a", "Wildcard"]), &set(&["a"])),
            1.0
        );
    }

    #[test]
    fn test_empty_strings_stripped() {
        assert_relative_eq!(jaccard(&set(&["a", ""]), &set(&["a"])), 1.0);
    }

    #[test]
    fn test_order_independence() {
        let left = set(&["x", "y", "z"]);
        let right = set(&["z", "y", "q"]);
        assert_relative_eq!(jaccard(&left, &right), jaccard(&right, &left));
    }
}
