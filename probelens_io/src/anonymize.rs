//! Salted-hash anonymization of probe tables before external release.
//!
//! MAC addresses keep their vendor half (OUI) and get a hash-derived tail;
//! SSIDs become opaque `SSID_xxxxxxxx` labels. One salt is drawn per run, so
//! the mapping is consistent within a run and unlinkable across runs. The
//! wildcard sentinel is left untouched - it names no network.

use csv::{ReaderBuilder, WriterBuilder};
use sha2::{Digest, Sha256};
use std::path::Path;

use probelens_core::similarity::WILDCARD_SSID;

use crate::error::TableError;

/// Hex digits kept from each digest.
const HASH_PREFIX_LEN: usize = 8;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Holds the per-run salt and applies the rewrite rules.
pub struct Anonymizer {
    salt: String,
}

impl Anonymizer {
    /// Creates an anonymizer with a fresh random 16-byte salt.
    pub fn new() -> Self {
        let salt_bytes: [u8; 16] = rand::random();
        Self {
            salt: to_hex(&salt_bytes),
        }
    }

    /// Creates an anonymizer with a caller-supplied salt (reproducible runs,
    /// tests).
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// First [`HASH_PREFIX_LEN`] hex chars of `SHA-256(salt || value)`.
    fn hash8(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(value.as_bytes());
        let digest = hasher.finalize();
        let mut hex = to_hex(&digest);
        hex.truncate(HASH_PREFIX_LEN);
        hex
    }

    /// Rewrites the second half of a colon-separated MAC address with three
    /// pseudo-octets derived from its hash. The OUI half stays intact so
    /// vendor-level analysis still works on the anonymized table.
    pub fn anonymize_mac(&self, mac: &str) -> String {
        let parts: Vec<&str> = mac.split(':').collect();
        let split = parts.len().min(3);
        let first_half = parts[..split].join(":");
        let second_half = parts[split..].join(":");
        let hash = self.hash8(&second_half);
        format!(
            "{}:{}:{}:{}",
            first_half,
            &hash[0..2],
            &hash[2..4],
            &hash[4..6]
        )
    }

    /// Rewrites an SSID to `SSID_<hash>`; empty and wildcard values pass
    /// through unchanged.
    pub fn anonymize_ssid(&self, ssid: &str) -> String {
        if ssid.is_empty() || ssid == WILDCARD_SSID {
            return ssid.to_string();
        }
        format!("SSID_{}", self.hash8(ssid))
    }

    /// Rewrites the `MAC` and `SSID` columns of a probe-record CSV, copying
    /// every other column verbatim. Rows are not filtered here; this runs
    /// before or after resolution, never inside it.
    pub fn anonymize_probe_csv(&self, input: &Path, output: &Path) -> Result<(), TableError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(input)?;
        let mut writer = WriterBuilder::new().flexible(true).from_path(output)?;

        let header = reader.headers()?.clone();
        let mac_idx = header
            .iter()
            .position(|h| h == "MAC")
            .ok_or_else(|| TableError::missing_column("MAC"))?;
        let ssid_idx = header
            .iter()
            .position(|h| h == "SSID")
            .ok_or_else(|| TableError::missing_column("SSID"))?;

        writer.write_record(&header)?;

        for row in reader.records() {
            let row = row?;
            let rewritten: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(idx, value)| {
                    if idx == mac_idx && !value.is_empty() {
                        self.anonymize_mac(value)
                    } else if idx == ssid_idx {
                        self.anonymize_ssid(value)
                    } else {
                        value.to_string()
                    }
                })
                .collect();
            writer.write_record(&rewritten)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mac_keeps_oui() {
        let anon = Anonymizer::with_salt("fixed");
        let result = anon.anonymize_mac("a4:5e:60:c1:d2:e3");
        assert!(result.starts_with("a4:5e:60:"));
        assert_ne!(result, "a4:5e:60:c1:d2:e3");
        // Three pseudo-octets of two hex chars each
        assert_eq!(result.split(':').count(), 6);
    }

    #[test]
    fn test_mac_deterministic_per_salt() {
        let a = Anonymizer::with_salt("fixed");
        let b = Anonymizer::with_salt("fixed");
        assert_eq!(a.anonymize_mac("a4:5e:60:c1:d2:e3"), b.anonymize_mac("a4:5e:60:c1:d2:e3"));

        let c = Anonymizer::with_salt("other");
        assert_ne!(a.anonymize_mac("a4:5e:60:c1:d2:e3"), c.anonymize_mac("a4:5e:60:c1:d2:e3"));
    }

    #[test]
    fn test_ssid_rewrite() {
        let anon = Anonymizer::with_salt("fixed");
        let result = anon.anonymize_ssid("HomeNetwork");
        assert!(result.starts_with("SSID_"));
        assert_eq!(result.len(), "SSID_".len() + 8);
    }

    #[test]
    fn test_wildcard_and_empty_pass_through() {
        let anon = Anonymizer::with_salt("fixed");
        assert_eq!(anon.anonymize_ssid("Wildcard"), "Wildcard");
        assert_eq!(anon.anonymize_ssid(""), "");
    }

    #[test]
    fn test_csv_rewrite_preserves_other_columns() {
        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, "DATE,TIME,MAC,HAS_WPS,UUID-E,IE,SN,SSID,RSSI").unwrap();
        writeln!(
            input,
            "2025-03-14,10:00:00.000,a4:5e:60:c1:d2:e3,True,uuid-1,0:0,12,HomeNetwork,-40"
        )
        .unwrap();

        let output = NamedTempFile::new().unwrap();
        let anon = Anonymizer::with_salt("fixed");
        anon.anonymize_probe_csv(input.path(), output.path()).unwrap();

        let contents = std::fs::read_to_string(output.path()).unwrap();
        let data_line = contents.lines().nth(1).unwrap();
        let fields: Vec<&str> = data_line.split(',').collect();

        assert_eq!(fields[0], "2025-03-14");
        assert!(fields[2].starts_with("a4:5e:60:"));
        assert_ne!(fields[2], "a4:5e:60:c1:d2:e3");
        assert_eq!(fields[3], "True");
        assert!(fields[7].starts_with("SSID_"));
        assert_eq!(fields[8], "-40");
    }
}
