//! probelens core - privacy-relevant structure from 802.11 probe requests.
//!
//! Raw probe-request records pass through a two-stage inference pipeline:
//! 1. **Instance resolution**: frames from the same transmission burst are
//!    folded into scan instances (`instances`)
//! 2. **Device resolution**: instances likely sent by the same physical
//!    device are merged across randomized MACs (`devices`), scored by the
//!    Jaccard heuristic in `similarity`
//!
//! The core is a pure batch computation: no I/O, no logging, no concurrency.
//! Capture parsing, tabular I/O and anonymization live in `probelens_io`.

pub mod devices;
pub mod instances;
pub mod metrics;
pub mod similarity;

// Re-export key types for convenience
pub use devices::{resolve_devices, Device, DeviceLinkConfig};
pub use instances::{resolve_instances, ProbeRecord, ScanInstance};
pub use metrics::DeviceStats;
pub use similarity::{jaccard, WILDCARD_SSID};
