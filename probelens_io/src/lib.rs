//! probelens I/O boundary - the "external collaborator" surfaces.
//!
//! The core pipeline is pure; everything that touches the filesystem lives
//! here: reading the probe-record CSV the capture stage produces, writing
//! the instance and device tables, and the salted-hash anonymizer applied
//! before tables leave the premises.

pub mod anonymize;
pub mod error;
pub mod tables;

pub use anonymize::Anonymizer;
pub use error::TableError;
pub use tables::{
    read_instances, read_probe_records, write_devices, write_instances, ProbeImport,
};
