//! Flat tabular I/O for the pipeline stages.
//!
//! The capture stage hands us probe requests as a CSV with header
//! `DATE,TIME,MAC,HAS_WPS,UUID-E,IE,SN,SSID` (a trailing `RSSI` column and
//! any other extras are tolerated and ignored). Booleans use the capture
//! tool's `True`/`False` spelling; lowercase is accepted too. The writers
//! emit the instance and device tables in the same dialect.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::path::Path;

use probelens_core::devices::Device;
use probelens_core::instances::{ProbeRecord, ScanInstance};
use probelens_core::similarity::is_informative_ssid;

use crate::error::TableError;

/// Mandatory probe-table columns, in contract order.
const PROBE_COLUMNS: [&str; 8] = [
    "DATE", "TIME", "MAC", "HAS_WPS", "UUID-E", "IE", "SN", "SSID",
];

const INSTANCE_COLUMNS: [&str; 5] = ["MAC", "HAS_WPS", "UUID-E", "IE", "SSIDs"];

const DEVICE_COLUMNS: [&str; 6] = [
    "MACs",
    "HAS_WPS",
    "UUID-E",
    "IE",
    "SSIDs",
    "instance_count",
];

/// Result of one probe-table read.
#[derive(Debug)]
pub struct ProbeImport {
    /// Records accepted, in file order
    pub records: Vec<ProbeRecord>,
    /// Rows dropped for lacking a MAC address
    pub skipped_rows: usize,
}

/// Maps mandatory column names to their positions in the header row.
fn column_indices(header: &StringRecord) -> Result<[usize; 8], TableError> {
    let mut indices = [0usize; 8];
    for (slot, name) in PROBE_COLUMNS.iter().enumerate() {
        indices[slot] = header
            .iter()
            .position(|h| h == *name)
            .ok_or_else(|| TableError::missing_column(*name))?;
    }
    Ok(indices)
}

fn field<'r>(row: &'r StringRecord, idx: usize) -> &'r str {
    row.get(idx).unwrap_or("")
}

/// Reads a probe-record table.
///
/// Rows without a MAC address are skipped and counted, never fatal. An
/// unparseable sequence number becomes `None` (the sequence rule simply
/// cannot fire for that record).
pub fn read_probe_records(path: &Path) -> Result<ProbeImport, TableError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let [date, time, mac, has_wps, uuid_e, ie, sn, ssid] = column_indices(reader.headers()?)?;

    let mut records = Vec::new();
    let mut skipped_rows = 0;

    for row in reader.records() {
        let row = row?;

        let mac_value = field(&row, mac);
        if mac_value.is_empty() {
            skipped_rows += 1;
            continue;
        }

        records.push(ProbeRecord {
            mac: mac_value.to_string(),
            date: field(&row, date).to_string(),
            time: field(&row, time).to_string(),
            has_wps: field(&row, has_wps).eq_ignore_ascii_case("true"),
            uuid_e: field(&row, uuid_e).to_string(),
            ie_fingerprint: field(&row, ie).to_string(),
            sequence_number: field(&row, sn).trim().parse::<i64>().ok(),
            ssid: field(&row, ssid).to_string(),
        });
    }

    Ok(ProbeImport {
        records,
        skipped_rows,
    })
}

/// Reads a scan-instance table previously written by [`write_instances`].
///
/// The `SSIDs` field is comma-split; empty and wildcard fragments are
/// dropped so read-back instances satisfy the same storage invariant the
/// resolver establishes. Tables from older extractors may carry the
/// literal `Wildcard`. No eligibility filtering happens here - that is the
/// device stage's policy.
pub fn read_instances(path: &Path) -> Result<Vec<ScanInstance>, TableError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let header = reader.headers()?.clone();
    let mut indices = [0usize; 5];
    for (slot, name) in INSTANCE_COLUMNS.iter().enumerate() {
        indices[slot] = header
            .iter()
            .position(|h| h == *name)
            .ok_or_else(|| TableError::missing_column(*name))?;
    }
    let [mac, has_wps, uuid_e, ie, ssids] = indices;

    let mut instances = Vec::new();
    for row in reader.records() {
        let row = row?;
        instances.push(ScanInstance {
            mac: field(&row, mac).to_string(),
            has_wps: field(&row, has_wps).eq_ignore_ascii_case("true"),
            uuid_e: field(&row, uuid_e).to_string(),
            ie_fingerprint: field(&row, ie).to_string(),
            ssids: field(&row, ssids)
                .split(',')
                .filter(|s| is_informative_ssid(s))
                .map(|s| s.to_string())
                .collect(),
        });
    }

    Ok(instances)
}

fn bool_field(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn join_ssids(instance_ssids: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    instance_ssids
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Writes the scan-instance table (`MAC,HAS_WPS,UUID-E,IE,SSIDs`).
pub fn write_instances(path: &Path, instances: &[ScanInstance]) -> Result<(), TableError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(INSTANCE_COLUMNS)?;

    for instance in instances {
        let ssids = join_ssids(&instance.ssids);
        writer.write_record([
            instance.mac.as_str(),
            bool_field(instance.has_wps),
            instance.uuid_e.as_str(),
            instance.ie_fingerprint.as_str(),
            ssids.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the device table (`MACs,HAS_WPS,UUID-E,IE,SSIDs,instance_count`).
pub fn write_devices(path: &Path, devices: &[Device]) -> Result<(), TableError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(DEVICE_COLUMNS)?;

    for device in devices {
        let macs = device.macs.join(",");
        let ssids = join_ssids(&device.ssids);
        let instance_count = device.instance_count().to_string();
        writer.write_record([
            macs.as_str(),
            bool_field(device.has_wps),
            device.uuid_e.as_str(),
            device.ie_fingerprint.as_str(),
            ssids.as_str(),
            instance_count.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
