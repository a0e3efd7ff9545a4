//! Summary statistics over a resolved device table.
//!
//! The resolvers stay silent; callers compute these figures once at the end
//! of a run and report them however they like (the CLI logs them).

use crate::devices::Device;
use crate::similarity::is_informative_ssid;

/// Aggregate figures for one device-resolution run.
#[derive(Debug, Clone, Default)]
pub struct DeviceStats {
    /// Devices emitted after compaction
    pub device_count: usize,
    /// Scan instances consumed across all devices
    pub instance_count: usize,
    /// Devices that aggregate more than one MAC address
    pub multi_mac_devices: usize,
    /// Largest MAC set observed on a single device
    pub max_macs: usize,
    /// Sum of informative SSIDs across devices (for the average)
    total_ssids: usize,
    /// Largest informative SSID set observed on a single device
    pub max_ssids: usize,
}

impl DeviceStats {
    /// Computes statistics over a final device table.
    pub fn from_devices(devices: &[Device]) -> Self {
        let mut stats = Self {
            device_count: devices.len(),
            ..Self::default()
        };

        for device in devices {
            stats.instance_count += device.instance_count();

            let ssids = device
                .ssids
                .iter()
                .filter(|s| is_informative_ssid(s))
                .count();
            stats.total_ssids += ssids;
            stats.max_ssids = stats.max_ssids.max(ssids);

            if device.macs.len() > 1 {
                stats.multi_mac_devices += 1;
            }
            stats.max_macs = stats.max_macs.max(device.macs.len());
        }

        stats
    }

    /// Average informative SSIDs per device.
    pub fn avg_ssids(&self) -> f64 {
        if self.device_count > 0 {
            self.total_ssids as f64 / self.device_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of devices linking more than one MAC, as a percentage.
    pub fn multi_mac_rate(&self) -> f64 {
        if self.device_count > 0 {
            self.multi_mac_devices as f64 / self.device_count as f64 * 100.0
        } else {
            0.0
        }
    }
}
