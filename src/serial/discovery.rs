//! # Device Discovery
//!
//! Finds the rover's USB-serial devices and decides which one is the radio
//! uplink, which (if any) is the GNSS correction sink, and which channel each
//! remaining peripheral gets.
//!
//! Devices are found by scanning a directory (normally `/dev/serial/by-path`)
//! for entries whose file name starts with a platform prefix, so the mapping
//! from physical USB port to path stays stable across reboots.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::error::Result;
use crate::frame::protocol::DeviceChannel;

/// A peripheral that will get its own reader task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDevice {
    pub path: PathBuf,
    pub channel: DeviceChannel,
    /// Device on the port designated for GNSS correction data
    pub correction_sink: bool,
}

/// Result of discovery and classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredDevices {
    /// Radio link, if attached
    pub uplink: Option<PathBuf>,
    /// Peripherals with assigned channels, in channel order
    pub sensors: Vec<SensorDevice>,
    /// Peripherals beyond the channel limit
    pub skipped: Vec<PathBuf>,
}

impl DiscoveredDevices {
    /// The correction sink among the sensors, if any
    pub fn correction_sink(&self) -> Option<&SensorDevice> {
        self.sensors.iter().find(|sensor| sensor.correction_sink)
    }
}

/// Scan the configured directory and classify what was found
///
/// A missing directory means no USB-serial devices are attached and yields an
/// empty result rather than an error.
///
/// # Errors
///
/// Returns `Io` if the directory exists but cannot be read
pub fn discover_devices(config: &DiscoveryConfig, max_channels: usize) -> Result<DiscoveredDevices> {
    let paths = scan_devices(Path::new(&config.device_dir), &config.device_prefix)?;
    let mut discovered = classify_devices(paths, config, max_channels);

    // The radio may live outside the scanned directory
    if discovered.uplink.is_none() {
        if let Some(path) = configured_path(&config.uplink_path).filter(|p| p.exists()) {
            debug!("Uplink {} found outside the scan directory", path.display());
            discovered.uplink = Some(path.to_path_buf());
        }
    }

    Ok(discovered)
}

/// List entries in `dir` whose file name starts with `prefix`, sorted
pub fn scan_devices(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Device directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with(prefix))
            .unwrap_or(false);

        if matches {
            debug!("Found serial device: {}", path.display());
            paths.push(path);
        }
    }

    // Sorted so channel assignment is deterministic
    paths.sort();
    Ok(paths)
}

/// Split discovered paths into uplink and channel-numbered sensors
///
/// Channels are assigned 1..=N in path order; the uplink never consumes a
/// channel. Sensors beyond `max_channels` are reported in `skipped`.
pub fn classify_devices(
    paths: Vec<PathBuf>,
    config: &DiscoveryConfig,
    max_channels: usize,
) -> DiscoveredDevices {
    let uplink_path = configured_path(&config.uplink_path);
    let correction_path = configured_path(&config.correction_path);

    let mut discovered = DiscoveredDevices::default();

    for path in paths {
        if Some(path.as_path()) == uplink_path {
            discovered.uplink = Some(path);
            continue;
        }

        let next_id = discovered.sensors.len() + 1;
        if next_id > max_channels {
            warn!(
                "Ignoring {}: all {} channels are in use",
                path.display(),
                max_channels
            );
            discovered.skipped.push(path);
            continue;
        }

        match DeviceChannel::new(next_id as u16) {
            Ok(channel) => {
                let correction_sink = Some(path.as_path()) == correction_path;
                discovered.sensors.push(SensorDevice {
                    path,
                    channel,
                    correction_sink,
                });
            }
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                discovered.skipped.push(path);
            }
        }
    }

    discovered
}

fn configured_path(path: &Option<String>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.is_empty()).map(Path::new)
}
