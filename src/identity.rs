//! # Rover Identity
//!
//! Resolves the rover identity from the board's hardware serial number
//! (the `Serial` line of `/proc/cpuinfo` on a Raspberry Pi).
//!
//! Identity is diagnostic only: a read failure yields a sentinel identity
//! instead of aborting startup.

use std::fs;
use std::path::Path;

use crate::frame::protocol::{RoverTag, ROVER_TAG_LEN};

/// Default identity source
pub const DEFAULT_IDENTITY_SOURCE: &str = "/proc/cpuinfo";

/// Identity used when the source is readable but carries no serial line
pub const DEFAULT_SERIAL: &str = "0000000000000000";

/// Identity used when the source cannot be read
pub const SENTINEL_SERIAL: &str = "ERROR000000000";

/// Stable per-unit rover identity
///
/// Always at least 4 printable ASCII characters, so tag extraction cannot
/// underflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoverIdentity(String);

impl RoverIdentity {
    /// Build an identity from a raw serial string
    ///
    /// Characters outside printable ASCII are replaced with `'0'` and short
    /// values are left-padded with `'0'` to 4 characters.
    pub fn new(raw: &str) -> Self {
        let mut value: String = raw
            .chars()
            .map(|c| if c.is_ascii_graphic() { c } else { '0' })
            .collect();

        if value.len() < ROVER_TAG_LEN {
            let padding = "0".repeat(ROVER_TAG_LEN - value.len());
            value.insert_str(0, &padding);
        }

        Self(value)
    }

    /// Full identity string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last 4 characters as frame tag bytes
    pub fn tag(&self) -> RoverTag {
        let bytes = self.0.as_bytes();
        let mut tag = [0u8; ROVER_TAG_LEN];
        tag.copy_from_slice(&bytes[bytes.len() - ROVER_TAG_LEN..]);
        tag
    }
}

impl std::fmt::Display for RoverIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of identity resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    /// Identity read from the platform source
    Resolved(RoverIdentity),
    /// Source unreadable; sentinel substituted
    Sentinel {
        identity: RoverIdentity,
        reason: String,
    },
}

impl IdentityOutcome {
    /// The identity to use, whichever way it was obtained
    pub fn identity(&self) -> &RoverIdentity {
        match self {
            IdentityOutcome::Resolved(identity) => identity,
            IdentityOutcome::Sentinel { identity, .. } => identity,
        }
    }

    /// Consume the outcome, keeping only the identity
    pub fn into_identity(self) -> RoverIdentity {
        match self {
            IdentityOutcome::Resolved(identity) => identity,
            IdentityOutcome::Sentinel { identity, .. } => identity,
        }
    }

    /// Whether the sentinel was substituted
    pub fn is_sentinel(&self) -> bool {
        matches!(self, IdentityOutcome::Sentinel { .. })
    }
}

/// Resolve the rover identity from a cpuinfo-style file
///
/// # Arguments
///
/// * `source` - Path to the file (normally `/proc/cpuinfo`)
///
/// # Returns
///
/// * `IdentityOutcome` - `Resolved` when the file was readable (falling back
///   to `DEFAULT_SERIAL` if it has no `Serial` line), `Sentinel` otherwise
///
/// # Examples
///
/// ```no_run
/// use rover_mux::identity::resolve_identity;
///
/// let identity = resolve_identity("/proc/cpuinfo").into_identity();
/// println!("Rover tag: {}", String::from_utf8_lossy(&identity.tag()));
/// ```
pub fn resolve_identity<P: AsRef<Path>>(source: P) -> IdentityOutcome {
    match fs::read_to_string(source.as_ref()) {
        Ok(contents) => {
            let serial = parse_cpu_serial(&contents).unwrap_or(DEFAULT_SERIAL);
            IdentityOutcome::Resolved(RoverIdentity::new(serial))
        }
        Err(e) => IdentityOutcome::Sentinel {
            identity: RoverIdentity::new(SENTINEL_SERIAL),
            reason: format!("Failed to read {}: {}", source.as_ref().display(), e),
        },
    }
}

/// Extract the serial number from cpuinfo contents
///
/// Uses the last line starting with `Serial`; the value is the text after
/// the `:` separator.
fn parse_cpu_serial(contents: &str) -> Option<&str> {
    contents
        .lines()
        .filter(|line| line.starts_with("Serial"))
        .filter_map(|line| line.split_once(':'))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PI_CPUINFO: &str = "\
processor\t: 0
model name\t: ARMv7 Processor rev 4 (v7l)
Hardware\t: BCM2835
Revision\t: a02082
Serial\t\t: 00000000abcd1234
Model\t\t: Raspberry Pi 3 Model B Rev 1.2
";

    fn cpuinfo_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_resolve_from_cpuinfo() {
        let file = cpuinfo_file(PI_CPUINFO);
        let outcome = resolve_identity(file.path());

        assert!(!outcome.is_sentinel());
        assert_eq!(outcome.identity().as_str(), "00000000abcd1234");
        assert_eq!(&outcome.identity().tag(), b"1234");
    }

    #[test]
    fn test_missing_serial_line_uses_default() {
        let file = cpuinfo_file("processor\t: 0\nHardware\t: BCM2835\n");
        let outcome = resolve_identity(file.path());

        assert_eq!(outcome, IdentityOutcome::Resolved(RoverIdentity::new(DEFAULT_SERIAL)));
    }

    #[test]
    fn test_unreadable_source_returns_sentinel() {
        let outcome = resolve_identity("/nonexistent/cpuinfo_12345");

        match &outcome {
            IdentityOutcome::Sentinel { identity, reason } => {
                assert_eq!(identity.as_str(), SENTINEL_SERIAL);
                assert!(reason.contains("/nonexistent/cpuinfo_12345"));
            }
            other => panic!("Expected sentinel, got: {:?}", other),
        }
        assert_eq!(&outcome.into_identity().tag(), b"0000");
    }

    #[test]
    fn test_short_identity_is_padded() {
        let identity = RoverIdentity::new("7");
        assert_eq!(identity.as_str(), "0007");
        assert_eq!(&identity.tag(), b"0007");

        assert_eq!(RoverIdentity::new("").as_str(), "0000");
    }

    #[test]
    fn test_non_ascii_characters_are_replaced() {
        let identity = RoverIdentity::new("ab\u{e9}d");
        assert_eq!(&identity.tag(), b"ab0d");
        assert!(identity.as_str().is_ascii());
    }

    #[test]
    fn test_last_serial_line_wins() {
        let contents = "Serial\t: 1111222233334444\nSerial\t: 5555666677778888\n";
        assert_eq!(parse_cpu_serial(contents), Some("5555666677778888"));
    }
}
