//! Detection of snapshot boots from the kernel command line

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

use crate::config::RestoreConfig;
use crate::{SNAPSHOT_MARKER, SnapshotInfo};

static SUBVOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"subvol=([^\s]+)").expect("subvol regex"));

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));

static SNAPSHOT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"timeshift-btrfs/snapshots/([^/@\s]+)").expect("snapshot name regex")
});

/// Reads the boot state from the kernel command line
#[derive(Debug, Clone)]
pub struct BootStateReader {
    cmdline_path: PathBuf,
}

impl BootStateReader {
    pub fn new(config: &RestoreConfig) -> Self {
        Self {
            cmdline_path: config.cmdline_path.clone(),
        }
    }

    /// Check if the system was booted from a Timeshift snapshot
    ///
    /// Any read error counts as "not in a snapshot".
    pub fn is_in_snapshot(&self) -> bool {
        match self.read_cmdline() {
            Some(cmdline) => cmdline.contains(SNAPSHOT_MARKER),
            None => false,
        }
    }

    /// Extract snapshot information from the boot parameters
    pub fn snapshot_info(&self) -> Option<SnapshotInfo> {
        let cmdline = self.read_cmdline()?;
        parse_snapshot_info(&cmdline)
    }

    fn read_cmdline(&self) -> Option<String> {
        match std::fs::read_to_string(&self.cmdline_path) {
            Ok(content) => Some(content.trim().to_string()),
            Err(e) => {
                log::warn!(
                    "Could not read {}: {}",
                    self.cmdline_path.display(),
                    e
                );
                None
            }
        }
    }
}

/// Parse snapshot information out of a kernel command line
///
/// Returns `None` unless the snapshot segment carries a `YYYY-MM-DD` date.
pub fn parse_snapshot_info(cmdline: &str) -> Option<SnapshotInfo> {
    let subvolume_path = SUBVOL_RE
        .captures(cmdline)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let name = SNAPSHOT_NAME_RE.captures(cmdline)?.get(1)?.as_str();

    // Format: 2025-08-11_23-00-00
    let (raw_date, raw_time) = match name.split_once('_') {
        Some((date, time)) => (date, time),
        None => (name, "00-00-00"),
    };

    // chrono alone accepts signed years and unpadded fields
    let parsed = DATE_RE
        .is_match(raw_date)
        .then(|| NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").ok())
        .flatten();

    let date = match parsed {
        Some(date) => date,
        None => {
            log::debug!("Snapshot segment '{}' has no valid date", name);
            return None;
        }
    };

    Some(SnapshotInfo {
        name: name.to_string(),
        subvolume_path,
        display_date: date.format("%d/%m/%Y").to_string(),
        display_time: raw_time.replace('-', ":"),
        raw_date: raw_date.to_string(),
        raw_time: raw_time.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT_CMDLINE: &str = "BOOT_IMAGE=/timeshift-btrfs/snapshots/2025-08-11_23-00-00/@/boot/vmlinuz-linux \
        root=UUID=1234 rw rootflags=subvol=/@/.snapshots/42/snapshot quiet";

    fn reader_for(content: &str) -> (tempfile::NamedTempFile, BootStateReader) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();

        let config = RestoreConfig {
            cmdline_path: file.path().to_path_buf(),
            ..RestoreConfig::default()
        };
        let reader = BootStateReader::new(&config);
        (file, reader)
    }

    #[test]
    fn test_parse_snapshot_cmdline() {
        let info = parse_snapshot_info(SNAPSHOT_CMDLINE).unwrap();
        assert_eq!(info.name, "2025-08-11_23-00-00");
        assert_eq!(info.subvolume_path, "/@/.snapshots/42/snapshot");
        assert_eq!(info.display_date, "11/08/2025");
        assert_eq!(info.display_time, "23:00:00");
        assert_eq!(info.raw_date, "2025-08-11");
        assert_eq!(info.raw_time, "23-00-00");
    }

    #[test]
    fn test_malformed_date_yields_none() {
        let cmdline = "root=UUID=1234 subvol=/@/.snapshots/42/snapshot \
            init=/timeshift-btrfs/snapshots/notadate_23-00-00/@";
        assert_eq!(parse_snapshot_info(cmdline), None);
    }

    #[test]
    fn test_loose_dates_yield_none() {
        for segment in [
            "+2025-08-11_23-00-00",
            "2025-8-1_23-00-00",
            "02025-08-11_23-00-00",
            "2025-02-30_23-00-00",
        ] {
            let cmdline = format!("subvol=/@ init=/timeshift-btrfs/snapshots/{}/@", segment);
            assert_eq!(parse_snapshot_info(&cmdline), None, "{}", segment);
        }
    }

    #[test]
    fn test_missing_time_defaults_to_midnight() {
        let cmdline = "subvol=timeshift-btrfs/snapshots/2024-01-31/@";
        let info = parse_snapshot_info(cmdline).unwrap();
        assert_eq!(info.name, "2024-01-31");
        assert_eq!(info.display_date, "31/01/2024");
        assert_eq!(info.display_time, "00:00:00");
    }

    #[test]
    fn test_missing_subvol_gives_empty_path() {
        let cmdline = "BOOT_IMAGE=/timeshift-btrfs/snapshots/2025-08-11_23-00-00/@/boot/vmlinuz";
        let info = parse_snapshot_info(cmdline).unwrap();
        assert_eq!(info.subvolume_path, "");
    }

    #[test]
    fn test_plain_boot_has_no_snapshot() {
        let cmdline = "BOOT_IMAGE=/@/boot/vmlinuz-linux root=UUID=1234 rw rootflags=subvol=@ quiet";
        assert_eq!(parse_snapshot_info(cmdline), None);

        let (_file, reader) = reader_for(cmdline);
        assert!(!reader.is_in_snapshot());
    }

    #[test]
    fn test_reader_detects_snapshot_boot() {
        let (_file, reader) = reader_for(&format!("{}\n", SNAPSHOT_CMDLINE));
        assert!(reader.is_in_snapshot());
        assert_eq!(reader.snapshot_info().unwrap().name, "2025-08-11_23-00-00");
    }

    #[test]
    fn test_unreadable_cmdline_fails_closed() {
        let config = RestoreConfig {
            cmdline_path: PathBuf::from("/nonexistent/snapshot-restore/cmdline"),
            ..RestoreConfig::default()
        };
        let reader = BootStateReader::new(&config);
        assert!(!reader.is_in_snapshot());
        assert_eq!(reader.snapshot_info(), None);
    }
}
