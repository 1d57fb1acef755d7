// Shared types and restore logic for Snapshot Restore

pub mod audit;
pub mod boot_state;
pub mod command;
pub mod config;
pub mod grub;
pub mod lock;
pub mod orchestrator;
pub mod restore;
pub mod subvolume;

use anyhow::{Result, bail};

pub use boot_state::BootStateReader;
pub use command::{CommandRunner, ProcessResult, SystemCommandRunner};
pub use config::RestoreConfig;
pub use orchestrator::{
    ConfirmAction, RestoreController, RestoreEvent, RestoreSession, RestoreState, spawn_restore,
};

/// Substring of the kernel command line that marks a Timeshift snapshot boot
pub const SNAPSHOT_MARKER: &str = "timeshift-btrfs/snapshots";

/// Application ID registered with GTK
pub const APP_ID: &str = "org.biglinux.SnapshotRestore";

/// The snapshot the system is currently booted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Timeshift snapshot name (e.g., "2025-08-11_23-00-00")
    pub name: String,
    /// Value of the `subvol=` boot parameter
    pub subvolume_path: String,
    /// Date formatted as DD/MM/YYYY
    pub display_date: String,
    /// Time formatted as HH:MM:SS
    pub display_time: String,
    pub raw_date: String,
    pub raw_time: String,
}

/// Result of a restore or GRUB operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub succeeded: bool,
    pub message: String,
}

impl RestoreOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Validate a snapshot name before handing it to the restore tool
///
/// # Validation Rules
/// - Name must not be empty and must be ≤ 255 characters
/// - Cannot contain `/`, null bytes, or `..`
/// - Cannot start with `-` or `.`
///
/// A leading `-` would be parsed by timeshift as another option.
pub fn validate_snapshot_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Snapshot name cannot be empty".to_string());
    }

    if name.len() > 255 {
        return Err("Snapshot name too long (max 255 characters)".to_string());
    }

    if name.contains('/') {
        return Err("Snapshot name cannot contain '/'".to_string());
    }

    if name.contains('\0') {
        return Err("Snapshot name cannot contain null bytes".to_string());
    }

    if name.contains("..") {
        return Err("Snapshot name cannot contain '..'".to_string());
    }

    if name.starts_with('-') {
        return Err("Snapshot name cannot start with '-'".to_string());
    }

    if name.starts_with('.') {
        return Err("Snapshot name cannot start with '.'".to_string());
    }

    Ok(())
}

/// Check if running as root
pub fn check_root() -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        bail!("This application requires administrator privileges.");
    }
    Ok(())
}
