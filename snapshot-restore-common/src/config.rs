// Centralized configuration for Snapshot Restore

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// System-wide configuration file (optional)
pub const DEFAULT_CONFIG_FILE: &str = "/etc/snapshot-restore/config.toml";

/// Snapshot Restore configuration with support for a TOML file and
/// environment variable overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Kernel command line source (default: /proc/cmdline)
    pub cmdline_path: PathBuf,

    /// Mount point handed to `btrfs subvolume list` (default: /)
    pub root_mount: PathBuf,

    /// Name of the canonical root subvolume (default: @)
    pub root_subvolume: String,

    /// Generated GRUB configuration (default: /boot/grub/grub.cfg)
    pub grub_config_path: PathBuf,

    /// Substring a valid GRUB configuration must contain
    pub grub_verify_marker: String,

    pub btrfs_bin: String,
    pub timeshift_bin: String,
    pub grub_mkconfig_bin: String,
    pub killall_bin: String,
    pub reboot_bin: String,

    /// Interactive Timeshift process terminated before restoring
    pub timeshift_gui_process: String,

    /// Number of newlines fed to stray prompts of the restore tool
    pub prompt_newlines: usize,

    /// Lock file guarding against concurrent restores
    pub lock_file: PathBuf,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            cmdline_path: PathBuf::from("/proc/cmdline"),
            root_mount: PathBuf::from("/"),
            root_subvolume: "@".to_string(),
            grub_config_path: PathBuf::from("/boot/grub/grub.cfg"),
            grub_verify_marker: "rootflags=subvol=".to_string(),
            btrfs_bin: "btrfs".to_string(),
            timeshift_bin: "timeshift".to_string(),
            grub_mkconfig_bin: "grub-mkconfig".to_string(),
            killall_bin: "killall".to_string(),
            reboot_bin: "reboot".to_string(),
            timeshift_gui_process: "timeshift-gtk".to_string(),
            prompt_newlines: 10,
            lock_file: PathBuf::from("/run/snapshot-restore.lock"),
        }
    }
}

impl RestoreConfig {
    /// Load the configuration file and apply environment variable overrides
    ///
    /// A missing file yields the defaults. A malformed file is logged and the
    /// defaults are used instead, so a broken config never blocks a restore.
    ///
    /// Supported environment variables:
    /// - SNAPSHOT_RESTORE_CONFIG: Override configuration file path
    /// - SNAPSHOT_RESTORE_CMDLINE: Override kernel command line source
    /// - SNAPSHOT_RESTORE_GRUB_CONFIG: Override GRUB configuration path
    /// - SNAPSHOT_RESTORE_LOCK_FILE: Override restore lock file
    pub fn load() -> Self {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with environment lookups going through `var`
    fn load_with<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = var("SNAPSHOT_RESTORE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Ignoring invalid configuration: {:#}", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env_overrides(var);
        config
    }

    /// Parse a TOML configuration file; absent keys keep their defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: RestoreConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("SNAPSHOT_RESTORE_CMDLINE") {
            self.cmdline_path = PathBuf::from(path);
        }

        if let Some(path) = var("SNAPSHOT_RESTORE_GRUB_CONFIG") {
            self.grub_config_path = PathBuf::from(path);
        }

        if let Some(path) = var("SNAPSHOT_RESTORE_LOCK_FILE") {
            self.lock_file = PathBuf::from(path);
        }
    }
}
