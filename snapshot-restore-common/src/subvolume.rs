use std::path::PathBuf;
use std::sync::Arc;

use crate::command::CommandRunner;
use crate::config::RestoreConfig;

/// Queries the Btrfs subvolume layout of the root filesystem
pub struct SubvolumeInspector<R: CommandRunner> {
    runner: Arc<R>,
    btrfs_bin: String,
    root_mount: PathBuf,
    root_subvolume: String,
}

impl<R: CommandRunner> SubvolumeInspector<R> {
    pub fn new(runner: Arc<R>, config: &RestoreConfig) -> Self {
        Self {
            runner,
            btrfs_bin: config.btrfs_bin.clone(),
            root_mount: config.root_mount.clone(),
            root_subvolume: config.root_subvolume.clone(),
        }
    }

    /// List all Btrfs subvolumes under the root mount
    ///
    /// Returns the raw `btrfs subvolume list` output, or an empty string if
    /// the command fails or is unavailable.
    pub fn list_subvolumes(&self) -> String {
        let root_mount = self.root_mount.to_string_lossy();

        match self
            .runner
            .run(&self.btrfs_bin, &["subvolume", "list", root_mount.as_ref()])
        {
            Ok(result) if result.success() => result.stdout,
            Ok(result) => {
                log::warn!(
                    "btrfs subvolume list exited with {}: {}",
                    result.exit_code,
                    result.stderr.trim()
                );
                String::new()
            }
            Err(e) => {
                log::warn!("Could not list subvolumes: {:#}", e);
                String::new()
            }
        }
    }

    /// Check if the original root subvolume still exists
    pub fn root_subvolume_exists(&self) -> bool {
        listing_contains_subvolume(&self.list_subvolumes(), &self.root_subvolume)
    }
}

/// Check a `btrfs subvolume list` listing for a `path <name>` entry
///
/// Matches either a line ending in `path <name>` or a final line ending in it
/// (output without a trailing newline).
pub fn listing_contains_subvolume(listing: &str, name: &str) -> bool {
    let entry = format!("path {}", name);

    if listing.contains(&format!("{}\n", entry)) {
        return true;
    }

    listing
        .split('\n')
        .next_back()
        .is_some_and(|last| last.ends_with(&entry))
}
