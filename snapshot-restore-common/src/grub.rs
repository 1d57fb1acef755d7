// GRUB configuration regeneration

use std::path::PathBuf;
use std::sync::Arc;

use crate::RestoreOutcome;
use crate::command::CommandRunner;
use crate::config::RestoreConfig;

/// Regenerates and sanity-checks the GRUB boot menu
pub struct BootConfigRegenerator<R: CommandRunner> {
    runner: Arc<R>,
    grub_mkconfig_bin: String,
    config_path: PathBuf,
    verify_marker: String,
}

impl<R: CommandRunner> BootConfigRegenerator<R> {
    pub fn new(runner: Arc<R>, config: &RestoreConfig) -> Self {
        Self {
            runner,
            grub_mkconfig_bin: config.grub_mkconfig_bin.clone(),
            config_path: config.grub_config_path.clone(),
            verify_marker: config.grub_verify_marker.clone(),
        }
    }

    /// Run grub-mkconfig against the configured output path
    pub fn regenerate_config(&self) -> RestoreOutcome {
        let output = self.config_path.to_string_lossy();

        match self
            .runner
            .run(&self.grub_mkconfig_bin, &["-o", output.as_ref()])
        {
            Ok(result) if result.success() => RestoreOutcome::success(result.stdout),
            Ok(result) => RestoreOutcome::failure(result.stderr),
            Err(e) => RestoreOutcome::failure(format!("{:#}", e)),
        }
    }

    /// Verify the generated config mounts root from a subvolume
    ///
    /// An unreadable or missing file is reported as unverified, not as an error.
    pub fn verify_config(&self) -> bool {
        match std::fs::read_to_string(&self.config_path) {
            Ok(content) => content.contains(&self.verify_marker),
            Err(e) => {
                log::warn!("Could not read {}: {}", self.config_path.display(), e);
                false
            }
        }
    }
}
