//! Restore sequencing and the state machine behind the restore prompt
//!
//! The sequence runs on a worker thread ([`spawn_restore`]) and reports back
//! through an ordered channel of [`RestoreEvent`]s. The interactive thread
//! owns a [`RestoreController`] and feeds it those events; the view only ever
//! reads the controller's state.

use anyhow::{Context, Result, bail};
use std::sync::Arc;

use crate::SnapshotInfo;
use crate::audit::{self, AuditStage};
use crate::command::CommandRunner;
use crate::config::RestoreConfig;
use crate::grub::BootConfigRegenerator;
use crate::lock::RestoreLock;
use crate::restore::RestoreInvoker;
use crate::subvolume::SubvolumeInspector;

pub const MSG_CHECKING_STATE: &str = "Checking system state...";
pub const MSG_CHECKING_CONSISTENCY: &str = "Restoration completed. Checking system consistency...";
pub const MSG_REGENERATING_GRUB: &str = "Regenerating GRUB configuration...";
pub const MSG_GRUB_FAILED: &str = "GRUB configuration regeneration failed";
pub const MSG_RESTORE_IN_PROGRESS: &str = "Another restore is already in progress";

/// State of the restore prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreState {
    Idle,
    Restoring,
    Completed,
    Failed(String),
}

/// Message from the restore worker, delivered in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreEvent {
    Progress(String),
    Completed,
    Failed(String),
}

/// What the caller must do after the user confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    /// Spawn a restore worker
    StartRestore,
    /// The restore already succeeded, reboot the machine
    Reboot,
    /// A restore is running; nothing to do
    Ignored,
}

/// Everything a restore attempt needs, shareable with the worker thread
pub struct RestoreSession<R: CommandRunner> {
    runner: Arc<R>,
    config: Arc<RestoreConfig>,
}

impl<R: CommandRunner> Clone for RestoreSession<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            config: Arc::clone(&self.config),
        }
    }
}

impl<R: CommandRunner> RestoreSession<R> {
    pub fn new(runner: Arc<R>, config: RestoreConfig) -> Self {
        Self {
            runner,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    /// Run the full restore sequence, blocking until it finishes
    ///
    /// Emits progress messages followed by exactly one `Completed` or `Failed`.
    pub fn run<F>(&self, snapshot_name: &str, mut emit: F)
    where
        F: FnMut(RestoreEvent),
    {
        let _lock = match RestoreLock::try_acquire(&self.config.lock_file) {
            Ok(Some(lock)) => Some(lock),
            Ok(None) => {
                log::warn!("{} is held by another process", self.config.lock_file.display());
                emit(RestoreEvent::Failed(MSG_RESTORE_IN_PROGRESS.to_string()));
                return;
            }
            Err(e) => {
                log::warn!("Continuing without restore lock: {:#}", e);
                None
            }
        };

        let inspector = SubvolumeInspector::new(Arc::clone(&self.runner), &self.config);
        let invoker = RestoreInvoker::new(Arc::clone(&self.runner), &self.config);
        let grub = BootConfigRegenerator::new(Arc::clone(&self.runner), &self.config);

        emit(RestoreEvent::Progress(MSG_CHECKING_STATE.to_string()));
        let root_before = inspector.root_subvolume_exists();
        log::info!(
            "Root subvolume '{}' present before restore: {}",
            self.config.root_subvolume,
            root_before
        );

        let outcome = invoker.restore_snapshot(snapshot_name, |message| {
            emit(RestoreEvent::Progress(message.to_string()))
        });
        audit::log_stage(
            AuditStage::Restore,
            snapshot_name,
            outcome.succeeded,
            (!outcome.succeeded).then_some(outcome.message.as_str()),
        );

        if !outcome.succeeded {
            emit(RestoreEvent::Failed(format!(
                "Timeshift restoration failed: {}",
                outcome.message
            )));
            return;
        }

        emit(RestoreEvent::Progress(MSG_CHECKING_CONSISTENCY.to_string()));
        let root_after = inspector.root_subvolume_exists();
        log::info!(
            "Root subvolume '{}' present after restore: {} (before: {})",
            self.config.root_subvolume,
            root_after,
            root_before
        );

        emit(RestoreEvent::Progress(MSG_REGENERATING_GRUB.to_string()));
        let regenerated = grub.regenerate_config();

        if !regenerated.succeeded {
            log::error!("grub-mkconfig failed: {}", regenerated.message.trim());
            audit::log_stage(AuditStage::Grub, snapshot_name, false, Some(&regenerated.message));
            emit(RestoreEvent::Failed(MSG_GRUB_FAILED.to_string()));
            return;
        }

        if !grub.verify_config() {
            log::error!(
                "{} does not contain '{}'",
                self.config.grub_config_path.display(),
                self.config.grub_verify_marker
            );
            audit::log_stage(
                AuditStage::Grub,
                snapshot_name,
                false,
                Some("generated configuration has no subvolume root entries"),
            );
            emit(RestoreEvent::Failed(MSG_GRUB_FAILED.to_string()));
            return;
        }

        audit::log_stage(AuditStage::Grub, snapshot_name, true, None);
        log::info!("Snapshot {} restored and GRUB regenerated", snapshot_name);
        emit(RestoreEvent::Completed);
    }

    /// Reboot the system
    pub fn reboot(&self) -> Result<()> {
        let result = self
            .runner
            .run(&self.config.reboot_bin, &[])
            .context("Failed to execute reboot")?;

        audit::log_stage(
            AuditStage::Reboot,
            "",
            result.success(),
            (!result.success()).then_some(result.stderr.as_str()),
        );

        if !result.success() {
            bail!(
                "reboot exited with status {}: {}",
                result.exit_code,
                result.stderr.trim()
            );
        }

        Ok(())
    }
}

/// Start a restore on its own worker thread
///
/// The returned channel yields the worker's events in order and closes once
/// the sequence has finished.
pub fn spawn_restore<R>(
    session: RestoreSession<R>,
    snapshot_name: String,
) -> async_channel::Receiver<RestoreEvent>
where
    R: CommandRunner + 'static,
{
    let (sender, receiver) = async_channel::unbounded();

    std::thread::spawn(move || {
        session.run(&snapshot_name, |event| {
            if sender.send_blocking(event).is_err() {
                log::warn!("Restore event receiver dropped");
            }
        });
    });

    receiver
}

/// Restore prompt state, owned by the interactive thread
#[derive(Debug)]
pub struct RestoreController {
    snapshot: SnapshotInfo,
    state: RestoreState,
}

impl RestoreController {
    pub fn new(snapshot: SnapshotInfo) -> Self {
        Self {
            snapshot,
            state: RestoreState::Idle,
        }
    }

    pub fn snapshot(&self) -> &SnapshotInfo {
        &self.snapshot
    }

    pub fn state(&self) -> &RestoreState {
        &self.state
    }

    /// Whether the prompt may be closed; a running restore must reach GRUB regeneration
    pub fn can_close(&self) -> bool {
        self.state != RestoreState::Restoring
    }

    /// Handle the user pressing the restore/restart button
    pub fn confirm(&mut self) -> ConfirmAction {
        match self.state {
            RestoreState::Idle | RestoreState::Failed(_) => {
                self.state = RestoreState::Restoring;
                ConfirmAction::StartRestore
            }
            RestoreState::Restoring => ConfirmAction::Ignored,
            RestoreState::Completed => ConfirmAction::Reboot,
        }
    }

    /// Apply an event from the restore worker
    ///
    /// Events that arrive while no restore is running are dropped.
    pub fn handle_event(&mut self, event: &RestoreEvent) {
        if self.state != RestoreState::Restoring {
            log::warn!("Ignoring restore event outside a restore: {:?}", event);
            return;
        }

        match event {
            RestoreEvent::Progress(message) => log::info!("{}", message),
            RestoreEvent::Completed => self.state = RestoreState::Completed,
            RestoreEvent::Failed(message) => self.state = RestoreState::Failed(message.clone()),
        }
    }
}
