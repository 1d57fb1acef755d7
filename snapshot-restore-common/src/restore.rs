//! Timeshift restore invocation

use std::sync::Arc;

use crate::command::CommandRunner;
use crate::config::RestoreConfig;
use crate::{RestoreOutcome, validate_snapshot_name};

pub const MSG_RESTORE_STARTING: &str = "Starting Timeshift restoration...";
pub const MSG_RESTORE_FINISHED: &str = "Timeshift restoration completed";

/// Drives `timeshift --restore` for a single snapshot
pub struct RestoreInvoker<R: CommandRunner> {
    runner: Arc<R>,
    timeshift_bin: String,
    killall_bin: String,
    gui_process: String,
    prompt_newlines: usize,
}

impl<R: CommandRunner> RestoreInvoker<R> {
    pub fn new(runner: Arc<R>, config: &RestoreConfig) -> Self {
        Self {
            runner,
            timeshift_bin: config.timeshift_bin.clone(),
            killall_bin: config.killall_bin.clone(),
            gui_process: config.timeshift_gui_process.clone(),
            prompt_newlines: config.prompt_newlines,
        }
    }

    /// Restore the named snapshot over the live root filesystem
    ///
    /// Succeeds iff timeshift exits with code 0. The outcome message is the
    /// captured stdout on success and the captured stderr on failure.
    ///
    /// WARNING: This overwrites the running system and cannot be undone!
    pub fn restore_snapshot<F>(&self, name: &str, mut on_progress: F) -> RestoreOutcome
    where
        F: FnMut(&str),
    {
        on_progress(MSG_RESTORE_STARTING);

        if let Err(e) = validate_snapshot_name(name) {
            log::error!("Refusing to restore '{}': {}", name, e);
            return RestoreOutcome::failure(e);
        }

        self.stop_timeshift_gui();

        let args = ["--restore", "--snapshot", name, "--scripted", "--yes"];
        let input = "\n".repeat(self.prompt_newlines);

        log::info!("Restoring snapshot {}", name);
        let result = match self.runner.run_with_input(&self.timeshift_bin, &args, &input) {
            Ok(result) => result,
            Err(e) => {
                log::error!("Failed to launch timeshift: {:#}", e);
                return RestoreOutcome::failure(format!("{:#}", e));
            }
        };

        if result.success() {
            log::info!("Timeshift restored snapshot {}", name);
            on_progress(MSG_RESTORE_FINISHED);
            RestoreOutcome::success(result.stdout)
        } else {
            log::error!(
                "timeshift exited with {}: {}",
                result.exit_code,
                result.stderr.trim()
            );
            RestoreOutcome::failure(result.stderr)
        }
    }

    /// Kill any running timeshift-gtk; it usually isn't running, so errors are ignored
    fn stop_timeshift_gui(&self) {
        match self.runner.run(&self.killall_bin, &[self.gui_process.as_str()]) {
            Ok(result) if result.success() => {
                log::info!("Stopped running {}", self.gui_process);
            }
            Ok(_) => log::debug!("{} was not running", self.gui_process),
            Err(e) => log::debug!("Could not run {}: {:#}", self.killall_bin, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::ScriptedRunner;

    const NAME: &str = "2025-08-11_23-00-00";

    fn invoker(runner: &Arc<ScriptedRunner>) -> RestoreInvoker<ScriptedRunner> {
        RestoreInvoker::new(runner.clone(), &RestoreConfig::default())
    }

    #[test]
    fn test_restore_success() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push("timeshift", 0, "Restore completed\n", "");

        let mut progress = Vec::new();
        let outcome = invoker(&runner).restore_snapshot(NAME, |m| progress.push(m.to_string()));

        assert_eq!(outcome, RestoreOutcome::success("Restore completed\n"));
        assert_eq!(progress, vec![MSG_RESTORE_STARTING, MSG_RESTORE_FINISHED]);

        let calls = runner.calls_to("timeshift");
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec!["--restore", "--snapshot", NAME, "--scripted", "--yes"]
        );
        assert_eq!(calls[0].input.as_deref(), Some("\n\n\n\n\n\n\n\n\n\n"));
    }

    #[test]
    fn test_gui_is_stopped_before_restore() {
        let runner = Arc::new(ScriptedRunner::new());
        // killall fails because timeshift-gtk isn't running; restore continues
        runner.push("killall", 1, "", "timeshift-gtk: no process found");

        let outcome = invoker(&runner).restore_snapshot(NAME, |_| {});
        assert!(outcome.succeeded);

        let programs: Vec<String> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, vec!["killall", "timeshift"]);
        assert_eq!(runner.calls_to("killall")[0].args, vec!["timeshift-gtk"]);
    }

    #[test]
    fn test_nonzero_exit_reports_stderr_verbatim() {
        for code in [1, 2, 127, -1] {
            let runner = Arc::new(ScriptedRunner::new());
            runner.push("timeshift", code, "partial output", "  E: Snapshot not found\n");

            let mut progress = Vec::new();
            let outcome = invoker(&runner).restore_snapshot(NAME, |m| progress.push(m.to_string()));

            assert!(!outcome.succeeded);
            assert_eq!(outcome.message, "  E: Snapshot not found\n");
            assert_eq!(progress, vec![MSG_RESTORE_STARTING]);
        }
    }

    #[test]
    fn test_launch_failure() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_spawn_error("timeshift", "No such file or directory");

        let outcome = invoker(&runner).restore_snapshot(NAME, |_| {});
        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("No such file or directory"));
    }

    #[test]
    fn test_invalid_name_never_reaches_timeshift() {
        let runner = Arc::new(ScriptedRunner::new());

        let outcome = invoker(&runner).restore_snapshot("--delete-all", |_| {});
        assert!(!outcome.succeeded);
        assert!(runner.calls().is_empty());
    }
}
