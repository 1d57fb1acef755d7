//! External command execution
//!
//! Every tool this crate drives (btrfs, timeshift, grub-mkconfig, killall,
//! reboot) goes through [`CommandRunner`], so the restore sequence can be
//! exercised with scripted results in tests.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code, or -1 if the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn from_output(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Trait for abstracting external command execution
///
/// `Err` means the program could not be started at all. A program that ran
/// and exited non-zero is reported as `Ok` with its exit code.
pub trait CommandRunner: Send + Sync {
    /// Run a program and wait for it, capturing all output
    fn run(&self, program: &str, args: &[&str]) -> Result<ProcessResult>;

    /// Run a program with `input` written to its stdin, capturing all output
    fn run_with_input(&self, program: &str, args: &[&str], input: &str) -> Result<ProcessResult>;
}

/// Runs commands on the host system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<ProcessResult> {
        log::debug!("Running {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute {}", program))?;

        Ok(ProcessResult::from_output(output))
    }

    fn run_with_input(&self, program: &str, args: &[&str], input: &str) -> Result<ProcessResult> {
        log::debug!("Running {} {} (with stdin)", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {}", program))?;

        // Feed stdin from its own thread so a chatty child can't deadlock on
        // a full stdout pipe while we're still writing.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.to_string();
            std::thread::spawn(move || {
                // The child may exit without reading; a broken pipe is fine.
                let _ = stdin.write_all(input.as_bytes());
            })
        });

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", program))?;

        if let Some(handle) = writer {
            let _ = handle.join();
        }

        Ok(ProcessResult::from_output(output))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted command runner for tests

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// A recorded invocation
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Invocation {
        pub program: String,
        pub args: Vec<String>,
        pub input: Option<String>,
    }

    /// Returns queued results per program; unscripted programs exit 0 silently
    #[derive(Default)]
    pub struct ScriptedRunner {
        results: Mutex<HashMap<String, VecDeque<Result<ProcessResult, String>>>>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, program: &str, exit_code: i32, stdout: &str, stderr: &str) -> &Self {
            self.results
                .lock()
                .unwrap()
                .entry(program.to_string())
                .or_default()
                .push_back(Ok(ProcessResult {
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                }));
            self
        }

        pub fn push_spawn_error(&self, program: &str, error: &str) -> &Self {
            self.results
                .lock()
                .unwrap()
                .entry(program.to_string())
                .or_default()
                .push_back(Err(error.to_string()));
            self
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }

        pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
            self.calls()
                .into_iter()
                .filter(|call| call.program == program)
                .collect()
        }

        fn next(&self, program: &str, args: &[&str], input: Option<&str>) -> Result<ProcessResult> {
            self.calls.lock().unwrap().push(Invocation {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                input: input.map(str::to_string),
            });

            let scripted = self
                .results
                .lock()
                .unwrap()
                .get_mut(program)
                .and_then(|queue| queue.pop_front());

            match scripted {
                Some(Ok(result)) => Ok(result),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Ok(ProcessResult {
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                }),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<ProcessResult> {
            self.next(program, args, None)
        }

        fn run_with_input(&self, program: &str, args: &[&str], input: &str) -> Result<ProcessResult> {
            self.next(program, args, Some(input))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_runner_captures_output() {
        let result = SystemCommandRunner
            .run("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(!result.success());
    }

    #[test]
    fn test_system_runner_feeds_stdin() {
        let result = SystemCommandRunner
            .run_with_input("sh", &["-c", "wc -l"], "\n\n\n")
            .unwrap();
        assert!(result.success());
        assert_eq!(result.stdout.trim(), "3");
    }

    #[test]
    fn test_missing_program_is_an_error() {
        assert!(SystemCommandRunner
            .run("snapshot-restore-no-such-program", &[])
            .is_err());
    }
}
