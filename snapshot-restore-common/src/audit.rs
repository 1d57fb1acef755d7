//! Structured audit logging for restore operations

use chrono::Utc;
use serde::Serialize;

/// Stage of a restore attempt being audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStage {
    Restore,
    Grub,
    Reboot,
}

/// Audit log entry for a system-modifying step
#[derive(Debug, Serialize)]
struct AuditEvent<'a> {
    timestamp: String,
    user_id: u32,
    process_id: u32,
    stage: AuditStage,
    snapshot: &'a str,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl<'a> AuditEvent<'a> {
    fn new(stage: AuditStage, snapshot: &'a str, succeeded: bool, details: Option<&'a str>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            user_id: nix::unistd::getuid().as_raw(),
            process_id: std::process::id(),
            stage,
            snapshot,
            result: if succeeded { "success" } else { "failure" },
            details: details.map(str::trim).filter(|d| !d.is_empty()),
        }
    }

    /// Log the audit event as structured JSON
    fn log(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            log::info!(target: "audit", "{json}");
        } else {
            log::info!(
                target: "audit",
                "uid={} pid={} stage={:?} snapshot={} result={}",
                self.user_id,
                self.process_id,
                self.stage,
                self.snapshot,
                self.result
            );
        }
    }
}

/// Record the outcome of one restore stage
pub fn log_stage(stage: AuditStage, snapshot: &str, succeeded: bool, details: Option<&str>) {
    AuditEvent::new(stage, snapshot, succeeded, details).log();
}
