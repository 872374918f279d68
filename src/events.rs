//! Deploy event port
//!
//! Provides an observable interface for reconciliation runs.
//! Enables progress reporting, JSON event streams, and debugging.

use std::io::Write;

use is_terminal::IsTerminal;

/// Event emitted during a reconciliation run
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Run started
    Started {
        customer: String,
        workspace: String,
    },

    /// A category of artifacts is being reconciled
    CategoryStarted { category: String },

    /// Artifact created in the target
    ArtifactCreated { item: String },

    /// Existing target artifact updated in place
    ArtifactUpdated { item: String },

    /// Artifact intentionally not migrated
    ArtifactSkipped { item: String, reason: String },

    /// Post-create job reached Completed
    JobCompleted { item: String, job_id: String },

    /// Post-create job ended without completing; the run continues
    JobFailed { item: String, reason: String },

    /// Update path found a source shortcut with no target counterpart
    ShortcutMissing {
        container: String,
        mount_point: String,
    },

    /// Orphan artifact deleted from the target
    OrphanDeleted { item: String },

    /// Orphan deletion failed; the run continues
    OrphanDeleteFailed { item: String, error: String },

    /// Run completed
    Completed {
        created: usize,
        updated: usize,
        skipped: usize,
        pruned: usize,
        job_failures: usize,
    },
}

/// Trait for receiving deploy events
///
/// Implementations can be:
/// - ConsoleEventSink: progress display in terminal
/// - JsonEventSink: NDJSON event stream for CI
/// - NoopEventSink: silent operation
pub trait DeployEventSink: Send + Sync {
    /// Handle a deploy event
    fn on_event(&self, event: DeployEvent);

    /// Check if this sink wants detailed events (e.g., per-artifact)
    ///
    /// Some sinks (like CI) may only want summary events.
    fn wants_detailed_events(&self) -> bool {
        true
    }
}

/// No-op event sink for silent operation
pub struct NoopEventSink;

impl DeployEventSink for NoopEventSink {
    fn on_event(&self, _event: DeployEvent) {
        // Do nothing
    }

    fn wants_detailed_events(&self) -> bool {
        false
    }
}

/// Human-readable progress on stdout
///
/// Per-artifact lines are indented under their category header. Colors
/// are applied only when stdout is a terminal.
pub struct ConsoleEventSink {
    color: bool,
}

impl ConsoleEventSink {
    pub fn new() -> Self {
        Self {
            color: std::io::stdout().is_terminal(),
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[2m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn warn(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[33m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl Default for ConsoleEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployEventSink for ConsoleEventSink {
    fn on_event(&self, event: DeployEvent) {
        let line = match event {
            DeployEvent::Started {
                customer,
                workspace,
            } => format!("Deploying solution for [{customer}] into workspace [{workspace}]"),
            DeployEvent::CategoryStarted { category } => format!("Processing {category}"),
            DeployEvent::ArtifactCreated { item } => format!("  created {item}"),
            DeployEvent::ArtifactUpdated { item } => format!("  updated {item}"),
            DeployEvent::ArtifactSkipped { item, reason } => {
                self.dim(&format!("  skipped {item} ({reason})"))
            }
            DeployEvent::JobCompleted { item, job_id } => {
                format!("  job completed for {item} [{job_id}]")
            }
            DeployEvent::JobFailed { item, reason } => {
                self.warn(&format!("  job failed for {item}: {reason}"))
            }
            DeployEvent::ShortcutMissing {
                container,
                mount_point,
            } => self.warn(&format!(
                "  shortcut {mount_point} missing from target container {container}"
            )),
            DeployEvent::OrphanDeleted { item } => format!("  deleted orphan {item}"),
            DeployEvent::OrphanDeleteFailed { item, error } => {
                self.warn(&format!("  could not delete orphan {item}: {error}"))
            }
            DeployEvent::Completed {
                created,
                updated,
                skipped,
                pruned,
                job_failures,
            } => format!(
                "Done: {created} created, {updated} updated, {skipped} skipped, {pruned} pruned, {job_failures} job failures"
            ),
        };
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{line}");
    }
}

/// NDJSON event stream on stdout, one timestamped object per event
pub struct JsonEventSink;

impl JsonEventSink {
    fn payload(event: &DeployEvent) -> serde_json::Value {
        match event {
            DeployEvent::Started {
                customer,
                workspace,
            } => serde_json::json!({
                "event": "start",
                "customer": customer,
                "workspace": workspace,
                "version": env!("CARGO_PKG_VERSION"),
            }),
            DeployEvent::CategoryStarted { category } => serde_json::json!({
                "event": "category_start",
                "category": category,
            }),
            DeployEvent::ArtifactCreated { item } => serde_json::json!({
                "event": "artifact_created",
                "item": item,
            }),
            DeployEvent::ArtifactUpdated { item } => serde_json::json!({
                "event": "artifact_updated",
                "item": item,
            }),
            DeployEvent::ArtifactSkipped { item, reason } => serde_json::json!({
                "event": "artifact_skipped",
                "item": item,
                "reason": reason,
            }),
            DeployEvent::JobCompleted { item, job_id } => serde_json::json!({
                "event": "job_completed",
                "item": item,
                "job_id": job_id,
            }),
            DeployEvent::JobFailed { item, reason } => serde_json::json!({
                "event": "job_failed",
                "item": item,
                "reason": reason,
            }),
            DeployEvent::ShortcutMissing {
                container,
                mount_point,
            } => serde_json::json!({
                "event": "shortcut_missing",
                "container": container,
                "mount_point": mount_point,
            }),
            DeployEvent::OrphanDeleted { item } => serde_json::json!({
                "event": "orphan_deleted",
                "item": item,
            }),
            DeployEvent::OrphanDeleteFailed { item, error } => serde_json::json!({
                "event": "orphan_delete_failed",
                "item": item,
                "error": error,
            }),
            DeployEvent::Completed {
                created,
                updated,
                skipped,
                pruned,
                job_failures,
            } => serde_json::json!({
                "event": "complete",
                "created": created,
                "updated": updated,
                "skipped": skipped,
                "pruned": pruned,
                "job_failures": job_failures,
            }),
        }
    }
}

impl DeployEventSink for JsonEventSink {
    fn on_event(&self, event: DeployEvent) {
        let mut payload = Self::payload(&event);
        if let Some(object) = payload.as_object_mut() {
            object.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{payload}");
    }
}
