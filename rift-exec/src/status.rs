//! Read and cancel side of the execution registry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ExecError;
use crate::execution::{Execution, ExecutionStatus};
use crate::registry::{CancelOutcome, ExecutionRegistry};

/// Caller-facing view of an execution, with output chunks joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub id: String,
    pub tool: String,
    pub args: Vec<String>,
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<i64>,
    pub cancelled: bool,
}

impl From<Execution> for ExecutionView {
    fn from(execution: Execution) -> Self {
        let duration_ms = execution.duration_ms();
        Self {
            id: execution.id.into(),
            tool: execution.tool,
            args: execution.args,
            status: execution.status,
            stdout: execution.stdout.concat(),
            stderr: execution.stderr.concat(),
            start_time: execution.start_time,
            end_time: execution.end_time,
            exit_code: execution.exit_code,
            duration_ms,
            cancelled: execution.cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusService {
    registry: Arc<ExecutionRegistry>,
}

impl StatusService {
    pub fn new(registry: Arc<ExecutionRegistry>) -> Self {
        Self { registry }
    }

    /// Current view of `id`. Never waits on the process.
    pub fn status(&self, id: &str) -> Result<ExecutionView, ExecError> {
        self.registry
            .snapshot(id)
            .map(ExecutionView::from)
            .ok_or_else(|| ExecError::NotFound { id: id.to_string() })
    }

    pub fn cancel(&self, id: &str) -> CancelOutcome {
        self.registry.cancel(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::OutputStream;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_id_is_not_found() {
        let service = StatusService::new(Arc::new(ExecutionRegistry::new()));
        let err = service.status("exec-1-00000000").expect_err("empty registry");
        assert!(matches!(err, ExecError::NotFound { ref id } if id == "exec-1-00000000"));
        assert_eq!(service.cancel("exec-1-00000000"), CancelOutcome::NotFound);
    }

    #[test]
    fn view_joins_chunks_and_grows() {
        let registry = Arc::new(ExecutionRegistry::new());
        let service = StatusService::new(Arc::clone(&registry));
        let id = registry.create("dig", vec!["example.com".to_string()]);

        registry.append_output(id.as_str(), OutputStream::Stdout, "a\n".to_string());
        let first = service.status(id.as_str()).expect("exists");
        registry.append_output(id.as_str(), OutputStream::Stdout, "b\n".to_string());
        let second = service.status(id.as_str()).expect("exists");

        assert_eq!(first.stdout, "a\n");
        assert!(second.stdout.starts_with(&first.stdout));
        assert_eq!(second.stdout, "a\nb\n");
        assert_eq!(second.status, ExecutionStatus::Running);
        assert_eq!(second.duration_ms, None);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let registry = Arc::new(ExecutionRegistry::new());
        let service = StatusService::new(Arc::clone(&registry));
        let id = registry.create("whois", vec!["example.com".to_string()]);
        registry.complete(id.as_str(), 0);

        let view = service.status(id.as_str()).expect("exists");
        let json = serde_json::to_value(&view).expect("serialize view");

        assert_eq!(json["id"], id.as_str());
        assert_eq!(json["status"], "completed");
        assert_eq!(json["exitCode"], 0);
        assert_eq!(json["cancelled"], false);
        assert!(json.get("startTime").is_some());
        assert!(json.get("endTime").is_some());
        assert!(json.get("durationMs").is_some());
    }

    #[test]
    fn cancel_is_reflected_in_the_view() {
        let registry = Arc::new(ExecutionRegistry::new());
        let service = StatusService::new(Arc::clone(&registry));
        let id = registry.create("nmap", Vec::new());

        assert_eq!(service.cancel(id.as_str()), CancelOutcome::Cancelled);
        assert_eq!(service.cancel(id.as_str()), CancelOutcome::AlreadyTerminal);

        let view = service.status(id.as_str()).expect("exists");
        assert_eq!(view.status, ExecutionStatus::Failed);
        assert_eq!(view.exit_code, Some(-1));
        assert!(view.cancelled);
        assert!(view.stderr.ends_with(crate::registry::CANCELLED_MARKER));
    }
}
