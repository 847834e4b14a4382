//! Thread-safe store of executions keyed by id.
//!
//! The outer map lock is only held long enough to look up or insert an
//! entry's `Arc`; all mutation of an execution happens under that entry's own
//! lock, so observers of different executions never contend.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::execution::{Execution, ExecutionId, ExecutionStatus, OutputStream};

/// Line appended to stderr when an execution is cancelled.
pub const CANCELLED_MARKER: &str = "[rift] execution cancelled by operator\n";

/// Exit code recorded for cancelled executions.
pub const CANCELLED_EXIT_CODE: i32 = -1;

/// Handle able to tear down the OS process behind an execution.
pub trait ChildTerminator: Send + Sync {
    /// Request termination. Must not block on the process exiting.
    fn kill(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyTerminal,
    NotFound,
}

struct Entry {
    execution: Execution,
    terminator: Option<Box<dyn ChildTerminator>>,
}

#[derive(Default)]
pub struct ExecutionRegistry {
    entries: RwLock<HashMap<ExecutionId, Arc<Mutex<Entry>>>>,
}

impl std::fmt::Debug for ExecutionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &str) -> Option<Arc<Mutex<Entry>>> {
        self.entries.read().get(id).cloned()
    }

    /// Register a new running execution and return its id.
    pub fn create(&self, tool: impl Into<String>, args: Vec<String>) -> ExecutionId {
        let id = ExecutionId::generate();
        let entry = Entry {
            execution: Execution::new(id.clone(), tool.into(), args),
            terminator: None,
        };
        self.entries
            .write()
            .insert(id.clone(), Arc::new(Mutex::new(entry)));
        tracing::debug!(execution = %id, "execution registered");
        id
    }

    /// Attach the process terminator used by [`cancel`](Self::cancel).
    ///
    /// If the execution was cancelled before the terminator arrived, the
    /// process is torn down right away.
    pub fn attach_terminator(&self, id: &str, terminator: Box<dyn ChildTerminator>) {
        let Some(entry) = self.entry(id) else {
            tracing::debug!(execution = id, "terminator for unknown execution dropped");
            return;
        };

        let mut late = {
            let mut guard = entry.lock();
            if guard.execution.cancelled {
                Some(terminator)
            } else if guard.execution.is_terminal() {
                None
            } else {
                guard.terminator = Some(terminator);
                None
            }
        };

        if let Some(terminator) = late.as_mut()
            && let Err(err) = terminator.kill()
        {
            tracing::warn!(execution = id, error = %err, "failed to terminate cancelled execution");
        }
    }

    /// Append one chunk of output. Unknown or terminal ids are ignored.
    pub fn append_output(&self, id: &str, stream: OutputStream, chunk: String) {
        let Some(entry) = self.entry(id) else {
            tracing::debug!(execution = id, stream = stream.as_str(), "output for unknown execution dropped");
            return;
        };

        let mut guard = entry.lock();
        if guard.execution.is_terminal() {
            tracing::debug!(execution = id, stream = stream.as_str(), "output after terminal state dropped");
            return;
        }
        guard.execution.output_mut(stream).push(chunk);
    }

    /// Record the process exit. Idempotent: only the first terminal transition counts.
    pub fn complete(&self, id: &str, exit_code: i32) {
        let Some(entry) = self.entry(id) else {
            tracing::debug!(execution = id, exit_code, "completion for unknown execution dropped");
            return;
        };

        let mut guard = entry.lock();
        if guard.execution.is_terminal() {
            tracing::debug!(execution = id, exit_code, "completion after terminal state ignored");
            return;
        }
        let status = ExecutionStatus::from_exit_code(exit_code);
        guard.execution.finish(status, exit_code);
        guard.terminator = None;
        tracing::info!(
            execution = id,
            tool = %guard.execution.tool,
            exit_code,
            status = status.as_str(),
            "execution finished"
        );
    }

    /// Owned copy of the execution as of now.
    pub fn snapshot(&self, id: &str) -> Option<Execution> {
        self.entry(id).map(|entry| entry.lock().execution.clone())
    }

    /// Mark a running execution failed and request process termination.
    pub fn cancel(&self, id: &str) -> CancelOutcome {
        let Some(entry) = self.entry(id) else {
            return CancelOutcome::NotFound;
        };

        let terminator = {
            let mut guard = entry.lock();
            if guard.execution.is_terminal() {
                return CancelOutcome::AlreadyTerminal;
            }
            guard.execution.cancelled = true;
            guard
                .execution
                .stderr
                .push(CANCELLED_MARKER.to_string());
            guard
                .execution
                .finish(ExecutionStatus::Failed, CANCELLED_EXIT_CODE);
            guard.terminator.take()
        };

        tracing::info!(execution = id, "execution cancelled");
        if let Some(mut terminator) = terminator
            && let Err(err) = terminator.kill()
        {
            tracing::warn!(execution = id, error = %err, "failed to terminate cancelled execution");
        }
        CancelOutcome::Cancelled
    }

    pub fn ids(&self) -> Vec<ExecutionId> {
        let mut ids: Vec<ExecutionId> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTerminator(Arc<AtomicUsize>);

    impl ChildTerminator for CountingTerminator {
        fn kill(&mut self) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| (*arg).to_string()).collect()
    }

    #[test]
    fn create_starts_running_with_empty_output() {
        let registry = ExecutionRegistry::new();
        let id = registry.create("nmap", args(&["-sV", "host"]));

        let snapshot = registry.snapshot(id.as_str()).expect("execution exists");
        assert_eq!(snapshot.status, ExecutionStatus::Running);
        assert_eq!(snapshot.tool, "nmap");
        assert_eq!(snapshot.args, args(&["-sV", "host"]));
        assert!(snapshot.stdout.is_empty());
        assert!(snapshot.end_time.is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_creates_never_share_ids() {
        let registry = Arc::new(ExecutionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| registry.create("dig", Vec::new()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("thread panicked") {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 2_000);
        assert_eq!(registry.len(), 2_000);
    }

    #[test]
    fn output_only_grows_and_keeps_order() {
        let registry = ExecutionRegistry::new();
        let id = registry.create("dig", Vec::new());

        let mut previous = 0;
        for n in 0..20 {
            registry.append_output(id.as_str(), OutputStream::Stdout, format!("line {n}\n"));
            let snapshot = registry.snapshot(id.as_str()).expect("execution exists");
            assert!(snapshot.stdout.len() > previous);
            previous = snapshot.stdout.len();
        }
        let snapshot = registry.snapshot(id.as_str()).expect("execution exists");
        assert_eq!(snapshot.stdout.first().map(String::as_str), Some("line 0\n"));
        assert_eq!(snapshot.stdout.last().map(String::as_str), Some("line 19\n"));
        assert!(snapshot.stderr.is_empty());
    }

    #[test]
    fn complete_is_idempotent() {
        let registry = ExecutionRegistry::new();
        let id = registry.create("curl", Vec::new());

        registry.complete(id.as_str(), 0);
        let first = registry.snapshot(id.as_str()).expect("execution exists");
        registry.complete(id.as_str(), 7);
        let second = registry.snapshot(id.as_str()).expect("execution exists");

        assert_eq!(first.status, ExecutionStatus::Completed);
        assert_eq!(first, second);
    }

    #[test]
    fn nonzero_exit_fails() {
        let registry = ExecutionRegistry::new();
        let id = registry.create("curl", Vec::new());
        registry.complete(id.as_str(), 6);

        let snapshot = registry.snapshot(id.as_str()).expect("execution exists");
        assert_eq!(snapshot.status, ExecutionStatus::Failed);
        assert_eq!(snapshot.exit_code, Some(6));
        assert!(snapshot.end_time.is_some());
        assert!(!snapshot.cancelled);
    }

    #[test]
    fn output_after_terminal_is_absorbed() {
        let registry = ExecutionRegistry::new();
        let id = registry.create("whois", Vec::new());
        registry.append_output(id.as_str(), OutputStream::Stdout, "a\n".to_string());
        registry.complete(id.as_str(), 0);
        registry.append_output(id.as_str(), OutputStream::Stdout, "late\n".to_string());

        let snapshot = registry.snapshot(id.as_str()).expect("execution exists");
        assert_eq!(snapshot.stdout, vec!["a\n".to_string()]);
    }

    #[test]
    fn unknown_ids_are_absorbed() {
        let registry = ExecutionRegistry::new();
        registry.append_output("exec-0-deadbeef", OutputStream::Stderr, "x\n".to_string());
        registry.complete("exec-0-deadbeef", 0);

        assert!(registry.is_empty());
        assert!(registry.snapshot("exec-0-deadbeef").is_none());
        assert_eq!(registry.cancel("exec-0-deadbeef"), CancelOutcome::NotFound);
    }

    #[test]
    fn cancel_marks_failed_and_kills_once() {
        let registry = ExecutionRegistry::new();
        let kills = Arc::new(AtomicUsize::new(0));
        let id = registry.create("nuclei", Vec::new());
        registry.attach_terminator(id.as_str(), Box::new(CountingTerminator(Arc::clone(&kills))));

        assert_eq!(registry.cancel(id.as_str()), CancelOutcome::Cancelled);
        assert_eq!(registry.cancel(id.as_str()), CancelOutcome::AlreadyTerminal);
        assert_eq!(kills.load(Ordering::SeqCst), 1);

        let snapshot = registry.snapshot(id.as_str()).expect("execution exists");
        assert_eq!(snapshot.status, ExecutionStatus::Failed);
        assert_eq!(snapshot.exit_code, Some(CANCELLED_EXIT_CODE));
        assert!(snapshot.cancelled);
        assert_eq!(snapshot.stderr.last().map(String::as_str), Some(CANCELLED_MARKER));

        registry.complete(id.as_str(), 0);
        let after_exit = registry.snapshot(id.as_str()).expect("execution exists");
        assert_eq!(after_exit.status, ExecutionStatus::Failed);
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let registry = ExecutionRegistry::new();
        let kills = Arc::new(AtomicUsize::new(0));
        let id = registry.create("dig", Vec::new());
        registry.attach_terminator(id.as_str(), Box::new(CountingTerminator(Arc::clone(&kills))));
        registry.complete(id.as_str(), 0);

        assert_eq!(registry.cancel(id.as_str()), CancelOutcome::AlreadyTerminal);
        assert_eq!(kills.load(Ordering::SeqCst), 0);
        let snapshot = registry.snapshot(id.as_str()).expect("execution exists");
        assert_eq!(snapshot.status, ExecutionStatus::Completed);
    }

    #[test]
    fn terminator_attached_after_cancel_fires_immediately() {
        let registry = ExecutionRegistry::new();
        let kills = Arc::new(AtomicUsize::new(0));
        let id = registry.create("ffuf", Vec::new());

        assert_eq!(registry.cancel(id.as_str()), CancelOutcome::Cancelled);
        registry.attach_terminator(id.as_str(), Box::new(CountingTerminator(Arc::clone(&kills))));
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ids_are_listed_in_order() {
        let registry = ExecutionRegistry::new();
        let a = registry.create("dig", Vec::new());
        let b = registry.create("dig", Vec::new());
        let ids = registry.ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }
}
