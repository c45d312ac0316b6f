#![forbid(unsafe_code)]

use crate::domain::{StateCell, TaintTag, TaskId, TaskState};
use crate::report::Report;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Receives progress notifications for a task.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, id: TaskId, message: &str);
}

/// Pre-start configuration. Mutable only while the task is idle; the
/// analysis procedure runs against a clone taken at start.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Host-side path of the sample file.
    pub host_path: PathBuf,
    /// Derived guest-side path: the guest sample directory joined with the
    /// host file's base name.
    pub guest_path: String,
    /// How long the invoked sample is left running.
    pub timeout: Duration,
    /// Taint channel: enabled iff a tag is set.
    pub taint: Option<TaintTag>,
    /// Syscall channel.
    pub syscall_trace: bool,
}

impl TaskSpec {
    fn new(timeout: Duration) -> Self {
        Self {
            host_path: PathBuf::new(),
            guest_path: String::new(),
            timeout,
            taint: None,
            syscall_trace: false,
        }
    }

    /// A sample is startable only with both paths present.
    pub fn sample_is_valid(&self) -> bool {
        !self.host_path.as_os_str().is_empty() && !self.guest_path.is_empty()
    }
}

/// One analysis task: lifecycle state, configuration, and its report.
/// Owned exclusively by the task table; callers see [`TaskView`]s.
pub struct Task {
    id: TaskId,
    state: Arc<StateCell>,
    report: Arc<Mutex<Report>>,
    spec: TaskSpec,
    notify: Option<Arc<dyn NotificationSink>>,
}

impl Task {
    pub(crate) fn new(id: TaskId, default_timeout: Duration) -> Self {
        Self {
            id,
            state: Arc::new(StateCell::new(TaskState::Idle)),
            report: Arc::new(Mutex::new(Report::new())),
            spec: TaskSpec::new(default_timeout),
            notify: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state.load()
    }

    pub(crate) fn state_cell(&self) -> &Arc<StateCell> {
        &self.state
    }

    pub(crate) fn report(&self) -> &Arc<Mutex<Report>> {
        &self.report
    }

    pub(crate) fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    pub(crate) fn spec_mut(&mut self) -> &mut TaskSpec {
        &mut self.spec
    }

    pub(crate) fn notify_sink(&self) -> Option<Arc<dyn NotificationSink>> {
        self.notify.clone()
    }

    pub(crate) fn set_notify_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.notify = Some(sink);
    }

    pub(crate) fn view(&self) -> TaskView {
        TaskView {
            id: self.id,
            state: self.state.load(),
            host_path: self.spec.host_path.clone(),
            guest_path: self.spec.guest_path.clone(),
            timeout: self.spec.timeout,
            taint: self.spec.taint,
            syscall_trace: self.spec.syscall_trace,
            report: self.report.lock().to_json(),
        }
    }
}

/// Read-only snapshot of a task handed to management-API callers.
#[derive(Debug, Clone)]
pub struct TaskView {
    pub id: TaskId,
    pub state: TaskState,
    pub host_path: PathBuf,
    pub guest_path: String,
    pub timeout: Duration,
    pub taint: Option<TaintTag>,
    pub syscall_trace: bool,
    pub report: serde_json::Value,
}
