#![forbid(unsafe_code)]

use crate::agent::GuestAgent;
use crate::clock::Clock;
use crate::domain::{StateCell, TaintTag, TaskId, TaskState};
use crate::emulator::Emulator;
use crate::error::Error;
use crate::index::ForensicIndex;
use crate::net::{NetworkChannel, PacketCorrelator, PacketLayer};
use crate::report::Report;
use crate::syscall::{SyscallChannel, SyscallLayer};
use crate::taint::{self, ResolveCtx, TaintEngine};
use crate::tasks::{NotificationSink, TaskSpec, TaskTable, TaskView};
use config::Config;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// External collaborator seams, bundled once at construction.
pub struct Collaborators {
    pub agent: Arc<dyn GuestAgent>,
    pub emulator: Arc<dyn Emulator>,
    pub taint: Arc<dyn TaintEngine>,
    pub index: Arc<dyn ForensicIndex>,
    pub syscalls: Arc<dyn SyscallLayer>,
    pub packets: Arc<dyn PacketLayer>,
    pub clock: Arc<dyn Clock>,
}

/// The task orchestrator: owns the task table and drives analyses.
///
/// The management API is meant for a single control thread; analysis
/// procedures run as detached Tokio tasks and never touch the table, only
/// their own task's state cell and report plus the shared channel
/// controllers. `start` therefore requires a Tokio runtime context.
pub struct AnalysisEngine {
    config: Config,
    collab: Arc<Collaborators>,
    tasks: Mutex<TaskTable>,
    syscall_channel: Arc<SyscallChannel>,
    network: Arc<NetworkChannel>,
}

impl AnalysisEngine {
    pub fn new(config: Config, collab: Collaborators) -> Self {
        let collab = Arc::new(collab);
        let syscall_channel = SyscallChannel::new(
            Arc::clone(&collab.syscalls),
            Arc::clone(&collab.emulator),
            &config,
        );
        let network = Arc::new(NetworkChannel::new(Arc::clone(&collab.packets)));
        let tasks = Mutex::new(TaskTable::new(
            config.system.max_tasks,
            config.system.default_timeout,
        ));
        Self {
            config,
            collab,
            tasks,
            syscall_channel,
            network,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate an idle task with an empty report.
    pub fn new_task(&self) -> Result<TaskId, Error> {
        self.tasks.lock().new_task()
    }

    /// Free a task's slot and destroy its report. Refused while busy.
    pub fn delete_task(&self, id: TaskId) -> Result<(), Error> {
        self.tasks.lock().delete_task(id)
    }

    /// Read-only snapshot of a task, `Ok(None)` for an empty slot.
    pub fn task(&self, id: TaskId) -> Result<Option<TaskView>, Error> {
        self.tasks.lock().get(id)
    }

    pub fn set_timer(&self, id: TaskId, timeout: Duration) -> Result<(), Error> {
        self.with_idle(id, |spec| {
            spec.timeout = timeout;
            Ok(())
        })
    }

    /// Store the host sample path and derive the guest path from the
    /// configured guest sample directory and the host base name.
    pub fn set_sample_path(&self, id: TaskId, host_path: &Path) -> Result<(), Error> {
        let system = &self.config.system;
        self.with_idle(id, |spec| {
            let text = host_path.to_str().ok_or(Error::InvalidSample)?;
            if text.is_empty() || text.len() > system.max_sample_path {
                return Err(Error::InvalidSample);
            }
            let base = host_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or(Error::InvalidSample)?;
            spec.guest_path = join_guest_path(&system.guest_sample_dir, base);
            spec.host_path = host_path.to_path_buf();
            Ok(())
        })
    }

    /// Enable the taint channel. Tag 0 is reserved and rejected.
    pub fn enable_taint(&self, id: TaskId, tag: u64) -> Result<(), Error> {
        let tag = TaintTag::new(tag).ok_or(Error::InvalidTaintTag)?;
        self.with_idle(id, |spec| {
            spec.taint = Some(tag);
            Ok(())
        })
    }

    pub fn disable_taint(&self, id: TaskId) -> Result<(), Error> {
        self.with_idle(id, |spec| {
            spec.taint = None;
            Ok(())
        })
    }

    pub fn enable_syscall_trace(&self, id: TaskId) -> Result<(), Error> {
        self.with_idle(id, |spec| {
            spec.syscall_trace = true;
            Ok(())
        })
    }

    pub fn disable_syscall_trace(&self, id: TaskId) -> Result<(), Error> {
        self.with_idle(id, |spec| {
            spec.syscall_trace = false;
            Ok(())
        })
    }

    pub fn set_notification_sink(
        &self,
        id: TaskId,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<(), Error> {
        let mut tasks = self.tasks.lock();
        let task = tasks.task_mut(id)?;
        let state = task.state();
        if state != TaskState::Idle {
            return Err(Error::InvalidState(state));
        }
        task.set_notify_sink(sink);
        Ok(())
    }

    /// Start a task's analysis. Pre-flight checks are synchronous; on
    /// success the task turns busy and the procedure runs detached. Any
    /// failure past this point is absorbed into the report.
    pub fn start(&self, id: TaskId) -> Result<(), Error> {
        let run = {
            let tasks = self.tasks.lock();
            let task = tasks.task(id)?;
            let state = task.state();
            if state != TaskState::Idle {
                return Err(Error::InvalidState(state));
            }
            let spec = task.spec().clone();
            if !spec.sample_is_valid() {
                return Err(Error::InvalidSample);
            }
            if !self.collab.agent.is_ready() {
                return Err(Error::AgentNotReady);
            }
            if spec.taint.is_some() && !self.collab.taint.is_enabled() {
                return Err(Error::TaintEngineNotReady);
            }

            task.state_cell().store(TaskState::Busy);
            AnalysisRun {
                id,
                spec,
                state: Arc::clone(task.state_cell()),
                report: Arc::clone(task.report()),
                notify: task.notify_sink(),
                collab: Arc::clone(&self.collab),
                syscall_channel: Arc::clone(&self.syscall_channel),
                network: Arc::clone(&self.network),
                block_size: self.config.system.block_size,
            }
        };
        info!(%id, "analysis started");
        tokio::spawn(run.execute());
        Ok(())
    }

    fn with_idle<R>(
        &self,
        id: TaskId,
        mutate: impl FnOnce(&mut TaskSpec) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut tasks = self.tasks.lock();
        let task = tasks.task_mut(id)?;
        let state = task.state();
        if state != TaskState::Idle {
            return Err(Error::InvalidState(state));
        }
        mutate(task.spec_mut())
    }
}

/// Everything one detached analysis procedure owns.
struct AnalysisRun {
    id: TaskId,
    spec: TaskSpec,
    state: Arc<StateCell>,
    report: Arc<Mutex<Report>>,
    notify: Option<Arc<dyn NotificationSink>>,
    collab: Arc<Collaborators>,
    syscall_channel: Arc<SyscallChannel>,
    network: Arc<NetworkChannel>,
    block_size: u64,
}

impl AnalysisRun {
    /// The analysis procedure: import, arm, invoke, wait, disarm,
    /// harvest. Runs strictly in order; the timeout wait is the single
    /// long suspension point.
    async fn execute(self) {
        let collab = &self.collab;

        debug!(id = %self.id, guest = %self.spec.guest_path, "importing sample");
        if let Err(err) = collab
            .agent
            .import(&self.spec.guest_path, &self.spec.host_path)
            .await
        {
            warn!(id = %self.id, %err, "sample import failed; continuing");
        }
        if let Err(err) = collab.agent.sync_guest().await {
            warn!(id = %self.id, %err, "guest sync failed; continuing");
        }

        let ctx = ResolveCtx {
            emulator: collab.emulator.as_ref(),
            taint: collab.taint.as_ref(),
            index: collab.index.as_ref(),
            block_size: self.block_size,
        };

        let mut taint_run = None;
        if let Some(tag) = self.spec.taint {
            let artifacts = taint::arm(&ctx, &self.report, &self.spec.guest_path, tag);
            let correlator = Arc::new(PacketCorrelator::new(
                Arc::clone(&self.state),
                Arc::clone(&self.report),
                artifacts.packets,
                Arc::clone(&collab.emulator),
                Arc::clone(&collab.taint),
                Arc::clone(&collab.packets),
            ));
            let handle = self.network.arm(correlator);
            taint_run = Some((tag, artifacts, handle));
        }

        if self.spec.syscall_trace {
            let image = guest_basename(&self.spec.guest_path);
            SyscallChannel::arm(&self.syscall_channel, self.id, &image, &self.report);
        }

        debug!(id = %self.id, "invoking sample");
        if let Err(err) = collab.agent.invoke(&self.spec.guest_path).await {
            warn!(id = %self.id, %err, "sample invocation failed; continuing");
        }
        collab.clock.sleep(self.spec.timeout).await;
        if let Err(err) = collab.agent.sync_guest().await {
            warn!(id = %self.id, %err, "guest sync failed; continuing");
        }

        if let Some((tag, artifacts, handle)) = taint_run {
            self.network.disarm(handle);
            taint::harvest(&ctx, &self.report, artifacts, tag);
        }
        if self.spec.syscall_trace {
            self.syscall_channel.disarm(self.id);
        }

        self.state.store(TaskState::Done);
        info!(id = %self.id, "analysis finished");
        if let Some(sink) = &self.notify {
            sink.notify(self.id, "analysis finished");
        }
    }
}

/// Base file name of a guest path, whichever separator the guest uses.
fn guest_basename(path: &str) -> String {
    path.rsplit(['\\', '/'])
        .next()
        .unwrap_or(path)
        .to_string()
}

/// Textual join: guest paths are not host `Path`s.
fn join_guest_path(dir: &str, base: &str) -> String {
    if dir.ends_with('\\') || dir.ends_with('/') {
        format!("{dir}{base}")
    } else {
        format!("{dir}\\{base}")
    }
}
