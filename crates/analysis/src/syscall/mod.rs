#![forbid(unsafe_code)]

mod layer;
mod objname;

pub use layer::{
    HookId, ProcessObserver, SyscallEvent, SyscallFilter, SyscallLayer, SyscallObserver, TraceId,
};

use crate::domain::TaskId;
use crate::emulator::Emulator;
use crate::report::{NodeId, Report};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a trace subscription writes for each event.
#[derive(Debug, Clone, Copy)]
enum SinkKind {
    /// The invocation number of every matched syscall.
    Invocations,
    /// The object-name string argument, read out of guest memory.
    ObjectName,
}

/// Report writer attached to one trace subscription.
struct TraceSink {
    kind: SinkKind,
    report: Arc<Mutex<Report>>,
    array: NodeId,
    emulator: Arc<dyn Emulator>,
    max_name: usize,
}

impl SyscallObserver for TraceSink {
    fn on_syscall(&self, event: &SyscallEvent) {
        match self.kind {
            SinkKind::Invocations => {
                self.report
                    .lock()
                    .push_string(self.array, format!("syscall {:#06x}", event.number));
            }
            SinkKind::ObjectName => {
                let Some(addr) = event.name_arg else {
                    return;
                };
                if let Some(name) =
                    objname::read_object_name(self.emulator.as_ref(), addr, self.max_name)
                {
                    self.report.lock().push_string(self.array, name);
                }
            }
        }
    }
}

/// One task's interest in one syscall pattern. Low-level traces are
/// attached lazily, per matching process creation.
struct Subscription {
    task: TaskId,
    /// Lower-cased image base name the process-creation hook matches on.
    image: String,
    filter: SyscallFilter,
    sink: Arc<TraceSink>,
    traces: Vec<TraceId>,
}

#[derive(Default)]
struct Inner {
    hook: Option<HookId>,
    subscriptions: Vec<Subscription>,
}

/// Syscall channel controller, shared by every task tracing syscalls.
///
/// The process-creation hook is installed once, on the first arm that can
/// resolve the configured kernel export, and stays for the process
/// lifetime. The subscription list is shared across concurrently busy
/// tasks; every access goes through one mutex, and the absent-hook check
/// plus installation form a single critical section so two tasks arming
/// at once cannot double-install.
pub struct SyscallChannel {
    layer: Arc<dyn SyscallLayer>,
    emulator: Arc<dyn Emulator>,
    guest: config::Guest,
    max_name: usize,
    inner: Mutex<Inner>,
}

impl SyscallChannel {
    pub fn new(
        layer: Arc<dyn SyscallLayer>,
        emulator: Arc<dyn Emulator>,
        cfg: &config::Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            layer,
            emulator,
            guest: cfg.guest.clone(),
            max_name: cfg.system.max_object_name,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Arm the channel for one task: create the five report arrays and
    /// register its trace subscriptions against the sample image name.
    ///
    /// If the kernel export backing the process-creation hook cannot be
    /// resolved, an `Error` field is recorded under `SYSCALL` and no
    /// subscriptions are installed; the task itself keeps running.
    pub(crate) fn arm(
        channel: &Arc<Self>,
        task: TaskId,
        image: &str,
        report: &Arc<Mutex<Report>>,
    ) {
        let (object, arrays) = {
            let mut report = report.lock();
            let root = report.root();
            let object = report.add_object(root, "SYSCALL");
            let arrays = [
                (SyscallFilter::Any, report.add_array(object, "Syscall Trace")),
                (
                    SyscallFilter::Number(channel.guest.nt_create_file),
                    report.add_array(object, "NtCreateFile"),
                ),
                (
                    SyscallFilter::Number(channel.guest.nt_create_key),
                    report.add_array(object, "NtCreateKey"),
                ),
                (
                    SyscallFilter::Number(channel.guest.nt_open_key),
                    report.add_array(object, "NtOpenKey"),
                ),
                (
                    SyscallFilter::Number(channel.guest.nt_open_key_ex),
                    report.add_array(object, "NtOpenKeyEx"),
                ),
            ];
            (object, arrays)
        };

        let mut inner = channel.inner.lock();
        if inner.hook.is_none() {
            let export = channel.guest.process_create_export.as_str();
            let Some(addr) = channel.layer.resolve_kernel_export(export) else {
                warn!(export, "kernel export not found; syscall channel degraded");
                drop(inner);
                report
                    .lock()
                    .add_text(object, "Error", format!("failed to resolve {export}"));
                return;
            };
            let observer = Arc::clone(channel) as Arc<dyn ProcessObserver>;
            inner.hook = Some(channel.layer.hook_process_creation(addr, observer));
            debug!(export, addr, "process-creation hook installed");
        }

        let image = image.to_ascii_lowercase();
        for (filter, array) in arrays {
            let kind = match filter {
                SyscallFilter::Any => SinkKind::Invocations,
                SyscallFilter::Number(_) => SinkKind::ObjectName,
            };
            inner.subscriptions.push(Subscription {
                task,
                image: image.clone(),
                filter,
                sink: Arc::new(TraceSink {
                    kind,
                    report: Arc::clone(report),
                    array,
                    emulator: Arc::clone(&channel.emulator),
                    max_name: channel.max_name,
                }),
                traces: Vec::new(),
            });
        }
        debug!(%task, %image, "syscall channel armed");
    }

    /// Remove every subscription owned by `task` and detach its traces.
    /// The process-creation hook stays installed.
    pub(crate) fn disarm(&self, task: TaskId) {
        let mut detach = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.subscriptions.retain_mut(|subscription| {
                if subscription.task == task {
                    detach.append(&mut subscription.traces);
                    false
                } else {
                    true
                }
            });
        }
        for trace in detach {
            self.layer.detach_trace(trace);
        }
        debug!(%task, "syscall channel disarmed");
    }
}

impl ProcessObserver for SyscallChannel {
    fn on_process_created(&self, image_name: &str, address_space: u64) {
        let image = image_name.to_ascii_lowercase();
        let mut inner = self.inner.lock();
        for subscription in inner
            .subscriptions
            .iter_mut()
            .filter(|subscription| subscription.image == image)
        {
            let trace = self.layer.attach_trace(
                address_space,
                subscription.filter,
                Arc::clone(&subscription.sink) as Arc<dyn SyscallObserver>,
            );
            subscription.traces.push(trace);
        }
    }
}
