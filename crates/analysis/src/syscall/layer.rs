#![forbid(unsafe_code)]

use std::sync::Arc;

/// Identifier of an installed process-creation hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(pub u64);

/// Identifier of a low-level per-address-space trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(pub u64);

/// Which syscall numbers a trace matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallFilter {
    Any,
    Number(u32),
}

impl SyscallFilter {
    pub fn matches(self, number: u32) -> bool {
        match self {
            SyscallFilter::Any => true,
            SyscallFilter::Number(wanted) => wanted == number,
        }
    }
}

/// One intercepted syscall entry.
#[derive(Debug, Clone, Copy)]
pub struct SyscallEvent {
    pub number: u32,
    /// Physical address of the object-name structure argument, when the
    /// interception layer captured one.
    pub name_arg: Option<u64>,
}

/// Invoked for every intercepted syscall of an attached trace.
pub trait SyscallObserver: Send + Sync {
    fn on_syscall(&self, event: &SyscallEvent);
}

/// Invoked when the guest creates a process.
pub trait ProcessObserver: Send + Sync {
    fn on_process_created(&self, image_name: &str, address_space: u64);
}

/// System-call interception layer of the emulator.
pub trait SyscallLayer: Send + Sync {
    /// Guest virtual address of an exported kernel symbol, if resolvable.
    fn resolve_kernel_export(&self, symbol: &str) -> Option<u64>;

    /// Install the process-creation hook at `addr`.
    fn hook_process_creation(&self, addr: u64, observer: Arc<dyn ProcessObserver>) -> HookId;

    /// Attach a syscall trace for one guest address space.
    fn attach_trace(
        &self,
        address_space: u64,
        filter: SyscallFilter,
        observer: Arc<dyn SyscallObserver>,
    ) -> TraceId;

    fn detach_trace(&self, trace: TraceId);
}
