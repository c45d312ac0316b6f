#![forbid(unsafe_code)]

pub mod agent;
pub mod clock;
pub mod domain;
pub mod emulator;
pub mod engine;
pub mod error;
pub mod index;
pub mod net;
pub mod report;
pub mod syscall;
pub mod taint;
pub mod tasks;

pub use agent::GuestAgent;
pub use clock::{Clock, SystemClock};
pub use domain::{ByteRange, HiveKind, StateCell, TaintTag, TaskId, TaskState};
pub use emulator::{DiskRef, Emulator, ImageId};
pub use engine::{AnalysisEngine, Collaborators};
pub use error::Error;
pub use index::{DirtyPage, ForensicIndex, HiveLog, LogTransaction};
pub use net::{
    CaptureHandle, NetworkChannel, PacketCorrelator, PacketLayer, PacketObserver, ParsedPacket,
    Protocol,
};
pub use report::{NodeId, Report};
pub use syscall::{
    HookId, ProcessObserver, SyscallChannel, SyscallEvent, SyscallFilter, SyscallLayer,
    SyscallObserver, TraceId,
};
pub use taint::TaintEngine;
pub use tasks::{NotificationSink, TaskView};
