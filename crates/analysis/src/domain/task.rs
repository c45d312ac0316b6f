#![forbid(unsafe_code)]

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Index into the task table. Only meaningful while smaller than the
/// configured table capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

impl TaskId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task lifecycle. `Idle` accepts configuration, `Busy` means the analysis
/// procedure is running, `Done` is terminal until the slot is recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Idle = 0,
    Busy = 1,
    Done = 2,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Idle => "idle",
            TaskState::Busy => "busy",
            TaskState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Atomic task-state cell, shared between the control thread, the task's
/// analysis procedure, and the packet-capture callback. Doubles as the
/// completion signal for the detached analysis task.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: TaskState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> TaskState {
        match self.0.load(Ordering::SeqCst) {
            0 => TaskState::Idle,
            1 => TaskState::Busy,
            _ => TaskState::Done,
        }
    }

    pub fn store(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}
