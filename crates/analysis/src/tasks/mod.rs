#![forbid(unsafe_code)]

mod task;

pub use task::{NotificationSink, Task, TaskSpec, TaskView};

use crate::domain::{TaskId, TaskState};
use crate::error::Error;
use std::time::Duration;
use tracing::debug;

/// Fixed-capacity task table with round-robin slot reuse.
///
/// Slots hold their task exclusively. Allocation prefers a truly empty
/// slot anywhere in the cycle over recycling a finished task, so finished
/// reports survive as long as capacity allows.
pub struct TaskTable {
    slots: Vec<Option<Task>>,
    cursor: usize,
    default_timeout: Duration,
}

impl TaskTable {
    pub fn new(capacity: usize, default_timeout: Duration) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            cursor: 0,
            default_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Allocate a slot and construct an idle task in it.
    ///
    /// Scans one full cycle from the cursor: the first unoccupied slot
    /// wins; failing that, the first finished task seen is recycled (its
    /// report destroyed). The cursor moves to the allocated index.
    pub fn new_task(&mut self) -> Result<TaskId, Error> {
        let capacity = self.slots.len();
        let mut recyclable = None;
        let mut empty = None;
        for step in 0..capacity {
            let index = (self.cursor + step) % capacity;
            match &self.slots[index] {
                None => {
                    empty = Some(index);
                    break;
                }
                Some(task) if task.state() == TaskState::Done && recyclable.is_none() => {
                    recyclable = Some(index);
                }
                Some(_) => {}
            }
        }

        let index = empty.or(recyclable).ok_or(Error::TaskTableFull)?;
        if let Some(stale) = self.slots[index].take() {
            debug!(id = %stale.id(), "recycling finished task slot");
        }
        let id = TaskId::new(index);
        self.slots[index] = Some(Task::new(id, self.default_timeout));
        self.cursor = index;
        Ok(id)
    }

    /// Free a slot. Succeeds as a no-op when the slot is already empty;
    /// refuses while the task is busy.
    pub fn delete_task(&mut self, id: TaskId) -> Result<(), Error> {
        if id.index() >= self.slots.len() {
            return Err(Error::InvalidId(id.index()));
        }
        match &self.slots[id.index()] {
            None => Ok(()),
            Some(task) if task.state() == TaskState::Busy => {
                Err(Error::InvalidState(TaskState::Busy))
            }
            Some(_) => {
                self.slots[id.index()] = None;
                Ok(())
            }
        }
    }

    /// Read-only snapshot of a slot. `Ok(None)` for an in-range empty
    /// slot, `InvalidId` past the end of the table.
    pub fn get(&self, id: TaskId) -> Result<Option<TaskView>, Error> {
        if id.index() >= self.slots.len() {
            return Err(Error::InvalidId(id.index()));
        }
        Ok(self.slots[id.index()].as_ref().map(Task::view))
    }

    /// The task in `id`'s slot, or `InvalidId` when out of range or empty.
    pub(crate) fn task(&self, id: TaskId) -> Result<&Task, Error> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidId(id.index()))
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, Error> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidId(id.index()))
    }
}
