#![forbid(unsafe_code)]

mod hive;
mod range;
mod tag;
mod task;

pub use hive::HiveKind;
pub use range::{ByteRange, logical_offset};
pub use tag::TaintTag;
pub use task::{StateCell, TaskId, TaskState};
