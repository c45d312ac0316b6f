use crate::domain::TaskState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Analysis failure: {0}")]
    Fail(String),

    #[error("Task table is full")]
    TaskTableFull,

    #[error("Task id {0} is out of range or unallocated")]
    InvalidId(usize),

    #[error("Operation not allowed while task is {0}")]
    InvalidState(TaskState),

    #[error("Sample path is missing or invalid")]
    InvalidSample,

    #[error("Taint tag 0 is reserved")]
    InvalidTaintTag,

    #[error("Taint engine is not enabled")]
    TaintEngineNotReady,

    #[error("Guest agent is not ready")]
    AgentNotReady,
}
