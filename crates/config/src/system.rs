use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct System {
    /// Capacity of the task table. Analyses beyond this count are rejected
    /// until a slot is deleted or recycled.
    pub max_tasks: usize,

    /// Guest-side directory samples are imported into. The guest path of a
    /// sample is this directory joined with the host file's base name.
    ///
    /// ## Note
    ///
    /// Must end with the guest path separator; the join is textual because
    /// host-side `Path` semantics do not apply to guest paths.
    pub guest_sample_dir: String,

    /// Maximum accepted length of a host sample path, in bytes.
    pub max_sample_path: usize,

    /// Stride used when scanning the disk dirty bitmap. Matches the sector
    /// granularity the taint engine records at.
    pub block_size: u64,

    /// How long an invoked sample is left running before results are
    /// harvested. **Measured in seconds**.
    #[serde_as(as = "serde_with::DurationSeconds")]
    pub default_timeout: Duration,

    /// Truncation limit for string arguments extracted from guest memory
    /// by the syscall channel.
    pub max_object_name: usize,
}

impl Default for System {
    fn default() -> Self {
        Self {
            max_tasks: 32,
            guest_sample_dir: "C:\\samples\\".into(),
            max_sample_path: 255,
            block_size: 512,
            default_timeout: Duration::from_secs(120),
            max_object_name: 256,
        }
    }
}
