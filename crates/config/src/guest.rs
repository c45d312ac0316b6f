use serde::{Deserialize, Serialize};

/// Guest build profile.
///
/// Syscall numbers and unexported kernel symbols are not stable across
/// Windows builds, so anything the syscall channel matches on numerically
/// is configured here rather than hardcoded. Defaults target Windows 7
/// SP1 x86.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Guest {
    /// Kernel export hooked to observe process creation.
    pub process_create_export: String,

    pub nt_create_file: u32,
    pub nt_create_key: u32,
    pub nt_open_key: u32,
    pub nt_open_key_ex: u32,
}

impl Default for Guest {
    fn default() -> Self {
        Self {
            process_create_export: "PspInsertProcess".into(),
            nt_create_file: 0x42,
            nt_create_key: 0x46,
            nt_open_key: 0xb6,
            nt_open_key_ex: 0xb7,
        }
    }
}
