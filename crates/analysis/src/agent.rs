#![forbid(unsafe_code)]

use crate::error::Error;
use async_trait::async_trait;
use std::path::Path;

/// The in-guest helper process that imports files into the guest
/// filesystem and launches them.
///
/// The underlying protocol is request/response: a request is issued and
/// the agent is busy until it reports idle again. Implementations resolve
/// their futures at that point, so callers keep the issue-then-wait
/// ordering without polling.
#[async_trait]
pub trait GuestAgent: Send + Sync {
    /// Copy `host_path` into the guest filesystem at `guest_path`.
    async fn import(&self, guest_path: &str, host_path: &Path) -> Result<(), Error>;

    /// Execute the file at `guest_path` inside the guest.
    async fn invoke(&self, guest_path: &str) -> Result<(), Error>;

    /// Flush guest filesystem caches to the block device.
    async fn sync_guest(&self) -> Result<(), Error>;

    fn is_ready(&self) -> bool;
}
