#![forbid(unsafe_code)]

mod hivelog;
mod resolve;

pub(crate) use resolve::ResolveCtx;

use crate::domain::TaintTag;
use crate::report::{NodeId, Report};
use parking_lot::Mutex;
use tracing::debug;

/// Dynamic information flow tracking engine (DIFT).
pub trait TaintEngine: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// OR-merge `tag` into the disk bitmap over `[start, start + len)`.
    /// Callers hold the emulator's global serialization around this.
    fn contaminate_disk_or(&self, start: u64, len: u64, tag: TaintTag);

    /// Tag bitmask recorded for a disk address.
    fn disk_dirty(&self, addr: u64) -> u64;

    /// Whether a physical memory byte carries any tag at all.
    fn memory_dirty(&self, addr: u64) -> bool;
}

/// Report nodes the taint channel writes into.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TaintArtifacts {
    pub files: NodeId,
    pub registry: NodeId,
    pub packets: NodeId,
}

/// Arm the taint channel: create the `TAINT` sub-object and pre-taint the
/// sample's on-disk extents with the task's tag.
pub(crate) fn arm(
    ctx: &ResolveCtx<'_>,
    report: &Mutex<Report>,
    guest_path: &str,
    tag: TaintTag,
) -> TaintArtifacts {
    let artifacts = {
        let mut report = report.lock();
        let root = report.root();
        let taint = report.add_object(root, "TAINT");
        TaintArtifacts {
            files: report.add_array(taint, "Tainted File"),
            registry: report.add_array(taint, "Tainted Registry"),
            packets: report.add_array(taint, "Tainted Packet"),
        }
    };
    let marked = resolve::mark_sample_tainted(ctx, guest_path, tag);
    debug!(guest_path, marked, "sample extents pre-tainted");
    artifacts
}

/// Harvest the taint channel: resolve every dirty disk range back to file
/// and registry names and append them to the report.
pub(crate) fn harvest(
    ctx: &ResolveCtx<'_>,
    report: &Mutex<Report>,
    artifacts: TaintArtifacts,
    tag: TaintTag,
) {
    let files = resolve::enumerate_tainted_files(ctx, tag);
    let values = resolve::enumerate_tainted_registry(ctx, tag);
    debug!(
        files = files.len(),
        registry_values = values.len(),
        "taint harvest complete"
    );

    let mut report = report.lock();
    for name in files {
        report.push_string(artifacts.files, name);
    }
    for value in values {
        report.push_string(artifacts.registry, value);
    }
}
