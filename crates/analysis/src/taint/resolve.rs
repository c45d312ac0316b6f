#![forbid(unsafe_code)]

use crate::domain::{ByteRange, HiveKind, TaintTag, logical_offset};
use crate::emulator::Emulator;
use crate::index::ForensicIndex;
use crate::taint::TaintEngine;
use crate::taint::hivelog;
use itertools::Itertools;
use tracing::{debug, warn};

/// Collaborators the resolution algorithms run against.
pub(crate) struct ResolveCtx<'a> {
    pub emulator: &'a dyn Emulator,
    pub taint: &'a dyn TaintEngine,
    pub index: &'a dyn ForensicIndex,
    /// Dirty-scan stride.
    pub block_size: u64,
}

/// Mark the sample's on-disk extents tainted before it runs.
///
/// Each extent's start address is re-resolved through the index and only
/// extents still mapping to the sample path (case-insensitive) are marked:
/// the extent list may be stale when the guest renamed or reused clusters
/// between materialization and this call. Marking covers `[start, end]`
/// inclusive. An absent file is not an error, it just means nothing was
/// flushed to disk yet.
///
/// Returns the number of extents marked.
pub(crate) fn mark_sample_tainted(ctx: &ResolveCtx<'_>, guest_path: &str, tag: TaintTag) -> usize {
    let Some(disk) = ctx.emulator.primary_disk() else {
        warn!("no primary disk attached; skipping pre-taint");
        return 0;
    };

    let extents = ctx.index.ranges_for_path(disk.image, guest_path);
    if extents.is_empty() {
        debug!(guest_path, "sample not materialized on disk; no pre-taint");
        return 0;
    }

    let mut marked = 0;
    for extent in &extents {
        let owners = ctx.index.paths_at(disk.image, extent.start);
        if !owners
            .iter()
            .any(|owner| owner.eq_ignore_ascii_case(guest_path))
        {
            debug!(?extent, "extent no longer maps to the sample; skipped");
            continue;
        }
        ctx.emulator.pause();
        ctx.taint.contaminate_disk_or(extent.start, extent.len() + 1, tag);
        ctx.emulator.resume();
        marked += 1;
    }
    marked
}

/// Enumerate files whose on-disk bytes picked up the task's tag.
///
/// Scans the whole device in block strides. Every resolved file's extent
/// list feeds a skip-ahead set so the scan jumps past bytes it already
/// attributed instead of re-resolving them block by block. Output is
/// sorted and deduplicated by comparing each name to its immediate
/// predecessor.
pub(crate) fn enumerate_tainted_files(ctx: &ResolveCtx<'_>, tag: TaintTag) -> Vec<String> {
    let Some(disk) = ctx.emulator.primary_disk() else {
        return Vec::new();
    };

    let mut known: Vec<ByteRange> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut addr = 0u64;
    while addr < disk.capacity {
        if let Some(extent) = known.iter().find(|extent| extent.contains(addr)) {
            addr = extent.end;
            continue;
        }
        if !tag.intersects(ctx.taint.disk_dirty(addr)) {
            addr += ctx.block_size;
            continue;
        }

        let owners = ctx.index.paths_at(disk.image, addr);
        if owners.is_empty() {
            addr += ctx.block_size;
            continue;
        }

        let extents = ctx.index.ranges_for_path(disk.image, &owners[0]);
        let jump = extents
            .iter()
            .find(|extent| extent.contains(addr))
            .map(|extent| extent.end);
        known.extend(extents);
        names.extend(owners);
        addr = match jump {
            Some(end) => end,
            None => addr + ctx.block_size,
        };
    }

    names.sort();
    names.into_iter().dedup().collect()
}

/// Enumerate registry values whose hive bytes picked up the task's tag,
/// both directly in the hive files and through their transaction logs.
pub(crate) fn enumerate_tainted_registry(ctx: &ResolveCtx<'_>, tag: TaintTag) -> Vec<String> {
    let Some(disk) = ctx.emulator.primary_disk() else {
        return Vec::new();
    };

    let mut values: Vec<String> = Vec::new();
    for hive in HiveKind::ALL {
        let hive_ranges = ctx.index.ranges_for_path(disk.image, hive.guest_path());
        if hive_ranges.is_empty() {
            continue;
        }

        for &addr in &dirty_addresses(ctx, tag, &hive_ranges) {
            if let Some(offset) = logical_offset(&hive_ranges, addr) {
                values.extend(ctx.index.registry_values_at(hive, offset, &hive_ranges));
            }
        }

        for log_path in hive.log_paths() {
            replay_hive_log(ctx, tag, hive, &hive_ranges, &log_path, &mut values);
        }
    }

    values.sort();
    values.into_iter().dedup().collect()
}

/// Resolve dirty bytes of one transaction log back to registry values.
///
/// A dirty disk address inside the log is first turned into a logical
/// offset within the log file (the log may be fragmented), then mapped
/// through the log's dirty-page table to the absolute hive-file offset the
/// page was captured from, and finally resolved against the hive's value
/// index.
fn replay_hive_log(
    ctx: &ResolveCtx<'_>,
    tag: TaintTag,
    hive: HiveKind,
    hive_ranges: &[ByteRange],
    log_path: &str,
    values: &mut Vec<String>,
) {
    let Some(disk) = ctx.emulator.primary_disk() else {
        return;
    };
    let log_ranges = ctx.index.ranges_for_path(disk.image, log_path);
    if log_ranges.is_empty() {
        return;
    }
    let dirty = dirty_addresses(ctx, tag, &log_ranges);
    if dirty.is_empty() {
        return;
    }

    let hive_bytes = match ctx.index.read_file(disk.image, hive.guest_path()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, hive = hive.guest_path(), "hive snapshot unreadable");
            return;
        }
    };
    if let Err(err) = ctx.index.parse_hive(hive, &hive_bytes) {
        warn!(%err, hive = hive.guest_path(), "hive snapshot unparsable");
        return;
    }
    let log_bytes = match ctx.index.read_file(disk.image, log_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, log_path, "transaction log unreadable");
            return;
        }
    };
    let log = match ctx.index.parse_hive_log(&log_bytes) {
        Ok(log) => log,
        Err(err) => {
            warn!(%err, log_path, "transaction log unparsable");
            return;
        }
    };

    let pages = hivelog::page_table(&log);
    for &addr in &dirty {
        let Some(log_pos) = logical_offset(&log_ranges, addr) else {
            continue;
        };
        let Some(offset) = hivelog::hive_offset_for(&pages, log_pos) else {
            continue;
        };
        values.extend(ctx.index.registry_values_at(hive, offset, hive_ranges));
    }
}

/// Disk addresses within `ranges` that are dirty for `tag`, in block
/// strides.
fn dirty_addresses(ctx: &ResolveCtx<'_>, tag: TaintTag, ranges: &[ByteRange]) -> Vec<u64> {
    let mut dirty = Vec::new();
    for range in ranges {
        let mut addr = range.start;
        while addr < range.end {
            if tag.intersects(ctx.taint.disk_dirty(addr)) {
                dirty.push(addr);
            }
            addr += ctx.block_size;
        }
    }
    dirty
}
