#![forbid(unsafe_code)]

use crate::error::Error;

/// Opaque handle to a disk image backing a guest block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub u64);

/// A resolved block device: its backing image and total size in bytes.
#[derive(Debug, Clone, Copy)]
pub struct DiskRef {
    pub image: ImageId,
    pub capacity: u64,
}

/// The surrounding full-system emulator.
pub trait Emulator: Send + Sync {
    /// Disk image backing the guest's primary block device, if one is
    /// attached.
    fn primary_disk(&self) -> Option<DiskRef>;

    /// Read guest physical memory into `buf`.
    fn read_phys(&self, addr: u64, buf: &mut [u8]) -> Result<(), Error>;

    /// Enter the emulator's global serialization for state-affecting
    /// operations. Held only around taint-bitmap mutations, never across a
    /// whole resolution scan.
    fn pause(&self);

    /// Leave the global serialization.
    fn resume(&self);
}
