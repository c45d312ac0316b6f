#![forbid(unsafe_code)]

use crate::domain::{ByteRange, HiveKind};
use crate::emulator::ImageId;
use crate::error::Error;

/// One page captured by a hive transaction: where it lands in the hive
/// file and how many of its bytes are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyPage {
    pub hive_offset: u64,
    pub span: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTransaction {
    pub pages: Vec<DirtyPage>,
}

/// Decoded layout of a registry transaction log. Dirty-page payloads are
/// laid out back to back starting at `data_start`, in transaction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiveLog {
    pub data_start: u64,
    pub transactions: Vec<LogTransaction>,
}

/// Forensic filesystem/registry index over a disk image. Owns every
/// on-disk format; this crate only consumes resolved addresses and names.
pub trait ForensicIndex: Send + Sync {
    /// Extents backing `path`, in file order. Empty when the file is not
    /// materialized on disk.
    fn ranges_for_path(&self, image: ImageId, path: &str) -> Vec<ByteRange>;

    /// Paths of the file(s) whose extents cover `addr`.
    fn paths_at(&self, image: ImageId, addr: u64) -> Vec<String>;

    /// Read a file out of the image by guest path.
    fn read_file(&self, image: ImageId, path: &str) -> Result<Vec<u8>, Error>;

    /// Parse a hive snapshot, priming the value index for `kind`.
    fn parse_hive(&self, kind: HiveKind, bytes: &[u8]) -> Result<(), Error>;

    /// Registry value name(s) at a byte offset within the hive file.
    fn registry_values_at(&self, kind: HiveKind, offset: u64, ranges: &[ByteRange])
    -> Vec<String>;

    /// Decode a transaction log's own header into dirty-page metadata.
    fn parse_hive_log(&self, bytes: &[u8]) -> Result<HiveLog, Error>;
}
