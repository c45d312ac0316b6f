#![forbid(unsafe_code)]

use crate::emulator::Emulator;

/// Read the counted object-name string an intercepted syscall points at.
///
/// The guest structure is a 16-bit byte length, a 16-bit capacity, and a
/// 32-bit pointer to a UTF-16LE buffer. Only printable ASCII survives the
/// copy and the result is truncated to `max_len` characters.
pub(crate) fn read_object_name(
    emulator: &dyn Emulator,
    addr: u64,
    max_len: usize,
) -> Option<String> {
    let mut header = [0u8; 8];
    emulator.read_phys(addr, &mut header).ok()?;
    let length = u16::from_le_bytes([header[0], header[1]]) as usize;
    let buffer = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;
    if length == 0 || buffer == 0 {
        return None;
    }

    // Two bytes per UTF-16 unit; never read more than fits the limit.
    let length = (length & !1).min(max_len * 2);
    let mut raw = vec![0u8; length];
    emulator.read_phys(buffer, &mut raw).ok()?;

    let mut name = String::with_capacity(raw.len() / 2);
    for unit in raw.chunks_exact(2) {
        let unit = u16::from_le_bytes([unit[0], unit[1]]);
        if (0x20..0x7f).contains(&unit) {
            name.push(unit as u8 as char);
        }
        if name.len() >= max_len {
            break;
        }
    }
    (!name.is_empty()).then_some(name)
}
