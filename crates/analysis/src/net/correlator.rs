#![forbid(unsafe_code)]

use crate::domain::{StateCell, TaskState};
use crate::emulator::Emulator;
use crate::net::{PacketLayer, PacketObserver, ParsedPacket};
use crate::report::{NodeId, Report};
use crate::taint::TaintEngine;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

/// Appends a record to the owning task's report for every captured packet
/// whose backing memory carries taint.
///
/// The trigger scans the packet's bytes in order and fires on the first
/// one that is memory-dirty for any tag, header bytes included; at most
/// one record is emitted per packet.
pub struct PacketCorrelator {
    state: Arc<StateCell>,
    report: Arc<Mutex<Report>>,
    array: NodeId,
    emulator: Arc<dyn Emulator>,
    taint: Arc<dyn TaintEngine>,
    layer: Arc<dyn PacketLayer>,
}

impl PacketCorrelator {
    pub(crate) fn new(
        state: Arc<StateCell>,
        report: Arc<Mutex<Report>>,
        array: NodeId,
        emulator: Arc<dyn Emulator>,
        taint: Arc<dyn TaintEngine>,
        layer: Arc<dyn PacketLayer>,
    ) -> Self {
        Self {
            state,
            report,
            array,
            emulator,
            taint,
            layer,
        }
    }
}

impl PacketObserver for PacketCorrelator {
    fn on_packet(&self, length: usize, phys_addr: u64) {
        if self.state.load() != TaskState::Busy {
            return;
        }
        for offset in 0..length as u64 {
            if !self.taint.memory_dirty(phys_addr + offset) {
                continue;
            }
            let mut frame = vec![0u8; length];
            if self.emulator.read_phys(phys_addr, &mut frame).is_err() {
                return;
            }
            let Some(packet) = self.layer.parse(&frame) else {
                debug!(length, "tainted packet did not parse; dropped");
                return;
            };
            let record = format_packet(&packet, &frame);
            self.report.lock().push_string(self.array, record);
            return;
        }
    }
}

/// Human-readable record for one tainted packet: protocol banner, the
/// endpoints, and a hex+ASCII dump of the payload.
pub(crate) fn format_packet(packet: &ParsedPacket, frame: &[u8]) -> String {
    let mut record = String::new();
    match (packet.src_port, packet.dst_port) {
        (Some(src_port), Some(dst_port)) => {
            let _ = writeln!(
                record,
                "{} {}:{} -> {}:{}",
                packet.protocol.banner(),
                packet.src,
                src_port,
                packet.dst,
                dst_port
            );
        }
        _ => {
            let _ = writeln!(
                record,
                "{} {} -> {}",
                packet.protocol.banner(),
                packet.src,
                packet.dst
            );
        }
    }
    let payload = &frame[packet.payload_offset.min(frame.len())..];
    record.push_str(&hexdump(payload));
    record
}

fn hexdump(bytes: &[u8]) -> String {
    let mut dump = String::new();
    for (line, chunk) in bytes.chunks(16).enumerate() {
        let mut hex = String::with_capacity(47);
        let mut ascii = String::with_capacity(16);
        for (index, byte) in chunk.iter().enumerate() {
            if index > 0 {
                hex.push(' ');
            }
            let _ = write!(hex, "{byte:02x}");
            ascii.push(if byte.is_ascii_graphic() || *byte == b' ' {
                *byte as char
            } else {
                '.'
            });
        }
        let _ = writeln!(dump, "{:04x}  {hex:<47}  |{ascii}|", line * 16);
    }
    dump
}
