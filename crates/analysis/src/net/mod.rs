#![forbid(unsafe_code)]

mod correlator;

pub use correlator::PacketCorrelator;

use std::net::Ipv4Addr;
use std::sync::Arc;

/// Identifier of a registered capture callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    pub fn banner(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmp => "ICMP",
        }
    }
}

/// A packet decoded by the capture layer. Anything it cannot decode never
/// reaches this type.
#[derive(Debug, Clone)]
pub struct ParsedPacket {
    pub protocol: Protocol,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    /// Byte offset of the payload within the raw frame.
    pub payload_offset: usize,
}

/// Invoked once per captured packet with the guest physical address of
/// its backing buffer.
pub trait PacketObserver: Send + Sync {
    fn on_packet(&self, length: usize, phys_addr: u64);
}

/// Packet capture/parsing collaborator.
pub trait PacketLayer: Send + Sync {
    fn parse(&self, frame: &[u8]) -> Option<ParsedPacket>;
    fn register(&self, observer: Arc<dyn PacketObserver>) -> CaptureHandle;
    fn unregister(&self, handle: CaptureHandle);
    fn start_capture(&self);
    fn stop_capture(&self);
}

/// Network channel controller: wires a correlator to the capture layer
/// for the duration of one analysis.
pub struct NetworkChannel {
    layer: Arc<dyn PacketLayer>,
}

impl NetworkChannel {
    pub fn new(layer: Arc<dyn PacketLayer>) -> Self {
        Self { layer }
    }

    pub(crate) fn arm(&self, correlator: Arc<PacketCorrelator>) -> CaptureHandle {
        let handle = self.layer.register(correlator);
        self.layer.start_capture();
        handle
    }

    pub(crate) fn disarm(&self, handle: CaptureHandle) {
        self.layer.stop_capture();
        self.layer.unregister(handle);
    }
}
