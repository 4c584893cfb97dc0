use crate::config::{HEADER_SIZE, SIG_BYTE_0, SIG_BYTE_1, TRAILER_SIZE};
use crate::error::SspError;

/// Identifies a byte-oriented transport endpoint.
pub type PortId = u8;

/// Identifies a logical endpoint multiplexed over a port.
pub type SocketId = u8;

/// The packet's `type` field (§3 of the specification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Data = 0,
    Ack = 1,
    Nak = 2,
}

impl PacketKind {
    pub(crate) fn from_byte(byte: u8) -> Option<PacketKind> {
        match byte {
            0 => Some(PacketKind::Data),
            1 => Some(PacketKind::Ack),
            2 => Some(PacketKind::Nak),
            _ => None,
        }
    }
}

/// Whether a [`Frame`] is outbound (submitted via `send`) or inbound (parsed off
/// the wire), used to tag listener callbacks (§4.4/§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// The fixed 8-byte packet header (§3). On the wire, every field is a single byte
/// except the trailing CRC (carried separately in [`Frame::crc`]), so there is no
/// endianness concern within the header itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub dest_id: SocketId,
    pub src_id: SocketId,
    pub kind: PacketKind,
    pub body_size: u8,
    pub trans_id: u8,
    pub checksum: u8,
}

impl PacketHeader {
    /// The 8-bit wrapping sum of the first 7 header bytes (signature, destId,
    /// srcId, type, bodySize, transId) — the header `checksum` field itself is
    /// excluded from its own computation.
    pub(crate) fn compute_checksum(
        dest_id: u8,
        src_id: u8,
        kind: u8,
        body_size: u8,
        trans_id: u8,
    ) -> u8 {
        SIG_BYTE_0
            .wrapping_add(SIG_BYTE_1)
            .wrapping_add(dest_id)
            .wrapping_add(src_id)
            .wrapping_add(kind)
            .wrapping_add(body_size)
            .wrapping_add(trans_id)
    }

    /// Serializes the 8 header bytes, signature included, in on-wire order.
    pub(crate) fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        [
            SIG_BYTE_0,
            SIG_BYTE_1,
            self.dest_id,
            self.src_id,
            self.kind as u8,
            self.body_size,
            self.trans_id,
            self.checksum,
        ]
    }

    /// Identity used by [`crate::send_queue::SendQueue::erase`]: two headers refer to
    /// the same queued entry only if every field (other than direction) matches.
    pub(crate) fn same_entry(&self, other: &PacketHeader) -> bool {
        self.trans_id == other.trans_id
            && self.dest_id == other.dest_id
            && self.src_id == other.src_id
            && self.kind == other.kind
            && self.checksum == other.checksum
            && self.body_size == other.body_size
    }

    /// Correlation used by [`crate::send_queue::SendQueue::find`]: does `self` (an
    /// outstanding DATA header) correspond to `received` (an incoming ACK/NAK)?
    pub(crate) fn correlates_with(&self, received: &PacketHeader) -> bool {
        self.src_id == received.dest_id
            && self.dest_id == received.src_id
            && self.trans_id == received.trans_id
    }
}

/// The in-memory representation of one SSP packet, queued or just parsed (§3).
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: PacketHeader,
    pub body: Vec<u8>,
    pub crc: u16,
    pub packet_size: u16,
    pub err: SspError,
    pub direction: Direction,
}

impl Frame {
    pub(crate) fn new(header: PacketHeader, body: Vec<u8>, direction: Direction) -> Frame {
        let packet_size = HEADER_SIZE as u16 + body.len() as u16 + TRAILER_SIZE as u16;
        Frame {
            header,
            body,
            crc: 0,
            packet_size,
            err: SspError::Success,
            direction,
        }
    }
}
