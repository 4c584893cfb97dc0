/// Header size on the wire: 2 signature bytes + destId + srcId + type + bodySize +
/// transId + checksum.
pub const HEADER_SIZE: usize = 8;

/// Trailer size on the wire: a little-endian CRC-16.
pub const TRAILER_SIZE: usize = 2;

pub const SIG_BYTE_0: u8 = 0xBE;
pub const SIG_BYTE_1: u8 = 0xEF;

/// Runtime-overridable tunables (§6 of the specification). The original C
/// implementation selects these at compile time via an `ssp_opt.h`/`ssp_opt_cus.h`
/// header swap; here they are ordinary fields on a config struct constructed once
/// per [`crate::Ssp`], which is the idiomatic Rust equivalent of that override
/// mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SspConfig {
    /// How long to wait for an ACK/NAK before retrying a send, in milliseconds.
    pub ack_timeout_ms: u32,
    /// How many times to retransmit a message before giving up.
    pub max_retries: u32,
    /// Per-`recv` call timeout, in milliseconds.
    pub recv_timeout_ms: u32,
    /// Maximum number of outgoing messages queued per port.
    pub max_messages: usize,
    /// Maximum on-wire packet size, including header, body and CRC (max 256).
    pub max_packet_size: u16,
    /// Exclusive upper bound on socket identifiers.
    pub max_sockets: u8,
    /// Exclusive upper bound on port identifiers.
    pub max_ports: u8,
}

impl SspConfig {
    /// The maximum payload body size implied by `max_packet_size`.
    pub fn max_body_size(&self) -> u16 {
        self.max_packet_size - HEADER_SIZE as u16 - TRAILER_SIZE as u16
    }
}

impl Default for SspConfig {
    fn default() -> Self {
        SspConfig {
            ack_timeout_ms: 200,
            max_retries: 4,
            recv_timeout_ms: 10,
            max_messages: 5,
            max_packet_size: 64,
            max_sockets: 8,
            max_ports: 2,
        }
    }
}
