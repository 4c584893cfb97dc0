use crate::config::{HEADER_SIZE, TRAILER_SIZE};
use crate::crc::calc_block;
use crate::packet::Frame;

/// Fills in `frame.header.checksum` and `frame.crc`, matching the original's
/// `SSPCOM_Send`: the header checksum is computed and written first, then the
/// CRC-16 is computed over the *entire* 8-byte header (checksum byte included)
/// plus the body (§4.1 / the Open Question in §3, resolved: the checksum byte
/// participates in the CRC on both the send and receive sides).
pub(crate) fn serialize(frame: &mut Frame) {
    let header_bytes = frame.header.to_bytes();
    let mut span = Vec::with_capacity(HEADER_SIZE + frame.body.len());
    span.extend_from_slice(&header_bytes);
    span.extend_from_slice(&frame.body);
    frame.crc = calc_block(&span);
    frame.packet_size = HEADER_SIZE as u16 + frame.body.len() as u16 + TRAILER_SIZE as u16;
}

/// Produces the full on-wire byte sequence for an already-`serialize`d frame:
/// header, body, then the CRC written little-endian.
pub(crate) fn to_wire_bytes(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.packet_size as usize);
    out.extend_from_slice(&frame.header.to_bytes());
    out.extend_from_slice(&frame.body);
    out.push((frame.crc & 0xff) as u8);
    out.push((frame.crc >> 8) as u8);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Direction, PacketHeader, PacketKind};

    #[test]
    fn checksum_is_wrapping_sum_of_first_seven_bytes() {
        let checksum = PacketHeader::compute_checksum(2, 1, PacketKind::Data as u8, 3, 9);
        // 0xBE + 0xEF + 2 + 1 + 0 + 3 + 9, truncated to 8 bits.
        let expected = 0xBEu8
            .wrapping_add(0xEF)
            .wrapping_add(2)
            .wrapping_add(1)
            .wrapping_add(0)
            .wrapping_add(3)
            .wrapping_add(9);
        assert_eq!(checksum, expected);
    }

    #[test]
    fn wire_size_accounts_for_header_body_and_trailer() {
        let header = PacketHeader {
            dest_id: 1,
            src_id: 0,
            kind: PacketKind::Data,
            body_size: 4,
            trans_id: 0,
            checksum: 0,
        };
        let mut frame = Frame::new(header, vec![1, 2, 3, 4], Direction::Send);
        serialize(&mut frame);
        assert_eq!(frame.packet_size as usize, HEADER_SIZE + 4 + TRAILER_SIZE);
        assert_eq!(to_wire_bytes(&frame).len(), frame.packet_size as usize);
    }
}
