use std::fmt;

/// Every outcome the protocol engine can produce, on the wire or at the API boundary.
///
/// `Success` is included alongside the failure variants because a [`crate::Frame`]
/// always carries one of these in its `err` field, successful frames included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SspError {
    Success,
    BadSignature,
    PartialPacket,
    PartialPacketHeaderValid,
    PortOpenFailed,
    SocketNotOpen,
    PortNotOpen,
    BadSocketId,
    SocketAlreadyOpen,
    PacketTooLarge,
    DataSizeTooLarge,
    ParseError,
    CorruptedPacket,
    BadHeaderChecksum,
    SendRetriesFailed,
    QueueFull,
    OutOfMemory,
    BadArgument,
    SendFailure,
    NotInitialized,
    DuplicateListener,
    SoftwareFault,
}

impl fmt::Display for SspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SspError::Success => "success",
            SspError::BadSignature => "bad packet signature",
            SspError::PartialPacket => "partial packet",
            SspError::PartialPacketHeaderValid => "partial packet, header valid",
            SspError::PortOpenFailed => "port open failed",
            SspError::SocketNotOpen => "socket not open",
            SspError::PortNotOpen => "port not open",
            SspError::BadSocketId => "bad socket id",
            SspError::SocketAlreadyOpen => "socket already open",
            SspError::PacketTooLarge => "packet too large",
            SspError::DataSizeTooLarge => "data size too large",
            SspError::ParseError => "parse error",
            SspError::CorruptedPacket => "corrupted packet",
            SspError::BadHeaderChecksum => "bad header checksum",
            SspError::SendRetriesFailed => "send retries failed",
            SspError::QueueFull => "send queue full",
            SspError::OutOfMemory => "out of memory",
            SspError::BadArgument => "bad argument",
            SspError::SendFailure => "send failure",
            SspError::NotInitialized => "not initialized",
            SspError::DuplicateListener => "duplicate listener",
            SspError::SoftwareFault => "software fault",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for SspError {}

/// Raised for invariant violations (`SspError::SoftwareFault`). In debug builds this
/// panics, matching the original's `ASSERT()` fault hook; release builds just record
/// the error through the normal last-error/handler path.
pub(crate) fn software_fault(context: &str) -> SspError {
    debug_assert!(false, "software fault: {}", context);
    SspError::SoftwareFault
}
