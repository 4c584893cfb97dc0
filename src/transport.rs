use crate::PortId;

/// The byte transport ("HAL" in the specification): a serial line, SPI bus, UDP
/// loopback, or in-memory buffer. The engine consumes only this small interface and
/// makes no assumption about the medium, matching the original's `ssp_hal.h`.
pub trait Transport: Send {
    /// Opens the given port. Returns `false` on failure.
    fn open(&mut self, port: PortId) -> bool;

    /// Closes the given port.
    fn close(&mut self, port: PortId);

    /// Reports whether the given port is currently open.
    fn is_open(&self, port: PortId) -> bool;

    /// Sends `bytes` on `port`. All-or-nothing: a partial send is reported as
    /// failure.
    fn send(&mut self, port: PortId, bytes: &[u8]) -> bool;

    /// Reads up to `buf.len()` bytes from `port`, waiting at most `timeout_ms`.
    /// Returns the number of bytes read, 0 on timeout.
    fn recv(&mut self, port: PortId, buf: &mut [u8], timeout_ms: u32) -> usize;

    /// Reports whether the port's receive queue currently has no buffered input.
    fn recv_queue_empty(&self, port: PortId) -> bool;

    /// Discards any buffered input on the port.
    fn flush(&mut self, port: PortId);

    /// Advisory hint: enable or disable the transport's power-save mode.
    fn power_save(&mut self, enable: bool);
}
