//! Simple Socket Protocol: a reliable, message-oriented transport for
//! point-to-point embedded links (UART, SPI, or any byte-oriented medium).
//!
//! A [`Ssp`] context multiplexes logical [`SocketId`]s over one or more
//! [`PortId`]s, framing each message into a packet with a header checksum and
//! a CRC-16 trailer, and retransmits unacknowledged sends up to a configured
//! retry budget. All I/O and retransmission bookkeeping happens inside
//! [`Ssp::process`], which a caller drives from a timer tick or a polling
//! loop; [`Ssp::send`], [`Ssp::listen`], [`Ssp::open_socket`] and friends may
//! be called concurrently from other threads.
//!
//! ```no_run
//! use ssp::{Ssp, SspConfig, Transport, PortId};
//!
//! struct Loopback;
//! impl Transport for Loopback {
//!     fn open(&mut self, _port: PortId) -> bool { true }
//!     fn close(&mut self, _port: PortId) {}
//!     fn is_open(&self, _port: PortId) -> bool { true }
//!     fn send(&mut self, _port: PortId, _bytes: &[u8]) -> bool { true }
//!     fn recv(&mut self, _port: PortId, _buf: &mut [u8], _timeout_ms: u32) -> usize { 0 }
//!     fn recv_queue_empty(&self, _port: PortId) -> bool { true }
//!     fn flush(&mut self, _port: PortId) {}
//!     fn power_save(&mut self, _enable: bool) {}
//! }
//!
//! let ssp = Ssp::new(Loopback, SspConfig::default());
//! ssp.init(0).unwrap();
//! ssp.open_socket(0, 1).unwrap();
//! ```

mod clock;
mod codec;
mod config;
mod context;
mod crc;
mod error;
mod packet;
mod parser;
mod send_queue;
mod socket_table;
mod transport;

pub use clock::{Clock, SystemClock};
pub use config::SspConfig;
pub use context::Ssp;
pub use error::SspError;
pub use packet::{Direction, PacketKind, PortId, SocketId};
pub use socket_table::Listener;
pub use transport::Transport;
