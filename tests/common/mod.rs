//! Shared support for the integration tests: an in-memory loopback
//! [`Transport`] that can be told to drop, duplicate, or corrupt whichever
//! packets a test wants to mangle, plus a [`FakeClock`] so ACK-timeout tests
//! don't have to race real time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ssp::{Clock, Direction, PortId, SocketId, SspError, Transport};

/// A deterministic, manually-advanced millisecond clock for ACK-timeout tests.
#[derive(Clone)]
pub struct FakeClock(Arc<AtomicU32>);

impl FakeClock {
    pub fn new() -> FakeClock {
        FakeClock(Arc::new(AtomicU32::new(0)))
    }

    pub fn advance(&self, ms: u32) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A packet-inspecting transform a test installs on [`LoopbackTransport`] to
/// simulate channel impairments. Given the bytes of one transmitted packet,
/// returns zero, one, or more copies to actually deliver.
pub type Filter = Arc<dyn Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync>;

/// The wire-level type byte, at the fixed offset in [`ssp::PacketHeader::to_bytes`]'s
/// layout (after the 2 signature bytes, destId and srcId).
const TYPE_OFFSET: usize = 4;
pub const KIND_DATA: u8 = 0;
pub const KIND_ACK: u8 = 1;
pub const KIND_NAK: u8 = 2;

pub fn packet_kind(bytes: &[u8]) -> u8 {
    bytes[TYPE_OFFSET]
}

/// A single-port loopback transport: whatever is sent is fed back into its own
/// receive queue, after running through an optional [`Filter`]. This is the
/// "Loopback port" setup the specification's end-to-end scenarios describe —
/// source and destination sockets share one port and one transport instance.
pub struct LoopbackTransport {
    inbox: Mutex<VecDeque<u8>>,
    filter: Option<Filter>,
    pub sent_data: AtomicUsize,
    pub sent_ack: AtomicUsize,
    pub sent_nak: AtomicUsize,
}

impl LoopbackTransport {
    pub fn new() -> LoopbackTransport {
        LoopbackTransport {
            inbox: Mutex::new(VecDeque::new()),
            filter: None,
            sent_data: AtomicUsize::new(0),
            sent_ack: AtomicUsize::new(0),
            sent_nak: AtomicUsize::new(0),
        }
    }

    pub fn with_filter(filter: Filter) -> LoopbackTransport {
        LoopbackTransport {
            filter: Some(filter),
            ..LoopbackTransport::new()
        }
    }

    /// Pushes raw bytes straight into the receive queue, bypassing `send`'s
    /// counters and filter. Used to prime the wire with noise ahead of a real
    /// frame, for resync tests.
    pub fn inject(&self, bytes: &[u8]) {
        self.inbox.lock().unwrap().extend(bytes.iter().copied());
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, _port: PortId) -> bool {
        true
    }

    fn close(&mut self, _port: PortId) {}

    fn is_open(&self, _port: PortId) -> bool {
        true
    }

    fn send(&mut self, _port: PortId, bytes: &[u8]) -> bool {
        match packet_kind(bytes) {
            KIND_DATA => {
                self.sent_data.fetch_add(1, Ordering::SeqCst);
            }
            KIND_ACK => {
                self.sent_ack.fetch_add(1, Ordering::SeqCst);
            }
            KIND_NAK => {
                self.sent_nak.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
        let copies = match &self.filter {
            Some(f) => f(bytes),
            None => vec![bytes.to_vec()],
        };
        let mut inbox = self.inbox.lock().unwrap();
        for copy in copies {
            inbox.extend(copy);
        }
        true
    }

    fn recv(&mut self, _port: PortId, buf: &mut [u8], _timeout_ms: u32) -> usize {
        let mut inbox = self.inbox.lock().unwrap();
        match inbox.pop_front() {
            Some(byte) => {
                buf[0] = byte;
                1
            }
            None => 0,
        }
    }

    fn recv_queue_empty(&self, _port: PortId) -> bool {
        self.inbox.lock().unwrap().is_empty()
    }

    fn flush(&mut self, _port: PortId) {
        self.inbox.lock().unwrap().clear();
    }

    fn power_save(&mut self, _enable: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub socket_id: SocketId,
    pub data: Vec<u8>,
    pub direction: Direction,
    pub err: SspError,
}

pub type EventLog = Arc<Mutex<Vec<RecordedEvent>>>;

/// Builds a `Listener` closure that appends every callback it receives to
/// `log`, so tests can assert on call count, order, and payload afterward.
pub fn recording_listener(log: EventLog) -> impl FnMut(SocketId, &[u8], Direction, SspError) {
    move |socket_id, data, direction, err| {
        log.lock().unwrap().push(RecordedEvent {
            socket_id,
            data: data.to_vec(),
            direction,
            err,
        });
    }
}

/// Pumps `process()` up to `max_ticks` times, advancing `clock` by
/// `tick_ms` between calls, stopping early once `done` reports true.
pub fn pump<T: Transport, C: Clock>(
    ssp: &ssp::Ssp<T, C>,
    clock: &FakeClock,
    tick_ms: u32,
    max_ticks: usize,
    mut done: impl FnMut() -> bool,
) {
    for _ in 0..max_ticks {
        ssp.process();
        if done() {
            return;
        }
        clock.advance(tick_ms);
    }
}
