use std::sync::Mutex;

use log::{debug, trace, warn};

use crate::clock::{elapsed_ms, Clock, SystemClock};
use crate::codec;
use crate::config::{SspConfig, HEADER_SIZE};
use crate::error::SspError;
use crate::packet::{Direction, Frame, PacketHeader, PacketKind, PortId, SocketId};
use crate::parser::{ParseOutcome, Parser};
use crate::send_queue::{SendQueue, SendQueueEntry, SendState};
use crate::socket_table::{Listener, SocketTable};
use crate::transport::Transport;

/// A small ring that buffers the last `HEADER_SIZE` raw bytes consumed off the
/// wire, used to relocate a lost sync point after a header-checksum failure
/// (§4.2). Mirrors the static `parseHistory` buffer in the original's `Receive()`.
struct RecvHistory {
    buf: [u8; HEADER_SIZE],
    len: usize,
}

impl RecvHistory {
    fn new() -> RecvHistory {
        RecvHistory {
            buf: [0; HEADER_SIZE],
            len: 0,
        }
    }

    fn push(&mut self, byte: u8) {
        if self.len < HEADER_SIZE {
            self.buf[self.len] = byte;
            self.len += 1;
        }
    }

    fn is_full(&self) -> bool {
        self.len >= HEADER_SIZE
    }

    fn bytes_from_second(&self) -> Vec<u8> {
        if self.len > 1 {
            self.buf[1..self.len].to_vec()
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self) {
        self.len = 0;
    }
}

struct PortRuntime {
    open: bool,
    queue: SendQueue,
    last_received: Option<(u8, u16)>,
    parser: Parser,
    history: RecvHistory,
}

impl PortRuntime {
    fn new(max_body_size: u16) -> PortRuntime {
        PortRuntime {
            open: false,
            queue: SendQueue::new(),
            last_received: None,
            parser: Parser::new(max_body_size),
            history: RecvHistory::new(),
        }
    }
}

struct Shared {
    sockets: SocketTable,
    ports: Vec<PortRuntime>,
    next_trans_id: u8,
}

type ErrorHandler = dyn FnMut(SspError) + Send;

/// The reliability + framing engine (§2 of the specification), parameterized over
/// a byte [`Transport`] and a millisecond [`Clock`]. One value of this type
/// is the "explicit context handle" the specification's redesign notes call for in
/// place of the original's file-scope `static self`.
pub struct Ssp<T: Transport, C: Clock = SystemClock> {
    config: SspConfig,
    clock: C,
    transport: Mutex<T>,
    shared: Mutex<Shared>,
    initialized: Mutex<bool>,
    last_error: Mutex<Option<SspError>>,
    error_handler: Mutex<Option<Box<ErrorHandler>>>,
}

impl<T: Transport> Ssp<T, SystemClock> {
    /// Builds a context backed by the real system clock.
    pub fn new(transport: T, config: SspConfig) -> Ssp<T, SystemClock> {
        Ssp::with_clock(transport, config, SystemClock)
    }
}

impl<T: Transport, C: Clock> Ssp<T, C> {
    /// Builds a context with an injectable clock, for deterministic tests.
    pub fn with_clock(transport: T, config: SspConfig, clock: C) -> Ssp<T, C> {
        let max_body_size = config.max_body_size();
        let ports = (0..config.max_ports)
            .map(|_| PortRuntime::new(max_body_size))
            .collect();
        Ssp {
            shared: Mutex::new(Shared {
                sockets: SocketTable::new(config.max_sockets),
                ports,
                next_trans_id: 0,
            }),
            transport: Mutex::new(transport),
            config,
            clock,
            initialized: Mutex::new(false),
            last_error: Mutex::new(None),
            error_handler: Mutex::new(None),
        }
    }

    fn report(&self, err: SspError) -> SspError {
        *self.last_error.lock().unwrap() = Some(err);
        if let Some(handler) = self.error_handler.lock().unwrap().as_mut() {
            handler(err);
        }
        err
    }

    /// Installs a handler invoked whenever an API call or internal processing step
    /// produces an error (§7).
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: FnMut(SspError) + Send + 'static,
    {
        *self.error_handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// The most recently reported error, if any (§7's "last error" slot).
    pub fn last_error(&self) -> Option<SspError> {
        *self.last_error.lock().unwrap()
    }

    /// One-time setup plus per-call port open (§4.5). Every call opens `port` via
    /// the transport; the first call across any port marks the context usable by
    /// [`Ssp::listen`].
    pub fn init(&self, port: PortId) -> Result<(), SspError> {
        if port as usize >= self.config.max_ports as usize {
            return Err(self.report(SspError::BadArgument));
        }
        let opened = { self.transport.lock().unwrap().open(port) };
        if !opened {
            return Err(self.report(SspError::PortOpenFailed));
        }
        *self.initialized.lock().unwrap() = true;
        self.shared.lock().unwrap().ports[port as usize].open = true;
        Ok(())
    }

    /// Drains all per-port send queues, closes every port, and marks the context
    /// uninitialized (§4.5).
    pub fn term(&self) {
        {
            let mut shared = self.shared.lock().unwrap();
            for port in shared.ports.iter_mut() {
                port.queue.clear();
                port.open = false;
            }
        }
        let mut transport = self.transport.lock().unwrap();
        for port in 0..self.config.max_ports {
            transport.close(port);
        }
        *self.initialized.lock().unwrap() = false;
    }

    /// Binds `socket_id` to `port` (§4.5).
    pub fn open_socket(&self, port: PortId, socket_id: SocketId) -> Result<(), SspError> {
        let mut shared = self.shared.lock().unwrap();
        if !shared.sockets.in_range(socket_id) {
            return Err(self.report(SspError::BadSocketId));
        }
        if port as usize >= shared.ports.len() || !shared.ports[port as usize].open {
            return Err(self.report(SspError::PortNotOpen));
        }
        if shared.sockets.is_open(socket_id) {
            return Err(self.report(SspError::SocketAlreadyOpen));
        }
        shared.sockets.get_mut(socket_id).unwrap().bound_port = Some(port);
        Ok(())
    }

    /// Unbinds `socket_id`. Does not drain its port's queue (§4.5).
    pub fn close_socket(&self, socket_id: SocketId) -> Result<(), SspError> {
        let mut shared = self.shared.lock().unwrap();
        if !shared.sockets.in_range(socket_id) {
            return Err(self.report(SspError::BadSocketId));
        }
        shared.sockets.get_mut(socket_id).unwrap().bound_port = None;
        Ok(())
    }

    /// Installs `listener` on `socket_id`, exactly once per binding (§4.5).
    pub fn listen<L>(&self, socket_id: SocketId, listener: L) -> Result<(), SspError>
    where
        L: Listener + 'static,
    {
        if !*self.initialized.lock().unwrap() {
            return Err(self.report(SspError::NotInitialized));
        }
        let mut shared = self.shared.lock().unwrap();
        if !shared.sockets.in_range(socket_id) || !shared.sockets.is_open(socket_id) {
            return Err(self.report(SspError::SocketNotOpen));
        }
        let entry = shared.sockets.get_mut(socket_id).unwrap();
        if entry.listener.is_some() {
            return Err(self.report(SspError::DuplicateListener));
        }
        entry.listener = Some(Box::new(listener));
        Ok(())
    }

    /// Sends `data` from `src` to `dst` (§4.5). Equivalent to `send_multi` with one
    /// chunk.
    pub fn send(&self, src: SocketId, dst: SocketId, data: &[u8]) -> Result<(), SspError> {
        self.send_multi(src, dst, &[data])
    }

    /// Sends the concatenation of `chunks` from `src` to `dst` as a single DATA
    /// frame (§4.5).
    pub fn send_multi(&self, src: SocketId, dst: SocketId, chunks: &[&[u8]]) -> Result<(), SspError> {
        let total_len = chunks.iter().try_fold(0usize, |acc, c| acc.checked_add(c.len()));
        let total_len = match total_len {
            Some(len) => len,
            None => return Err(self.report(SspError::OutOfMemory)),
        };
        if total_len > self.config.max_body_size() as usize {
            return Err(self.report(SspError::DataSizeTooLarge));
        }

        let mut shared = self.shared.lock().unwrap();
        if !shared.sockets.in_range(src) || !shared.sockets.in_range(dst) {
            return Err(self.report(SspError::BadSocketId));
        }
        let port = match shared.sockets.port_of(src) {
            Some(p) => p,
            None => return Err(self.report(SspError::SocketNotOpen)),
        };
        if shared.ports[port as usize].queue.len() >= self.config.max_messages {
            return Err(self.report(SspError::QueueFull));
        }

        let mut body = Vec::with_capacity(total_len);
        for chunk in chunks {
            body.extend_from_slice(chunk);
        }

        let trans_id = shared.next_trans_id;
        shared.next_trans_id = shared.next_trans_id.wrapping_add(1);
        let checksum =
            PacketHeader::compute_checksum(dst, src, PacketKind::Data as u8, body.len() as u8, trans_id);
        let header = PacketHeader {
            dest_id: dst,
            src_id: src,
            kind: PacketKind::Data,
            body_size: body.len() as u8,
            trans_id,
            checksum,
        };
        let mut frame = Frame::new(header, body, Direction::Send);
        codec::serialize(&mut frame);
        debug!("queued DATA port={} src={} dst={} trans={}", port, src, dst, trans_id);
        shared.ports[port as usize].queue.insert(SendQueueEntry::new(frame));
        drop(shared);

        self.transport.lock().unwrap().power_save(false);
        Ok(())
    }

    /// The number of messages currently queued for transmission on `port` (§4.5).
    pub fn queue_size(&self, port: PortId) -> usize {
        self.shared.lock().unwrap().ports[port as usize].queue.len()
    }

    /// Reports whether `port`'s receive queue currently has no buffered input.
    pub fn recv_empty(&self, port: PortId) -> bool {
        self.transport.lock().unwrap().recv_queue_empty(port)
    }

    /// Discards buffered input on `port`.
    pub fn flush_port(&self, port: PortId) {
        self.transport.lock().unwrap().flush(port);
    }

    /// Drains and transmits one tick's worth of outgoing/incoming work across
    /// every open port (§4.5). The sole execution site for transport I/O and
    /// listener invocation; callers arrange to call this from one task or loop.
    pub fn process(&self) {
        let mut any_queued = false;
        let port_count = self.config.max_ports;
        for port in 0..port_count {
            let open = self.shared.lock().unwrap().ports[port as usize].open;
            if !open {
                continue;
            }
            self.process_receive(port);
            self.process_send(port);
            if self.shared.lock().unwrap().ports[port as usize].queue.len() > 0 {
                any_queued = true;
            }
        }
        self.transport.lock().unwrap().power_save(!any_queued);
    }

    // ---- receive path -----------------------------------------------------

    fn process_receive(&self, port: PortId) {
        if !self.transport.lock().unwrap().recv_queue_empty(port) {
            if let Some(outcome) = self.receive_one_packet(port) {
                self.dispatch_received(port, outcome);
            }
        }
        self.sweep_ack_timeouts(port);
    }

    /// Reads bytes from the transport one at a time, feeding the port's parser,
    /// until either a packet attempt concludes or the transport has nothing left
    /// to offer this tick.
    fn receive_one_packet(&self, port: PortId) -> Option<ParseOutcome> {
        loop {
            let (n, buf) = {
                let mut transport = self.transport.lock().unwrap();
                let mut buf = [0u8; 1];
                let n = transport.recv(port, &mut buf, self.config.recv_timeout_ms);
                (n, buf)
            };
            if n == 0 {
                // The transport starved. If the header already validated,
                // the caller that stalled mid-frame deserves a NAK now
                // rather than a silent wait for the rest of the bytes
                // (§4.2/§4.4); otherwise there's simply nothing to report.
                let mut shared = self.shared.lock().unwrap();
                let runtime = &mut shared.ports[port as usize];
                let partial = runtime.parser.take_partial_header_outcome();
                if partial.is_some() {
                    runtime.history.reset();
                }
                return partial;
            }
            let byte = buf[0];

            let (outcome, history_full) = {
                let mut shared = self.shared.lock().unwrap();
                let runtime = &mut shared.ports[port as usize];
                runtime.history.push(byte);
                let outcome = runtime.parser.feed(byte);
                (outcome, runtime.history.is_full())
            };

            if let Some(outcome) = outcome {
                if outcome.err == SspError::BadHeaderChecksum && history_full {
                    if let Some(resync) = self.reparse_history(port) {
                        return Some(resync);
                    }
                    continue;
                }
                return Some(outcome);
            }
        }
    }

    /// Resynchronization: re-feeds `history[1..]` without touching the transport,
    /// looking for a sync point the first byte of history obscured (§4.2).
    fn reparse_history(&self, port: PortId) -> Option<ParseOutcome> {
        let mut shared = self.shared.lock().unwrap();
        let runtime = &mut shared.ports[port as usize];
        let bytes = runtime.history.bytes_from_second();
        runtime.history.reset();
        let mut result = None;
        for byte in bytes {
            runtime.history.push(byte);
            if let Some(outcome) = runtime.parser.feed(byte) {
                result = Some(outcome);
                break;
            }
        }
        result
    }

    fn dispatch_received(&self, port: PortId, outcome: ParseOutcome) {
        match outcome.err {
            SspError::Success => match PacketKind::from_byte(outcome.kind_byte) {
                Some(PacketKind::Ack) => self.handle_ack(port, &outcome),
                Some(PacketKind::Nak) => self.handle_nak(port, &outcome),
                Some(PacketKind::Data) => self.handle_data(port, &outcome),
                None => {
                    // The parser resolves an unknown `type` byte to ParseError
                    // before ever reporting Success, so this arm is an
                    // invariant violation rather than ordinary bad input.
                    self.report(crate::error::software_fault("unknown packet type reached dispatch"));
                }
            },
            SspError::CorruptedPacket | SspError::PartialPacketHeaderValid => {
                warn!("{} on port {}", outcome.err, port);
                if outcome.kind_byte == PacketKind::Data as u8 {
                    self.emit_control(port, PacketKind::Nak, outcome.src_id, outcome.dest_id, outcome.trans_id);
                }
            }
            SspError::BadHeaderChecksum => {
                warn!("bad header checksum on port {}", port);
            }
            SspError::PacketTooLarge => {
                warn!("oversized packet on port {}", port);
            }
            other => {
                warn!("framing error on port {}: {}", port, other);
            }
        }
    }

    fn handle_ack(&self, port: PortId, outcome: &ParseOutcome) {
        let received = PacketHeader {
            dest_id: outcome.dest_id,
            src_id: outcome.src_id,
            kind: PacketKind::Ack,
            body_size: 0,
            trans_id: outcome.trans_id,
            checksum: outcome.checksum,
        };
        let notify_info = {
            let mut shared = self.shared.lock().unwrap();
            let runtime = &mut shared.ports[port as usize];
            if let Some(entry) = runtime.queue.find_mut(&received) {
                let socket_id = entry.frame.header.src_id;
                let body = entry.frame.body.clone();
                let header = entry.frame.header;
                runtime.queue.erase(&header);
                trace!("ACK received port={} trans={}", port, outcome.trans_id);
                Some((socket_id, body))
            } else {
                None
            }
        };
        if let Some((socket_id, body)) = notify_info {
            self.notify(socket_id, &body, Direction::Send, SspError::Success);
        }
    }

    fn handle_nak(&self, port: PortId, outcome: &ParseOutcome) {
        let received = PacketHeader {
            dest_id: outcome.dest_id,
            src_id: outcome.src_id,
            kind: PacketKind::Nak,
            body_size: 0,
            trans_id: outcome.trans_id,
            checksum: outcome.checksum,
        };
        let mut shared = self.shared.lock().unwrap();
        let runtime = &mut shared.ports[port as usize];
        if let Some(entry) = runtime.queue.find_mut(&received) {
            trace!("NAK received port={} trans={}", port, outcome.trans_id);
            // Force retransmission without charging a retry (§9 Open Question).
            entry.state = SendState::Send;
        }
    }

    fn handle_data(&self, port: PortId, outcome: &ParseOutcome) {
        let listener_present = {
            let shared = self.shared.lock().unwrap();
            shared
                .sockets
                .get(outcome.dest_id)
                .map_or(false, |e| e.listener.is_some())
        };

        if !listener_present {
            debug!("no listener for socket {}, sending NAK", outcome.dest_id);
            self.emit_control(port, PacketKind::Nak, outcome.src_id, outcome.dest_id, outcome.trans_id);
            return;
        }

        // ACK emission precedes duplicate-suppression, per §4.4: a retransmit
        // caused by our own lost ACK must still be ACKed again.
        self.emit_control(port, PacketKind::Ack, outcome.src_id, outcome.dest_id, outcome.trans_id);

        let dispatch_body = {
            let mut shared = self.shared.lock().unwrap();
            let runtime = &mut shared.ports[port as usize];
            let key = (outcome.trans_id, outcome.crc_received);
            if runtime.last_received == Some(key) {
                debug!("duplicate DATA suppressed port={} trans={}", port, outcome.trans_id);
                None
            } else {
                runtime.last_received = Some(key);
                Some(outcome.body.clone())
            }
        };

        if let Some(body) = dispatch_body {
            self.notify(outcome.dest_id, &body, Direction::Receive, SspError::Success);
        }
    }

    /// Builds and transmits a zero-body ACK/NAK frame addressed back to `dest`/
    /// `src` (already swapped relative to the frame being acknowledged). This is
    /// the per-emission scratch frame called for in §9 — constructed on the stack
    /// and never enqueued.
    fn emit_control(&self, port: PortId, kind: PacketKind, dest_id: SocketId, src_id: SocketId, trans_id: u8) {
        let checksum = PacketHeader::compute_checksum(dest_id, src_id, kind as u8, 0, trans_id);
        let header = PacketHeader {
            dest_id,
            src_id,
            kind,
            body_size: 0,
            trans_id,
            checksum,
        };
        let mut frame = Frame::new(header, Vec::new(), Direction::Send);
        codec::serialize(&mut frame);
        let bytes = codec::to_wire_bytes(&frame);
        self.transport.lock().unwrap().send(port, &bytes);
    }

    // ---- send path ----------------------------------------------------------

    fn process_send(&self, port: PortId) {
        enum Action {
            None,
            Transmit(Vec<u8>),
            Exhausted(SocketId, Vec<u8>),
        }

        let action = {
            let mut shared = self.shared.lock().unwrap();
            let runtime = &mut shared.ports[port as usize];
            let ready = matches!(runtime.queue.front(), Some(e) if e.state == SendState::Send);
            if !ready {
                Action::None
            } else {
                let entry = runtime.queue.front_mut().unwrap();
                if entry.retries < self.config.max_retries {
                    entry.retries += 1;
                    Action::Transmit(codec::to_wire_bytes(&entry.frame))
                } else {
                    let socket_id = entry.frame.header.src_id;
                    let body = entry.frame.body.clone();
                    let header = entry.frame.header;
                    runtime.queue.erase(&header);
                    Action::Exhausted(socket_id, body)
                }
            }
        };

        match action {
            Action::None => {}
            Action::Transmit(bytes) => {
                let sent = self.transport.lock().unwrap().send(port, &bytes);
                let mut shared = self.shared.lock().unwrap();
                if let Some(entry) = shared.ports[port as usize].queue.front_mut() {
                    if sent {
                        entry.last_send_tick_ms = self.clock.now_ms();
                        entry.state = SendState::AwaitAck;
                    } else {
                        warn!("send failed port={} trans={}", port, entry.frame.header.trans_id);
                    }
                }
            }
            Action::Exhausted(socket_id, body) => {
                warn!("retries exhausted for socket {} on port {}", socket_id, port);
                self.notify(socket_id, &body, Direction::Send, SspError::SendRetriesFailed);
            }
        }
    }

    fn sweep_ack_timeouts(&self, port: PortId) {
        let now = self.clock.now_ms();
        let mut shared = self.shared.lock().unwrap();
        for entry in shared.ports[port as usize].queue.iter_mut() {
            if entry.state == SendState::AwaitAck
                && elapsed_ms(now, entry.last_send_tick_ms) > self.config.ack_timeout_ms
            {
                debug!("ACK timeout, will resend trans={} on port {}", entry.frame.header.trans_id, port);
                entry.state = SendState::Send;
            }
        }
    }

    /// Invokes `socket_id`'s listener, if any, with the mutex released for the
    /// duration of the call (§5: "the engine releases the mutex before calling
    /// out"). The listener is moved out for the call and restored afterward
    /// unless a concurrent `listen()` installed a new one in the meantime.
    fn notify(&self, socket_id: SocketId, data: &[u8], direction: Direction, err: SspError) {
        let taken = {
            let mut shared = self.shared.lock().unwrap();
            shared
                .sockets
                .get_mut(socket_id)
                .and_then(|e| e.listener.take())
        };
        if let Some(mut listener) = taken {
            listener.on_event(socket_id, data, direction, err);
            let mut shared = self.shared.lock().unwrap();
            if let Some(entry) = shared.sockets.get_mut(socket_id) {
                if entry.listener.is_none() {
                    entry.listener = Some(listener);
                }
            }
        }
    }
}
