//! A single-port loopback demonstration: two sockets sharing one transport,
//! where whatever byte one side writes lands straight in its own read queue.
//! Run with `RUST_LOG=trace cargo run --example loopback` to see the
//! reliability engine's send/ACK/receive log lines.

use std::collections::VecDeque;
use std::sync::Mutex;

use log::{info, LevelFilter};

use ssp::{Direction, PortId, Ssp, SspConfig, SspError, Transport};

struct Loopback {
    inbox: Mutex<VecDeque<u8>>,
}

impl Loopback {
    fn new() -> Loopback {
        Loopback {
            inbox: Mutex::new(VecDeque::new()),
        }
    }
}

impl Transport for Loopback {
    fn open(&mut self, _port: PortId) -> bool {
        true
    }

    fn close(&mut self, _port: PortId) {}

    fn is_open(&self, _port: PortId) -> bool {
        true
    }

    fn send(&mut self, _port: PortId, bytes: &[u8]) -> bool {
        self.inbox.lock().unwrap().extend(bytes.iter().copied());
        true
    }

    fn recv(&mut self, _port: PortId, buf: &mut [u8], _timeout_ms: u32) -> usize {
        match self.inbox.lock().unwrap().pop_front() {
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

fn main() {
    env_logger::Builder::new().filter_level(LevelFilter::Trace).init();

    const SRC: u8 = 0;
    const DST: u8 = 1;

    let ssp = Ssp::new(Loopback::new(), SspConfig::default());
    ssp.init(0).expect("port 0 should open");
    ssp.open_socket(0, SRC).unwrap();
    ssp.open_socket(0, DST).unwrap();

    ssp.listen(DST, |socket_id, data, direction, err| {
        info!(
            "socket {} got {:?} ({:?}): {:?}",
            socket_id,
            String::from_utf8_lossy(data),
            direction,
            err
        );
    })
    .unwrap();

    ssp.listen(SRC, |socket_id, _data, direction, err| {
        if err == SspError::Success {
            info!("socket {} send confirmed ({:?})", socket_id, direction);
        } else {
            info!("socket {} send failed: {:?}", socket_id, err);
        }
    })
    .unwrap();

    ssp.send(SRC, DST, b"hello, ssp\0").unwrap();

    for _ in 0..20 {
        ssp.process();
        if ssp.queue_size(0) == 0 {
            break;
        }
    }

    ssp.term();
}
