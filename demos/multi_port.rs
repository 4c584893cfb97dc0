//! Demonstrates one context multiplexing several independent ports, each
//! carrying its own socket pair and its own loopback wire. Port 0 carries
//! sockets 0<->1, port 1 carries sockets 2<->3; the two pairs are
//! independently reliable and carry no ordering guarantee relative to each
//! other (§5 of the specification). Run with `RUST_LOG=debug`.

use std::collections::VecDeque;
use std::sync::Mutex;

use log::info;

use ssp::{PortId, Ssp, SspConfig, Transport};

struct MultiPortLoopback {
    inboxes: Vec<Mutex<VecDeque<u8>>>,
}

impl MultiPortLoopback {
    fn new(ports: u8) -> MultiPortLoopback {
        MultiPortLoopback {
            inboxes: (0..ports).map(|_| Mutex::new(VecDeque::new())).collect(),
        }
    }
}

impl Transport for MultiPortLoopback {
    fn open(&mut self, _port: PortId) -> bool {
        true
    }

    fn close(&mut self, _port: PortId) {}

    fn is_open(&self, _port: PortId) -> bool {
        true
    }

    fn send(&mut self, port: PortId, bytes: &[u8]) -> bool {
        self.inboxes[port as usize]
            .lock()
            .unwrap()
            .extend(bytes.iter().copied());
        true
    }

    fn recv(&mut self, port: PortId, buf: &mut [u8], _timeout_ms: u32) -> usize {
        match self.inboxes[port as usize].lock().unwrap().pop_front() {
            Some(byte) => {
                buf[0] = byte;
                1
            }
            None => 0,
        }
    }

    fn recv_queue_empty(&self, port: PortId) -> bool {
        self.inboxes[port as usize].lock().unwrap().is_empty()
    }

    fn flush(&mut self, port: PortId) {
        self.inboxes[port as usize].lock().unwrap().clear();
    }

    fn power_save(&mut self, _enable: bool) {}
}

fn main() {
    env_logger::init();

    let config = SspConfig {
        max_ports: 2,
        max_sockets: 4,
        ..SspConfig::default()
    };
    let ssp = Ssp::new(MultiPortLoopback::new(config.max_ports), config);

    ssp.init(0).expect("port 0 should open");
    ssp.init(1).expect("port 1 should open");

    ssp.open_socket(0, 0).unwrap();
    ssp.open_socket(0, 1).unwrap();
    ssp.open_socket(1, 2).unwrap();
    ssp.open_socket(1, 3).unwrap();

    ssp.listen(1, |socket_id, data, direction, err| {
        info!("[port 0] socket {} got {:?} ({:?}): {:?}", socket_id, data, direction, err);
    })
    .unwrap();
    ssp.listen(3, |socket_id, data, direction, err| {
        info!("[port 1] socket {} got {:?} ({:?}): {:?}", socket_id, data, direction, err);
    })
    .unwrap();
    ssp.listen(0, |_, _, _, _| {}).unwrap();
    ssp.listen(2, |_, _, _, _| {}).unwrap();

    ssp.send(0, 1, b"via port 0").unwrap();
    ssp.send(2, 3, b"via port 1").unwrap();

    for _ in 0..20 {
        ssp.process();
        if ssp.queue_size(0) == 0 && ssp.queue_size(1) == 0 {
            break;
        }
    }

    ssp.term();
}
