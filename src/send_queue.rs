use std::collections::VecDeque;

use crate::packet::{Frame, PacketHeader};

/// Whether a queued outbound frame is ready to transmit or is waiting on an
/// ACK/NAK (§3 of the specification).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendState {
    Send,
    AwaitAck,
}

/// One outstanding outbound frame and its retry bookkeeping.
#[derive(Debug)]
pub(crate) struct SendQueueEntry {
    pub frame: Frame,
    pub state: SendState,
    pub retries: u32,
    pub last_send_tick_ms: u32,
}

impl SendQueueEntry {
    pub(crate) fn new(frame: Frame) -> SendQueueEntry {
        SendQueueEntry {
            frame,
            state: SendState::Send,
            retries: 0,
            last_send_tick_ms: 0,
        }
    }
}

/// Per-port ordered list of outstanding outbound frames (§4.3). A linked list in
/// the original C source; here a `VecDeque` held by value, since "next" pointers
/// have no reason to survive the move to a systems language with an owning
/// collection (per the specification's redesign guidance in §9).
#[derive(Debug, Default)]
pub(crate) struct SendQueue {
    entries: VecDeque<SendQueueEntry>,
}

impl SendQueue {
    pub(crate) fn new() -> SendQueue {
        SendQueue {
            entries: VecDeque::new(),
        }
    }

    /// Appends at the tail.
    pub(crate) fn insert(&mut self, entry: SendQueueEntry) {
        self.entries.push_back(entry);
    }

    /// Unlinks the first entry whose header matches `header` under full identity
    /// (transId, destId, srcId, type, checksum, bodySize). Ties break to the
    /// earliest match from the head.
    pub(crate) fn erase(&mut self, header: &PacketHeader) {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.frame.header.same_entry(header))
        {
            self.entries.remove(pos);
        }
    }

    pub(crate) fn front(&self) -> Option<&SendQueueEntry> {
        self.entries.front()
    }

    pub(crate) fn front_mut(&mut self) -> Option<&mut SendQueueEntry> {
        self.entries.front_mut()
    }

    /// Finds the outstanding entry that `received` (an incoming ACK/NAK header)
    /// correlates with: same transaction id, with src/dest swapped.
    pub(crate) fn find_mut(&mut self, received: &PacketHeader) -> Option<&mut SendQueueEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.frame.header.correlates_with(received))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut SendQueueEntry> {
        self.entries.iter_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Direction, PacketKind};

    fn header(trans: u8, dest: u8, src: u8) -> PacketHeader {
        PacketHeader {
            dest_id: dest,
            src_id: src,
            kind: PacketKind::Data,
            body_size: 0,
            trans_id: trans,
            checksum: 0,
        }
    }

    fn entry(trans: u8, dest: u8, src: u8) -> SendQueueEntry {
        SendQueueEntry::new(Frame::new(header(trans, dest, src), Vec::new(), Direction::Send))
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q = SendQueue::new();
        q.insert(entry(1, 1, 0));
        q.insert(entry(2, 1, 0));
        assert_eq!(q.front().unwrap().frame.header.trans_id, 1);
    }

    #[test]
    fn find_matches_swapped_src_dest() {
        let mut q = SendQueue::new();
        q.insert(entry(5, 1, 0)); // src=0 dest=1, outstanding DATA from socket 0 to 1
        let incoming_ack = header(5, 0, 1); // ACK travels dest=0 (was src) src=1 (was dest)
        assert!(q.find_mut(&incoming_ack).is_some());
    }

    #[test]
    fn erase_removes_first_identity_match() {
        let mut q = SendQueue::new();
        q.insert(entry(1, 1, 0));
        q.insert(entry(1, 1, 0));
        assert_eq!(q.len(), 2);
        q.erase(&header(1, 1, 0));
        assert_eq!(q.len(), 1);
    }
}
