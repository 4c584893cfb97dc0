use crate::packet::{Direction, PortId, SocketId};
use crate::error::SspError;

/// Caller-registered callback invoked on DATA reception or send completion/
/// failure (§4.4/§4.5). The original's raw function pointer plus `void* userData`
/// pair collapses into a single trait object here: whatever state the original
/// would have threaded through `userData` is simply captured by the closure or
/// struct implementing this trait (§9's redesign guidance).
pub trait Listener: Send {
    fn on_event(&mut self, socket_id: SocketId, data: &[u8], direction: Direction, err: SspError);
}

impl<F> Listener for F
where
    F: FnMut(SocketId, &[u8], Direction, SspError) + Send,
{
    fn on_event(&mut self, socket_id: SocketId, data: &[u8], direction: Direction, err: SspError) {
        self(socket_id, data, direction, err)
    }
}

/// A socket's binding: which port it's attached to, and its listener, if any
/// (§3). A listener is installed at most once per binding — reinstalling
/// after `close_socket`/`open_socket` is a fresh binding and may register again.
#[derive(Default)]
pub(crate) struct SocketEntry {
    pub bound_port: Option<PortId>,
    pub listener: Option<Box<dyn Listener>>,
}

/// Maps socket identifiers to their port binding and listener (§3's "Socket
/// table"). Indexed by `SocketId` up to `max_sockets`.
pub(crate) struct SocketTable {
    entries: Vec<SocketEntry>,
}

impl SocketTable {
    pub(crate) fn new(max_sockets: u8) -> SocketTable {
        let mut entries = Vec::with_capacity(max_sockets as usize);
        entries.resize_with(max_sockets as usize, SocketEntry::default);
        SocketTable { entries }
    }

    pub(crate) fn in_range(&self, socket_id: SocketId) -> bool {
        (socket_id as usize) < self.entries.len()
    }

    pub(crate) fn get(&self, socket_id: SocketId) -> Option<&SocketEntry> {
        self.entries.get(socket_id as usize)
    }

    pub(crate) fn get_mut(&mut self, socket_id: SocketId) -> Option<&mut SocketEntry> {
        self.entries.get_mut(socket_id as usize)
    }

    pub(crate) fn port_of(&self, socket_id: SocketId) -> Option<PortId> {
        self.get(socket_id).and_then(|e| e.bound_port)
    }

    pub(crate) fn is_open(&self, socket_id: SocketId) -> bool {
        self.get(socket_id).map_or(false, |e| e.bound_port.is_some())
    }
}
