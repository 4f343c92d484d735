use curl::multi::Socket;
use polling::{Event, Poller};
use std::{collections::HashMap, io, sync::Arc, task::Waker, time::Duration};

const ENOENT: i32 = 2;
const EBADF: i32 = 9;

/// Waits for activity on the sockets curl asks us to watch.
///
/// The underlying poller delivers oneshot events, while curl expects
/// level-triggered ones. The selector keeps track of each socket's interest
/// and re-arms sockets that fired before the next wait.
pub(crate) struct Selector {
    poller: Arc<Poller>,

    /// Interest of every registered socket.
    sockets: HashMap<Socket, Interest>,

    /// Events from the most recent wait. Re-used between calls.
    events: Vec<Event>,
}

#[derive(Clone, Copy)]
struct Interest {
    readable: bool,
    writable: bool,
}

impl Interest {
    fn event(self, socket: Socket) -> Event {
        Event {
            key: socket as usize,
            readable: self.readable,
            writable: self.writable,
        }
    }
}

impl Selector {
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            poller: Arc::new(Poller::new()?),
            sockets: HashMap::new(),
            events: Vec::new(),
        })
    }

    /// Get a task waker that will interrupt this selector whenever it is
    /// waiting for activity.
    pub(crate) fn waker(&self) -> Waker {
        let poller = self.poller.clone();

        waker_fn::waker_fn(move || {
            let _ = poller.notify();
        })
    }

    /// Register interest in a socket, or update the interest of a socket that
    /// is already registered.
    pub(crate) fn register(&mut self, socket: Socket, readable: bool, writable: bool) -> io::Result<()> {
        let interest = Interest { readable, writable };

        if self.sockets.insert(socket, interest).is_some() {
            modify_or_add(&self.poller, socket, interest)
        } else {
            add_or_modify(&self.poller, socket, interest)
        }
    }

    /// Stop watching a socket.
    pub(crate) fn deregister(&mut self, socket: Socket) -> io::Result<()> {
        if self.sockets.remove(&socket).is_some() {
            // Curl closes a socket right after asking us to stop watching it,
            // so by now the poller has usually forgotten it. The descriptor
            // may even belong to a new socket that is not registered yet.
            ignore_stale_descriptor(self.poller.delete(socket))?;
        }

        Ok(())
    }

    /// Block until socket activity is detected or a timeout passes.
    ///
    /// Returns `true` if one or more socket events occurred.
    pub(crate) fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        // Re-arm the sockets that fired during the previous wait and are
        // still registered.
        for event in self.events.drain(..) {
            let socket = event.key as Socket;

            if let Some(interest) = self.sockets.get(&socket) {
                modify_or_add(&self.poller, socket, *interest)?;
            }
        }

        match self.poller.wait(&mut self.events, Some(timeout)) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Socket events from the most recent call to `poll`, as `(socket,
    /// readable, writable)`.
    pub(crate) fn events(&self) -> impl Iterator<Item = (Socket, bool, bool)> + '_ {
        self.events
            .iter()
            .map(|event| (event.key as Socket, event.readable, event.writable))
    }
}

// A new socket may reuse the descriptor of one that was closed while still
// registered, so a failed add is retried as a modify and vice versa.

fn add_or_modify(poller: &Poller, socket: Socket, interest: Interest) -> io::Result<()> {
    if let Err(e) = ignore_bad_descriptor(poller.add(socket, interest.event(socket))) {
        tracing::debug!(socket, "failed to add socket, retrying as a modify: {}", e);
        ignore_bad_descriptor(poller.modify(socket, interest.event(socket)))?;
    }

    Ok(())
}

fn modify_or_add(poller: &Poller, socket: Socket, interest: Interest) -> io::Result<()> {
    if let Err(e) = ignore_bad_descriptor(poller.modify(socket, interest.event(socket))) {
        tracing::debug!(socket, "failed to modify socket, retrying as an add: {}", e);
        ignore_bad_descriptor(poller.add(socket, interest.event(socket)))?;
    }

    Ok(())
}

fn ignore_bad_descriptor(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.raw_os_error() == Some(EBADF) => Ok(()),
        result => result,
    }
}

fn ignore_stale_descriptor(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.raw_os_error() == Some(ENOENT) => Ok(()),
        result => ignore_bad_descriptor(result),
    }
}
