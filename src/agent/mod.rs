//! Curl agent that executes many exchanges simultaneously.
//!
//! The agent is implemented as a single background thread attached to a
//! "handle". The handle communicates with the agent thread by using message
//! passing. The agent executes multiple curl transfers simultaneously by using
//! a single "multi" handle, and publishes the outcome of each transfer through
//! the transfer's own handler.

use crate::{
    error::{Error, ErrorKind},
    handler::ExchangeHandler,
};
use async_channel::{Receiver, Sender};
use crossbeam_utils::{atomic::AtomicCell, sync::WaitGroup};
use curl::multi::{Easy2Handle, Events, Multi, Socket, SocketEvents};
use futures_lite::future::block_on;
use slab::Slab;
use std::{
    io,
    sync::{Arc, Mutex},
    task::Waker,
    thread,
    time::{Duration, Instant},
};

use self::{selector::Selector, timer::Timer};

mod selector;
mod timer;

static NEXT_AGENT_ID: AtomicCell<usize> = AtomicCell::new(0);
const WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

pub(crate) type EasyHandle = curl::easy::Easy2<ExchangeHandler>;

/// Builder for configuring and spawning an agent.
#[derive(Debug, Default)]
pub(crate) struct AgentBuilder {
    max_connections: usize,
}

impl AgentBuilder {
    pub(crate) fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Spawn a new agent using the configuration in this builder and return a
    /// handle for communicating with the agent.
    pub(crate) fn spawn(&self) -> io::Result<Handle> {
        let create_start = Instant::now();

        // Initialize libcurl on the current thread, which is hopefully the
        // main thread, rather than letting the agent thread do it.
        curl::init();

        let id = NEXT_AGENT_ID.fetch_add(1);
        let selector = Selector::new()?;
        let waker = selector.waker();
        let (message_tx, message_rx) = async_channel::unbounded();

        let wait_group = WaitGroup::new();
        let wait_group_thread = wait_group.clone();
        let max_connections = self.max_connections;

        // Create a span for the agent thread that outlives this method call,
        // but rather was caused by it.
        let agent_span = tracing::debug_span!("agent_thread", id);
        agent_span.follows_from(tracing::Span::current());

        let thread_main = move || {
            let _enter = agent_span.enter();
            let mut multi = Multi::new();

            // Zero means no limit, which is also curl's default.
            if max_connections > 0 {
                multi.set_max_total_connections(max_connections)?;
            }

            let agent = AgentContext::new(multi, selector, message_rx)?;

            drop(wait_group_thread);

            tracing::debug!("agent took {:?} to start up", create_start.elapsed());

            let result = agent.run();

            if let Err(e) = &result {
                tracing::error!("agent shut down with error: {}", e);
            }

            result
        };

        let handle = Handle {
            message_tx,
            waker,
            join_handle: Mutex::new(Some(
                thread::Builder::new()
                    .name(format!("volley-agent-{}", id))
                    .spawn(thread_main)?,
            )),
        };

        // Block until the agent thread is ready, or has already given up.
        wait_group.wait();

        Ok(handle)
    }
}

/// A handle to an active agent running in a background thread.
///
/// Dropping the handle will cause the agent thread to shut down. Transfers
/// still in flight at that point are torn down, and their handlers publish an
/// aborted result.
#[derive(Debug)]
pub(crate) struct Handle {
    /// Used to send messages to the agent thread.
    message_tx: Sender<Message>,

    /// A waker that can wake up the agent thread while it is polling.
    waker: Waker,

    /// A join handle for the agent thread.
    join_handle: Mutex<Option<thread::JoinHandle<Result<(), Error>>>>,
}

/// A message sent from a handle to the agent thread.
#[derive(Debug)]
enum Message {
    /// Requests the agent to close.
    Close,

    /// Begin executing a new transfer.
    Execute(EasyHandle),
}

impl Handle {
    /// Begin executing a transfer with this agent.
    ///
    /// If the agent is gone the transfer is dropped, which makes its handler
    /// publish an aborted result.
    pub(crate) fn submit(&self, request: EasyHandle) -> Result<(), Error> {
        self.send_message(Message::Execute(request))
    }

    /// Send a message to the agent thread.
    fn send_message(&self, message: Message) -> Result<(), Error> {
        match self.message_tx.try_send(message) {
            Ok(()) => {
                // Wake the agent thread up so it will check its messages soon.
                self.waker.wake_by_ref();
                Ok(())
            }
            Err(_) => Err(self.join_error()),
        }
    }

    /// Find out why the agent thread is no longer accepting messages.
    fn join_error(&self) -> Error {
        let join_handle = match self.join_handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        match join_handle.map(thread::JoinHandle::join) {
            Some(Ok(Err(e))) => e,
            Some(Err(_)) => Error::with_context(ErrorKind::Unknown, "agent thread panicked"),
            _ => Error::with_context(ErrorKind::Unknown, "agent thread terminated prematurely"),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        // Request the agent thread to shut down.
        if self.message_tx.try_send(Message::Close).is_ok() {
            self.waker.wake_by_ref();
        }

        let join_handle = match self.join_handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        // Wait for the agent thread to shut down before continuing.
        match join_handle.map(thread::JoinHandle::join) {
            Some(Ok(Ok(()))) => tracing::trace!("agent thread joined cleanly"),
            Some(Ok(Err(e))) => tracing::error!("agent thread terminated with error: {}", e),
            Some(Err(_)) => tracing::error!("agent thread panicked"),
            None => {}
        }
    }
}

/// Internal state of an agent thread.
///
/// The agent thread runs the primary event loop, which is essentially a
/// traditional curl multi event loop with some extra bookkeeping.
struct AgentContext {
    /// A curl multi handle, of course.
    multi: Multi,

    /// Incoming messages from the agent handle.
    message_rx: Receiver<Message>,

    /// Contains all of the active transfers.
    requests: Slab<Easy2Handle<ExchangeHandler>>,

    /// Indicates if the thread has been requested to stop.
    close_requested: bool,

    /// This is the poller we use to poll for socket activity!
    selector: Selector,

    /// A timer we use to keep track of curl's timeouts.
    timer: Arc<Timer>,

    /// Queue of socket registration updates from the multi handle.
    socket_updates: Receiver<(Socket, SocketEvents, usize)>,
}

impl AgentContext {
    fn new(mut multi: Multi, selector: Selector, message_rx: Receiver<Message>) -> Result<Self, Error> {
        let timer = Arc::new(Timer::new());
        let (socket_updates_tx, socket_updates_rx) = async_channel::unbounded();

        multi.socket_function(move |socket, events, key| {
            let _ = socket_updates_tx.try_send((socket, events, key));
        })?;

        multi.timer_function({
            let timer = timer.clone();

            move |timeout| {
                match timeout {
                    Some(timeout) => timer.start(timeout),
                    None => timer.stop(),
                }

                true
            }
        })?;

        Ok(Self {
            multi,
            message_rx,
            requests: Slab::new(),
            close_requested: false,
            selector,
            timer,
            socket_updates: socket_updates_rx,
        })
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn begin_request(&mut self, mut request: EasyHandle) {
        let entry = self.requests.vacant_entry();
        let id = entry.key();

        request.get_mut().init(id);

        // A transfer curl refuses to take on is dropped here, and its handler
        // reports it as aborted. The other transfers carry on.
        let mut handle = match self.multi.add2(request) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(id, "failed to register transfer: {}", e);
                return;
            }
        };

        if let Err(e) = handle.set_token(id) {
            tracing::warn!(id, "failed to assign transfer token: {}", e);
            let _ = self.multi.remove2(handle);
            return;
        }

        entry.insert(handle);
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn complete_request(&mut self, token: usize, result: Result<(), curl::Error>) -> Result<(), Error> {
        if !self.requests.contains(token) {
            tracing::warn!(token, "completion for unknown transfer");
            return Ok(());
        }

        let handle = self.requests.remove(token);

        let mut easy = self.multi.remove2(handle)?;

        // A transfer that reached the point of sending its request has
        // finished connecting, including any TLS handshake.
        let established = easy
            .pretransfer_time()
            .map(|time| time > Duration::ZERO)
            .unwrap_or(false);

        easy.get_mut().on_result(result, established);

        Ok(())
    }

    /// Polls the message channel for new messages from the agent handle.
    ///
    /// If there are no active transfers right now, this function will block
    /// until a message is received.
    #[tracing::instrument(level = "trace", skip(self))]
    fn poll_messages(&mut self) {
        while !self.close_requested {
            if self.requests.is_empty() {
                match block_on(self.message_rx.recv()) {
                    Ok(message) => self.handle_message(message),
                    Err(_) => {
                        tracing::warn!("agent handle disconnected without close message");
                        self.close_requested = true;
                    }
                }
            } else {
                match self.message_rx.try_recv() {
                    Ok(message) => self.handle_message(message),
                    Err(async_channel::TryRecvError::Empty) => break,
                    Err(async_channel::TryRecvError::Closed) => {
                        tracing::warn!("agent handle disconnected without close message");
                        self.close_requested = true;
                    }
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        tracing::trace!("received message from agent handle");

        match message {
            Message::Close => self.close_requested = true,
            Message::Execute(request) => self.begin_request(request),
        }
    }

    /// Run the agent in the current thread until requested to stop.
    fn run(mut self) -> Result<(), Error> {
        let mut multi_messages = Vec::new();

        // Agent main loop.
        loop {
            self.poll_messages();

            if self.close_requested {
                break;
            }

            // Block until activity is detected or the timeout passes.
            self.poll()?;

            // Collect messages from curl about transfers that have completed,
            // whether successfully or with an error.
            self.multi.messages(|message| {
                if let Some(result) = message.result() {
                    if let Ok(token) = message.token() {
                        multi_messages.push((token, result));
                    }
                }
            });

            for (token, result) in multi_messages.drain(..) {
                self.complete_request(token, result)?;
            }
        }

        tracing::debug!(active = self.requests.len(), "agent shutting down");

        Ok(())
    }

    /// Block until activity is detected or a timeout passes.
    fn poll(&mut self) -> Result<(), Error> {
        let now = Instant::now();
        let timeout = self.timer.get_remaining(now);

        // Get the latest timeout value from curl that we should use, limited to
        // a maximum we chose.
        let poll_timeout = timeout.map(|t| t.min(WAIT_TIMEOUT)).unwrap_or(WAIT_TIMEOUT);

        // Block until either an I/O event occurs on a socket, the timeout is
        // reached, or the agent handle interrupts us.
        if self.selector.poll(poll_timeout)? {
            for (socket, readable, writable) in self.selector.events() {
                tracing::trace!(socket, readable, writable, "socket event");
                let mut events = Events::new();
                events.input(readable);
                events.output(writable);
                self.multi.action(socket, &events)?;
            }
        }

        // If curl gave us a timeout, check if it has expired.
        if self.timer.is_expired(Instant::now()) {
            self.timer.stop();
            self.multi.timeout()?;
        }

        // Apply any requested socket updates now.
        while let Ok((socket, events, _)) = self.socket_updates.try_recv() {
            if events.remove() {
                self.selector.deregister(socket)?;
            } else {
                let readable = events.input() || events.input_and_output();
                let writable = events.output() || events.input_and_output();

                self.selector.register(socket, readable, writable)?;
            }
        }

        Ok(())
    }
}

impl Drop for AgentContext {
    fn drop(&mut self) {
        // Detaching a transfer can make curl call back into the multi handle's
        // socket function, which is freed along with `multi`. Every transfer
        // must leave the multi handle first, on every exit path of `run`.
        for handle in self.requests.drain() {
            match self.multi.remove2(handle) {
                // The handler reports itself as aborted when dropped.
                Ok(easy) => drop(easy),
                Err(e) => tracing::debug!("error removing transfer during shutdown: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Handle: Send, Sync);
    static_assertions::assert_impl_all!(Message: Send);

    #[test]
    fn agent_starts_and_shuts_down() {
        let handle = AgentBuilder::default().max_connections(4).spawn().unwrap();

        drop(handle);
    }

    #[test]
    fn shutdown_aborts_transfers_in_flight() {
        // Accepts connections into its backlog but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        let handle = AgentBuilder::default().spawn().unwrap();
        let (tx, rx) = async_channel::unbounded();

        for index in 0..3 {
            let mut easy = curl::easy::Easy2::new(ExchangeHandler::new(index, Vec::new(), tx.clone()));
            easy.url(&url).unwrap();
            handle.submit(easy).unwrap();
        }
        drop(tx);

        thread::sleep(Duration::from_millis(200));
        drop(handle);

        let mut indices = Vec::new();
        while let Ok(result) = rx.try_recv() {
            assert_eq!(result.error().unwrap().kind(), &ErrorKind::Unknown);
            indices.push(result.index());
        }
        indices.sort_unstable();

        assert_eq!(indices, vec![0, 1, 2]);
    }
}
