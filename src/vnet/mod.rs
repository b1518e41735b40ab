//! In-process virtual network.
//!
//! An [`Interface`] is a named rendezvous point. One [`Listener`] binds it and accepts,
//! any number of clients connect to it; every accepted connect yields a fresh
//! [`Socket`] pair.

mod pipe;
mod socket;

use std::{
    collections::{HashMap, VecDeque},
    future::poll_fn,
    io, mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, Weak,
    },
    task::{Poll, Waker},
};

use smol_str::SmolStr;
pub use socket::Socket;

use crate::{Result, TransportError};

/// Per-direction buffer size of sockets created through an interface.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// A named rendezvous between one bound listener and many connecting clients.
///
/// Cloning is cheap and every clone refers to the same interface.
#[derive(Clone, Debug)]
pub struct Interface {
    inner: Arc<InterfaceInner>,
}

#[derive(Debug)]
struct InterfaceInner {
    name: SmolStr,
    buffer_capacity: usize,
    state: Mutex<InterfaceState>,
    cond: Condvar,
}

#[derive(Debug, Default)]
struct InterfaceState {
    listener: Option<u64>,
    pending: VecDeque<Arc<Submission>>,
    accept_waker: Option<Waker>,
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn registry() -> MutexGuard<'static, HashMap<SmolStr, Weak<InterfaceInner>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<SmolStr, Weak<InterfaceInner>>>> = OnceLock::new();
    REGISTRY
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl Interface {
    /// A private interface, not visible through [`Interface::obtain_shared`].
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self::new_with_capacity(name, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn new_with_capacity(name: impl Into<SmolStr>, buffer_capacity: usize) -> Self {
        Self {
            inner: Arc::new(InterfaceInner {
                name: name.into(),
                buffer_capacity: buffer_capacity.max(1),
                state: Mutex::new(InterfaceState::default()),
                cond: Condvar::new(),
            }),
        }
    }

    /// Returns the live process-wide interface called `name`, creating it if no
    /// handle to it is alive.
    pub fn obtain_shared(name: &str) -> Self {
        let mut registry = registry();
        if let Some(inner) = registry.get(name).and_then(Weak::upgrade) {
            return Self { inner };
        }
        registry.retain(|_, weak| weak.strong_count() > 0);
        let interface = Self::new(name);
        registry.insert(interface.inner.name.clone(), Arc::downgrade(&interface.inner));
        interface
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.inner.buffer_capacity
    }

    pub fn is_bound(&self) -> bool {
        self.inner.lock().listener.is_some()
    }

    /// Connects submitted but not yet accepted.
    pub fn pending_connections(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Become the single acceptor of this interface.
    pub fn bind(&self) -> Result<Listener> {
        let mut state = self.inner.lock();
        if state.listener.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("virtual interface {} is already bound", self.inner.name),
            )
            .into());
        }
        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        state.listener = Some(id);
        Ok(Listener {
            interface: self.clone(),
            id,
        })
    }

    /// Connect and block until the listener accepts.
    pub fn connect(&self) -> Result<Socket> {
        let ticket = self.submit()?;
        let mut state = ticket.submission.lock();
        loop {
            match ticket.try_complete(&mut state) {
                Poll::Ready(res) => return res,
                Poll::Pending => {
                    state = ticket
                        .submission
                        .cond
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Connect without blocking the worker. Dropping the future withdraws the
    /// connect; the listener never sees it.
    pub async fn connect_async(&self) -> Result<Socket> {
        let ticket = self.submit()?;
        poll_fn(|cx| {
            let mut state = ticket.submission.lock();
            let res = ticket.try_complete(&mut state);
            if res.is_pending() {
                *state = SubmissionState::Pending(Some(cx.waker().clone()));
            }
            res
        })
        .await
    }

    fn submit(&self) -> Result<Ticket> {
        let mut state = self.inner.lock();
        if state.listener.is_none() {
            return Err(TransportError::InterfaceUnbound(self.inner.name.clone()));
        }
        let submission = Arc::new(Submission::default());
        state.pending.push_back(submission.clone());
        if let Some(waker) = state.accept_waker.take() {
            waker.wake();
        }
        self.inner.cond.notify_all();
        Ok(Ticket {
            submission,
            name: self.inner.name.clone(),
        })
    }
}

impl InterfaceInner {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, InterfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The accepting side of a bound [`Interface`]. Dropping it unbinds the interface.
#[derive(Debug)]
pub struct Listener {
    interface: Interface,
    id: u64,
}

impl Listener {
    #[inline]
    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    /// Block until a client connects and return the server end.
    pub fn accept(&self) -> Result<Socket> {
        let inner = &self.interface.inner;
        let mut state = inner.lock();
        loop {
            if let Poll::Ready(res) = self.try_accept(&mut state) {
                return res;
            }
            state = inner.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub async fn accept_async(&self) -> Result<Socket> {
        poll_fn(|cx| {
            let mut state = self.interface.inner.lock();
            let res = self.try_accept(&mut state);
            if res.is_pending() {
                state.accept_waker = Some(cx.waker().clone());
            }
            res
        })
        .await
    }

    /// Unbind the interface. Pending connects fail with
    /// [`TransportError::InterfaceClosed`], as do later accepts.
    pub fn close(&self) {
        let inner = &self.interface.inner;
        let mut state = inner.lock();
        if state.listener != Some(self.id) {
            return;
        }
        state.listener = None;
        for submission in state.pending.drain(..) {
            submission.reject();
        }
        if let Some(waker) = state.accept_waker.take() {
            waker.wake();
        }
        inner.cond.notify_all();
    }

    fn try_accept(&self, state: &mut InterfaceState) -> Poll<Result<Socket>> {
        if state.listener != Some(self.id) {
            return Poll::Ready(Err(TransportError::InterfaceClosed(
                self.interface.inner.name.clone(),
            )));
        }
        while let Some(submission) = state.pending.pop_front() {
            if let Some(server) = submission.deliver(self.interface.inner.buffer_capacity) {
                #[cfg(feature = "logging")]
                tracing::debug!("accepted virtual connection on {}", self.interface.name());
                return Poll::Ready(Ok(server));
            }
        }
        Poll::Pending
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Default)]
struct Submission {
    state: Mutex<SubmissionState>,
    cond: Condvar,
}

#[derive(Debug)]
enum SubmissionState {
    Pending(Option<Waker>),
    Accepted(Socket),
    Rejected,
    Done,
}

impl Submission {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, SubmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pair a pending connect and hand back the server end. `None` when the client
    /// already gave up.
    fn deliver(&self, capacity: usize) -> Option<Socket> {
        let mut state = self.lock();
        let SubmissionState::Pending(waker) = &mut *state else {
            return None;
        };
        let waker = waker.take();
        let (client, server) = Socket::pair(capacity);
        *state = SubmissionState::Accepted(client);
        self.cond.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        Some(server)
    }

    fn reject(&self) {
        let mut state = self.lock();
        if let SubmissionState::Pending(waker) = &mut *state {
            let waker = waker.take();
            *state = SubmissionState::Rejected;
            self.cond.notify_all();
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }
}

impl Default for SubmissionState {
    fn default() -> Self {
        SubmissionState::Pending(None)
    }
}

/// The client's claim on a submitted connect. Dropping it while the connect is
/// still pending withdraws it.
struct Ticket {
    submission: Arc<Submission>,
    name: SmolStr,
}

impl Ticket {
    fn try_complete(&self, state: &mut SubmissionState) -> Poll<Result<Socket>> {
        match mem::replace(state, SubmissionState::Done) {
            SubmissionState::Accepted(client) => Poll::Ready(Ok(client)),
            SubmissionState::Rejected => {
                Poll::Ready(Err(TransportError::InterfaceClosed(self.name.clone())))
            }
            pending @ SubmissionState::Pending(_) => {
                *state = pending;
                Poll::Pending
            }
            SubmissionState::Done => {
                Poll::Ready(Err(TransportError::InterfaceClosed(self.name.clone())))
            }
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        // Done here means the acceptor skips it; an accepted socket not yet taken
        // is dropped with the submission and the server end sees EOF.
        let mut state = self.submission.lock();
        if matches!(*state, SubmissionState::Pending(_)) {
            *state = SubmissionState::Done;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use monoio::io::{AsyncReadRentExt, AsyncWriteRentExt};

    use super::*;

    fn wait_for_pending(interface: &Interface, n: usize) {
        while interface.pending_connections() < n {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn connect_requires_listener() {
        let interface = Interface::new("unbound");
        assert!(matches!(
            interface.connect(),
            Err(TransportError::InterfaceUnbound(name)) if name == "unbound"
        ));
    }

    #[test]
    fn bind_is_exclusive_until_listener_drops() {
        let interface = Interface::new("exclusive");
        let listener = interface.bind().unwrap();
        match interface.bind() {
            Err(TransportError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::AddrInUse),
            other => panic!("unexpected {other:?}"),
        }
        drop(listener);
        assert!(!interface.is_bound());
        let _listener = interface.bind().unwrap();
    }

    #[test]
    fn blocking_connect_and_accept() {
        use std::io::{Read, Write};

        // std and monoio extension traits share method names here
        let interface = Interface::new_with_capacity("blocking", 8);
        let listener = interface.bind().unwrap();
        let client = {
            let interface = interface.clone();
            thread::spawn(move || {
                let mut socket = interface.connect().unwrap();
                Write::write_all(&mut socket, b"ping").unwrap();
                let mut buf = [0u8; 4];
                Read::read_exact(&mut socket, &mut buf).unwrap();
                buf
            })
        };

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        Read::read_exact(&mut server, &mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        Write::write_all(&mut server, b"pong").unwrap();
        assert_eq!(&client.join().unwrap(), b"pong");
    }

    #[test]
    fn close_rejects_pending_connects() {
        let interface = Interface::new("rejecting");
        let listener = interface.bind().unwrap();
        let client = {
            let interface = interface.clone();
            thread::spawn(move || interface.connect())
        };
        wait_for_pending(&interface, 1);
        listener.close();

        assert!(matches!(
            client.join().unwrap(),
            Err(TransportError::InterfaceClosed(_))
        ));
        assert!(matches!(
            listener.accept(),
            Err(TransportError::InterfaceClosed(_))
        ));
    }

    #[test]
    fn obtain_shared_returns_live_interface() {
        let a = Interface::obtain_shared("registry-test");
        let b = Interface::obtain_shared("registry-test");
        let _listener = a.bind().unwrap();
        assert!(b.is_bound());
        assert!(!Interface::obtain_shared("registry-test-other").is_bound());
    }

    #[monoio::test]
    async fn async_connect_and_accept() {
        let interface = Interface::new("async");
        let listener = interface.bind().unwrap();

        let server = monoio::spawn(async move {
            let mut server = listener.accept_async().await.unwrap();
            let (res, buf) = server.read_exact(vec![0u8; 5]).await;
            res.unwrap();
            let (res, _) = server.write_all(buf).await;
            res.unwrap();
            server
        });

        let mut client = interface.connect_async().await.unwrap();
        let (res, _) = client.write_all(b"hello").await;
        res.unwrap();
        let (res, buf) = client.read_exact(vec![0u8; 5]).await;
        res.unwrap();
        assert_eq!(&buf, b"hello");
        drop(server.await);
    }

    #[monoio::test(enable_timer = true)]
    async fn withdrawn_connect_is_skipped() {
        let interface = Interface::new("withdrawn");
        let listener = interface.bind().unwrap();

        let withdrawn =
            monoio::time::timeout(Duration::from_millis(10), interface.connect_async()).await;
        assert!(withdrawn.is_err());
        assert_eq!(interface.pending_connections(), 1);

        let connecting = {
            let interface = interface.clone();
            monoio::spawn(async move { interface.connect_async().await })
        };
        let mut server = listener.accept_async().await.unwrap();
        let mut client = connecting.await.unwrap();

        let (res, _) = client.write_all(b"ok").await;
        res.unwrap();
        let (res, buf) = server.read_exact(vec![0u8; 2]).await;
        res.unwrap();
        assert_eq!(&buf, b"ok");
        assert_eq!(interface.pending_connections(), 0);
    }
}
