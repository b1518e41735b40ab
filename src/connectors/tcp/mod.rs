//! Real TCP connection provider.
//!
//! Both acquisition paths run the same [`ConnectMachine`]: resolve the host, then try
//! every candidate strictly in resolver order until one connects. The blocking path
//! uses blocking sockets; the suspendable path uses a non-blocking socket and parks
//! the task on write readiness while the connect is in progress.
mod classify;
mod machine;
mod resolve;

use std::{
    future::Future,
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr},
    pin::Pin,
    task::Poll,
};

pub use classify::{classify, ConnectOutcome};
use local_sync::oneshot::Receiver;
pub use machine::{ConnectMachine, ConnectState, Event, Transition};
use monoio::net::TcpStream;
pub use resolve::{GaiResolver, Resolve, StaticResolver};
use smol_str::SmolStr;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use super::ConnectionProvider;
use crate::{Result, TransportError};

#[derive(Clone, Debug)]
pub struct TcpConnectionProvider<R = GaiResolver> {
    host: SmolStr,
    port: u16,
    no_delay: bool,
    resolver: R,
}

impl TcpConnectionProvider {
    pub fn new(host: impl Into<SmolStr>, port: u16) -> Self {
        Self::with_resolver(host, port, GaiResolver)
    }
}

impl<R> TcpConnectionProvider<R> {
    pub fn with_resolver(host: impl Into<SmolStr>, port: u16, resolver: R) -> Self {
        Self {
            host: host.into(),
            port,
            no_delay: false,
            resolver,
        }
    }

    /// Set `TCP_NODELAY` on every connection handed out. Failures are ignored.
    #[inline]
    pub fn with_no_delay(mut self, no_delay: bool) -> Self {
        self.no_delay = no_delay;
        self
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

impl<R: Resolve> TcpConnectionProvider<R> {
    /// Like [`get_connection_async`](ConnectionProvider::get_connection_async), but
    /// gives up with [`TransportError::Cancelled`] once `cancel` fires.
    ///
    /// Cancellation is observed at suspension points only. Dropping the sender
    /// without sending does not cancel.
    pub async fn get_connection_cancellable(&self, cancel: Receiver<()>) -> Result<TcpStream> {
        self.connect_async(Some(Box::pin(cancel))).await
    }

    fn connect_blocking(&self) -> Result<TcpConnection> {
        let mut machine = ConnectMachine::new();
        let mut event = Event::Start;
        loop {
            event = match machine.on_event(event) {
                Transition::Resolve => {
                    Event::Resolved(self.resolver.resolve(&self.host, self.port))
                }
                Transition::Open(addr) => Event::Opened(open_socket(&addr)),
                Transition::Connect(socket, addr) => {
                    Event::Connect(classify(socket.connect(&SockAddr::from(addr))))
                }
                // A blocking socket only reports this with a send timeout set; treat the
                // candidate as failed rather than spin.
                Transition::WaitWritable(_) => {
                    Event::Writable(Some(io::ErrorKind::WouldBlock.into()))
                }
                Transition::Complete(result) => {
                    let (socket, peer) = result?;
                    post_connect(&socket);
                    let stream = std::net::TcpStream::from(socket);
                    if self.no_delay {
                        // we will ignore the set nodelay error
                        let _ = stream.set_nodelay(true);
                    }
                    return Ok(TcpConnection { stream, peer });
                }
            };
        }
    }

    async fn connect_async(&self, mut cancel: Option<Pin<Box<Receiver<()>>>>) -> Result<TcpStream> {
        let mut machine = ConnectMachine::new();
        let mut event = Event::Start;
        loop {
            event = match machine.on_event(event) {
                Transition::Resolve => {
                    match suspend(self.resolver.resolve_async(&self.host, self.port), &mut cancel)
                        .await
                    {
                        Some(resolved) => Event::Resolved(resolved),
                        None => Event::Cancel,
                    }
                }
                Transition::Open(addr) => Event::Opened(open_nonblocking_socket(&addr)),
                Transition::Connect(socket, addr) => {
                    Event::Connect(classify(socket.connect(&SockAddr::from(addr))))
                }
                Transition::WaitWritable(socket) => {
                    match suspend(wait_writable(socket), &mut cancel).await {
                        Some(Ok(pending)) => Event::Writable(pending),
                        Some(Err(e)) => Event::Writable(Some(e)),
                        None => Event::Cancel,
                    }
                }
                Transition::Complete(result) => {
                    let (socket, _peer) = result?;
                    post_connect(&socket);
                    let stream = TcpStream::from_std(socket.into())?;
                    if self.no_delay {
                        // we will ignore the set nodelay error
                        let _ = stream.set_nodelay(true);
                    }
                    #[cfg(feature = "logging")]
                    tracing::debug!("connected to {}", _peer);
                    return Ok(stream);
                }
            };
        }
    }
}

impl<R: Resolve> ConnectionProvider for TcpConnectionProvider<R> {
    type Connection = TcpConnection;
    type AsyncConnection = TcpStream;
    type Error = TransportError;

    #[inline]
    fn get_connection(&self) -> Result<Self::Connection> {
        self.connect_blocking()
    }

    #[inline]
    fn get_connection_async(&self) -> impl Future<Output = Result<Self::AsyncConnection>> {
        self.connect_async(None)
    }

    /// A TCP provider holds no sockets of its own.
    #[inline]
    fn close(&self) {}
}

/// A blocking TCP connection. The socket is closed on drop.
#[derive(Debug)]
pub struct TcpConnection {
    stream: std::net::TcpStream,
    peer: SocketAddr,
}

impl TcpConnection {
    /// The candidate address this connection was established to.
    #[inline]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Shut down both directions. The handle itself is released on drop.
    pub fn close(&self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }

    #[inline]
    pub fn into_inner(self) -> std::net::TcpStream {
        self.stream
    }
}

impl Read for TcpConnection {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpConnection {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

fn open_socket(addr: &SocketAddr) -> io::Result<Socket> {
    Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))
}

fn open_nonblocking_socket(addr: &SocketAddr) -> io::Result<Socket> {
    let socket = open_socket(addr)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Park until `socket` is writable, then report its pending error.
///
/// The wait goes through a duplicate of the descriptor registered with the monoio
/// driver; the original stays owned by the state machine.
async fn wait_writable(socket: &Socket) -> io::Result<Option<io::Error>> {
    let probe = TcpStream::from_std(socket.try_clone()?.into())?;
    probe.writable(false).await?;
    socket.take_error()
}

/// Poll `fut` unless `cancel` fires first. `None` means cancelled.
async fn suspend<F: Future>(
    fut: F,
    cancel: &mut Option<Pin<Box<Receiver<()>>>>,
) -> Option<F::Output> {
    let mut fut = std::pin::pin!(fut);
    std::future::poll_fn(|cx| {
        if let Some(rx) = cancel.as_mut() {
            match rx.as_mut().poll(cx) {
                Poll::Ready(Ok(())) => return Poll::Ready(None),
                // sender gone without cancelling
                Poll::Ready(Err(_)) => *cancel = None,
                Poll::Pending => (),
            }
        }
        fut.as_mut().poll(cx).map(Some)
    })
    .await
}

fn post_connect(_socket: &Socket) {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    if let Err(_e) = _socket.set_nosigpipe(true) {
        #[cfg(feature = "logging")]
        tracing::warn!("failed to set SO_NOSIGPIPE: {}", _e);
    }
}
