use std::{
    future::Future,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use super::ConnectionProvider;
use crate::{
    vnet::{Interface, Socket},
    Result, TransportError,
};

/// Hands out client ends of connections over a virtual [`Interface`].
#[derive(Debug)]
pub struct VirtualConnectionProvider {
    interface: Interface,
    max_read: AtomicUsize,
    max_write: AtomicUsize,
    closed: AtomicBool,
}

impl VirtualConnectionProvider {
    pub fn new(interface: Interface) -> Self {
        Self {
            interface,
            max_read: AtomicUsize::new(usize::MAX),
            max_write: AtomicUsize::new(usize::MAX),
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    /// Cap how many bytes a single read or write on the produced sockets moves.
    /// Meant for exercising partial-I/O handling; `usize::MAX` means no cap.
    pub fn set_max_available_to_read_write(&self, max_read: usize, max_write: usize) {
        self.max_read.store(max_read, Ordering::Relaxed);
        self.max_write.store(max_write, Ordering::Relaxed);
    }

    pub fn with_max_available_to_read_write(self, max_read: usize, max_write: usize) -> Self {
        self.set_max_available_to_read_write(max_read, max_write);
        self
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::ProviderClosed);
        }
        Ok(())
    }

    fn configure(&self, mut socket: Socket) -> Socket {
        socket.set_max_available_to_read_write(
            self.max_read.load(Ordering::Relaxed),
            self.max_write.load(Ordering::Relaxed),
        );
        socket
    }
}

impl ConnectionProvider for VirtualConnectionProvider {
    type Connection = Socket;
    type AsyncConnection = Socket;
    type Error = TransportError;

    fn get_connection(&self) -> Result<Self::Connection> {
        self.check_open()?;
        self.interface.connect().map(|socket| self.configure(socket))
    }

    fn get_connection_async(&self) -> impl Future<Output = Result<Self::AsyncConnection>> {
        async move {
            self.check_open()?;
            let socket = self.interface.connect_async().await?;
            Ok(self.configure(socket))
        }
    }

    /// Stop handing out connections. Sockets already handed out stay usable.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
