use std::{
    fmt::Display,
    future::Future,
    io::{self, Read, Write},
};

use monoio::{
    buf::{IoBuf, IoBufMut, IoVecBuf, IoVecBufMut},
    io::{AsyncReadRent, AsyncWriteRent},
    net::TcpStream,
    BufResult,
};

use super::{
    tcp::TcpConnection, ConnectionProvider, TcpConnectionProvider, VirtualConnectionProvider,
};
use crate::{vnet::Socket, Result, TransportError};

/// Either transport behind one provider type, as built from a
/// [`ProviderConfig`](crate::config::ProviderConfig).
#[derive(Debug)]
pub enum UnifiedProvider {
    Tcp(TcpConnectionProvider),
    Virtual(VirtualConnectionProvider),
}

impl Display for UnifiedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnifiedProvider::Tcp(p) => write!(f, "tcp://{}:{}", p.host(), p.port()),
            UnifiedProvider::Virtual(p) => write!(f, "virtual://{}", p.interface().name()),
        }
    }
}

impl From<TcpConnectionProvider> for UnifiedProvider {
    fn from(p: TcpConnectionProvider) -> Self {
        UnifiedProvider::Tcp(p)
    }
}

impl From<VirtualConnectionProvider> for UnifiedProvider {
    fn from(p: VirtualConnectionProvider) -> Self {
        UnifiedProvider::Virtual(p)
    }
}

/// Blocking connection handed out by a [`UnifiedProvider`].
#[derive(Debug)]
pub enum UnifiedConnection {
    Tcp(TcpConnection),
    Virtual(Socket),
}

/// Suspendable connection handed out by a [`UnifiedProvider`].
pub enum UnifiedStream {
    Tcp(TcpStream),
    Virtual(Socket),
}

impl std::fmt::Debug for UnifiedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(_) => write!(f, "Tcp"),
            Self::Virtual(_) => write!(f, "Virtual"),
        }
    }
}

impl ConnectionProvider for UnifiedProvider {
    type Connection = UnifiedConnection;
    type AsyncConnection = UnifiedStream;
    type Error = TransportError;

    fn get_connection(&self) -> Result<Self::Connection> {
        match self {
            UnifiedProvider::Tcp(p) => p.get_connection().map(UnifiedConnection::Tcp),
            UnifiedProvider::Virtual(p) => p.get_connection().map(UnifiedConnection::Virtual),
        }
    }

    fn get_connection_async(&self) -> impl Future<Output = Result<Self::AsyncConnection>> {
        async move {
            match self {
                UnifiedProvider::Tcp(p) => p.get_connection_async().await.map(UnifiedStream::Tcp),
                UnifiedProvider::Virtual(p) => {
                    p.get_connection_async().await.map(UnifiedStream::Virtual)
                }
            }
        }
    }

    fn close(&self) {
        match self {
            UnifiedProvider::Tcp(p) => p.close(),
            UnifiedProvider::Virtual(p) => p.close(),
        }
    }
}

impl UnifiedConnection {
    /// Close the connection: a full shutdown for TCP, a half-close for virtual
    /// sockets.
    pub fn close(&self) -> io::Result<()> {
        match self {
            UnifiedConnection::Tcp(c) => c.close(),
            UnifiedConnection::Virtual(s) => {
                s.close();
                Ok(())
            }
        }
    }
}

impl Read for UnifiedConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            UnifiedConnection::Tcp(c) => c.read(buf),
            UnifiedConnection::Virtual(s) => Read::read(s, buf),
        }
    }
}

impl Write for UnifiedConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            UnifiedConnection::Tcp(c) => c.write(buf),
            UnifiedConnection::Virtual(s) => Write::write(s, buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            UnifiedConnection::Tcp(c) => c.flush(),
            UnifiedConnection::Virtual(s) => Write::flush(s),
        }
    }
}

impl AsyncReadRent for UnifiedStream {
    async fn read<T: IoBufMut>(&mut self, buf: T) -> BufResult<usize, T> {
        match self {
            UnifiedStream::Tcp(s) => s.read(buf).await,
            UnifiedStream::Virtual(s) => AsyncReadRent::read(s, buf).await,
        }
    }

    async fn readv<T: IoVecBufMut>(&mut self, buf: T) -> BufResult<usize, T> {
        match self {
            UnifiedStream::Tcp(s) => s.readv(buf).await,
            UnifiedStream::Virtual(s) => s.readv(buf).await,
        }
    }
}

impl AsyncWriteRent for UnifiedStream {
    async fn write<T: IoBuf>(&mut self, buf: T) -> BufResult<usize, T> {
        match self {
            UnifiedStream::Tcp(s) => s.write(buf).await,
            UnifiedStream::Virtual(s) => AsyncWriteRent::write(s, buf).await,
        }
    }

    async fn writev<T: IoVecBuf>(&mut self, buf: T) -> BufResult<usize, T> {
        match self {
            UnifiedStream::Tcp(s) => s.writev(buf).await,
            UnifiedStream::Virtual(s) => s.writev(buf).await,
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        match self {
            UnifiedStream::Tcp(s) => s.flush().await,
            UnifiedStream::Virtual(s) => AsyncWriteRent::flush(s).await,
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            UnifiedStream::Tcp(s) => s.shutdown().await,
            UnifiedStream::Virtual(s) => s.shutdown().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use monoio::io::{AsyncReadRentExt, AsyncWriteRentExt};

    use super::*;
    use crate::vnet::Interface;

    #[test]
    fn display_names_the_endpoint() {
        let tcp = UnifiedProvider::from(TcpConnectionProvider::new("example.com", 80));
        assert_eq!(tcp.to_string(), "tcp://example.com:80");
        let virt =
            UnifiedProvider::from(VirtualConnectionProvider::new(Interface::new("display")));
        assert_eq!(virt.to_string(), "virtual://display");
    }

    #[monoio::test]
    async fn virtual_stream_delegates() {
        let interface = Interface::new("unified");
        let listener = interface.bind().unwrap();
        let provider = UnifiedProvider::from(VirtualConnectionProvider::new(interface));

        let echo = monoio::spawn(async move {
            let mut server = listener.accept_async().await.unwrap();
            let (res, buf) = AsyncReadRentExt::read_exact(&mut server, vec![0u8; 4]).await;
            res.unwrap();
            let (res, _) = AsyncWriteRentExt::write_all(&mut server, buf).await;
            res.unwrap();
        });

        let mut stream = provider.get_connection_async().await.unwrap();
        assert!(matches!(stream, UnifiedStream::Virtual(_)));
        let (res, _) = stream.write_all(b"ping").await;
        res.unwrap();
        let (res, buf) = stream.read_exact(vec![0u8; 4]).await;
        res.unwrap();
        assert_eq!(&buf, b"ping");
        stream.shutdown().await.unwrap();
        echo.await;
    }
}
