pub mod tcp;
mod unified_connector;
mod virtual_connector;

use std::{future::Future, time::Duration};

pub use tcp::{GaiResolver, Resolve, StaticResolver, TcpConnection, TcpConnectionProvider};
pub use unified_connector::*;
pub use virtual_connector::*;

/// A source of connections to one configured endpoint.
///
/// `get_connection` blocks the calling thread. `get_connection_async` never does: it
/// parks on the monoio scheduler whenever the underlying transport is not ready.
pub trait ConnectionProvider {
    /// Connection returned by the blocking path.
    type Connection;
    /// Connection returned by the suspendable path.
    type AsyncConnection;
    type Error;

    fn get_connection(&self) -> Result<Self::Connection, Self::Error>;

    fn get_connection_async(
        &self,
    ) -> impl Future<Output = Result<Self::AsyncConnection, Self::Error>>;

    /// Release resources owned by the provider. Connections already handed out are
    /// not affected.
    fn close(&self);
}

pub trait ConnectionProviderExt: ConnectionProvider {
    fn get_connection_with_timeout(
        &self,
        timeout: Duration,
    ) -> impl Future<
        Output = Result<
            Result<Self::AsyncConnection, Self::Error>,
            monoio::time::error::Elapsed,
        >,
    >;
}

impl<T: ConnectionProvider> ConnectionProviderExt for T {
    #[inline]
    fn get_connection_with_timeout(
        &self,
        timeout: Duration,
    ) -> impl Future<
        Output = Result<
            Result<Self::AsyncConnection, Self::Error>,
            monoio::time::error::Elapsed,
        >,
    > {
        monoio::time::timeout(timeout, self.get_connection_async())
    }
}
