use std::{
    future::Future,
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
};

/// Turns a host and port into an ordered list of candidate addresses.
pub trait Resolve {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;

    /// Resolve without blocking the calling monoio worker.
    fn resolve_async(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = io::Result<Vec<SocketAddr>>>;
}

/// The system resolver (`getaddrinfo`).
///
/// The suspendable path runs the lookup on a helper thread and resumes the caller
/// when it finishes. IP literals are answered inline.
#[derive(Default, Clone, Copy, Debug)]
pub struct GaiResolver;

impl Resolve for GaiResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }

    async fn resolve_async(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let host = host.to_owned();
        std::thread::Builder::new()
            .name("monoio-connect-resolve".to_owned())
            .spawn(move || {
                let _ = tx.send(GaiResolver.resolve(&host, port));
            })?;
        rx.await
            .map_err(|_| io::Error::other("resolver thread exited without a result"))?
    }
}

/// A fixed candidate list, returned in order for any host.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct StaticResolver {
    addrs: Vec<SocketAddr>,
}

impl StaticResolver {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self { addrs }
    }
}

impl Resolve for StaticResolver {
    #[inline]
    fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok(self.addrs.clone())
    }

    #[inline]
    async fn resolve_async(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        self.resolve(host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gai_resolves_literal() {
        let addrs = GaiResolver.resolve("127.0.0.1", 8080).unwrap();
        assert_eq!(addrs, vec![SocketAddr::from(([127, 0, 0, 1], 8080))]);
    }

    #[monoio::test]
    async fn gai_async_literal_and_name() {
        let addrs = GaiResolver.resolve_async("::1", 80).await.unwrap();
        assert_eq!(addrs, vec!["[::1]:80".parse::<SocketAddr>().unwrap()]);

        let addrs = GaiResolver.resolve_async("localhost", 80).await.unwrap();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|addr| addr.port() == 80));
    }

    #[monoio::test]
    async fn static_resolver_keeps_order() {
        let list: Vec<SocketAddr> = vec![
            "10.0.0.2:1".parse().unwrap(),
            "10.0.0.1:2".parse().unwrap(),
        ];
        let resolver = StaticResolver::new(list.clone());
        assert_eq!(resolver.resolve_async("ignored", 0).await.unwrap(), list);
    }
}
