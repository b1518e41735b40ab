use std::{
    future::poll_fn,
    io::{self, Read, Write},
    mem::MaybeUninit,
    sync::Arc,
    task::{Context, Poll},
};

use monoio::{
    buf::{IoBuf, IoBufMut, IoVecBuf, IoVecBufMut, IoVecWrapper, IoVecWrapperMut},
    io::{AsyncReadRent, AsyncWriteRent},
    BufResult,
};

use super::pipe::Pipe;

/// One end of a virtual connection.
///
/// Reads return at most `min(requested, queued, max_available_to_read)` bytes and
/// writes accept at most `min(requested, free capacity, max_available_to_write)`
/// bytes, so callers must loop exactly as they would on a real socket. Both the
/// blocking (`std::io`) and the suspendable (monoio) forms are available.
///
/// Dropping the socket closes it.
#[derive(Debug)]
pub struct Socket {
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
    max_read: usize,
    max_write: usize,
}

impl Socket {
    /// Two connected sockets, each direction buffering up to `capacity` bytes.
    pub fn pair(capacity: usize) -> (Socket, Socket) {
        let a_to_b = Arc::new(Pipe::new(capacity));
        let b_to_a = Arc::new(Pipe::new(capacity));
        (
            Socket::new(b_to_a.clone(), a_to_b.clone()),
            Socket::new(a_to_b, b_to_a),
        )
    }

    fn new(inbound: Arc<Pipe>, outbound: Arc<Pipe>) -> Self {
        Self {
            inbound,
            outbound,
            max_read: usize::MAX,
            max_write: usize::MAX,
        }
    }

    /// Cap the bytes a single read or write moves. `usize::MAX` lifts the cap; zero
    /// is raised to one.
    pub(crate) fn set_max_available_to_read_write(&mut self, max_read: usize, max_write: usize) {
        self.max_read = max_read.max(1);
        self.max_write = max_write.max(1);
    }

    #[inline]
    pub fn max_available_to_read(&self) -> usize {
        self.max_read
    }

    #[inline]
    pub fn max_available_to_write(&self) -> usize {
        self.max_write
    }

    /// Bytes queued for this end to read.
    #[inline]
    pub fn available_to_read(&self) -> usize {
        self.inbound.available()
    }

    /// Half-close: the peer drains what was written and then sees EOF, our own
    /// writes fail, our reads drain what is queued and then see EOF.
    pub fn close(&self) {
        self.outbound.close_write();
        self.inbound.close_read();
    }

    pub fn poll_read(&self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        self.poll_read_uninit(cx, as_uninit(buf))
    }

    pub fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.outbound.poll_write(cx, buf, self.max_write)
    }

    fn poll_read_uninit(
        &self,
        cx: &mut Context<'_>,
        buf: &mut [MaybeUninit<u8>],
    ) -> Poll<io::Result<usize>> {
        self.inbound.poll_read(cx, buf, self.max_read).map(Ok)
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
    }
}

#[inline]
fn as_uninit(buf: &mut [u8]) -> &mut [MaybeUninit<u8>] {
    // SAFETY: same layout, and only initialized bytes are ever written through it.
    unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.inbound.read_blocking(as_uninit(buf), self.max_read))
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.write_blocking(buf, self.max_write)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsyncReadRent for Socket {
    async fn read<T: IoBufMut>(&mut self, mut buf: T) -> BufResult<usize, T> {
        // SAFETY: the slice covers the buffer's writable region and `buf` is not
        // touched until the read completes.
        let dst = unsafe {
            std::slice::from_raw_parts_mut(
                buf.write_ptr() as *mut MaybeUninit<u8>,
                buf.bytes_total(),
            )
        };
        let res = poll_fn(|cx| self.poll_read_uninit(cx, dst)).await;
        if let Ok(n) = res {
            unsafe { buf.set_init(n) };
        }
        (res, buf)
    }

    async fn readv<T: IoVecBufMut>(&mut self, mut buf: T) -> BufResult<usize, T> {
        let slice = match IoVecWrapperMut::new(buf) {
            Ok(slice) => slice,
            Err(buf) => return (Ok(0), buf),
        };
        let (res, slice) = AsyncReadRent::read(self, slice).await;
        buf = slice.into_inner();
        if let Ok(n) = res {
            unsafe { buf.set_init(n) };
        }
        (res, buf)
    }
}

impl AsyncWriteRent for Socket {
    async fn write<T: IoBuf>(&mut self, buf: T) -> BufResult<usize, T> {
        // SAFETY: `buf` owns the bytes and outlives the write.
        let src = unsafe { std::slice::from_raw_parts(buf.read_ptr(), buf.bytes_init()) };
        let res = poll_fn(|cx| self.poll_write(cx, src)).await;
        (res, buf)
    }

    async fn writev<T: IoVecBuf>(&mut self, buf_vec: T) -> BufResult<usize, T> {
        let slice = match IoVecWrapper::new(buf_vec) {
            Ok(slice) => slice,
            Err(buf_vec) => return (Ok(0), buf_vec),
        };
        let (res, slice) = AsyncWriteRent::write(self, slice).await;
        (res, slice.into_inner())
    }

    #[inline]
    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.outbound.close_write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    mod blocking {
        use std::{
            io::{self, Read, Write},
            thread,
        };

        use crate::vnet::Socket;

        #[test]
        fn capped_reads_split_and_preserve_order() {
            let (mut client, mut server) = Socket::pair(1024);
            server.set_max_available_to_read_write(3, usize::MAX);
            let payload: Vec<u8> = (0..10u8).collect();
            client.write_all(&payload).unwrap();

            let mut received = Vec::new();
            let mut calls = 0;
            let mut buf = [0u8; 64];
            while received.len() < payload.len() {
                let n = server.read(&mut buf).unwrap();
                assert!(n <= 3);
                received.extend_from_slice(&buf[..n]);
                calls += 1;
            }
            assert_eq!(calls, 4, "ceil(10 / 3) reads");
            assert_eq!(received, payload);
        }

        #[test]
        fn capped_writes_are_partial() {
            let (mut client, server) = Socket::pair(1024);
            client.set_max_available_to_read_write(usize::MAX, 4);
            assert_eq!(client.write(b"0123456789").unwrap(), 4);
            assert_eq!(server.available_to_read(), 4);
        }

        #[test]
        fn close_is_half_close() {
            let (mut client, mut server) = Socket::pair(64);
            client.write_all(b"bye").unwrap();
            client.close();
            assert_eq!(
                client.write(b"more").unwrap_err().kind(),
                io::ErrorKind::BrokenPipe
            );

            let mut buf = Vec::new();
            server.read_to_end(&mut buf).unwrap();
            assert_eq!(buf, b"bye");
            // the closed end no longer accepts bytes
            assert!(server.write(b"late").is_err());
        }

        #[test]
        fn blocking_ends_on_two_threads() {
            let (mut client, mut server) = Socket::pair(16);
            let echo = thread::spawn(move || {
                let mut buf = [0u8; 8];
                loop {
                    let n = server.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    server.write_all(&buf[..n]).unwrap();
                }
            });

            let payload = vec![7u8; 100];
            let mut echoed = vec![0u8; payload.len()];
            let mut written = 0;
            let mut read = 0;
            while read < payload.len() {
                if written < payload.len() {
                    let end = (written + 8).min(payload.len());
                    written += client.write(&payload[written..end]).unwrap();
                }
                read += client.read(&mut echoed[read..]).unwrap();
            }
            client.close();
            echo.join().unwrap();
            assert_eq!(echoed, payload);
        }
    }

    mod suspendable {
        use monoio::io::{AsyncReadRent, AsyncReadRentExt, AsyncWriteRent, AsyncWriteRentExt};

        use crate::vnet::Socket;

        #[monoio::test]
        async fn round_trip_with_backpressure() {
            let (mut client, mut server) = Socket::pair(4);
            server.set_max_available_to_read_write(2, 2);

            let writer = monoio::spawn(async move {
                let (res, _) = client.write_all(b"hello world").await;
                res.unwrap();
                client
            });

            let (res, buf) = server.read_exact(vec![0u8; 11]).await;
            assert_eq!(res.unwrap(), 11);
            assert_eq!(&buf, b"hello world");

            let mut client = writer.await;
            let (res, _) = server.write_all(b"ok").await;
            res.unwrap();
            let (res, buf) = client.read(Vec::with_capacity(8)).await;
            assert_eq!(res.unwrap(), 2);
            assert_eq!(&buf, b"ok");
        }

        #[monoio::test]
        async fn read_sees_eof_after_shutdown() {
            let (mut client, mut server) = Socket::pair(16);
            let (res, _) = client.write_all(b"x").await;
            res.unwrap();
            client.shutdown().await.unwrap();

            let (res, buf) = server.read(Vec::with_capacity(4)).await;
            assert_eq!(res.unwrap(), 1);
            assert_eq!(&buf, b"x");
            let (res, _) = server.read(Vec::with_capacity(4)).await;
            assert_eq!(res.unwrap(), 0);
        }
    }
}
