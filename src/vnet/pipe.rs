use std::{
    collections::VecDeque,
    io,
    mem::MaybeUninit,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll, Waker},
};

/// One direction of a virtual socket: a bounded byte queue with one writer and one
/// reader.
///
/// Blocking callers park on the condvar, suspended tasks leave a waker. Every state
/// change notifies both.
#[derive(Debug)]
pub(crate) struct Pipe {
    state: Mutex<PipeState>,
    cond: Condvar,
}

#[derive(Debug)]
struct PipeState {
    buf: VecDeque<u8>,
    capacity: usize,
    writer_closed: bool,
    reader_closed: bool,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl PipeState {
    /// `None` when the reader has to wait.
    fn take(&mut self, dst: &mut [MaybeUninit<u8>], max: usize) -> Option<usize> {
        if dst.is_empty() {
            return Some(0);
        }
        if !self.buf.is_empty() {
            let n = dst.len().min(self.buf.len()).min(max);
            for (slot, byte) in dst.iter_mut().zip(self.buf.drain(..n)) {
                slot.write(byte);
            }
            if let Some(waker) = self.write_waker.take() {
                waker.wake();
            }
            return Some(n);
        }
        if self.writer_closed || self.reader_closed {
            return Some(0);
        }
        None
    }

    /// `Ok(None)` when the writer has to wait.
    fn put(&mut self, src: &[u8], max: usize) -> io::Result<Option<usize>> {
        if self.writer_closed || self.reader_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if src.is_empty() {
            return Ok(Some(0));
        }
        let free = self.capacity - self.buf.len();
        if free == 0 {
            return Ok(None);
        }
        let n = src.len().min(free).min(max);
        self.buf.extend(&src[..n]);
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
        Ok(Some(n))
    }

    fn wake_all(&mut self) {
        if let Some(waker) = self.read_waker.take() {
            waker.wake();
        }
        if let Some(waker) = self.write_waker.take() {
            waker.wake();
        }
    }
}

impl Pipe {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(PipeState {
                buf: VecDeque::with_capacity(capacity.min(DEFAULT_PREALLOC)),
                capacity: capacity.max(1),
                writer_closed: false,
                reader_closed: false,
                read_waker: None,
                write_waker: None,
            }),
            cond: Condvar::new(),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read_blocking(&self, dst: &mut [MaybeUninit<u8>], max: usize) -> usize {
        let mut state = self.lock();
        loop {
            if let Some(n) = state.take(dst, max) {
                self.cond.notify_all();
                return n;
            }
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn poll_read(
        &self,
        cx: &mut Context<'_>,
        dst: &mut [MaybeUninit<u8>],
        max: usize,
    ) -> Poll<usize> {
        let mut state = self.lock();
        match state.take(dst, max) {
            Some(n) => {
                self.cond.notify_all();
                Poll::Ready(n)
            }
            None => {
                state.read_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    pub(crate) fn write_blocking(&self, src: &[u8], max: usize) -> io::Result<usize> {
        let mut state = self.lock();
        loop {
            if let Some(n) = state.put(src, max)? {
                self.cond.notify_all();
                return Ok(n);
            }
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn poll_write(
        &self,
        cx: &mut Context<'_>,
        src: &[u8],
        max: usize,
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();
        match state.put(src, max) {
            Ok(Some(n)) => {
                self.cond.notify_all();
                Poll::Ready(Ok(n))
            }
            Ok(None) => {
                state.write_waker = Some(cx.waker().clone());
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    /// No more bytes will be written. The reader drains what is queued, then sees EOF.
    pub(crate) fn close_write(&self) {
        let mut state = self.lock();
        state.writer_closed = true;
        state.wake_all();
        self.cond.notify_all();
    }

    /// The reader is gone. Queued bytes can still be drained, writes fail.
    pub(crate) fn close_read(&self) {
        let mut state = self.lock();
        state.reader_closed = true;
        state.wake_all();
        self.cond.notify_all();
    }

    pub(crate) fn available(&self) -> usize {
        self.lock().buf.len()
    }
}

const DEFAULT_PREALLOC: usize = 4096;
