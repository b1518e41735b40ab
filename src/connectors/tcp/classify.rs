use std::io;

/// What a `connect` call on a (possibly non-blocking) socket amounted to.
#[derive(Debug)]
pub enum ConnectOutcome {
    /// Connected, or the socket reports it already is.
    Success,
    /// The connection is in progress; wait for write readiness.
    WouldBlock,
    /// The call was interrupted; issue it again on the same socket.
    Interrupted,
    /// This candidate failed.
    Failed(io::Error),
}

/// Map the result of `connect` onto a [`ConnectOutcome`] using the platform's error
/// codes.
pub fn classify(result: io::Result<()>) -> ConnectOutcome {
    let err = match result {
        Ok(()) => return ConnectOutcome::Success,
        Err(err) => err,
    };
    // OS errors wait only on the in-progress codes; EAGAIN from connect means no
    // local port is free and fails the candidate.
    if let Some(code) = err.raw_os_error() {
        if sys::is_connected(code) {
            return ConnectOutcome::Success;
        }
        if sys::is_in_progress(code) {
            return ConnectOutcome::WouldBlock;
        }
        if err.kind() == io::ErrorKind::Interrupted {
            return ConnectOutcome::Interrupted;
        }
        return ConnectOutcome::Failed(err);
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ConnectOutcome::WouldBlock,
        io::ErrorKind::Interrupted => ConnectOutcome::Interrupted,
        _ => ConnectOutcome::Failed(err),
    }
}

#[cfg(unix)]
mod sys {
    use nix::errno::Errno;

    #[inline]
    pub(super) fn is_connected(code: i32) -> bool {
        Errno::from_raw(code) == Errno::EISCONN
    }

    #[inline]
    pub(super) fn is_in_progress(code: i32) -> bool {
        matches!(Errno::from_raw(code), Errno::EINPROGRESS | Errno::EALREADY)
    }
}

#[cfg(windows)]
mod sys {
    const WSAEWOULDBLOCK: i32 = 10035;
    const WSAEINPROGRESS: i32 = 10036;
    const WSAEALREADY: i32 = 10037;
    const WSAEISCONN: i32 = 10056;

    #[inline]
    pub(super) fn is_connected(code: i32) -> bool {
        code == WSAEISCONN
    }

    #[inline]
    pub(super) fn is_in_progress(code: i32) -> bool {
        matches!(code, WSAEWOULDBLOCK | WSAEINPROGRESS | WSAEALREADY)
    }
}
