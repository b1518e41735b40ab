//! The connect state machine shared by the blocking and suspendable paths.
//!
//! [`ConnectMachine`] never touches sockets itself. A driver feeds it [`Event`]s and
//! performs whatever the returned [`Transition`] asks for: resolve, open a socket,
//! call `connect`, or wait for write readiness. The machine owns the socket of the
//! candidate in flight and the remaining candidate list, so dropping it (or feeding
//! [`Event::Cancel`]) closes the socket.
use std::{collections::VecDeque, io, mem, net::SocketAddr};

use super::classify::ConnectOutcome;
use crate::TransportError;

#[derive(Debug)]
pub enum ConnectState<H> {
    ResolveAddresses,
    IterateCandidate { addr: SocketAddr },
    AttemptConnect { handle: H, addr: SocketAddr },
    AwaitWritable { handle: H, addr: SocketAddr },
    Terminal,
}

#[derive(Debug)]
pub enum Event<H> {
    Start,
    Resolved(io::Result<Vec<SocketAddr>>),
    Opened(io::Result<H>),
    Connect(ConnectOutcome),
    /// The handle became writable; carries the pending socket error, if any.
    Writable(Option<io::Error>),
    Cancel,
}

#[derive(Debug)]
pub enum Transition<'a, H> {
    Resolve,
    Open(SocketAddr),
    Connect(&'a H, SocketAddr),
    WaitWritable(&'a H),
    Complete(Result<(H, SocketAddr), TransportError>),
}

#[derive(Debug)]
pub struct ConnectMachine<H> {
    state: ConnectState<H>,
    candidates: VecDeque<SocketAddr>,
}

impl<H> Default for ConnectMachine<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ConnectMachine<H> {
    pub fn new() -> Self {
        Self {
            state: ConnectState::ResolveAddresses,
            candidates: VecDeque::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> &ConnectState<H> {
        &self.state
    }

    #[inline]
    pub fn remaining_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn on_event(&mut self, event: Event<H>) -> Transition<'_, H> {
        let state = mem::replace(&mut self.state, ConnectState::Terminal);
        match (state, event) {
            (_, Event::Cancel) => {
                self.candidates.clear();
                Transition::Complete(Err(TransportError::Cancelled))
            }
            (ConnectState::ResolveAddresses, Event::Start) => {
                self.state = ConnectState::ResolveAddresses;
                Transition::Resolve
            }
            (ConnectState::ResolveAddresses, Event::Resolved(Err(e))) => {
                #[cfg(feature = "logging")]
                tracing::debug!("resolve failed: {}", e);
                Transition::Complete(Err(TransportError::Resolve(e)))
            }
            (ConnectState::ResolveAddresses, Event::Resolved(Ok(addrs))) => {
                if addrs.is_empty() {
                    return Transition::Complete(Err(TransportError::NoResolve));
                }
                #[cfg(feature = "logging")]
                tracing::debug!("resolved {} candidates", addrs.len());
                self.candidates = addrs.into();
                self.next_candidate()
            }
            (ConnectState::IterateCandidate { addr }, Event::Opened(Ok(handle))) => {
                self.state = ConnectState::AttemptConnect { handle, addr };
                self.connect_current()
            }
            (ConnectState::IterateCandidate { addr: _addr }, Event::Opened(Err(_e))) => {
                #[cfg(feature = "logging")]
                tracing::debug!("open socket for {} failed: {}", _addr, _e);
                self.next_candidate()
            }
            (ConnectState::AttemptConnect { handle, addr }, Event::Connect(outcome)) => {
                match outcome {
                    ConnectOutcome::Success => {
                        self.candidates.clear();
                        Transition::Complete(Ok((handle, addr)))
                    }
                    ConnectOutcome::Interrupted => {
                        self.state = ConnectState::AttemptConnect { handle, addr };
                        self.connect_current()
                    }
                    ConnectOutcome::WouldBlock => {
                        self.state = ConnectState::AwaitWritable { handle, addr };
                        match &self.state {
                            ConnectState::AwaitWritable { handle, .. } => {
                                Transition::WaitWritable(handle)
                            }
                            _ => unreachable!(),
                        }
                    }
                    ConnectOutcome::Failed(_e) => {
                        #[cfg(feature = "logging")]
                        tracing::debug!("connect to {} failed: {}", addr, _e);
                        drop(handle);
                        self.next_candidate()
                    }
                }
            }
            (ConnectState::AwaitWritable { handle, addr }, Event::Writable(None)) => {
                self.state = ConnectState::AttemptConnect { handle, addr };
                self.connect_current()
            }
            (ConnectState::AwaitWritable { handle, addr: _addr }, Event::Writable(Some(_e))) => {
                #[cfg(feature = "logging")]
                tracing::debug!("connect to {} failed: {}", _addr, _e);
                drop(handle);
                self.next_candidate()
            }
            (state, _event) => {
                let misuse = io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unexpected connect event in state {}", state_name(&state)),
                );
                self.candidates.clear();
                Transition::Complete(Err(misuse.into()))
            }
        }
    }

    fn next_candidate(&mut self) -> Transition<'_, H> {
        match self.candidates.pop_front() {
            Some(addr) => {
                self.state = ConnectState::IterateCandidate { addr };
                Transition::Open(addr)
            }
            None => Transition::Complete(Err(TransportError::NoReachableCandidate)),
        }
    }

    fn connect_current(&self) -> Transition<'_, H> {
        match &self.state {
            ConnectState::AttemptConnect { handle, addr } => Transition::Connect(handle, *addr),
            _ => unreachable!("connect_current outside AttemptConnect"),
        }
    }
}

fn state_name<H>(state: &ConnectState<H>) -> &'static str {
    match state {
        ConnectState::ResolveAddresses => "ResolveAddresses",
        ConnectState::IterateCandidate { .. } => "IterateCandidate",
        ConnectState::AttemptConnect { .. } => "AttemptConnect",
        ConnectState::AwaitWritable { .. } => "AwaitWritable",
        ConnectState::Terminal => "Terminal",
    }
}
