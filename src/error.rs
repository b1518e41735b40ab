use smol_str::SmolStr;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum TransportError {
    #[error("resolve error {0}")]
    Resolve(std::io::Error),
    #[error("no resolve result")]
    NoResolve,
    #[error("no reachable candidate")]
    NoReachableCandidate,
    #[error("connect attempt cancelled")]
    Cancelled,
    #[error("io error {0}")]
    Io(#[from] std::io::Error),
    #[error("virtual interface {0} has no listener")]
    InterfaceUnbound(SmolStr),
    #[error("virtual interface {0} closed")]
    InterfaceClosed(SmolStr),
    #[error("connection provider closed")]
    ProviderClosed,
    #[error("memory label out of bounds")]
    InvalidLabel,
    #[error("serde_json error {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid header value {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),
    #[error("invalid header name {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),
}

impl TransportError {
    /// Returns true for the errors a connect attempt terminates with.
    #[inline]
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::Resolve(_) | Self::NoResolve | Self::NoReachableCandidate
        )
    }
}

pub type Error = TransportError;

pub type Result<T> = std::result::Result<T, TransportError>;
