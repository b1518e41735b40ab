mod error;
pub use error::{Error, Result, TransportError};

pub mod config;
pub mod connectors;
pub mod http;
pub mod label;
pub mod vnet;
