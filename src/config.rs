//! Serde description of a connection provider.
//!
//! ```json
//! { "type": "tcp", "host": "example.com", "port": 80, "no_delay": true }
//! { "type": "virtual", "interface": "backend", "max_available_to_read": 16 }
//! ```
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::{
    connectors::{TcpConnectionProvider, UnifiedProvider, VirtualConnectionProvider},
    vnet::Interface,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    Tcp {
        host: SmolStr,
        port: u16,
        #[serde(default)]
        no_delay: bool,
    },
    Virtual {
        /// Name of a process-wide interface, see [`Interface::obtain_shared`].
        interface: SmolStr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_available_to_read: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_available_to_write: Option<usize>,
    },
}

impl ProviderConfig {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn build(&self) -> UnifiedProvider {
        match self {
            ProviderConfig::Tcp {
                host,
                port,
                no_delay,
            } => TcpConnectionProvider::new(host.clone(), *port)
                .with_no_delay(*no_delay)
                .into(),
            ProviderConfig::Virtual {
                interface,
                max_available_to_read,
                max_available_to_write,
            } => VirtualConnectionProvider::new(Interface::obtain_shared(interface))
                .with_max_available_to_read_write(
                    max_available_to_read.unwrap_or(usize::MAX),
                    max_available_to_write.unwrap_or(usize::MAX),
                )
                .into(),
        }
    }
}
