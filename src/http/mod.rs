//! HTTP message heads over zero-copy labels, and the keep-alive decision.
mod connection_state;
mod head;

pub use connection_state::{consider_connection_state, ConnectionState};
pub use head::{Headers, RequestHead, ResponseHead};

/// Header names and values the connection-state decision works with.
pub mod header {
    use crate::label::StringKeyLabelCiFast;

    pub const CONNECTION: StringKeyLabelCiFast = StringKeyLabelCiFast::from_static("Connection");

    pub mod value {
        use crate::label::StringKeyLabel;

        pub const CONNECTION_KEEP_ALIVE: StringKeyLabel = StringKeyLabel::from_static("keep-alive");
        pub const CONNECTION_CLOSE: StringKeyLabel = StringKeyLabel::from_static("close");
        pub const CONNECTION_UPGRADE: StringKeyLabel = StringKeyLabel::from_static("Upgrade");
    }
}

/// Protocol token of HTTP/1.1 requests.
pub const PROTOCOL_HTTP_1_1: &str = "HTTP/1.1";
