//! Client library for live FLV and fragmented-MP4 streams over WebSocket.
//!
//! A stream URL selects a transport from a small registry, the transport
//! opens a (TLS-optional) WebSocket to the server, and each `recv` call
//! pumps one event-loop tick, splitting arriving payloads into container
//! records and handing them to the caller's handler. WebSocket message
//! boundaries are treated as incidental framing: a payload may carry many
//! records, and in-band JSON control frames are filtered out. The reactive
//! transport variant additionally sends PLAY/PING control events.
//!
//! ```no_run
//! use wsmedia::{FlvStream, Result};
//!
//! fn main() -> Result<()> {
//!     wsmedia::init();
//!     let mut stream = FlvStream::create("ws://media.example.com/live/cam1.flv")?;
//!     stream.connect()?;
//!     loop {
//!         stream.recv(|tag| {
//!             println!("tag type {} ts {} ({} bytes)", tag.tag_type(), tag.timestamp(), tag.data_size());
//!             Ok(())
//!         })?;
//!     }
//! }
//! ```
//!
//! Codec payloads are passed through untouched; decoding them is the
//! caller's business, as are reconnect and buffering policies.

pub mod error;
pub mod flv;
pub mod fmp4;
mod reactive;
pub mod record;
mod session;
pub mod transport;
pub mod url;
mod websocket;

pub use error::{Error, ErrorKind, Result};
pub use flv::{parse_wallclock, FlvTag};
pub use fmp4::Mp4Box;
pub use reactive::{ControlEvent, EVENT_PING, EVENT_PLAY};
pub use session::{FlvStream, Fmp4Stream};
pub use url::StreamUrl;
pub use websocket::TlsOptions;

/// Registers the built-in transports.
///
/// Idempotent. The session facades also register lazily on first use, so
/// calling this at startup is optional; doing so makes initialization order
/// explicit and keeps the registries out of the first session's latency.
pub fn init() {
    transport::flv_registry();
    transport::fmp4_registry();
}
