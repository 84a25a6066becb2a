use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::SinkExt;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::{Error, ErrorKind, Result};
use crate::transport::TransportDescriptor;
use crate::websocket::{self, WsStream};

/// Request to start streaming, sent once the connection is established.
pub const EVENT_PLAY: &str = "PLAY";
/// Keepalive event.
pub const EVENT_PING: &str = "PING";

/// One JSON control event exchanged with a reactive streaming server.
///
/// On the wire: `{"eventType":"PLAY","requestId":1,"timeStamp":1718000000000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlEvent {
    pub event_type: String,
    pub request_id: u32,
    /// Wall-clock milliseconds since the Unix epoch.
    pub time_stamp: i64,
}

impl ControlEvent {
    /// Builds an event stamped with the current wall clock.
    pub fn new(event_type: &str, request_id: u32) -> Self {
        Self {
            event_type: event_type.to_string(),
            request_id,
            time_stamp: current_time_milliseconds(),
        }
    }
}

/// Current system timestamp in milliseconds.
pub(crate) fn current_time_milliseconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Serializes and sends one control event as a text frame.
pub(crate) async fn send_event(socket: &mut WsStream, event: &ControlEvent) -> Result<()> {
    let json = serde_json::to_string(event).map_err(|err| {
        error!("control event serialization failed: {err}");
        Error::new(ErrorKind::OutOfMemory)
    })?;
    debug!("sending control event: {json}");
    socket.send(Message::Text(json)).await.map_err(|err| {
        error!("control event send failed: {err}");
        Error::new(ErrorKind::NotConnected)
    })
}

pub(crate) static REACTIVE_WEBSOCKET: TransportDescriptor = TransportDescriptor {
    name: "reactive-websocket",
    desc: "Reactive fMP4 over WebSocket",
    probe: probe_reactive,
    create: websocket::create_reactive_fmp4,
};

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Secure scheme and a last path segment beginning with `websocketstream`.
fn probe_reactive(url: &str) -> bool {
    url.starts_with("wss://") && starts_with_ignore_case(websocket::last_segment(url), "websocketstream")
}
