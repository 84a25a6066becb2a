use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, error, info};
use native_tls::TlsConnector;
use tokio::net::TcpStream;
use tokio::runtime::{Builder, Runtime};
use tokio::time::timeout;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};
use tokio_tungstenite::{client_async_with_config, MaybeTlsStream, WebSocketStream};

use crate::error::{Error, ErrorKind, Result};
use crate::flv::FlvLayout;
use crate::fmp4::Mp4Layout;
use crate::reactive::{self, ControlEvent};
use crate::record::{self, RecordLayout};
use crate::transport::{StreamTransport, TransportDescriptor};
use crate::url::StreamUrl;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Budget for a single WebSocket message.
const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
/// Event-loop budget for one recv tick.
const TICK_BUDGET: Duration = Duration::from_millis(10);
/// How often the reactive dialect emits a PING control event.
const PING_INTERVAL: Duration = Duration::from_secs(20);

/// TLS verification options for `wss` URLs.
///
/// The default is strict verification. [`TlsOptions::permissive`] restores
/// the historical deployment profile (expired and self-signed certificates
/// accepted, hostname check off) and must be opted into explicitly.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    pub require_valid_cert: bool,
    pub allow_self_signed: bool,
    pub allow_expired: bool,
    pub check_hostname: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            require_valid_cert: true,
            allow_self_signed: false,
            allow_expired: false,
            check_hostname: true,
        }
    }
}

impl TlsOptions {
    /// Accept expired and self-signed certificates and skip the hostname
    /// check. Only suitable for closed deployments that pin the endpoint
    /// some other way.
    pub fn permissive() -> Self {
        Self {
            require_valid_cert: false,
            allow_self_signed: true,
            allow_expired: true,
            check_hostname: false,
        }
    }

    // native-tls folds the expiry and chain checks into one knob.
    fn accept_invalid_certs(&self) -> bool {
        !self.require_valid_cert || self.allow_self_signed || self.allow_expired
    }
}

/// Which control dialect the session speaks on top of the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    /// Container payloads only.
    Passive,
    /// JSON control events: PLAY on establish, periodic PING.
    Reactive,
}

/// WebSocket stream transport.
///
/// Owns a current-thread runtime and pumps it in 10 ms ticks from `recv`;
/// the caller's repeated `recv` calls are the event loop. One session
/// belongs to one caller thread.
pub(crate) struct WsTransport {
    layout: &'static dyn RecordLayout,
    dialect: Dialect,
    tls: TlsOptions,
    url: Option<StreamUrl>,
    runtime: Option<Runtime>,
    socket: Option<WsStream>,
    request_count: u32,
    response_count: u32,
    ping_count: u32,
    connected: bool,
    error: bool,
    saw_media: bool,
    last_control: Instant,
}

impl WsTransport {
    pub(crate) fn new(layout: &'static dyn RecordLayout, dialect: Dialect) -> Self {
        Self {
            layout,
            dialect,
            tls: TlsOptions::default(),
            url: None,
            runtime: None,
            socket: None,
            request_count: 0,
            response_count: 0,
            ping_count: 0,
            connected: false,
            error: false,
            saw_media: false,
            last_control: Instant::now(),
        }
    }

    fn dispatch(&mut self, message: Message, handler: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<()> {
        match message {
            Message::Binary(payload) => self.handle_payload(&payload, handler),
            // Control frames may arrive as text; the splitter's heuristic
            // sorts them out either way.
            Message::Text(text) => self.handle_payload(text.as_bytes(), handler),
            Message::Close(frame) => {
                info!("server closed the stream: {frame:?}");
                self.error = true;
                Err(Error::new(ErrorKind::NotConnected))
            }
            // Ping/Pong are answered by the runtime.
            _ => Ok(()),
        }
    }

    fn handle_payload(&mut self, payload: &[u8], handler: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        self.response_count += 1;
        if record::is_control_frame(payload) {
            debug!("in-band control frame: {}", String::from_utf8_lossy(payload));
            return Ok(());
        }

        let first = !self.saw_media;
        self.saw_media = true;
        match record::split_payload(self.layout, payload, first, handler) {
            Ok(_records) => Ok(()),
            Err(err) => {
                error!("record traversal failed: {err}");
                self.error = true;
                Err(err)
            }
        }
    }

    /// Emits one PING control event, the reactive stand-in for the
    /// original event loop's writable callback.
    fn send_ping(&mut self) -> Result<()> {
        let runtime = self.runtime.as_ref().ok_or_else(|| Error::new(ErrorKind::NotConnected))?;
        let socket = self.socket.as_mut().ok_or_else(|| Error::new(ErrorKind::NotConnected))?;

        self.request_count += 1;
        let event = ControlEvent::new(reactive::EVENT_PING, self.request_count);
        match runtime.block_on(reactive::send_event(socket, &event)) {
            Ok(()) => {
                self.ping_count += 1;
                self.last_control = Instant::now();
                Ok(())
            }
            Err(err) => {
                self.error = true;
                Err(err)
            }
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if self.connected {
            debug!(
                "closing session after {} request(s), {} response(s), {} ping(s)",
                self.request_count, self.response_count, self.ping_count
            );
        }
    }
}

impl StreamTransport for WsTransport {
    fn init(&mut self, url: &str) -> Result<()> {
        let parsed = StreamUrl::parse(url)?;
        debug!(
            "initializing {} transport for {}:{}{}",
            self.layout.name(),
            parsed.host(),
            parsed.port(),
            parsed.path()
        );

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| {
                error!("event loop setup failed: {err}");
                Error::new(ErrorKind::OutOfMemory)
            })?;

        self.url = Some(parsed);
        self.runtime = Some(runtime);
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        let url = match self.url.clone() {
            Some(url) => url,
            None => return Err(Error::new(ErrorKind::InvalidArgument)),
        };
        let runtime = self.runtime.as_ref().ok_or_else(|| Error::new(ErrorKind::InvalidArgument))?;

        info!("connecting to streaming server: {}", url.as_str());
        let mut socket = match runtime.block_on(connect_socket(&url, &self.tls)) {
            Ok(socket) => socket,
            Err(err) => {
                self.error = true;
                return Err(err);
            }
        };

        if self.dialect == Dialect::Reactive {
            self.request_count += 1;
            let event = ControlEvent::new(reactive::EVENT_PLAY, self.request_count);
            if let Err(err) = runtime.block_on(reactive::send_event(&mut socket, &event)) {
                self.error = true;
                return Err(err);
            }
            self.last_control = Instant::now();
        }

        info!("WebSocket connected (scheme: {})", url.scheme());
        self.socket = Some(socket);
        self.connected = true;
        Ok(())
    }

    fn recv(&mut self, handler: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<()> {
        if !self.connected || self.error {
            return Err(Error::new(ErrorKind::NotConnected));
        }

        if self.dialect == Dialect::Reactive && self.last_control.elapsed() >= PING_INTERVAL {
            self.send_ping()?;
        }

        let polled = {
            let runtime = match self.runtime.as_ref() {
                Some(runtime) => runtime,
                None => return Err(Error::new(ErrorKind::NotConnected)),
            };
            let socket = match self.socket.as_mut() {
                Some(socket) => socket,
                None => return Err(Error::new(ErrorKind::NotConnected)),
            };
            runtime.block_on(async { timeout(TICK_BUDGET, socket.next()).await })
        };

        match polled {
            // Nothing arrived within this tick.
            Err(_elapsed) => Ok(()),
            Ok(Some(Ok(message))) => self.dispatch(message, handler),
            Ok(Some(Err(err))) => {
                error!("WebSocket receive failed: {err}");
                self.error = true;
                Err(Error::new(ErrorKind::NotConnected))
            }
            Ok(None) => {
                info!("stream ended");
                self.error = true;
                Err(Error::new(ErrorKind::NotConnected))
            }
        }
    }

    fn set_tls(&mut self, options: TlsOptions) {
        self.tls = options;
    }
}

/// TCP connect, optional TLS handshake, WebSocket client handshake.
async fn connect_socket(url: &StreamUrl, tls: &TlsOptions) -> Result<WsStream> {
    let addr = format!("{}:{}", url.host(), url.port());
    let stream = TcpStream::connect(&addr).await.map_err(|err| {
        error!("TCP connect to {addr} failed: {err}");
        Error::new(ErrorKind::NotConnected)
    })?;
    stream.set_nodelay(true).map_err(|err| {
        error!("failed to set TCP_NODELAY: {err}");
        Error::new(ErrorKind::NotConnected)
    })?;

    let stream = if url.is_secure() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(tls.accept_invalid_certs())
            .danger_accept_invalid_hostnames(!tls.check_hostname)
            .build()
            .map_err(|err| {
                error!("TLS connector setup failed: {err}");
                Error::new(ErrorKind::NotConnected)
            })?;
        let connector = TokioTlsConnector::from(connector);
        match connector.connect(url.host(), stream).await {
            Ok(tls_stream) => MaybeTlsStream::NativeTls(tls_stream),
            Err(err) => {
                error!("TLS handshake with {} failed: {err}", url.host());
                return Err(Error::new(ErrorKind::NotConnected));
            }
        }
    } else {
        MaybeTlsStream::Plain(stream)
    };

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|_| Error::new(ErrorKind::InvalidArgument))?;
    let origin = format!("http{}://{}", if url.is_secure() { "s" } else { "" }, url.host());
    let origin = origin.parse().map_err(|_| Error::new(ErrorKind::InvalidArgument))?;
    request.headers_mut().insert("Origin", origin);

    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(MAX_MESSAGE_SIZE);
    let (socket, response) = client_async_with_config(request, stream, Some(config))
        .await
        .map_err(|err| {
            error!("WebSocket handshake error: {err}");
            Error::new(ErrorKind::NotConnected)
        })?;
    debug!("WebSocket handshake complete (HTTP {})", response.status());
    Ok(socket)
}

static FLV_LAYOUT: FlvLayout = FlvLayout;
static MP4_LAYOUT: Mp4Layout = Mp4Layout;

pub(crate) static WEBSOCKET_FLV: TransportDescriptor = TransportDescriptor {
    name: "websocket-flv",
    desc: "FLV over WebSocket",
    probe: probe_flv,
    create: create_flv,
};

pub(crate) static WEBSOCKET_FMP4: TransportDescriptor = TransportDescriptor {
    name: "websocket-fmp4",
    desc: "fMP4 over WebSocket",
    probe: probe_fmp4,
    create: create_fmp4,
};

fn create_flv() -> Result<Box<dyn StreamTransport>> {
    Ok(Box::new(WsTransport::new(&FLV_LAYOUT, Dialect::Passive)))
}

fn create_fmp4() -> Result<Box<dyn StreamTransport>> {
    Ok(Box::new(WsTransport::new(&MP4_LAYOUT, Dialect::Passive)))
}

pub(crate) fn create_reactive_fmp4() -> Result<Box<dyn StreamTransport>> {
    Ok(Box::new(WsTransport::new(&MP4_LAYOUT, Dialect::Reactive)))
}

pub(crate) fn has_ws_scheme(url: &str) -> bool {
    url.starts_with("ws://") || url.starts_with("wss://")
}

/// Everything after the last `/`; the whole URL when it has no path.
pub(crate) fn last_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

pub(crate) fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len() && s.as_bytes()[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

fn probe_flv(url: &str) -> bool {
    has_ws_scheme(url) && ends_with_ignore_case(last_segment(url), ".flv")
}

fn probe_fmp4(url: &str) -> bool {
    has_ws_scheme(url) && ends_with_ignore_case(last_segment(url), ".mp4")
}
