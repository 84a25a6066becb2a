use std::sync::OnceLock;

use crate::error::{Error, ErrorKind, Result};
use crate::websocket::TlsOptions;

/// Upper bound on registered transports per registry.
pub const MAX_TRANSPORT_COUNT: usize = 16;

/// A connected stream source. Implementations move opaque byte views; the
/// session facades reattach record types.
pub trait StreamTransport {
    /// Binds the transport to a stream URL.
    fn init(&mut self, url: &str) -> Result<()>;

    /// Establishes the connection, blocking until the handshake completes
    /// or fails.
    fn connect(&mut self) -> Result<()>;

    /// Runs one event-loop tick, delivering any records that arrive within
    /// it. The handler borrows each record only for the duration of the
    /// call.
    fn recv(&mut self, handler: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<()>;

    /// TLS verification options, applied before `init`. Transports without
    /// a TLS layer ignore this.
    fn set_tls(&mut self, _options: TlsOptions) {}
}

/// Immutable description of one transport strategy. All slots are populated
/// by construction.
pub struct TransportDescriptor {
    pub name: &'static str,
    pub desc: &'static str,
    /// Whether this transport can serve the given URL.
    pub probe: fn(url: &str) -> bool,
    pub create: fn() -> Result<Box<dyn StreamTransport>>,
}

/// Ordered, append-only transport table. Lookup is a linear scan in
/// insertion order; the earliest matching probe wins, so registration
/// order is the priority order. Duplicates are not rejected.
#[derive(Default)]
pub struct TransportRegistry {
    entries: Vec<&'static TransportDescriptor>,
}

impl TransportRegistry {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(&mut self, descriptor: &'static TransportDescriptor) -> Result<()> {
        if self.entries.len() >= MAX_TRANSPORT_COUNT {
            return Err(Error::new(ErrorKind::InvalidArgument));
        }
        self.entries.push(descriptor);
        Ok(())
    }

    /// First registered transport whose probe accepts the URL. A miss has
    /// no error side-effect; callers decide what an unsupported URL means.
    pub fn select(&self, url: &str) -> Option<&'static TransportDescriptor> {
        self.entries.iter().copied().find(|descriptor| (descriptor.probe)(url))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static FLV_REGISTRY: OnceLock<TransportRegistry> = OnceLock::new();
static FMP4_REGISTRY: OnceLock<TransportRegistry> = OnceLock::new();

/// Registry consulted by FLV sessions.
pub(crate) fn flv_registry() -> &'static TransportRegistry {
    FLV_REGISTRY.get_or_init(|| {
        let mut registry = TransportRegistry::new();
        registry
            .register(&crate::websocket::WEBSOCKET_FLV)
            .expect("transport registry capacity");
        registry
    })
}

/// Registry consulted by fMP4 sessions. The reactive transport registers
/// first so it takes priority for URLs both probes accept.
pub(crate) fn fmp4_registry() -> &'static TransportRegistry {
    FMP4_REGISTRY.get_or_init(|| {
        let mut registry = TransportRegistry::new();
        registry
            .register(&crate::reactive::REACTIVE_WEBSOCKET)
            .expect("transport registry capacity");
        registry
            .register(&crate::websocket::WEBSOCKET_FMP4)
            .expect("transport registry capacity");
        registry
    })
}
