use log::info;

use crate::error::{Error, ErrorKind, Result};
use crate::flv::FlvTag;
use crate::fmp4::Mp4Box;
use crate::transport::{self, StreamTransport, TransportRegistry};
use crate::websocket::TlsOptions;

fn create_transport(
    registry: &TransportRegistry,
    url: &str,
    tls: TlsOptions,
) -> Result<Box<dyn StreamTransport>> {
    let descriptor = registry
        .select(url)
        .ok_or_else(|| Error::new(ErrorKind::ProtocolNotSupported))?;
    info!("selected transport '{}' ({}) for {url}", descriptor.name, descriptor.desc);

    let mut transport = (descriptor.create)()?;
    transport.set_tls(tls);
    transport.init(url)?;
    Ok(transport)
}

/// Session over a live FLV stream.
///
/// Create, connect, then call [`FlvStream::recv`] in a loop; each call runs
/// one 10 ms event-loop tick and invokes the handler once per tag that
/// arrived within it. Dropping the session tears the connection down.
pub struct FlvStream {
    transport: Box<dyn StreamTransport>,
}

impl std::fmt::Debug for FlvStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlvStream").finish_non_exhaustive()
    }
}

impl FlvStream {
    pub fn create(url: &str) -> Result<Self> {
        Self::create_with_tls(url, TlsOptions::default())
    }

    pub fn create_with_tls(url: &str, tls: TlsOptions) -> Result<Self> {
        let transport = create_transport(transport::flv_registry(), url, tls)?;
        Ok(Self { transport })
    }

    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect()
    }

    /// Runs one event-loop tick. The handler borrows each tag only for the
    /// duration of the call; an `Err` from the handler stops delivery and
    /// fails the session.
    pub fn recv<H>(&mut self, mut handler: H) -> Result<()>
    where
        H: FnMut(&FlvTag<'_>) -> Result<()>,
    {
        let mut deliver = |record: &[u8]| {
            let tag = FlvTag::new(record)?;
            handler(&tag)
        };
        self.transport.recv(&mut deliver)
    }
}

/// Session over a live fragmented-MP4 stream.
///
/// Same skeleton as [`FlvStream`], delivering boxes instead of tags.
pub struct Fmp4Stream {
    transport: Box<dyn StreamTransport>,
}

impl std::fmt::Debug for Fmp4Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fmp4Stream").finish_non_exhaustive()
    }
}

impl Fmp4Stream {
    pub fn create(url: &str) -> Result<Self> {
        Self::create_with_tls(url, TlsOptions::default())
    }

    pub fn create_with_tls(url: &str, tls: TlsOptions) -> Result<Self> {
        let transport = create_transport(transport::fmp4_registry(), url, tls)?;
        Ok(Self { transport })
    }

    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect()
    }

    /// Runs one event-loop tick. The handler borrows each box only for the
    /// duration of the call; an `Err` from the handler stops delivery and
    /// fails the session.
    pub fn recv<H>(&mut self, mut handler: H) -> Result<()>
    where
        H: FnMut(&Mp4Box<'_>) -> Result<()>,
    {
        let mut deliver = |record: &[u8]| {
            let parsed = Mp4Box::new(record)?;
            handler(&parsed)
        };
        self.transport.recv(&mut deliver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_urls_are_rejected_without_side_effects() {
        let err = FlvStream::create("ws://host.example/live.mp4").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolNotSupported);

        let err = Fmp4Stream::create("ws://host.example/live.flv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolNotSupported);

        let err = FlvStream::create("rtmp://host.example/live.flv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolNotSupported);
    }

    #[test]
    fn malformed_urls_fail_at_init() {
        // The probe accepts the extension, but URL parsing must still
        // reject the empty host, tearing the half-built session down.
        let err = FlvStream::create("ws:///live.flv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
