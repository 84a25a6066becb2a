use url::Url;

use crate::error::{Error, ErrorKind, Result};

/// Upper bound on accepted URL length, in bytes.
pub const MAX_URL_LEN: usize = 1024;

/// Validated `ws[s]://host[:port]/path` stream URL.
///
/// Parsing is all-or-nothing: on failure no partial components are exposed.
/// Ports default to 80 for `ws` and 443 for `wss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrl {
    raw: String,
    secure: bool,
    host: String,
    port: u16,
    path: String,
}

impl StreamUrl {
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() || input.len() > MAX_URL_LEN {
            return Err(Error::new(ErrorKind::InvalidArgument));
        }

        let parsed = Url::parse(input).map_err(|_| Error::new(ErrorKind::InvalidArgument))?;
        let secure = match parsed.scheme() {
            "ws" => false,
            "wss" => true,
            _ => return Err(Error::new(ErrorKind::InvalidArgument)),
        };

        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(Error::new(ErrorKind::InvalidArgument)),
        };

        // The url crate's known-default table already maps ws->80, wss->443.
        let port = match parsed.port_or_known_default() {
            Some(port) if port != 0 => port,
            Some(_) => return Err(Error::new(ErrorKind::InvalidArgument)),
            None => {
                if secure {
                    443
                } else {
                    80
                }
            }
        };

        let path = if parsed.path().is_empty() {
            "/".to_string()
        } else {
            parsed.path().to_string()
        };

        Ok(Self {
            raw: input.to_string(),
            secure,
            host,
            port,
            path,
        })
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The URL exactly as given to [`StreamUrl::parse`].
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_components() {
        let url = StreamUrl::parse("ws://media.example.com:8080/live/cam1.flv").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.host(), "media.example.com");
        assert_eq!(url.port(), 8080);
        assert_eq!(url.path(), "/live/cam1.flv");
        assert!(!url.is_secure());
    }

    #[test]
    fn default_ports_follow_scheme() {
        let ws = StreamUrl::parse("ws://host.example/stream.flv").unwrap();
        assert_eq!(ws.port(), 80);
        let wss = StreamUrl::parse("wss://host.example/stream.mp4").unwrap();
        assert_eq!(wss.port(), 443);
    }

    #[test]
    fn bare_host_gets_root_path() {
        let url = StreamUrl::parse("ws://host.example").unwrap();
        assert_eq!(url.path(), "/");
    }

    #[test]
    fn rejects_bad_inputs() {
        for input in [
            "",
            "http://host.example/stream.flv",
            "ws://",
            "ws:///nohost.flv",
            "not a url",
            "ws://host.example:0/stream.flv",
        ] {
            let err = StreamUrl::parse(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "input: {input:?}");
        }
    }

    #[test]
    fn rejects_oversized_url() {
        let input = format!("ws://host.example/{}.flv", "a".repeat(MAX_URL_LEN));
        let err = StreamUrl::parse(&input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    proptest! {
        // Any accepted URL decomposes into a ws/wss scheme, a non-empty
        // host, a slash-prefixed path, and a port in [1, 65535].
        #[test]
        fn accepted_urls_are_well_formed(
            secure in any::<bool>(),
            host in "[a-z][a-z0-9]{0,15}(\\.[a-z]{2,6}){0,2}",
            port in proptest::option::of(1u16..),
            segment in "[a-zA-Z0-9_-]{1,24}",
        ) {
            let scheme = if secure { "wss" } else { "ws" };
            let input = match port {
                Some(port) => format!("{scheme}://{host}:{port}/{segment}.flv"),
                None => format!("{scheme}://{host}/{segment}.flv"),
            };
            let url = StreamUrl::parse(&input).unwrap();
            prop_assert!(url.scheme() == "ws" || url.scheme() == "wss");
            prop_assert!(!url.host().is_empty());
            prop_assert!(url.path().starts_with('/'));
            prop_assert!(url.port() >= 1);
            match port {
                Some(port) => prop_assert_eq!(url.port(), port),
                None => prop_assert_eq!(url.port(), if secure { 443 } else { 80 }),
            }
        }
    }
}
