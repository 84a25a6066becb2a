use std::fmt;
use std::panic::Location;

/// Stable error taxonomy shared by every public operation.
///
/// The integer codes follow POSIX errno semantics so downstream callers can
/// log or compare them without depending on this crate's enum layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Missing required parameter or malformed URL component.
    #[error("invalid argument")]
    InvalidArgument,
    /// Serialization failure or missing URL parts.
    #[error("out of memory")]
    OutOfMemory,
    /// No registered transport probe matched the URL.
    #[error("protocol not supported")]
    ProtocolNotSupported,
    /// Handshake never completed, or the connection reported an error.
    #[error("not connected")]
    NotConnected,
    /// Record traversal overran the payload or a parse failed.
    #[error("bad message")]
    BadMessage,
}

impl ErrorKind {
    /// Stable errno-style code for this kind.
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::InvalidArgument => 22,      // EINVAL
            ErrorKind::OutOfMemory => 12,          // ENOMEM
            ErrorKind::BadMessage => 74,           // EBADMSG
            ErrorKind::ProtocolNotSupported => 93, // EPROTONOSUPPORT
            ErrorKind::NotConnected => 107,        // ENOTCONN
        }
    }
}

/// Error carrier recording what failed and where it was first observed.
///
/// Construction captures the caller's source location, so the origin always
/// names the site that first saved the error. Layers above propagate the
/// value unchanged with `?`; nothing overwrites an error once created.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    origin: &'static Location<'static>,
}

impl Error {
    #[track_caller]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            origin: Location::caller(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable errno-style code, see [`ErrorKind::code`].
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    /// Source location that first saved this error.
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.kind, self.origin.file(), self.origin.line())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
