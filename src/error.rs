use std::fmt::{Display, Formatter};
use std::io;
use thiserror::Error;

/// A probing error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A probing error.
///
/// Only [`Error::Resolution`] and [`Error::SocketCreation`] are fatal to a
/// session; every other variant is absorbed per probe.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to resolve {host}: {reason}")]
    Resolution { host: String, reason: String },
    #[error(
        "failed to open raw ICMP socket: {0}\n\n\
         Fix options:\n\
         \u{2022} Run with sudo: sudo pingtrace <command>\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep <path-to-pingtrace>"
    )]
    SocketCreation(#[source] io::Error),
    #[error("malformed packet: {0} bytes is shorter than an ICMP header")]
    MalformedPacket(usize),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("failed to {operation}: {source}")]
    Io {
        operation: IoOperation,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn io(operation: IoOperation, source: io::Error) -> Self {
        Self::Io { operation, source }
    }
}

/// Socket operation that failed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum IoOperation {
    SetTtl,
    SetReadTimeout,
    SendTo,
    RecvFrom,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetTtl => write!(f, "set TTL"),
            Self::SetReadTimeout => write!(f, "set read timeout"),
            Self::SendTo => write!(f, "send to"),
            Self::RecvFrom => write!(f, "recv from"),
        }
    }
}
