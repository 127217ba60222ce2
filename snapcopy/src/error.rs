use std::{error, fmt, io};

use serde::{Deserialize, Serialize};

use crate::Token;

/// An error type for RPC results and copy operations.
///
/// Server errors cross the wire verbatim; the copier maps the ones it
/// cannot recover from to the `Source*`/`Destination*` variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Error {
    InvalidEndpoint(String),
    InvalidPath(String),
    InvalidOptions(String),
    SessionNotFound(Token),
    SessionExists(Token),
    PathEscape(String),
    NotFound(String),
    PermissionDenied(String),
    Io(String),
    Rpc(String),
    SourceNotFound(String),
    SourceUnreadable(String),
    DestinationUnwritable(String),
    ChunkTransferFailed {
        path: String,
        offset: u64,
        attempts: u32,
        reason: String,
    },
    Cancelled,
    Other(String),
}

impl Error {
    /// Map an I/O error on `path` to a typed error.
    pub fn from_io(err: io::Error, path: impl fmt::Display) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Io(format!("{path}: {err}")),
        }
    }

    /// Map an I/O error raised while writing the local destination.
    pub fn from_dest_io(err: io::Error, path: impl fmt::Display) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::DestinationUnwritable(format!("{path}: {err}")),
            _ => Self::Io(format!("{path}: {err}")),
        }
    }

    /// Transport failures and server I/O errors may go away on retry.
    /// Everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(..) | Self::Rpc(..))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint(msg) => write!(f, "Invalid endpoint: {msg}"),
            Self::InvalidPath(path) => write!(f, "Invalid path: {path}"),
            Self::InvalidOptions(msg) => write!(f, "Invalid copy options: {msg}"),
            Self::SessionNotFound(token) => write!(f, "No such session: {token}"),
            Self::SessionExists(token) => write!(f, "Session {token} is already published"),
            Self::PathEscape(path) => write!(f, "Path escapes the session root: {path}"),
            Self::NotFound(path) => write!(f, "No such entry: {path}"),
            Self::PermissionDenied(path) => write!(f, "Permission denied: {path}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Rpc(msg) => write!(f, "RPC error: {msg}"),
            Self::SourceNotFound(path) => write!(f, "Source not found: {path}"),
            Self::SourceUnreadable(path) => write!(f, "Source is not readable: {path}"),
            Self::DestinationUnwritable(msg) => write!(f, "Destination is not writable: {msg}"),
            Self::ChunkTransferFailed {
                path,
                offset,
                attempts,
                reason,
            } => write!(
                f,
                "Failed to transfer chunk of {path} at offset {offset} after {attempts} attempt(s): {reason}"
            ),
            Self::Cancelled => f.write_str("Copy cancelled"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<tarpc::client::RpcError> for Error {
    fn from(value: tarpc::client::RpcError) -> Self {
        Self::Rpc(value.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! other_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::Other(format!($($t)*)));
    };
}

#[macro_export]
macro_rules! options_bail {
    ($($t:tt)*) => {
        return ::core::result::Result::Err($crate::Error::InvalidOptions(format!($($t)*)));
    };
}
