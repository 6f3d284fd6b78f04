use std::fmt::{self, Display};

/// Storage engine result returned by all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage engine errors. These carry rendered message strings rather than error sources,
/// so they can be cloned and compared in tests.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A block address beyond the end of the backing file, or an absent backing file.
    /// Read paths recover this as "no such node" where the domain allows it.
    NotFound(String),
    /// Malformed or truncated block bytes. Signals on-disk corruption and is never
    /// recovered from.
    Decode(String),
    /// An underlying read, write, or seek failure.
    Io(String),
    /// A violated internal invariant.
    Internal(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(s) => write!(f, "not found: {}", s),
            Error::Decode(s) => write!(f, "decode error: {}", s),
            Error::Io(s) => write!(f, "io error: {}", s),
            Error::Internal(s) => write!(f, "internal error: {}", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            std::io::ErrorKind::UnexpectedEof => Error::NotFound(err.to_string()),
            _ => Error::Io(err.to_string()),
        }
    }
}
