use std::fmt;
use std::io;
use std::path::PathBuf;

use dirstore_types::{Name, TypeError};

use crate::codec::CodecError;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing is bound at the name.
    #[error("name not found: {0}")]
    NotFound(Name),

    /// A context was required but the name is bound to an object.
    #[error("not a context: {0}")]
    NotContext(Name),

    /// An object was required but the name is a context.
    #[error("is a context: {0}")]
    IsContext(Name),

    /// The name is already bound and overwriting was not requested.
    #[error("name already bound: {0}")]
    AlreadyBound(Name),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// I/O error from the backing directory tree.
    #[error("I/O error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored unit could not be encoded or decoded.
    #[error("codec error at {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// A context directory could not be enumerated.
    #[error("corrupted context at {path}: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Coarse classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotContext,
    IsContext,
    AlreadyBound,
    Unsupported,
    Storage,
    Corrupted,
    Config,
    InvalidName,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not-found",
            Self::NotContext => "not-context",
            Self::IsContext => "is-context",
            Self::AlreadyBound => "already-bound",
            Self::Unsupported => "unsupported",
            Self::Storage => "storage",
            Self::Corrupted => "corrupted",
            Self::Config => "config",
            Self::InvalidName => "invalid-name",
        };
        f.write_str(s)
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotContext(_) => ErrorKind::NotContext,
            Self::IsContext(_) => ErrorKind::IsContext,
            Self::AlreadyBound(_) => ErrorKind::AlreadyBound,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Storage { .. } | Self::Codec { .. } => ErrorKind::Storage,
            Self::Corrupted { .. } => ErrorKind::Corrupted,
            Self::Config(_) => ErrorKind::Config,
            Self::Type(_) => ErrorKind::InvalidName,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn codec(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Codec {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
