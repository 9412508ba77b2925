use thiserror::Error;

/// Errors produced while constructing foundation types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A name or one of its segments is malformed.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}

/// Convenience alias for type construction.
pub type Result<T> = std::result::Result<T, TypeError>;
