/// Errors from cache maintenance operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// `load` was called for a key that is already cached.
    #[error("cache entry already exists: {0}")]
    AlreadyCached(String),

    /// `update` was called for a key that is not cached.
    #[error("cache entry does not exist: {0}")]
    NotCached(String),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
