use thiserror::Error;

use dirstore_store::StoreError;
use dirstore_types::TypeError;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid name: {0}")]
    Type(#[from] TypeError),

    /// A mutating call named the directory itself.
    #[error("empty name")]
    EmptyName,
}

impl DirectoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
