//! Filesystem-backed object and attribute store.
//!
//! An [`ObjectStore`] maps every [`Name`](dirstore_types::Name) to up to two
//! files under its root directory: the bound object and a sibling attribute
//! bundle (see [`layout`]). Contexts are directories carrying only a bundle.
//!
//! All operations are serialized through a hierarchical
//! [`LockManager`](dirstore_lock::LockManager) and read through two bounded
//! [`EntryCache`](dirstore_cache::EntryCache)s. Units are framed by the
//! versioned, CRC-checked envelope in [`codec`].

pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod store;

pub use codec::CodecError;
pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use layout::Layout;
pub use store::{ObjectStore, RemoveKind, Removed, Storable};
