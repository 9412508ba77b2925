//! Bounded entry cache for dirstore.
//!
//! [`EntryCache`] maps string keys to timestamped duplicates of stored
//! values. It is a pure optimization: the object store treats every cache
//! error as non-fatal and falls back to the backing files.
//!
//! # Design Rules
//!
//! 1. Values go in and come out as [`Duplicate`](dirstore_types::Duplicate)
//!    copies; a lookup never aliases cached state.
//! 2. The size never exceeds `max_size` after an insert. Overflow evicts
//!    the oldest fifth of the capacity, in insertion order, before inserting.
//! 3. `update` requires an existing entry; `load` requires a missing one.

pub mod cache;
pub mod error;

pub use cache::{EntryCache, DEFAULT_MAX_SIZE};
pub use error::{CacheError, CacheResult};
