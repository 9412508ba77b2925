//! Hierarchical lock manager for dirstore.
//!
//! Locks are taken per [`Name`](dirstore_types::Name) and per operation type
//! ([`LockOp`]). The manager keeps a tree of lock nodes mirroring the
//! namespace: nodes are created lazily on first use and pruned eagerly once
//! no caller holds a reservation at or below them.
//!
//! # Compatibility
//!
//! | requested \ held | none | READ/LIST | WRITE/DELETE |
//! |------------------|------|-----------|--------------|
//! | READ, LIST       | ok   | ok        | blocked      |
//! | WRITE, DELETE    | ok   | blocked   | blocked      |
//!
//! The rule applies at the target node and at every non-root ancestor the
//! request walks through. Two extra scope rules apply at the target only:
//! DELETE waits until it is the only operation active at the node (its own
//! included), and LIST waits while any direct child holds WRITE or DELETE.
//!
//! There are no timeouts and no deadlock detection. Callers that take two
//! locks (rename takes DELETE on the source, then WRITE on the destination)
//! can deadlock against a concurrent caller taking them in the opposite
//! order. Two DELETE requests waiting at the same node also block each
//! other for good: each counts the other as active, so neither ever sees
//! itself as the only operation there.

pub mod manager;
pub mod op;

pub use manager::{LockGuard, LockManager};
pub use op::LockOp;
