//! Change notification for dirstore namespaces.
//!
//! Listeners register at a [`Name`](dirstore_types::Name) with a [`Scope`]:
//! the name itself, its direct children, or its whole subtree. The
//! [`EventRegistry`] mirrors the namespace as a tree of reference-counted
//! nodes; a node disappears as soon as no listener at or below it remains.
//!
//! After a store mutation, the caller asks the registry which listeners must
//! fire ([`EventRegistry::get_listeners`]) and delivers the event to each of
//! them synchronously ([`dispatch`]). A failing listener is logged and
//! skipped; it never stops delivery to the rest.

pub mod event;
pub mod listener;
pub mod registry;

pub use event::{EventKind, Interest, NamingEvent, Scope};
pub use listener::{ListenerError, ListenerMatch, NamingListener};
pub use registry::{dispatch, DispatchReport, EventRegistry};
