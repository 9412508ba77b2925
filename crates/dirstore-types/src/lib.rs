//! Foundation types for dirstore.
//!
//! Every other dirstore crate depends on `dirstore-types`. It defines the
//! addressing key shared by the lock manager, the entry cache, the event
//! registry and the object store, plus the value-side contracts those
//! components impose on stored data.
//!
//! # Key Types
//!
//! - [`Name`]: Ordered sequence of path segments; the root is the empty name
//! - [`Duplicate`]: Capability to produce an independent, state-equal copy
//! - [`Attributes`]: Ordered attribute bundle (`id -> [AttrValue]`)
//! - [`Binding`]: A bound leaf object or a context (directory) marker

pub mod attributes;
pub mod binding;
pub mod duplicate;
pub mod error;
pub mod name;

pub use attributes::{AttrValue, Attributes};
pub use binding::Binding;
pub use duplicate::Duplicate;
pub use error::{Result, TypeError};
pub use name::Name;
