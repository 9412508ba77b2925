//! Directory API over a dirstore namespace.
//!
//! A [`Directory`] is a view of one context in an
//! [`ObjectStore`](dirstore_store::ObjectStore). Every mutation goes through
//! the store and then notifies the listeners registered in the namespace's
//! [`EventRegistry`](dirstore_events::EventRegistry). Directories opened
//! through one [`DirectoryRegistry`] share a store and listeners per root.

pub mod change;
pub mod directory;
pub mod error;
pub mod registry;

pub use change::Change;
pub use directory::{ChangeListener, Directory, CLASSNAME, CONTEXT_CLASS, MODIFICATION_TIME};
pub use error::{DirectoryError, DirectoryResult};
pub use registry::DirectoryRegistry;

// Re-export key types
pub use dirstore_events::{EventKind, Interest, NamingEvent, NamingListener, Scope};
pub use dirstore_store::{StoreConfig, StoreError};
pub use dirstore_types::{AttrValue, Attributes, Binding, Name};
