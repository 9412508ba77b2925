use std::fmt;
use std::sync::Arc;

use dirstore_types::Name;

use crate::event::{Interest, NamingEvent};

/// Error type listeners report; it is logged and never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver of namespace events carrying payload `P`.
pub trait NamingListener<P>: Send + Sync {
    /// Which event families this listener accepts.
    fn interest(&self) -> Interest;

    /// Handle one event. Errors are logged by the dispatcher.
    fn handle(&self, event: &NamingEvent<P>) -> Result<(), ListenerError>;
}

/// A listener selected for an event, with the names it will see.
pub struct ListenerMatch<P> {
    pub listener: Arc<dyn NamingListener<P>>,
    /// Name the listener is registered at.
    pub registered_at: Name,
    /// The changed name relative to `registered_at`.
    pub relative: Name,
}

impl<P> Clone for ListenerMatch<P> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            registered_at: self.registered_at.clone(),
            relative: self.relative.clone(),
        }
    }
}

impl<P> fmt::Debug for ListenerMatch<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerMatch")
            .field("registered_at", &self.registered_at.to_string())
            .field("relative", &self.relative.to_string())
            .finish()
    }
}

/// Listener identity: the same allocation, regardless of vtable.
pub(crate) fn same_listener<P>(
    a: &Arc<dyn NamingListener<P>>,
    b: &Arc<dyn NamingListener<P>>,
) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
