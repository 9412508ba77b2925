use std::fmt;

use serde::{Deserialize, Serialize};

use dirstore_types::Name;

/// Breadth of a listener's interest, relative to where it registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Only the registration name itself.
    Object,
    /// Direct children of the registration name.
    OneLevel,
    /// Every descendant of the registration name, and the name itself.
    Subtree,
}

/// Classification of namespace mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A name was bound or a context created.
    ObjectAdded,
    /// A name was unbound or a context destroyed.
    ObjectRemoved,
    /// A name was renamed.
    ObjectRenamed,
    /// A bound object was replaced in place.
    ObjectChanged,
}

impl EventKind {
    /// Add, remove and rename change the namespace; in-place replacement
    /// changes an object.
    pub fn is_namespace_change(self) -> bool {
        !matches!(self, Self::ObjectChanged)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ObjectAdded => "ObjectAdded",
            Self::ObjectRemoved => "ObjectRemoved",
            Self::ObjectRenamed => "ObjectRenamed",
            Self::ObjectChanged => "ObjectChanged",
        };
        f.write_str(s)
    }
}

/// Which event families a listener accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interest {
    pub namespace: bool,
    pub object: bool,
}

impl Interest {
    /// Add/remove/rename events only.
    pub const NAMESPACE: Interest = Interest {
        namespace: true,
        object: false,
    };
    /// In-place change events only.
    pub const OBJECT: Interest = Interest {
        namespace: false,
        object: true,
    };
    pub const ALL: Interest = Interest {
        namespace: true,
        object: true,
    };

    pub fn accepts(self, kind: EventKind) -> bool {
        if kind.is_namespace_change() {
            self.namespace
        } else {
            self.object
        }
    }
}

/// An event as delivered to one listener.
#[derive(Clone, Debug, PartialEq)]
pub struct NamingEvent<P> {
    pub kind: EventKind,
    /// Absolute name that was mutated.
    pub changed: Name,
    /// Where the receiving listener is registered.
    pub source: Name,
    /// `changed` relative to `source`.
    pub relative: Name,
    pub payload: P,
}
