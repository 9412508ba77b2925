use dirstore_types::{Attributes, Binding, Name};

/// Payload of every directory event.
#[derive(Clone, Debug, PartialEq)]
pub struct Change<O> {
    /// The binding after the change (`ObjectAdded`, `ObjectChanged`).
    pub new: Option<Binding<O>>,
    /// The binding before the change (`ObjectChanged`, `ObjectRemoved`).
    pub old: Option<Binding<O>>,
    pub old_attributes: Option<Attributes>,
    /// Destination of an `ObjectRenamed`.
    pub renamed_to: Option<Name>,
}

impl<O> Change<O> {
    pub fn added(new: Binding<O>) -> Self {
        Self {
            new: Some(new),
            old: None,
            old_attributes: None,
            renamed_to: None,
        }
    }

    pub fn changed(old: Binding<O>, new: Binding<O>) -> Self {
        Self {
            new: Some(new),
            old: Some(old),
            old_attributes: None,
            renamed_to: None,
        }
    }

    pub fn removed(old: Option<Binding<O>>, old_attributes: Option<Attributes>) -> Self {
        Self {
            new: None,
            old,
            old_attributes,
            renamed_to: None,
        }
    }

    pub fn renamed(to: Name) -> Self {
        Self {
            new: None,
            old: None,
            old_attributes: None,
            renamed_to: Some(to),
        }
    }
}
