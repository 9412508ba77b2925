use serde::{Deserialize, Serialize};

use crate::duplicate::Duplicate;

/// What a name is bound to: a leaf object, or a context (directory).
///
/// Lookups return [`Binding::Context`] as a directory marker; the caller
/// builds a sub-context from the name it asked for. Writes ignore a
/// `Context` value since contexts are created, not bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding<O> {
    Object(O),
    Context,
}

impl<O> Binding<O> {
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context)
    }

    pub fn as_object(&self) -> Option<&O> {
        match self {
            Self::Object(o) => Some(o),
            Self::Context => None,
        }
    }

    pub fn into_object(self) -> Option<O> {
        match self {
            Self::Object(o) => Some(o),
            Self::Context => None,
        }
    }
}

impl<O: Duplicate> Duplicate for Binding<O> {
    fn duplicate(&self) -> Self {
        match self {
            Self::Object(o) => Self::Object(o.duplicate()),
            Self::Context => Self::Context,
        }
    }
}
