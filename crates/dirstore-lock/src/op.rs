use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation types the lock manager arbitrates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockOp {
    Read,
    Write,
    Delete,
    List,
}

impl LockOp {
    /// Number of operation types.
    pub const COUNT: usize = 4;

    pub const ALL: [LockOp; Self::COUNT] = [Self::Read, Self::Write, Self::Delete, Self::List];

    /// Counter slot for this operation.
    pub fn index(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::Delete => 2,
            Self::List => 3,
        }
    }

    /// WRITE and DELETE exclude every other holder at a node.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Write | Self::Delete)
    }
}

impl fmt::Display for LockOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Delete => "DELETE",
            Self::List => "LIST",
        };
        f.write_str(s)
    }
}
