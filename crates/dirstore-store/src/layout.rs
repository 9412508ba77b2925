//! Mapping from names to files under the store root.
//!
//! - object of `a/b/c`: `<root>/a/b/c` (a directory if `a/b/c` is a context)
//! - attribute bundle of `a/b/c`: `<root>/a/b/.c`
//! - attribute bundle of the root: `<root>/..root-attributes`
//!
//! Names never start with `.`, so a single leading dot marks an attribute
//! bundle and a double dot marks store-internal files.

use std::path::{Path, PathBuf};

use dirstore_types::Name;

/// File holding the root context's attribute bundle.
pub const ROOT_ATTRIBUTES_FILE: &str = "..root-attributes";

/// Prefix of in-flight temporary files.
pub const TEMP_PREFIX: &str = "..tmp";

const MARKER_PREFIX: char = '.';

#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, name: &Name) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(name.segments());
        path
    }

    pub fn attributes_path(&self, name: &Name) -> PathBuf {
        self.root.join(attributes_key(name))
    }
}

/// Cache key of an object: its `/`-joined name.
pub fn object_key(name: &Name) -> String {
    name.to_string()
}

/// Cache key of an attribute bundle: its path relative to the root.
pub fn attributes_key(name: &Name) -> String {
    match (name.parent(), name.last()) {
        (Some(parent), Some(last)) if parent.is_root() => format!("{MARKER_PREFIX}{last}"),
        (Some(parent), Some(last)) => format!("{parent}/{MARKER_PREFIX}{last}"),
        _ => ROOT_ATTRIBUTES_FILE.to_string(),
    }
}

/// The bound segment an attribute-marker filename stands for, if it is one.
pub fn marker_target(file_name: &str) -> Option<&str> {
    let rest = file_name.strip_prefix(MARKER_PREFIX)?;
    if rest.is_empty() || rest.starts_with(MARKER_PREFIX) {
        return None;
    }
    Some(rest)
}

/// Store-internal files (`..`-prefixed) are neither names nor markers.
pub fn is_internal(file_name: &str) -> bool {
    file_name.starts_with("..")
}

pub fn is_temporary(file_name: &str) -> bool {
    file_name.starts_with(TEMP_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> Name {
        Name::parse(s).unwrap()
    }

    #[test]
    fn paths_for_nested_name() {
        let layout = Layout::new("/srv/ns");
        assert_eq!(layout.object_path(&n("a/b/c")), PathBuf::from("/srv/ns/a/b/c"));
        assert_eq!(layout.attributes_path(&n("a/b/c")), PathBuf::from("/srv/ns/a/b/.c"));
        assert_eq!(layout.attributes_path(&n("a")), PathBuf::from("/srv/ns/.a"));
    }

    #[test]
    fn root_uses_reserved_file() {
        let layout = Layout::new("/srv/ns");
        assert_eq!(layout.object_path(&Name::root()), PathBuf::from("/srv/ns"));
        assert_eq!(
            layout.attributes_path(&Name::root()),
            PathBuf::from("/srv/ns/..root-attributes")
        );
    }

    #[test]
    fn keys_distinguish_objects_and_bundles() {
        assert_eq!(object_key(&n("a/b")), "a/b");
        assert_eq!(attributes_key(&n("a/b")), "a/.b");
        assert_eq!(attributes_key(&Name::root()), "..root-attributes");
    }

    #[test]
    fn marker_filenames() {
        assert_eq!(marker_target(".c"), Some("c"));
        assert_eq!(marker_target("c"), None);
        assert_eq!(marker_target("."), None);
        assert_eq!(marker_target("..root-attributes"), None);
        assert_eq!(marker_target("..tmpX1y2"), None);
        assert!(is_internal("..tmpX1y2"));
        assert!(is_temporary("..tmpX1y2"));
        assert!(!is_internal(".c"));
    }
}
