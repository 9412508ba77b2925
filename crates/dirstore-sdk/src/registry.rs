use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use dirstore_store::{Storable, StoreConfig, StoreError};

use crate::directory::Directory;
use crate::error::DirectoryResult;

/// Open namespaces, one per canonical root directory.
///
/// Opening the same root twice returns directories that share one store,
/// one lock tree and one set of listeners.
pub struct DirectoryRegistry<O> {
    roots: Mutex<HashMap<PathBuf, Directory<O>>>,
}

impl<O: Storable + Clone> DirectoryRegistry<O> {
    pub fn new() -> Self {
        Self {
            roots: Mutex::new(HashMap::new()),
        }
    }

    /// The root directory of the namespace at `config.root`, opening it on
    /// first use. Later calls for the same root ignore the rest of `config`.
    pub fn open(&self, config: StoreConfig) -> DirectoryResult<Directory<O>> {
        let root = canonical(&config.root)?;
        let mut roots = self.roots.lock().expect("directory registry poisoned");
        if let Some(existing) = roots.get(&root) {
            debug!(root = %root.display(), "namespace already open");
            return Ok(existing.clone());
        }

        let directory = Directory::open(StoreConfig {
            root: root.clone(),
            ..config
        })?;
        info!(root = %root.display(), "namespace opened");
        roots.insert(root, directory.clone());
        Ok(directory)
    }

    /// Forget the namespace at `root`. Directories already handed out keep
    /// working; the next [`open`](Self::open) starts a fresh store.
    pub fn close(&self, root: &Path) -> DirectoryResult<bool> {
        let root = canonical(root)?;
        let removed = self
            .roots
            .lock()
            .expect("directory registry poisoned")
            .remove(&root)
            .is_some();
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.roots.lock().expect("directory registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O: Storable + Clone> Default for DirectoryRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical(root: &Path) -> DirectoryResult<PathBuf> {
    fs::canonicalize(root).map_err(|source| {
        StoreError::Storage {
            path: root.to_path_buf(),
            source,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirstore_events::{Interest, ListenerError, NamingEvent, NamingListener, Scope};
    use dirstore_types::{Attributes, Binding, Name};

    use super::*;
    use crate::change::Change;

    struct Counter(Mutex<usize>);

    impl NamingListener<Change<String>> for Counter {
        fn interest(&self) -> Interest {
            Interest::NAMESPACE
        }

        fn handle(&self, _event: &NamingEvent<Change<String>>) -> Result<(), ListenerError> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn same_root_shares_store_and_listeners() {
        let tmp = tempfile::tempdir().unwrap();
        let registry: DirectoryRegistry<String> = DirectoryRegistry::new();

        let first = registry.open(StoreConfig::new(tmp.path())).unwrap();
        let second = registry
            .open(StoreConfig::new(tmp.path().join(".")))
            .unwrap();
        assert!(Arc::ptr_eq(first.store(), second.store()));
        assert_eq!(registry.len(), 1);

        let counter = Arc::new(Counter(Mutex::new(0)));
        first.add_listener(&Name::root(), Scope::OneLevel, counter.clone());
        second
            .bind(&Name::parse("k").unwrap(), "v".into(), Attributes::new())
            .unwrap();

        assert_eq!(*counter.0.lock().unwrap(), 1);
        assert_eq!(
            first.lookup(&Name::parse("k").unwrap()).unwrap(),
            Binding::Object("v".to_string())
        );
    }

    #[test]
    fn distinct_roots_are_independent() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let registry: DirectoryRegistry<String> = DirectoryRegistry::new();

        let da = registry.open(StoreConfig::new(a.path())).unwrap();
        let db = registry.open(StoreConfig::new(b.path())).unwrap();
        assert!(!Arc::ptr_eq(da.store(), db.store()));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn close_forgets_namespace() {
        let tmp = tempfile::tempdir().unwrap();
        let registry: DirectoryRegistry<String> = DirectoryRegistry::new();
        let first = registry.open(StoreConfig::new(tmp.path())).unwrap();

        assert!(registry.close(tmp.path()).unwrap());
        assert!(!registry.close(tmp.path()).unwrap());
        assert!(registry.is_empty());

        let reopened = registry.open(StoreConfig::new(tmp.path())).unwrap();
        assert!(!Arc::ptr_eq(first.store(), reopened.store()));
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let registry: DirectoryRegistry<String> = DirectoryRegistry::new();
        let err = registry
            .open(StoreConfig::new(tmp.path().join("absent")))
            .unwrap_err();
        assert!(matches!(err, crate::DirectoryError::Store(StoreError::Storage { .. })));
    }
}
