use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use dirstore_cache::EntryCache;
use dirstore_lock::{LockManager, LockOp};
use dirstore_types::{Binding, Duplicate, Name};

use crate::codec;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::layout::{self, Layout, TEMP_PREFIX};

/// Values the store can cache and persist.
pub trait Storable: Duplicate + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Storable for T where T: Duplicate + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// What [`ObjectStore::recursive_remove`] requires the name to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveKind {
    Object,
    Context,
}

/// One name deleted by [`ObjectStore::recursive_remove`], with what it held.
#[derive(Clone, Debug, PartialEq)]
pub struct Removed<O, A> {
    pub name: Name,
    /// `Binding::Context` for contexts; `None` if the object was unreadable.
    pub old_object: Option<Binding<O>>,
    pub old_attributes: Option<A>,
}

/// Entries of one context directory.
struct Listing {
    /// Segments bound in the context, from object files, directories and
    /// attribute markers.
    bound: BTreeSet<String>,
    /// Leftover temporary files.
    stray: Vec<PathBuf>,
}

/// Filesystem-backed store of objects `O` and attribute bundles `A`.
///
/// Every operation takes its lock through the store's [`LockManager`] and
/// releases it on all exit paths. Reads go through two bounded write-through
/// caches; writes land in a temporary sibling file that atomically replaces
/// the previous unit, so readers never see a partial write.
pub struct ObjectStore<O, A> {
    layout: Layout,
    config: StoreConfig,
    locks: LockManager,
    objects: EntryCache<O>,
    attributes: EntryCache<A>,
}

impl<O, A> ObjectStore<O, A> {
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn object_cache(&self) -> &EntryCache<O> {
        &self.objects
    }

    pub fn attribute_cache(&self) -> &EntryCache<A> {
        &self.attributes
    }
}

impl<O: Storable, A: Storable> ObjectStore<O, A> {
    /// Open the store rooted at `config.root`, which must be an existing
    /// directory. Temporary files left by interrupted writes are removed.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let root = fs::canonicalize(&config.root)
            .map_err(|e| StoreError::storage(&config.root, e))?;
        if !root.is_dir() {
            return Err(StoreError::storage(
                &root,
                io::Error::new(io::ErrorKind::InvalidInput, "store root is not a directory"),
            ));
        }

        let swept = sweep_temporaries(&root);
        info!(
            root = %root.display(),
            cache_size = config.cache_size,
            swept,
            "object store opened"
        );

        Ok(Self {
            layout: Layout::new(root),
            objects: EntryCache::new("objects", config.cache_size),
            attributes: EntryCache::new("attributes", config.cache_size),
            locks: LockManager::new(),
            config,
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The object bound at `name`, or [`Binding::Context`] if it is a context.
    pub fn get_object(&self, name: &Name) -> StoreResult<Binding<O>> {
        let _guard = self.locks.acquire(name, LockOp::Read);
        self.read_object(name)
    }

    /// The attribute bundle stored for `name`.
    pub fn get_attributes(&self, name: &Name) -> StoreResult<A> {
        let _guard = self.locks.acquire(name, LockOp::Read);
        self.read_attributes(name)
    }

    /// The bundles of every child of the context `name`, sorted by name.
    pub fn get_attribute_list(&self, name: &Name) -> StoreResult<Vec<(Name, A)>> {
        let _guard = self.locks.acquire(name, LockOp::List);

        let dir = self.layout.object_path(name);
        match probe(&dir)? {
            None => return Err(StoreError::NotFound(name.clone())),
            Some(meta) if !meta.is_dir() => return Err(StoreError::NotContext(name.clone())),
            Some(_) => {}
        }

        let corrupted = |source| StoreError::Corrupted {
            path: dir.clone(),
            source,
        };
        let mut children = Vec::new();
        for entry in fs::read_dir(&dir).map_err(corrupted)? {
            let entry = entry.map_err(corrupted)?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                warn!(dir = %dir.display(), "skipping non-UTF-8 entry");
                continue;
            };
            let Some(segment) = layout::marker_target(file_name) else {
                continue;
            };
            match name.child(segment) {
                Ok(child) => children.push(child),
                Err(e) => warn!(dir = %dir.display(), error = %e, "skipping unusable marker"),
            }
        }
        children.sort();

        let mut list = Vec::with_capacity(children.len());
        for child in children {
            let attributes = self.get_attributes(&child)?;
            list.push((child, attributes));
        }
        Ok(list)
    }

    fn read_object(&self, name: &Name) -> StoreResult<Binding<O>> {
        let key = layout::object_key(name);
        if let Some(object) = self.objects.lookup(&key) {
            debug!(name = %name, "object cache hit");
            return Ok(Binding::Object(object));
        }

        let path = self.layout.object_path(name);
        match probe(&path)? {
            None => return Err(StoreError::NotFound(name.clone())),
            Some(meta) if meta.is_dir() => return Ok(Binding::Context),
            Some(_) => {}
        }
        let object: O = read_unit(&path)?.ok_or_else(|| StoreError::NotFound(name.clone()))?;
        if let Err(e) = self.objects.load(&key, &object) {
            debug!(name = %name, error = %e, "object cache load skipped");
        }
        Ok(Binding::Object(object))
    }

    fn read_attributes(&self, name: &Name) -> StoreResult<A> {
        let key = layout::attributes_key(name);
        if let Some(attributes) = self.attributes.lookup(&key) {
            debug!(name = %name, "attribute cache hit");
            return Ok(attributes);
        }

        let path = self.layout.attributes_path(name);
        let attributes: A =
            read_unit(&path)?.ok_or_else(|| StoreError::NotFound(name.clone()))?;
        if let Err(e) = self.attributes.load(&key, &attributes) {
            debug!(name = %name, error = %e, "attribute cache load skipped");
        }
        Ok(attributes)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist `attributes` and then `object` at `name`.
    ///
    /// A leaf object must not exist yet unless `overwrite`, and must exist if
    /// `overwrite`. A `Binding::Context` object writes only the bundle. If
    /// either write fails, both units are restored to their previous state
    /// before the error is returned.
    pub fn put_object(
        &self,
        name: &Name,
        object: Option<&Binding<O>>,
        attributes: Option<&A>,
        overwrite: bool,
    ) -> StoreResult<()> {
        let leaf = object.and_then(Binding::as_object);
        if name.is_root() && leaf.is_some() {
            return Err(StoreError::Unsupported(
                "cannot bind an object to the root".to_string(),
            ));
        }

        let _guard = self.locks.acquire(name, LockOp::Write);
        if let Some(parent) = name.parent() {
            self.require_context(&parent)?;
        }

        let object_path = self.layout.object_path(name);
        if leaf.is_some() {
            match probe(&object_path)? {
                Some(meta) if meta.is_dir() => return Err(StoreError::IsContext(name.clone())),
                Some(_) if !overwrite => return Err(StoreError::AlreadyBound(name.clone())),
                None if overwrite => return Err(StoreError::NotFound(name.clone())),
                _ => {}
            }
        }

        let attributes_path = self.layout.attributes_path(name);
        let previous_attributes = match attributes {
            Some(_) => read_bytes(&attributes_path)?,
            None => None,
        };
        let previous_object = match leaf {
            Some(_) => read_bytes(&object_path)?,
            None => None,
        };

        let written = self.write_pair(name, leaf, attributes);
        if let Err(e) = written {
            warn!(name = %name, error = %e, "write failed; rolling back");
            if attributes.is_some() {
                self.attributes.unload(&layout::attributes_key(name));
                self.restore(&attributes_path, previous_attributes);
            }
            if leaf.is_some() {
                self.objects.unload(&layout::object_key(name));
                self.restore(&object_path, previous_object);
            }
            return Err(e);
        }
        debug!(name = %name, overwrite, "object stored");
        Ok(())
    }

    fn write_pair(&self, name: &Name, object: Option<&O>, attributes: Option<&A>) -> StoreResult<()> {
        if let Some(attributes) = attributes {
            self.write_unit(&self.layout.attributes_path(name), attributes)?;
            refresh_cache(&self.attributes, &layout::attributes_key(name), attributes);
        }
        if let Some(object) = object {
            self.write_unit(&self.layout.object_path(name), object)?;
            refresh_cache(&self.objects, &layout::object_key(name), object);
        }
        Ok(())
    }

    /// Create the context `name` with `attributes`. Returns whether a new
    /// context was created.
    ///
    /// If the context already exists its bundle is re-read into the cache
    /// (or written from `attributes` when it has none) and nothing else
    /// changes.
    pub fn create_context(&self, name: &Name, attributes: &A) -> StoreResult<bool> {
        let _guard = self.locks.acquire(name, LockOp::Write);

        let path = self.layout.object_path(name);
        let attributes_path = self.layout.attributes_path(name);
        let key = layout::attributes_key(name);

        match probe(&path)? {
            Some(meta) if meta.is_dir() => {
                match read_unit::<A>(&attributes_path)? {
                    Some(existing) => refresh_cache(&self.attributes, &key, &existing),
                    None => {
                        self.write_unit(&attributes_path, attributes)?;
                        refresh_cache(&self.attributes, &key, attributes);
                    }
                }
                debug!(name = %name, "context already exists");
                return Ok(false);
            }
            Some(_) => return Err(StoreError::AlreadyBound(name.clone())),
            None => {}
        }
        if let Some(parent) = name.parent() {
            self.require_context(&parent)?;
        }

        fs::create_dir(&path).map_err(|e| StoreError::storage(&path, e))?;
        if let Err(e) = self.write_unit(&attributes_path, attributes) {
            if let Err(undo) = fs::remove_dir(&path) {
                warn!(name = %name, error = %undo, "could not remove half-created context");
            }
            return Err(e);
        }
        refresh_cache(&self.attributes, &key, attributes);
        info!(name = %name, "context created");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Removal and rename
    // -----------------------------------------------------------------------

    /// Delete `name` and, for a context, everything below it.
    ///
    /// Returns one entry per deleted name, descendants before their parent.
    pub fn recursive_remove(
        &self,
        name: &Name,
        must_be: RemoveKind,
    ) -> StoreResult<Vec<Removed<O, A>>> {
        if name.is_root() {
            return Err(StoreError::Unsupported("cannot remove the root".to_string()));
        }
        let _guard = self.locks.acquire(name, LockOp::Delete);

        let object = probe(&self.layout.object_path(name))?;
        let has_attributes = probe(&self.layout.attributes_path(name))?.is_some();
        if object.is_none() && !has_attributes {
            return Err(StoreError::NotFound(name.clone()));
        }
        let is_context = object.is_some_and(|meta| meta.is_dir());
        match (must_be, is_context) {
            (RemoveKind::Object, true) => return Err(StoreError::IsContext(name.clone())),
            (RemoveKind::Context, false) => return Err(StoreError::NotContext(name.clone())),
            _ => {}
        }

        let mut removed = Vec::new();
        self.remove_entry(name, &mut removed)?;
        info!(name = %name, count = removed.len(), "removed");
        Ok(removed)
    }

    fn remove_entry(&self, name: &Name, out: &mut Vec<Removed<O, A>>) -> StoreResult<()> {
        let path = self.layout.object_path(name);
        let is_context = path.is_dir();
        if is_context {
            let listing = scan_context(&path)?;
            for segment in &listing.bound {
                self.remove_entry(&name.child(segment.as_str())?, out)?;
            }
            for stray in &listing.stray {
                if let Err(e) = remove_file_if_exists(stray) {
                    warn!(path = %stray.display(), error = %e, "could not remove temporary file");
                }
            }
        }

        let object_key = layout::object_key(name);
        let attributes_key = layout::attributes_key(name);
        let attributes_path = self.layout.attributes_path(name);

        let old_attributes = self
            .attributes
            .lookup(&attributes_key)
            .or_else(|| salvage(&attributes_path));
        let old_object = if is_context {
            Some(Binding::Context)
        } else {
            self.objects
                .lookup(&object_key)
                .or_else(|| salvage(&path))
                .map(Binding::Object)
        };
        self.objects.unload(&object_key);
        self.attributes.unload(&attributes_key);

        if is_context {
            fs::remove_dir(&path).map_err(|e| StoreError::storage(&path, e))?;
        } else {
            remove_file_if_exists(&path).map_err(|e| StoreError::storage(&path, e))?;
        }
        remove_file_if_exists(&attributes_path)
            .map_err(|e| StoreError::storage(&attributes_path, e))?;

        debug!(name = %name, is_context, "entry removed");
        out.push(Removed {
            name: name.clone(),
            old_object,
            old_attributes,
        });
        Ok(())
    }

    /// Rename `src` to `dst` within one context.
    ///
    /// Takes DELETE on `src` and then WRITE on `dst`. The attribute bundle
    /// moves first; if moving the object fails the bundle is moved back.
    pub fn rename_object(&self, src: &Name, dst: &Name) -> StoreResult<()> {
        if src.is_root() || dst.is_root() {
            return Err(StoreError::Unsupported("cannot rename the root".to_string()));
        }
        if src.parent() != dst.parent() {
            return Err(StoreError::Unsupported(format!(
                "cannot rename {src} to {dst} across contexts"
            )));
        }
        if src == dst {
            return Err(StoreError::AlreadyBound(dst.clone()));
        }

        let _src_guard = self.locks.acquire(src, LockOp::Delete);
        let _dst_guard = self.locks.acquire(dst, LockOp::Write);

        let src_object = self.layout.object_path(src);
        let dst_object = self.layout.object_path(dst);
        let src_attributes = self.layout.attributes_path(src);
        let dst_attributes = self.layout.attributes_path(dst);

        let object = probe(&src_object)?;
        let has_attributes = probe(&src_attributes)?.is_some();
        if object.is_none() && !has_attributes {
            return Err(StoreError::NotFound(src.clone()));
        }
        if probe(&dst_object)?.is_some() || probe(&dst_attributes)?.is_some() {
            return Err(StoreError::AlreadyBound(dst.clone()));
        }
        let is_context = object.as_ref().is_some_and(|meta| meta.is_dir());

        move_unit_pair(
            has_attributes.then_some((src_attributes.as_path(), dst_attributes.as_path())),
            object.is_some().then_some((src_object.as_path(), dst_object.as_path())),
            |from, to| fs::rename(from, to),
        )?;

        migrate(&self.objects, &layout::object_key(src), &layout::object_key(dst));
        migrate(&self.attributes, &layout::attributes_key(src), &layout::attributes_key(dst));
        if is_context {
            let prefix = layout::object_key(src);
            let evicted = self.objects.unload_prefix(&prefix) + self.attributes.unload_prefix(&prefix);
            debug!(src = %src, evicted, "evicted cached descendants");
        }

        info!(src = %src, dst = %dst, is_context, "renamed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // File helpers
    // -----------------------------------------------------------------------

    fn require_context(&self, name: &Name) -> StoreResult<()> {
        match probe(&self.layout.object_path(name))? {
            None => Err(StoreError::NotFound(name.clone())),
            Some(meta) if !meta.is_dir() => Err(StoreError::NotContext(name.clone())),
            Some(_) => Ok(()),
        }
    }

    fn write_unit<T: Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let bytes = codec::encode(value).map_err(|e| StoreError::codec(path, e))?;
        self.write_bytes(path, &bytes)
    }

    /// Write `bytes` to a temporary sibling and atomically move it over `path`.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let dir = path.parent().unwrap_or(self.layout.root());
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| StoreError::storage(dir, e))?;
        tmp.write_all(bytes).map_err(|e| StoreError::storage(path, e))?;
        if self.config.sync_writes {
            tmp.as_file().sync_all().map_err(|e| StoreError::storage(path, e))?;
        }
        tmp.persist(path).map_err(|e| StoreError::storage(path, e.error))?;
        Ok(())
    }

    /// Put back the bytes a unit had before a failed write, or delete it if
    /// it did not exist.
    fn restore(&self, path: &Path, previous: Option<Vec<u8>>) {
        let outcome = match previous {
            Some(bytes) => self.write_bytes(path, &bytes),
            None => remove_file_if_exists(path).map_err(|e| StoreError::storage(path, e)),
        };
        if let Err(e) = outcome {
            warn!(path = %path.display(), error = %e, "rollback failed");
        }
    }
}

impl<O, A> std::fmt::Debug for ObjectStore<O, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("root", &self.layout.root())
            .field("config", &self.config)
            .finish()
    }
}

fn probe(path: &Path) -> StoreResult<Option<fs::Metadata>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::storage(path, e)),
    }
}

fn read_bytes(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::storage(path, e)),
    }
}

fn read_unit<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    read_bytes(path)?
        .map(|bytes| codec::decode(&bytes).map_err(|e| StoreError::codec(path, e)))
        .transpose()
}

/// Best-effort read of a unit that is about to be deleted.
fn salvage<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match read_unit(path) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "dropping unreadable unit");
            None
        }
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn refresh_cache<V: Duplicate>(cache: &EntryCache<V>, key: &str, value: &V) {
    if let Err(e) = cache.refresh(key, value) {
        debug!(cache = cache.label(), key, error = %e, "cache refresh skipped");
    }
}

/// Move a cached value to a new key.
fn migrate<V: Duplicate>(cache: &EntryCache<V>, from: &str, to: &str) {
    if let Some(value) = cache.lookup(from) {
        cache.unload(from);
        refresh_cache(cache, to, &value);
    }
}

fn scan_context(dir: &Path) -> StoreResult<Listing> {
    let corrupted = |source| StoreError::Corrupted {
        path: dir.to_path_buf(),
        source,
    };
    let mut listing = Listing {
        bound: BTreeSet::new(),
        stray: Vec::new(),
    };
    for entry in fs::read_dir(dir).map_err(corrupted)? {
        let entry = entry.map_err(corrupted)?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            warn!(dir = %dir.display(), "skipping non-UTF-8 entry");
            continue;
        };
        if layout::is_internal(file_name) {
            if layout::is_temporary(file_name) {
                listing.stray.push(entry.path());
            }
        } else if let Some(segment) = layout::marker_target(file_name) {
            listing.bound.insert(segment.to_string());
        } else {
            listing.bound.insert(file_name.to_string());
        }
    }
    Ok(listing)
}

/// Delete temporary files left anywhere under `root`. Returns how many.
fn sweep_temporaries(root: &Path) -> usize {
    let mut swept = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_temp = entry.file_name().to_str().is_some_and(layout::is_temporary);
        if !is_temp {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => swept += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "could not sweep temporary file"),
        }
    }
    if swept > 0 {
        warn!(swept, "removed temporary files left by interrupted writes");
    }
    swept
}

/// Move an attribute bundle and then its object. When the object cannot be
/// moved the bundle is put back where it was.
fn move_unit_pair<F>(
    attributes: Option<(&Path, &Path)>,
    object: Option<(&Path, &Path)>,
    rename: F,
) -> StoreResult<()>
where
    F: Fn(&Path, &Path) -> io::Result<()>,
{
    if let Some((from, to)) = attributes {
        rename(from, to).map_err(|e| StoreError::storage(from, e))?;
    }
    let Some((from, to)) = object else {
        return Ok(());
    };
    if let Err(e) = rename(from, to) {
        if let Some((bundle_from, bundle_to)) = attributes {
            if let Err(undo) = rename(bundle_to, bundle_from) {
                warn!(
                    bundle = %bundle_to.display(),
                    error = %undo,
                    "could not restore attribute bundle"
                );
            }
        }
        return Err(StoreError::storage(from, e));
    }
    Ok(())
}
