use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use dirstore_events::{EventKind, EventRegistry, NamingListener, Scope};
use dirstore_store::{ObjectStore, RemoveKind, Removed, Storable, StoreConfig, StoreError};
use dirstore_types::{AttrValue, Attributes, Binding, Name};

use crate::change::Change;
use crate::error::{DirectoryError, DirectoryResult};

/// Attribute stamped with the bound value's type name.
pub const CLASSNAME: &str = "classname";

/// Attribute stamped with the write time in Unix milliseconds.
pub const MODIFICATION_TIME: &str = "modificationtime";

/// `classname` of contexts.
pub const CONTEXT_CLASS: &str = "context";

/// Listener receiving directory events.
pub type ChangeListener<O> = Arc<dyn NamingListener<Change<O>>>;

/// A view of one context in a namespace.
///
/// Names passed to a `Directory` are relative to its context. Cloning is
/// cheap; clones share the store and the listeners.
pub struct Directory<O> {
    store: Arc<ObjectStore<O, Attributes>>,
    events: Arc<EventRegistry<Change<O>>>,
    context: Name,
}

impl<O> Clone for Directory<O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            context: self.context.clone(),
        }
    }
}

impl<O> std::fmt::Debug for Directory<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("root", &self.store.root())
            .field("context", &self.context.to_string())
            .finish()
    }
}

impl<O: Storable + Clone> Directory<O> {
    /// Open a standalone namespace and return its root directory.
    ///
    /// The root gets an attribute bundle on first open. Use a
    /// [`DirectoryRegistry`](crate::DirectoryRegistry) to share one namespace
    /// between several callers.
    pub fn open(config: StoreConfig) -> DirectoryResult<Self> {
        let store = Arc::new(ObjectStore::open(config)?);
        let root = Self {
            store,
            events: Arc::new(EventRegistry::new()),
            context: Name::root(),
        };
        root.store
            .create_context(&Name::root(), &stamp(Attributes::new(), CONTEXT_CLASS))?;
        Ok(root)
    }

    /// Absolute name of this directory's context.
    pub fn context_name(&self) -> &Name {
        &self.context
    }

    pub fn store(&self) -> &Arc<ObjectStore<O, Attributes>> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventRegistry<Change<O>>> {
        &self.events
    }

    fn at(&self, context: Name) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            context,
        }
    }

    fn resolve(&self, name: &Name) -> Name {
        self.context.join(name)
    }

    fn resolve_non_empty(&self, name: &Name) -> DirectoryResult<Name> {
        if name.is_root() {
            return Err(DirectoryError::EmptyName);
        }
        Ok(self.resolve(name))
    }

    fn notify(&self, changed: &Name, kind: EventKind, change: Change<O>) {
        let report = self.events.fire(changed, kind, &change);
        if report.delivered + report.failed > 0 {
            debug!(
                changed = %changed,
                kind = %kind,
                delivered = report.delivered,
                failed = report.failed,
                "event dispatched"
            );
        }
    }

    // ---- Reads ----

    /// The binding at `name`; [`Binding::Context`] for contexts.
    pub fn lookup(&self, name: &Name) -> DirectoryResult<Binding<O>> {
        Ok(self.store.get_object(&self.resolve(name))?)
    }

    /// The sub-directory at `name`.
    pub fn lookup_context(&self, name: &Name) -> DirectoryResult<Self> {
        let full = self.resolve(name);
        match self.store.get_object(&full)? {
            Binding::Context => Ok(self.at(full)),
            Binding::Object(_) => Err(StoreError::NotContext(full).into()),
        }
    }

    pub fn attributes(&self, name: &Name) -> DirectoryResult<Attributes> {
        Ok(self.store.get_attributes(&self.resolve(name))?)
    }

    /// Children of the context `name`: segment and `classname`, sorted.
    pub fn list(&self, name: &Name) -> DirectoryResult<Vec<(String, Option<String>)>> {
        let children = self.store.get_attribute_list(&self.resolve(name))?;
        Ok(children
            .into_iter()
            .map(|(child, attributes)| {
                let segment = child.last().unwrap_or_default().to_string();
                let class = attributes
                    .first(CLASSNAME)
                    .and_then(AttrValue::as_str)
                    .map(str::to_string);
                (segment, class)
            })
            .collect())
    }

    // ---- Mutations ----

    /// Bind `object` at a name that is not bound yet.
    pub fn bind(&self, name: &Name, object: O, attributes: Attributes) -> DirectoryResult<()> {
        let full = self.resolve_non_empty(name)?;
        let attributes = stamp(attributes, std::any::type_name::<O>());
        let binding = Binding::Object(object);

        self.store
            .put_object(&full, Some(&binding), Some(&attributes), false)?;
        self.notify(&full, EventKind::ObjectAdded, Change::added(binding));
        Ok(())
    }

    /// Bind `object` at `name`, replacing any object already there.
    pub fn rebind(&self, name: &Name, object: O, attributes: Attributes) -> DirectoryResult<()> {
        let full = self.resolve_non_empty(name)?;
        let old = match self.store.get_object(&full) {
            Ok(binding) => Some(binding),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let attributes = stamp(attributes, std::any::type_name::<O>());
        let binding = Binding::Object(object);

        self.store
            .put_object(&full, Some(&binding), Some(&attributes), old.is_some())?;
        match old {
            Some(old) => self.notify(&full, EventKind::ObjectChanged, Change::changed(old, binding)),
            None => self.notify(&full, EventKind::ObjectAdded, Change::added(binding)),
        }
        Ok(())
    }

    /// Remove the object at `name`. Unbinding an unbound name succeeds.
    pub fn unbind(&self, name: &Name) -> DirectoryResult<()> {
        let full = self.resolve_non_empty(name)?;
        let removed = match self.store.recursive_remove(&full, RemoveKind::Object) {
            Ok(removed) => removed,
            Err(e) if e.is_not_found() => {
                debug!(name = %full, "unbind of unbound name");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        for entry in removed {
            if entry.old_object.is_some() {
                self.notify(
                    &entry.name,
                    EventKind::ObjectRemoved,
                    Change::removed(entry.old_object, entry.old_attributes),
                );
            }
        }
        self.events.remove_all(&full);
        Ok(())
    }

    /// Create the context `name`, along with any missing intermediate
    /// contexts, and return it.
    pub fn create_subcontext(&self, name: &Name, attributes: Attributes) -> DirectoryResult<Self> {
        let full = self.resolve_non_empty(name)?;
        for depth in self.context.len() + 1..=full.len() {
            let prefix = full.prefix(depth);
            let bundle = if depth == full.len() {
                stamp(attributes.clone(), CONTEXT_CLASS)
            } else {
                stamp(Attributes::new(), CONTEXT_CLASS)
            };
            if self.store.create_context(&prefix, &bundle)? {
                self.notify(&prefix, EventKind::ObjectAdded, Change::added(Binding::Context));
            }
        }
        Ok(self.at(full))
    }

    /// Remove the context `name` and everything below it.
    pub fn destroy_subcontext(&self, name: &Name) -> DirectoryResult<()> {
        let full = self.resolve_non_empty(name)?;
        let removed = match self.store.recursive_remove(&full, RemoveKind::Context) {
            Ok(removed) => removed,
            Err(e) if e.is_not_found() => {
                debug!(name = %full, "destroy of missing context");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        for Removed {
            name,
            old_object,
            old_attributes,
        } in removed
        {
            self.notify(
                &name,
                EventKind::ObjectRemoved,
                Change::removed(old_object, old_attributes),
            );
            self.events.remove_all(&name);
        }
        Ok(())
    }

    /// Rename `src` to `dst`; both must live in the same context.
    pub fn rename(&self, src: &Name, dst: &Name) -> DirectoryResult<()> {
        let from = self.resolve_non_empty(src)?;
        let to = self.resolve_non_empty(dst)?;
        self.store.rename_object(&from, &to)?;
        self.notify(&from, EventKind::ObjectRenamed, Change::renamed(to));
        Ok(())
    }

    // ---- Listeners ----

    pub fn add_listener(&self, name: &Name, scope: Scope, listener: ChangeListener<O>) {
        self.events.register(&self.resolve(name), scope, listener);
    }

    /// Returns whether the listener was registered at `name`.
    pub fn remove_listener(&self, name: &Name, listener: &ChangeListener<O>) -> bool {
        self.events.remove(&self.resolve(name), listener) > 0
    }
}

/// Set `classname` and `modificationtime` on a bundle about to be written.
fn stamp(mut attributes: Attributes, class: &str) -> Attributes {
    attributes.put(CLASSNAME, class);
    attributes.put(MODIFICATION_TIME, Utc::now().timestamp_millis());
    attributes
}
