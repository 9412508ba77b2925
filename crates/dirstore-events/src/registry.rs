//! The event registry tree and synchronous dispatch.
//!
//! Like the lock tree, the registry is an arena of nodes addressed by
//! [`NodeId`], with slot 0 as the permanent root, all behind one mutex.
//! Every node counts the listeners registered at or below it
//! (`dependency`); the first node on a path whose count reaches zero is
//! detached together with its subtree.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use dirstore_types::Name;

use crate::event::{EventKind, NamingEvent, Scope};
use crate::listener::{same_listener, ListenerMatch, NamingListener};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

struct Registration<P> {
    listener: Arc<dyn NamingListener<P>>,
    scope: Scope,
}

struct EventNode<P> {
    children: HashMap<String, NodeId>,
    /// Registration order is delivery order.
    registrations: Vec<Registration<P>>,
    dependency: usize,
}

impl<P> EventNode<P> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            registrations: Vec::new(),
            dependency: 0,
        }
    }

    /// Remove `listener` if registered here. Returns how many were removed.
    fn remove_listener(&mut self, listener: &Arc<dyn NamingListener<P>>) -> usize {
        let before = self.registrations.len();
        self.registrations
            .retain(|reg| !same_listener(&reg.listener, listener));
        before - self.registrations.len()
    }
}

struct EventTree<P> {
    nodes: Vec<Option<EventNode<P>>>,
    free: Vec<NodeId>,
}

impl<P> EventTree<P> {
    fn new() -> Self {
        Self {
            nodes: vec![Some(EventNode::new())],
            free: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> &EventNode<P> {
        self.nodes[id.0]
            .as_ref()
            .expect("event node referenced after it was freed")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut EventNode<P> {
        self.nodes[id.0]
            .as_mut()
            .expect("event node referenced after it was freed")
    }

    fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        self.node(parent).children.get(segment).copied()
    }

    fn find(&self, name: &Name) -> Option<NodeId> {
        let mut current = ROOT;
        for segment in name.segments() {
            current = self.child(current, segment)?;
        }
        Some(current)
    }

    fn find_or_create(&mut self, name: &Name) -> NodeId {
        let mut current = ROOT;
        for segment in name.segments() {
            current = match self.child(current, segment) {
                Some(id) => id,
                None => {
                    let id = match self.free.pop() {
                        Some(id) => {
                            self.nodes[id.0] = Some(EventNode::new());
                            id
                        }
                        None => {
                            self.nodes.push(Some(EventNode::new()));
                            NodeId(self.nodes.len() - 1)
                        }
                    };
                    self.node_mut(current).children.insert(segment.clone(), id);
                    id
                }
            };
        }
        current
    }

    /// Detach `segment` from `parent` and free its subtree.
    fn prune(&mut self, parent: NodeId, segment: &str) {
        let Some(id) = self.node_mut(parent).children.remove(segment) else {
            return;
        };
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes[id.0].take() {
                stack.extend(node.children.into_values());
                self.free.push(id);
            }
        }
    }

    /// Drop `count` dependencies from the root down to `name`, pruning the
    /// first node that becomes unreferenced.
    fn release(&mut self, name: &Name, count: usize) {
        let root = self.node_mut(ROOT);
        root.dependency = root.dependency.saturating_sub(count);

        let mut parent = ROOT;
        for segment in name.segments() {
            let Some(id) = self.child(parent, segment) else {
                return;
            };
            let node = self.node_mut(id);
            node.dependency = node.dependency.saturating_sub(count);
            if node.dependency == 0 {
                debug!(name = %name, segment = %segment, "pruning event subtree");
                self.prune(parent, segment);
                return;
            }
            parent = id;
        }
    }

    fn collect(
        &self,
        id: NodeId,
        scope: Scope,
        kind: EventKind,
        registered_at: &Name,
        relative: &Name,
        out: &mut Vec<ListenerMatch<P>>,
    ) {
        for reg in &self.node(id).registrations {
            if reg.scope == scope && reg.listener.interest().accepts(kind) {
                out.push(ListenerMatch {
                    listener: Arc::clone(&reg.listener),
                    registered_at: registered_at.clone(),
                    relative: relative.clone(),
                });
            }
        }
    }
}

/// Scoped listener registry for one namespace.
pub struct EventRegistry<P> {
    tree: Mutex<EventTree<P>>,
}

impl<P> EventRegistry<P> {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(EventTree::new()),
        }
    }

    fn tree(&self) -> MutexGuard<'_, EventTree<P>> {
        self.tree.lock().expect("event tree poisoned")
    }

    /// Register `listener` at `name` with `scope`.
    ///
    /// Re-registering the same listener (same `Arc` allocation) at the same
    /// name replaces its previous scope and moves it to the end of the
    /// delivery order.
    pub fn register(&self, name: &Name, scope: Scope, listener: Arc<dyn NamingListener<P>>) {
        let mut tree = self.tree();
        let target = tree.find_or_create(name);

        let node = tree.node_mut(target);
        let replaced = node.remove_listener(&listener) > 0;
        node.registrations.push(Registration { listener, scope });

        if !replaced {
            let mut current = ROOT;
            tree.node_mut(current).dependency += 1;
            for segment in name.segments() {
                current = tree
                    .child(current, segment)
                    .expect("path created above");
                tree.node_mut(current).dependency += 1;
            }
        }
        debug!(name = %name, scope = ?scope, replaced, "listener registered");
    }

    /// Remove `listener` from `name`. Returns the number of registrations
    /// removed (0 or 1).
    pub fn remove(&self, name: &Name, listener: &Arc<dyn NamingListener<P>>) -> usize {
        let mut tree = self.tree();
        let Some(target) = tree.find(name) else {
            return 0;
        };
        let removed = tree.node_mut(target).remove_listener(listener);
        if removed > 0 {
            tree.release(name, removed);
        }
        debug!(name = %name, removed, "listener removed");
        removed
    }

    /// Remove every listener registered exactly at `name`.
    pub fn remove_all(&self, name: &Name) -> usize {
        let mut tree = self.tree();
        let Some(target) = tree.find(name) else {
            return 0;
        };
        let node = tree.node_mut(target);
        let removed = node.registrations.len();
        node.registrations.clear();
        if removed > 0 {
            tree.release(name, removed);
        }
        debug!(name = %name, removed, "listeners removed");
        removed
    }

    /// Listeners that must fire for a `kind` mutation at `changed`.
    ///
    /// Walks from the root to `changed`. At every level SUBTREE
    /// registrations match; at the direct parent ONELEVEL registrations
    /// match; at `changed` itself OBJECT registrations match. Each match is
    /// kept only if the listener's interest accepts `kind`.
    pub fn get_listeners(&self, changed: &Name, kind: EventKind) -> Vec<ListenerMatch<P>> {
        let tree = self.tree();
        let mut matches = Vec::new();
        let mut current = ROOT;

        for depth in 0..=changed.len() {
            if depth > 0 {
                let segment = &changed.segments()[depth - 1];
                match tree.child(current, segment) {
                    Some(id) => current = id,
                    None => break,
                }
            }
            let registered_at = changed.prefix(depth);
            let relative = changed
                .strip_prefix(&registered_at)
                .expect("prefix of the changed name");

            tree.collect(current, Scope::Subtree, kind, &registered_at, &relative, &mut matches);
            match changed.len() - depth {
                0 => tree.collect(current, Scope::Object, kind, &registered_at, &relative, &mut matches),
                1 => tree.collect(current, Scope::OneLevel, kind, &registered_at, &relative, &mut matches),
                _ => {}
            }
        }
        matches
    }

    /// Look up the matching listeners and deliver `payload` to them.
    ///
    /// The registry lock is released before any listener runs, so listeners
    /// may register or remove listeners themselves.
    pub fn fire(&self, changed: &Name, kind: EventKind, payload: &P) -> DispatchReport
    where
        P: Clone,
    {
        let matches = self.get_listeners(changed, kind);
        dispatch(&matches, kind, changed, payload)
    }

    // ---------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------

    /// Number of live registry nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.tree().nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether a registry node exists for `name`.
    pub fn contains(&self, name: &Name) -> bool {
        self.tree().find(name).is_some()
    }

    /// Listeners registered exactly at `name`.
    pub fn listener_count(&self, name: &Name) -> usize {
        let tree = self.tree();
        tree.find(name)
            .map_or(0, |id| tree.node(id).registrations.len())
    }

    /// Listeners registered at or below `name`.
    pub fn dependency(&self, name: &Name) -> usize {
        let tree = self.tree();
        tree.find(name).map_or(0, |id| tree.node(id).dependency)
    }
}

impl<P> Default for EventRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for EventRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("node_count", &self.node_count())
            .finish()
    }
}

/// Outcome of delivering one event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver an event to `matches` in order.
///
/// Each listener runs synchronously. An `Err` or a panic is logged and
/// counted; delivery continues with the next listener.
pub fn dispatch<P: Clone>(
    matches: &[ListenerMatch<P>],
    kind: EventKind,
    changed: &Name,
    payload: &P,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for m in matches {
        let event = NamingEvent {
            kind,
            changed: changed.clone(),
            source: m.registered_at.clone(),
            relative: m.relative.clone(),
            payload: payload.clone(),
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| m.listener.handle(&event)));
        match outcome {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(e)) => {
                warn!(changed = %changed, source = %m.registered_at, kind = %kind, error = %e, "listener failed");
                report.failed += 1;
            }
            Err(_) => {
                warn!(changed = %changed, source = %m.registered_at, kind = %kind, "listener panicked");
                report.failed += 1;
            }
        }
    }
    report
}
