//! The lock tree and the [`LockManager`] built on it.
//!
//! Nodes live in an arena addressed by [`NodeId`]; slot 0 is the root and is
//! never freed. All tree mutation, pruning included, happens under the single
//! tree mutex. Each node owns a condition variable that waiters block on
//! while parked at that node.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::{debug, warn};

use dirstore_types::Name;

use crate::op::LockOp;

/// Stable index of a node in the lock arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

/// Per-operation counters, indexed by [`LockOp::index`].
#[derive(Debug, Default)]
struct OpCounters {
    /// Callers that intend to operate at or below this node.
    reserved: [usize; LockOp::COUNT],
    /// Callers currently walking through or executing at this node.
    active: [usize; LockOp::COUNT],
    /// Granted locks targeting exactly this node.
    held: [usize; LockOp::COUNT],
}

impl OpCounters {
    fn reserved_total(&self) -> usize {
        self.reserved.iter().sum()
    }

    fn active_total(&self) -> usize {
        self.active.iter().sum()
    }

    fn held_total(&self) -> usize {
        self.held.iter().sum()
    }

    fn holds_exclusive(&self) -> bool {
        self.held[LockOp::Write.index()] > 0 || self.held[LockOp::Delete.index()] > 0
    }
}

#[derive(Debug)]
struct LockNode {
    children: HashMap<String, NodeId>,
    counters: OpCounters,
    cond: Arc<Condvar>,
}

impl LockNode {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            counters: OpCounters::default(),
            cond: Arc::new(Condvar::new()),
        }
    }
}

#[derive(Debug)]
struct LockTree {
    nodes: Vec<Option<LockNode>>,
    free: Vec<NodeId>,
}

impl LockTree {
    fn new() -> Self {
        Self {
            nodes: vec![Some(LockNode::new())],
            free: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> &LockNode {
        self.nodes[id.0]
            .as_ref()
            .expect("lock node referenced after it was freed")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut LockNode {
        self.nodes[id.0]
            .as_mut()
            .expect("lock node referenced after it was freed")
    }

    fn alloc(&mut self) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = Some(LockNode::new());
                id
            }
            None => {
                self.nodes.push(Some(LockNode::new()));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Resolve `name` without creating anything.
    fn find(&self, name: &Name) -> Option<NodeId> {
        let mut current = ROOT;
        for segment in name.segments() {
            current = *self.node(current).children.get(segment)?;
        }
        Some(current)
    }

    /// First pass of `lock`: reserve `op` on every node from the root down to
    /// `name`, creating missing nodes. Returns the visited path.
    fn reserve(&mut self, name: &Name, op: LockOp) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(name.len() + 1);
        let mut current = ROOT;
        self.node_mut(current).counters.reserved[op.index()] += 1;
        path.push(current);

        for segment in name.segments() {
            let next = match self.node(current).children.get(segment) {
                Some(id) => *id,
                None => {
                    let id = self.alloc();
                    self.node_mut(current).children.insert(segment.clone(), id);
                    id
                }
            };
            self.node_mut(next).counters.reserved[op.index()] += 1;
            path.push(next);
            current = next;
        }
        path
    }

    /// A node holding WRITE or DELETE blocks everything; a node holding only
    /// READ/LIST blocks WRITE and DELETE.
    fn is_blocked(&self, id: NodeId, op: LockOp) -> bool {
        let counters = &self.node(id).counters;
        if counters.held_total() == 0 {
            return false;
        }
        op.is_exclusive() || counters.holds_exclusive()
    }

    fn is_scope_blocked(&self, id: NodeId, op: LockOp) -> bool {
        let node = self.node(id);
        match op {
            // The caller's own `active` increment has already been applied.
            LockOp::Delete => node.counters.active_total() > 1,
            LockOp::List => node
                .children
                .values()
                .any(|child| self.node(*child).counters.holds_exclusive()),
            LockOp::Read | LockOp::Write => false,
        }
    }

    /// Detach `segment` from `parent` and free the whole subtree below it.
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

    fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Tree-structured lock manager.
///
/// See the crate docs for the compatibility rules. `lock` blocks
/// indefinitely; every wait re-checks its predicate after waking.
#[derive(Debug)]
pub struct LockManager {
    tree: Mutex<LockTree>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(LockTree::new()),
        }
    }

    fn tree(&self) -> MutexGuard<'_, LockTree> {
        self.tree.lock().expect("lock tree poisoned")
    }

    /// Acquire `op` on `name`, blocking until it is compatible with every
    /// lock already granted.
    pub fn lock(&self, name: &Name, op: LockOp) {
        debug!(name = %name, op = %op, "locking");
        let mut tree = self.tree();

        let path = tree.reserve(name, op);
        let target = path.len() - 1;

        for (depth, &id) in path.iter().enumerate() {
            tree.node_mut(id).counters.active[op.index()] += 1;

            // The root is only checked when it is the target itself.
            if depth == 0 && target != 0 {
                continue;
            }
            let at_target = depth == target;
            loop {
                let blocked = tree.is_blocked(id, op)
                    || (at_target && tree.is_scope_blocked(id, op));
                if !blocked {
                    break;
                }
                debug!(name = %name, op = %op, depth, "waiting");
                let cond = Arc::clone(&tree.node(id).cond);
                tree = cond.wait(tree).expect("lock tree poisoned");
            }
        }

        tree.node_mut(path[target]).counters.held[op.index()] += 1;
        debug!(name = %name, op = %op, "locked");
    }

    /// Release `op` on `name`.
    ///
    /// Must pair with an earlier [`lock`](Self::lock) of the same name and
    /// operation. The first node on the path whose reservations drop to zero
    /// is pruned together with its subtree.
    pub fn unlock(&self, name: &Name, op: LockOp) {
        debug!(name = %name, op = %op, "unlocking");
        let mut tree = self.tree();

        let mut current = ROOT;
        {
            let counters = &mut tree.node_mut(current).counters;
            counters.reserved[op.index()] = counters.reserved[op.index()].saturating_sub(1);
            counters.active[op.index()] = counters.active[op.index()].saturating_sub(1);
        }
        let mut walked = vec![current];
        let mut pruned = false;

        for segment in name.segments() {
            let Some(&next) = tree.node(current).children.get(segment) else {
                warn!(name = %name, op = %op, "unlock of a name that holds no lock");
                return;
            };
            let counters = &mut tree.node_mut(next).counters;
            counters.reserved[op.index()] = counters.reserved[op.index()].saturating_sub(1);
            counters.active[op.index()] = counters.active[op.index()].saturating_sub(1);

            if counters.reserved_total() == 0 {
                debug!(name = %name, segment = %segment, "pruning lock subtree");
                tree.prune(current, segment);
                pruned = true;
                break;
            }
            current = next;
            walked.push(current);
        }

        if !pruned {
            let held = &mut tree.node_mut(current).counters.held[op.index()];
            *held = held.saturating_sub(1);
        }

        // Waiters park on the node whose state blocks them, and every node
        // whose counters changed lies on the walked path.
        for id in walked {
            tree.node(id).cond.notify_all();
        }
        debug!(name = %name, op = %op, "unlocked");
    }

    /// Acquire `op` on `name` and release it when the guard drops.
    pub fn acquire(&self, name: &Name, op: LockOp) -> LockGuard<'_> {
        self.lock(name, op);
        LockGuard {
            manager: self,
            name: name.clone(),
            op,
        }
    }

    // ---------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------

    /// Number of live lock nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.tree().live_nodes()
    }

    /// Whether a lock node currently exists for `name`.
    pub fn is_tracked(&self, name: &Name) -> bool {
        self.tree().find(name).is_some()
    }

    /// Granted `op` locks at exactly `name`.
    pub fn held(&self, name: &Name, op: LockOp) -> usize {
        let tree = self.tree();
        tree.find(name)
            .map_or(0, |id| tree.node(id).counters.held[op.index()])
    }

    /// Callers currently active at `name` for `op`.
    pub fn active(&self, name: &Name, op: LockOp) -> usize {
        let tree = self.tree();
        tree.find(name)
            .map_or(0, |id| tree.node(id).counters.active[op.index()])
    }

    /// Outstanding `op` reservations at `name`.
    pub fn reserved(&self, name: &Name, op: LockOp) -> usize {
        let tree = self.tree();
        tree.find(name)
            .map_or(0, |id| tree.node(id).counters.reserved[op.index()])
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII handle for a granted lock; unlocks on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    name: Name,
    op: LockOp,
}

impl LockGuard<'_> {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn op(&self) -> LockOp {
        self.op
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.unlock(&self.name, self.op);
    }
}
