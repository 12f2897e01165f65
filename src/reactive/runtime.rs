use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::RecomputeError;
use crate::id::{IdGenerator, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Writable cell. Never evaluated.
    Source,
    /// Memoized value with an evaluator.
    Derived,
    /// Eager observer owned by a `Subscription`.
    Effect,
}

/// Freshness of a node. Ordered so that marking only ever raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NodeState {
    Clean,
    /// Some transitive source changed; re-validate direct sources before recomputing.
    Check,
    /// A direct source changed.
    Dirty,
}

pub(crate) enum Outcome {
    Changed,
    Unchanged,
    Failed(RecomputeError),
}

/// Type-erased evaluation step of a derived or effect node.
pub(crate) trait Computation {
    fn run(&self) -> Outcome;
}

/// Receives every failure raised by an evaluator.
pub trait ErrorSink {
    fn report(&self, node: NodeId, error: &RecomputeError);
}

impl<F> ErrorSink for F
where
    F: Fn(NodeId, &RecomputeError),
{
    fn report(&self, node: NodeId, error: &RecomputeError) {
        self(node, error)
    }
}

/// Default sink: log and move on.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, node: NodeId, error: &RecomputeError) {
        tracing::warn!(node = %node, error = %error, "recompute failed, keeping last good value");
    }
}

struct Node {
    kind: NodeKind,
    state: NodeState,
    computing: bool,
    checking: bool,
    /// Last evaluation failed; re-run on the next read.
    failed: bool,
    evaluations: u64,
    sources: Vec<NodeId>,
    observers: Vec<NodeId>,
    computation: Option<Rc<dyn Computation>>,
}

impl Node {
    fn new(kind: NodeKind, computation: Option<Rc<dyn Computation>>) -> Self {
        let state = match kind {
            NodeKind::Source => NodeState::Clean,
            NodeKind::Derived | NodeKind::Effect => NodeState::Dirty,
        };
        Self {
            kind,
            state,
            computing: false,
            checking: false,
            failed: false,
            evaluations: 0,
            sources: Vec::new(),
            observers: Vec::new(),
            computation,
        }
    }

    fn busy(&self) -> bool {
        self.computing || self.checking
    }
}

struct Inner {
    ids: RefCell<IdGenerator>,
    nodes: RefCell<BTreeMap<NodeId, Node>>,
    /// One frame per evaluation in progress; each collects the nodes read so far.
    tracking: RefCell<Vec<Vec<NodeId>>>,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
    pending: RefCell<Vec<NodeId>>,
    sink: RefCell<Rc<dyn ErrorSink>>,
    evaluations: Cell<u64>,
    disposed: Cell<bool>,
}

/// Single-threaded reactive graph.
///
/// Cloning yields another handle to the same graph. There is no ambient
/// runtime: every observable and computed is created against an explicit
/// `Runtime`, usually the one owned by the current session.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<Inner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                ids: RefCell::new(IdGenerator::new()),
                nodes: RefCell::new(BTreeMap::new()),
                tracking: RefCell::new(Vec::new()),
                batch_depth: Cell::new(0),
                flushing: Cell::new(false),
                pending: RefCell::new(Vec::new()),
                sink: RefCell::new(Rc::new(TracingSink)),
                evaluations: Cell::new(0),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn set_error_sink(&self, sink: impl ErrorSink + 'static) {
        *self.inner.sink.borrow_mut() = Rc::new(sink);
    }

    /// Run `f` as one propagation batch: dependents settle once, after `f` returns.
    ///
    /// Batches nest; only the outermost one flushes.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let out = {
            let _guard = BatchGuard::enter(self);
            f()
        };
        if self.inner.batch_depth.get() == 0 {
            self.flush();
        }
        out
    }

    /// Run `f` without recording any dependency for the evaluation in progress.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.tracking.borrow_mut().push(Vec::new());
        let out = f();
        self.inner.tracking.borrow_mut().pop();
        out
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.borrow().len()
    }

    /// Total number of derived-node evaluations since creation.
    pub fn evaluation_count(&self) -> u64 {
        self.inner.evaluations.get()
    }

    /// Evaluations per live derived node since creation.
    pub fn evaluations_by_node(&self) -> BTreeMap<NodeId, u64> {
        self.inner
            .nodes
            .borrow()
            .iter()
            .filter(|(_, node)| node.kind == NodeKind::Derived)
            .map(|(id, node)| (*id, node.evaluations))
            .collect()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Drop every node, releasing the evaluators (and the handles they capture).
    ///
    /// Handles that outlive this call read their cached values but never
    /// recompute again.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let nodes = std::mem::take(&mut *self.inner.nodes.borrow_mut());
        self.inner.pending.borrow_mut().clear();
        tracing::debug!(
            nodes = nodes.len(),
            issued = self.inner.ids.borrow().issued(),
            "reactive graph disposed"
        );
        drop(nodes);
    }

    pub(crate) fn register(
        &self,
        kind: NodeKind,
        computation: Option<Rc<dyn Computation>>,
    ) -> NodeId {
        let id = self.inner.ids.borrow_mut().next_id();
        if !self.is_disposed() {
            self.inner
                .nodes
                .borrow_mut()
                .insert(id, Node::new(kind, computation));
        }
        id
    }

    pub(crate) fn remove_node(&self, id: NodeId) {
        let mut nodes = self.inner.nodes.borrow_mut();
        let Some(node) = nodes.remove(&id) else {
            return;
        };
        for source in &node.sources {
            if let Some(src) = nodes.get_mut(source) {
                src.observers.retain(|o| *o != id);
            }
        }
        for observer in &node.observers {
            if let Some(obs) = nodes.get_mut(observer) {
                obs.sources.retain(|s| *s != id);
            }
        }
        drop(nodes);
        self.inner.pending.borrow_mut().retain(|p| *p != id);
    }

    /// Record a read of `id` by the evaluation currently in progress, if any.
    pub(crate) fn track(&self, id: NodeId) {
        if let Some(frame) = self.inner.tracking.borrow_mut().last_mut() {
            if !frame.contains(&id) {
                frame.push(id);
            }
        }
    }

    /// True while `id` is evaluating or re-validating its sources; reading it
    /// again at that point means the graph has a cycle.
    pub(crate) fn is_busy(&self, id: NodeId) -> bool {
        self.inner.nodes.borrow().get(&id).is_some_and(Node::busy)
    }

    /// A source node has a new value.
    pub(crate) fn source_changed(&self, id: NodeId) {
        if self.is_disposed() {
            return;
        }
        let observers = match self.inner.nodes.borrow().get(&id) {
            Some(node) => node.observers.clone(),
            None => return,
        };
        for observer in observers {
            self.mark(observer, NodeState::Dirty);
        }
        if self.inner.batch_depth.get() == 0 {
            self.flush();
        }
    }

    /// Raise `id` to `state`; the first time a node leaves `Clean`, its own
    /// observers are raised to `Check` and effects are queued.
    fn mark(&self, id: NodeId, state: NodeState) {
        let mut nodes = self.inner.nodes.borrow_mut();
        let mut stack = vec![(id, state)];
        while let Some((id, state)) = stack.pop() {
            let Some(node) = nodes.get_mut(&id) else {
                continue;
            };
            if node.state >= state {
                continue;
            }
            let was_clean = node.state == NodeState::Clean;
            node.state = state;
            if was_clean {
                if node.kind == NodeKind::Effect {
                    self.inner.pending.borrow_mut().push(id);
                }
                stack.extend(node.observers.iter().map(|o| (*o, NodeState::Check)));
            }
        }
    }

    fn flush(&self) {
        if self.inner.flushing.replace(true) {
            return;
        }
        loop {
            let next = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if next.is_empty() {
                break;
            }
            for id in next {
                self.refresh(id);
            }
        }
        self.inner.flushing.set(false);
    }

    /// Bring `id` up to date, recomputing it at most once.
    pub(crate) fn refresh(&self, id: NodeId) {
        let (state, failed, sources) = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let Some(node) = nodes.get_mut(&id) else {
                return;
            };
            if node.busy() || node.kind == NodeKind::Source {
                return;
            }
            if node.state == NodeState::Check {
                node.checking = true;
            }
            (node.state, node.failed, node.sources.clone())
        };

        if state == NodeState::Check {
            for source in sources {
                if self.is_busy(source) {
                    // The source is further up our own call stack.
                    self.set_state(id, NodeState::Dirty);
                    break;
                }
                self.refresh(source);
                if self.state_of(id) == Some(NodeState::Dirty) {
                    break;
                }
            }
            if let Some(node) = self.inner.nodes.borrow_mut().get_mut(&id) {
                node.checking = false;
            }
        }

        if failed || self.state_of(id) == Some(NodeState::Dirty) {
            self.recompute(id);
        } else {
            self.set_state(id, NodeState::Clean);
        }
    }

    fn recompute(&self, id: NodeId) {
        let (computation, kind) = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let Some(node) = nodes.get_mut(&id) else {
                return;
            };
            node.computing = true;
            if node.kind == NodeKind::Derived {
                node.evaluations += 1;
            }
            (node.computation.clone(), node.kind)
        };
        let Some(computation) = computation else {
            self.set_state(id, NodeState::Clean);
            return;
        };

        if kind == NodeKind::Derived {
            self.inner.evaluations.set(self.inner.evaluations.get() + 1);
        }
        tracing::trace!(node = %id, "recomputing");

        self.inner.tracking.borrow_mut().push(Vec::new());
        let outcome = computation.run();
        let sources = self.inner.tracking.borrow_mut().pop().unwrap_or_default();

        let (changed_observers, failure) = {
            let mut nodes = self.inner.nodes.borrow_mut();
            let old_sources = match nodes.get_mut(&id) {
                Some(node) => std::mem::replace(&mut node.sources, sources.clone()),
                None => return,
            };
            for stale in old_sources.iter().filter(|s| !sources.contains(s)) {
                if let Some(src) = nodes.get_mut(stale) {
                    src.observers.retain(|o| *o != id);
                }
            }
            for fresh in sources.iter().filter(|s| !old_sources.contains(s)) {
                if let Some(src) = nodes.get_mut(fresh) {
                    src.observers.push(id);
                }
            }

            let Some(node) = nodes.get_mut(&id) else {
                return;
            };
            node.computing = false;
            node.state = NodeState::Clean;
            node.failed = matches!(outcome, Outcome::Failed(_));
            match outcome {
                Outcome::Changed => (node.observers.clone(), None),
                Outcome::Unchanged => (Vec::new(), None),
                Outcome::Failed(error) => (Vec::new(), Some(error)),
            }
        };

        if let Some(error) = failure {
            let sink = self.inner.sink.borrow().clone();
            sink.report(id, &error);
        }
        for observer in changed_observers {
            self.mark(observer, NodeState::Dirty);
        }
    }

    fn state_of(&self, id: NodeId) -> Option<NodeState> {
        self.inner.nodes.borrow().get(&id).map(|n| n.state)
    }

    fn set_state(&self, id: NodeId, state: NodeState) {
        if let Some(node) = self.inner.nodes.borrow_mut().get_mut(&id) {
            node.state = state;
        }
    }

    #[cfg(test)]
    pub(crate) fn observers_of(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .nodes
            .borrow()
            .get(&id)
            .map(|n| n.observers.clone())
            .unwrap_or_default()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("nodes", &self.node_count())
            .field("evaluations", &self.evaluation_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct BatchGuard<'a> {
    runtime: &'a Runtime,
}

impl<'a> BatchGuard<'a> {
    fn enter(runtime: &'a Runtime) -> Self {
        let depth = &runtime.inner.batch_depth;
        depth.set(depth.get() + 1);
        Self { runtime }
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let depth = &self.runtime.inner.batch_depth;
        depth.set(depth.get() - 1);
    }
}
