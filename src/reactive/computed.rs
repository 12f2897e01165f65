use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::Readable;
use super::runtime::{Computation, NodeKind, Outcome, Runtime};
use crate::error::RecomputeError;
use crate::id::NodeId;

type Evaluator<T> = Box<dyn Fn() -> Result<T, RecomputeError>>;

/// Cached result of the last evaluations.
struct Slot<T> {
    /// Last good value.
    value: Option<T>,
    /// Error raised by the most recent evaluation, if it failed.
    error: Option<RecomputeError>,
}

impl<T: Clone> Slot<T> {
    fn current(&self, id: NodeId) -> Result<T, RecomputeError> {
        match (&self.error, &self.value) {
            // Structural faults are never masked by a stale value.
            (Some(err @ RecomputeError::Cycle(_)), _) => Err(err.clone()),
            (_, Some(value)) => Ok(value.clone()),
            (Some(err), None) => Err(err.clone()),
            (None, None) => Err(RecomputeError::NoValue(id)),
        }
    }
}

struct ComputedInner<T> {
    evaluator: Evaluator<T>,
    slot: RefCell<Slot<T>>,
}

impl<T: Clone + PartialEq + 'static> Computation for ComputedInner<T> {
    fn run(&self) -> Outcome {
        let result = (self.evaluator)();
        let mut slot = self.slot.borrow_mut();
        match result {
            Ok(value) => {
                let recovered = slot.error.take().is_some();
                if !recovered && slot.value.as_ref() == Some(&value) {
                    Outcome::Unchanged
                } else {
                    slot.value = Some(value);
                    Outcome::Changed
                }
            }
            Err(error) => {
                slot.error = Some(error.clone());
                Outcome::Failed(error)
            }
        }
    }
}

/// A memoized value derived from other reactive nodes.
///
/// Evaluation is lazy: nothing runs until the first read. Dependencies are
/// whatever the evaluator reads; they are re-recorded on every evaluation, so
/// conditional reads are tracked correctly. A failed evaluation keeps the last
/// good value, goes to the runtime's error sink and is retried on the next read.
pub struct Computed<T: 'static> {
    runtime: Runtime,
    id: NodeId,
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    pub fn new<F>(runtime: &Runtime, evaluator: F) -> Self
    where
        F: Fn() -> Result<T, RecomputeError> + 'static,
    {
        let inner = Rc::new(ComputedInner {
            evaluator: Box::new(evaluator),
            slot: RefCell::new(Slot {
                value: None,
                error: None,
            }),
        });
        let computation: Rc<dyn Computation> = inner.clone();
        Self {
            runtime: runtime.clone(),
            id: runtime.register(NodeKind::Derived, Some(computation)),
            inner,
        }
    }

    /// Up-to-date value, or the last good one if the latest evaluation failed.
    ///
    /// Errors only when there is no good value at all, or when this read
    /// closes a dependency cycle.
    pub fn read(&self) -> Result<T, RecomputeError> {
        if self.runtime.is_disposed() {
            return self.peek().ok_or(RecomputeError::Disposed);
        }
        if self.runtime.is_busy(self.id) {
            return Err(RecomputeError::Cycle(self.id));
        }
        self.runtime.track(self.id);
        self.runtime.refresh(self.id);
        self.inner.slot.borrow().current(self.id)
    }

    /// Cached value without tracking or recomputing.
    pub fn peek(&self) -> Option<T> {
        self.inner.slot.borrow().value.clone()
    }

    /// Error left by the most recent evaluation, if it failed.
    pub fn last_error(&self) -> Option<RecomputeError> {
        self.inner.slot.borrow().error.clone()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

impl<T: Clone + PartialEq + Default + 'static> Computed<T> {
    /// Infallible read for display code: falls back to `T::default()` when no
    /// good value exists. The failure itself was already reported to the sink.
    pub fn get(&self) -> T {
        self.read().unwrap_or_default()
    }
}

impl<T: Clone + PartialEq + 'static> Readable<T> for Computed<T> {
    fn node(&self) -> NodeId {
        self.id
    }

    fn read(&self) -> Result<T, RecomputeError> {
        Computed::read(self)
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.borrow();
        f.debug_struct("Computed")
            .field("id", &self.id)
            .field("value", &slot.value)
            .field("error", &slot.error)
            .finish()
    }
}
