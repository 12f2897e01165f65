use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::runtime::{NodeKind, Runtime};
use super::Readable;
use crate::error::RecomputeError;
use crate::id::NodeId;

/// A writable reactive cell.
///
/// Reads made while a computed is evaluating register a dependency. Writes
/// that change the value (by `PartialEq`) invalidate every dependent and, outside a
/// batch, settle the subscribed ones before `set` returns.
pub struct Observable<T: 'static> {
    runtime: Runtime,
    id: NodeId,
    value: Rc<RefCell<T>>,
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    pub fn new(runtime: &Runtime, value: T) -> Self {
        Self {
            runtime: runtime.clone(),
            id: runtime.register(NodeKind::Source, None),
            value: Rc::new(RefCell::new(value)),
        }
    }

    pub fn get(&self) -> T {
        self.runtime.track(self.id);
        self.get_untracked()
    }

    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Store `value`; a no-op when it equals the current value.
    pub fn set(&self, value: T) {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.runtime.source_changed(self.id);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get_untracked();
        f(&mut next);
        self.set(next);
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<T: Clone + PartialEq + 'static> Readable<T> for Observable<T> {
    fn node(&self) -> NodeId {
        self.id
    }

    fn read(&self) -> Result<T, RecomputeError> {
        Ok(self.get())
    }
}

impl<T: 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id)
            .field("value", &*self.value.borrow())
            .finish()
    }
}
