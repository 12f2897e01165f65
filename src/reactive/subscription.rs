use std::cell::RefCell;
use std::rc::Rc;

use super::Readable;
use super::runtime::{Computation, NodeKind, Outcome, Runtime};
use crate::id::NodeId;

struct Watcher<T, R> {
    source: R,
    last: RefCell<Option<T>>,
    listener: RefCell<Box<dyn FnMut(&T)>>,
}

impl<T, R> Computation for Watcher<T, R>
where
    T: Clone + PartialEq + 'static,
    R: Readable<T>,
{
    fn run(&self) -> Outcome {
        let value = match self.source.read() {
            Ok(value) => value,
            Err(error) => return Outcome::Failed(error),
        };
        let previous = self.last.borrow_mut().replace(value.clone());
        match previous {
            // First run only primes the cache.
            None => {}
            Some(previous) if previous == value => {}
            Some(_) => (self.listener.borrow_mut())(&value),
        }
        Outcome::Unchanged
    }
}

/// An eager observer of one reactive value.
///
/// While alive, its source is kept up to date after every batch and the
/// listener runs once per batch in which the value changed. Dropping the
/// subscription detaches it from the graph.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    runtime: Runtime,
    id: NodeId,
}

impl Subscription {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.runtime.remove_node(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Runtime {
    /// Subscribe `listener` to changes of `source`.
    ///
    /// The source is evaluated immediately; the listener is not called for
    /// that initial value.
    pub fn subscribe<T, R>(&self, source: &R, listener: impl FnMut(&T) + 'static) -> Subscription
    where
        T: Clone + PartialEq + 'static,
        R: Readable<T> + Clone + 'static,
    {
        let watcher: Rc<dyn Computation> = Rc::new(Watcher {
            source: source.clone(),
            last: RefCell::new(None),
            listener: RefCell::new(Box::new(listener)),
        });
        let id = self.register(NodeKind::Effect, Some(watcher));
        self.refresh(id);
        Subscription {
            runtime: self.clone(),
            id,
        }
    }

    /// Keep `source` hot without listening to it.
    pub fn watch<T, R>(&self, source: &R) -> Subscription
    where
        T: Clone + PartialEq + 'static,
        R: Readable<T> + Clone + 'static,
    {
        self.subscribe(source, |_: &T| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Computed, Observable};
    use std::cell::Cell;

    #[test]
    fn listener_fires_once_per_batch() {
        let rt = Runtime::new();
        let width = Observable::new(&rt, 2);
        let height = Observable::new(&rt, 3);
        let runs = Rc::new(Cell::new(0));
        let area = {
            let (width, height) = (width.clone(), height.clone());
            let runs = runs.clone();
            Computed::new(&rt, move || {
                runs.set(runs.get() + 1);
                Ok(width.get() * height.get())
            })
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            rt.subscribe(&area, move |v: &i32| seen.borrow_mut().push(*v))
        };
        assert_eq!(runs.get(), 1);

        rt.batch(|| {
            width.set(4);
            height.set(5);
        });
        assert_eq!(runs.get(), 2);
        assert_eq!(*seen.borrow(), vec![20]);
    }

    #[test]
    fn unbatched_writes_settle_immediately() {
        let rt = Runtime::new();
        let a = Observable::new(&rt, 1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            rt.subscribe(&a, move |v: &i32| seen.borrow_mut().push(*v))
        };
        a.set(2);
        a.set(3);
        assert_eq!(*seen.borrow(), vec![2, 3]);
    }

    #[test]
    fn nested_batches_flush_once() {
        let rt = Runtime::new();
        let a = Observable::new(&rt, 0);
        let count = Rc::new(Cell::new(0));
        let _sub = {
            let count = count.clone();
            rt.subscribe(&a, move |_: &i32| count.set(count.get() + 1))
        };
        rt.batch(|| {
            a.set(1);
            rt.batch(|| a.set(2));
            assert_eq!(count.get(), 0);
            a.set(3);
        });
        assert_eq!(count.get(), 1);
        assert_eq!(a.get(), 3);
    }

    #[test]
    fn batch_reverting_value_does_not_notify() {
        let rt = Runtime::new();
        let a = Observable::new(&rt, 1);
        let doubled = {
            let a = a.clone();
            Computed::new(&rt, move || Ok(a.get() * 2))
        };
        let count = Rc::new(Cell::new(0));
        let _sub = {
            let count = count.clone();
            rt.subscribe(&doubled, move |_: &i32| count.set(count.get() + 1))
        };
        rt.batch(|| {
            a.set(5);
            a.set(1);
        });
        assert_eq!(count.get(), 0);
        assert_eq!(doubled.get(), 2);
    }

    #[test]
    fn dropped_subscription_detaches() {
        let rt = Runtime::new();
        let a = Observable::new(&rt, 1);
        let count = Rc::new(Cell::new(0));
        let sub = {
            let count = count.clone();
            rt.subscribe(&a, move |_: &i32| count.set(count.get() + 1))
        };
        let before = rt.node_count();
        drop(sub);
        assert_eq!(rt.node_count(), before - 1);
        a.set(2);
        assert_eq!(count.get(), 0);
        assert!(rt.observers_of(a.id()).is_empty());
    }
}
