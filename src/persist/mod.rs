//! Persisted field values: typed keys, storage adapters, hydration and write-through.

mod jsonl;
mod path;
mod storage;

pub use jsonl::JsonlStorage;
pub use path::{EntityField, FieldPath, FieldValue, Setting};
pub use storage::{MemoryStorage, Storage};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::PersistenceError;
use crate::reactive::{Observable, Runtime, Subscription};

/// Creates persisted observables: hydrates them from storage and, when
/// write-through is on, writes every later change back under the same key.
pub struct Persistence {
    runtime: Runtime,
    storage: Rc<dyn Storage>,
    write_through: bool,
    bindings: RefCell<Vec<Subscription>>,
    hydrated: Cell<usize>,
}

impl Persistence {
    pub fn new(runtime: &Runtime, storage: Rc<dyn Storage>, write_through: bool) -> Self {
        Self {
            runtime: runtime.clone(),
            storage,
            write_through,
            bindings: RefCell::new(Vec::new()),
            hydrated: Cell::new(0),
        }
    }

    /// New observable for `path`, starting from the stored value if there is a
    /// valid one, `default` otherwise.
    pub fn observable<T>(&self, path: FieldPath, default: T) -> Observable<T>
    where
        T: FieldValue + Clone + PartialEq + 'static,
    {
        let initial = match self.load(&path) {
            Ok(Some(value)) => {
                self.hydrated.set(self.hydrated.get() + 1);
                value
            }
            Ok(None) => default,
            Err(error) => {
                tracing::warn!(key = %path, error = %error, "ignoring persisted value");
                default
            }
        };
        let cell = Observable::new(&self.runtime, initial);
        if self.write_through {
            self.bind(path, &cell);
        }
        cell
    }

    fn load<T: FieldValue>(&self, path: &FieldPath) -> Result<Option<T>, PersistenceError> {
        let key = path.to_string();
        match self.storage.get(&key)? {
            None => Ok(None),
            Some(raw) => match T::parse_field(&raw) {
                Some(value) => Ok(Some(value)),
                None => Err(PersistenceError::Malformed { key, value: raw }),
            },
        }
    }

    fn bind<T>(&self, path: FieldPath, cell: &Observable<T>)
    where
        T: FieldValue + Clone + PartialEq + 'static,
    {
        let storage = Rc::clone(&self.storage);
        let key = path.to_string();
        let subscription = self.runtime.subscribe(cell, move |value: &T| {
            if let Err(error) = storage.set(&key, &value.to_field()) {
                tracing::warn!(key = %key, error = %error, "failed to persist value");
            }
        });
        self.bindings.borrow_mut().push(subscription);
    }

    /// Number of fields that started from a stored value.
    pub fn hydrated_count(&self) -> usize {
        self.hydrated.get()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn storage(&self) -> &Rc<dyn Storage> {
        &self.storage
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("write_through", &self.write_through)
            .field("bindings", &self.binding_count())
            .field("hydrated", &self.hydrated_count())
            .finish()
    }
}
