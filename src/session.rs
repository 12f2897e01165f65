use std::rc::Rc;

use crate::catalog::Catalog;
use crate::config::{Bundle, SessionConfig};
use crate::model::{InvariantViolation, Island};
use crate::persist::{MemoryStorage, Persistence, Storage};
use crate::reactive::Runtime;

/// One loaded island: its reactive graph, entities and persisted state.
///
/// Dropping the session disposes the whole graph at once.
pub struct Session {
    runtime: Runtime,
    persistence: Persistence,
    island: Island,
    config: SessionConfig,
}

impl Session {
    pub fn open(catalog: &Catalog, storage: Rc<dyn Storage>, config: SessionConfig) -> Self {
        let runtime = Runtime::new();
        let persistence = Persistence::new(&runtime, storage, config.write_through);
        let island = Island::build(&runtime, catalog, &persistence);
        warn_stray_keys(&island, persistence.storage().as_ref());
        tracing::debug!(
            nodes = runtime.node_count(),
            bindings = persistence.binding_count(),
            "session opened"
        );
        Self {
            runtime,
            persistence,
            island,
            config,
        }
    }

    /// Open a session over an in-memory copy of the bundle's persisted state.
    pub fn from_bundle(bundle: &Bundle, config: SessionConfig) -> Self {
        let storage = Rc::new(MemoryStorage::from_map(bundle.persisted.clone()));
        Self::open(&bundle.catalog, storage, config)
    }

    pub fn island(&self) -> &Island {
        &self.island
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn storage(&self) -> &Rc<dyn Storage> {
        self.persistence.storage()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Apply several edits as one propagation batch.
    pub fn batch<R>(&self, f: impl FnOnce(&Island) -> R) -> R {
        self.runtime.batch(|| f(&self.island))
    }

    pub fn verify_invariants(&self) -> Vec<InvariantViolation> {
        self.island.verify_invariants(self.config.tolerance)
    }
}

fn warn_stray_keys(island: &Island, storage: &dyn Storage) {
    match storage.keys() {
        Ok(keys) => {
            for key in island.stray_keys(keys.iter().map(String::as_str)) {
                tracing::warn!(key = %key, "persisted key names no entity on this island");
            }
        }
        Err(error) => tracing::warn!(error = %error, "could not list persisted keys"),
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(nodes = self.runtime.node_count(), "session closed");
        self.runtime.dispose();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("runtime", &self.runtime)
            .field("persistence", &self.persistence)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Owns the single live session and replaces it wholesale on island switch.
#[derive(Debug, Default)]
pub struct Controller {
    current: Option<Session>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the current session, then open one for `catalog`.
    pub fn switch_island(
        &mut self,
        catalog: &Catalog,
        storage: Rc<dyn Storage>,
        config: SessionConfig,
    ) -> &Session {
        if self.current.take().is_some() {
            tracing::debug!("switching island");
        }
        self.current.insert(Session::open(catalog, storage, config))
    }

    pub fn session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn close(&mut self) {
        self.current = None;
    }
}
