#[macro_use]
mod macros;

pub mod catalog;
pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod persist;
pub mod reactive;
pub mod session;
pub mod visibility;

pub use catalog::Catalog;
pub use config::{Bundle, SessionConfig};
pub use error::{ConfigurationError, Error, PersistenceError, RecomputeError, Result};
pub use id::{Guid, IdGenerator, NodeId};
pub use model::{Factory, Island, Product};
pub use reactive::{Computed, Observable, Runtime, Subscription};
pub use session::{Controller, Session};
