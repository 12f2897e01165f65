//! Fine-grained reactive primitives.
//!
//! [`Observable`] cells hold state, [`Computed`] values derive from them with
//! automatically tracked dependencies, and a [`Subscription`] keeps a value hot
//! and listens to it. All nodes live in an explicit [`Runtime`].
//!
//! Writes mark direct dependents dirty and transitive ones as "check". After
//! the outermost [`Runtime::batch`] (or a lone write) subscribed nodes are
//! pulled back to a clean state; every node re-validates its sources before
//! deciding to recompute, so each one evaluates at most once per batch and
//! never sees a half-applied batch.

mod computed;
mod observable;
mod runtime;
mod subscription;

pub use computed::Computed;
pub use observable::Observable;
pub use runtime::{ErrorSink, Runtime, TracingSink};
pub use subscription::Subscription;

use crate::error::RecomputeError;
use crate::id::NodeId;

/// Anything a subscription can watch.
pub trait Readable<T> {
    fn node(&self) -> NodeId;

    /// Tracked read.
    fn read(&self) -> Result<T, RecomputeError>;
}
