//! The island's entity graph: catalog entities carrying reactive fields.

mod buff;
mod factory;
mod invariants;
mod island;
mod module;
mod population;
mod product;
mod settings;

pub use buff::{Buff, BuffOwner, OwnerKind};
pub use factory::{Factory, FactoryBuildings};
pub use invariants::InvariantViolation;
pub use island::{Asset, Island};
pub use module::{Module, ModuleBuildings};
pub use population::{Need, PopulationLevel, Residence, ResidenceBuildings, ResidenceNeed};
pub use product::{Consumer, Demand, Product};
pub use settings::Settings;

use crate::error::{ConfigurationError, RecomputeError};
use crate::id::Guid;

/// Production cycles per minute for a cycle time in seconds.
pub(crate) fn cycles_per_minute(guid: Guid, cycle_time: f64) -> Result<f64, RecomputeError> {
    if cycle_time > 0.0 && cycle_time.is_finite() {
        Ok(60.0 / cycle_time)
    } else {
        Err(ConfigurationError::InvalidCycleTime { guid, cycle_time }.into())
    }
}

/// Contribution of one entity to an aggregate.
///
/// A broken entity contributes its last good value (or nothing) so that
/// siblings keep updating; cycles still fail the aggregate.
pub(crate) fn contribution(result: Result<f64, RecomputeError>) -> Result<f64, RecomputeError> {
    match result {
        Ok(value) => Ok(value),
        Err(err @ RecomputeError::Cycle(_)) => Err(err),
        Err(_) => Ok(0.0),
    }
}
