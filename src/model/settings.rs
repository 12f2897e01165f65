use crate::persist::{FieldPath, Persistence, Setting};
use crate::reactive::Observable;

/// Session-wide settings shared by every entity of the island.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Show every available product, regardless of demand or production.
    pub show_all_products: Observable<bool>,
    /// Multiplier applied to all population consumption.
    pub consumption_factor: Observable<f64>,
}

impl Settings {
    pub(crate) fn load(persistence: &Persistence) -> Self {
        Self {
            show_all_products: persistence
                .observable(FieldPath::Setting(Setting::ShowAllProducts), false),
            consumption_factor: persistence
                .observable(FieldPath::Setting(Setting::ConsumptionFactor), 1.0),
        }
    }
}
