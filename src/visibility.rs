//! Whether a product belongs in the production overview.

use crate::model::{Factory, Product, Settings};
use crate::reactive::{Computed, Runtime};

/// Everything the visibility rule looks at, sampled at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisibilityInputs {
    pub available: bool,
    pub show_all_products: bool,
    pub total_demand: f64,
    pub extra_good_amount: f64,
    pub trade_input: f64,
    pub trade_output: f64,
    pub is_construction_material: bool,
    /// Any factory producing the product has at least one constructed building.
    pub has_constructed_factory: bool,
}

impl VisibilityInputs {
    pub fn has_production(&self) -> bool {
        self.extra_good_amount > 0.0 || self.trade_input > 0.0 || self.trade_output > 0.0
    }
}

pub fn is_visible(inputs: &VisibilityInputs) -> bool {
    if !inputs.available {
        return false;
    }
    inputs.show_all_products
        || inputs.total_demand > 0.0
        || inputs.has_production()
        || (inputs.is_construction_material && inputs.has_constructed_factory)
}

/// Reactive wrapper around [`is_visible`] for one product.
pub(crate) fn visibility(
    runtime: &Runtime,
    product: &Product,
    producers: &[&Factory],
    settings: &Settings,
) -> Computed<bool> {
    let available = product.available;
    let is_construction_material = product.is_construction_material;
    let show_all = settings.show_all_products.clone();
    let total_demand = product.total_demand.clone();
    let extra_goods = product.extra_good_amount.clone();
    let (trade_input, trade_output) = (product.trade_input.clone(), product.trade_output.clone());
    let constructed: Vec<_> = producers
        .iter()
        .map(|f| f.buildings.constructed.clone())
        .collect();
    Computed::new(runtime, move || {
        if !available {
            return Ok(false);
        }
        let inputs = VisibilityInputs {
            available,
            show_all_products: show_all.get(),
            total_demand: total_demand.read()?,
            extra_good_amount: extra_goods.read()?,
            trade_input: trade_input.get(),
            trade_output: trade_output.get(),
            is_construction_material,
            has_constructed_factory: is_construction_material
                && constructed.iter().any(|c| c.get() > 0),
        };
        Ok(is_visible(&inputs))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden() -> VisibilityInputs {
        VisibilityInputs {
            available: true,
            ..Default::default()
        }
    }

    #[test]
    fn nothing_going_on_is_hidden() {
        assert!(!is_visible(&hidden()));
    }

    #[test]
    fn each_signal_alone_makes_visible() {
        let cases = [
            VisibilityInputs { show_all_products: true, ..hidden() },
            VisibilityInputs { total_demand: 0.1, ..hidden() },
            VisibilityInputs { extra_good_amount: 0.1, ..hidden() },
            VisibilityInputs { trade_input: 1.0, ..hidden() },
            VisibilityInputs { trade_output: 1.0, ..hidden() },
            VisibilityInputs {
                is_construction_material: true,
                has_constructed_factory: true,
                ..hidden()
            },
        ];
        for inputs in cases {
            assert!(is_visible(&inputs), "{inputs:?}");
        }
    }

    #[test]
    fn constructed_factory_only_counts_for_construction_materials() {
        let inputs = VisibilityInputs {
            has_constructed_factory: true,
            ..hidden()
        };
        assert!(!is_visible(&inputs));
    }

    #[test]
    fn unavailable_is_never_visible() {
        let inputs = VisibilityInputs {
            available: false,
            show_all_products: true,
            total_demand: 5.0,
            ..hidden()
        };
        assert!(!is_visible(&inputs));
    }
}
