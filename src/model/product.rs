use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use super::contribution;
use crate::catalog::ProductDef;
use crate::error::ensure_finite;
use crate::id::Guid;
use crate::persist::{EntityField, FieldPath, Persistence};
use crate::reactive::{Computed, Observable, Runtime};

/// Who a demand entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consumer {
    Factory(Guid),
    Module { factory: Guid, module: Guid },
    ResidenceNeed { residence: Guid, need: Guid },
}

/// One consumer's reactive demand for a product, in units per minute.
#[derive(Debug, Clone)]
pub struct Demand {
    pub consumer: Consumer,
    pub amount: Computed<f64>,
}

#[derive(Debug, Clone)]
pub struct Product {
    pub guid: Guid,
    pub name: String,
    pub is_construction_material: bool,
    pub available: bool,
    demands: Rc<RefCell<Vec<Demand>>>,
    extra_goods: Rc<RefCell<Vec<Computed<f64>>>>,
    /// Units per minute bought in.
    pub trade_input: Observable<f64>,
    /// Units per minute sold off.
    pub trade_output: Observable<f64>,
    pub total_demand: Computed<f64>,
    pub extra_good_amount: Computed<f64>,
    /// Demand left for the main producer after trade and extra goods.
    pub remaining_demand: Computed<f64>,
    visible: Rc<OnceCell<Computed<bool>>>,
}

impl Product {
    pub(crate) fn new(runtime: &Runtime, persistence: &Persistence, def: &ProductDef) -> Self {
        let trade_input =
            persistence.observable(FieldPath::entity(def.guid, EntityField::TradeInputAmount), 0.0);
        let trade_output = persistence
            .observable(FieldPath::entity(def.guid, EntityField::TradeOutputAmount), 0.0);

        let demands: Rc<RefCell<Vec<Demand>>> = Rc::default();
        let total_demand = {
            let demands = Rc::clone(&demands);
            Computed::new(runtime, move || {
                // Cloned out so no borrow is held while consumers evaluate.
                let amounts: Vec<Computed<f64>> =
                    demands.borrow().iter().map(|d| d.amount.clone()).collect();
                let mut total = 0.0;
                for amount in &amounts {
                    total += contribution(amount.read())?;
                }
                ensure_finite("total demand", total)
            })
        };

        let extra_goods: Rc<RefCell<Vec<Computed<f64>>>> = Rc::default();
        let extra_good_amount = {
            let extra_goods = Rc::clone(&extra_goods);
            Computed::new(runtime, move || {
                let sources = extra_goods.borrow().clone();
                let mut total = 0.0;
                for source in &sources {
                    total += contribution(source.read())?;
                }
                ensure_finite("extra good amount", total)
            })
        };

        let remaining_demand = {
            let total_demand = total_demand.clone();
            let extra_good_amount = extra_good_amount.clone();
            let (trade_input, trade_output) = (trade_input.clone(), trade_output.clone());
            Computed::new(runtime, move || {
                let remaining = total_demand.read()? + trade_output.get()
                    - trade_input.get()
                    - extra_good_amount.read()?;
                ensure_finite("remaining demand", remaining.max(0.0))
            })
        };

        Self {
            guid: def.guid,
            name: def.name.clone(),
            is_construction_material: def.is_construction_material,
            available: def.available,
            demands,
            extra_goods,
            trade_input,
            trade_output,
            total_demand,
            extra_good_amount,
            remaining_demand,
            visible: Rc::default(),
        }
    }

    /// Add a consumer. Entries are never removed; a consumer that stops
    /// consuming drives its amount to 0.
    pub(crate) fn register_demand(&self, consumer: Consumer, amount: Computed<f64>) {
        tracing::trace!(product = %self.guid, ?consumer, "registering demand");
        self.demands.borrow_mut().push(Demand { consumer, amount });
    }

    pub(crate) fn register_extra_good(&self, amount: Computed<f64>) {
        self.extra_goods.borrow_mut().push(amount);
    }

    pub(crate) fn set_visibility(&self, visible: Computed<bool>) {
        if self.visible.set(visible).is_err() {
            tracing::warn!(product = %self.guid, "visibility already wired");
        }
    }

    /// Demand entries in registration order.
    pub fn demands(&self) -> Vec<Demand> {
        self.demands.borrow().clone()
    }

    pub fn total_demand(&self) -> f64 {
        self.total_demand.get()
    }

    pub fn extra_good_amount(&self) -> f64 {
        self.extra_good_amount.get()
    }

    pub fn has_production(&self) -> bool {
        self.extra_good_amount() > 0.0
            || self.trade_input.get() > 0.0
            || self.trade_output.get() > 0.0
    }

    pub fn visible(&self) -> bool {
        self.visible.get().is_some_and(|visible| visible.get())
    }

    pub fn visibility(&self) -> Option<&Computed<bool>> {
        self.visible.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStorage;

    fn timber(rt: &Runtime) -> Product {
        let persistence = Persistence::new(rt, Rc::new(MemoryStorage::new()), false);
        let def = ProductDef {
            guid: 1010,
            name: "Timber".to_string(),
            is_construction_material: true,
            available: true,
        };
        Product::new(rt, &persistence, &def)
    }

    #[test]
    fn total_demand_sums_registered_amounts() {
        let rt = Runtime::new();
        let product = timber(&rt);
        let a = Observable::new(&rt, 1.5);
        let b = Observable::new(&rt, 2.0);
        for (i, cell) in [a.clone(), b.clone()].into_iter().enumerate() {
            product.register_demand(
                Consumer::Factory(i as Guid),
                Computed::new(&rt, move || Ok(cell.get())),
            );
        }
        assert_eq!(product.total_demand(), 3.5);
        b.set(0.0);
        assert_eq!(product.total_demand(), 1.5);
        assert_eq!(product.demands().len(), 2);
        assert_eq!(product.demands()[1].consumer, Consumer::Factory(1));
    }

    #[test]
    fn remaining_demand_accounts_for_trade_and_extra_goods() {
        let rt = Runtime::new();
        let product = timber(&rt);
        product.register_demand(Consumer::Factory(1), Computed::new(&rt, || Ok(10.0)));
        product.register_extra_good(Computed::new(&rt, || Ok(2.0)));
        product.trade_output.set(1.0);
        product.trade_input.set(3.0);
        assert_eq!(product.remaining_demand.get(), 6.0);

        product.trade_input.set(20.0);
        assert_eq!(product.remaining_demand.get(), 0.0);
        assert!(product.has_production());
    }

    #[test]
    fn broken_consumer_does_not_poison_total() {
        let rt = Runtime::new();
        rt.set_error_sink(|_: crate::id::NodeId, _: &crate::error::RecomputeError| {});
        let product = timber(&rt);
        product.register_demand(Consumer::Factory(1), Computed::new(&rt, || Ok(4.0)));
        product.register_demand(
            Consumer::Factory(2),
            Computed::new(&rt, || ensure_finite("demand", f64::INFINITY)),
        );
        assert_eq!(product.total_demand(), 4.0);
    }

    #[test]
    fn invisible_until_wired() {
        let rt = Runtime::new();
        let product = timber(&rt);
        assert!(!product.visible());
        product.set_visibility(Computed::new(&rt, || Ok(true)));
        assert!(product.visible());
    }
}
