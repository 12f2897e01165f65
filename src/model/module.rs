use super::buff::Buff;
use super::cycles_per_minute;
use crate::catalog::{ModuleDef, ProductAmount};
use crate::error::ensure_finite;
use crate::id::Guid;
use crate::reactive::{Computed, Observable, Runtime};

#[derive(Debug, Clone)]
pub struct ModuleBuildings {
    /// Mirrors the parent's utilized buildings while equipped, 0 otherwise.
    pub constructed: Computed<f64>,
}

/// An optional attachment of one factory.
#[derive(Debug, Clone)]
pub struct Module {
    pub guid: Guid,
    pub name: String,
    pub factory: Guid,
    pub cycle_time: f64,
    pub inputs: Vec<ProductAmount>,
    pub checked: Observable<bool>,
    pub buildings: ModuleBuildings,
    /// Same node as the parent factory's boost.
    pub boost: Computed<f64>,
    pub triggered_buffs: Vec<Buff>,
}

impl Module {
    pub(crate) fn new(
        runtime: &Runtime,
        factory: Guid,
        def: &ModuleDef,
        checked: Observable<bool>,
        triggered_buffs: Vec<Buff>,
        utilized: &Computed<f64>,
        boost: &Computed<f64>,
    ) -> Self {
        let constructed = {
            let checked = checked.clone();
            let utilized = utilized.clone();
            Computed::new(runtime, move || {
                if checked.get() {
                    utilized.read()
                } else {
                    Ok(0.0)
                }
            })
        };
        Self {
            guid: def.guid,
            name: def.name.clone(),
            factory,
            cycle_time: def.cycle_time,
            inputs: def.inputs.clone(),
            checked,
            buildings: ModuleBuildings { constructed },
            boost: boost.clone(),
            triggered_buffs,
        }
    }

    /// Demand of this module for one of its inputs, per minute.
    pub(crate) fn input_demand(&self, runtime: &Runtime, input: ProductAmount) -> Computed<f64> {
        let constructed = self.buildings.constructed.clone();
        let boost = self.boost.clone();
        let (guid, cycle_time) = (self.guid, self.cycle_time);
        Computed::new(runtime, move || {
            let cycles = cycles_per_minute(guid, cycle_time)?;
            ensure_finite(
                "module demand",
                constructed.read()? * cycles * input.amount * boost.read()?,
            )
        })
    }

    pub fn checked(&self) -> bool {
        self.checked.get()
    }

    pub fn set_checked(&self, checked: bool) {
        self.checked.set(checked);
    }

    pub fn constructed(&self) -> f64 {
        self.buildings.constructed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fertiliser() -> ModuleDef {
        ModuleDef {
            guid: 25000,
            name: "Fertiliser".to_string(),
            cycle_time: 300.0,
            inputs: vec![ProductAmount {
                product: 1200,
                amount: 1.0,
            }],
            buffs: Vec::new(),
        }
    }

    #[test]
    fn constructed_mirrors_utilized_while_checked() {
        let rt = Runtime::new();
        let utilized = Observable::new(&rt, 5.0);
        let utilized_c = {
            let utilized = utilized.clone();
            Computed::new(&rt, move || Ok(utilized.get()))
        };
        let boost = Computed::new(&rt, || Ok(1.0));
        let checked = Observable::new(&rt, false);
        let module = Module::new(&rt, 1, &fertiliser(), checked, Vec::new(), &utilized_c, &boost);
        let demand = module.input_demand(&rt, module.inputs[0]);

        assert_eq!(module.constructed(), 0.0);
        assert_eq!(demand.get(), 0.0);

        module.set_checked(true);
        assert_eq!(module.constructed(), 5.0);
        assert!((demand.get() - 1.0).abs() < 1e-9);

        utilized.set(10.0);
        assert!((demand.get() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_cycle_time_fails_demand() {
        let rt = Runtime::new();
        rt.set_error_sink(|_: crate::id::NodeId, _: &crate::error::RecomputeError| {});
        let utilized = Computed::new(&rt, || Ok(5.0));
        let boost = Computed::new(&rt, || Ok(1.0));
        let def = ModuleDef {
            cycle_time: 0.0,
            ..fertiliser()
        };
        let checked = Observable::new(&rt, true);
        let module = Module::new(&rt, 1, &def, checked, Vec::new(), &utilized, &boost);
        let demand = module.input_demand(&rt, module.inputs[0]);
        assert!(matches!(
            demand.read(),
            Err(crate::error::RecomputeError::Configuration(_))
        ));
        assert_eq!(demand.get(), 0.0);
    }
}
