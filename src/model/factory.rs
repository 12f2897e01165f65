use super::buff::{Buff, BuffOwner};
use super::cycles_per_minute;
use super::island::BuildContext;
use super::module::Module;
use super::product::Consumer;
use crate::catalog::{BuffDef, FactoryDef, ModuleDef, ProductAmount};
use crate::error::{ConfigurationError, RecomputeError, ensure_finite};
use crate::id::Guid;
use crate::persist::{EntityField, FieldPath};
use crate::reactive::{Computed, Observable};

#[derive(Debug, Clone)]
pub struct FactoryBuildings {
    pub constructed: Observable<u32>,
    /// Run every constructed building even when demand needs fewer.
    pub fully_utilize_constructed: Observable<bool>,
    /// Buildings needed to cover the remaining demand for the main output.
    pub required: Computed<f64>,
    pub utilized: Computed<f64>,
}

#[derive(Debug, Clone)]
pub struct Factory {
    pub guid: Guid,
    pub name: String,
    pub cycle_time: f64,
    pub inputs: Vec<ProductAmount>,
    pub outputs: Vec<ProductAmount>,
    pub buildings: FactoryBuildings,
    /// User-set productivity in percent, 100 = no boost.
    pub percent_boost: Observable<f64>,
    pub boost: Computed<f64>,
    pub throughput: Computed<f64>,
    pub throughput_by_existing_buildings: Computed<f64>,
    pub modules: Vec<Module>,
    base_buffs: Vec<Buff>,
}

impl Factory {
    pub(crate) fn build(ctx: &mut BuildContext<'_>, def: &FactoryDef) -> Self {
        let runtime = ctx.runtime;
        let guid = def.guid;
        if let Err(RecomputeError::Configuration(err)) = cycles_per_minute(guid, def.cycle_time) {
            ctx.report(err);
        }
        let inputs = ctx.valid_amounts(guid, "input amount", &def.inputs);
        let outputs = ctx.valid_amounts(guid, "output amount", &def.outputs);

        let constructed = ctx
            .persistence
            .observable(FieldPath::entity(guid, EntityField::BuildingsConstructed), 0u32);
        let fully_utilize_constructed = ctx
            .persistence
            .observable(FieldPath::entity(guid, EntityField::FullyUtilizeConstructed), true);
        let percent_boost = ctx
            .persistence
            .observable(FieldPath::entity(guid, EntityField::PercentBoost), 100.0);

        let mut base_buffs = vec![Buff::percent_boost(runtime, guid, &percent_boost)];
        for &buff_guid in &def.buffs {
            if let Some(buff) = ctx.buff_def(buff_guid, guid) {
                base_buffs.push(Buff::constant(
                    runtime,
                    buff.guid,
                    &buff.name,
                    BuffOwner::Factory(guid),
                    buff.productivity_upgrade,
                    buff.extra_goods.clone(),
                ));
            }
        }

        // Modules are wired in two steps: their flags and buffs feed the
        // boost, while their building counts depend on it.
        let mut equipped = Vec::new();
        for &module_guid in &def.modules {
            let Some(module_def) = ctx.module_def(module_guid, guid) else {
                continue;
            };
            if let Err(RecomputeError::Configuration(err)) =
                cycles_per_minute(module_guid, module_def.cycle_time)
            {
                ctx.report(err);
            }
            let module_def = ModuleDef {
                inputs: ctx.valid_amounts(module_guid, "module input amount", &module_def.inputs),
                ..module_def.clone()
            };
            let checked = ctx.persistence.observable(
                FieldPath::entity(guid, EntityField::ModuleChecked(module_guid)),
                false,
            );
            let owner = BuffOwner::Module {
                factory: guid,
                module: module_guid,
            };
            let mut triggered = Vec::new();
            for &buff_guid in &module_def.buffs {
                if let Some(buff) = ctx.buff_def(buff_guid, module_guid) {
                    triggered.push(Buff::gated(
                        runtime,
                        buff.guid,
                        &buff.name,
                        owner,
                        buff.productivity_upgrade,
                        buff.extra_goods.clone(),
                        &checked,
                    ));
                }
            }
            equipped.push((module_def, checked, triggered));
        }

        let boost = {
            let buffs: Vec<Buff> = base_buffs
                .iter()
                .chain(equipped.iter().flat_map(|(_, _, triggered)| triggered))
                .cloned()
                .collect();
            Computed::new(runtime, move || {
                let mut boost = 1.0;
                for buff in &buffs {
                    boost += buff.boost_contribution()?;
                }
                ensure_finite("boost", boost)
            })
        };

        let cycle_time = def.cycle_time;
        let throughput_by_existing_buildings = {
            let (constructed, boost) = (constructed.clone(), boost.clone());
            Computed::new(runtime, move || {
                let cycles = cycles_per_minute(guid, cycle_time)?;
                ensure_finite(
                    "throughput by existing buildings",
                    f64::from(constructed.get()) * boost.read()? * cycles,
                )
            })
        };

        let main_output = outputs
            .first()
            .copied()
            .filter(|output| ctx.is_main_producer(output.product, guid));
        let required = {
            let remaining = main_output
                .and_then(|output| ctx.products.get(&output.product))
                .map(|product| product.remaining_demand.clone());
            let output_amount = main_output.map_or(0.0, |output| output.amount);
            let boost = boost.clone();
            Computed::new(runtime, move || {
                let Some(remaining) = &remaining else {
                    return Ok(0.0);
                };
                let per_building =
                    boost.read()? * cycles_per_minute(guid, cycle_time)? * output_amount;
                if per_building <= 0.0 {
                    return Ok(0.0);
                }
                ensure_finite("required buildings", remaining.read()? / per_building)
            })
        };

        let utilized = {
            let (constructed, fully) = (constructed.clone(), fully_utilize_constructed.clone());
            let required = required.clone();
            Computed::new(runtime, move || {
                let required = required.read()?;
                Ok(if fully.get() {
                    required.max(f64::from(constructed.get()))
                } else {
                    required
                })
            })
        };

        let throughput = {
            let (utilized, boost) = (utilized.clone(), boost.clone());
            Computed::new(runtime, move || {
                let cycles = cycles_per_minute(guid, cycle_time)?;
                ensure_finite("throughput", utilized.read()? * boost.read()? * cycles)
            })
        };

        let modules: Vec<Module> = equipped
            .into_iter()
            .map(|(module_def, checked, triggered)| {
                Module::new(runtime, guid, &module_def, checked, triggered, &utilized, &boost)
            })
            .collect();

        let factory = Self {
            guid,
            name: def.name.clone(),
            cycle_time,
            inputs,
            outputs,
            buildings: FactoryBuildings {
                constructed,
                fully_utilize_constructed,
                required,
                utilized,
            },
            percent_boost,
            boost,
            throughput,
            throughput_by_existing_buildings,
            modules,
            base_buffs,
        };
        factory.register_demands(ctx);
        factory.register_extra_goods(ctx);
        factory
    }

    fn register_demands(&self, ctx: &mut BuildContext<'_>) {
        for &input in &self.inputs {
            let Some(product) = ctx.product(input.product, self.guid) else {
                continue;
            };
            let amount = {
                let (utilized, boost) = (self.buildings.utilized.clone(), self.boost.clone());
                let (guid, cycle_time) = (self.guid, self.cycle_time);
                Computed::new(ctx.runtime, move || {
                    let cycles = cycles_per_minute(guid, cycle_time)?;
                    ensure_finite(
                        "factory demand",
                        utilized.read()? * cycles * input.amount * boost.read()?,
                    )
                })
            };
            product.register_demand(Consumer::Factory(self.guid), amount);
        }

        for module in &self.modules {
            for &input in &module.inputs {
                let Some(product) = ctx.product(input.product, module.guid) else {
                    continue;
                };
                let consumer = Consumer::Module {
                    factory: self.guid,
                    module: module.guid,
                };
                product.register_demand(consumer, module.input_demand(ctx.runtime, input));
            }
        }
    }

    fn register_extra_goods(&self, ctx: &mut BuildContext<'_>) {
        for buff in self.buffs() {
            for &good in &buff.extra_goods {
                let Some(product) = ctx.product(good.product, buff.guid) else {
                    continue;
                };
                let scaling = buff.scaling.clone();
                let existing = self.throughput_by_existing_buildings.clone();
                product.register_extra_good(Computed::new(ctx.runtime, move || {
                    ensure_finite("extra goods", scaling.read()? * existing.read()? * good.amount)
                }));
            }
        }
    }

    /// Every buff applying to this factory: the user boost, catalog buffs and
    /// the buffs of all modules (active or not).
    pub fn buffs(&self) -> impl Iterator<Item = &Buff> {
        self.base_buffs
            .iter()
            .chain(self.modules.iter().flat_map(|m| m.triggered_buffs.iter()))
    }

    /// Whether `buff` is granted by one of this factory's modules.
    pub fn is_module_buff(&self, buff: &Buff) -> bool {
        matches!(buff.owner, BuffOwner::Module { factory, .. } if factory == self.guid)
    }

    pub fn module(&self, guid: Guid) -> Option<&Module> {
        self.modules.iter().find(|m| m.guid == guid)
    }

    pub fn boost(&self) -> f64 {
        self.boost.get()
    }

    /// Set the productivity multiplier, e.g. `1.5` for 150%.
    pub fn set_boost(&self, boost: f64) {
        self.percent_boost.set(boost * 100.0);
    }

    pub fn throughput(&self) -> f64 {
        self.throughput.get()
    }

    pub fn throughput_by_existing_buildings(&self) -> f64 {
        self.throughput_by_existing_buildings.get()
    }

    pub fn constructed(&self) -> u32 {
        self.buildings.constructed.get()
    }

    pub fn set_constructed(&self, constructed: u32) {
        self.buildings.constructed.set(constructed);
    }

    pub fn utilized(&self) -> f64 {
        self.buildings.utilized.get()
    }

    pub fn required(&self) -> f64 {
        self.buildings.required.get()
    }

    pub fn produces(&self, product: Guid) -> bool {
        self.outputs.iter().any(|o| o.product == product)
    }
}

impl<'a> BuildContext<'a> {
    fn valid_amounts(
        &mut self,
        guid: Guid,
        field: &'static str,
        amounts: &[ProductAmount],
    ) -> Vec<ProductAmount> {
        let mut valid = Vec::with_capacity(amounts.len());
        for &amount in amounts {
            if amount.amount.is_finite() && amount.amount >= 0.0 {
                valid.push(amount);
            } else {
                self.report(ConfigurationError::InvalidAmount {
                    guid,
                    field,
                    value: amount.amount,
                });
            }
        }
        valid
    }

    fn buff_def(&mut self, guid: Guid, referrer: Guid) -> Option<&'a BuffDef> {
        let Some(&def) = self.buffs.get(&guid) else {
            self.report(ConfigurationError::UnresolvedGuid {
                guid,
                referrer: referrer.to_string(),
            });
            return None;
        };
        if !def.productivity_upgrade.is_finite() {
            self.report(ConfigurationError::InvalidAmount {
                guid,
                field: "productivity upgrade",
                value: def.productivity_upgrade,
            });
            return None;
        }
        Some(def)
    }
}
