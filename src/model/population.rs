use super::island::BuildContext;
use super::product::Consumer;
use crate::catalog::{PopulationLevelDef, ResidenceDef};
use crate::error::{ConfigurationError, ensure_finite};
use crate::id::Guid;
use crate::persist::{EntityField, FieldPath};
use crate::reactive::{Computed, Observable};

/// A product the residents of one population level consume.
#[derive(Debug, Clone)]
pub struct Need {
    /// Same as the consumed product's guid.
    pub guid: Guid,
    pub level: Guid,
    /// Units per residence per minute.
    pub consumption_rate: f64,
    pub residents_per_house: u32,
    /// Whether the need is served; unchecked needs neither consume nor house anyone.
    pub checked: Observable<bool>,
}

impl Need {
    pub fn checked(&self) -> bool {
        self.checked.get()
    }

    pub fn set_checked(&self, checked: bool) {
        self.checked.set(checked);
    }
}

/// One need as consumed by one residence building type.
#[derive(Debug, Clone)]
pub struct ResidenceNeed {
    pub need: Guid,
    pub residence: Guid,
    pub amount: Computed<f64>,
    pub residents: Computed<u64>,
}

impl ResidenceNeed {
    pub fn amount(&self) -> f64 {
        self.amount.get()
    }

    pub fn residents(&self) -> u64 {
        self.residents.get()
    }
}

#[derive(Debug, Clone)]
pub struct ResidenceBuildings {
    pub constructed: Observable<u32>,
}

#[derive(Debug, Clone)]
pub struct Residence {
    pub guid: Guid,
    pub name: String,
    pub level: Guid,
    pub buildings: ResidenceBuildings,
    pub needs: Vec<ResidenceNeed>,
    pub residents: Computed<u64>,
}

impl Residence {
    fn build(ctx: &mut BuildContext<'_>, def: &ResidenceDef, needs: &[Need]) -> Self {
        let runtime = ctx.runtime;
        let constructed = ctx
            .persistence
            .observable(FieldPath::entity(def.guid, EntityField::BuildingsConstructed), 0u32);

        let mut residence_needs = Vec::with_capacity(needs.len());
        for need in needs {
            let amount = {
                let (checked, constructed) = (need.checked.clone(), constructed.clone());
                let factor = ctx.settings.consumption_factor.clone();
                let rate = need.consumption_rate;
                Computed::new(runtime, move || {
                    if !checked.get() {
                        return Ok(0.0);
                    }
                    ensure_finite(
                        "need consumption",
                        f64::from(constructed.get()) * rate * factor.get(),
                    )
                })
            };
            let residents = {
                let (checked, constructed) = (need.checked.clone(), constructed.clone());
                let per_house = u64::from(need.residents_per_house);
                Computed::new(runtime, move || {
                    Ok(if checked.get() {
                        u64::from(constructed.get()) * per_house
                    } else {
                        0
                    })
                })
            };
            if let Some(product) = ctx.product(need.guid, def.guid) {
                let consumer = Consumer::ResidenceNeed {
                    residence: def.guid,
                    need: need.guid,
                };
                product.register_demand(consumer, amount.clone());
            }
            residence_needs.push(ResidenceNeed {
                need: need.guid,
                residence: def.guid,
                amount,
                residents,
            });
        }

        let residents = {
            let per_need: Vec<Computed<u64>> =
                residence_needs.iter().map(|n| n.residents.clone()).collect();
            Computed::new(runtime, move || {
                let mut total = 0u64;
                for residents in &per_need {
                    total += residents.read()?;
                }
                Ok(total)
            })
        };

        Self {
            guid: def.guid,
            name: def.name.clone(),
            level: def.population_level,
            buildings: ResidenceBuildings { constructed },
            needs: residence_needs,
            residents,
        }
    }

    pub fn constructed(&self) -> u32 {
        self.buildings.constructed.get()
    }

    pub fn set_constructed(&self, constructed: u32) {
        self.buildings.constructed.set(constructed);
    }

    pub fn residents(&self) -> u64 {
        self.residents.get()
    }

    pub fn need(&self, guid: Guid) -> Option<&ResidenceNeed> {
        self.needs.iter().find(|n| n.need == guid)
    }
}

/// A population tier with its needs and the residences housing it.
#[derive(Debug, Clone)]
pub struct PopulationLevel {
    pub guid: Guid,
    pub name: String,
    pub needs: Vec<Need>,
    pub residences: Vec<Residence>,
    pub residents: Computed<u64>,
}

impl PopulationLevel {
    pub(crate) fn build(
        ctx: &mut BuildContext<'_>,
        def: &PopulationLevelDef,
        residences: &[&ResidenceDef],
    ) -> Self {
        let mut needs = Vec::with_capacity(def.needs.len());
        for need in &def.needs {
            if !(need.consumption_rate.is_finite() && need.consumption_rate >= 0.0) {
                ctx.report(ConfigurationError::InvalidAmount {
                    guid: need.product,
                    field: "consumption rate",
                    value: need.consumption_rate,
                });
                continue;
            }
            needs.push(Need {
                guid: need.product,
                level: def.guid,
                consumption_rate: need.consumption_rate,
                residents_per_house: need.residents,
                checked: ctx.persistence.observable(
                    FieldPath::entity(def.guid, EntityField::NeedChecked(need.product)),
                    true,
                ),
            });
        }

        let residences: Vec<Residence> = residences
            .iter()
            .map(|residence| Residence::build(ctx, residence, &needs))
            .collect();

        let residents = {
            let per_residence: Vec<Computed<u64>> =
                residences.iter().map(|r| r.residents.clone()).collect();
            Computed::new(ctx.runtime, move || {
                let mut total = 0u64;
                for residents in &per_residence {
                    total += residents.read()?;
                }
                Ok(total)
            })
        };

        Self {
            guid: def.guid,
            name: def.name.clone(),
            needs,
            residences,
            residents,
        }
    }

    pub fn residents(&self) -> u64 {
        self.residents.get()
    }

    pub fn need(&self, guid: Guid) -> Option<&Need> {
        self.needs.iter().find(|n| n.guid == guid)
    }

    pub fn residence(&self, guid: Guid) -> Option<&Residence> {
        self.residences.iter().find(|r| r.guid == guid)
    }
}
