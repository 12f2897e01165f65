use serde::{Deserialize, Serialize};

use crate::catalog::ProductAmount;
use crate::error::ensure_finite;
use crate::id::Guid;
use crate::reactive::{Computed, Observable, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum OwnerKind {
    Factory,
    Module,
}

string_enum!(OwnerKind {
    Factory => "factory",
    Module => "module",
});

/// The entity a buff instance belongs to, compared by guid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuffOwner {
    Factory(Guid),
    /// A module instance, identified by its factory and the module guid.
    Module { factory: Guid, module: Guid },
}

impl BuffOwner {
    pub fn kind(&self) -> OwnerKind {
        match self {
            BuffOwner::Factory(_) => OwnerKind::Factory,
            BuffOwner::Module { .. } => OwnerKind::Module,
        }
    }

    /// Guid of the factory the buff ends up applying to.
    pub fn factory(&self) -> Guid {
        match *self {
            BuffOwner::Factory(guid) => guid,
            BuffOwner::Module { factory, .. } => factory,
        }
    }
}

/// A productivity bonus applied to one factory.
#[derive(Debug, Clone)]
pub struct Buff {
    pub guid: Guid,
    pub name: String,
    pub owner: BuffOwner,
    /// Percentage, 100 = +100%.
    pub productivity_upgrade: Computed<f64>,
    /// 1 while active, 0 otherwise.
    pub scaling: Computed<f64>,
    pub extra_goods: Vec<ProductAmount>,
}

impl Buff {
    /// Always-on buff with a fixed upgrade.
    pub(crate) fn constant(
        runtime: &Runtime,
        guid: Guid,
        name: &str,
        owner: BuffOwner,
        productivity_upgrade: f64,
        extra_goods: Vec<ProductAmount>,
    ) -> Self {
        Self {
            guid,
            name: name.to_string(),
            owner,
            productivity_upgrade: Computed::new(runtime, move || {
                ensure_finite("productivity upgrade", productivity_upgrade)
            }),
            scaling: Computed::new(runtime, || Ok(1.0)),
            extra_goods,
        }
    }

    /// Buff active only while `checked` is set.
    pub(crate) fn gated(
        runtime: &Runtime,
        guid: Guid,
        name: &str,
        owner: BuffOwner,
        productivity_upgrade: f64,
        extra_goods: Vec<ProductAmount>,
        checked: &Observable<bool>,
    ) -> Self {
        let checked = checked.clone();
        Self {
            scaling: Computed::new(runtime, move || Ok(if checked.get() { 1.0 } else { 0.0 })),
            ..Self::constant(runtime, guid, name, owner, productivity_upgrade, extra_goods)
        }
    }

    /// The user-set percent boost of a factory, expressed as a buff on top of the base 100%.
    pub(crate) fn percent_boost(
        runtime: &Runtime,
        factory: Guid,
        percent_boost: &Observable<f64>,
    ) -> Self {
        let percent_boost = percent_boost.clone();
        Self {
            guid: factory,
            name: "percent boost".to_string(),
            owner: BuffOwner::Factory(factory),
            productivity_upgrade: Computed::new(runtime, move || {
                ensure_finite("percent boost", percent_boost.get() - 100.0)
            }),
            scaling: Computed::new(runtime, || Ok(1.0)),
            extra_goods: Vec::new(),
        }
    }

    pub fn scaling(&self) -> f64 {
        self.scaling.get()
    }

    pub fn productivity_upgrade(&self) -> f64 {
        self.productivity_upgrade.get()
    }

    /// This buff's share of a factory boost, `scaling * upgrade / 100`.
    pub fn boost_contribution(&self) -> Result<f64, crate::error::RecomputeError> {
        Ok(self.scaling.read()? * self.productivity_upgrade.read()? / 100.0)
    }
}
