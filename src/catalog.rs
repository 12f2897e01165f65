//! Static, guid-keyed game data. Read once per island load and never mutated.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::id::Guid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub products: Vec<ProductDef>,
    #[serde(default)]
    pub factories: Vec<FactoryDef>,
    #[serde(default)]
    pub modules: Vec<ModuleDef>,
    #[serde(default)]
    pub buffs: Vec<BuffDef>,
    #[serde(default)]
    pub population_levels: Vec<PopulationLevelDef>,
    #[serde(default)]
    pub residences: Vec<ResidenceDef>,
}

impl Catalog {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Malformed(e.to_string()))
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDef {
    pub guid: Guid,
    pub name: String,
    #[serde(default)]
    pub is_construction_material: bool,
    #[serde(default = "default_true")]
    pub available: bool,
}

/// A product quantity per production cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductAmount {
    pub product: Guid,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryDef {
    pub guid: Guid,
    pub name: String,
    /// Seconds per production cycle.
    pub cycle_time: f64,
    #[serde(default)]
    pub inputs: Vec<ProductAmount>,
    #[serde(default)]
    pub outputs: Vec<ProductAmount>,
    /// Guids of the modules this factory can be equipped with.
    #[serde(default)]
    pub modules: Vec<Guid>,
    /// Guids of buffs that always apply to this factory.
    #[serde(default)]
    pub buffs: Vec<Guid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDef {
    pub guid: Guid,
    pub name: String,
    pub cycle_time: f64,
    #[serde(default)]
    pub inputs: Vec<ProductAmount>,
    /// Buffs granted to the parent factory while the module is equipped.
    #[serde(default)]
    pub buffs: Vec<Guid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffDef {
    pub guid: Guid,
    pub name: String,
    /// Additive percentage, 100 = +100%.
    #[serde(default)]
    pub productivity_upgrade: f64,
    /// Extra units produced per production cycle of the buffed factory.
    #[serde(default)]
    pub extra_goods: Vec<ProductAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationLevelDef {
    pub guid: Guid,
    pub name: String,
    #[serde(default)]
    pub needs: Vec<NeedDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedDef {
    /// The consumed product; doubles as the need's guid within its level.
    pub product: Guid,
    /// Units per residence per minute.
    pub consumption_rate: f64,
    /// Residents housed per residence while the need is served.
    #[serde(default)]
    pub residents: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidenceDef {
    pub guid: Guid,
    pub name: String,
    pub population_level: Guid,
}
