use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::Guid;

/// Session-wide settings, persisted as `settings.<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Setting {
    ShowAllProducts,
    ConsumptionFactor,
}

string_enum!(Setting {
    ShowAllProducts => "showAllProducts",
    ConsumptionFactor => "consumptionFactor",
});

/// A persisted field of one catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityField {
    BuildingsConstructed,
    FullyUtilizeConstructed,
    PercentBoost,
    /// `checked` flag of the module with this guid, on the owning factory.
    ModuleChecked(Guid),
    /// `checked` flag of the need for this product, on the owning population level.
    NeedChecked(Guid),
    TradeInputAmount,
    TradeOutputAmount,
}

impl fmt::Display for EntityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityField::BuildingsConstructed => f.write_str("buildings.constructed"),
            EntityField::FullyUtilizeConstructed => {
                f.write_str("buildings.fullyUtilizeConstructed")
            }
            EntityField::PercentBoost => f.write_str("percentBoost"),
            EntityField::ModuleChecked(module) => write!(f, "modules.{module}.checked"),
            EntityField::NeedChecked(need) => write!(f, "needs.{need}.checked"),
            EntityField::TradeInputAmount => f.write_str("tradeList.inputAmount"),
            EntityField::TradeOutputAmount => f.write_str("tradeList.outputAmount"),
        }
    }
}

impl FromStr for EntityField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "buildings.constructed" => EntityField::BuildingsConstructed,
            "buildings.fullyUtilizeConstructed" => EntityField::FullyUtilizeConstructed,
            "percentBoost" => EntityField::PercentBoost,
            "tradeList.inputAmount" => EntityField::TradeInputAmount,
            "tradeList.outputAmount" => EntityField::TradeOutputAmount,
            other => {
                let parts: Vec<&str> = other.split('.').collect();
                match parts.as_slice() {
                    ["modules", guid, "checked"] => EntityField::ModuleChecked(parse_guid(guid)?),
                    ["needs", guid, "checked"] => EntityField::NeedChecked(parse_guid(guid)?),
                    _ => return Err(format!("unknown entity field: {other}")),
                }
            }
        };
        Ok(field)
    }
}

/// Typed address of a persisted value.
///
/// Renders to, and parses from, the external key format:
/// `<guid>.<dotted.path>` for entity fields and `settings.<name>` for settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldPath {
    Entity { guid: Guid, field: EntityField },
    Setting(Setting),
}

impl FieldPath {
    pub fn entity(guid: Guid, field: EntityField) -> Self {
        FieldPath::Entity { guid, field }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Entity { guid, field } => write!(f, "{guid}.{field}"),
            FieldPath::Setting(setting) => write!(f, "settings.{setting}"),
        }
    }
}

impl FromStr for FieldPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, rest) = s
            .split_once('.')
            .ok_or_else(|| format!("persisted key has no field path: {s}"))?;
        if head == "settings" {
            return Ok(FieldPath::Setting(rest.parse()?));
        }
        Ok(FieldPath::Entity {
            guid: parse_guid(head)?,
            field: rest.parse()?,
        })
    }
}

fn parse_guid(s: &str) -> Result<Guid, String> {
    s.parse().map_err(|_| format!("invalid guid: {s}"))
}

/// Conversion between a field's native type and its persisted string.
pub trait FieldValue: Sized {
    fn parse_field(raw: &str) -> Option<Self>;
    fn to_field(&self) -> String;
}

impl FieldValue for u32 {
    fn parse_field(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    fn to_field(&self) -> String {
        self.to_string()
    }
}

/// Every persisted decimal (boost percent, trade amounts, consumption factor)
/// is a finite non-negative quantity.
impl FieldValue for f64 {
    fn parse_field(raw: &str) -> Option<Self> {
        raw.trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
    }

    fn to_field(&self) -> String {
        self.to_string()
    }
}

impl FieldValue for bool {
    fn parse_field(raw: &str) -> Option<Self> {
        match raw.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn to_field(&self) -> String {
        self.to_string()
    }
}
