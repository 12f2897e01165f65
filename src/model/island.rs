use std::collections::{BTreeMap, BTreeSet};

use super::factory::Factory;
use super::population::{PopulationLevel, Residence};
use super::product::Product;
use super::settings::Settings;
use crate::catalog::{BuffDef, Catalog, ModuleDef, ResidenceDef};
use crate::error::ConfigurationError;
use crate::id::Guid;
use crate::persist::{FieldPath, Persistence};
use crate::reactive::Runtime;
use crate::visibility;

/// Any entity an island knows by guid.
#[derive(Debug, Clone, Copy)]
pub enum Asset<'a> {
    Product(&'a Product),
    Factory(&'a Factory),
    Buff(&'a BuffDef),
    Module(&'a ModuleDef),
    PopulationLevel(&'a PopulationLevel),
    Residence(&'a Residence),
}

impl Asset<'_> {
    pub fn guid(&self) -> Guid {
        match self {
            Asset::Product(p) => p.guid,
            Asset::Factory(f) => f.guid,
            Asset::Buff(b) => b.guid,
            Asset::Module(m) => m.guid,
            Asset::PopulationLevel(l) => l.guid,
            Asset::Residence(r) => r.guid,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Asset::Product(p) => &p.name,
            Asset::Factory(f) => &f.name,
            Asset::Buff(b) => &b.name,
            Asset::Module(m) => &m.name,
            Asset::PopulationLevel(l) => &l.name,
            Asset::Residence(r) => &r.name,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AssetIndex {
    Product(usize),
    Factory(usize),
    Buff(usize),
    Module(usize),
    PopulationLevel(usize),
    Residence { level: usize, index: usize },
}

/// State shared by the entity constructors while an island is being built.
pub(crate) struct BuildContext<'a> {
    pub runtime: &'a Runtime,
    pub persistence: &'a Persistence,
    pub settings: Settings,
    pub products: BTreeMap<Guid, Product>,
    pub buffs: BTreeMap<Guid, &'a BuffDef>,
    pub modules: BTreeMap<Guid, &'a ModuleDef>,
    /// Product guid to the guid of the first factory declaring it as main output.
    pub main_producers: BTreeMap<Guid, Guid>,
    pub errors: Vec<ConfigurationError>,
}

impl<'a> BuildContext<'a> {
    /// Record a catalog fault. A definition shared by several entities is
    /// reported once.
    pub fn report(&mut self, error: ConfigurationError) {
        if self.errors.contains(&error) {
            return;
        }
        tracing::error!(error = %error, "configuration error");
        self.errors.push(error);
    }

    pub fn product(&mut self, guid: Guid, referrer: Guid) -> Option<Product> {
        let product = self.products.get(&guid).cloned();
        if product.is_none() {
            self.report(ConfigurationError::UnresolvedGuid {
                guid,
                referrer: referrer.to_string(),
            });
        }
        product
    }

    pub fn module_def(&mut self, guid: Guid, referrer: Guid) -> Option<&'a ModuleDef> {
        let module = self.modules.get(&guid).copied();
        if module.is_none() {
            self.report(ConfigurationError::UnresolvedGuid {
                guid,
                referrer: referrer.to_string(),
            });
        }
        module
    }

    pub fn is_main_producer(&self, product: Guid, factory: Guid) -> bool {
        self.main_producers.get(&product) == Some(&factory)
    }

    /// Record `guid` as defined; a second definition is reported and skipped.
    fn claim(&mut self, seen: &mut BTreeSet<Guid>, guid: Guid) -> bool {
        if seen.insert(guid) {
            true
        } else {
            self.report(ConfigurationError::DuplicateGuid { guid });
            false
        }
    }
}

/// The live entity graph of one island.
#[derive(Debug)]
pub struct Island {
    products: Vec<Product>,
    factories: Vec<Factory>,
    population_levels: Vec<PopulationLevel>,
    buffs: Vec<BuffDef>,
    modules: Vec<ModuleDef>,
    settings: Settings,
    assets: BTreeMap<Guid, AssetIndex>,
    errors: Vec<ConfigurationError>,
}

impl Island {
    /// Build every entity of `catalog`, hydrating persisted fields through
    /// `persistence`.
    ///
    /// Configuration errors never abort the build: the offending definition or
    /// reference is skipped, logged and kept in [`Island::configuration_errors`].
    pub fn build(runtime: &Runtime, catalog: &Catalog, persistence: &Persistence) -> Self {
        let settings = Settings::load(persistence);
        let mut ctx = BuildContext {
            runtime,
            persistence,
            settings: settings.clone(),
            products: BTreeMap::new(),
            buffs: BTreeMap::new(),
            modules: BTreeMap::new(),
            main_producers: BTreeMap::new(),
            errors: Vec::new(),
        };
        let mut seen = BTreeSet::new();

        let mut products = Vec::with_capacity(catalog.products.len());
        for def in &catalog.products {
            if ctx.claim(&mut seen, def.guid) {
                let product = Product::new(runtime, persistence, def);
                ctx.products.insert(def.guid, product.clone());
                products.push(product);
            }
        }

        let mut buffs = Vec::new();
        for def in &catalog.buffs {
            if ctx.claim(&mut seen, def.guid) {
                ctx.buffs.insert(def.guid, def);
                buffs.push(def.clone());
            }
        }

        let mut modules = Vec::new();
        for def in &catalog.modules {
            if ctx.claim(&mut seen, def.guid) {
                ctx.modules.insert(def.guid, def);
                modules.push(def.clone());
            }
        }

        let mut factory_defs = Vec::with_capacity(catalog.factories.len());
        for def in &catalog.factories {
            if ctx.claim(&mut seen, def.guid) {
                factory_defs.push(def);
            }
        }
        for def in &factory_defs {
            if let Some(output) = def.outputs.first() {
                ctx.main_producers.entry(output.product).or_insert(def.guid);
            }
        }
        let factories: Vec<Factory> = factory_defs
            .iter()
            .map(|def| Factory::build(&mut ctx, def))
            .collect();

        let mut level_defs = Vec::with_capacity(catalog.population_levels.len());
        for def in &catalog.population_levels {
            if ctx.claim(&mut seen, def.guid) {
                level_defs.push(def);
            }
        }
        let mut residences_by_level: BTreeMap<Guid, Vec<&ResidenceDef>> = BTreeMap::new();
        for def in &catalog.residences {
            if !ctx.claim(&mut seen, def.guid) {
                continue;
            }
            if level_defs.iter().any(|l| l.guid == def.population_level) {
                residences_by_level
                    .entry(def.population_level)
                    .or_default()
                    .push(def);
            } else {
                ctx.report(ConfigurationError::MissingPopulationLevel {
                    residence: def.guid,
                    level: def.population_level,
                });
            }
        }
        let population_levels: Vec<PopulationLevel> = level_defs
            .iter()
            .map(|def| {
                let residences = residences_by_level.remove(&def.guid).unwrap_or_default();
                PopulationLevel::build(&mut ctx, def, &residences)
            })
            .collect();

        for product in &products {
            let producers: Vec<&Factory> = factories
                .iter()
                .filter(|f| f.produces(product.guid))
                .collect();
            product.set_visibility(visibility::visibility(
                runtime, product, &producers, &settings,
            ));
        }

        let mut assets = BTreeMap::new();
        for (i, p) in products.iter().enumerate() {
            assets.insert(p.guid, AssetIndex::Product(i));
        }
        for (i, f) in factories.iter().enumerate() {
            assets.insert(f.guid, AssetIndex::Factory(i));
        }
        for (i, b) in buffs.iter().enumerate() {
            assets.insert(b.guid, AssetIndex::Buff(i));
        }
        for (i, m) in modules.iter().enumerate() {
            assets.insert(m.guid, AssetIndex::Module(i));
        }
        for (level, l) in population_levels.iter().enumerate() {
            assets.insert(l.guid, AssetIndex::PopulationLevel(level));
            for (index, r) in l.residences.iter().enumerate() {
                assets.insert(r.guid, AssetIndex::Residence { level, index });
            }
        }

        tracing::debug!(
            products = products.len(),
            factories = factories.len(),
            population_levels = population_levels.len(),
            hydrated = persistence.hydrated_count(),
            errors = ctx.errors.len(),
            "built island"
        );

        Self {
            products,
            factories,
            population_levels,
            buffs,
            modules,
            settings,
            assets,
            errors: ctx.errors,
        }
    }

    /// Look up any entity by guid.
    pub fn asset(&self, guid: Guid) -> Option<Asset<'_>> {
        self.assets.get(&guid).map(|&index| self.resolve(index))
    }

    /// All entities, ordered by guid.
    pub fn assets(&self) -> impl Iterator<Item = Asset<'_>> {
        self.assets.values().map(|&index| self.resolve(index))
    }

    /// Persisted entity keys whose guid names nothing on this island.
    ///
    /// Keys that do not parse at all are left to `Bundle::unknown_keys`.
    pub fn stray_keys<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> Vec<&'k str> {
        keys.into_iter()
            .filter(|key| match key.parse::<FieldPath>() {
                Ok(FieldPath::Entity { guid, .. }) => !self.assets.contains_key(&guid),
                _ => false,
            })
            .collect()
    }

    fn resolve(&self, index: AssetIndex) -> Asset<'_> {
        match index {
            AssetIndex::Product(i) => Asset::Product(&self.products[i]),
            AssetIndex::Factory(i) => Asset::Factory(&self.factories[i]),
            AssetIndex::Buff(i) => Asset::Buff(&self.buffs[i]),
            AssetIndex::Module(i) => Asset::Module(&self.modules[i]),
            AssetIndex::PopulationLevel(i) => Asset::PopulationLevel(&self.population_levels[i]),
            AssetIndex::Residence { level, index } => {
                Asset::Residence(&self.population_levels[level].residences[index])
            }
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn factories(&self) -> &[Factory] {
        &self.factories
    }

    pub fn population_levels(&self) -> &[PopulationLevel] {
        &self.population_levels
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn configuration_errors(&self) -> &[ConfigurationError] {
        &self.errors
    }

    pub fn product(&self, guid: Guid) -> Option<&Product> {
        match self.asset(guid)? {
            Asset::Product(product) => Some(product),
            _ => None,
        }
    }

    pub fn factory(&self, guid: Guid) -> Option<&Factory> {
        match self.asset(guid)? {
            Asset::Factory(factory) => Some(factory),
            _ => None,
        }
    }

    pub fn population_level(&self, guid: Guid) -> Option<&PopulationLevel> {
        match self.asset(guid)? {
            Asset::PopulationLevel(level) => Some(level),
            _ => None,
        }
    }

    pub fn residence(&self, guid: Guid) -> Option<&Residence> {
        match self.asset(guid)? {
            Asset::Residence(residence) => Some(residence),
            _ => None,
        }
    }

    /// Products the overview should currently list.
    pub fn visible_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.visible())
    }
}
