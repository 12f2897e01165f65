#![allow(dead_code)]

use std::rc::Rc;

use chain_calc::persist::{MemoryStorage, Storage};
use chain_calc::{Catalog, Session, SessionConfig};

pub const TOLERANCE: f64 = 1e-5;

// Products
pub const WOOD: u64 = 1009;
pub const TIMBER: u64 = 1010;
pub const FERTILISER: u64 = 1200;
pub const FISH: u64 = 1300;
pub const SCHNAPPS: u64 = 1400;
pub const POTATOES: u64 = 1500;
pub const BRICKS: u64 = 1600;
pub const RUM: u64 = 1700;
pub const PEARLS: u64 = 1800;

// Factories
pub const LUMBERJACK: u64 = 2001;
pub const SAWMILL: u64 = 2002;
pub const POTATO_FARM: u64 = 2003;
pub const DISTILLERY: u64 = 2004;
pub const FISHERY: u64 = 2005;
pub const BRICKYARD: u64 = 2006;
pub const FERTILISER_WORKS: u64 = 2007;

// Modules and buffs
pub const FIELD_MODULE: u64 = 3001;
pub const NET_MODULE: u64 = 3002;
pub const FERTILISED_SOIL: u64 = 4001;
pub const PEARL_DIVERS: u64 = 4002;

// Population
pub const FARMERS: u64 = 5000;
pub const WORKERS: u64 = 5001;
pub const FARMER_HOUSE: u64 = 6000;
pub const FARMER_COTTAGE: u64 = 6001;
pub const WORKER_HOUSE: u64 = 6002;

pub const CATALOG: &str = r#"{
    "products": [
        {"guid": 1009, "name": "Wood"},
        {"guid": 1010, "name": "Timber", "isConstructionMaterial": true},
        {"guid": 1200, "name": "Fertiliser"},
        {"guid": 1300, "name": "Fish"},
        {"guid": 1400, "name": "Schnapps"},
        {"guid": 1500, "name": "Potatoes"},
        {"guid": 1600, "name": "Bricks", "isConstructionMaterial": true},
        {"guid": 1700, "name": "Rum", "available": false},
        {"guid": 1800, "name": "Pearls"}
    ],
    "factories": [
        {"guid": 2001, "name": "Lumberjack's Hut", "cycleTime": 15,
         "outputs": [{"product": 1009, "amount": 1}]},
        {"guid": 2002, "name": "Sawmill", "cycleTime": 30,
         "inputs": [{"product": 1009, "amount": 1}],
         "outputs": [{"product": 1010, "amount": 1}]},
        {"guid": 2003, "name": "Potato Farm", "cycleTime": 30,
         "outputs": [{"product": 1500, "amount": 1}],
         "modules": [3001]},
        {"guid": 2004, "name": "Schnapps Distillery", "cycleTime": 30,
         "inputs": [{"product": 1500, "amount": 1}],
         "outputs": [{"product": 1400, "amount": 1}]},
        {"guid": 2005, "name": "Fishery", "cycleTime": 30,
         "outputs": [{"product": 1300, "amount": 1}],
         "modules": [3002],
         "buffs": [4002]},
        {"guid": 2006, "name": "Brick Factory", "cycleTime": 60,
         "outputs": [{"product": 1600, "amount": 1}]},
        {"guid": 2007, "name": "Fertiliser Works", "cycleTime": 60,
         "outputs": [{"product": 1200, "amount": 1}]}
    ],
    "modules": [
        {"guid": 3001, "name": "Potato Field", "cycleTime": 300,
         "inputs": [{"product": 1200, "amount": 1}],
         "buffs": [4001]},
        {"guid": 3002, "name": "Net Shed", "cycleTime": 300,
         "inputs": [{"product": 1200, "amount": 1}]}
    ],
    "buffs": [
        {"guid": 4001, "name": "Fertilised Soil", "productivityUpgrade": 100},
        {"guid": 4002, "name": "Pearl Divers",
         "extraGoods": [{"product": 1800, "amount": 0.5}]}
    ],
    "populationLevels": [
        {"guid": 5000, "name": "Farmers", "needs": [
            {"product": 1300, "consumptionRate": 0.02, "residents": 5},
            {"product": 1400, "consumptionRate": 0.01, "residents": 3}
        ]},
        {"guid": 5001, "name": "Workers", "needs": [
            {"product": 1300, "consumptionRate": 0.03, "residents": 4},
            {"product": 1010, "consumptionRate": 0.005, "residents": 0}
        ]}
    ],
    "residences": [
        {"guid": 6000, "name": "Farmer House", "populationLevel": 5000},
        {"guid": 6001, "name": "Farmer Cottage", "populationLevel": 5000},
        {"guid": 6002, "name": "Worker House", "populationLevel": 5001}
    ]
}"#;

pub fn catalog() -> Catalog {
    Catalog::from_json_str(CATALOG).expect("fixture catalog parses")
}

pub fn session() -> Session {
    session_with(Rc::new(MemoryStorage::new()))
}

pub fn session_with(storage: Rc<dyn Storage>) -> Session {
    Session::open(&catalog(), storage, SessionConfig::default())
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

pub fn assert_invariants(session: &Session) {
    let violations = session.verify_invariants();
    assert!(violations.is_empty(), "invariant violations: {violations:?}");
}
