mod common;

use std::collections::BTreeMap;
use std::rc::Rc;

use chain_calc::config::{Bundle, SessionConfig};
use chain_calc::persist::{JsonlStorage, MemoryStorage, Storage};
use chain_calc::Session;
use common::*;

fn stored(pairs: &[(&str, &str)]) -> Rc<MemoryStorage> {
    let map: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Rc::new(MemoryStorage::from_map(map))
}

#[test]
fn persisted_values_hydrate_fields() {
    let storage = stored(&[
        ("2002.buildings.constructed", "10"),
        ("2002.percentBoost", "150"),
        ("2003.modules.3001.checked", "true"),
        ("5000.needs.1400.checked", "false"),
        ("6000.buildings.constructed", "4"),
        ("1009.tradeList.inputAmount", "2.5"),
        ("settings.showAllProducts", "true"),
        ("settings.consumptionFactor", "0.5"),
    ]);
    let session = session_with(storage);
    let island = session.island();

    let sawmill = island.factory(SAWMILL).unwrap();
    assert_eq!(sawmill.constructed(), 10);
    assert_close(sawmill.throughput_by_existing_buildings(), 30.0);
    assert_eq!(island.factory(POTATO_FARM).unwrap().boost(), 2.0);
    assert!(!island.population_level(FARMERS).unwrap().need(SCHNAPPS).unwrap().checked());
    assert_eq!(island.residence(FARMER_HOUSE).unwrap().constructed(), 4);
    assert_close(island.product(WOOD).unwrap().trade_input.get(), 2.5);
    assert!(island.settings().show_all_products.get());
    // 4 houses * 0.02 * 0.5
    assert_close(island.product(FISH).unwrap().total_demand(), 0.04);
    assert_invariants(&session);
}

#[test]
fn writes_go_back_under_the_same_key() {
    let storage = Rc::new(MemoryStorage::new());
    let session = session_with(storage.clone());
    let island = session.island();

    session.batch(|island| {
        island.factory(SAWMILL).unwrap().set_constructed(7);
        island.factory(SAWMILL).unwrap().buildings.fully_utilize_constructed.set(false);
        island.factory(FISHERY).unwrap().module(NET_MODULE).unwrap().set_checked(true);
        island.population_level(WORKERS).unwrap().need(FISH).unwrap().set_checked(false);
        island.residence(WORKER_HOUSE).unwrap().set_constructed(3);
        island.product(PEARLS).unwrap().trade_output.set(1.25);
        island.settings().consumption_factor.set(2.0);
    });
    island.settings().show_all_products.set(true);

    let expected: BTreeMap<String, String> = [
        ("2002.buildings.constructed", "7"),
        ("2002.buildings.fullyUtilizeConstructed", "false"),
        ("2005.modules.3002.checked", "true"),
        ("5001.needs.1300.checked", "false"),
        ("6002.buildings.constructed", "3"),
        ("1800.tradeList.outputAmount", "1.25"),
        ("settings.consumptionFactor", "2"),
        ("settings.showAllProducts", "true"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(storage.snapshot(), expected);
}

#[test]
fn untouched_fields_are_not_written() {
    let storage = Rc::new(MemoryStorage::new());
    let _session = session_with(storage.clone());
    assert!(storage.is_empty());
}

#[test]
fn malformed_values_fall_back_to_defaults() {
    let storage = stored(&[
        ("2002.buildings.constructed", "-3"),
        ("2002.percentBoost", "NaN"),
        ("2003.modules.3001.checked", "yes"),
        ("settings.consumptionFactor", ""),
    ]);
    let session = session_with(storage);
    let island = session.island();
    assert_eq!(island.factory(SAWMILL).unwrap().constructed(), 0);
    assert_eq!(island.factory(SAWMILL).unwrap().boost(), 1.0);
    assert!(!island.factory(POTATO_FARM).unwrap().module(FIELD_MODULE).unwrap().checked());
    assert_eq!(island.settings().consumption_factor.get(), 1.0);
}

#[test]
fn negative_decimals_fall_back_to_defaults() {
    let storage = stored(&[
        ("settings.consumptionFactor", "-1"),
        ("2002.percentBoost", "-50"),
        ("1009.tradeList.inputAmount", "-2.5"),
        ("5000.needs.1300.checked", "true"),
        ("6000.buildings.constructed", "10"),
    ]);
    let session = session_with(storage);
    let island = session.island();
    assert_eq!(island.settings().consumption_factor.get(), 1.0);
    assert_eq!(island.factory(SAWMILL).unwrap().boost(), 1.0);
    assert_eq!(island.product(WOOD).unwrap().trade_input.get(), 0.0);
    // 10 houses * 0.02
    assert_close(island.product(FISH).unwrap().total_demand(), 0.2);
    assert_invariants(&session);
}

#[test]
fn keys_for_unknown_entities_are_flagged() {
    let storage = stored(&[
        ("1001.buildings.constructed", "3"),
        ("2002.buildings.constructed", "1"),
        ("5000.needs.1300.checked", "false"),
        ("settings.language", "english"),
    ]);
    let session = session_with(storage.clone());
    let keys = storage.keys().unwrap();
    let stray = session.island().stray_keys(keys.iter().map(String::as_str));
    assert_eq!(stray, vec!["1001.buildings.constructed"]);
    assert_eq!(session.island().factory(SAWMILL).unwrap().constructed(), 1);
}

#[test]
fn write_through_can_be_turned_off() {
    let storage = Rc::new(MemoryStorage::new());
    let config = SessionConfig {
        write_through: false,
        ..SessionConfig::default()
    };
    let session = Session::open(&catalog(), storage.clone(), config);
    session.island().factory(SAWMILL).unwrap().set_constructed(3);
    assert!(storage.is_empty());
}

#[test]
fn bundle_state_survives_into_the_session() {
    let json = format!(
        r#"{{"catalog": {CATALOG}, "persisted": {{"2005.buildings.constructed": "2"}}}}"#
    );
    let bundle = Bundle::from_json_str(&json).unwrap();
    let session = Session::from_bundle(&bundle, SessionConfig::default());
    let fishery = session.island().factory(FISHERY).unwrap();
    assert_eq!(fishery.constructed(), 2);

    fishery.set_constructed(6);
    assert_eq!(
        session.storage().get("2005.buildings.constructed").unwrap().as_deref(),
        Some("6")
    );
    assert_eq!(bundle.persisted["2005.buildings.constructed"], "2");
}

#[test]
fn jsonl_storage_restores_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("islands").join("main.jsonl");
    {
        let storage = Rc::new(JsonlStorage::open(&path).unwrap());
        let session = session_with(storage);
        session.batch(|island| {
            island.factory(DISTILLERY).unwrap().set_constructed(4);
            island.factory(POTATO_FARM).unwrap().set_boost(1.5);
        });
    }

    let storage = Rc::new(JsonlStorage::open(&path).unwrap());
    let session = session_with(storage);
    let island = session.island();
    assert_eq!(island.factory(DISTILLERY).unwrap().constructed(), 4);
    assert_close(island.factory(POTATO_FARM).unwrap().boost(), 1.5);
    assert_close(island.product(POTATOES).unwrap().total_demand(), 8.0);
}
