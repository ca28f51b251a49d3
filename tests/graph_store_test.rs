//! Integration tests for the graph-store boundary and report payloads

use pretty_assertions::assert_eq;

use lineage_flow::lineage_engine::graph::{Direction, LineageGraph};
use lineage_flow::lineage_engine::model::{Asset, AssetKind, Transformation, TransformationKind};
use lineage_flow::lineage_engine::registry::EntityRegistry;
use lineage_flow::lineage_engine::store::{sync_registry, GraphStore, MemoryGraphStore};

fn warehouse_registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();

    registry.register_asset(Asset::new("Load", "StgCustomer", AssetKind::SourceTable));
    registry.register_asset(Asset::new("Load", "DimCustomer", AssetKind::TargetTable));
    registry.register_asset(Asset::new("Load", "MartCustomer", AssetKind::TargetTable));

    let mut load = Transformation::new("Load", "LoadCustomers", TransformationKind::Dataflow);
    load.source_asset_ids.insert("Load_StgCustomer".to_string());
    load.target_asset_ids.insert("Load_DimCustomer".to_string());
    registry.register_transformation(load);

    let mut publish = Transformation::new("Load", "PublishMart", TransformationKind::QueryTask);
    publish.source_asset_ids.insert("Load_DimCustomer".to_string());
    publish.target_asset_ids.insert("Load_MartCustomer".to_string());
    publish.logic_excerpt = Some("INSERT INTO MartCustomer SELECT * FROM DimCustomer".to_string());
    registry.register_transformation(publish);

    registry
}

#[test]
fn test_store_round_trip_answers_path_queries() {
    let registry = warehouse_registry();
    let mut store = MemoryGraphStore::new();
    let upserted = sync_registry(&mut store, &registry).unwrap();
    assert_eq!(upserted, 5);

    let paths = store
        .find_paths("MartCustomer", Direction::Upstream, 10)
        .unwrap();
    assert_eq!(paths.len(), 1);

    let names: Vec<&str> = paths[0].iter().map(|entity| entity.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["StgCustomer", "LoadCustomers", "DimCustomer", "PublishMart", "MartCustomer"]
    );
}

#[test]
fn test_store_matches_in_process_traversal() {
    let registry = warehouse_registry();
    let mut store = MemoryGraphStore::new();
    sync_registry(&mut store, &registry).unwrap();

    let (graph, _) = LineageGraph::from_registry(&registry);

    for (name, direction) in [
        ("StgCustomer", Direction::Downstream),
        ("DimCustomer", Direction::Both),
        ("MartCustomer", Direction::Upstream),
    ] {
        let stored = store.find_paths(name, direction, 10).unwrap();
        let direct = graph.lineage(name, direction, 10);
        assert_eq!(stored, direct.lineage_paths);
    }
}

#[test]
fn test_report_payload_shape() {
    let registry = warehouse_registry();
    let (graph, _) = LineageGraph::from_registry(&registry);
    let report = graph.lineage("DimCustomer", Direction::Upstream, 10);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["asset"], "DimCustomer");

    let paths = value["lineage_paths"].as_array().unwrap();
    assert_eq!(paths.len(), 1);

    let first_entity = &paths[0][0];
    assert_eq!(first_entity["id"], "Load_StgCustomer");
    assert_eq!(first_entity["name"], "StgCustomer");
    assert_eq!(first_entity["type"], "asset");

    let second_entity = &paths[0][1];
    assert_eq!(second_entity["type"], "transformation");
}

#[test]
fn test_hop_bound_holds_across_the_store_boundary() {
    let registry = warehouse_registry();
    let mut store = MemoryGraphStore::new();
    sync_registry(&mut store, &registry).unwrap();

    let paths = store
        .find_paths("StgCustomer", Direction::Downstream, 2)
        .unwrap();
    for path in &paths {
        assert!(path.len() <= 3);
    }
    assert!(!paths.is_empty());
}
