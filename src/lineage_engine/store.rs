//! Graph-store boundary.
//!
//! The core needs three operations from any backing store: upsert an asset,
//! upsert a transformation with its derived edges, and answer path queries.
//! Store failures are fatal to the sync step only; extraction output remains
//! valid and can be re-synced without re-extracting.

use std::collections::BTreeMap;

use super::graph::{Direction, LineageGraph};
use super::model::{Asset, EntityRef, LineageEdge, Transformation};
use super::registry::EntityRegistry;

/// Error raised by a graph store that is unreachable or rejects a write
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Unavailable(String),
    Rejected(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(message) => write!(f, "graph store unavailable: {}", message),
            StoreError::Rejected(message) => write!(f, "graph store rejected write: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// Operations the core requires from a backing graph store
pub trait GraphStore {
    fn upsert_asset(&mut self, asset: &Asset) -> Result<(), StoreError>;

    fn upsert_transformation(
        &mut self,
        transformation: &Transformation,
        edges: &[LineageEdge],
    ) -> Result<(), StoreError>;

    fn find_paths(
        &self,
        asset_name: &str,
        direction: Direction,
        max_hops: usize,
    ) -> Result<Vec<Vec<EntityRef>>, StoreError>;
}

/// Pushes every canonical entity into the store, deriving edges per
/// transformation. Returns the number of upserted entities.
pub fn sync_registry(store: &mut dyn GraphStore, registry: &EntityRegistry) -> Result<usize, StoreError> {
    let mut upserted = 0;
    for asset in registry.assets() {
        store.upsert_asset(asset)?;
        upserted += 1;
    }
    for transformation in registry.transformations() {
        let edges = transformation.derived_edges();
        store.upsert_transformation(transformation, &edges)?;
        upserted += 1;
    }
    Ok(upserted)
}

/// In-memory store used by tests and local queries
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    assets: BTreeMap<String, Asset>,
    transformations: BTreeMap<String, Transformation>,
    edges: BTreeMap<String, Vec<LineageEdge>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn transformation_count(&self) -> usize {
        self.transformations.len()
    }

    fn build_graph(&self) -> LineageGraph {
        let edges: Vec<LineageEdge> = self.edges.values().flatten().cloned().collect();
        let (graph, _warnings) = LineageGraph::from_entities(
            self.assets.values().map(EntityRef::for_asset),
            self.transformations.values().map(EntityRef::for_transformation),
            edges,
        );
        graph
    }
}

impl GraphStore for MemoryGraphStore {
    fn upsert_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        self.assets.insert(asset.id.clone(), asset.clone());
        Ok(())
    }

    fn upsert_transformation(
        &mut self,
        transformation: &Transformation,
        edges: &[LineageEdge],
    ) -> Result<(), StoreError> {
        self.transformations
            .insert(transformation.id.clone(), transformation.clone());
        // replace the transformation's edge set wholesale on re-upsert
        self.edges.insert(transformation.id.clone(), edges.to_vec());
        Ok(())
    }

    fn find_paths(
        &self,
        asset_name: &str,
        direction: Direction,
        max_hops: usize,
    ) -> Result<Vec<Vec<EntityRef>>, StoreError> {
        let report = self.build_graph().lineage(asset_name, direction, max_hops);
        Ok(report.lineage_paths)
    }
}
