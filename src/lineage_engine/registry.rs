//! Canonical entity registry.
//!
//! Deduplicates candidate assets and transformations under their
//! package-scoped identity and merges duplicates with an explicit,
//! order-deterministic policy. The registry exclusively owns canonical
//! identity; the graph model only references entities by id.

use std::collections::BTreeMap;

use super::extractor::ExtractionOutput;
use super::model::{Asset, Transformation};

/// Merges a later asset candidate into the current canonical asset.
///
/// A later candidate fills fields that are absent or empty; a present
/// non-empty field is never overwritten. `Unknown` kind counts as absent.
pub fn merge_asset(current: &mut Asset, candidate: Asset) {
    debug_assert_eq!(current.id, candidate.id, "asset merge across identities");
    debug_assert_eq!(current.package, candidate.package, "asset merge across packages");

    if !current.kind.is_known() && candidate.kind.is_known() {
        current.kind = candidate.kind;
    }
    if is_absent(&current.schema) && !is_absent(&candidate.schema) {
        current.schema = candidate.schema;
    }
    if is_absent(&current.database) && !is_absent(&candidate.database) {
        current.database = candidate.database;
    }
    if current.columns.is_empty() && !candidate.columns.is_empty() {
        current.columns = candidate.columns;
    }
}

/// Merges a later transformation candidate into the current canonical one.
///
/// Source/target id sets are unioned; the logic excerpt keeps the first
/// non-empty value seen.
pub fn merge_transformation(current: &mut Transformation, candidate: Transformation) {
    debug_assert_eq!(current.id, candidate.id, "transformation merge across identities");

    if !current.kind.is_known() && candidate.kind.is_known() {
        current.kind = candidate.kind;
    }
    current.source_asset_ids.extend(candidate.source_asset_ids);
    current.target_asset_ids.extend(candidate.target_asset_ids);
    if is_absent(&current.logic_excerpt) && !is_absent(&candidate.logic_excerpt) {
        current.logic_excerpt = candidate.logic_excerpt;
    }
}

fn is_absent(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, str::is_empty)
}

/// Canonical entities for one extraction run
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    assets: BTreeMap<String, Asset>,
    transformations: BTreeMap<String, Transformation>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every candidate from one extracted document.
    ///
    /// Must be called from a single thread; parallel extraction hands its
    /// outputs to one merging writer.
    pub fn register(&mut self, output: ExtractionOutput) {
        for asset in output.assets {
            self.register_asset(asset);
        }
        for transformation in output.transformations {
            self.register_transformation(transformation);
        }
    }

    pub fn register_asset(&mut self, candidate: Asset) {
        match self.assets.entry(candidate.id.clone()) {
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                merge_asset(entry.get_mut(), candidate);
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
        }
    }

    pub fn register_transformation(&mut self, candidate: Transformation) {
        match self.transformations.entry(candidate.id.clone()) {
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                merge_transformation(entry.get_mut(), candidate);
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
        }
    }

    pub fn get_asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    pub fn get_transformation(&self, id: &str) -> Option<&Transformation> {
        self.transformations.get(id)
    }

    pub fn contains_asset(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    /// Canonical assets in stable id order
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// Canonical transformations in stable id order
    pub fn transformations(&self) -> impl Iterator<Item = &Transformation> {
        self.transformations.values()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn transformation_count(&self) -> usize {
        self.transformations.len()
    }
}
