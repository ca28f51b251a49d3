//! Directed lineage graph and bounded-depth path queries.
//!
//! The graph is built fresh per extraction run from the canonical registry.
//! It references entities by id only and never mutates them. Dangling
//! references (a transformation pointing at an asset that was never
//! registered) are reported as warnings and their edges skipped.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;

use super::model::{EdgeKind, EntityRef, EntityType, LineageEdge};
use super::registry::EntityRegistry;

/// Traversal direction for lineage queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upstream,
    Downstream,
    Both,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "upstream" => Ok(Direction::Upstream),
            "downstream" => Ok(Direction::Downstream),
            "both" => Ok(Direction::Both),
            other => Err(format!(
                "unknown direction '{}': expected upstream, downstream or both",
                other
            )),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => write!(f, "upstream"),
            Direction::Downstream => write!(f, "downstream"),
            Direction::Both => write!(f, "both"),
        }
    }
}

/// Serializable result of a lineage query.
///
/// `lineage_paths` holds ordered entity sequences; `truncated_paths` is a
/// parallel vector marking paths cut short by the hop bound or a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct LineageReport {
    pub asset: String,
    pub lineage_paths: Vec<Vec<EntityRef>>,
    pub truncated_paths: Vec<bool>,
}

impl LineageReport {
    fn empty(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            lineage_paths: Vec::new(),
            truncated_paths: Vec::new(),
        }
    }
}

/// Directed graph over canonical entities with derived lineage edges
pub struct LineageGraph {
    graph: DiGraph<EntityRef, EdgeKind>,
    by_id: HashMap<String, NodeIndex>,
}

impl LineageGraph {
    /// Builds the graph from a registry, deriving all edges. Returns the
    /// graph together with dangling-reference warnings.
    pub fn from_registry(registry: &EntityRegistry) -> (Self, Vec<String>) {
        let edges: Vec<LineageEdge> = registry
            .transformations()
            .flat_map(|transformation| transformation.derived_edges())
            .collect();
        Self::from_entities(
            registry.assets().map(EntityRef::for_asset),
            registry.transformations().map(EntityRef::for_transformation),
            edges,
        )
    }

    /// Builds the graph from explicit entity references and edges. Used by
    /// store implementations that persist edges alongside entities.
    pub fn from_entities(
        assets: impl IntoIterator<Item = EntityRef>,
        transformations: impl IntoIterator<Item = EntityRef>,
        edges: impl IntoIterator<Item = LineageEdge>,
    ) -> (Self, Vec<String>) {
        let mut graph = DiGraph::new();
        let mut by_id = HashMap::new();
        for entity in assets.into_iter().chain(transformations) {
            let id = entity.id.clone();
            let index = graph.add_node(entity);
            by_id.insert(id, index);
        }

        let mut warnings = Vec::new();
        for edge in edges {
            match (by_id.get(&edge.source), by_id.get(&edge.target)) {
                (Some(&source), Some(&target)) => {
                    graph.add_edge(source, target, edge.kind);
                }
                (source, _) => {
                    let missing = if source.is_none() {
                        &edge.source
                    } else {
                        &edge.target
                    };
                    warnings.push(format!(
                        "skipping {} edge {} -> {}: '{}' was never registered",
                        edge.kind, edge.source, edge.target, missing
                    ));
                }
            }
        }

        (Self { graph, by_id }, warnings)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn entity(&self, id: &str) -> Option<&EntityRef> {
        self.by_id.get(id).map(|&index| &self.graph[index])
    }

    /// All edges in stable order, for export
    pub fn edges(&self) -> Vec<LineageEdge> {
        let mut edges: Vec<LineageEdge> = self
            .graph
            .edge_references()
            .map(|edge| LineageEdge {
                source: self.graph[edge.source()].id.clone(),
                target: self.graph[edge.target()].id.clone(),
                kind: *edge.weight(),
            })
            .collect();
        edges.sort();
        edges
    }

    /// Answers a bounded-depth lineage query for the asset with the given
    /// name (exact match).
    ///
    /// When the name matches assets in several packages the first in id
    /// order is used and the ambiguity is logged.
    pub fn lineage(&self, asset_name: &str, direction: Direction, max_hops: usize) -> LineageReport {
        let mut matches: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&index| {
                let entity = &self.graph[index];
                entity.entity_type == EntityType::Asset && entity.name == asset_name
            })
            .collect();
        matches.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));

        let Some(&start) = matches.first() else {
            return LineageReport::empty(asset_name);
        };
        if matches.len() > 1 {
            eprintln!(
                "Warning: asset name '{}' matches {} entities across packages; using '{}'",
                asset_name,
                matches.len(),
                self.graph[start].id
            );
        }

        let mut paths: Vec<(Vec<NodeIndex>, bool)> = Vec::new();
        if matches!(direction, Direction::Upstream | Direction::Both) {
            for (mut path, truncated) in
                self.collect_paths(start, petgraph::Direction::Incoming, max_hops)
            {
                // upstream paths run source -> ... -> queried asset
                path.reverse();
                paths.push((path, truncated));
            }
        }
        if matches!(direction, Direction::Downstream | Direction::Both) {
            paths.extend(self.collect_paths(start, petgraph::Direction::Outgoing, max_hops));
        }

        let mut report = LineageReport::empty(asset_name);
        for (path, truncated) in paths {
            report
                .lineage_paths
                .push(path.iter().map(|&index| self.graph[index].clone()).collect());
            report.truncated_paths.push(truncated);
        }
        report
    }

    fn collect_paths(
        &self,
        start: NodeIndex,
        direction: petgraph::Direction,
        max_hops: usize,
    ) -> Vec<(Vec<NodeIndex>, bool)> {
        let mut results = Vec::new();
        if self.sorted_neighbors(start, direction).is_empty() {
            // a node with no lineage in this direction yields no paths
            return results;
        }
        let mut path = vec![start];
        self.walk_paths(start, direction, max_hops, &mut path, &mut results);
        results
    }

    fn walk_paths(
        &self,
        node: NodeIndex,
        direction: petgraph::Direction,
        hops_left: usize,
        path: &mut Vec<NodeIndex>,
        results: &mut Vec<(Vec<NodeIndex>, bool)>,
    ) {
        let neighbors = self.sorted_neighbors(node, direction);
        if neighbors.is_empty() {
            results.push((path.clone(), false));
            return;
        }
        if hops_left == 0 {
            results.push((path.clone(), true));
            return;
        }
        let mut extended = false;
        for next in neighbors {
            if path.contains(&next) {
                // cycle back into the current path
                continue;
            }
            extended = true;
            path.push(next);
            self.walk_paths(next, direction, hops_left - 1, path, results);
            path.pop();
        }
        if !extended {
            results.push((path.clone(), true));
        }
    }

    fn sorted_neighbors(&self, node: NodeIndex, direction: petgraph::Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        neighbors.dedup();
        neighbors
    }

    /// Graphviz rendering of the whole lineage graph
    pub fn to_dot(&self) -> String {
        let mut result = String::from("digraph lineage {\n");
        result.push_str("  rankdir=LR;\n");
        result.push_str("  node [shape=box];\n");

        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        for index in indices {
            let entity = &self.graph[index];
            match entity.entity_type {
                EntityType::Asset => {
                    result.push_str(&format!(
                        "  \"{}\" [label=\"{}\", style=filled, fillcolor=lightblue];\n",
                        entity.id, entity.name
                    ));
                }
                EntityType::Transformation => {
                    result.push_str(&format!(
                        "  \"{}\" [label=\"{}\", shape=ellipse];\n",
                        entity.id, entity.name
                    ));
                }
            }
        }

        for edge in self.edges() {
            result.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                edge.source, edge.target, edge.kind
            ));
        }

        result.push_str("}\n");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage_engine::model::{Asset, AssetKind, Transformation, TransformationKind};
    use pretty_assertions::assert_eq;

    fn single_step_registry() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry.register_asset(Asset::new("Pkg", "StgCustomer", AssetKind::SourceTable));
        registry.register_asset(Asset::new("Pkg", "DimCustomer", AssetKind::TargetTable));
        let mut load = Transformation::new("Pkg", "LoadCustomers", TransformationKind::Dataflow);
        load.source_asset_ids.insert("Pkg_StgCustomer".to_string());
        load.target_asset_ids.insert("Pkg_DimCustomer".to_string());
        registry.register_transformation(load);
        registry
    }

    #[test]
    fn test_build_derives_edges() {
        let (graph, warnings) = LineageGraph::from_registry(&single_step_registry());
        assert!(warnings.is_empty());
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.entity("Pkg_StgCustomer").unwrap().name, "StgCustomer");
        assert!(graph.entity("Pkg_Nope").is_none());

        let edges = graph.edges();
        assert_eq!(
            edges,
            vec![
                LineageEdge::produces("Pkg_LoadCustomers", "Pkg_DimCustomer"),
                LineageEdge::feeds_into("Pkg_StgCustomer", "Pkg_LoadCustomers"),
            ]
        );
    }

    #[test]
    fn test_upstream_path_runs_source_to_asset() {
        let (graph, _) = LineageGraph::from_registry(&single_step_registry());
        let report = graph.lineage("DimCustomer", Direction::Upstream, 10);

        assert_eq!(report.lineage_paths.len(), 1);
        let names: Vec<&str> = report.lineage_paths[0].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["StgCustomer", "LoadCustomers", "DimCustomer"]);
        assert_eq!(report.truncated_paths, vec![false]);
    }

    #[test]
    fn test_downstream_path() {
        let (graph, _) = LineageGraph::from_registry(&single_step_registry());
        let report = graph.lineage("StgCustomer", Direction::Downstream, 10);

        let names: Vec<&str> = report.lineage_paths[0].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["StgCustomer", "LoadCustomers", "DimCustomer"]);
    }

    #[test]
    fn test_both_directions_union() {
        let mut registry = single_step_registry();
        registry.register_asset(Asset::new("Pkg", "MartCustomer", AssetKind::TargetTable));
        let mut publish = Transformation::new("Pkg", "Publish", TransformationKind::QueryTask);
        publish.source_asset_ids.insert("Pkg_DimCustomer".to_string());
        publish.target_asset_ids.insert("Pkg_MartCustomer".to_string());
        registry.register_transformation(publish);

        let (graph, _) = LineageGraph::from_registry(&registry);
        let report = graph.lineage("DimCustomer", Direction::Both, 10);
        assert_eq!(report.lineage_paths.len(), 2);
    }

    #[test]
    fn test_unknown_asset_yields_empty_report() {
        let (graph, _) = LineageGraph::from_registry(&single_step_registry());
        let report = graph.lineage("Nope", Direction::Both, 10);
        assert!(report.lineage_paths.is_empty());
    }

    #[test]
    fn test_asset_without_lineage_yields_no_paths() {
        let mut registry = EntityRegistry::new();
        registry.register_asset(Asset::new("Pkg", "Orphan", AssetKind::Unknown));
        let (graph, _) = LineageGraph::from_registry(&registry);
        let report = graph.lineage("Orphan", Direction::Both, 10);
        assert!(report.lineage_paths.is_empty());
    }

    #[test]
    fn test_hop_bound_truncates() {
        let mut registry = EntityRegistry::new();
        for name in ["A", "B", "C"] {
            registry.register_asset(Asset::new("Pkg", name, AssetKind::Unknown));
        }
        for (task, source, target) in [("T1", "Pkg_A", "Pkg_B"), ("T2", "Pkg_B", "Pkg_C")] {
            let mut t = Transformation::new("Pkg", task, TransformationKind::QueryTask);
            t.source_asset_ids.insert(source.to_string());
            t.target_asset_ids.insert(target.to_string());
            registry.register_transformation(t);
        }

        let (graph, _) = LineageGraph::from_registry(&registry);
        let report = graph.lineage("A", Direction::Downstream, 2);

        assert_eq!(report.lineage_paths.len(), 1);
        assert_eq!(report.lineage_paths[0].len(), 3); // max_hops + 1 entities
        assert_eq!(report.truncated_paths, vec![true]);
    }

    #[test]
    fn test_cycle_terminates_and_marks_truncated() {
        let mut registry = EntityRegistry::new();
        registry.register_asset(Asset::new("Pkg", "Accum", AssetKind::TargetTable));
        let mut t = Transformation::new("Pkg", "SelfLoad", TransformationKind::QueryTask);
        t.source_asset_ids.insert("Pkg_Accum".to_string());
        t.target_asset_ids.insert("Pkg_Accum".to_string());
        registry.register_transformation(t);

        let (graph, _) = LineageGraph::from_registry(&registry);
        let report = graph.lineage("Accum", Direction::Downstream, 10);

        for (path, truncated) in report.lineage_paths.iter().zip(&report.truncated_paths) {
            assert!(path.len() <= 11);
            assert!(*truncated);
        }
        assert!(!report.lineage_paths.is_empty());
    }

    #[test]
    fn test_dangling_reference_is_warned_and_skipped() {
        let mut registry = EntityRegistry::new();
        registry.register_asset(Asset::new("Pkg", "Real", AssetKind::SourceTable));
        let mut t = Transformation::new("Pkg", "Load", TransformationKind::Dataflow);
        t.source_asset_ids.insert("Pkg_Real".to_string());
        t.target_asset_ids.insert("Pkg_Ghost".to_string());
        registry.register_transformation(t);

        let (graph, warnings) = LineageGraph::from_registry(&registry);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Pkg_Ghost"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_ambiguous_name_picks_first_id_deterministically() {
        let mut registry = EntityRegistry::new();
        for package in ["PkgB", "PkgA"] {
            registry.register_asset(Asset::new(package, "Shared", AssetKind::SourceTable));
            let mut t = Transformation::new(package, "Load", TransformationKind::Dataflow);
            t.source_asset_ids.insert(format!("{}_Shared", package));
            registry.register_transformation(t);
        }

        let (graph, _) = LineageGraph::from_registry(&registry);
        let report = graph.lineage("Shared", Direction::Downstream, 10);
        assert_eq!(report.lineage_paths[0][0].id, "PkgA_Shared");
    }

    #[test]
    fn test_dot_rendering() {
        let (graph, _) = LineageGraph::from_registry(&single_step_registry());
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph lineage {"));
        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("\"Pkg_StgCustomer\" -> \"Pkg_LoadCustomers\" [label=\"FEEDS_INTO\"]"));
        assert!(dot.contains("\"Pkg_LoadCustomers\" -> \"Pkg_DimCustomer\" [label=\"PRODUCES\"]"));
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("Upstream".parse::<Direction>().unwrap(), Direction::Upstream);
        assert_eq!("both".parse::<Direction>().unwrap(), Direction::Both);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
