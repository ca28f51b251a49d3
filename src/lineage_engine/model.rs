//! Core entity types for the lineage graph: assets, transformations and the
//! derived edges between them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Builds the stable entity id for a discovery within a package.
///
/// Identity is package-scoped: the same table name discovered in two packages
/// yields two distinct entities.
pub fn entity_id(package: &str, name: &str) -> String {
    format!("{}_{}", package, name)
}

/// Kind of a data asset participating in lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    SourceTable,
    TargetTable,
    File,
    View,
    Unknown,
}

impl AssetKind {
    /// Unknown counts as "absent" for merge purposes
    pub fn is_known(self) -> bool {
        !matches!(self, AssetKind::Unknown)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetKind::SourceTable => "source_table",
            AssetKind::TargetTable => "target_table",
            AssetKind::File => "file",
            AssetKind::View => "view",
            AssetKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Kind of a transformation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    Dataflow,
    QueryTask,
    ScriptTask,
    Unknown,
}

impl TransformationKind {
    pub fn is_known(self) -> bool {
        !matches!(self, TransformationKind::Unknown)
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransformationKind::Dataflow => "dataflow",
            TransformationKind::QueryTask => "query_task",
            TransformationKind::ScriptTask => "script_task",
            TransformationKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// A named data object (table, view, file) discovered in a pipeline package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable id derived from the owning package and the discovered name
    pub id: String,
    /// Package the asset was discovered in
    pub package: String,
    /// Display name (table/view/file name)
    pub name: String,
    pub kind: AssetKind,
    pub schema: Option<String>,
    pub database: Option<String>,
    /// Ordered column names, empty when not discovered
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Asset {
    pub fn new(package: &str, declared_name: &str, kind: AssetKind) -> Self {
        Self {
            id: entity_id(package, declared_name),
            package: package.to_string(),
            name: declared_name.to_string(),
            kind,
            schema: None,
            database: None,
            columns: Vec::new(),
        }
    }

    /// Overrides the display name while keeping the identity derived from the
    /// declared name (a source component may declare one name but read from a
    /// differently named table).
    pub fn with_display_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }
}

/// A named process step that consumes and/or produces assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// Stable id derived from the owning package and the task name
    pub id: String,
    pub package: String,
    pub name: String,
    pub kind: TransformationKind,
    #[serde(default)]
    pub source_asset_ids: BTreeSet<String>,
    #[serde(default)]
    pub target_asset_ids: BTreeSet<String>,
    /// Bounded-length snippet of the underlying query/script, for audit only
    pub logic_excerpt: Option<String>,
}

impl Transformation {
    pub fn new(package: &str, name: &str, kind: TransformationKind) -> Self {
        Self {
            id: entity_id(package, name),
            package: package.to_string(),
            name: name.to_string(),
            kind,
            source_asset_ids: BTreeSet::new(),
            target_asset_ids: BTreeSet::new(),
            logic_excerpt: None,
        }
    }

    /// Edges implied by this transformation's id sets, in stable order
    pub fn derived_edges(&self) -> Vec<LineageEdge> {
        let feeds = self
            .source_asset_ids
            .iter()
            .map(|asset_id| LineageEdge::feeds_into(asset_id, &self.id));
        let produces = self
            .target_asset_ids
            .iter()
            .map(|asset_id| LineageEdge::produces(&self.id, asset_id));
        feeds.chain(produces).collect()
    }
}

/// Directed lineage relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Asset feeds into a transformation
    FeedsInto,
    /// Transformation produces an asset
    Produces,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::FeedsInto => write!(f, "FEEDS_INTO"),
            EdgeKind::Produces => write!(f, "PRODUCES"),
        }
    }
}

/// A derived edge between an asset and a transformation.
///
/// Edges are always derived from the id sets on transformations; they are
/// never stored independently of their endpoints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl LineageEdge {
    pub fn feeds_into(asset_id: &str, transformation_id: &str) -> Self {
        Self {
            source: asset_id.to_string(),
            target: transformation_id.to_string(),
            kind: EdgeKind::FeedsInto,
        }
    }

    pub fn produces(transformation_id: &str, asset_id: &str) -> Self {
        Self {
            source: transformation_id.to_string(),
            target: asset_id.to_string(),
            kind: EdgeKind::Produces,
        }
    }
}

/// Entity category used in path payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Asset,
    Transformation,
}

/// Lightweight reference to a canonical entity, as it appears in lineage
/// paths and graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl EntityRef {
    pub fn for_asset(asset: &Asset) -> Self {
        Self {
            id: asset.id.clone(),
            name: asset.name.clone(),
            entity_type: EntityType::Asset,
        }
    }

    pub fn for_transformation(transformation: &Transformation) -> Self {
        Self {
            id: transformation.id.clone(),
            name: transformation.name.clone(),
            entity_type: EntityType::Transformation,
        }
    }
}
