use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::lineage_engine::extractor::ExtractOptions;

/// Default project configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "lineage_project.yaml";

/// Project configuration for an extraction run
#[derive(Debug, Serialize, Deserialize)]
pub struct LineageProjectConfig {
    /// Name of the project
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Component property names that carry a table or view name
    #[serde(default = "default_table_name_properties")]
    pub table_name_properties: Vec<String>,

    /// Substring identifying the query-text property, case-insensitive
    #[serde(default = "default_sql_property_marker")]
    pub sql_property_marker: String,

    /// Maximum number of characters kept as a transformation logic excerpt
    #[serde(default = "default_logic_excerpt_limit")]
    pub logic_excerpt_limit: usize,

    /// Schema assumed for data-flow assets that do not declare one
    #[serde(default = "default_schema")]
    pub default_schema: Option<String>,

    /// Default hop bound for lineage queries
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Additional project configurations
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

fn default_project_name() -> String {
    "lineage_project".to_string()
}

fn default_table_name_properties() -> Vec<String> {
    vec!["TableOrViewName".to_string(), "OpenRowset".to_string()]
}

fn default_sql_property_marker() -> String {
    "SQL".to_string()
}

fn default_logic_excerpt_limit() -> usize {
    500
}

fn default_schema() -> Option<String> {
    Some("dbo".to_string())
}

fn default_max_hops() -> usize {
    10
}

impl Default for LineageProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            table_name_properties: default_table_name_properties(),
            sql_property_marker: default_sql_property_marker(),
            logic_excerpt_limit: default_logic_excerpt_limit(),
            default_schema: default_schema(),
            max_hops: default_max_hops(),
            extra: HashMap::new(),
        }
    }
}

impl LineageProjectConfig {
    /// Extraction knobs for the engine
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            table_name_properties: self.table_name_properties.clone(),
            sql_property_marker: self.sql_property_marker.clone(),
            logic_excerpt_limit: self.logic_excerpt_limit,
            default_schema: self.default_schema.clone(),
        }
    }
}

/// Reads the configuration from the given path, or from
/// `./lineage_project.yaml` when present, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<LineageProjectConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if !default_path.exists() {
                return Ok(LineageProjectConfig::default());
            }
            default_path.to_path_buf()
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
