//! Walks a component tree and emits candidate assets and transformations.
//!
//! Extraction is pure: it reads the already-parsed tree, returns candidates
//! and performs no I/O. All state is passed in explicitly so documents can be
//! extracted in parallel and merged afterwards.

use regex::Regex;

use super::component_tree::ComponentNode;
use super::model::{Asset, AssetKind, Transformation, TransformationKind};
use super::sql_refs::SqlReferenceResolver;

const PIPELINE_TASK: &str = "Microsoft.Pipeline";
const SQL_TASK: &str = "Microsoft.ExecuteSQLTask";
const SCRIPT_TASK: &str = "Microsoft.ScriptTask";
const OLEDB_SOURCE: &str = "Microsoft.OLEDBSource";
const OLEDB_DESTINATION: &str = "Microsoft.OLEDBDestination";

/// Closed classification of raw tree nodes. First match wins; anything the
/// extractor does not model is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    DataFlowTask,
    QueryTask,
    ScriptTask,
    SourceComponent,
    DestinationComponent,
    ConnectionDeclaration,
    Other,
}

/// Classifies a raw node into its component kind.
pub fn classify(node: &ComponentNode) -> ComponentKind {
    match node.local_tag() {
        "Executable" => match node.attr_local("ExecutableType") {
            Some(PIPELINE_TASK) => ComponentKind::DataFlowTask,
            Some(SQL_TASK) => ComponentKind::QueryTask,
            Some(SCRIPT_TASK) => ComponentKind::ScriptTask,
            _ => ComponentKind::Other,
        },
        "component" => match node.attr("componentClassID") {
            Some(OLEDB_SOURCE) => ComponentKind::SourceComponent,
            Some(OLEDB_DESTINATION) => ComponentKind::DestinationComponent,
            _ => ComponentKind::Other,
        },
        "ConnectionManager" => ComponentKind::ConnectionDeclaration,
        _ => ComponentKind::Other,
    }
}

/// Extraction knobs, with defaults matching the common SSIS conventions
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Component property names that carry the table or view name
    pub table_name_properties: Vec<String>,
    /// Substring (case-insensitive) identifying the query-text property
    pub sql_property_marker: String,
    /// Upper bound on the stored logic excerpt, in characters
    pub logic_excerpt_limit: usize,
    /// Schema assumed for data-flow assets that do not declare one
    pub default_schema: Option<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            table_name_properties: vec!["TableOrViewName".to_string(), "OpenRowset".to_string()],
            sql_property_marker: "SQL".to_string(),
            logic_excerpt_limit: 500,
            default_schema: Some("dbo".to_string()),
        }
    }
}

/// A connection declaration found in a package. Connections are
/// informational: they are reported and logged, never modeled as entities.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConnectionInfo {
    pub name: String,
    pub database: Option<String>,
}

/// Candidates discovered in a single package document
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub package: String,
    pub assets: Vec<Asset>,
    pub transformations: Vec<Transformation>,
    pub connections: Vec<ConnectionInfo>,
}

/// Extracts candidate entities from parsed package documents
pub struct PackageExtractor {
    options: ExtractOptions,
    resolver: SqlReferenceResolver,
    catalog_pattern: Regex,
}

impl PackageExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            resolver: SqlReferenceResolver::new(),
            catalog_pattern: Regex::new(r"Initial Catalog=([^;]+)")
                .expect("catalog pattern compiles"),
        }
    }

    /// Walks the tree and returns every candidate asset and transformation.
    pub fn extract(&self, tree: &ComponentNode, package_name: &str) -> ExtractionOutput {
        let mut output = ExtractionOutput {
            package: package_name.to_string(),
            ..ExtractionOutput::default()
        };
        self.walk(tree, package_name, &mut output);
        output
    }

    fn walk(&self, node: &ComponentNode, package: &str, output: &mut ExtractionOutput) {
        match classify(node) {
            ComponentKind::DataFlowTask => {
                self.extract_data_flow(node, package, output);
                // source/destination components are claimed by the data flow;
                // nested executables do not occur inside a pipeline
                return;
            }
            ComponentKind::QueryTask => {
                self.extract_query_task(node, package, output);
            }
            ComponentKind::ScriptTask => {
                let name = node.attr_local("ObjectName").unwrap_or("Unknown");
                output
                    .transformations
                    .push(Transformation::new(package, name, TransformationKind::ScriptTask));
            }
            ComponentKind::ConnectionDeclaration => {
                output.connections.push(self.connection_info(node));
            }
            ComponentKind::SourceComponent
            | ComponentKind::DestinationComponent
            | ComponentKind::Other => {}
        }
        for child in &node.children {
            self.walk(child, package, output);
        }
    }

    fn extract_data_flow(&self, node: &ComponentNode, package: &str, output: &mut ExtractionOutput) {
        let name = node.attr_local("ObjectName").unwrap_or("Unknown");
        let mut transformation = Transformation::new(package, name, TransformationKind::Dataflow);

        for component in node.descendants() {
            let kind = match classify(component) {
                ComponentKind::SourceComponent => AssetKind::SourceTable,
                ComponentKind::DestinationComponent => AssetKind::TargetTable,
                _ => continue,
            };
            let declared = component.attr("name").unwrap_or(match kind {
                AssetKind::SourceTable => "Unknown Source",
                _ => "Unknown Destination",
            });
            let mut asset = Asset::new(package, declared, kind);
            if let Some(table) = self.table_property(component) {
                asset = asset.with_display_name(table);
            }
            if let Some(schema) = &self.options.default_schema {
                asset = asset.with_schema(schema);
            }
            match kind {
                AssetKind::SourceTable => {
                    transformation.source_asset_ids.insert(asset.id.clone());
                }
                _ => {
                    transformation.target_asset_ids.insert(asset.id.clone());
                }
            }
            output.assets.push(asset);
        }

        output.transformations.push(transformation);
    }

    fn extract_query_task(&self, node: &ComponentNode, package: &str, output: &mut ExtractionOutput) {
        let name = node.attr_local("ObjectName").unwrap_or("Unknown SQL Task");
        let mut transformation = Transformation::new(package, name, TransformationKind::QueryTask);

        if let Some(sql) = self.sql_property(node) {
            let refs = self.resolver.resolve(sql);
            for table in &refs.sources {
                let asset = Asset::new(package, table, AssetKind::SourceTable);
                transformation.source_asset_ids.insert(asset.id.clone());
                output.assets.push(asset);
            }
            for table in &refs.targets {
                let asset = Asset::new(package, table, AssetKind::TargetTable);
                transformation.target_asset_ids.insert(asset.id.clone());
                output.assets.push(asset);
            }
            transformation.logic_excerpt = Some(truncate_excerpt(sql, self.options.logic_excerpt_limit));
        }

        output.transformations.push(transformation);
    }

    /// First property carrying a table or view name, by configured priority
    fn table_property<'a>(&self, component: &'a ComponentNode) -> Option<&'a str> {
        component
            .descendants()
            .into_iter()
            .filter(|n| n.tag == "property")
            .find(|n| {
                n.attr("name")
                    .is_some_and(|name| self.options.table_name_properties.iter().any(|p| p == name))
            })
            .and_then(|n| n.text.as_deref())
    }

    /// First property whose name contains the SQL marker, case-insensitive
    fn sql_property<'a>(&self, task: &'a ComponentNode) -> Option<&'a str> {
        let marker = self.options.sql_property_marker.to_uppercase();
        task.descendants()
            .into_iter()
            .filter(|n| n.local_tag() == "property" || n.local_tag() == "SqlTaskData")
            .find_map(|n| {
                if n.local_tag() == "SqlTaskData" {
                    return n.attr_local("SqlStatementSource");
                }
                let name = n.attr("name")?;
                if name.to_uppercase().contains(&marker) {
                    n.text.as_deref()
                } else {
                    None
                }
            })
    }

    fn connection_info(&self, node: &ComponentNode) -> ConnectionInfo {
        let name = node.attr_local("ObjectName").unwrap_or("Unknown");
        let connection_string = node.attr_local("ConnectionString").unwrap_or("");
        let database = self
            .catalog_pattern
            .captures(connection_string)
            .map(|captures| captures[1].trim().to_string());
        ConnectionInfo {
            name: name.to_string(),
            database,
        }
    }
}

fn truncate_excerpt(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage_engine::component_tree::parse_document;
    use pretty_assertions::assert_eq;

    fn extract(document: &str) -> ExtractionOutput {
        let tree = parse_document(document).unwrap();
        PackageExtractor::new(ExtractOptions::default()).extract(&tree, "Pkg")
    }

    #[test]
    fn test_classify_task_nodes() {
        let tree = parse_document(
            r#"<DTS:Executable DTS:ExecutableType="Microsoft.Pipeline"/>"#,
        )
        .unwrap();
        assert_eq!(classify(&tree), ComponentKind::DataFlowTask);

        let tree = parse_document(
            r#"<DTS:Executable DTS:ExecutableType="Microsoft.ExecuteSQLTask"/>"#,
        )
        .unwrap();
        assert_eq!(classify(&tree), ComponentKind::QueryTask);

        let tree = parse_document(r#"<DTS:Executable DTS:ExecutableType="STOCK:SEQUENCE"/>"#).unwrap();
        assert_eq!(classify(&tree), ComponentKind::Other);

        let tree = parse_document(r#"<DTS:ConnectionManager/>"#).unwrap();
        assert_eq!(classify(&tree), ComponentKind::ConnectionDeclaration);
    }

    #[test]
    fn test_data_flow_yields_scoped_assets() {
        let output = extract(
            r#"<DTS:Executable DTS:ObjectName="Pkg">
                 <DTS:Executable DTS:ExecutableType="Microsoft.Pipeline" DTS:ObjectName="LoadCustomers">
                   <component componentClassID="Microsoft.OLEDBSource" name="Stg Source">
                     <properties>
                       <property name="OpenRowset">StgCustomer</property>
                     </properties>
                   </component>
                   <component componentClassID="Microsoft.OLEDBDestination" name="Dim Destination">
                     <properties>
                       <property name="TableOrViewName">DimCustomer</property>
                     </properties>
                   </component>
                 </DTS:Executable>
               </DTS:Executable>"#,
        );

        assert_eq!(output.transformations.len(), 1);
        let transformation = &output.transformations[0];
        assert_eq!(transformation.name, "LoadCustomers");
        assert_eq!(transformation.kind, TransformationKind::Dataflow);
        assert_eq!(transformation.source_asset_ids.len(), 1);
        assert_eq!(transformation.target_asset_ids.len(), 1);

        assert_eq!(output.assets.len(), 2);
        let source = &output.assets[0];
        assert_eq!(source.kind, AssetKind::SourceTable);
        assert_eq!(source.name, "StgCustomer");
        assert_eq!(source.id, "Pkg_Stg Source");
        assert_eq!(source.schema.as_deref(), Some("dbo"));

        let target = &output.assets[1];
        assert_eq!(target.kind, AssetKind::TargetTable);
        assert_eq!(target.name, "DimCustomer");
    }

    #[test]
    fn test_data_flow_without_name_falls_back() {
        let output = extract(r#"<DTS:Executable DTS:ExecutableType="Microsoft.Pipeline"/>"#);
        assert_eq!(output.transformations[0].name, "Unknown");
    }

    #[test]
    fn test_component_without_table_property_uses_declared_name() {
        let output = extract(
            r#"<DTS:Executable DTS:ExecutableType="Microsoft.Pipeline" DTS:ObjectName="Flow">
                 <component componentClassID="Microsoft.OLEDBSource" name="Raw Extract"/>
               </DTS:Executable>"#,
        );
        assert_eq!(output.assets[0].name, "Raw Extract");
    }

    #[test]
    fn test_query_task_resolves_references() {
        let output = extract(
            r#"<DTS:Executable DTS:ObjectName="Pkg">
                 <DTS:Executable DTS:ExecutableType="Microsoft.ExecuteSQLTask" DTS:ObjectName="Refresh Dim">
                   <property name="SqlStatementSource">INSERT INTO DimCustomer SELECT * FROM StgCustomer</property>
                 </DTS:Executable>
               </DTS:Executable>"#,
        );

        let transformation = &output.transformations[0];
        assert_eq!(transformation.kind, TransformationKind::QueryTask);
        assert!(transformation.source_asset_ids.contains("Pkg_STGCUSTOMER"));
        assert!(transformation.target_asset_ids.contains("Pkg_DIMCUSTOMER"));
        assert_eq!(
            transformation.logic_excerpt.as_deref(),
            Some("INSERT INTO DimCustomer SELECT * FROM StgCustomer")
        );

        let kinds: Vec<AssetKind> = output.assets.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AssetKind::SourceTable, AssetKind::TargetTable]);
    }

    #[test]
    fn test_query_task_without_sql_still_yields_candidate() {
        let output = extract(
            r#"<DTS:Executable DTS:ExecutableType="Microsoft.ExecuteSQLTask" DTS:ObjectName="Noop"/>"#,
        );
        let transformation = &output.transformations[0];
        assert!(transformation.source_asset_ids.is_empty());
        assert!(transformation.target_asset_ids.is_empty());
        assert_eq!(transformation.logic_excerpt, None);
    }

    #[test]
    fn test_logic_excerpt_is_bounded() {
        let long_sql = format!("SELECT * FROM t WHERE x = '{}'", "a".repeat(600));
        let document = format!(
            r#"<DTS:Executable DTS:ExecutableType="Microsoft.ExecuteSQLTask" DTS:ObjectName="Big">
                 <property name="SqlStatementSource">{}</property>
               </DTS:Executable>"#,
            long_sql
        );
        let output = extract(&document);
        let excerpt = output.transformations[0].logic_excerpt.as_deref().unwrap();
        assert_eq!(excerpt.chars().count(), 500);
    }

    #[test]
    fn test_script_task_is_informational() {
        let output = extract(
            r#"<DTS:Executable DTS:ExecutableType="Microsoft.ScriptTask" DTS:ObjectName="Cleanup"/>"#,
        );
        let transformation = &output.transformations[0];
        assert_eq!(transformation.kind, TransformationKind::ScriptTask);
        assert!(transformation.source_asset_ids.is_empty());
        assert!(output.assets.is_empty());
    }

    #[test]
    fn test_connection_catalog_extraction() {
        let output = extract(
            r#"<DTS:Executable DTS:ObjectName="Pkg">
                 <DTS:ConnectionManager DTS:ObjectName="Warehouse"
                     DTS:ConnectionString="Data Source=db01;Initial Catalog=SalesDW;Integrated Security=SSPI;"/>
               </DTS:Executable>"#,
        );
        assert_eq!(
            output.connections,
            vec![ConnectionInfo {
                name: "Warehouse".to_string(),
                database: Some("SalesDW".to_string()),
            }]
        );
    }

    #[test]
    fn test_connection_without_catalog() {
        let output = extract(
            r#"<DTS:ConnectionManager DTS:ObjectName="Files" DTS:ConnectionString="C:\drop\in.csv"/>"#,
        );
        assert_eq!(output.connections[0].database, None);
    }
}
