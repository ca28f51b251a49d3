use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use walkdir::WalkDir;

use crate::lineage_engine::component_tree::parse_document;
use crate::lineage_engine::extractor::{
    ConnectionInfo, ExtractOptions, ExtractionOutput, PackageExtractor,
};
use crate::lineage_engine::graph::LineageGraph;
use crate::lineage_engine::model::{Asset, LineageEdge, Transformation};
use crate::lineage_engine::registry::EntityRegistry;

use super::config::load_config;

/// One successfully extracted package document
#[derive(Debug)]
pub struct PackageExtraction {
    pub path: PathBuf,
    pub checksum: String,
    pub output: ExtractionOutput,
}

/// Per-document results of a batch run. Failures are document-scoped and
/// never abort the batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub packages: Vec<PackageExtraction>,
    pub failures: Vec<(PathBuf, String)>,
}

/// Serializable export of a full extraction run
#[derive(Debug, Serialize)]
pub struct ExportPayload {
    pub extracted_at: DateTime<Utc>,
    pub packages: Vec<PackageSummary>,
    pub assets: Vec<Asset>,
    pub transformations: Vec<Transformation>,
    pub edges: Vec<LineageEdge>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PackageSummary {
    pub name: String,
    pub checksum: String,
    pub connections: Vec<ConnectionInfo>,
}

/// Finds package definition files under the given path
pub fn find_package_files(model_path: &Path) -> Result<Vec<PathBuf>> {
    if model_path.is_file() {
        return Ok(vec![model_path.to_path_buf()]);
    }
    if !model_path.exists() {
        anyhow::bail!("Model path does not exist: {}", model_path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(model_path).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dtsx"))
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads, parses and extracts one package document
pub fn extract_document(path: &Path, extractor: &PackageExtractor) -> Result<PackageExtraction> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read package file: {}", path.display()))?;

    let package_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let tree = parse_document(&content)
        .with_context(|| format!("Failed to parse package document: {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&content);

    Ok(PackageExtraction {
        path: path.to_path_buf(),
        checksum: format!("{:x}", hasher.finalize()),
        output: extractor.extract(&tree, &package_name),
    })
}

/// Extracts all documents, fanning out across worker threads.
///
/// Documents share no mutable state, so each worker owns a chunk and returns
/// candidates by value; the registry merge stays single-threaded at the
/// caller. Results come back in input order regardless of worker count.
pub fn run_batch(files: &[PathBuf], options: &ExtractOptions) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    if files.is_empty() {
        return outcome;
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(files.len());
    let chunk_size = (files.len() + workers - 1) / workers;

    let results: Vec<(PathBuf, Result<PackageExtraction>)> = thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    let extractor = PackageExtractor::new(options.clone());
                    chunk
                        .iter()
                        .map(|path| (path.clone(), extract_document(path, &extractor)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("extraction worker panicked"))
            .collect()
    });

    for (path, result) in results {
        match result {
            Ok(package) => outcome.packages.push(package),
            Err(err) => outcome.failures.push((path, format!("{:#}", err))),
        }
    }
    outcome
}

/// Merges extracted candidates into the canonical registry, single-threaded.
pub fn merge_outputs(outcome: &BatchOutcome) -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    for package in &outcome.packages {
        registry.register(package.output.clone());
    }
    registry
}

/// Run the extract command
pub fn extract_command(
    model_path: &Path,
    format: &str,
    config_path: Option<&Path>,
    output_path: Option<&Path>,
) -> Result<()> {
    let start_time = Instant::now();
    let config = load_config(config_path)?;

    println!(
        "{}",
        format!("Extracting lineage from: {}", model_path.display()).green()
    );

    let files = find_package_files(model_path)?;
    println!("Found {} package definitions", files.len());

    let batch = run_batch(&files, &config.extract_options());

    for (path, error) in &batch.failures {
        eprintln!(
            "{}",
            format!("Error extracting {}: {}", path.display(), error).red()
        );
    }
    println!(
        "Successfully extracted {} out of {} packages in {:.2?}",
        batch.packages.len(),
        files.len(),
        start_time.elapsed()
    );

    for package in &batch.packages {
        for connection in &package.output.connections {
            match &connection.database {
                Some(database) => println!(
                    "Found connection '{}' to database: {}",
                    connection.name, database
                ),
                None => println!("Found connection '{}'", connection.name),
            }
        }
    }

    let registry = merge_outputs(&batch);
    let (graph, warnings) = LineageGraph::from_registry(&registry);
    for warning in &warnings {
        eprintln!("{}", format!("Warning: {}", warning).yellow());
    }

    let rendered = match format {
        "text" => {
            print_text_summary(&registry, &graph);
            None
        }
        "dot" => Some(graph.to_dot()),
        "json" => {
            let payload = export_payload(&batch, &registry, &graph, warnings);
            Some(serde_json::to_string_pretty(&payload)?)
        }
        "yaml" => {
            let payload = export_payload(&batch, &registry, &graph, warnings);
            Some(serde_yaml::to_string(&payload)?)
        }
        other => {
            println!(
                "Unsupported output format: {}. Using text format instead.",
                other
            );
            print_text_summary(&registry, &graph);
            None
        }
    };

    if let Some(rendered) = rendered {
        match output_path {
            Some(path) => fs::write(path, rendered)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?,
            None => println!("{}", rendered),
        }
    }

    Ok(())
}

/// Builds the serializable export for a run
pub fn export_payload(
    batch: &BatchOutcome,
    registry: &EntityRegistry,
    graph: &LineageGraph,
    warnings: Vec<String>,
) -> ExportPayload {
    ExportPayload {
        extracted_at: Utc::now(),
        packages: batch
            .packages
            .iter()
            .map(|package| PackageSummary {
                name: package.output.package.clone(),
                checksum: package.checksum.clone(),
                connections: package.output.connections.clone(),
            })
            .collect(),
        assets: registry.assets().cloned().collect(),
        transformations: registry.transformations().cloned().collect(),
        edges: graph.edges(),
        warnings,
    }
}

fn print_text_summary(registry: &EntityRegistry, graph: &LineageGraph) {
    println!("\n--- {} ---", "Canonical Entities".green());
    println!("  Assets: {}", registry.asset_count());
    println!("  Transformations: {}", registry.transformation_count());
    println!("  Lineage edges: {}", graph.edge_count());

    println!("\n--- {} ---", "Assets".green());
    for asset in registry.assets() {
        let mut line = format!("  {} [{}]", asset.name, asset.kind);
        if let Some(schema) = &asset.schema {
            line.push_str(&format!(" schema={}", schema));
        }
        if let Some(database) = &asset.database {
            line.push_str(&format!(" database={}", database));
        }
        println!("{}", line);
    }

    println!("\n--- {} ---", "Transformations".green());
    for transformation in registry.transformations() {
        println!("  {} [{}]", transformation.name, transformation.kind);
        if !transformation.source_asset_ids.is_empty() {
            println!("    reads:  {}", entity_names(registry, &transformation.source_asset_ids));
        }
        if !transformation.target_asset_ids.is_empty() {
            println!("    writes: {}", entity_names(registry, &transformation.target_asset_ids));
        }
    }
}

fn entity_names(
    registry: &EntityRegistry,
    ids: &std::collections::BTreeSet<String>,
) -> String {
    ids.iter()
        .map(|id| {
            registry
                .get_asset(id)
                .map(|asset| asset.name.clone())
                .unwrap_or_else(|| id.clone())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
