use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::lineage_engine::graph::{Direction, LineageGraph, LineageReport};

use super::config::load_config;
use super::extract::{find_package_files, merge_outputs, run_batch};

/// Run the lineage query command: extract the batch, then answer a
/// bounded-depth upstream/downstream query for one asset.
pub fn lineage_command(
    model_path: &Path,
    asset_name: &str,
    direction: &str,
    max_hops: Option<usize>,
    format: &str,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let direction: Direction = direction.parse().map_err(|message: String| anyhow!(message))?;
    let max_hops = max_hops.unwrap_or(config.max_hops);

    let files = find_package_files(model_path)?;
    let batch = run_batch(&files, &config.extract_options());
    for (path, error) in &batch.failures {
        eprintln!(
            "{}",
            format!("Error extracting {}: {}", path.display(), error).red()
        );
    }

    let registry = merge_outputs(&batch);
    let (graph, warnings) = LineageGraph::from_registry(&registry);
    for warning in &warnings {
        eprintln!("{}", format!("Warning: {}", warning).yellow());
    }

    let report = graph.lineage(asset_name, direction, max_hops);

    match format {
        "json" => {
            let rendered = serde_json::to_string_pretty(&report)
                .context("Failed to serialize lineage report")?;
            println!("{}", rendered);
        }
        "text" => print_report(&report, direction, max_hops),
        other => {
            println!(
                "Unsupported output format: {}. Using text format instead.",
                other
            );
            print_report(&report, direction, max_hops);
        }
    }

    Ok(())
}

fn print_report(report: &LineageReport, direction: Direction, max_hops: usize) {
    println!(
        "\n--- {} ---",
        format!("Lineage for {} ({}, max {} hops)", report.asset, direction, max_hops).green()
    );

    if report.lineage_paths.is_empty() {
        println!("No lineage paths found");
        return;
    }

    for (index, path) in report.lineage_paths.iter().enumerate() {
        let rendered = path
            .iter()
            .map(|entity| entity.name.as_str())
            .collect::<Vec<_>>()
            .join(" → ");
        let truncated = report
            .truncated_paths
            .get(index)
            .copied()
            .unwrap_or(false);
        let marker = if truncated { " (truncated)" } else { "" };
        println!("Path {}: {}{}", index + 1, rendered, marker);
    }
}
