use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use lineage_flow::commands;
use lineage_flow::display;

/// LineageFlow (lf) CLI - data lineage extraction tool
#[derive(Parser)]
#[clap(name = "lf", about = "LineageFlow - data lineage extraction tool", version)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract lineage from pipeline packages and build the lineage graph
    Extract {
        /// Path to the pipeline package files (directory or single file)
        #[clap(short, long)]
        model_path: PathBuf,

        /// Output format for the run (text, dot, json, yaml)
        #[clap(short, long, default_value = "text")]
        format: String,

        /// Path to project configuration file (defaults to ./lineage_project.yaml)
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Write the rendered output to a file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Query upstream/downstream lineage for one asset
    Lineage {
        /// Path to the pipeline package files (directory or single file)
        #[clap(short, long)]
        model_path: PathBuf,

        /// Asset name to query (exact match)
        #[clap(short, long)]
        asset: String,

        /// Traversal direction (upstream, downstream, both)
        #[clap(short, long, default_value = "both")]
        direction: String,

        /// Maximum number of hops to traverse
        #[clap(long)]
        max_hops: Option<usize>,

        /// Output format for the report (text, json)
        #[clap(short, long, default_value = "text")]
        format: String,

        /// Path to project configuration file (defaults to ./lineage_project.yaml)
        #[clap(short, long)]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            model_path,
            format,
            config,
            output,
        } => {
            if let Err(err) = commands::extract::extract_command(
                &model_path,
                &format,
                config.as_deref(),
                output.as_deref(),
            ) {
                eprintln!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Command::Lineage {
            model_path,
            asset,
            direction,
            max_hops,
            format,
            config,
        } => {
            if let Err(err) = commands::lineage::lineage_command(
                &model_path,
                &asset,
                &direction,
                max_hops,
                &format,
                config.as_deref(),
            ) {
                eprintln!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Command::Version => {
            display::display_version();
        }
    }
}
