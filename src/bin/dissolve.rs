//! Dissolve a vector layer: union feature geometries grouped by an optional
//! attribute field.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use dissolved_layers::{dissolve_path, DissolveOptions, GroupingMode, UnionPolicy};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dissolve")]
#[command(version, about = "Dissolve features of a vector layer by attribute", long_about = None)]
struct Cli {
    /// Input vector dataset
    input: PathBuf,
    /// Layer within the input dataset
    input_layer: String,
    /// Output vector dataset (driver inferred from the extension)
    output: PathBuf,
    /// Name of the layer to create in the output dataset
    output_layer: String,
    /// Attribute field to group by; all features form one group when omitted
    group_field: Option<String>,
    /// Behavior when the union for a group fails
    #[arg(long, value_enum, default_value = "skip")]
    on_union_failure: OnUnionFailure,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnUnionFailure {
    /// Omit the failing group and continue
    Skip,
    /// Abort the whole run
    Abort,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mode = match &cli.group_field {
        Some(field) => GroupingMode::ByField(field.clone()),
        None => GroupingMode::Ungrouped,
    };
    let options = DissolveOptions {
        mode,
        on_union_failure: match cli.on_union_failure {
            OnUnionFailure::Skip => UnionPolicy::Skip,
            OnUnionFailure::Abort => UnionPolicy::Abort,
        },
    };

    let summary = dissolve_path(
        &cli.input,
        &cli.input_layer,
        &cli.output,
        &cli.output_layer,
        &options,
    )?;

    if summary.features_skipped > 0 {
        warn!(
            "{} of {} features skipped for missing or invalid geometry",
            summary.features_skipped, summary.features_read
        );
    }
    if summary.union_failures > 0 {
        warn!("{} groups omitted after union failure", summary.union_failures);
    }
    info!(
        "wrote {} features to {} ({} read)",
        summary.groups_written,
        cli.output.display(),
        summary.features_read
    );
    Ok(())
}
