//! Ponder CLI - query a synthetic scatterplot and print the results as JSON

mod dataset;
mod logging;
mod report;
mod settings;

use anyhow::Context;
use clap::Parser;
use dataset::Record;
use ponder_lib::{DensityOptions, QuadTree};
use ponder_lib::extent::extent;
use report::{DensitySummary, LensReport, NearestReport, aggregate_entries};
use serde::Serialize;
use settings::{Command, Settings};
use std::io::Write;

fn main() -> anyhow::Result<()> {
    logging::setup_logging();
    let settings = Settings::parse();
    let stdout = std::io::stdout();
    run(&settings, &mut stdout.lock())
}

/// Build the tree for `settings` and write the subcommand's result to `out`
fn run<W: Write>(settings: &Settings, out: &mut W) -> anyhow::Result<()> {
    #[cfg(feature = "profiling")]
    profiling::scope!("ponder::run");

    let records = dataset::generate(settings)?;
    let tree = QuadTree::build(
        records,
        extent(0.0, 0.0, settings.width, settings.height),
        |r: &Record| r.x,
        |r: &Record| r.y,
        settings.resolution_limit,
    )
    .context("Failed to build quadtree")?;
    tracing::info!(
        "Indexed {} points at resolution {} ({} dropped)",
        tree.len(),
        tree.resolution_limit(),
        tree.dropped()
    );

    match &settings.command {
        Command::Density {
            max_resolution,
            base_density,
            min_as_zero,
            outlier_allowance,
        } => {
            let options = DensityOptions {
                max_resolution: *max_resolution,
                base_density: *base_density,
                min_as_zero: *min_as_zero,
                outlier_allowance: *outlier_allowance,
            };
            let report = tree.density_report(&options);
            tracing::info!("Computed {} density areas", report.areas.len());
            emit(out, &DensitySummary::new(options, &report), settings.pretty)
        }
        Command::Lens { x, y, radius } => {
            let items = tree.in_circle(*x, *y, *radius);
            tracing::info!("{} points under the lens", items.len());
            let report = LensReport {
                center: [*x, *y],
                radius: *radius,
                count: items.len(),
                items,
            };
            emit(out, &report, settings.pretty)
        }
        Command::Nearest { x, y, radius } => {
            let found = tree.nearest(*x, *y, *radius);
            if found.is_none() {
                tracing::warn!("No point found near ({}, {})", x, y);
            }
            let report = NearestReport {
                position: [*x, *y],
                item: found.map(|(item, _)| item),
                distance: found.map(|(_, distance)| distance),
            };
            emit(out, &report, settings.pretty)
        }
        Command::Aggregate { max_resolution } => {
            let clusters = settings.clusters;
            // Mean position, then the share of points in each cluster
            let values = tree.local_values(
                |r: &Record| {
                    let mut v = vec![0.0; 2 + clusters];
                    v[0] = r.x;
                    v[1] = r.y;
                    if let Some(c) = r.cluster {
                        v[2 + c] = 1.0;
                    }
                    v
                },
                *max_resolution,
            );
            tracing::info!("Aggregated {} cells", values.len());
            emit(out, &aggregate_entries(values), settings.pretty)
        }
    }
}

fn emit<W: Write, S: Serialize>(out: &mut W, value: &S, pretty: bool) -> anyhow::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}
