//! Synthetic scatterplot data
//!
//! Half of the points are spread uniformly over the plot; the rest fall into
//! roughly Gaussian clusters. Every tenth point of each cluster, starting with
//! its first, lands exactly on the cluster center, so every cluster with more
//! than ten points contains exact duplicates.

use crate::settings::Settings;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// One plotted data record, positioned in screen pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    /// Cluster the record was drawn from, `None` for background points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Cluster {
    x: f64,
    y: f64,
    spread: f64,
}

/// Sum of three uniforms, a cheap bell curve on [-1.5, 1.5]
fn bell<R: Rng>(rng: &mut R) -> f64 {
    rng.random::<f64>() + rng.random::<f64>() + rng.random::<f64>() - 1.5
}

/// Generate the dataset described by `settings`
pub fn generate(settings: &Settings) -> anyhow::Result<Vec<Record>> {
    let (width, height) = (settings.width, settings.height);
    if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
        anyhow::bail!("Plot size must be positive, got {}x{}", width, height);
    }

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let clusters: Vec<Cluster> = (0..settings.clusters)
        .map(|_| Cluster {
            x: rng.random_range(0.0..width),
            y: rng.random_range(0.0..height),
            spread: rng.random_range(2.0..30.0),
        })
        .collect();

    let records: Vec<Record> = (0..settings.points)
        .map(|id| {
            if clusters.is_empty() || id % 2 == 0 {
                return Record {
                    id,
                    x: rng.random_range(0.0..=width),
                    y: rng.random_range(0.0..=height),
                    cluster: None,
                };
            }

            // Cluster points are dealt out round-robin
            let ci = (id / 2) % clusters.len();
            let member = id / 2 / clusters.len();
            let c = clusters[ci];
            let (x, y) = if member % 10 == 0 {
                (c.x, c.y)
            } else {
                (
                    (c.x + bell(&mut rng) * c.spread).clamp(0.0, width),
                    (c.y + bell(&mut rng) * c.spread).clamp(0.0, height),
                )
            };
            Record {
                id,
                x,
                y,
                cluster: Some(ci),
            }
        })
        .collect();

    tracing::info!(
        "Generated {} points ({} clusters) on a {}x{} plot",
        records.len(),
        clusters.len(),
        width,
        height
    );
    Ok(records)
}
