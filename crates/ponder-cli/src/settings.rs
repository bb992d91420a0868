use clap::{Parser, Subcommand};
use ponder_lib::{DEFAULT_OUTLIER_ALLOWANCE, DEFAULT_RESOLUTION_LIMIT};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Ponder - explore a synthetic scatterplot through a resolution-limited quadtree
pub struct Settings {
    /// Number of points to generate
    #[clap(short, long, default_value = "10000")]
    pub points: usize,

    /// Number of dense clusters mixed into the uniform background
    #[clap(short, long, default_value = "5")]
    pub clusters: usize,

    /// Plot width in pixels
    #[clap(long, default_value = "1024")]
    pub width: f64,

    /// Plot height in pixels
    #[clap(long, default_value = "768")]
    pub height: f64,

    /// Cells narrower or shorter than this (in pixels) are never split
    #[clap(long, default_value_t = DEFAULT_RESOLUTION_LIMIT)]
    pub resolution_limit: f64,

    /// Seed for the synthetic dataset
    #[clap(long, default_value = "42")]
    pub seed: u64,

    /// Pretty-print the JSON output
    #[clap(long, default_value = "false")]
    pub pretty: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Multi-scale density areas, largest first
    Density {
        /// Smallest cell size to report, in pixels (default: every cell)
        #[clap(long)]
        max_resolution: Option<f64>,

        /// Lower bound for the maximum density
        #[clap(long)]
        base_density: Option<f64>,

        /// Rescale relative densities from zero instead of the minimum
        #[clap(long, default_value = "false")]
        min_as_zero: bool,

        /// Standard deviations kept inside the standardized range
        #[clap(long, default_value_t = DEFAULT_OUTLIER_ALLOWANCE)]
        outlier_allowance: f64,
    },

    /// Points under a circular lens
    Lens {
        #[clap(short, long)]
        x: f64,

        #[clap(short, long)]
        y: f64,

        /// Lens radius in pixels
        #[clap(short, long, default_value = "20.0")]
        radius: f64,
    },

    /// The point nearest to a position
    Nearest {
        #[clap(short, long)]
        x: f64,

        #[clap(short, long)]
        y: f64,

        /// Ignore points farther away than this
        #[clap(short, long)]
        radius: Option<f64>,
    },

    /// Mean position and cluster share per cell
    Aggregate {
        /// Cells this small (in pixels) average their points directly
        #[clap(long)]
        max_resolution: Option<f64>,
    },
}
