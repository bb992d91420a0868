//! Ponder Library - Spatial Index for Exploratory Scatterplots
//!
//! This library answers the two questions an interactive scatterplot keeps asking
//! about its points: "which items are under this lens?" and "how dense is the plot
//! here, at every scale?". The core data structure is a point quadtree that tolerates
//! exact duplicates and arbitrarily dense clusters by refusing to split cells below a
//! resolution limit.
//!
//! # Architecture
//!
//! - **[`extent`]**: Pure geometry (containment, quadrant indexing, sub-extents)
//! - **[`QuadTree`]**: Resolution-limited point quadtree over opaque items
//! - **[`Visit`]**: Pre-/post-order traversal with early-stop control
//! - **Range queries**: [`QuadTree::in_region`], [`QuadTree::in_circle`], [`QuadTree::nearest`]
//! - **[`DensityArea`]**: Multi-scale, outlier-aware density per node
//! - **[`QuadTree::local_values`]**: Bottom-up averages of arbitrary per-item vectors
//!
//! # Lifecycle
//!
//! A tree is built once per (dataset, view, resolution) snapshot and is read-only
//! afterwards. Rebuilding on viewport or resolution changes is up to the caller.
//! All operations run synchronously on the calling thread; the tree is `Sync`, so
//! read-only queries may run concurrently.

mod aggregate;
mod density;
pub mod extent;
mod query;
mod quadtree;
mod traversal;

// Public API exports
pub use aggregate::average_vectors;
pub use density::{DEFAULT_OUTLIER_ALLOWANCE, DensityArea, DensityOptions, DensityReport};
pub use extent::ExtentKey;
pub use query::{all_items_in_quadrant, find_any_in_quadrant};
pub use quadtree::{Accessor, DEFAULT_RESOLUTION_LIMIT, MAX_DEPTH, Node, QuadTree};
pub use traversal::{Visit, visit_each_node};

/// Error types for tree construction
#[derive(Debug, thiserror::Error)]
pub enum PonderError {
    #[error("Invalid resolution limit: {0} (must be finite and positive)")]
    InvalidResolution(f64),

    #[error("Invalid extent: {0}")]
    InvalidExtent(String),
}

pub type Result<T> = std::result::Result<T, PonderError>;
