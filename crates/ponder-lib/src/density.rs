//! Multi-scale density estimation
//!
//! Every node at or above a resolution floor gets a density estimate:
//!
//! - internal nodes use the uniform-area estimate `count / (width * height)`;
//! - leaves use a disk kernel around the node centroid, `count / (2π r̄²)`, where
//!   `r̄` is the mean distance of the leaf's items from the centroid. When the
//!   items are effectively coincident (`r̄ < √2 · resolution_limit`) the estimate
//!   falls back to `count / resolution_limit²`.
//!
//! Densities are then rescaled twice: a plain min/max range (`relative_density`)
//! and an outlier-clipped `mean ± k·sd` range computed over leaf-like nodes only
//! (`standard_density`).
//!
//! Degenerate inputs are not guarded: zero-area cells, a single leaf-like node
//! (sample variance `0/0`) or an empty normalization range yield NaN or infinite
//! values, which callers should treat as "no color".

use crate::extent::{ExtentKey, sub_extent};
use crate::{Node, QuadTree, Visit};
use geo::{Point, Rect};
use std::collections::HashMap;
use std::f64::consts::{PI, SQRT_2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of standard deviations kept inside the standardized range
pub const DEFAULT_OUTLIER_ALLOWANCE: f64 = 3.0;

/// Options for [`QuadTree::density_areas`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DensityOptions {
    /// Cells narrower or shorter than this are not reported (`None` reports every node)
    pub max_resolution: Option<f64>,
    /// Lower bound for the maximum density, used unless a denser region exists
    pub base_density: Option<f64>,
    /// Rescale relative densities from zero instead of from the minimum density
    pub min_as_zero: bool,
    /// Standard deviations above and below the mean leaf density that are kept
    pub outlier_allowance: f64,
}

impl Default for DensityOptions {
    fn default() -> Self {
        Self {
            max_resolution: None,
            base_density: None,
            min_as_zero: false,
            outlier_allowance: DEFAULT_OUTLIER_ALLOWANCE,
        }
    }
}

/// Density estimate for one quadtree node
#[derive(Debug)]
pub struct DensityArea<'a, T> {
    pub extent: Rect<f64>,
    /// Items per unit area
    pub density: f64,
    /// Density rescaled over the min/max range, ~[0, 1]
    pub relative_density: f64,
    /// Density rescaled over the outlier-clipped range, ~[0, 1]
    pub standard_density: f64,
    /// Count-weighted mean position of the node's items
    pub centroid: Point<f64>,
    /// True for leaves and for the finest cells reported at this resolution
    pub is_leaf: bool,
    pub node: &'a Node<T>,
}

impl<T> Clone for DensityArea<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DensityArea<'_, T> {}

/// Density areas together with the statistics used to normalize them
#[derive(Debug, Clone)]
pub struct DensityReport<'a, T> {
    /// One area per reported node, larger (containing) nodes first
    pub areas: Vec<DensityArea<'a, T>>,
    pub max_density: f64,
    pub min_density: f64,
    /// Mean density of leaf-like nodes
    pub leaf_mean: f64,
    /// Sample standard deviation of leaf-like densities (NaN for fewer than two)
    pub leaf_sd: f64,
    /// Lower end of the standardized range
    pub lower: f64,
    /// Upper end of the standardized range
    pub upper: f64,
}

/// Running mean/variance (Welford)
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Sample variance; `0/0` with a single sample
    fn variance(&self) -> f64 {
        self.m2 / (self.n as f64 - 1.0)
    }
}

/// Per-node values computed in the first pass
#[derive(Debug, Clone, Copy)]
struct NodeStats {
    centroid: Point<f64>,
    density: Option<f64>,
}

/// True if a cell is too small to be reported at `max_resolution`
#[inline]
fn below_floor(extent: &Rect<f64>, max_resolution: Option<f64>) -> bool {
    max_resolution.is_some_and(|m| extent.width() < m || extent.height() < m)
}

/// True for leaves and for nodes whose children would fall below `max_resolution`
#[inline]
fn leaf_like<T>(node: &Node<T>, extent: &Rect<f64>, max_resolution: Option<f64>) -> bool {
    node.is_leaf()
        || max_resolution.is_some_and(|m| extent.width() < 2.0 * m || extent.height() < 2.0 * m)
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T> QuadTree<T> {
    /// Density estimate of `node`, whose extent is `extent` and whose items
    /// have the given centroid
    pub fn compute_density(&self, node: &Node<T>, extent: &Rect<f64>, centroid: Point<f64>) -> f64 {
        let count = node.count();
        if count == 0 {
            return 0.0;
        }

        match node {
            Node::Internal { .. } => count as f64 / (extent.width() * extent.height()),
            Node::Leaf { items } => {
                let total_r: f64 = items
                    .iter()
                    .map(|item| {
                        let dx = self.x_of(item) - centroid.x();
                        let dy = self.y_of(item) - centroid.y();
                        (dx * dx + dy * dy).sqrt()
                    })
                    .sum();
                let mean_r = total_r / count as f64;
                let limit = self.resolution_limit();
                if mean_r < SQRT_2 * limit {
                    // Effectively a single point at this scale
                    count as f64 / (limit * limit)
                } else {
                    count as f64 / (2.0 * PI * mean_r * mean_r)
                }
            }
        }
    }

    /// Density areas for every node at or above `options.max_resolution`,
    /// larger nodes first.
    ///
    /// Areas overlap: each node's area contains its children's, so drawing them
    /// in order puts finer cells on top.
    pub fn density_areas(&self, options: &DensityOptions) -> Vec<DensityArea<'_, T>> {
        self.density_report(options).areas
    }

    /// Like [`QuadTree::density_areas`], but also returns the normalization statistics
    pub fn density_report(&self, options: &DensityOptions) -> DensityReport<'_, T> {
        #[cfg(feature = "profiling")]
        profiling::scope!("density::density_report");

        let max_resolution = options.max_resolution;
        let mut cache: HashMap<ExtentKey, NodeStats> = HashMap::new();
        let mut max_density = options.base_density;
        let mut min_density: Option<f64> = None;
        let mut leaf_stats = RunningStats::default();

        // Pass 1: centroids bottom-up for every node, densities above the floor
        self.visit(true, |node, extent| {
            let centroid = match node {
                Node::Leaf { items } => {
                    let (sx, sy) = items.iter().fold((0.0, 0.0), |(sx, sy), item| {
                        (sx + self.x_of(item), sy + self.y_of(item))
                    });
                    let n = items.len() as f64;
                    Point::new(sx / n, sy / n)
                }
                Node::Internal { count, children } => {
                    let (mut sx, mut sy) = (0.0, 0.0);
                    for (qi, child) in children.iter().enumerate() {
                        let Some(child) = child else { continue };
                        let key = ExtentKey::from(sub_extent(&extent, qi));
                        if let Some(stats) = cache.get(&key) {
                            let weight = child.count() as f64;
                            sx += stats.centroid.x() * weight;
                            sy += stats.centroid.y() * weight;
                        }
                    }
                    let n = *count as f64;
                    Point::new(sx / n, sy / n)
                }
            };

            let density = if below_floor(&extent, max_resolution) {
                None
            } else {
                let density = self.compute_density(node, &extent, centroid);
                if max_density.is_none_or(|max| density > max) {
                    max_density = Some(density);
                }
                if min_density.is_none_or(|min| density < min) {
                    min_density = Some(density);
                }
                if leaf_like(node, &extent, max_resolution) {
                    leaf_stats.push(density);
                }
                Some(density)
            };

            cache.insert(ExtentKey::from(extent), NodeStats { centroid, density });
            Visit::Continue
        });

        let max_density = max_density.unwrap_or(f64::NAN);
        let min_density = min_density.unwrap_or(f64::NAN);
        let leaf_mean = leaf_stats.mean;
        let leaf_sd = leaf_stats.variance().sqrt();
        if leaf_stats.n < 2 {
            tracing::debug!(
                "Only {} leaf-like node(s) at max_resolution {:?}; standardized densities are undefined",
                leaf_stats.n,
                max_resolution
            );
        }

        // Outlier bounds, clipped to the observed range
        let allowance = options.outlier_allowance;
        let mut lower = leaf_mean - allowance * leaf_sd;
        let mut upper = leaf_mean + allowance * leaf_sd;
        let floor = if options.min_as_zero { 0.0 } else { min_density };
        if floor > lower {
            lower = floor;
        }
        if max_density < upper {
            upper = max_density;
        }
        if max_density == min_density {
            tracing::debug!(
                "All reported densities equal {}; the min/max range is empty",
                max_density
            );
        }

        // Pass 2: emit areas top-down, pruning cells below the floor
        let mut areas = Vec::new();
        self.visit(false, |node, extent| {
            if below_floor(&extent, max_resolution) {
                return Visit::SkipChildren;
            }
            let Some(stats) = cache.get(&ExtentKey::from(extent)) else {
                return Visit::Continue;
            };
            let density = stats.density.unwrap_or(f64::NAN);
            let relative_density = if options.min_as_zero {
                density / max_density
            } else {
                (density - min_density) / (max_density - min_density)
            };
            areas.push(DensityArea {
                extent,
                density,
                relative_density,
                standard_density: (density - lower) / (upper - lower),
                centroid: stats.centroid,
                is_leaf: leaf_like(node, &extent, max_resolution),
                node,
            });
            Visit::Continue
        });

        tracing::trace!(
            "Computed {} density areas (max {}, min {}, standardized range [{}, {}])",
            areas.len(),
            max_density,
            min_density,
            lower,
            upper
        );

        DensityReport {
            areas,
            max_density,
            min_density,
            leaf_mean,
            leaf_sd,
            lower,
            upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::extent;
    use crate::quadtree::tests::{Datum, build, datum, scatter};

    fn scenario_b() -> QuadTree<Datum> {
        build(
            vec![datum(0.6, 0.6, 1), datum(0.8, 0.6, 2), datum(0.8, 0.7, 3)],
            extent(0.0, 0.0, 1.0, 1.0),
            0.5,
        )
    }

    fn min_as_zero() -> DensityOptions {
        DensityOptions {
            min_as_zero: true,
            ..DensityOptions::default()
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_density_options_default() {
        let options = DensityOptions::default();
        assert_eq!(options.max_resolution, None);
        assert_eq!(options.base_density, None);
        assert!(!options.min_as_zero);
        assert_eq!(options.outlier_allowance, 3.0);
    }

    #[test]
    fn test_scenario_areas_order_and_counts() {
        let tree = scenario_b();
        let areas = tree.density_areas(&min_as_zero());
        let extents: Vec<Rect<f64>> = areas.iter().map(|a| a.extent).collect();
        assert_eq!(
            extents,
            vec![
                extent(0.0, 0.0, 1.0, 1.0),
                extent(0.5, 0.5, 1.0, 1.0),
                extent(0.5, 0.5, 0.75, 0.75),
                extent(0.75, 0.5, 1.0, 0.75),
            ]
        );
        let counts: Vec<usize> = areas.iter().map(|a| a.node.count()).collect();
        assert_eq!(counts, vec![3, 3, 1, 2]);
        let leaves: Vec<bool> = areas.iter().map(|a| a.is_leaf).collect();
        assert_eq!(leaves, vec![false, false, true, true]);
    }

    #[test]
    fn test_scenario_densities() {
        let tree = scenario_b();
        let report = tree.density_report(&min_as_zero());
        let densities: Vec<f64> = report.areas.iter().map(|a| a.density).collect();
        // Internal: count / area. Leaves: coincident at this scale, count / limit².
        assert_eq!(densities, vec![3.0, 12.0, 4.0, 8.0]);
        assert_eq!(report.max_density, 12.0);
        assert_eq!(report.min_density, 3.0);

        let relative: Vec<f64> = report.areas.iter().map(|a| a.relative_density).collect();
        assert_close(relative[0], 0.25);
        assert_close(relative[1], 1.0);
        assert_close(relative[2], 1.0 / 3.0);
        assert_close(relative[3], 2.0 / 3.0);

        // Leaf densities 4 and 8: mean 6, sd 2√2, clipped to [0, 12]
        assert_close(report.leaf_mean, 6.0);
        assert_close(report.leaf_sd, 8.0f64.sqrt());
        assert_eq!(report.lower, 0.0);
        assert_eq!(report.upper, 12.0);
        assert_close(report.areas[0].standard_density, 0.25);
        assert_close(report.areas[1].standard_density, 1.0);
    }

    #[test]
    fn test_centroids_are_count_weighted() {
        let tree = scenario_b();
        let areas = tree.density_areas(&min_as_zero());
        let expected = Point::new((0.6 + 0.8 + 0.8) / 3.0, (0.6 + 0.6 + 0.7) / 3.0);
        for area in &areas[..2] {
            assert_close(area.centroid.x(), expected.x());
            assert_close(area.centroid.y(), expected.y());
        }
        assert_close(areas[3].centroid.x(), 0.8);
        assert_close(areas[3].centroid.y(), 0.65);
    }

    #[test]
    fn test_relative_density_from_minimum() {
        let tree = scenario_b();
        let areas = tree.density_areas(&DensityOptions::default());
        let relative: Vec<f64> = areas.iter().map(|a| a.relative_density).collect();
        // (d - 3) / (12 - 3)
        assert_close(relative[0], 0.0);
        assert_close(relative[1], 1.0);
        assert_close(relative[2], 1.0 / 9.0);
        assert_close(relative[3], 5.0 / 9.0);
    }

    #[test]
    fn test_base_density_seeds_maximum() {
        let tree = scenario_b();
        let options = DensityOptions {
            base_density: Some(24.0),
            ..min_as_zero()
        };
        let report = tree.density_report(&options);
        assert_eq!(report.max_density, 24.0);
        assert_close(report.areas[1].relative_density, 0.5);

        // A smaller base density is overridden by the data
        let options = DensityOptions {
            base_density: Some(1.0),
            ..min_as_zero()
        };
        assert_eq!(tree.density_report(&options).max_density, 12.0);
    }

    #[test]
    fn test_max_resolution_prunes_small_cells() {
        let tree = scenario_b();
        let options = DensityOptions {
            max_resolution: Some(0.5),
            ..min_as_zero()
        };
        let report = tree.density_report(&options);
        assert_eq!(report.areas.len(), 2);
        assert!(!report.areas[0].is_leaf);
        assert!(report.areas[1].is_leaf, "children would fall below the floor");

        // A single leaf-like node leaves the spread undefined
        assert!(report.leaf_sd.is_nan());
        assert!(report.areas[0].standard_density.is_nan());
        assert_close(report.areas[1].relative_density, 1.0);
    }

    #[test]
    fn test_tight_leaf_uses_resolution_fallback() {
        // The root is narrower than the limit, so both points share one leaf
        let tree = build(
            vec![datum(0.0, 0.0, 1), datum(10.0, 0.0, 2)],
            extent(0.0, 0.0, 16.0, 16.0),
            20.0,
        );
        let root = tree.root().unwrap();
        assert!(root.is_leaf());
        // mean r = 5 < √2 · 20
        let density = tree.compute_density(root, &tree.extent(), Point::new(5.0, 0.0));
        assert_close(density, 2.0 / 400.0);
    }

    #[test]
    fn test_disk_kernel_formula() {
        let tree = build(
            vec![datum(0.0, 0.0, 1), datum(10.0, 0.0, 2)],
            extent(0.0, 0.0, 16.0, 16.0),
            2.0,
        );
        let leaf = Node::Leaf {
            items: vec![datum(0.0, 0.0, 1), datum(10.0, 0.0, 2)],
        };
        // mean r = 5 ≥ √2 · 2
        let density = tree.compute_density(&leaf, &tree.extent(), Point::new(5.0, 0.0));
        assert_close(density, 2.0 / (2.0 * PI * 25.0));
    }

    #[test]
    fn test_empty_tree_has_no_areas() {
        let tree = build(Vec::new(), extent(0.0, 0.0, 1.0, 1.0), 1.0);
        assert!(tree.density_areas(&DensityOptions::default()).is_empty());
    }

    #[test]
    fn test_density_areas_idempotent() {
        let tree = build(scatter(1500, 256.0), extent(0.0, 0.0, 256.0, 256.0), 1.0);
        let options = DensityOptions {
            max_resolution: Some(4.0),
            base_density: Some(1.0 / 64.0),
            min_as_zero: true,
            ..DensityOptions::default()
        };
        let bits = |areas: &[DensityArea<'_, Datum>]| -> Vec<[u64; 5]> {
            areas
                .iter()
                .map(|a| {
                    [
                        a.density.to_bits(),
                        a.relative_density.to_bits(),
                        a.standard_density.to_bits(),
                        a.centroid.x().to_bits(),
                        a.centroid.y().to_bits(),
                    ]
                })
                .collect()
        };
        let first = tree.density_areas(&options);
        let second = tree.density_areas(&options);
        assert!(!first.is_empty());
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_reported_cells_respect_floor() {
        let tree = build(scatter(1500, 256.0), extent(0.0, 0.0, 256.0, 256.0), 1.0);
        let options = DensityOptions {
            max_resolution: Some(8.0),
            ..DensityOptions::default()
        };
        let areas = tree.density_areas(&options);
        assert_eq!(areas[0].extent, tree.extent());
        for area in &areas {
            assert!(area.extent.width() >= 8.0 && area.extent.height() >= 8.0);
            assert!(area.density.is_finite());
            assert!((0.0..=1.0).contains(&area.relative_density));
        }
        assert!(areas.iter().any(|a| a.is_leaf));
    }

    /// Twelve stacks of coincident points, one per leaf. Leaf densities equal
    /// the stack sizes, and the 4x4 quadrants are sparser than any leaf.
    fn stacked_leaves() -> QuadTree<Datum> {
        let stacks = [
            ((1.0, 1.0), 10),
            ((3.0, 1.0), 12),
            ((1.0, 3.0), 14),
            ((3.0, 3.0), 16),
            ((5.0, 1.0), 18),
            ((7.0, 1.0), 20),
            ((5.0, 3.0), 22),
            ((1.0, 5.0), 24),
            ((3.0, 5.0), 26),
            ((1.0, 7.0), 28),
            ((5.0, 5.0), 30),
            ((7.0, 7.0), 70),
        ];
        let mut data = Vec::new();
        for (i, ((x, y), n)) in stacks.into_iter().enumerate() {
            data.extend((0..n).map(|_| datum(x, y, i as u32)));
        }
        build(data, extent(0.0, 0.0, 8.0, 8.0), 1.0)
    }

    #[test]
    fn test_outlier_bounds_follow_allowance() {
        let tree = stacked_leaves();
        let counts = [10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0, 24.0, 26.0, 28.0, 30.0, 70.0];
        let mean = counts.iter().sum::<f64>() / 12.0;
        let sd = (counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / 11.0).sqrt();

        for allowance in [1.0, 1.5] {
            let options = DensityOptions {
                outlier_allowance: allowance,
                ..min_as_zero()
            };
            let report = tree.density_report(&options);
            assert_close(report.max_density, 70.0);
            assert_close(report.min_density, 52.0 / 16.0);
            assert_close(report.leaf_mean, mean);
            assert_close(report.leaf_sd, sd);

            // Neither bound reaches the observed range
            assert!(report.lower > 0.0 && report.upper < report.max_density);
            assert_close(report.lower, mean - allowance * sd);
            assert_close(report.upper, mean + allowance * sd);

            let outlier = report.areas.iter().find(|a| a.node.count() == 70).unwrap();
            assert!(outlier.is_leaf);
            assert!(outlier.standard_density > 1.0);
            assert_close(
                outlier.standard_density,
                (70.0 - report.lower) / (report.upper - report.lower),
            );
            let sparsest = report.areas.iter().find(|a| a.node.count() == 10).unwrap();
            assert!(sparsest.standard_density > 0.0 && sparsest.standard_density < 1.0);
        }

        // The lower bound is clipped to the minimum density, not to zero
        let report = tree.density_report(&DensityOptions {
            outlier_allowance: 1.5,
            ..DensityOptions::default()
        });
        assert!(mean - 1.5 * sd < report.min_density);
        assert_eq!(report.lower, report.min_density);
        assert_close(report.upper, mean + 1.5 * sd);

        let report = tree.density_report(&DensityOptions::default());
        assert_eq!(report.lower, report.min_density);
        assert_eq!(report.upper, report.max_density);
    }
}
