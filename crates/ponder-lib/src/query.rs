//! Region, circle and nearest-item queries
//!
//! Rectangle queries prune by [`quad_indices`], which is deliberately
//! over-inclusive; leaves are then scanned with an exact inclusive test. Circle
//! queries run a rectangle query over the circle's bounding square and filter
//! the candidates by exact distance.

use crate::extent::{extent, quad_index, quad_indices, region_contains, region_envelops, sub_extent};
use crate::{Node, QuadTree};
use geo::Rect;

/// All items under `node`, in quadrant order; empty for `None`
pub fn all_items_in_quadrant<T>(node: Option<&Node<T>>) -> Vec<&T> {
    node.map(Node::items).unwrap_or_default()
}

/// All items under `node` (whose extent is `extent`) that lie inside `region`.
///
/// Result order follows quadrant order and is not stable across different regions.
pub fn find_any_in_quadrant<'a, T>(
    node: &'a Node<T>,
    extent: Rect<f64>,
    region: &Rect<f64>,
    getx: &dyn Fn(&T) -> f64,
    gety: &dyn Fn(&T) -> f64,
) -> Vec<&'a T> {
    let mut results = Vec::new();
    collect_in_region(node, extent, region, getx, gety, &mut results);
    results
}

fn collect_in_region<'a, T>(
    node: &'a Node<T>,
    extent: Rect<f64>,
    region: &Rect<f64>,
    getx: &dyn Fn(&T) -> f64,
    gety: &dyn Fn(&T) -> f64,
    results: &mut Vec<&'a T>,
) {
    match node {
        Node::Internal { children, .. } => {
            let quads_touched = quad_indices(&extent, region);
            if quads_touched.len() == 4 && region_envelops(region, &extent) {
                // Everything below is inside
                node.collect_items(results);
                return;
            }
            for qi in quads_touched {
                if let Some(child) = &children[qi] {
                    collect_in_region(child, sub_extent(&extent, qi), region, getx, gety, results);
                }
            }
        }
        Node::Leaf { items } => {
            results.extend(
                items
                    .iter()
                    .filter(|&item| region_contains(region, getx(item), gety(item))),
            );
        }
    }
}

/// Track the best candidate of a nearest-item search
fn find_nearest_in_quadrant<'a, T>(
    node: &'a Node<T>,
    extent: Rect<f64>,
    x: f64,
    y: f64,
    radius: f64,
    tree: &QuadTree<T>,
    best: &mut Option<(&'a T, f64)>,
) {
    match node {
        Node::Internal { children, .. } => {
            // Containing quadrant first, so the reach shrinks early
            let fq = quad_index(&extent, x, y);
            if let Some(child) = &children[fq] {
                find_nearest_in_quadrant(child, sub_extent(&extent, fq), x, y, radius, tree, best);
            }

            let r = best.map_or(radius, |(_, d)| d.min(radius));
            let around = self::extent(x - r, y - r, x + r, y + r);
            for qi in quad_indices(&extent, &around) {
                if qi == fq {
                    continue;
                }
                if let Some(child) = &children[qi] {
                    let r = best.map_or(radius, |(_, d)| d.min(radius));
                    find_nearest_in_quadrant(child, sub_extent(&extent, qi), x, y, r, tree, best);
                }
            }
        }
        Node::Leaf { items } => {
            for item in items {
                let dx = x - tree.x_of(item);
                let dy = y - tree.y_of(item);
                let dist = (dx * dx + dy * dy).sqrt();
                if dist <= radius && best.is_none_or(|(_, b)| dist < b) {
                    *best = Some((item, dist));
                }
            }
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T> QuadTree<T> {
    /// All items inside `region` (inclusive bounds)
    pub fn in_region(&self, region: &Rect<f64>) -> Vec<&T> {
        let Some(root) = self.root() else {
            return Vec::new();
        };
        let (getx, gety) = self.accessors();
        find_any_in_quadrant(root, self.extent(), region, &**getx, &**gety)
    }

    /// All items within Euclidean distance `r` of `(cx, cy)` (inclusive)
    pub fn in_circle(&self, cx: f64, cy: f64, r: f64) -> Vec<&T> {
        let square = extent(cx - r, cy - r, cx + r, cy + r);
        let mut candidates = self.in_region(&square);
        candidates.retain(|item| {
            let dx = self.x_of(item) - cx;
            let dy = self.y_of(item) - cy;
            (dx * dx + dy * dy).sqrt() <= r
        });
        candidates
    }

    /// The item nearest to `(x, y)` and its distance.
    ///
    /// With a `radius`, only items at most that far away are considered. Ties
    /// keep the first item found, searching the quadrant containing `(x, y)` first.
    pub fn nearest(&self, x: f64, y: f64, radius: Option<f64>) -> Option<(&T, f64)> {
        let root = self.root()?;
        let mut best = None;
        find_nearest_in_quadrant(
            root,
            self.extent(),
            x,
            y,
            radius.unwrap_or(f64::INFINITY),
            self,
            &mut best,
        );
        best
    }
}
