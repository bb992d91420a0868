//! Bottom-up averages of per-item vectors
//!
//! A generalization of the density pass: instead of counting items, each item
//! is mapped to a vector of numbers and every retained node gets the mean of
//! its items' vectors.

use crate::extent::{ExtentKey, sub_extent};
use crate::{Node, QuadTree};
use geo::Rect;
use std::collections::HashMap;

/// Component-wise (weighted) mean of `vectors`.
///
/// The result has the length of the first vector; components missing from a
/// shorter vector count as NaN. Without `weights` every vector counts once;
/// weights missing from a shorter slice count as zero.
///
/// Returns `None` for an empty list or when the weights sum to zero.
pub fn average_vectors(vectors: &[Vec<f64>], weights: Option<&[f64]>) -> Option<Vec<f64>> {
    let first = vectors.first()?;
    let weight_of = |i: usize| weights.map_or(1.0, |w| w.get(i).copied().unwrap_or(0.0));

    let denominator: f64 = (0..vectors.len()).map(weight_of).sum();
    if denominator == 0.0 {
        return None;
    }

    let mut result = vec![0.0; first.len()];
    for (i, vector) in vectors.iter().enumerate() {
        let weight = weight_of(i);
        for (j, acc) in result.iter_mut().enumerate() {
            *acc += vector.get(j).copied().unwrap_or(f64::NAN) * weight;
        }
    }
    for acc in &mut result {
        *acc /= denominator;
    }
    Some(result)
}

/// Aggregate vector of `node`, recording it and every retained descendant in `cache`
fn node_values<T, F>(
    node: &Node<T>,
    extent: Rect<f64>,
    values: &F,
    max_resolution: Option<f64>,
    cache: &mut HashMap<ExtentKey, Vec<f64>>,
) -> Option<Vec<f64>>
where
    F: Fn(&T) -> Vec<f64>,
{
    let grouped = max_resolution.is_some_and(|m| extent.width() <= m || extent.height() <= m);

    let result = match node {
        Node::Internal { children, .. } if !grouped => {
            let mut vectors = Vec::with_capacity(4);
            let mut weights = Vec::with_capacity(4);
            for (qi, child) in children.iter().enumerate() {
                let Some(child) = child else { continue };
                if let Some(vector) =
                    node_values(child, sub_extent(&extent, qi), values, max_resolution, cache)
                {
                    vectors.push(vector);
                    weights.push(child.count() as f64);
                }
            }
            average_vectors(&vectors, Some(weights.as_slice()))
        }
        // Leaf, or the smallest cell kept at this resolution
        _ => {
            let vectors: Vec<Vec<f64>> = node.items().into_iter().map(values).collect();
            average_vectors(&vectors, None)
        }
    };

    if let Some(vector) = &result {
        cache.insert(ExtentKey::from(extent), vector.clone());
    }
    result
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T> QuadTree<T> {
    /// Mean of `values` over the items of every node down to `max_resolution`.
    ///
    /// Nodes whose width or height is at most `max_resolution` (and true leaves)
    /// average their items directly and are not descended into. Larger nodes
    /// average their children's results weighted by item count. With `None`
    /// every node down to the leaves gets an entry.
    pub fn local_values<F>(&self, values: F, max_resolution: Option<f64>) -> HashMap<ExtentKey, Vec<f64>>
    where
        F: Fn(&T) -> Vec<f64>,
    {
        #[cfg(feature = "profiling")]
        profiling::scope!("aggregate::local_values");

        let mut cache = HashMap::new();
        if let Some(root) = self.root() {
            node_values(root, self.extent(), &values, max_resolution, &mut cache);
        }
        tracing::trace!(
            "Computed local values for {} nodes (max_resolution {:?})",
            cache.len(),
            max_resolution
        );
        cache
    }
}
