//! Recursive node visitor
//!
//! Pre-order visits larger nodes first (and north-western before south-eastern
//! ones); post-order visits smaller nodes first.

use crate::extent::sub_extent;
use crate::{Node, QuadTree};
use geo::Rect;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Traversal control returned by a visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Visit {
    /// Descend into this node's children
    #[default]
    Continue,
    /// Do not visit this node's children. Has no effect in post-order, where
    /// the children have already been visited.
    SkipChildren,
}

/// Call `fcn` on `node` and every node below it, passing each node's extent.
///
/// Children are visited in quadrant order (NW, NE, SW, SE).
pub fn visit_each_node<'a, T, F>(node: &'a Node<T>, extent: Rect<f64>, fcn: &mut F, post_order: bool)
where
    F: FnMut(&'a Node<T>, Rect<f64>) -> Visit,
{
    let check = if post_order {
        Visit::Continue
    } else {
        fcn(node, extent)
    };

    if check == Visit::Continue {
        if let Some(children) = node.children() {
            for (qi, child) in children.iter().enumerate() {
                if let Some(child) = child {
                    visit_each_node(child, sub_extent(&extent, qi), fcn, post_order);
                }
            }
        }
    }

    if post_order {
        fcn(node, extent);
    }
}

impl<T> QuadTree<T> {
    /// Visit every node of the tree; a no-op on an empty tree
    pub fn visit<'a, F>(&'a self, post_order: bool, mut fcn: F)
    where
        F: FnMut(&'a Node<T>, Rect<f64>) -> Visit,
    {
        if let Some(root) = self.root() {
            visit_each_node(root, self.extent(), &mut fcn, post_order);
        }
    }
}
