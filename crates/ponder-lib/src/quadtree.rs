//! Resolution-limited point quadtree
//!
//! Unlike a classic region quadtree, a leaf here may hold many items: cells stop
//! splitting once they are narrower than the resolution limit, and a leaf whose
//! points are exactly coincident never splits at all. Dense clusters and exact
//! duplicates therefore accumulate in a single cell instead of recursing forever.

use crate::extent::{halving_stalls, quad_index, region_contains, sub_extent};
use crate::{PonderError, Result};
use geo::{Point, Rect};
use std::fmt;

/// Default minimum cell width/height (one screen pixel)
pub const DEFAULT_RESOLUTION_LIMIT: f64 = 1.0;

/// Maximum depth of the quadtree.
///
/// Splitting also stops early on any cell whose halving would reproduce the
/// cell itself (bounds a couple of ulps apart), so every node has a distinct
/// extent.
pub const MAX_DEPTH: u32 = 64;

/// Maps an item to one of its coordinates in tree space (e.g. screen pixels)
pub type Accessor<T> = Box<dyn Fn(&T) -> f64 + Send + Sync>;

/// A single node of the quadtree
#[derive(Debug, Clone, PartialEq)]
pub enum Node<T> {
    /// Items stored in insertion order. Never empty.
    Leaf { items: Vec<T> },
    /// Four quadrants in NW, NE, SW, SE order; empty quadrants are `None`.
    Internal {
        /// Total number of items below this node
        count: usize,
        children: Box<[Option<Node<T>>; 4]>,
    },
}

/// Insertion parameters shared by every level of one insert
struct InsertCtx<'a, T> {
    getx: &'a Accessor<T>,
    gety: &'a Accessor<T>,
    resolution_limit: f64,
}

impl<T> Node<T> {
    fn leaf(item: T) -> Self {
        Node::Leaf { items: vec![item] }
    }

    /// Number of items reachable from this node
    #[inline]
    pub fn count(&self) -> usize {
        match self {
            Node::Leaf { items } => items.len(),
            Node::Internal { count, .. } => *count,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// The four child slots of an internal node
    #[inline]
    pub fn children(&self) -> Option<&[Option<Node<T>>; 4]> {
        match self {
            Node::Leaf { .. } => None,
            Node::Internal { children, .. } => Some(children),
        }
    }

    /// The items held directly by a leaf
    #[inline]
    pub fn leaf_items(&self) -> Option<&[T]> {
        match self {
            Node::Leaf { items } => Some(items),
            Node::Internal { .. } => None,
        }
    }

    /// All items under this node, in quadrant order
    pub fn items(&self) -> Vec<&T> {
        let mut results = Vec::with_capacity(self.count());
        self.collect_items(&mut results);
        results
    }

    pub(crate) fn collect_items<'a>(&'a self, results: &mut Vec<&'a T>) {
        match self {
            Node::Leaf { items } => results.extend(items.iter()),
            Node::Internal { children, .. } => {
                for child in children.iter().flatten() {
                    child.collect_items(results);
                }
            }
        }
    }

    /// Add an item at `(x, y)` somewhere below this node
    fn insert(
        &mut self,
        extent: Rect<f64>,
        item: T,
        x: f64,
        y: f64,
        ctx: &InsertCtx<'_, T>,
        depth: u32,
    ) {
        match self {
            Node::Internal { count, children } => {
                *count += 1;
                let qi = quad_index(&extent, x, y);
                match children[qi].as_mut() {
                    Some(child) => {
                        child.insert(sub_extent(&extent, qi), item, x, y, ctx, depth + 1)
                    }
                    None => children[qi] = Some(Node::leaf(item)),
                }
            }
            Node::Leaf { items } => {
                // Can't split, just grow
                if extent.width() < ctx.resolution_limit
                    || extent.height() < ctx.resolution_limit
                    || depth >= MAX_DEPTH
                    || halving_stalls(&extent)
                {
                    items.push(item);
                    return;
                }

                // A leaf holds one point, or stacked copies of it
                let Some(first) = items.first() else {
                    items.push(item);
                    return;
                };
                let ox = (ctx.getx)(first);
                let oy = (ctx.gety)(first);
                if ox == x && oy == y {
                    // A duplicate: splitting won't separate it
                    items.push(item);
                    return;
                }

                // Push the existing stack down one level, then route the new item
                let oq = quad_index(&extent, ox, oy);
                let stacked = std::mem::take(items);
                let count = stacked.len();
                let mut children: Box<[Option<Node<T>>; 4]> = Box::new([None, None, None, None]);
                children[oq] = Some(Node::Leaf { items: stacked });
                *self = Node::Internal { count, children };
                self.insert(extent, item, x, y, ctx, depth);
            }
        }
    }
}

/// Spatial index over items positioned by a pair of accessors
pub struct QuadTree<T> {
    /// Area covered by the root node
    extent: Rect<f64>,
    /// Root node, `None` while the tree is empty
    root: Option<Node<T>>,
    getx: Accessor<T>,
    gety: Accessor<T>,
    /// Cells narrower or shorter than this never split
    resolution_limit: f64,
    /// Number of items rejected for lying outside the extent
    dropped: usize,
}

impl<T: fmt::Debug> fmt::Debug for QuadTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadTree")
            .field("extent", &self.extent)
            .field("root", &self.root)
            .field("resolution_limit", &self.resolution_limit)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T> QuadTree<T> {
    /// Create an empty tree
    ///
    /// # Errors
    /// [`PonderError::InvalidResolution`] unless `resolution_limit` is finite and
    /// positive, [`PonderError::InvalidExtent`] if any bound of `extent` is not finite.
    pub fn new(
        extent: Rect<f64>,
        getx: impl Fn(&T) -> f64 + Send + Sync + 'static,
        gety: impl Fn(&T) -> f64 + Send + Sync + 'static,
        resolution_limit: f64,
    ) -> Result<Self> {
        if !(resolution_limit.is_finite() && resolution_limit > 0.0) {
            return Err(PonderError::InvalidResolution(resolution_limit));
        }
        let (min, max) = (extent.min(), extent.max());
        if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
            return Err(PonderError::InvalidExtent(format!(
                "bounds must be finite, got {:?}",
                extent
            )));
        }

        Ok(Self {
            extent,
            root: None,
            getx: Box::new(getx),
            gety: Box::new(gety),
            resolution_limit,
            dropped: 0,
        })
    }

    /// Build a tree from every item in `data`
    ///
    /// Each item is visited once. Items whose position lies outside `extent` are
    /// not indexed and not counted; [`QuadTree::dropped`] reports how many there were.
    ///
    /// # Errors
    /// See [`QuadTree::new`].
    pub fn build<I>(
        data: I,
        extent: Rect<f64>,
        getx: impl Fn(&T) -> f64 + Send + Sync + 'static,
        gety: impl Fn(&T) -> f64 + Send + Sync + 'static,
        resolution_limit: f64,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        #[cfg(feature = "profiling")]
        profiling::scope!("quadtree::build");

        let mut tree = Self::new(extent, getx, gety, resolution_limit)?;
        for item in data {
            tree.insert(item);
        }

        if tree.dropped > 0 {
            tracing::debug!(
                "Dropped {} item(s) outside the tree extent {:?} ({} indexed)",
                tree.dropped,
                tree.extent,
                tree.len()
            );
        }
        Ok(tree)
    }

    /// Add a single item using the tree's own accessors
    ///
    /// Returns `false` (and leaves the tree untouched) if the item lies outside
    /// the extent or has a NaN coordinate.
    pub fn insert(&mut self, item: T) -> bool {
        let x = (self.getx)(&item);
        let y = (self.gety)(&item);
        if !region_contains(&self.extent, x, y) {
            self.dropped += 1;
            tracing::trace!("Item at ({}, {}) is outside the tree extent", x, y);
            return false;
        }

        let ctx = InsertCtx {
            getx: &self.getx,
            gety: &self.gety,
            resolution_limit: self.resolution_limit,
        };
        match self.root.as_mut() {
            Some(root) => root.insert(self.extent, item, x, y, &ctx, 0),
            None => self.root = Some(Node::leaf(item)),
        }
        true
    }

    #[inline]
    pub fn extent(&self) -> Rect<f64> {
        self.extent
    }

    #[inline]
    pub fn root(&self) -> Option<&Node<T>> {
        self.root.as_ref()
    }

    #[inline]
    pub fn resolution_limit(&self) -> f64 {
        self.resolution_limit
    }

    /// Number of indexed items
    #[inline]
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, Node::count)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of items rejected because they fell outside the extent
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[inline]
    pub fn x_of(&self, item: &T) -> f64 {
        (self.getx)(item)
    }

    #[inline]
    pub fn y_of(&self, item: &T) -> f64 {
        (self.gety)(item)
    }

    /// Position of an item in tree space
    #[inline]
    pub fn position_of(&self, item: &T) -> Point<f64> {
        Point::new(self.x_of(item), self.y_of(item))
    }

    pub(crate) fn accessors(&self) -> (&Accessor<T>, &Accessor<T>) {
        (&self.getx, &self.gety)
    }
}
