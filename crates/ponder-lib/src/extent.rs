//! Extent geometry: containment, quadrant indexing and sub-extent splitting
//!
//! Quadrants are numbered in reading order, with `y` growing downwards as it
//! does in screen space:
//!
//! ```text
//!     0 | 1
//!     --+--
//!     2 | 3
//! ```
//!
//! Midlines are always computed as `min + size / 2` so that every split in the
//! tree is reproducible bit for bit.

use geo::{Coord, Rect};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// North-west quadrant index
pub const NW: usize = 0;
/// North-east quadrant index
pub const NE: usize = 1;
/// South-west quadrant index
pub const SW: usize = 2;
/// South-east quadrant index
pub const SE: usize = 3;

/// Quadrants touched by a region, in ascending order
pub type QuadIndices = SmallVec<[usize; 4]>;

/// Hashable identity of an extent, used to key per-call caches.
///
/// Two keys are equal only if all four bounds are bit-identical, which holds
/// for extents produced by the same chain of [`sub_extent`] splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtentKey {
    min_x: u64,
    min_y: u64,
    max_x: u64,
    max_y: u64,
}

impl From<Rect<f64>> for ExtentKey {
    #[inline]
    fn from(extent: Rect<f64>) -> Self {
        Self::from(&extent)
    }
}

impl From<&Rect<f64>> for ExtentKey {
    #[inline]
    fn from(extent: &Rect<f64>) -> Self {
        let min = extent.min();
        let max = extent.max();
        Self {
            min_x: min.x.to_bits(),
            min_y: min.y.to_bits(),
            max_x: max.x.to_bits(),
            max_y: max.y.to_bits(),
        }
    }
}

impl ExtentKey {
    /// The extent this key was made from
    pub fn to_extent(&self) -> Rect<f64> {
        extent(
            f64::from_bits(self.min_x),
            f64::from_bits(self.min_y),
            f64::from_bits(self.max_x),
            f64::from_bits(self.max_y),
        )
    }
}

/// Build an extent from its `[[min_x, min_y], [max_x, max_y]]` corners
#[inline]
pub fn extent(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Rect<f64> {
    Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
}

/// Inclusive point-in-region test.
///
/// NaN coordinates never match.
#[inline]
pub fn region_contains(region: &Rect<f64>, x: f64, y: f64) -> bool {
    let min = region.min();
    let max = region.max();
    x >= min.x && x <= max.x && y >= min.y && y <= max.y
}

/// True if `region` contains `sub` on all four sides (inclusive)
#[inline]
pub fn region_envelops(region: &Rect<f64>, sub: &Rect<f64>) -> bool {
    let (rmin, rmax) = (region.min(), region.max());
    let (smin, smax) = (sub.min(), sub.max());
    rmin.x <= smin.x && rmin.y <= smin.y && rmax.x >= smax.x && rmax.y >= smax.y
}

/// Which quadrant of `extent` the point `(x, y)` falls into.
///
/// Points exactly on a midline go to the greater quadrant (right and/or
/// bottom). Points outside the extent are routed to the nearest edge or
/// corner quadrant.
#[inline]
pub fn quad_index(extent: &Rect<f64>, x: f64, y: f64) -> usize {
    let min = extent.min();
    let right = x >= min.x + extent.width() / 2.0;
    let bottom = y >= min.y + extent.height() / 2.0;
    usize::from(right) + 2 * usize::from(bottom)
}

/// Which quadrants of `extent` the rectangle `region` touches.
///
/// The midline tests are inclusive on both sides, so a region that merely
/// touches a midline reports the quadrants on either side of it. Pruning by
/// this set can therefore never miss a matching point. Returns an empty set if
/// the region does not overlap the extent at all.
pub fn quad_indices(extent: &Rect<f64>, region: &Rect<f64>) -> QuadIndices {
    let mut result = QuadIndices::new();
    let (emin, emax) = (extent.min(), extent.max());
    let (rmin, rmax) = (region.min(), region.max());
    if rmax.x < emin.x || rmax.y < emin.y || rmin.x > emax.x || rmin.y > emax.y {
        return result;
    }

    let mid_x = emin.x + extent.width() / 2.0;
    let mid_y = emin.y + extent.height() / 2.0;
    let west = rmin.x <= mid_x;
    let east = rmax.x >= mid_x;
    let north = rmin.y <= mid_y;
    let south = rmax.y >= mid_y;

    if west && north {
        result.push(NW);
    }
    if east && north {
        result.push(NE);
    }
    if west && south {
        result.push(SW);
    }
    if east && south {
        result.push(SE);
    }
    result
}

/// True if splitting `extent` would yield a quadrant identical to it, which
/// happens once a midline rounds onto a bound
pub fn halving_stalls(extent: &Rect<f64>) -> bool {
    (NW..=SE).any(|qi| sub_extent(extent, qi) == *extent)
}

/// The exact half-split extent of quadrant `qi`.
///
/// # Panics
/// If `qi` is not a quadrant index (0..=3).
pub fn sub_extent(extent: &Rect<f64>, qi: usize) -> Rect<f64> {
    let (min, max) = (extent.min(), extent.max());
    let mid_x = min.x + extent.width() / 2.0;
    let mid_y = min.y + extent.height() / 2.0;
    match qi {
        NW => self::extent(min.x, min.y, mid_x, mid_y),
        NE => self::extent(mid_x, min.y, max.x, mid_y),
        SW => self::extent(min.x, mid_y, mid_x, max.y),
        SE => self::extent(mid_x, mid_y, max.x, max.y),
        _ => panic!("invalid quadrant index: {qi}"),
    }
}
