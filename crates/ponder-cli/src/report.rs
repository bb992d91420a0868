//! JSON shapes printed by each subcommand
//!
//! Extents are written as `[[min_x, min_y], [max_x, max_y]]`. Undefined
//! statistics (NaN) serialize as `null`.

use crate::dataset::Record;
use geo::Rect;
use ponder_lib::{DensityArea, DensityOptions, DensityReport, ExtentKey};
use serde::Serialize;
use std::collections::HashMap;

pub type Corners = [[f64; 2]; 2];

pub fn corners(extent: &Rect<f64>) -> Corners {
    let (min, max) = (extent.min(), extent.max());
    [[min.x, min.y], [max.x, max.y]]
}

#[derive(Debug, Serialize)]
pub struct AreaReport {
    pub extent: Corners,
    pub count: usize,
    pub density: f64,
    pub relative_density: f64,
    pub standard_density: f64,
    pub centroid: [f64; 2],
    pub is_leaf: bool,
}

impl<T> From<&DensityArea<'_, T>> for AreaReport {
    fn from(area: &DensityArea<'_, T>) -> Self {
        Self {
            extent: corners(&area.extent),
            count: area.node.count(),
            density: area.density,
            relative_density: area.relative_density,
            standard_density: area.standard_density,
            centroid: [area.centroid.x(), area.centroid.y()],
            is_leaf: area.is_leaf,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DensitySummary {
    pub options: DensityOptions,
    pub max_density: f64,
    pub min_density: f64,
    pub leaf_mean: f64,
    pub leaf_sd: f64,
    pub lower: f64,
    pub upper: f64,
    pub areas: Vec<AreaReport>,
}

impl DensitySummary {
    pub fn new<T>(options: DensityOptions, report: &DensityReport<'_, T>) -> Self {
        Self {
            options,
            max_density: report.max_density,
            min_density: report.min_density,
            leaf_mean: report.leaf_mean,
            leaf_sd: report.leaf_sd,
            lower: report.lower,
            upper: report.upper,
            areas: report.areas.iter().map(AreaReport::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LensReport<'a> {
    pub center: [f64; 2],
    pub radius: f64,
    pub count: usize,
    pub items: Vec<&'a Record>,
}

#[derive(Debug, Serialize)]
pub struct NearestReport<'a> {
    pub position: [f64; 2],
    pub item: Option<&'a Record>,
    pub distance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AggregateEntry {
    pub extent: Corners,
    pub values: Vec<f64>,
}

/// Cache entries ordered largest cell first, then top-to-bottom, left-to-right
pub fn aggregate_entries(values: HashMap<ExtentKey, Vec<f64>>) -> Vec<AggregateEntry> {
    let mut entries: Vec<(Rect<f64>, Vec<f64>)> = values
        .into_iter()
        .map(|(key, values)| (key.to_extent(), values))
        .collect();
    entries.sort_by(|(a, _), (b, _)| {
        b.width()
            .total_cmp(&a.width())
            .then(a.min().y.total_cmp(&b.min().y))
            .then(a.min().x.total_cmp(&b.min().x))
    });
    entries
        .into_iter()
        .map(|(extent, values)| AggregateEntry {
            extent: corners(&extent),
            values,
        })
        .collect()
}
