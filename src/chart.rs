//! Shared-axis chart composition
//!
//! Reduced series from different sensors rarely cover the same buckets: a
//! rain gauge may report on days the level sensor was offline. The composer
//! builds one label axis from the union of every series' buckets and
//! reindexes each series onto it, leaving an explicit `None` where a series
//! has no value. A series is never dropped because it only partly overlaps
//! the others.
//!
//! Rainfall renders as bars on the secondary axis; everything else renders
//! as lines on the primary axis. Bar datasets come first so they are drawn
//! beneath the lines.

use crate::aggregation::{split_min_max, AggregateValue, AggregatedPoint, BucketKey};
use crate::types::MetricKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Y axis a dataset is plotted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Left axis
    Primary,
    /// Right axis
    Secondary,
}

/// How a dataset is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderHint {
    /// Connected line
    Line,
    /// Bars
    Bar,
}

/// One dataset aligned to the payload's label axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Legend label
    pub label: String,
    /// Display unit
    pub unit: String,
    /// One entry per axis label, `None` where the series has no value
    pub values: Vec<Option<f64>>,
    /// Axis the dataset is plotted against
    pub axis: Axis,
    /// Rendering hint
    pub render: RenderHint,
}

/// Chart ready for a presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    /// Chart title
    pub title: String,
    /// Axis labels
    pub labels: Vec<String>,
    /// Bucket keys behind the labels
    pub keys: Vec<BucketKey>,
    /// Datasets, bars before lines
    pub datasets: Vec<ChartSeries>,
}

impl ChartPayload {
    /// Payload with no labels and no datasets
    pub fn empty(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            labels: Vec::new(),
            keys: Vec::new(),
            datasets: Vec::new(),
        }
    }

    /// Check if the payload has nothing to draw
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() || self.datasets.is_empty()
    }
}

/// One reduced series handed to the composer
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerInput {
    /// Legend label
    pub label: String,
    /// Metric classification, drives axis and rendering
    pub kind: MetricKind,
    /// Reduced points
    pub points: Vec<AggregatedPoint>,
}

impl ComposerInput {
    /// Create an input
    pub fn new(label: impl Into<String>, kind: MetricKind, points: Vec<AggregatedPoint>) -> Self {
        Self {
            label: label.into(),
            kind,
            points,
        }
    }
}

fn placement(kind: MetricKind) -> (Axis, RenderHint) {
    match kind {
        MetricKind::Rainfall => (Axis::Secondary, RenderHint::Bar),
        _ => (Axis::Primary, RenderHint::Line),
    }
}

/// Merge every input onto one shared label axis
pub fn compose(title: impl Into<String>, inputs: &[ComposerInput]) -> ChartPayload {
    let title = title.into();
    if inputs.iter().all(|input| input.points.is_empty()) {
        return ChartPayload::empty(title);
    }

    let keys: Vec<BucketKey> = inputs
        .iter()
        .flat_map(|input| input.points.iter().map(|p| p.bucket))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut datasets = Vec::with_capacity(inputs.len());
    for input in inputs {
        datasets.extend(reindex(input, &keys));
    }
    // Stable: relative order inside each group is kept
    datasets.sort_by_key(|d| d.render != RenderHint::Bar);

    ChartPayload {
        title,
        labels: keys.iter().map(BucketKey::label).collect(),
        keys,
        datasets,
    }
}

/// One payload per input
pub fn separate(inputs: &[ComposerInput]) -> Vec<ChartPayload> {
    inputs
        .iter()
        .map(|input| compose(input.label.clone(), std::slice::from_ref(input)))
        .collect()
}

fn reindex(input: &ComposerInput, keys: &[BucketKey]) -> Vec<ChartSeries> {
    let (axis, render) = placement(input.kind);
    let unit = input.kind.unit();

    let series = |label: String, points: &[AggregatedPoint]| {
        // Later points win on duplicate keys
        let by_key: BTreeMap<BucketKey, f64> =
            points.iter().map(|p| (p.bucket, p.value.max())).collect();
        ChartSeries {
            label,
            unit: unit.to_string(),
            values: keys.iter().map(|k| by_key.get(k).copied()).collect(),
            axis,
            render,
        }
    };

    let has_min_max = input
        .points
        .iter()
        .any(|p| matches!(p.value, AggregateValue::MinMax { .. }));
    if has_min_max {
        let (min, max) = split_min_max(&input.points);
        vec![
            series(format!("{} (min)", input.label), &min),
            series(format!("{} (max)", input.label), &max),
        ]
    } else {
        vec![series(input.label.clone(), &input.points)]
    }
}
