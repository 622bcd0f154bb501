//! Level-2 filtering of the loaded item set
//!
//! A row passes when every range filter accepts its metric value. Missing
//! filter bounds fall back to the observed minimum/maximum of the parameter
//! over all loaded rows ([`MetricBounds`]), computed once per pass. The
//! bounds double as the graph-state cache the charts draw their axes from.

use gdsr_common::api::Item;
use gdsr_common::RangeFilter;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Observed `[min, max]` of every numeric metric over a set of rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricBounds {
    bounds: BTreeMap<String, (f64, f64)>,
}

impl MetricBounds {
    pub fn compute<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a Item>,
    {
        let mut bounds: BTreeMap<String, (f64, f64)> = BTreeMap::new();

        for item in items {
            for name in item.metrics.keys() {
                let Some(value) = item.metric_f64(name) else {
                    continue;
                };
                bounds
                    .entry(name.clone())
                    .and_modify(|(min, max)| {
                        *min = min.min(value);
                        *max = max.max(value);
                    })
                    .or_insert((value, value));
            }
        }

        Self { bounds }
    }

    pub fn get(&self, parameter: &str) -> Option<(f64, f64)> {
        self.bounds.get(parameter).copied()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.bounds.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

/// Whether one row passes every filter
///
/// Rows without a numeric value for a filtered parameter fail.
pub fn row_passes(item: &Item, filters: &[RangeFilter], bounds: &MetricBounds) -> bool {
    filters.iter().all(|filter| {
        let Some(value) = item.metric_f64(&filter.parameter_name) else {
            return false;
        };
        let (observed_min, observed_max) = bounds
            .get(&filter.parameter_name)
            .unwrap_or((value, value));
        filter.accepts(value, observed_min, observed_max)
    })
}

/// Distinct cell names of the rows passing every filter
pub fn filtered_cells<'a, I>(items: I, filters: &[RangeFilter]) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Item> + Clone,
{
    let bounds = MetricBounds::compute(items.clone());
    filtered_cells_with_bounds(items, filters, &bounds)
}

/// Same as [`filtered_cells`] with precomputed bounds
pub fn filtered_cells_with_bounds<'a, I>(
    items: I,
    filters: &[RangeFilter],
    bounds: &MetricBounds,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Item>,
{
    items
        .into_iter()
        .filter(|item| row_passes(item, filters, bounds))
        .map(|item| item.cell_name().to_string())
        .collect()
}
