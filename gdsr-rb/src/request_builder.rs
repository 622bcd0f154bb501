//! Canonical query construction
//!
//! Merges the level-1 selection, the level-2 range filters and the graph
//! selection of one stage into a single [`FilterQuery`]. A graph selection
//! overrides everything else.

use crate::filtered_cells::filtered_cells;
use crate::graph_selection::GraphSelectionStore;
use crate::level1::{Level1Selection, Level1Store};
use crate::range_filter::RangeFilterStore;
use gdsr_common::api::{FilterCriteria, FilterParametersName, FilterQuery, Item};
use gdsr_common::events::FilterState;
use gdsr_common::{RangeFilter, Stage};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Build the query for one stage from explicit inputs
///
/// `loaded` is the stage accumulator the cells are derived from whenever a
/// level-1 parameter or a range filter is active. Output is deterministic
/// for a given input: cells are sorted and deduplicated.
pub fn build_query(
    level1: &Level1Selection,
    ranges: &[RangeFilter],
    graph_selection: Option<&[String]>,
    loaded: &[Item],
) -> FilterQuery {
    if let Some(ids) = graph_selection.filter(|ids| !ids.is_empty()) {
        return FilterQuery::ByLayout(ids.to_vec());
    }

    let level1_cells: BTreeSet<String> = level1.cells.iter().cloned().collect();
    let active_level1 = level1.active_parameters();

    let mut derived = if (!ranges.is_empty() || !active_level1.is_empty()) && !loaded.is_empty() {
        filtered_cells(loaded, ranges)
    } else {
        BTreeSet::new()
    };
    if level1.has_cell_subset() {
        derived.retain(|cell| level1_cells.contains(cell));
    }

    // An empty derivation would match nothing; the server applies the
    // parameter filters to the wider cell set instead.
    let (cell_select_all, cells) = if !derived.is_empty() {
        (false, derived.into_iter().collect())
    } else if level1.has_cell_subset() {
        (false, level1_cells.into_iter().collect())
    } else {
        (true, Vec::new())
    };

    let filter_parameters_name = FilterParametersName {
        filter_level1: (!active_level1.is_empty()).then_some(active_level1),
        filter_level2: (!ranges.is_empty()).then(|| ranges.to_vec()),
    };

    FilterQuery::ByCriteria(FilterCriteria {
        cell_select_all,
        cells,
        filter_parameters_name,
    })
}

/// Coarse state for a query
pub fn filter_state_of(query: &FilterQuery) -> FilterState {
    match query {
        FilterQuery::ByLayout(_) => FilterState::GraphOverridden,
        FilterQuery::ByCriteria(criteria) if criteria.is_unfiltered() => FilterState::Unfiltered,
        FilterQuery::ByCriteria(_) => FilterState::Filtered,
    }
}

/// Reads the selection stores and produces the canonical query
#[derive(Clone)]
pub struct FilterRequestBuilder {
    level1: Arc<Level1Store>,
    ranges: Arc<RangeFilterStore>,
    graph: Arc<GraphSelectionStore>,
}

impl FilterRequestBuilder {
    pub fn new(
        level1: Arc<Level1Store>,
        ranges: Arc<RangeFilterStore>,
        graph: Arc<GraphSelectionStore>,
    ) -> Self {
        Self {
            level1,
            ranges,
            graph,
        }
    }

    pub fn build(&self, stage: Stage, loaded: &[Item]) -> FilterQuery {
        let selection = self.graph.get(stage);
        build_query(
            &self.level1.get(stage),
            &self.ranges.list(stage),
            selection.as_deref(),
            loaded,
        )
    }

    /// True when any of graph selection, level-1 or level-2 constrains the stage
    pub fn is_filter_active(&self, stage: Stage) -> bool {
        self.graph.is_active(stage) || self.level1.is_active(stage) || self.ranges.is_active(stage)
    }

    pub fn filter_state(&self, stage: Stage) -> FilterState {
        if self.graph.is_active(stage) {
            FilterState::GraphOverridden
        } else if self.level1.is_active(stage) || self.ranges.is_active(stage) {
            FilterState::Filtered
        } else {
            FilterState::Unfiltered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdsr_common::api::Level1Param;
    use gdsr_common::Operator;

    fn loaded() -> Vec<Item> {
        vec![
            Item::new("A_0", "a0").with_metric("Cap", 5.0),
            Item::new("B_0", "b0").with_metric("Cap", 15.0),
            Item::new("C_0", "c0").with_metric("Cap", 3.0),
        ]
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_nothing_active_is_unfiltered() {
        let query = build_query(&Level1Selection::default(), &[], None, &loaded());

        assert_eq!(query, FilterQuery::unfiltered());
        assert!(query.filter().is_none());
        assert!(query.filter_by_layout().is_none());
        assert_eq!(filter_state_of(&query), FilterState::Unfiltered);
    }

    #[test]
    fn test_range_filter_sets_cells() {
        let ranges = vec![RangeFilter::between("Cap", 0.0, 10.0)];
        let query = build_query(&Level1Selection::default(), &ranges, None, &loaded());

        let criteria = query.filter().unwrap();
        assert!(!criteria.cell_select_all);
        assert_eq!(criteria.cells, ids(&["A", "C"]));
        assert_eq!(criteria.filter_parameters_name.filter_level2, Some(ranges));
        assert!(criteria.filter_parameters_name.filter_level1.is_none());
    }

    #[test]
    fn test_graph_selection_overrides_every_filter() {
        let level1 = Level1Selection {
            parameters: vec![Level1Param {
                name: "Track".to_string(),
                values: ids(&["9T"]),
                select_all_value: false,
            }],
            ..Level1Selection::with_cells(ids(&["A"]))
        };
        let ranges = vec![RangeFilter::between("Cap", 0.0, 10.0)];
        let selection = ids(&["A_0", "C_0"]);

        let query = build_query(&level1, &ranges, Some(selection.as_slice()), &loaded());

        assert_eq!(query, FilterQuery::ByLayout(selection));
        assert!(query.filter().is_none());
        assert_eq!(filter_state_of(&query), FilterState::GraphOverridden);
    }

    #[test]
    fn test_filter_and_layout_never_both_set() {
        let level1_options = [
            Level1Selection::default(),
            Level1Selection::with_cells(ids(&["A", "B"])),
        ];
        let range_options = [vec![], vec![RangeFilter::between("Cap", 0.0, 10.0)]];
        let graph_options = [None, Some(ids(&["B_0"]))];

        for level1 in &level1_options {
            for ranges in &range_options {
                for graph in &graph_options {
                    let query = build_query(level1, ranges, graph.as_deref(), &loaded());
                    assert!(
                        !(query.filter().is_some() && query.filter_by_layout().is_some()),
                        "both shapes set for {:?}",
                        query
                    );
                    assert_eq!(query.filter_by_layout().is_some(), graph.is_some());
                }
            }
        }
    }

    #[test]
    fn test_empty_graph_selection_is_not_an_override() {
        let empty: Vec<String> = Vec::new();
        let query = build_query(&Level1Selection::default(), &[], Some(empty.as_slice()), &loaded());
        assert_eq!(query, FilterQuery::unfiltered());
    }

    #[test]
    fn test_level1_cells_intersect_range_cells() {
        let level1 = Level1Selection::with_cells(ids(&["C", "B"]));
        let ranges = vec![RangeFilter::between("Cap", 0.0, 10.0)];

        let query = build_query(&level1, &ranges, None, &loaded());
        assert_eq!(query.filter().unwrap().cells, ids(&["C"]));

        let query = build_query(&level1, &[], None, &loaded());
        assert_eq!(query.filter().unwrap().cells, ids(&["B", "C"]));
    }

    #[test]
    fn test_only_constraining_level1_params_are_sent() {
        let level1 = Level1Selection {
            parameters: vec![
                Level1Param {
                    name: "Track".to_string(),
                    values: ids(&["9T", "12T"]),
                    select_all_value: true,
                },
                Level1Param {
                    name: "Fin".to_string(),
                    values: ids(&["2"]),
                    select_all_value: false,
                },
            ],
            ..Level1Selection::default()
        };

        let query = build_query(&level1, &[], None, &loaded());
        let criteria = query.filter().unwrap();
        let sent = criteria.filter_parameters_name.filter_level1.as_ref().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "Fin");
    }

    #[test]
    fn test_level1_params_alone_derive_loaded_cells() {
        let level1 = Level1Selection {
            parameters: vec![Level1Param {
                name: "Fin".to_string(),
                values: ids(&["2"]),
                select_all_value: false,
            }],
            ..Level1Selection::default()
        };

        let query = build_query(&level1, &[], None, &loaded());
        let criteria = query.filter().unwrap();
        assert!(!criteria.cell_select_all);
        assert_eq!(criteria.cells, ids(&["A", "B", "C"]));
        assert!(criteria.filter_parameters_name.filter_level2.is_none());

        // Nothing loaded yet: nothing to derive from
        let query = build_query(&level1, &[], None, &[]);
        assert!(query.filter().unwrap().cell_select_all);
    }

    #[test]
    fn test_empty_derivation_falls_back_to_wider_cell_set() {
        let ranges = vec![RangeFilter::between("Cap", 100.0, 200.0)];

        let query = build_query(&Level1Selection::default(), &ranges, None, &loaded());
        let criteria = query.filter().unwrap();
        assert!(criteria.cell_select_all);
        assert!(criteria.cells.is_empty());
        assert_eq!(criteria.filter_parameters_name.filter_level2, Some(ranges.clone()));

        let level1 = Level1Selection::with_cells(ids(&["B", "A"]));
        let query = build_query(&level1, &ranges, None, &loaded());
        let criteria = query.filter().unwrap();
        assert!(!criteria.cell_select_all);
        assert_eq!(criteria.cells, ids(&["A", "B"]));
    }

    #[test]
    fn test_output_is_deterministic() {
        let ranges = vec![RangeFilter::new("Cap", Operator::Lt, None, Some(10.0)).unwrap()];
        let mut shuffled = loaded();
        shuffled.reverse();

        let first = build_query(&Level1Selection::default(), &ranges, None, &loaded());
        let second = build_query(&Level1Selection::default(), &ranges, None, &shuffled);
        assert_eq!(first, second);
    }

    #[test]
    fn test_builder_reads_stores() {
        let level1 = Arc::new(Level1Store::new());
        let ranges = Arc::new(RangeFilterStore::new());
        let graph = Arc::new(GraphSelectionStore::new());
        let builder = FilterRequestBuilder::new(level1, ranges.clone(), graph.clone());
        let stage = Stage::LayoutGeneration;

        assert_eq!(builder.filter_state(stage), FilterState::Unfiltered);
        assert!(!builder.is_filter_active(stage));

        ranges
            .upsert(stage, "Cap", Operator::Between, Some(0.0), Some(10.0))
            .unwrap();
        assert_eq!(builder.filter_state(stage), FilterState::Filtered);
        assert_eq!(builder.filter_state(stage.other()), FilterState::Unfiltered);

        graph.set_from_brush(stage, &ids(&["A_0"]));
        assert_eq!(builder.filter_state(stage), FilterState::GraphOverridden);
        assert_eq!(
            builder.build(stage, &loaded()),
            FilterQuery::ByLayout(ids(&["A_0"]))
        );
    }
}
