//! Level-2 range filter store
//!
//! Holds at most one [`RangeFilter`] per parameter per stage, in the order
//! parameters were first filtered. Filters arrive from three places: table
//! column filters, graph sliders and graph brushes. Table column filters are
//! converted with [`from_table_constraints`]; [`to_table_constraints`] goes
//! the other way so the table can show filters set from the graph.

use gdsr_common::filter::{round4, EPSILON};
use gdsr_common::lock_utils;
use gdsr_common::{Operator, PerStage, RangeFilter, Result, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Table column filter match mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    Equals,
    NotEquals,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Text modes (contains, startsWith, ...) never become range filters
    #[serde(other)]
    Other,
}

impl MatchMode {
    fn is_lower(self) -> bool {
        matches!(self, MatchMode::Gt | MatchMode::Gte)
    }

    fn is_upper(self) -> bool {
        matches!(self, MatchMode::Lt | MatchMode::Lte)
    }
}

/// One constraint of a table column filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConstraint {
    pub value: Option<f64>,
    pub match_mode: MatchMode,
}

impl TableConstraint {
    pub fn new(match_mode: MatchMode, value: f64) -> Self {
        Self {
            value: Some(value),
            match_mode,
        }
    }
}

/// Inclusive lower bound for a `gt`/`gte` constraint
fn lower_bound(mode: MatchMode, value: f64) -> f64 {
    match mode {
        MatchMode::Gt => round4(value + EPSILON),
        _ => value,
    }
}

/// Inclusive upper bound for a `lt`/`lte` constraint
fn upper_bound(mode: MatchMode, value: f64) -> f64 {
    match mode {
        MatchMode::Lt => round4(value - EPSILON),
        _ => value,
    }
}

fn single_constraint_filter(parameter: &str, mode: MatchMode, value: f64) -> Option<RangeFilter> {
    let (operator, value1, value2) = match mode {
        MatchMode::Lt => (Operator::Lt, None, Some(upper_bound(mode, value))),
        MatchMode::Lte => (Operator::Lte, None, Some(value)),
        MatchMode::Gt => (Operator::Gt, Some(lower_bound(mode, value)), None),
        MatchMode::Gte => (Operator::Gte, Some(value), None),
        MatchMode::Equals => (Operator::Eq, Some(value), Some(value)),
        MatchMode::NotEquals => (Operator::Ne, Some(value), None),
        MatchMode::Other => return None,
    };
    Some(RangeFilter {
        parameter_name: parameter.to_string(),
        operator,
        value1,
        value2,
    })
}

fn pair_filter(parameter: &str, first: (MatchMode, f64), second: (MatchMode, f64)) -> RangeFilter {
    let (mode_a, a) = first;
    let (mode_b, b) = second;

    if a == b {
        return RangeFilter::between(parameter, a, a);
    }

    let (lower, upper) = if mode_a.is_lower() && mode_b.is_upper() {
        (Some((mode_a, a)), Some((mode_b, b)))
    } else if mode_a.is_upper() && mode_b.is_lower() {
        (Some((mode_b, b)), Some((mode_a, a)))
    } else {
        (None, None)
    };

    if let (Some((lower_mode, lower_value)), Some((upper_mode, upper_value))) = (lower, upper) {
        let low = lower_bound(lower_mode, lower_value);
        let high = upper_bound(upper_mode, upper_value);
        if low <= high {
            return RangeFilter::between(parameter, low, high);
        }
    }

    // Incompatible operators: take the numerically ordered pair as-is
    RangeFilter::between(parameter, a.min(b), a.max(b))
}

/// Convert table column constraints into range filters
///
/// Pure: one filter per column that still has a relational constraint with
/// a value. Output follows column name order.
pub fn from_table_constraints(
    constraints_by_column: &BTreeMap<String, Vec<TableConstraint>>,
) -> Vec<RangeFilter> {
    let mut filters = Vec::new();

    for (column, constraints) in constraints_by_column {
        let usable: Vec<(MatchMode, f64)> = constraints
            .iter()
            .filter(|c| c.match_mode != MatchMode::Other)
            .filter_map(|c| c.value.map(|value| (c.match_mode, value)))
            .collect();

        let filter = match usable.as_slice() {
            [] => None,
            [(mode, value)] => single_constraint_filter(column, *mode, *value),
            [first, second] => Some(pair_filter(column, *first, *second)),
            [first, second, ..] => {
                warn!(
                    column = column.as_str(),
                    constraints = usable.len(),
                    "More than two column constraints, using the first two"
                );
                Some(pair_filter(column, *first, *second))
            }
        };

        filters.extend(filter);
    }

    filters
}

/// Convert range filters back into table column constraints
pub fn to_table_constraints(filters: &[RangeFilter]) -> BTreeMap<String, Vec<TableConstraint>> {
    let mut columns = BTreeMap::new();

    for filter in filters {
        let constraints = match (filter.operator, filter.value1, filter.value2) {
            (Operator::Between, Some(low), Some(high)) => vec![
                TableConstraint::new(MatchMode::Gte, low),
                TableConstraint::new(MatchMode::Lte, high),
            ],
            (Operator::Lt, _, Some(high)) => {
                vec![TableConstraint::new(MatchMode::Lt, round4(high + EPSILON))]
            }
            (Operator::Lte, _, Some(high)) => vec![TableConstraint::new(MatchMode::Lte, high)],
            (Operator::Gt, Some(low), _) => {
                vec![TableConstraint::new(MatchMode::Gt, round4(low - EPSILON))]
            }
            (Operator::Gte, Some(low), _) => vec![TableConstraint::new(MatchMode::Gte, low)],
            (Operator::Eq, Some(value), _) => vec![TableConstraint::new(MatchMode::Equals, value)],
            (Operator::Ne, Some(value), _) => {
                vec![TableConstraint::new(MatchMode::NotEquals, value)]
            }
            _ => continue,
        };
        columns.insert(filter.parameter_name.clone(), constraints);
    }

    columns
}

/// Per-stage ordered list of range filters
#[derive(Debug, Default)]
pub struct RangeFilterStore {
    filters: RwLock<PerStage<Vec<RangeFilter>>>,
}

impl RangeFilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the filter for `parameter_name`, or append a new one
    ///
    /// Invalid input leaves the store unchanged.
    pub fn upsert(
        &self,
        stage: Stage,
        parameter_name: &str,
        operator: Operator,
        value1: Option<f64>,
        value2: Option<f64>,
    ) -> Result<()> {
        let filter = RangeFilter::new(parameter_name, operator, value1, value2)?;
        self.upsert_filter(stage, filter)
    }

    pub fn upsert_filter(&self, stage: Stage, filter: RangeFilter) -> Result<()> {
        filter.validate()?;
        debug!(stage = stage.id(), filter = %filter, "Range filter upserted");

        let mut filters = lock_utils::write(&self.filters);
        let list = &mut filters[stage];
        match list
            .iter_mut()
            .find(|existing| existing.parameter_name == filter.parameter_name)
        {
            Some(existing) => *existing = filter,
            None => list.push(filter),
        }
        Ok(())
    }

    /// Replace the whole list (table filter changed), validating every entry
    pub fn replace_all(&self, stage: Stage, filters: Vec<RangeFilter>) -> Result<()> {
        let mut deduped: Vec<RangeFilter> = Vec::with_capacity(filters.len());
        for filter in filters {
            filter.validate()?;
            match deduped
                .iter_mut()
                .find(|existing| existing.parameter_name == filter.parameter_name)
            {
                Some(existing) => *existing = filter,
                None => deduped.push(filter),
            }
        }
        lock_utils::write(&self.filters)[stage] = deduped;
        Ok(())
    }

    /// Replace the list with the conversion of table column constraints
    pub fn apply_table_constraints(
        &self,
        stage: Stage,
        constraints_by_column: &BTreeMap<String, Vec<TableConstraint>>,
    ) -> Result<Vec<RangeFilter>> {
        let filters = from_table_constraints(constraints_by_column);
        self.replace_all(stage, filters.clone())?;
        Ok(filters)
    }

    pub fn remove(&self, stage: Stage, parameter_name: &str) -> bool {
        let mut filters = lock_utils::write(&self.filters);
        let before = filters[stage].len();
        filters[stage].retain(|f| f.parameter_name != parameter_name);
        filters[stage].len() != before
    }

    pub fn list(&self, stage: Stage) -> Vec<RangeFilter> {
        lock_utils::read(&self.filters)[stage].clone()
    }

    pub fn is_active(&self, stage: Stage) -> bool {
        !lock_utils::read(&self.filters)[stage].is_empty()
    }

    /// Re-check every stored filter before it is sent anywhere
    pub fn validate(&self, stage: Stage) -> Result<()> {
        lock_utils::read(&self.filters)[stage]
            .iter()
            .try_for_each(RangeFilter::validate)
    }

    pub fn clear(&self, stage: Stage) {
        lock_utils::write(&self.filters)[stage].clear();
    }

    pub fn clear_all(&self) {
        *lock_utils::write(&self.filters) = PerStage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, constraints: Vec<TableConstraint>) -> BTreeMap<String, Vec<TableConstraint>> {
        let mut map = BTreeMap::new();
        map.insert(name.to_string(), constraints);
        map
    }

    #[test]
    fn test_gte_lte_pair_becomes_between() {
        let filters = from_table_constraints(&column(
            "Cap",
            vec![
                TableConstraint::new(MatchMode::Gte, 2.0),
                TableConstraint::new(MatchMode::Lte, 8.0),
            ],
        ));

        assert_eq!(filters, vec![RangeFilter::between("Cap", 2.0, 8.0)]);
    }

    #[test]
    fn test_lone_lt_shifts_upper_bound() {
        let filters = from_table_constraints(&column("Cap", vec![TableConstraint::new(MatchMode::Lt, 5.0)]));

        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].operator, Operator::Lt);
        assert_eq!(filters[0].value1, None);
        assert_eq!(filters[0].value2, Some(4.9999));
    }

    #[test]
    fn test_lone_gt_shifts_lower_bound() {
        let filters = from_table_constraints(&column("Res", vec![TableConstraint::new(MatchMode::Gt, 2.0)]));

        assert_eq!(filters[0].operator, Operator::Gt);
        assert_eq!(filters[0].value1, Some(2.0001));
        assert_eq!(filters[0].value2, None);
    }

    #[test]
    fn test_exclusive_pair_applies_epsilon_per_bound() {
        let filters = from_table_constraints(&column(
            "Cap",
            vec![
                TableConstraint::new(MatchMode::Lt, 8.0),
                TableConstraint::new(MatchMode::Gt, 2.0),
            ],
        ));

        assert_eq!(filters, vec![RangeFilter::between("Cap", 2.0001, 7.9999)]);
    }

    #[test]
    fn test_incompatible_pair_takes_ordered_values() {
        let filters = from_table_constraints(&column(
            "Cap",
            vec![
                TableConstraint::new(MatchMode::Lt, 9.0),
                TableConstraint::new(MatchMode::Lt, 3.0),
            ],
        ));

        assert_eq!(filters, vec![RangeFilter::between("Cap", 3.0, 9.0)]);
    }

    #[test]
    fn test_equal_values_skip_epsilon() {
        let filters = from_table_constraints(&column(
            "Cap",
            vec![
                TableConstraint::new(MatchMode::Gt, 4.0),
                TableConstraint::new(MatchMode::Lt, 4.0),
            ],
        ));

        assert_eq!(filters, vec![RangeFilter::between("Cap", 4.0, 4.0)]);
    }

    #[test]
    fn test_null_and_text_constraints_dropped() {
        let mut constraints = column(
            "Cap",
            vec![
                TableConstraint {
                    value: None,
                    match_mode: MatchMode::Gte,
                },
                TableConstraint::new(MatchMode::Lte, 6.0),
            ],
        );
        constraints.insert(
            "Name".to_string(),
            vec![TableConstraint {
                value: Some(1.0),
                match_mode: MatchMode::Other,
            }],
        );
        constraints.insert("Empty".to_string(), vec![]);

        let filters = from_table_constraints(&constraints);
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].operator, Operator::Lte);
        assert_eq!(filters[0].value2, Some(6.0));
    }

    #[test]
    fn test_match_mode_wire_names() {
        let parsed: TableConstraint =
            serde_json::from_str(r#"{"value": 3, "matchMode": "notEquals"}"#).unwrap();
        assert_eq!(parsed.match_mode, MatchMode::NotEquals);

        let text: TableConstraint =
            serde_json::from_str(r#"{"value": null, "matchMode": "contains"}"#).unwrap();
        assert_eq!(text.match_mode, MatchMode::Other);
    }

    #[test]
    fn test_table_graph_conversion_round_trip() {
        let filters = vec![
            RangeFilter::between("Cap", 2.0, 8.0),
            RangeFilter::new("Res", Operator::Lt, None, Some(4.9999)).unwrap(),
            RangeFilter::new("Width", Operator::Gt, Some(1.0001), None).unwrap(),
        ];

        let table = to_table_constraints(&filters);
        assert_eq!(table["Res"], vec![TableConstraint::new(MatchMode::Lt, 5.0)]);
        assert_eq!(table["Width"], vec![TableConstraint::new(MatchMode::Gt, 1.0)]);

        let mut back = from_table_constraints(&table);
        back.sort_by(|a, b| a.parameter_name.cmp(&b.parameter_name));
        assert_eq!(back, filters);
    }

    #[test]
    fn test_upsert_keeps_one_filter_per_parameter() {
        let store = RangeFilterStore::new();
        let stage = Stage::LayoutGeneration;

        for upper in [5.0, 6.0, 7.0] {
            store
                .upsert(stage, "Cap", Operator::Between, Some(1.0), Some(upper))
                .unwrap();
        }
        store.upsert(stage, "Res", Operator::Gte, Some(2.0), None).unwrap();

        let filters = store.list(stage);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0], RangeFilter::between("Cap", 1.0, 7.0));
        assert_eq!(filters[1].parameter_name, "Res");
    }

    #[test]
    fn test_invalid_upsert_leaves_store_unchanged() {
        let store = RangeFilterStore::new();
        let stage = Stage::HyperExpressivity;
        store.upsert(stage, "Cap", Operator::Lte, None, Some(3.0)).unwrap();

        let result = store.upsert(stage, "Cap", Operator::Between, Some(1.0), None);
        assert!(result.is_err());
        assert_eq!(store.list(stage)[0].value2, Some(3.0));
    }

    #[test]
    fn test_remove_and_clear() {
        let store = RangeFilterStore::new();
        let stage = Stage::LayoutGeneration;
        store.upsert(stage, "Cap", Operator::Gte, Some(1.0), None).unwrap();
        store.upsert(stage, "Res", Operator::Gte, Some(1.0), None).unwrap();

        assert!(store.remove(stage, "Cap"));
        assert!(!store.remove(stage, "Cap"));
        assert_eq!(store.list(stage).len(), 1);

        store.clear(stage);
        assert!(!store.is_active(stage));
    }
}
