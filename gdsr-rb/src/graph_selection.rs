//! Scatter-plot brush / click selection per stage
//!
//! A non-empty selection overrides every other filter in the outgoing
//! request (see `request_builder`). An empty selection is stored as `None`.

use gdsr_common::lock_utils;
use gdsr_common::{PerStage, Stage};
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct GraphSelectionStore {
    selections: RwLock<PerStage<Option<Vec<String>>>>,
}

impl GraphSelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with the brushed ids (duplicates dropped)
    pub fn set_from_brush(&self, stage: Stage, file_ids: &[String]) {
        let mut seen = HashSet::new();
        let unique: Vec<String> = file_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        debug!(stage = stage.id(), selected = unique.len(), "Graph selection set");
        lock_utils::write(&self.selections)[stage] = if unique.is_empty() {
            None
        } else {
            Some(unique)
        };
    }

    /// Click selection: add or remove one point
    pub fn toggle_point(&self, stage: Stage, file_id: &str) {
        let mut selections = lock_utils::write(&self.selections);
        let mut current = selections[stage].take().unwrap_or_default();

        match current.iter().position(|id| id == file_id) {
            Some(index) => {
                current.remove(index);
            }
            None => current.push(file_id.to_string()),
        }

        selections[stage] = if current.is_empty() { None } else { Some(current) };
    }

    pub fn get(&self, stage: Stage) -> Option<Vec<String>> {
        lock_utils::read(&self.selections)[stage].clone()
    }

    pub fn is_active(&self, stage: Stage) -> bool {
        lock_utils::read(&self.selections)[stage].is_some()
    }

    pub fn clear(&self, stage: Stage) {
        lock_utils::write(&self.selections)[stage] = None;
    }

    pub fn clear_all(&self) {
        *lock_utils::write(&self.selections) = PerStage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_brush_dedupes_and_keeps_order() {
        let store = GraphSelectionStore::new();
        store.set_from_brush(Stage::LayoutGeneration, &ids(&["B_0", "A_0", "B_0"]));

        assert_eq!(store.get(Stage::LayoutGeneration), Some(ids(&["B_0", "A_0"])));
        assert!(store.get(Stage::HyperExpressivity).is_none());
    }

    #[test]
    fn test_empty_brush_clears() {
        let store = GraphSelectionStore::new();
        store.set_from_brush(Stage::LayoutGeneration, &ids(&["A_0"]));
        store.set_from_brush(Stage::LayoutGeneration, &[]);

        assert!(!store.is_active(Stage::LayoutGeneration));
    }

    #[test]
    fn test_toggle_point() {
        let store = GraphSelectionStore::new();
        let stage = Stage::HyperExpressivity;

        store.toggle_point(stage, "A_0");
        store.toggle_point(stage, "B_0");
        assert_eq!(store.get(stage), Some(ids(&["A_0", "B_0"])));

        store.toggle_point(stage, "A_0");
        store.toggle_point(stage, "B_0");
        assert!(store.get(stage).is_none());
    }
}
