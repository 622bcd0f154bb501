//! Level-1 (server-recognized) selections per stage
//!
//! Level-1 filters are technology-variation parameter selections evaluated
//! by the server while generating results. They are edited by form widgets
//! and take effect the next time the stage filter is applied.

use gdsr_common::api::Level1Param;
use gdsr_common::lock_utils;
use gdsr_common::{PerStage, Stage};
use std::sync::RwLock;

/// Cell and parameter selection for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level1Selection {
    /// When true, `cells` is ignored
    pub cell_select_all: bool,
    pub cells: Vec<String>,
    pub parameters: Vec<Level1Param>,
}

impl Default for Level1Selection {
    fn default() -> Self {
        Self {
            cell_select_all: true,
            cells: Vec::new(),
            parameters: Vec::new(),
        }
    }
}

impl Level1Selection {
    /// Restrict to an explicit set of cells
    pub fn with_cells(cells: Vec<String>) -> Self {
        Self {
            cell_select_all: false,
            cells,
            parameters: Vec::new(),
        }
    }

    /// Parameters that actually constrain (`selectAllValue == false`)
    pub fn active_parameters(&self) -> Vec<Level1Param> {
        self.parameters
            .iter()
            .filter(|p| !p.select_all_value)
            .cloned()
            .collect()
    }

    pub fn has_cell_subset(&self) -> bool {
        !self.cell_select_all
    }

    pub fn is_active(&self) -> bool {
        self.has_cell_subset() || self.parameters.iter().any(|p| !p.select_all_value)
    }
}

#[derive(Debug, Default)]
pub struct Level1Store {
    selections: RwLock<PerStage<Level1Selection>>,
}

impl Level1Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stage: Stage) -> Level1Selection {
        lock_utils::read(&self.selections)[stage].clone()
    }

    pub fn set(&self, stage: Stage, selection: Level1Selection) {
        lock_utils::write(&self.selections)[stage] = selection;
    }

    pub fn is_active(&self, stage: Stage) -> bool {
        lock_utils::read(&self.selections)[stage].is_active()
    }

    pub fn clear(&self, stage: Stage) {
        lock_utils::write(&self.selections)[stage] = Level1Selection::default();
    }

    pub fn clear_all(&self) {
        *lock_utils::write(&self.selections) = PerStage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, select_all: bool) -> Level1Param {
        Level1Param {
            name: name.to_string(),
            values: vec!["v1".to_string()],
            select_all_value: select_all,
        }
    }

    #[test]
    fn test_only_constraining_parameters_are_active() {
        let selection = Level1Selection {
            parameters: vec![param("Track", true), param("Fin", false)],
            ..Level1Selection::default()
        };

        let active = selection.active_parameters();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Fin");
        assert!(selection.is_active());
    }

    #[test]
    fn test_default_selection_is_inactive() {
        let store = Level1Store::new();
        assert!(!store.is_active(Stage::LayoutGeneration));

        store.set(
            Stage::LayoutGeneration,
            Level1Selection::with_cells(vec!["INV".to_string()]),
        );
        assert!(store.is_active(Stage::LayoutGeneration));
        assert!(!store.is_active(Stage::HyperExpressivity));

        store.clear(Stage::LayoutGeneration);
        assert_eq!(store.get(Stage::LayoutGeneration), Level1Selection::default());
    }
}
