//! Per-stage cart of pinned items
//!
//! The cart is independent of every filter: it survives filter changes and
//! is only emptied by "clear cart" or a project reset.

use gdsr_common::lock_utils;
use gdsr_common::{PerStage, Stage};
use std::sync::RwLock;
use tracing::debug;

/// Which branch a toggle took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartToggle {
    /// True when the item was added, false when it was removed
    pub added: bool,
}

/// Ordered set of pinned file ids per stage
#[derive(Debug, Default)]
pub struct CartStore {
    carts: RwLock<PerStage<Vec<String>>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the item if absent, remove it if present
    pub fn toggle(&self, stage: Stage, file_id: &str) -> CartToggle {
        let mut carts = lock_utils::write(&self.carts);
        let cart = &mut carts[stage];

        let added = match cart.iter().position(|id| id == file_id) {
            Some(index) => {
                cart.remove(index);
                false
            }
            None => {
                cart.push(file_id.to_string());
                true
            }
        };

        debug!(stage = stage.id(), file_id, added, "Cart toggled");
        CartToggle { added }
    }

    pub fn contains(&self, stage: Stage, file_id: &str) -> bool {
        lock_utils::read(&self.carts)[stage]
            .iter()
            .any(|id| id == file_id)
    }

    /// Pinned ids in insertion order
    pub fn items(&self, stage: Stage) -> Vec<String> {
        lock_utils::read(&self.carts)[stage].clone()
    }

    pub fn len(&self, stage: Stage) -> usize {
        lock_utils::read(&self.carts)[stage].len()
    }

    pub fn is_empty(&self, stage: Stage) -> bool {
        self.len(stage) == 0
    }

    pub fn clear(&self, stage: Stage) {
        lock_utils::write(&self.carts)[stage].clear();
    }

    /// Project reset
    pub fn clear_all(&self) {
        *lock_utils::write(&self.carts) = PerStage::default();
    }
}
