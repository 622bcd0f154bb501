//! Pipeline stages
//!
//! Each stage owns an independent result set, filter set, graph selection
//! and cart. Stages travel on the wire as their integer ids.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Pipeline phase whose results are being browsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    /// Layout Generation (stage 1)
    LayoutGeneration,
    /// HyperExpressivity (stage 2)
    HyperExpressivity,
}

impl Stage {
    /// Both stages in wire order
    pub const ALL: [Stage; 2] = [Stage::LayoutGeneration, Stage::HyperExpressivity];

    /// Wire id (1 or 2)
    pub fn id(self) -> u8 {
        match self {
            Stage::LayoutGeneration => 1,
            Stage::HyperExpressivity => 2,
        }
    }

    /// The stage shown alongside this one in combined operations
    pub fn other(self) -> Stage {
        match self {
            Stage::LayoutGeneration => Stage::HyperExpressivity,
            Stage::HyperExpressivity => Stage::LayoutGeneration,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::LayoutGeneration => "Layout Generation",
            Stage::HyperExpressivity => "HyperExpressivity",
        }
    }
}

impl TryFrom<u8> for Stage {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Stage::LayoutGeneration),
            2 => Ok(Stage::HyperExpressivity),
            other => Err(Error::InvalidInput(format!("Unknown stage id: {}", other))),
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> u8 {
        stage.id()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value per stage, indexed by [`Stage`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerStage<T> {
    layout_generation: T,
    hyper_expressivity: T,
}

impl<T> PerStage<T> {
    pub fn new(layout_generation: T, hyper_expressivity: T) -> Self {
        Self {
            layout_generation,
            hyper_expressivity,
        }
    }

    /// Build both entries from a per-stage constructor
    pub fn from_fn(mut f: impl FnMut(Stage) -> T) -> Self {
        Self {
            layout_generation: f(Stage::LayoutGeneration),
            hyper_expressivity: f(Stage::HyperExpressivity),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, &T)> {
        [
            (Stage::LayoutGeneration, &self.layout_generation),
            (Stage::HyperExpressivity, &self.hyper_expressivity),
        ]
        .into_iter()
    }
}

impl<T> Index<Stage> for PerStage<T> {
    type Output = T;

    fn index(&self, stage: Stage) -> &T {
        match stage {
            Stage::LayoutGeneration => &self.layout_generation,
            Stage::HyperExpressivity => &self.hyper_expressivity,
        }
    }
}

impl<T> IndexMut<Stage> for PerStage<T> {
    fn index_mut(&mut self, stage: Stage) -> &mut T {
        match stage {
            Stage::LayoutGeneration => &mut self.layout_generation,
            Stage::HyperExpressivity => &mut self.hyper_expressivity,
        }
    }
}
