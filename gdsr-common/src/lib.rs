//! # GDSR Common Library
//!
//! Shared code for the GDS results browser:
//! - Pipeline stages and per-stage containers
//! - Wire types for the stage-results, image and download endpoints
//! - Level-2 range filters and their table/graph conversions
//! - Event types (BrowserEvent enum) and the EventBus
//! - Configuration loading
//! - Error types

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod lock_utils;
pub mod stage;

pub use error::{Error, Result};
pub use filter::{Operator, RangeFilter};
pub use stage::{PerStage, Stage};
