//! gdsr-rb library - Results browser engine
//!
//! Reconciles the three selection sources of a GDS results page (level-1
//! server parameters, level-2 range filters, graph selection) into one
//! query per stage, loads results page by page and keeps the image grid,
//! metrics, PEX, consolidated and graph views of both stages in sync.

pub mod api;
pub mod cart;
pub mod download;
pub mod filtered_cells;
pub mod graph_selection;
pub mod level1;
pub mod loader;
pub mod range_filter;
pub mod request_builder;
pub mod scroll;
pub mod sync;

pub use api::{HttpResultsApi, ResultsApi};
pub use cart::{CartStore, CartToggle};
pub use download::DownloadOptions;
pub use level1::Level1Selection;
pub use loader::{LoadOutcome, PaginatedResultLoader, PaginationState, SkipReason};
pub use range_filter::{MatchMode, RangeFilterStore, TableConstraint};
pub use request_builder::FilterRequestBuilder;
pub use scroll::{ScrollMetrics, ScrollTrigger};
pub use sync::{ClearAction, StageView, ViewSynchronizer};
