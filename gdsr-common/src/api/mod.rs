//! Shared API request/response types
//!
//! Wire shapes exchanged with the results service:
//! - stage-results query (one page of items plus PEX consolidated rows)
//! - image fetch for a batch of layout references
//! - result download
//!
//! # Design Principle
//!
//! This module contains ONLY shared types and pure conversions. The
//! transport lives behind the `ResultsApi` trait in the browser crate.

pub mod types;

pub use types::{
    DownloadPayload, DownloadType, FilterCriteria, FilterParametersName, FilterQuery,
    FilterRequest, ImageEntry, ImagesResponse, Item, Level1Param, StageResultsData,
    StageResultsRequest, StageResultsResponse,
};
