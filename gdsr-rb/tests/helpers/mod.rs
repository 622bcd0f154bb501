//! Test helpers for gdsr-rb integration tests
//!
//! Provides an in-memory results service:
//! - MockResultsApi: paged stage results, images and downloads
//! - ImageMode: image endpoint behaviour (aligned, short, failing)

pub mod mock_api;

pub use mock_api::{ImageMode, MockResultsApi};
