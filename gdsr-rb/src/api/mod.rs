//! Results service interface
//!
//! The engine only talks to the backend through [`ResultsApi`]. The HTTP
//! adapter in [`http`] is the production implementation; tests plug in an
//! in-memory one.

pub mod http;

pub use http::HttpResultsApi;

use async_trait::async_trait;
use gdsr_common::api::{DownloadPayload, FilterQuery, ImagesResponse, StageResultsResponse};
use gdsr_common::{Result, Stage};

/// Stage-results, image and download operations consumed by the engine
#[async_trait]
pub trait ResultsApi: Send + Sync {
    /// Fetch one page of results for a stage
    ///
    /// `ByLayout` queries are sent as `filterByLayout` with a null `filter`;
    /// unconstrained criteria are sent with both null.
    async fn fetch_stage_results(
        &self,
        project_id: &str,
        stage: Stage,
        page_number: u32,
        query: &FilterQuery,
    ) -> Result<StageResultsResponse>;

    /// Fetch encoded images for a batch of layout references
    ///
    /// The response must contain exactly one image per requested reference.
    async fn fetch_images(&self, layout_refs: &[String]) -> Result<ImagesResponse>;

    /// Download result files as a binary blob
    async fn download_results(&self, payload: &DownloadPayload) -> Result<Vec<u8>>;
}
