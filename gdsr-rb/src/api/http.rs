//! HTTP adapter for the results service

use super::ResultsApi;
use async_trait::async_trait;
use gdsr_common::api::{
    DownloadPayload, FilterQuery, ImagesResponse, StageResultsRequest, StageResultsResponse,
};
use gdsr_common::{Error, Result, Stage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("gdsr-rb/", env!("CARGO_PKG_VERSION"));

const STAGE_RESULTS_PATH: &str = "stage-results";
const IMAGES_PATH: &str = "images";
const DOWNLOAD_PATH: &str = "download";

/// `reqwest`-backed [`ResultsApi`]
pub struct HttpResultsApi {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpResultsApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = self.url(path);
        debug!(url = url.as_str(), "POST");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.post(path, body)
            .await?
            .json::<R>()
            .await
            .map_err(|e| Error::Network(format!("Invalid response body from {}: {}", path, e)))
    }
}

#[async_trait]
impl ResultsApi for HttpResultsApi {
    async fn fetch_stage_results(
        &self,
        project_id: &str,
        stage: Stage,
        page_number: u32,
        query: &FilterQuery,
    ) -> Result<StageResultsResponse> {
        let request = StageResultsRequest::new(project_id, stage, page_number, query);
        self.post_json(STAGE_RESULTS_PATH, &request).await
    }

    async fn fetch_images(&self, layout_refs: &[String]) -> Result<ImagesResponse> {
        self.post_json(IMAGES_PATH, &json!({ "layoutRefs": layout_refs }))
            .await
    }

    async fn download_results(&self, payload: &DownloadPayload) -> Result<Vec<u8>> {
        let bytes = self
            .post(DOWNLOAD_PATH, payload)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
