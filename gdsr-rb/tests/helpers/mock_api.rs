//! In-memory results service
//!
//! Serves a fixed catalogue of items. Item `i` belongs to cell INV, NAND or
//! NOR (`i % 3`) and carries a `Cap` metric in a cell-specific band, so a
//! range filter on `Cap` selects whole cells.

#![allow(dead_code)]

use async_trait::async_trait;
use gdsr_common::api::{
    DownloadPayload, FilterQuery, ImageEntry, ImagesResponse, Item, StageResultsData,
    StageResultsResponse,
};
use gdsr_common::{Error, Result, Stage};
use gdsr_rb::filtered_cells::{row_passes, MetricBounds};
use gdsr_rb::ResultsApi;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    /// One image per requested ref
    Aligned,
    /// One image fewer than requested
    Short,
    /// Image endpoint fails
    Failing,
}

pub struct MockResultsApi {
    items: Vec<Item>,
    page_size: usize,
    delay: Option<Duration>,
    image_mode: Mutex<ImageMode>,
    fail_results: AtomicBool,
    result_calls: AtomicUsize,
    queries: Mutex<Vec<(Stage, u32, FilterQuery)>>,
    downloads: Mutex<Vec<DownloadPayload>>,
}

pub fn catalogue_item(i: usize) -> Item {
    let (cell, base) = match i % 3 {
        0 => ("INV", 0.0),
        1 => ("NAND", 100.0),
        _ => ("NOR", 200.0),
    };
    Item::new(format!("{}_{:04}", cell, i), format!("ref{}", i))
        .with_metric("Cap", base + i as f64 / 10.0)
}

impl MockResultsApi {
    pub fn new(total: usize, page_size: usize) -> Self {
        Self {
            items: (0..total).map(catalogue_item).collect(),
            page_size,
            delay: None,
            image_mode: Mutex::new(ImageMode::Aligned),
            fail_results: AtomicBool::new(false),
            result_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Delay every stage-results response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_image_mode(&self, mode: ImageMode) {
        *self.image_mode.lock().unwrap() = mode;
    }

    pub fn set_fail_results(&self, fail: bool) {
        self.fail_results.store(fail, Ordering::SeqCst);
    }

    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<(Stage, u32, FilterQuery)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn last_query(&self, stage: Stage) -> Option<FilterQuery> {
        self.queries()
            .into_iter()
            .rev()
            .find(|(s, _, _)| *s == stage)
            .map(|(_, _, q)| q)
    }

    pub fn downloads(&self) -> Vec<DownloadPayload> {
        self.downloads.lock().unwrap().clone()
    }

    fn matching(&self, query: &FilterQuery) -> Vec<Item> {
        match query {
            FilterQuery::ByLayout(ids) => self
                .items
                .iter()
                .filter(|item| ids.contains(&item.file_id))
                .cloned()
                .collect(),
            FilterQuery::ByCriteria(criteria) => {
                let bounds = MetricBounds::compute(&self.items);
                let filters = criteria
                    .filter_parameters_name
                    .filter_level2
                    .clone()
                    .unwrap_or_default();
                self.items
                    .iter()
                    .filter(|item| {
                        criteria.cell_select_all
                            || criteria.cells.iter().any(|cell| cell == item.cell_name())
                    })
                    .filter(|item| row_passes(item, &filters, &bounds))
                    .cloned()
                    .collect()
            }
        }
    }
}

#[async_trait]
impl ResultsApi for MockResultsApi {
    async fn fetch_stage_results(
        &self,
        _project_id: &str,
        stage: Stage,
        page_number: u32,
        query: &FilterQuery,
    ) -> Result<StageResultsResponse> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap()
            .push((stage, page_number, query.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_results.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".to_string()));
        }

        let matching = self.matching(query);
        let start = (page_number as usize * self.page_size).min(matching.len());
        let end = (start + self.page_size).min(matching.len());

        Ok(StageResultsResponse {
            status: "success".to_string(),
            data: StageResultsData {
                items: matching[start..end].to_vec(),
                pex_consolidated: if start < end {
                    vec![serde_json::json!({ "page": page_number })]
                } else {
                    Vec::new()
                },
                page_number,
                page_size: self.page_size as u32,
                total_items: matching.len() as u64,
                remaining_items: (matching.len() - end) as u64,
                total_gds_count: self.items.len() as u64,
                selected_layouts: Vec::new(),
            },
        })
    }

    async fn fetch_images(&self, layout_refs: &[String]) -> Result<ImagesResponse> {
        let mode = *self.image_mode.lock().unwrap();
        let count = match mode {
            ImageMode::Aligned => layout_refs.len(),
            ImageMode::Short => layout_refs.len().saturating_sub(1),
            ImageMode::Failing => return Err(Error::Network("image service down".to_string())),
        };

        Ok(ImagesResponse {
            status: "success".to_string(),
            images: layout_refs
                .iter()
                .take(count)
                .map(|r| ImageEntry {
                    file: r.clone(),
                    encoded_image: format!("b64:{}", r),
                })
                .collect(),
        })
    }

    async fn download_results(&self, payload: &DownloadPayload) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(payload.clone());
        Ok(b"PK\x03\x04".to_vec())
    }
}
