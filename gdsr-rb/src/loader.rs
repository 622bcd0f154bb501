//! Paginated result loader
//!
//! Fetches one page of stage results at a time, attaches images for exactly
//! the new items and appends them to the stage accumulator. Loaded data is
//! never re-fetched: the accumulator only grows until the query changes.
//!
//! **Concurrency:** at most one load per stage is in flight. A [`reset`]
//! bumps the stage generation; a response that arrives for an older
//! generation is discarded instead of being appended to the new result set.
//!
//! [`reset`]: PaginatedResultLoader::reset

use crate::api::ResultsApi;
use crate::filtered_cells::MetricBounds;
use gdsr_common::api::{FilterQuery, Item};
use gdsr_common::events::{BrowserEvent, EventBus, NotificationLevel};
use gdsr_common::lock_utils;
use gdsr_common::{Error, PerStage, Result, Stage};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Paging bookkeeping for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    /// Next page number to request
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub remaining_items: u64,
    pub has_more: bool,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 0,
            total_items: 0,
            remaining_items: 0,
            has_more: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoaderPhase {
    Idle,
    Loading,
    Exhausted,
}

/// An accumulated item with its image, when one was delivered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedItem {
    pub item: Item,
    /// Base64-encoded layout image
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another load for the stage has not finished
    InFlight,
    /// The server reported no remaining items
    NoMorePages,
    /// Only the page after the last loaded one can be requested
    NotNextPage { next: u32 },
}

/// Result of one [`PaginatedResultLoader::load`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Appended {
        page: u32,
        added: usize,
        /// False when the image fetch failed or did not line up
        images_attached: bool,
    },
    /// The page came back empty; nothing more to load
    Exhausted,
    Skipped(SkipReason),
    /// The query changed while the request was outstanding
    Stale,
}

struct StageResults {
    items: Vec<LoadedItem>,
    pex_consolidated: Vec<Value>,
    pagination: PaginationState,
    phase: LoaderPhase,
    in_flight: bool,
    generation: u64,
    query: FilterQuery,
    metric_bounds: Option<MetricBounds>,
}

impl Default for StageResults {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pex_consolidated: Vec::new(),
            pagination: PaginationState::default(),
            phase: LoaderPhase::Idle,
            in_flight: false,
            generation: 0,
            query: FilterQuery::unfiltered(),
            metric_bounds: None,
        }
    }
}

/// Clears the in-flight flag on every exit path, including cancellation
struct InFlightGuard<'a> {
    stages: &'a Mutex<PerStage<StageResults>>,
    stage: Stage,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut stages = lock_utils::lock(self.stages);
        let state = &mut stages[self.stage];
        if state.generation == self.generation {
            state.in_flight = false;
            if state.phase == LoaderPhase::Loading {
                state.phase = LoaderPhase::Idle;
            }
        }
    }
}

/// Per-stage append-only result accumulator
pub struct PaginatedResultLoader {
    api: Arc<dyn ResultsApi>,
    events: EventBus,
    project_id: RwLock<String>,
    stages: Mutex<PerStage<StageResults>>,
}

impl PaginatedResultLoader {
    pub fn new(api: Arc<dyn ResultsApi>, events: EventBus, project_id: impl Into<String>) -> Self {
        Self {
            api,
            events,
            project_id: RwLock::new(project_id.into()),
            stages: Mutex::new(PerStage::default()),
        }
    }

    pub fn project_id(&self) -> String {
        lock_utils::read(&self.project_id).clone()
    }

    /// Switch project; both stages start over with an unfiltered query
    pub fn set_project(&self, project_id: impl Into<String>) {
        let project_id = project_id.into();
        info!(project_id = project_id.as_str(), "Project changed");
        *lock_utils::write(&self.project_id) = project_id;
        for stage in Stage::ALL {
            self.reset(stage, FilterQuery::unfiltered());
        }
    }

    /// Start a new result set for `query`
    ///
    /// Clears the accumulator and pagination and returns the new generation.
    /// Responses still outstanding for the previous generation are discarded
    /// when they arrive.
    pub fn reset(&self, stage: Stage, query: FilterQuery) -> u64 {
        let generation = {
            let mut stages = lock_utils::lock(&self.stages);
            let state = &mut stages[stage];
            let generation = state.generation + 1;
            *state = StageResults {
                generation,
                query,
                ..StageResults::default()
            };
            generation
        };

        debug!(stage = stage.id(), generation, "Results reset");
        self.events.emit_lossy(BrowserEvent::ResultsReset {
            stage,
            generation,
            timestamp: chrono::Utc::now(),
        });
        generation
    }

    /// Load the next page of the active query
    pub async fn load_next_page(&self, stage: Stage) -> Result<LoadOutcome> {
        let page = self.pagination(stage).page;
        self.load(stage, page).await
    }

    /// Fetch `page` of the active query and append it
    ///
    /// `page` must be the next unloaded page; anything else is skipped so the
    /// accumulator never holds a page twice.
    pub async fn load(&self, stage: Stage, page: u32) -> Result<LoadOutcome> {
        let (generation, query) = {
            let mut stages = lock_utils::lock(&self.stages);
            let state = &mut stages[stage];
            if state.in_flight {
                debug!(stage = stage.id(), page, "Load skipped: request in flight");
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            }
            if !state.pagination.has_more && page > 0 {
                debug!(stage = stage.id(), page, "Load skipped: no more pages");
                return Ok(LoadOutcome::Skipped(SkipReason::NoMorePages));
            }
            let next = state.pagination.page;
            if page != next {
                debug!(stage = stage.id(), page, next, "Load skipped: not the next page");
                return Ok(LoadOutcome::Skipped(SkipReason::NotNextPage { next }));
            }
            state.in_flight = true;
            state.phase = LoaderPhase::Loading;
            (state.generation, state.query.clone())
        };
        let _guard = InFlightGuard {
            stages: &self.stages,
            stage,
            generation,
        };

        let project_id = self.project_id();
        debug!(stage = stage.id(), page, generation, "Fetching stage results");

        let response = match self
            .api
            .fetch_stage_results(&project_id, stage, page, &query)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(stage = stage.id(), page, error = %e, "Stage results fetch failed");
                self.events.emit_lossy(BrowserEvent::notification(
                    NotificationLevel::Error,
                    Some(stage),
                    format!("Failed to load {} results: {}", stage, e),
                ));
                return Err(e);
            }
        };

        if self.generation(stage) != generation {
            debug!(stage = stage.id(), page, generation, "Discarding stale page");
            return Ok(LoadOutcome::Stale);
        }

        let data = response.data;
        let new_items = data.items;
        let images = if new_items.is_empty() {
            None
        } else {
            let refs: Vec<String> = new_items
                .iter()
                .map(|item| item.layout_data_ref.clone())
                .collect();
            self.fetch_images(stage, &refs).await
        };
        let images_attached = images.is_some();

        let mut stages = lock_utils::lock(&self.stages);
        let state = &mut stages[stage];
        if state.generation != generation {
            debug!(stage = stage.id(), page, generation, "Discarding stale page");
            return Ok(LoadOutcome::Stale);
        }

        let added = new_items.len();
        if added == 0 {
            state.pagination.has_more = false;
            state.pagination.remaining_items = 0;
            state.phase = LoaderPhase::Exhausted;
            drop(stages);

            info!(stage = stage.id(), page, "No more results");
            self.emit_page_loaded(stage, page, 0);
            return Ok(LoadOutcome::Exhausted);
        }

        let mut images = images.map(Vec::into_iter);
        state.items.extend(new_items.into_iter().map(|item| LoadedItem {
            item,
            image: images.as_mut().and_then(Iterator::next),
        }));
        if !data.pex_consolidated.is_empty() {
            state.pex_consolidated = data.pex_consolidated;
        }
        state.metric_bounds = None;

        state.pagination = PaginationState {
            page: page + 1,
            page_size: data.page_size,
            total_items: data.total_items,
            remaining_items: data.remaining_items,
            has_more: data.remaining_items > 0,
        };
        state.phase = if state.pagination.has_more {
            LoaderPhase::Idle
        } else {
            LoaderPhase::Exhausted
        };
        drop(stages);

        info!(stage = stage.id(), page, added, "Page appended");
        self.emit_page_loaded(stage, page, added);

        Ok(LoadOutcome::Appended {
            page,
            added,
            images_attached,
        })
    }

    /// Images aligned with `refs`, or None when they cannot be trusted
    async fn fetch_images(&self, stage: Stage, refs: &[String]) -> Option<Vec<String>> {
        let result = match self.api.fetch_images(refs).await {
            Ok(response) if response.images.len() == refs.len() => {
                return Some(
                    response
                        .images
                        .into_iter()
                        .map(|entry| entry.encoded_image)
                        .collect(),
                )
            }
            Ok(response) => Error::ImageMismatch {
                expected: refs.len(),
                received: response.images.len(),
            },
            Err(e) => e,
        };

        warn!(stage = stage.id(), error = %result, "Images not attached");
        self.events.emit_lossy(BrowserEvent::notification(
            NotificationLevel::Warning,
            Some(stage),
            format!("Layout images unavailable: {}", result),
        ));
        None
    }

    fn emit_page_loaded(&self, stage: Stage, page: u32, added: usize) {
        let stages = lock_utils::lock(&self.stages);
        let state = &stages[stage];
        let event = BrowserEvent::PageLoaded {
            stage,
            page,
            added,
            total_loaded: state.items.len(),
            remaining_items: state.pagination.remaining_items,
            has_more: state.pagination.has_more,
            generation: state.generation,
            timestamp: chrono::Utc::now(),
        };
        drop(stages);
        self.events.emit_lossy(event);
    }

    /// Run `f` over the accumulator without cloning it
    pub fn with_items<R>(&self, stage: Stage, f: impl FnOnce(&[LoadedItem]) -> R) -> R {
        f(&lock_utils::lock(&self.stages)[stage].items)
    }

    pub fn items(&self, stage: Stage) -> Vec<LoadedItem> {
        self.with_items(stage, <[LoadedItem]>::to_vec)
    }

    /// Loaded items without their images
    pub fn raw_items(&self, stage: Stage) -> Vec<Item> {
        self.with_items(stage, |items| items.iter().map(|l| l.item.clone()).collect())
    }

    pub fn pex(&self, stage: Stage) -> Vec<Value> {
        lock_utils::lock(&self.stages)[stage].pex_consolidated.clone()
    }

    pub fn pagination(&self, stage: Stage) -> PaginationState {
        lock_utils::lock(&self.stages)[stage].pagination.clone()
    }

    pub fn phase(&self, stage: Stage) -> LoaderPhase {
        lock_utils::lock(&self.stages)[stage].phase
    }

    pub fn is_in_flight(&self, stage: Stage) -> bool {
        lock_utils::lock(&self.stages)[stage].in_flight
    }

    pub fn generation(&self, stage: Stage) -> u64 {
        lock_utils::lock(&self.stages)[stage].generation
    }

    pub fn active_query(&self, stage: Stage) -> FilterQuery {
        lock_utils::lock(&self.stages)[stage].query.clone()
    }

    /// Observed metric ranges of the accumulator, cached until it changes
    pub fn metric_bounds(&self, stage: Stage) -> MetricBounds {
        let mut stages = lock_utils::lock(&self.stages);
        let state = &mut stages[stage];
        if let Some(bounds) = &state.metric_bounds {
            return bounds.clone();
        }
        let bounds = MetricBounds::compute(state.items.iter().map(|l| &l.item));
        state.metric_bounds = Some(bounds.clone());
        bounds
    }

    /// Drop the cached metric ranges
    pub fn invalidate_graph_cache(&self, stage: Stage) {
        lock_utils::lock(&self.stages)[stage].metric_bounds = None;
    }
}
