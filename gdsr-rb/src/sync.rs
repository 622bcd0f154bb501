//! View synchronizer
//!
//! Owns the selection stores and the loader of both stages and is the only
//! place that turns user actions into queries. Every state change ends with
//! an explicit publish on the [`EventBus`]; views react to the event and
//! read [`ViewSynchronizer::snapshot`] instead of deriving filter state
//! themselves.
//!
//! # Architecture
//!
//! ```text
//! Cart / Level-1 / Range filters / Graph selection
//!              │
//!              ▼
//!     FilterRequestBuilder ──► PaginatedResultLoader ──► ResultsApi
//!              │                        │
//!              └──────── publish ───────┴──► EventBus ──► views
//! ```

use crate::api::ResultsApi;
use crate::cart::{CartStore, CartToggle};
use crate::download::{plan_download, DownloadOptions};
use crate::filtered_cells::{row_passes, MetricBounds};
use crate::graph_selection::GraphSelectionStore;
use crate::level1::{Level1Selection, Level1Store};
use crate::loader::{LoadOutcome, LoadedItem, PaginatedResultLoader, PaginationState};
use crate::range_filter::{RangeFilterStore, TableConstraint};
use crate::request_builder::{filter_state_of, FilterRequestBuilder};
use crate::scroll::{ScrollMetrics, ScrollTrigger};
use gdsr_common::api::{DownloadPayload, FilterQuery, Item};
use gdsr_common::events::{BrowserEvent, EventBus, FilterState, NotificationLevel};
use gdsr_common::lock_utils;
use gdsr_common::{Operator, PerStage, RangeFilter, Result, Stage};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which stages a "clear all filters" refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearAction {
    SingleStage,
    BothStages,
}

/// Everything the five views of one stage render
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub stage: Stage,
    /// Image grid and metrics table rows
    pub items: Vec<LoadedItem>,
    pub pex_consolidated: Vec<Value>,
    /// Consolidated table and scatter graph rows (level-2 applied)
    pub filtered_data: Vec<Item>,
    pub cart: Vec<String>,
    pub graph_selection: Option<Vec<String>>,
    pub pagination: PaginationState,
    pub filter_state: FilterState,
    pub level2_applied: bool,
    pub generation: u64,
    /// Axis ranges for the scatter graph
    pub metric_bounds: MetricBounds,
}

pub struct ViewSynchronizer {
    api: Arc<dyn ResultsApi>,
    events: EventBus,
    cart: Arc<CartStore>,
    level1: Arc<Level1Store>,
    ranges: Arc<RangeFilterStore>,
    graph: Arc<GraphSelectionStore>,
    builder: FilterRequestBuilder,
    loader: Arc<PaginatedResultLoader>,
    level2_applied: RwLock<PerStage<bool>>,
}

impl ViewSynchronizer {
    pub fn new(api: Arc<dyn ResultsApi>, events: EventBus, project_id: impl Into<String>) -> Self {
        let level1 = Arc::new(Level1Store::new());
        let ranges = Arc::new(RangeFilterStore::new());
        let graph = Arc::new(GraphSelectionStore::new());
        let builder = FilterRequestBuilder::new(level1.clone(), ranges.clone(), graph.clone());
        let loader = Arc::new(PaginatedResultLoader::new(
            api.clone(),
            events.clone(),
            project_id,
        ));

        Self {
            api,
            events,
            cart: Arc::new(CartStore::new()),
            level1,
            ranges,
            graph,
            builder,
            loader,
            level2_applied: RwLock::new(PerStage::default()),
        }
    }

    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    pub fn level1(&self) -> &Level1Store {
        &self.level1
    }

    pub fn ranges(&self) -> &RangeFilterStore {
        &self.ranges
    }

    pub fn graph(&self) -> &GraphSelectionStore {
        &self.graph
    }

    pub fn loader(&self) -> &PaginatedResultLoader {
        &self.loader
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrowserEvent> {
        self.events.subscribe()
    }

    pub fn level2_applied(&self, stage: Stage) -> bool {
        lock_utils::read(&self.level2_applied)[stage]
    }

    fn set_level2_applied(&self, stage: Stage, applied: bool) {
        lock_utils::write(&self.level2_applied)[stage] = applied;
    }

    // ========================================
    // Filter application
    // ========================================

    /// Apply the current level-1 / level-2 / graph state to a stage
    ///
    /// Invalid range filters fail before anything is sent.
    pub async fn apply_filter(&self, stage: Stage) -> Result<LoadOutcome> {
        if let Err(e) = self.ranges.validate(stage) {
            warn!(stage = stage.id(), error = %e, "Filter not applied");
            self.events.emit_lossy(BrowserEvent::notification(
                NotificationLevel::Warning,
                Some(stage),
                e.to_string(),
            ));
            return Err(e);
        }

        let query = self.builder.build(stage, &self.filter_population(stage));
        info!(stage = stage.id(), state = ?filter_state_of(&query), "Applying filter");

        self.set_level2_applied(stage, self.ranges.is_active(stage));
        self.refetch(stage, query).await
    }

    /// Drop level-2 filters and the graph selection, then reload
    ///
    /// Level-1 selections are kept. With [`ClearAction::BothStages`] the other
    /// stage re-runs its applied query; its filters stay as they are.
    pub async fn clear_all_filters(&self, stage: Stage, action: ClearAction) -> Result<()> {
        self.ranges.clear(stage);
        self.graph.clear(stage);
        self.set_level2_applied(stage, false);
        self.emit(BrowserEvent::RangeFiltersChanged {
            stage,
            filters: Vec::new(),
            timestamp: chrono::Utc::now(),
        });
        self.emit(BrowserEvent::GraphSelectionChanged {
            stage,
            selection: None,
            timestamp: chrono::Utc::now(),
        });

        let cleared = self
            .refetch(stage, self.builder.build(stage, &[]))
            .await
            .map(|_| ());

        let refreshed = match action {
            ClearAction::SingleStage => Ok(()),
            ClearAction::BothStages => {
                let other = stage.other();
                self.refetch(other, self.loader.active_query(other))
                    .await
                    .map(|_| ())
            }
        };

        cleared.and(refreshed)
    }

    /// Empty the stage cart; filters and loaded results are untouched
    pub fn clear_cart_and_selection(&self, stage: Stage) {
        self.cart.clear(stage);
        self.emit(BrowserEvent::CartCleared {
            stage,
            timestamp: chrono::Utc::now(),
        });
        self.publish(stage);
    }

    /// Copy the level-2 filters of `source` to the other stage and apply both
    pub async fn sync_across_stages(&self, source: Stage) -> Result<()> {
        let target = source.other();
        let filters = self.ranges.list(source);
        self.ranges.replace_all(target, filters.clone())?;
        self.emit(BrowserEvent::RangeFiltersChanged {
            stage: target,
            filters,
            timestamp: chrono::Utc::now(),
        });

        self.apply_filter(source).await?;
        self.apply_filter(target).await?;
        Ok(())
    }

    async fn refetch(&self, stage: Stage, query: FilterQuery) -> Result<LoadOutcome> {
        self.loader.reset(stage, query);
        self.loader.invalidate_graph_cache(stage);
        let result = self.loader.load(stage, 0).await;
        self.publish(stage);
        result
    }

    // ========================================
    // Store mutations
    // ========================================

    pub fn toggle_cart(&self, stage: Stage, file_id: &str) -> CartToggle {
        let toggle = self.cart.toggle(stage, file_id);
        self.emit(BrowserEvent::CartToggled {
            stage,
            file_id: file_id.to_string(),
            added: toggle.added,
            timestamp: chrono::Utc::now(),
        });
        toggle
    }

    /// Stage a range filter; it takes effect on the next [`apply_filter`](Self::apply_filter)
    pub fn set_range_filter(
        &self,
        stage: Stage,
        parameter_name: &str,
        operator: Operator,
        value1: Option<f64>,
        value2: Option<f64>,
    ) -> Result<()> {
        self.ranges
            .upsert(stage, parameter_name, operator, value1, value2)?;
        self.emit_range_filters(stage);
        Ok(())
    }

    pub fn remove_range_filter(&self, stage: Stage, parameter_name: &str) -> bool {
        let removed = self.ranges.remove(stage, parameter_name);
        if removed {
            self.emit_range_filters(stage);
        }
        removed
    }

    /// Replace the stage filters from the metrics table column constraints
    pub fn set_table_constraints(
        &self,
        stage: Stage,
        constraints_by_column: &BTreeMap<String, Vec<TableConstraint>>,
    ) -> Result<Vec<RangeFilter>> {
        let filters = self
            .ranges
            .apply_table_constraints(stage, constraints_by_column)?;
        self.emit_range_filters(stage);
        Ok(filters)
    }

    /// Stored only; used the next time the stage filter is applied
    pub fn set_level1_selection(&self, stage: Stage, selection: Level1Selection) {
        debug!(stage = stage.id(), active = selection.is_active(), "Level-1 selection set");
        self.level1.set(stage, selection);
    }

    /// Brush selection; re-fetches with the selection (or the normal query when empty)
    pub async fn set_graph_selection(&self, stage: Stage, file_ids: &[String]) -> Result<LoadOutcome> {
        self.graph.set_from_brush(stage, file_ids);
        self.graph_selection_changed(stage).await
    }

    pub async fn toggle_graph_point(&self, stage: Stage, file_id: &str) -> Result<LoadOutcome> {
        self.graph.toggle_point(stage, file_id);
        self.graph_selection_changed(stage).await
    }

    pub async fn clear_graph_selection(&self, stage: Stage) -> Result<LoadOutcome> {
        self.graph.clear(stage);
        self.graph_selection_changed(stage).await
    }

    async fn graph_selection_changed(&self, stage: Stage) -> Result<LoadOutcome> {
        let selection = self.graph.get(stage);
        self.emit(BrowserEvent::GraphSelectionChanged {
            stage,
            selection,
            timestamp: chrono::Utc::now(),
        });

        let query = self.builder.build(stage, &self.filter_population(stage));
        self.refetch(stage, query).await
    }

    /// Rows level-2 cells are derived from
    ///
    /// A graph-selected result set is not a filter population, so nothing
    /// is returned for it and the server applies the range filters alone.
    fn filter_population(&self, stage: Stage) -> Vec<Item> {
        match self.loader.active_query(stage) {
            FilterQuery::ByLayout(_) => Vec::new(),
            FilterQuery::ByCriteria(_) => self.loader.raw_items(stage),
        }
    }

    // ========================================
    // Loading
    // ========================================

    /// Append the next page of the active query
    pub async fn load_next_page(&self, stage: Stage) -> Result<LoadOutcome> {
        let outcome = self.loader.load_next_page(stage).await?;
        if matches!(outcome, LoadOutcome::Appended { .. } | LoadOutcome::Exhausted) {
            self.publish(stage);
        }
        Ok(outcome)
    }

    /// Drive `load_next_page` from a view's scroll events
    ///
    /// Fires only while the server reports remaining items.
    pub fn spawn_scroll_loader(
        self: &Arc<Self>,
        stage: Stage,
        trigger: ScrollTrigger,
        rx: mpsc::Receiver<ScrollMetrics>,
    ) -> JoinHandle<usize> {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            trigger
                .run(rx, move || {
                    let sync = Arc::clone(&sync);
                    async move {
                        if sync.loader.pagination(stage).remaining_items == 0 {
                            return;
                        }
                        if let Err(e) = sync.load_next_page(stage).await {
                            warn!(stage = stage.id(), error = %e, "Scroll load failed");
                        }
                    }
                })
                .await
        })
    }

    /// Switch project: every store and both accumulators start over
    pub fn set_project(&self, project_id: impl Into<String>) {
        self.cart.clear_all();
        self.level1.clear_all();
        self.ranges.clear_all();
        self.graph.clear_all();
        *lock_utils::write(&self.level2_applied) = PerStage::default();
        self.loader.set_project(project_id);

        for stage in Stage::ALL {
            self.publish(stage);
        }
    }

    // ========================================
    // Read models
    // ========================================

    pub fn snapshot(&self, stage: Stage) -> StageView {
        let items = self.loader.items(stage);
        let metric_bounds = self.loader.metric_bounds(stage);
        let level2_applied = self.level2_applied(stage);
        let active_query = self.loader.active_query(stage);

        let filters = match active_query.filter() {
            Some(criteria) if level2_applied => criteria
                .filter_parameters_name
                .filter_level2
                .clone()
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let filtered_data = items
            .iter()
            .map(|loaded| &loaded.item)
            .filter(|item| row_passes(item, &filters, &metric_bounds))
            .cloned()
            .collect();

        StageView {
            stage,
            items,
            pex_consolidated: self.loader.pex(stage),
            filtered_data,
            cart: self.cart.items(stage),
            graph_selection: self.graph.get(stage),
            pagination: self.loader.pagination(stage),
            filter_state: filter_state_of(&active_query),
            level2_applied,
            generation: self.loader.generation(stage),
            metric_bounds,
        }
    }

    // ========================================
    // Download
    // ========================================

    /// Payload for downloading the stage as currently applied
    pub fn plan_download(&self, stage: Stage, options: &DownloadOptions) -> DownloadPayload {
        let query = self.loader.active_query(stage);
        plan_download(
            &self.loader.project_id(),
            stage,
            options,
            self.cart.items(stage),
            &query,
            !query.is_unfiltered(),
        )
    }

    pub async fn download(&self, stage: Stage, options: &DownloadOptions) -> Result<Vec<u8>> {
        let payload = self.plan_download(stage, options);
        info!(
            stage = stage.id(),
            download_type = u8::from(payload.download_type),
            "Requesting download"
        );

        self.api.download_results(&payload).await.map_err(|e| {
            self.events.emit_lossy(BrowserEvent::notification(
                NotificationLevel::Error,
                Some(stage),
                format!("Download failed: {}", e),
            ));
            e
        })
    }

    // ========================================
    // Publishing
    // ========================================

    /// Tell every view of `stage` to re-read its snapshot
    pub fn publish(&self, stage: Stage) {
        let event = BrowserEvent::ViewsUpdated {
            stage,
            filter_state: filter_state_of(&self.loader.active_query(stage)),
            level2_applied: self.level2_applied(stage),
            generation: self.loader.generation(stage),
            timestamp: chrono::Utc::now(),
        };
        self.emit(event);
    }

    fn emit_range_filters(&self, stage: Stage) {
        self.emit(BrowserEvent::RangeFiltersChanged {
            stage,
            filters: self.ranges.list(stage),
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit(&self, event: BrowserEvent) {
        self.events.emit_lossy(event);
    }
}
