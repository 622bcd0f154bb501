//! Event types for the results browser
//!
//! Provides the BrowserEvent enum and the EventBus views subscribe to.
//! The view synchronizer is the only publisher of view-facing state: views
//! react to these events and read the published snapshot, they never
//! re-derive filter state on their own.

use crate::filter::RangeFilter;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Coarse filter state of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterState {
    /// No level-1, level-2 or graph constraint
    Unfiltered,
    /// Level-1 and/or level-2 filters active
    Filtered,
    /// Graph selection overrides every other filter
    GraphOverridden,
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Results browser event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BrowserEvent {
    /// Item pinned to or removed from a stage cart
    CartToggled {
        stage: Stage,
        file_id: String,
        /// True when the item was added, false when removed
        added: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Stage cart emptied
    CartCleared {
        stage: Stage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Level-2 range filter list changed (not yet applied)
    RangeFiltersChanged {
        stage: Stage,
        filters: Vec<RangeFilter>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Graph brush/click selection changed
    GraphSelectionChanged {
        stage: Stage,
        /// Selected file ids (None when cleared)
        selection: Option<Vec<String>>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Accumulator cleared because the query changed
    ///
    /// Responses issued under an older generation are discarded.
    ResultsReset {
        stage: Stage,
        generation: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One page appended to the stage accumulator
    PageLoaded {
        stage: Stage,
        page: u32,
        added: usize,
        total_loaded: usize,
        remaining_items: u64,
        has_more: bool,
        generation: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Canonical state published to all five views
    ViewsUpdated {
        stage: Stage,
        filter_state: FilterState,
        level2_applied: bool,
        generation: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transient user-facing notification (errors are non-fatal)
    Notification {
        level: NotificationLevel,
        stage: Option<Stage>,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl BrowserEvent {
    /// Stage the event concerns, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BrowserEvent::CartToggled { stage, .. }
            | BrowserEvent::CartCleared { stage, .. }
            | BrowserEvent::RangeFiltersChanged { stage, .. }
            | BrowserEvent::GraphSelectionChanged { stage, .. }
            | BrowserEvent::ResultsReset { stage, .. }
            | BrowserEvent::PageLoaded { stage, .. }
            | BrowserEvent::ViewsUpdated { stage, .. } => Some(*stage),
            BrowserEvent::Notification { stage, .. } => *stage,
        }
    }

    /// Convenience constructor for notifications
    pub fn notification(level: NotificationLevel, stage: Option<Stage>, message: impl Into<String>) -> Self {
        BrowserEvent::Notification {
            level,
            stage,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers (one per view)
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use gdsr_common::events::{BrowserEvent, EventBus};
/// use gdsr_common::Stage;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(BrowserEvent::CartCleared {
///     stage: Stage::LayoutGeneration,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(BrowserEvent::CartCleared { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BrowserEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<BrowserEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: BrowserEvent,
    ) -> Result<usize, broadcast::error::SendError<BrowserEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BrowserEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
