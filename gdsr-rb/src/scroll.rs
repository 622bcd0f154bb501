//! Infinite-scroll trigger
//!
//! Views forward raw scroll positions over a channel. A burst of events is
//! coalesced with a trailing debounce, and the trigger fires once the
//! position settles within the threshold of the bottom.

use gdsr_common::config::ScrollConfig;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Scroll position of a view container, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, client_height: f64, scroll_height: f64) -> Self {
        Self {
            scroll_top,
            client_height,
            scroll_height,
        }
    }

    /// `scrollHeight - (scrollTop + clientHeight) <= threshold`
    pub fn is_near_bottom(&self, threshold_px: f64) -> bool {
        self.scroll_height - (self.scroll_top + self.client_height) <= threshold_px
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollTrigger {
    pub threshold_px: f64,
    pub debounce: Duration,
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::from_config(&ScrollConfig::default())
    }
}

impl ScrollTrigger {
    pub fn from_config(config: &ScrollConfig) -> Self {
        Self {
            threshold_px: config.threshold_px,
            debounce: Duration::from_millis(config.debounce_ms),
        }
    }

    /// Consume scroll events until the sender side closes
    ///
    /// `on_trigger` runs after each quiet period whose last event was near
    /// the bottom. Returns how many times it ran.
    pub async fn run<F, Fut>(&self, mut rx: mpsc::Receiver<ScrollMetrics>, mut on_trigger: F) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut fired = 0;

        while let Some(first) = rx.recv().await {
            let mut last = first;
            let mut closed = false;

            loop {
                match tokio::time::timeout(self.debounce, rx.recv()).await {
                    Ok(Some(metrics)) => last = metrics,
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            if last.is_near_bottom(self.threshold_px) {
                trace!(scroll_top = last.scroll_top, "Scroll settled near bottom");
                on_trigger().await;
                fired += 1;
            }

            if closed {
                break;
            }
        }

        fired
    }
}
