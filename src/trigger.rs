//! Scroll-driven trigger loop.
//!
//! Scroll events arrive on a channel. Bursts are collapsed: after the last
//! event of a burst has been quiet for the debounce interval, its position is
//! checked and the loader is triggered if the viewport is near the bottom.
use std::time::Duration;
use tokio::sync::mpsc;

use crate::loader::{FeedLoader, TriggerOutcome};
use crate::render::RenderSink;
use crate::storage::KeyValueStore;

/// Default quiet period that ends a burst of scroll events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Default distance from the bottom, in pixels, that counts as "near bottom".
pub const DEFAULT_THRESHOLD: u32 = 50;

/// Viewport geometry at the time of a scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollPosition {
    pub scroll_top: u32,
    pub client_height: u32,
    pub scroll_height: u32,
}

impl ScrollPosition {
    /// A position scrolled all the way down.
    pub fn at_bottom(scroll_height: u32, client_height: u32) -> Self {
        Self {
            scroll_top: scroll_height.saturating_sub(client_height),
            client_height,
            scroll_height,
        }
    }

    pub fn is_near_bottom(&self, threshold: u32) -> bool {
        let viewport_end = u64::from(self.scroll_top) + u64::from(self.client_height);
        viewport_end >= u64::from(self.scroll_height.saturating_sub(threshold))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSettings {
    pub debounce: Duration,
    pub threshold: u32,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Drive `loader` from scroll events until it is exhausted or `events` closes.
///
/// Fires one trigger up front for the initial page. Returns the number of
/// triggers fired, including that first one.
pub async fn run_triggers<S, R>(
    loader: &FeedLoader<S, R>,
    mut events: mpsc::Receiver<ScrollPosition>,
    settings: TriggerSettings,
) -> usize
where
    S: KeyValueStore,
    R: RenderSink,
{
    let mut fired = 1;
    log_outcome(loader.on_trigger().await);
    discard_queued(&mut events);

    while !loader.is_exhausted() {
        let Some(mut last) = events.recv().await else {
            break;
        };

        let mut closed = false;
        loop {
            match tokio::time::timeout(settings.debounce, events.recv()).await {
                Ok(Some(position)) => last = position,
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        if last.is_near_bottom(settings.threshold) {
            fired += 1;
            log_outcome(loader.on_trigger().await);
            discard_queued(&mut events);
        }

        if closed {
            break;
        }
    }

    tracing::debug!(fired = fired, exhausted = loader.is_exhausted(), "Trigger loop finished");
    fired
}

/// Drop scroll events that arrived while a load was running.
fn discard_queued(events: &mut mpsc::Receiver<ScrollPosition>) {
    let mut dropped = 0usize;
    while events.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(dropped = dropped, "Discarded scroll events received during load");
    }
}

fn log_outcome(outcome: TriggerOutcome) {
    match outcome {
        TriggerOutcome::Rendered { source, count } => {
            tracing::debug!(source = %source, count = count, "Trigger served");
        }
        TriggerOutcome::Busy(source) => {
            tracing::debug!(source = %source, "Trigger dropped, load in flight");
        }
        TriggerOutcome::Failed(source) => {
            tracing::debug!(source = %source, "Trigger failed");
        }
        TriggerOutcome::Exhausted => tracing::debug!("Trigger ignored, all sources exhausted"),
    }
}
