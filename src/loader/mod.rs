//! The incremental feed loader.
//!
//! [`FeedLoader`] turns triggers (start-up, near-bottom scroll) into pages of
//! [`NewsItem`]s appended to a [`RenderSink`]. It serves the primary source
//! from a list fetched once per session, then falls back to the paginated
//! secondary source, never rendering the same URL twice.
//!
//! # Concurrency
//!
//! Everything runs cooperatively on one task. Each source has an in-flight
//! flag; a trigger that selects a source already in flight is dropped and
//! reports [`TriggerOutcome::Busy`]. State lives behind a mutex that is never
//! held across an `.await`, so interleaved triggers see consistent state.

mod state;

use secrecy::SecretString;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::feed::{
    fetch_payload, primary_request_url, process_news_data, process_rt_data,
    secondary_request_url, FetchError, NewsItem, RawApiResponse, Source,
};
use crate::render::{error_element, render_news_items, RenderSink};
use crate::storage::{KeyValueStore, ResponseCache};

pub use crate::feed::SourceSettings;
pub use state::LoaderPhase;

use state::{LoaderState, Selection};

/// Settings for one loader instance.
#[derive(Debug)]
pub struct LoaderConfig {
    /// Items served per trigger (and `limit` for secondary requests).
    pub page_size: usize,
    pub cache_ttl: Duration,
    pub placeholder_image: String,
    pub api_key: Option<SecretString>,
    pub primary: SourceSettings,
    pub secondary: SourceSettings,
}

/// What a single trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A page was served; `count` may be zero when nothing unseen was left.
    Rendered { source: Source, count: usize },
    /// The selected source already had a fetch in flight; nothing happened.
    Busy(Source),
    /// The load failed and an inline error was rendered. State is unchanged.
    Failed(Source),
    /// Both sources are exhausted.
    Exhausted,
}

/// Clears a source's in-flight flag when the load finishes or is dropped.
struct InFlight<'a> {
    state: &'a Mutex<LoaderState>,
    source: Source,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.source_mut(self.source).in_flight = false;
    }
}

/// Keeps the loading indicator on for as long as it lives.
struct LoadingIndicator<'a, R: RenderSink> {
    sink: &'a R,
}

impl<'a, R: RenderSink> LoadingIndicator<'a, R> {
    fn show(sink: &'a R) -> Self {
        sink.set_loading(true);
        Self { sink }
    }
}

impl<R: RenderSink> Drop for LoadingIndicator<'_, R> {
    fn drop(&mut self) {
        self.sink.set_loading(false);
    }
}

pub struct FeedLoader<S, R> {
    client: reqwest::Client,
    config: LoaderConfig,
    cache: ResponseCache<S>,
    sink: R,
    state: Mutex<LoaderState>,
}

impl<S: KeyValueStore, R: RenderSink> FeedLoader<S, R> {
    pub fn new(client: reqwest::Client, config: LoaderConfig, store: S, sink: R) -> Self {
        let cache = ResponseCache::new(store, config.cache_ttl);
        Self {
            client,
            config,
            cache,
            sink,
            state: Mutex::new(LoaderState::default()),
        }
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn cache(&self) -> &ResponseCache<S> {
        &self.cache
    }

    pub fn phase(&self) -> LoaderPhase {
        self.lock_state().phase()
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase() == LoaderPhase::Exhausted
    }

    /// Number of distinct items rendered this session.
    pub fn rendered_count(&self) -> usize {
        self.lock_state().seen.len()
    }

    /// The single entry point: serve the next page from whichever source is due.
    ///
    /// A primary page that comes back empty because the primary just ran dry
    /// moves straight on to the secondary source; an empty page has nothing
    /// to scroll, so no later trigger would arrive.
    pub async fn on_trigger(&self) -> TriggerOutcome {
        let source = match self.claim() {
            Ok(source) => source,
            Err(outcome) => return outcome,
        };
        let outcome = self.serve(source).await;

        let primary_ran_dry = outcome
            == TriggerOutcome::Rendered {
                source: Source::Primary,
                count: 0,
            }
            && self.lock_state().primary.exhausted;
        if primary_ran_dry {
            if let Ok(next) = self.claim() {
                tracing::debug!(source = %next, "Primary empty, continuing with next source");
                return self.serve(next).await;
            }
        }
        outcome
    }

    /// Pick the due source and mark it in flight.
    fn claim(&self) -> Result<Source, TriggerOutcome> {
        let mut state = self.lock_state();
        match state.select() {
            Selection::Serve(source) => {
                state.source_mut(source).in_flight = true;
                Ok(source)
            }
            Selection::Busy(source) => {
                tracing::debug!(source = %source, "Fetch already in flight, dropping trigger");
                Err(TriggerOutcome::Busy(source))
            }
            Selection::Exhausted => Err(TriggerOutcome::Exhausted),
        }
    }

    /// Load one page from a source already claimed by [`claim`](Self::claim).
    async fn serve(&self, source: Source) -> TriggerOutcome {
        let _in_flight = InFlight {
            state: &self.state,
            source,
        };

        let result = match source {
            Source::Primary => self.load_primary().await,
            Source::Secondary => self.load_secondary().await,
        };

        match result {
            Ok(count) => TriggerOutcome::Rendered { source, count },
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Failed to load news");
                self.sink.append_html(error_element(&format!(
                    "Could not load more news ({e}). Scroll down to try again."
                )));
                TriggerOutcome::Failed(source)
            }
        }
    }

    // ========================================================================
    // Source Loads
    // ========================================================================

    /// Serve the next page of the primary source, fetching the full list on
    /// first use.
    async fn load_primary(&self) -> Result<usize, FetchError> {
        let needs_list = self.lock_state().primary_items.is_none();
        if needs_list {
            let items = self.obtain_primary_items().await?;
            tracing::info!(items = items.len(), "Primary feed loaded");
            self.lock_state().primary_items = Some(items);
        }

        let (page, exhausted) = {
            let mut state = self.lock_state();
            let page = state.next_primary_page(self.config.page_size);
            (page, state.primary.exhausted)
        };

        self.render(&page);
        tracing::info!(source = "primary", count = page.len(), exhausted = exhausted, "Served page");
        Ok(page.len())
    }

    async fn obtain_primary_items(&self) -> Result<Vec<NewsItem>, FetchError> {
        let settings = &self.config.primary;
        let url = primary_request_url(settings, self.config.api_key.as_ref());
        let response = self.cached_or_fetch(&settings.cache_key, url).await?;

        let parsed = process_news_data(&response, settings, &self.config.placeholder_image);
        if parsed.skipped > 0 {
            tracing::debug!(source = "primary", skipped = parsed.skipped, "Records without a usable URL skipped");
        }
        Ok(parsed.items)
    }

    /// Fetch and serve the secondary page at the current offset.
    async fn load_secondary(&self) -> Result<usize, FetchError> {
        let settings = &self.config.secondary;
        let limit = self.config.page_size;
        let offset = self.lock_state().secondary.cursor;
        let url = secondary_request_url(settings, self.config.api_key.as_ref(), offset, limit);

        // Only the first page is cached; its key is fixed per source.
        let response = if offset == 0 {
            self.cached_or_fetch(&settings.cache_key, url).await?
        } else {
            self.fetch_validated(url).await?.1
        };

        let raw_count = response.results.len();
        let parsed = process_rt_data(&response, settings, &self.config.placeholder_image);
        if parsed.skipped > 0 {
            tracing::debug!(source = "secondary", skipped = parsed.skipped, "Records without a usable URL skipped");
        }

        let (page, exhausted) = {
            let mut state = self.lock_state();
            let page = state.accept_secondary_page(parsed.items, raw_count, limit);
            (page, state.secondary.exhausted)
        };

        self.render(&page);
        tracing::info!(
            source = "secondary",
            offset = offset,
            count = page.len(),
            exhausted = exhausted,
            "Served page"
        );
        Ok(page.len())
    }

    // ========================================================================
    // Fetch Helpers
    // ========================================================================

    /// Fresh cache entry if there is a valid one, else a network fetch whose
    /// payload is written back under `cache_key`.
    async fn cached_or_fetch(
        &self,
        cache_key: &str,
        url: url::Url,
    ) -> Result<RawApiResponse, FetchError> {
        if let Some(raw) = self.cache.get_cached_data(cache_key).await {
            match RawApiResponse::from_value(&raw) {
                Ok(response) => {
                    tracing::debug!(key = %cache_key, "Serving from cache");
                    return Ok(response);
                }
                Err(e) => {
                    tracing::debug!(key = %cache_key, error = %e, "Cached payload invalid, refetching");
                    self.cache.evict(cache_key).await;
                }
            }
        }

        let (raw, response) = self.fetch_validated(url).await?;
        self.cache.cache_data(cache_key, &raw).await;
        Ok(response)
    }

    async fn fetch_validated(
        &self,
        url: url::Url,
    ) -> Result<(serde_json::Value, RawApiResponse), FetchError> {
        let indicator = LoadingIndicator::show(&self.sink);
        let fetched = fetch_payload(&self.client, url).await;
        drop(indicator);

        let raw = fetched?;
        let response = RawApiResponse::from_value(&raw)?;
        Ok((raw, response))
    }

    fn render(&self, page: &[NewsItem]) {
        render_news_items(&self.sink, page, &self.config.placeholder_image);
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        // Nothing panics while holding the lock; recover the data if it ever happens.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
