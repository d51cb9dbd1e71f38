use std::collections::HashSet;

use crate::feed::{NewsItem, Source};

/// Observable phase of a loader, derived from its per-source flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderPhase {
    Idle,
    FetchingPrimary,
    FetchingSecondary,
    Exhausted,
}

/// Which source a trigger should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    Serve(Source),
    Busy(Source),
    Exhausted,
}

/// Cursor and flags for one upstream source.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceState {
    pub in_flight: bool,
    /// Primary: index into the held list. Secondary: server-side offset.
    pub cursor: usize,
    pub exhausted: bool,
}

/// All mutable loader state for one session.
#[derive(Debug, Default)]
pub(crate) struct LoaderState {
    pub primary: SourceState,
    pub secondary: SourceState,
    /// Full transformed primary result set, fetched once per session.
    pub primary_items: Option<Vec<NewsItem>>,
    /// URLs rendered so far, across both sources.
    pub seen: HashSet<String>,
}

impl LoaderState {
    pub fn source(&self, source: Source) -> &SourceState {
        match source {
            Source::Primary => &self.primary,
            Source::Secondary => &self.secondary,
        }
    }

    pub fn source_mut(&mut self, source: Source) -> &mut SourceState {
        match source {
            Source::Primary => &mut self.primary,
            Source::Secondary => &mut self.secondary,
        }
    }

    pub fn phase(&self) -> LoaderPhase {
        if self.primary.in_flight {
            LoaderPhase::FetchingPrimary
        } else if self.secondary.in_flight {
            LoaderPhase::FetchingSecondary
        } else if self.primary.exhausted && self.secondary.exhausted {
            LoaderPhase::Exhausted
        } else {
            LoaderPhase::Idle
        }
    }

    /// Primary while it has items left, then secondary, then nothing.
    pub fn select(&self) -> Selection {
        let source = if !self.primary.exhausted {
            Source::Primary
        } else if !self.secondary.exhausted {
            Source::Secondary
        } else {
            return Selection::Exhausted;
        };

        if self.source(source).in_flight {
            Selection::Busy(source)
        } else {
            Selection::Serve(source)
        }
    }

    /// Serve the next page from the held primary list.
    ///
    /// Consumes windows of `page_size` records from the cursor, dropping URLs
    /// already rendered. A window made only of duplicates is skipped so the
    /// page is empty only when the list has nothing unseen left. Marks primary
    /// exhausted once the cursor reaches the end.
    pub fn next_primary_page(&mut self, page_size: usize) -> Vec<NewsItem> {
        let Some(items) = self.primary_items.as_ref() else {
            return Vec::new();
        };
        let len = items.len();
        let mut page = Vec::new();

        while page.is_empty() && self.primary.cursor < len {
            let start = self.primary.cursor;
            let end = start.saturating_add(page_size.max(1)).min(len);
            for item in &items[start..end] {
                if self.seen.insert(item.url.clone()) {
                    page.push(item.clone());
                }
            }
            self.primary.cursor = end;
        }

        if self.primary.cursor >= len {
            self.primary.exhausted = true;
        }
        page
    }

    /// Accept one server-side page from the secondary source.
    ///
    /// `raw_count` is the number of records the server returned, before any
    /// filtering; it advances the offset. The source is exhausted when the
    /// page adds nothing new or the server returned a short page.
    pub fn accept_secondary_page(
        &mut self,
        items: Vec<NewsItem>,
        raw_count: usize,
        limit: usize,
    ) -> Vec<NewsItem> {
        let page: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| self.seen.insert(item.url.clone()))
            .collect();

        self.secondary.cursor = self.secondary.cursor.saturating_add(raw_count);
        if page.is_empty() || raw_count < limit {
            self.secondary.exhausted = true;
        }
        page
    }
}
