//! Append-only HTML rendering of news items.
//!
//! The loader never diffs, removes or reorders: each served item becomes one
//! self-contained `<article>` block appended to a [`RenderSink`].
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::feed::NewsItem;
use crate::util::escape_html;

/// Where rendered fragments go, plus the loading indicator toggle.
pub trait RenderSink {
    /// Append one HTML fragment after everything already rendered.
    fn append_html(&self, fragment: String);

    /// Show or hide the loading indicator.
    fn set_loading(&self, visible: bool);
}

/// Render every item into `sink`, in order.
pub fn render_news_items<R: RenderSink + ?Sized>(sink: &R, items: &[NewsItem], placeholder: &str) {
    for item in items {
        sink.append_html(news_element(item, placeholder));
    }
}

/// Build the HTML block for one item.
///
/// The image falls back to `placeholder` if it fails to load in the browser.
/// The fallback rides in a `data-fallback` attribute; the `onerror` handler
/// itself is a constant, so no item or config text ever lands in script.
pub fn news_element(item: &NewsItem, placeholder: &str) -> String {
    let url = escape_html(&item.url);
    let title = escape_html(&item.title);
    let placeholder = escape_html(placeholder);

    let mut html = String::with_capacity(512);
    html.push_str(r#"<div class="row"><article class="featured-post-2 mb-2 mb-lg-4 pb-2 pb-lg-4 border-bottom">"#);
    html.push_str(&format!(r#"<a href="{url}" title="{title}" target="_blank" rel="noopener">"#));
    html.push_str(r#"<div class="featured-post-container"><div class="featured-post-img"><picture>"#);
    html.push_str(&format!(
        r#"<img src="{}" alt="{title}" loading="lazy" data-fallback="{placeholder}" onerror="this.onerror=null;this.src=this.dataset.fallback;">"#,
        escape_html(&item.image_url),
    ));
    html.push_str(r#"</picture></div><div class="featured-post-text">"#);
    html.push_str(&format!(
        r#"<span class="featured-post-section">{}</span>"#,
        escape_html(&item.section)
    ));
    html.push_str(&format!("<h2>{title}</h2>"));
    html.push_str(&format!("<p>{}</p>", escape_html(&item.abstract_text)));
    html.push_str("</div></div></a></article></div>");
    html
}

/// Inline, dismissible error block shown when a load fails.
pub fn error_element(message: &str) -> String {
    format!(
        r#"<div class="alert alert-warning alert-dismissible fade show" role="alert">{}<button type="button" class="btn-close" data-bs-dismiss="alert" aria-label="Close"></button></div>"#,
        escape_html(message)
    )
}

// ============================================================================
// HTML Container
// ============================================================================

/// In-memory stand-in for the page's news container.
///
/// Clones share the same fragment list and loading flag.
#[derive(Debug, Clone, Default)]
pub struct HtmlContainer {
    fragments: Arc<Mutex<Vec<String>>>,
    loading: Arc<AtomicBool>,
}

impl HtmlContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far.
    pub fn fragments(&self) -> Vec<String> {
        self.fragments.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fragments.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Wrap the fragments in a standalone Bootstrap page.
    pub fn to_document(&self, title: &str) -> String {
        let title = escape_html(title);
        let mut doc = String::new();
        doc.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        doc.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
        doc.push_str(&format!("<title>{title}</title>\n"));
        doc.push_str("<link rel=\"stylesheet\" href=\"https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css\">\n");
        doc.push_str("</head>\n<body>\n<main class=\"container\">\n<section id=\"infinite-news\">\n");
        for fragment in self.fragments() {
            doc.push_str(&fragment);
            doc.push('\n');
        }
        doc.push_str("</section>\n</main>\n</body>\n</html>\n");
        doc
    }
}

impl RenderSink for HtmlContainer {
    fn append_html(&self, fragment: String) {
        match self.fragments.lock() {
            Ok(mut fragments) => fragments.push(fragment),
            Err(e) => tracing::error!(error = %e, "News container lock poisoned, dropping fragment"),
        }
    }

    fn set_loading(&self, visible: bool) {
        self.loading.store(visible, Ordering::Release);
    }
}
