use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use super::fetcher::FetchError;

// ============================================================================
// Sources
// ============================================================================

/// The two upstream feeds the loader merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Fetched once in bulk and paginated from memory.
    Primary,
    /// Paginated server-side with `offset`/`limit`.
    Secondary,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Primary => "primary",
            Source::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a source lives and how its records are completed.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub endpoint: Url,
    /// Base for relative media paths. `None` drops relative paths.
    pub image_base_url: Option<Url>,
    /// Section label used when a record has none.
    pub default_section: String,
    /// Fixed key of this source's cache entry.
    pub cache_key: String,
}

// ============================================================================
// Display Items
// ============================================================================

/// One displayable article.
///
/// `url` is the item's identity: the loader never renders two items with
/// the same `url` in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsItem {
    pub section: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
    pub image_url: String,
}

// ============================================================================
// Wire Schema
// ============================================================================

/// Validated upstream payload.
///
/// Only the envelope is strict: the body must be a JSON object with a
/// `results` array. Individual records are decoded leniently afterwards so
/// one odd entry does not sink the whole page.
#[derive(Debug, Clone, Deserialize)]
pub struct RawApiResponse {
    pub results: Vec<serde_json::Value>,
}

impl RawApiResponse {
    /// Validate a raw JSON payload against the expected envelope.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, FetchError> {
        let results = value
            .as_object()
            .ok_or_else(|| FetchError::Malformed("response is not a JSON object".to_string()))?
            .get("results")
            .ok_or_else(|| FetchError::Malformed("missing `results` field".to_string()))?
            .as_array()
            .ok_or_else(|| FetchError::Malformed("`results` is not an array".to_string()))?;

        Ok(Self {
            results: results.clone(),
        })
    }

    /// Decode each record, discarding entries that are not objects of the
    /// expected shape. Returns the records plus the number discarded.
    pub fn records(&self) -> (Vec<RawRecord>, usize) {
        let mut records = Vec::with_capacity(self.results.len());
        let mut skipped = 0;
        for value in &self.results {
            match serde_json::from_value::<RawRecord>(value.clone()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::debug!(error = %e, "Discarding undecodable record");
                    skipped += 1;
                }
            }
        }
        (records, skipped)
    }
}

/// One upstream article record. Everything is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub section: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract", alias = "summary")]
    pub abstract_text: Option<String>,
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_media")]
    pub multimedia: Vec<RawMedia>,
    /// Single thumbnail link carried by the newswire feed.
    pub thumbnail_standard: Option<String>,
}

/// One media variant attached to a record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMedia {
    pub url: Option<String>,
    pub format: Option<String>,
}

/// Accept `multimedia` as an array, `null`, or the empty string some feeds
/// send instead of an empty array.
fn lenient_media<'de, D>(deserializer: D) -> Result<Vec<RawMedia>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let media = match value {
        serde_json::Value::Array(entries) => entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<RawMedia>(entry).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(media)
}
