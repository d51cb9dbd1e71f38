use crate::util::{is_absolute_http, non_blank, qualify_url};

use super::types::{NewsItem, RawApiResponse, RawMedia, RawRecord, SourceSettings};

/// Output of a record transform.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub items: Vec<NewsItem>,
    /// Records dropped for a missing or non-HTTP(S) URL, or an undecodable shape.
    pub skipped: usize,
}

/// Transform a primary ("top stories") payload into display items.
///
/// Records without an absolute HTTP(S) `url` are dropped. The image is
/// resolved from the `multimedia` variants; see [`resolve_image`].
pub fn process_news_data(
    response: &RawApiResponse,
    source: &SourceSettings,
    placeholder: &str,
) -> ParseResult {
    transform(response, source, placeholder, |record| {
        resolve_image(&record.multimedia, source)
    })
}

/// Transform a secondary (newswire) payload into display items.
///
/// Same filtering as [`process_news_data`]. The newswire also carries a
/// single `thumbnail_standard` link, used when no media variant resolves.
pub fn process_rt_data(
    response: &RawApiResponse,
    source: &SourceSettings,
    placeholder: &str,
) -> ParseResult {
    transform(response, source, placeholder, |record| {
        resolve_image(&record.multimedia, source).or_else(|| {
            non_blank(record.thumbnail_standard.as_deref())
                .and_then(|thumb| qualify_url(thumb, source.image_base_url.as_ref()))
        })
    })
}

fn transform<F>(
    response: &RawApiResponse,
    source: &SourceSettings,
    placeholder: &str,
    image_for: F,
) -> ParseResult
where
    F: Fn(&RawRecord) -> Option<String>,
{
    let (records, mut skipped) = response.records();
    let mut items = Vec::with_capacity(records.len());

    for record in &records {
        let url = match non_blank(record.url.as_deref()) {
            Some(url) if is_absolute_http(url) => url.to_string(),
            _ => {
                skipped += 1;
                continue;
            }
        };

        let section = non_blank(record.section.as_deref())
            .unwrap_or(source.default_section.as_str())
            .to_string();

        items.push(NewsItem {
            section,
            title: record.title.as_deref().unwrap_or_default().trim().to_string(),
            abstract_text: record
                .abstract_text
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
            url,
            image_url: image_for(record).unwrap_or_else(|| placeholder.to_string()),
        });
    }

    ParseResult { items, skipped }
}

/// Pick the display image from a record's media variants.
///
/// Preference order: a variant whose format names "medium", then one naming
/// "thumbnail", then the first variant with a usable link. Relative links
/// are qualified against the source's image base. Returns `None` when
/// nothing usable exists, leaving the caller to apply the placeholder.
pub fn resolve_image(media: &[RawMedia], source: &SourceSettings) -> Option<String> {
    let usable = |m: &RawMedia| {
        non_blank(m.url.as_deref()).and_then(|u| qualify_url(u, source.image_base_url.as_ref()))
    };
    let with_format = |needle: &str| {
        media.iter().find_map(|m| {
            let format = m.format.as_deref()?.to_ascii_lowercase();
            if format.contains(needle) {
                usable(m)
            } else {
                None
            }
        })
    };

    with_format("medium")
        .or_else(|| with_format("thumbnail"))
        .or_else(|| media.iter().find_map(&usable))
}
