//! Upstream news APIs: wire schema, HTTP fetching and record transforms.
//!
//! - [`types`] - `NewsItem`, the `RawApiResponse` envelope and per-source settings
//! - [`fetcher`] - request URLs and the size-limited JSON GET
//! - [`parser`] - `process_news_data` / `process_rt_data`, URL filtering and image resolution
//!
//! # Example
//!
//! ```ignore
//! use newsroll::feed::{fetch_payload, primary_request_url, process_news_data, RawApiResponse};
//!
//! let raw = fetch_payload(&client, primary_request_url(&settings, key.as_ref())).await?;
//! let response = RawApiResponse::from_value(&raw)?;
//! let parsed = process_news_data(&response, &settings, "assets/images/01.jpg");
//! ```

mod fetcher;
mod parser;
mod types;

pub use fetcher::{fetch_payload, primary_request_url, secondary_request_url, FetchError};
pub use parser::{process_news_data, process_rt_data, resolve_image, ParseResult};
pub use types::{NewsItem, RawApiResponse, RawMedia, RawRecord, Source, SourceSettings};
