//! Incremental news feed loading for infinite-scroll pages.
//!
//! A [`loader::FeedLoader`] serves pages from a bulk-fetched primary source,
//! then from a server-paginated secondary source, caching raw payloads in a
//! [`storage::KeyValueStore`] and never rendering the same story twice.

pub mod config;
pub mod feed;
pub mod loader;
pub mod render;
pub mod storage;
pub mod trigger;
pub mod util;
