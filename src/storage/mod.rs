//! Key-value storage for the response cache.
//!
//! [`KeyValueStore`] is the `get`/`set`/`remove` surface the cache needs.
//! [`Database`] persists it in SQLite; [`MemoryStore`] keeps it in process.
//! [`ResponseCache`] layers the TTL entry format on top of either.

mod cache;
mod key_value;
mod memory;
mod schema;
mod types;

use anyhow::Result;

pub use cache::{ResponseCache, DEFAULT_TTL};
pub use memory::MemoryStore;
pub use schema::Database;
pub use types::{CacheEntry, DatabaseError};

/// String key-value store with `get`/`set`/`remove` semantics.
///
/// Any method may fail (storage unavailable, disk full); callers in this
/// crate treat failures as a cache miss.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
