use anyhow::Result;

use super::schema::Database;
use super::KeyValueStore;

impl KeyValueStore for Database {
    /// Get a single value by key.
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM key_value WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a value (UPSERT), refreshing `updated_at`.
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO key_value (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM key_value WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, KeyValueStore};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = test_db().await;
        assert_eq!(db.get("nonexistent.key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let db = test_db().await;
        db.set("newsroll.cache.primary", "{}").await.unwrap();

        let value = db.get("newsroll.cache.primary").await.unwrap();
        assert_eq!(value, Some("{}".to_string()));
    }

    #[tokio::test]
    async fn test_set_upsert() {
        let db = test_db().await;
        db.set("k", "old").await.unwrap();
        db.set("k", "new").await.unwrap();

        assert_eq!(db.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_remove() {
        let db = test_db().await;
        db.set("k", "v").await.unwrap();
        db.remove("k").await.unwrap();
        assert_eq!(db.get("k").await.unwrap(), None);

        // Removing a missing key is not an error
        db.remove("k").await.unwrap();
    }
}
