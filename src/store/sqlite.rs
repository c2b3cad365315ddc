use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use tokio::sync::Mutex;

use super::{EntitySetStore, MemberSet, validate_table_name};
use crate::config::Store;
use crate::error::StoreError;
use crate::model::ModRating;

const MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS _migrations (
    name TEXT PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL
);
"#;

/// Relational rendition of a mod -> set-of-users record: one row per mod in
/// `<table>` and one row per (mod, user) pair in `<table>_likes`. The
/// composite primary key gives set semantics.
fn schema_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY NOT NULL
);
CREATE TABLE IF NOT EXISTS {table}_likes (
    mod_id TEXT NOT NULL REFERENCES {table}(id),
    user_id TEXT NOT NULL,
    PRIMARY KEY (mod_id, user_id)
);
"#
    )
}

pub struct SqliteStore {
    db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Mutex<()>,
    table: String,
    replica: bool,
}

impl SqliteStore {
    pub async fn new(cfg: &Store, data_dir: &Path) -> Result<Self, StoreError> {
        let table = cfg.get_table().to_string();
        validate_table_name(&table)?;

        let db = match (&cfg.turso_url, &cfg.turso_auth_token) {
            (Some(url), Some(token)) => {
                tracing::info!("[store] running in synced database mode (embedded replica)");
                let path = data_dir.join(cfg.get_db());
                Builder::new_synced_database(&path, url.clone(), token.clone())
                    .sync_interval(Duration::from_secs(cfg.sync_interval_seconds))
                    .build()
                    .await?
            }
            _ if cfg.get_db() == ":memory:" => Builder::new_local(":memory:").build().await?,
            _ => Builder::new_local(data_dir.join(cfg.get_db())).build().await?,
        };

        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        let store = SqliteStore {
            db,
            conn,
            tx_lock: Mutex::new(()),
            table,
            replica: cfg.is_replica(),
        };

        store.sync().await?;
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn sync(&self) -> Result<(), StoreError> {
        if self.replica {
            self.db.sync().await?;
        }
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(MIGRATIONS_TABLE).await?;

        let name = format!("{}_001_schema", self.table);
        let mut rows = self
            .conn
            .query("SELECT 1 FROM _migrations WHERE name = ?", libsql::params![name.as_str()])
            .await?;
        if rows.next().await?.is_some() {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        self.conn.execute_batch(&schema_sql(&self.table)).await?;
        self.conn
            .execute(
                "INSERT INTO _migrations (name, applied_at) VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                libsql::params![name.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn members(&self, entity_id: &str) -> Result<BTreeSet<String>, StoreError> {
        let query = format!("SELECT user_id FROM {}_likes WHERE mod_id = ?", self.table);
        let mut rows = self.conn.query(&query, libsql::params![entity_id]).await?;

        let mut members = BTreeSet::new();
        while let Some(row) = rows.next().await? {
            members.insert(row.get::<String>(0)?);
        }
        Ok(members)
    }

    async fn entity_exists(&self, entity_id: &str) -> Result<bool, StoreError> {
        let query = format!("SELECT 1 FROM {} WHERE id = ?", self.table);
        let mut rows = self.conn.query(&query, libsql::params![entity_id]).await?;
        Ok(rows.next().await?.is_some())
    }

    async fn add_member_internal(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError> {
        let insert_entity = format!("INSERT OR IGNORE INTO {} (id) VALUES (?)", self.table);
        self.conn.execute(&insert_entity, libsql::params![entity_id]).await?;

        let insert_member = format!(
            "INSERT OR IGNORE INTO {}_likes (mod_id, user_id) VALUES (?, ?)",
            self.table
        );
        self.conn
            .execute(&insert_member, libsql::params![entity_id, member_id])
            .await?;

        Ok(Some(self.members(entity_id).await?))
    }

    async fn remove_member_internal(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError> {
        let delete_member = format!("DELETE FROM {}_likes WHERE mod_id = ? AND user_id = ?", self.table);
        let removed = self
            .conn
            .execute(&delete_member, libsql::params![entity_id, member_id])
            .await?;
        tracing::debug!(entity_id, removed, "[store] removed member rows");

        if !self.entity_exists(entity_id).await? {
            return Ok(None);
        }
        Ok(Some(self.members(entity_id).await?))
    }

    /// A dropped request future can leave a transaction open on the shared
    /// connection. Callers must hold `tx_lock`.
    async fn rollback_abandoned(&self) {
        if !self.conn.is_autocommit() {
            tracing::warn!("[store] rolling back abandoned transaction");
            let _ = self.conn.execute("ROLLBACK", ()).await;
        }
    }

    async fn begin(&self) -> Result<(), StoreError> {
        self.rollback_abandoned().await;
        self.conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;
        Ok(())
    }

    async fn commit_or_rollback(&self, result: Result<MemberSet, StoreError>) -> Result<MemberSet, StoreError> {
        match result {
            Ok(members) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(members)
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EntitySetStore for SqliteStore {
    async fn add_member(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError> {
        let _guard = self.tx_lock.lock().await;

        self.begin().await?;
        let result = self.add_member_internal(entity_id, member_id).await;
        self.commit_or_rollback(result).await
    }

    async fn remove_member(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError> {
        let _guard = self.tx_lock.lock().await;

        self.begin().await?;
        let result = self.remove_member_internal(entity_id, member_id).await;
        self.commit_or_rollback(result).await
    }

    async fn list_all(&self) -> Result<Vec<ModRating>, StoreError> {
        let query = format!(
            r#"
SELECT m.id, l.user_id
FROM {table} m
LEFT JOIN {table}_likes l ON l.mod_id = m.id
"#,
            table = self.table
        );

        let _guard = self.tx_lock.lock().await;
        self.rollback_abandoned().await;
        let mut rows = self.conn.query(&query, ()).await?;
        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let user_id: Option<String> = row.get(1)?;

            let likes = grouped.entry(id).or_default();
            if let Some(user_id) = user_id {
                likes.insert(user_id);
            }
        }

        let ratings = grouped
            .into_iter()
            .map(|(id, likes)| ModRating { id, likes: Some(likes) })
            .collect();
        Ok(ratings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use std::sync::Arc;

    async fn store(table: &str) -> SqliteStore {
        let cfg = Store::in_memory(Backend::Sqlite, table);
        SqliteStore::new(&cfg, Path::new(".")).await.unwrap()
    }

    fn len(set: MemberSet) -> Option<usize> {
        set.map(|s| s.len())
    }

    #[tokio::test]
    async fn add_creates_entity_and_is_idempotent() {
        let store = store("TEST_TABLE").await;
        assert_eq!(len(store.add_member("m", "u1").await.unwrap()), Some(1));
        assert_eq!(len(store.add_member("m", "u1").await.unwrap()), Some(1));

        let members = store.add_member("m", "u2").await.unwrap().unwrap();
        assert!(members.contains("u1"));
        assert!(members.contains("u2"));
    }

    #[tokio::test]
    async fn remove_from_unknown_entity_returns_absent() {
        let store = store("TEST_TABLE").await;
        assert_eq!(store.remove_member("ghost", "u").await.unwrap(), None);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_keeps_empty_record() {
        let store = store("TEST_TABLE").await;
        store.add_member("m", "u").await.unwrap();
        assert_eq!(len(store.remove_member("m", "u").await.unwrap()), Some(0));
        assert_eq!(len(store.remove_member("m", "never").await.unwrap()), Some(0));

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "m");
        assert_eq!(all[0].likes_count(), 0);
    }

    #[tokio::test]
    async fn list_groups_members_per_entity() {
        let store = store("mods_ratings").await;
        store.add_member("b", "u1").await.unwrap();
        store.add_member("a", "u1").await.unwrap();
        store.add_member("a", "u2").await.unwrap();
        store.add_member("a", "u1").await.unwrap();

        let mut all = store.list_all().await.unwrap();
        all.sort_by(|x, y| x.id.cmp(&y.id));
        let counts: Vec<(String, usize)> = all.iter().map(|r| (r.id.clone(), r.likes_count())).collect();
        assert_eq!(counts, vec![("a".to_string(), 2), ("b".to_string(), 1)]);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = store("TEST_TABLE").await;
        store.add_member("m", "u").await.unwrap();
        store.run_migrations().await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn abandoned_transaction_is_not_visible() {
        let store = store("TEST_TABLE").await;
        store.add_member("kept", "u").await.unwrap();

        store.conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await.unwrap();
        store
            .conn
            .execute("INSERT INTO TEST_TABLE (id) VALUES ('phantom')", ())
            .await
            .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "kept");

        assert_eq!(len(store.add_member("m", "u").await.unwrap()), Some(1));
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_adds_are_serialised() {
        let store = Arc::new(store("TEST_TABLE").await);
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add_member("shared", &format!("user-{i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = store.list_all().await.unwrap();
        assert_eq!(all[0].likes_count(), 16);
    }
}
