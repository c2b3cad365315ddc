//! Entity set storage.
//!
//! Maps an entity id (a mod) to a set of member ids (the users liking it).
//! Every backend must apply `add_member`/`remove_member` as a single atomic
//! update on the store side; callers never read-modify-write.
//!
//! A returned [`MemberSet`] of `None` means the backend holds no member
//! attribute for the entity. Callers count that as zero members.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Backend, Store};
use crate::error::StoreError;
use crate::model::ModRating;

pub type MemberSet = Option<BTreeSet<String>>;

#[async_trait]
pub trait EntitySetStore: Send + Sync {
    /// Ensures `member_id` is in the set for `entity_id`, creating the entity if absent.
    async fn add_member(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError>;

    /// Ensures `member_id` is not in the set for `entity_id`. Missing entities and
    /// missing members are not errors.
    async fn remove_member(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError>;

    /// Every stored entity with its current member set, in no particular order.
    async fn list_all(&self) -> Result<Vec<ModRating>, StoreError>;
}

/// Table names are spliced into SQL, so only plain identifiers are accepted.
pub fn validate_table_name(table: &str) -> Result<(), StoreError> {
    let mut chars = table.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidConfig(format!("invalid table name {:?}", table)))
    }
}

pub async fn build_store(cfg: &Store, data_dir: &Path) -> Result<Arc<dyn EntitySetStore>, StoreError> {
    validate_table_name(cfg.get_table())?;

    match cfg.backend {
        Backend::Memory => {
            tracing::info!(table = cfg.get_table(), "[store] using in-memory backend");
            Ok(Arc::new(MemoryStore::new()))
        }
        Backend::Sqlite => Ok(Arc::new(SqliteStore::new(cfg, data_dir).await?)),
    }
}
