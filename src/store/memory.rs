use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use super::{EntitySetStore, MemberSet};
use crate::error::StoreError;
use crate::model::ModRating;

type Entry = Arc<Mutex<BTreeSet<String>>>;

/// Process-local backend. The outer lock only guards the key index; each
/// entity's set sits behind its own mutex so updates to different mods do
/// not contend.
#[derive(Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<String, Entry>>,
}

fn lock_error<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Lock(e.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, entity_id: &str) -> Result<Option<Entry>, StoreError> {
        let entities = self.entities.read().map_err(lock_error)?;
        Ok(entities.get(entity_id).cloned())
    }

    fn find_or_create(&self, entity_id: &str) -> Result<Entry, StoreError> {
        if let Some(entry) = self.find(entity_id)? {
            return Ok(entry);
        }

        let mut entities = self.entities.write().map_err(lock_error)?;
        let entry = entities
            .entry(entity_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(entity_id, "[store] creating entity");
                Arc::new(Mutex::new(BTreeSet::new()))
            })
            .clone();
        Ok(entry)
    }
}

#[async_trait]
impl EntitySetStore for MemoryStore {
    async fn add_member(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError> {
        let entry = self.find_or_create(entity_id)?;
        let mut members = entry.lock().map_err(lock_error)?;
        members.insert(member_id.to_string());
        Ok(Some(members.clone()))
    }

    async fn remove_member(&self, entity_id: &str, member_id: &str) -> Result<MemberSet, StoreError> {
        let Some(entry) = self.find(entity_id)? else {
            return Ok(None);
        };
        let mut members = entry.lock().map_err(lock_error)?;
        members.remove(member_id);
        Ok(Some(members.clone()))
    }

    async fn list_all(&self) -> Result<Vec<ModRating>, StoreError> {
        let snapshot: Vec<(String, Entry)> = {
            let entities = self.entities.read().map_err(lock_error)?;
            entities.iter().map(|(id, entry)| (id.clone(), entry.clone())).collect()
        };

        let mut ratings = Vec::with_capacity(snapshot.len());
        for (id, entry) in snapshot {
            let members = entry.lock().map_err(lock_error)?;
            ratings.push(ModRating {
                id,
                likes: Some(members.clone()),
            });
        }
        Ok(ratings)
    }
}
