use std::sync::Arc;

use serde_json::Value;

use crate::api::{LikeResponse, ListResponse};
use crate::error::{Operation, ServiceError};
use crate::model::{LikeRequest, ModLikes, count_members};
use crate::store::EntitySetStore;

/// Decodes a raw request body into a JSON payload. An empty body is read as `{}`.
pub fn parse_body(body: &[u8]) -> Result<Value, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }

    serde_json::from_slice(body).map_err(|e| ServiceError::InvalidRequest(format!("unparsable body: {}", e)))
}

impl LikeRequest {
    pub fn from_body(body: &[u8]) -> Result<Self, ServiceError> {
        Self::from_payload(&parse_body(body)?)
    }

    /// Both `userId` and `modId` must be present and be strings.
    pub fn from_payload(payload: &Value) -> Result<Self, ServiceError> {
        let user_id = required_string(payload, "userId")?;
        let mod_id = required_string(payload, "modId")?;
        Ok(LikeRequest { user_id, mod_id })
    }
}

fn required_string(payload: &Value, field: &str) -> Result<String, ServiceError> {
    match payload.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ServiceError::InvalidRequest(format!("{} is not a string", field))),
        None => Err(ServiceError::InvalidRequest(format!("{} is missing", field))),
    }
}

/// Like/unlike/list over an [`EntitySetStore`]. Holds no state of its own.
#[derive(Clone)]
pub struct LikeService {
    store: Arc<dyn EntitySetStore>,
}

impl LikeService {
    pub fn new(store: Arc<dyn EntitySetStore>) -> Self {
        LikeService { store }
    }

    pub async fn like(&self, payload: &Value) -> Result<LikeResponse, ServiceError> {
        let req = LikeRequest::from_payload(payload)?;

        let likes = self
            .store
            .add_member(&req.mod_id, &req.user_id)
            .await
            .map_err(|source| ServiceError::StoreUnavailable {
                op: Operation::Like,
                source,
            })?;

        let likes_count = count_members(likes.as_ref());
        tracing::info!(mod_id = %req.mod_id, likes_count, "liked mod");
        Ok(LikeResponse::new(req.mod_id, likes_count))
    }

    pub async fn unlike(&self, payload: &Value) -> Result<LikeResponse, ServiceError> {
        let req = LikeRequest::from_payload(payload)?;

        let likes = self
            .store
            .remove_member(&req.mod_id, &req.user_id)
            .await
            .map_err(|source| ServiceError::StoreUnavailable {
                op: Operation::Unlike,
                source,
            })?;

        let likes_count = count_members(likes.as_ref());
        tracing::info!(mod_id = %req.mod_id, likes_count, "unliked mod");
        Ok(LikeResponse::new(req.mod_id, likes_count))
    }

    pub async fn list(&self) -> Result<ListResponse, ServiceError> {
        let ratings = self
            .store
            .list_all()
            .await
            .map_err(|source| ServiceError::StoreUnavailable {
                op: Operation::List,
                source,
            })?;

        let mods: Vec<ModLikes> = ratings.into_iter().map(ModLikes::from).collect();
        tracing::info!(mods = mods.len(), "listed mods");
        Ok(ListResponse::new(mods))
    }
}
