use crate::model::ModLikes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub success: bool,
    pub mod_id: String,
    pub likes_count: usize,
}

impl LikeResponse {
    pub fn new(mod_id: String, likes_count: usize) -> Self {
        LikeResponse {
            success: true,
            mod_id,
            likes_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListResponse {
    pub success: bool,
    pub mods: Vec<ModLikes>,
}

impl ListResponse {
    pub fn new(mods: Vec<ModLikes>) -> Self {
        ListResponse { success: true, mods }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCause {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrorCause>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn new_from_msg(msg: &str) -> Self {
        HealthResponse {
            status: msg.to_owned(),
        }
    }
}
