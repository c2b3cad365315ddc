use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A stored mod record: the mod id and the set of users that currently like it.
///
/// `likes` is `None` when the backend holds the record but no member attribute,
/// which is how a set-typed attribute with zero members may come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRating {
    pub id: String,
    pub likes: Option<BTreeSet<String>>,
}

impl ModRating {
    pub fn likes_count(&self) -> usize {
        count_members(self.likes.as_ref())
    }
}

/// Cardinality of a member set, with "attribute absent" counted as zero.
pub fn count_members(likes: Option<&BTreeSet<String>>) -> usize {
    likes.map(|set| set.len()).unwrap_or(0)
}

/// Validated parameters of a like/unlike call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeRequest {
    pub user_id: String,
    pub mod_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModLikes {
    pub mod_id: String,
    pub likes_count: usize,
}

impl From<ModRating> for ModLikes {
    fn from(rating: ModRating) -> Self {
        ModLikes {
            likes_count: rating.likes_count(),
            mod_id: rating.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_attribute_counts_as_zero() {
        let rating = ModRating {
            id: "m".into(),
            likes: None,
        };
        assert_eq!(rating.likes_count(), 0);
        assert_eq!(
            ModLikes::from(rating),
            ModLikes {
                mod_id: "m".into(),
                likes_count: 0
            }
        );
    }

    #[test]
    fn mod_likes_serializes_camel_case() {
        let likes = ModLikes {
            mod_id: "modId".into(),
            likes_count: 3,
        };
        assert_eq!(
            serde_json::to_string(&likes).unwrap(),
            r#"{"modId":"modId","likesCount":3}"#
        );
    }
}
