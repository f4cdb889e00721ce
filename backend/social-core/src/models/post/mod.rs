//! Posts and their comment-activity bookkeeping.

mod dynamo;
mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use dynamo::PostDynamo;
pub use manager::PostManager;

use crate::error::PostError;
use crate::models::card::{CardManager, CardSpec};
use crate::models::user::{TextTag, UserDynamo};
use crate::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Completed,
    Archived,
    Deleting,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Completed => "COMPLETED",
            PostStatus::Archived => "ARCHIVED",
            PostStatus::Deleting => "DELETING",
        }
    }
}

/// Post row: pk `post/{postId}`, sk `-`.
///
/// GSI-A2 lists a user's posts by `{status}/{postedAt}`; GSI-A3 lists the
/// user's posts with pending comment activity and is only present while
/// `hasNewCommentActivity` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostItem {
    pub partition_key: String,
    pub sort_key: String,
    #[serde(default)]
    pub schema_version: u32,
    pub gsi_a2_partition_key: String,
    pub gsi_a2_sort_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsi_a3_partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gsi_a3_sort_key: Option<String>,
    pub post_id: String,
    pub posted_by_user_id: String,
    pub post_status: PostStatus,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub text_tags: Vec<TextTag>,
    #[serde(with = "timestamp")]
    pub posted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_unviewed_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_new_comment_activity: Option<bool>,
}

/// One post plus the handles its own mutations need.
#[derive(Clone)]
pub struct Post {
    pub item: PostItem,
    dynamo: PostDynamo,
    user_dynamo: UserDynamo,
    card_manager: CardManager,
}

impl std::fmt::Debug for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Post")
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

impl Post {
    pub(crate) fn new(
        item: PostItem,
        dynamo: PostDynamo,
        user_dynamo: UserDynamo,
        card_manager: CardManager,
    ) -> Self {
        Self {
            item,
            dynamo,
            user_dynamo,
            card_manager,
        }
    }

    pub fn id(&self) -> &str {
        &self.item.post_id
    }

    pub fn user_id(&self) -> &str {
        &self.item.posted_by_user_id
    }

    pub fn comments_disabled(&self) -> bool {
        self.item.comments_disabled.unwrap_or(false)
    }

    pub fn has_new_comment_activity(&self) -> bool {
        self.item.has_new_comment_activity.unwrap_or(false)
    }

    pub async fn refresh_item(&mut self, strongly_consistent: bool) -> Result<&mut Self, PostError> {
        self.item = self
            .dynamo
            .get_post(self.id(), strongly_consistent)
            .await?
            .ok_or_else(|| PostError::PostDoesNotExist(self.item.post_id.clone()))?;
        Ok(self)
    }

    /// Mark the post as having comments its owner has not seen. The first
    /// transition also bumps the owner's counter and adds the activity card.
    pub async fn register_new_comment_activity(&mut self, now: DateTime<Utc>) -> Result<(), PostError> {
        if let Some(item) = self.dynamo.set_new_comment_activity(&self.item, now).await? {
            self.item = item;
            self.user_dynamo
                .increment_count(&self.item.posted_by_user_id, "postHasNewCommentActivityCount")
                .await?;
            let spec = CardSpec::comment_activity(&self.item.posted_by_user_id, &self.item.post_id);
            self.card_manager.add_card_by_spec_if_dne(&spec, now).await?;
            return Ok(());
        }
        if let Some(item) = self.dynamo.touch_new_comment_activity(&self.item, now).await? {
            debug!(post_id = %self.item.post_id, "Comment activity already pending");
            self.item = item;
        }
        Ok(())
    }

    /// Inverse of [`Post::register_new_comment_activity`]; a no-op when no
    /// activity is pending.
    pub async fn clear_new_comment_activity(&mut self) -> Result<(), PostError> {
        let Some(item) = self.dynamo.clear_new_comment_activity(&self.item.post_id).await? else {
            return Ok(());
        };
        self.item = item;
        self.user_dynamo
            .decrement_count(&self.item.posted_by_user_id, "postHasNewCommentActivityCount")
            .await?;
        let spec = CardSpec::comment_activity(&self.item.posted_by_user_id, &self.item.post_id);
        self.card_manager.remove_card_by_spec_if_exists(&spec).await?;
        Ok(())
    }
}
