//! Comments on posts: the row, the in-memory entity and the manager that
//! authorizes and writes them.

mod dynamo;
mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub use dynamo::CommentDynamo;
pub use manager::CommentManager;

use crate::error::CommentError;
use crate::metrics::record_transaction_failure;
use crate::models::flag::FlagDynamo;
use crate::models::post::PostManager;
use crate::models::user::{TextTag, UserDynamo};
use crate::models::view::ViewDynamo;
use crate::timestamp;

/// Comment row: pk `comment/{commentId}`, sk `-`. GSI-A1 lists a post's
/// comments and GSI-A2 a user's, both sorted by `commentedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentItem {
    pub partition_key: String,
    pub sort_key: String,
    #[serde(default)]
    pub schema_version: u32,
    pub gsi_a1_partition_key: String,
    pub gsi_a1_sort_key: String,
    pub gsi_a2_partition_key: String,
    pub gsi_a2_sort_key: String,
    pub comment_id: String,
    pub post_id: String,
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub text_tags: Vec<TextTag>,
    #[serde(with = "timestamp")]
    pub commented_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_by_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_count: Option<i64>,
}

#[derive(Clone)]
pub struct Comment {
    pub item: CommentItem,
    dynamo: CommentDynamo,
    view_dynamo: ViewDynamo,
    flag_dynamo: FlagDynamo,
    post_manager: PostManager,
    user_dynamo: UserDynamo,
}

impl fmt::Debug for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comment")
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

impl Comment {
    pub(crate) fn new(
        item: CommentItem,
        dynamo: CommentDynamo,
        view_dynamo: ViewDynamo,
        flag_dynamo: FlagDynamo,
        post_manager: PostManager,
        user_dynamo: UserDynamo,
    ) -> Self {
        Self {
            item,
            dynamo,
            view_dynamo,
            flag_dynamo,
            post_manager,
            user_dynamo,
        }
    }

    pub fn id(&self) -> &str {
        &self.item.comment_id
    }

    pub fn post_id(&self) -> &str {
        &self.item.post_id
    }

    pub fn user_id(&self) -> &str {
        &self.item.user_id
    }

    pub fn flag_count(&self) -> i64 {
        self.item.flag_count.unwrap_or(0)
    }

    fn item_partition_key(&self) -> &str {
        &self.item.partition_key
    }

    /// Record `view_count` views by `user_id`. Views by the author are not
    /// recorded; returns whether anything was.
    pub async fn record_view_count(
        &mut self,
        user_id: &str,
        view_count: i64,
        viewed_at: DateTime<Utc>,
    ) -> Result<bool, CommentError> {
        if user_id == self.user_id() {
            return Ok(false);
        }
        let partition_key = self.item_partition_key().to_string();
        if self.view_dynamo.get_view(&partition_key, user_id).await?.is_some() {
            self.view_dynamo
                .increment_view_count(&partition_key, user_id, view_count, viewed_at)
                .await?;
            return Ok(true);
        }
        match self
            .view_dynamo
            .add_view(&partition_key, user_id, view_count, viewed_at)
            .await
        {
            Ok(_) => {
                if let Some(item) = self.dynamo.increment_viewed_by_count(self.id()).await? {
                    self.item = item;
                }
            }
            // a concurrent first view won the race
            Err(err) if err.is_conditional_check_failed() => {
                self.view_dynamo
                    .increment_view_count(&partition_key, user_id, view_count, viewed_at)
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }
        Ok(true)
    }

    /// Delete the comment along with its views and flags.
    ///
    /// `deleter` is `None` for system deletions (cascades and forced deletes).
    /// A deletion by anyone other than the post owner counts as new comment
    /// activity on the post.
    pub async fn delete(
        &self,
        deleter_user_id: Option<&str>,
        forced: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CommentError> {
        let post = self.post_manager.get_post(self.post_id(), false).await?;

        let mut transact_items = vec![self.dynamo.transact_delete_comment(self.id())];
        let mut transact_errors = vec![CommentError::CommentDeleteFailed(self.id().to_string())];
        if let Some(post) = &post {
            if post.item.comment_count.unwrap_or(0) > 0 {
                transact_items.push(
                    self.post_manager
                        .dynamo()
                        .transact_decrement_comment_count(self.post_id()),
                );
                transact_errors
                    .push(CommentError::PostCommentCountDecrement(self.post_id().to_string()));
            } else {
                warn!(
                    post_id = %self.post_id(),
                    comment_id = %self.id(),
                    "Post `{}` commentCount already at zero, not decrementing",
                    self.post_id()
                );
            }
        }
        if let Some(user) = self.user_dynamo.get_user(self.user_id(), false).await? {
            let decrement = user.counters.comment_count.unwrap_or(0) > 0;
            if !decrement {
                warn!(
                    user_id = %self.user_id(),
                    comment_id = %self.id(),
                    "User `{}` commentCount already at zero, not decrementing",
                    self.user_id()
                );
            }
            transact_items.push(self.user_dynamo.transact_comment_deleted(
                self.user_id(),
                forced,
                decrement,
            ));
            transact_errors.push(CommentError::UserCommentCountDecrement(self.user_id().to_string()));
        }
        if let Err(err) = self
            .dynamo
            .client()
            .transact_write_items(transact_items, transact_errors)
            .await
        {
            record_transaction_failure("delete_comment");
            return Err(err);
        }

        let partition_key = self.item_partition_key();
        let views = self.view_dynamo.delete_views(partition_key).await?;
        let flags = self.flag_dynamo.delete_all_on_item(partition_key).await?;
        debug!(comment_id = %self.id(), views, flags, "Removed comment views and flags");

        if let (Some(mut post), Some(deleter)) = (post, deleter_user_id) {
            if deleter != post.user_id() {
                post.register_new_comment_activity(now).await?;
            }
        }
        info!(
            comment_id = %self.id(),
            post_id = %self.post_id(),
            deleter = deleter_user_id.unwrap_or("-"),
            forced,
            "Deleted comment"
        );
        Ok(())
    }
}
