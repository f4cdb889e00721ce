use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::{Comment, CommentDynamo, CommentItem};
use crate::error::CommentError;
use crate::metrics::record_transaction_failure;
use crate::models::block::BlockManager;
use crate::models::flag::FlagDynamo;
use crate::models::follow::FollowManager;
use crate::models::from_item;
use crate::models::post::PostManager;
use crate::models::user::UserManager;
use crate::models::view::ViewDynamo;

/// Flags at which a comment is deleted without waiting for its owner.
pub const FLAG_AUTO_DELETE_COUNT: i64 = 5;

#[derive(Clone)]
pub struct CommentManager {
    dynamo: CommentDynamo,
    view_dynamo: ViewDynamo,
    flag_dynamo: FlagDynamo,
    post_manager: PostManager,
    user_manager: UserManager,
    follow_manager: FollowManager,
    block_manager: BlockManager,
}

impl CommentManager {
    pub fn new(
        dynamo: CommentDynamo,
        view_dynamo: ViewDynamo,
        flag_dynamo: FlagDynamo,
        post_manager: PostManager,
        user_manager: UserManager,
        follow_manager: FollowManager,
        block_manager: BlockManager,
    ) -> Self {
        Self {
            dynamo,
            view_dynamo,
            flag_dynamo,
            post_manager,
            user_manager,
            follow_manager,
            block_manager,
        }
    }

    pub fn dynamo(&self) -> &CommentDynamo {
        &self.dynamo
    }

    pub fn init_comment(&self, item: CommentItem) -> Comment {
        Comment::new(
            item,
            self.dynamo.clone(),
            self.view_dynamo.clone(),
            self.flag_dynamo.clone(),
            self.post_manager.clone(),
            self.user_manager.dynamo().clone(),
        )
    }

    pub async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>, CommentError> {
        Ok(self
            .dynamo
            .get_comment(comment_id, false)
            .await?
            .map(|item| self.init_comment(item)))
    }

    /// Comment on a post.
    ///
    /// Anyone but the post owner is refused when either user blocks the other,
    /// and when the owner is private and not followed by the commenter.
    pub async fn add_comment(
        &self,
        comment_id: &str,
        post_id: &str,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, CommentError> {
        let mut post = self
            .post_manager
            .get_post(post_id, false)
            .await?
            .ok_or_else(|| CommentError::PostDoesNotExist(post_id.to_string()))?;
        if post.comments_disabled() {
            return Err(CommentError::CommentsDisabled(post_id.to_string()));
        }

        let post_owner_id = post.user_id().to_string();
        let by_post_owner = user_id == post_owner_id;
        if !by_post_owner {
            self.check_commenter(&post_owner_id, user_id).await?;
        }

        let text_tags = self.user_manager.get_text_tags(text).await?;
        let transact_items = vec![
            self.dynamo
                .transact_add_comment(comment_id, post_id, user_id, text, text_tags, now)?,
            self.post_manager
                .dynamo()
                .transact_increment_comment_count(post_id, !by_post_owner),
            self.user_manager.dynamo().transact_comment_added(user_id),
        ];
        let transact_errors = vec![
            CommentError::CommentIdTaken(comment_id.to_string()),
            CommentError::PostCommentCountIncrement(post_id.to_string()),
            CommentError::UserCommentCountIncrement(user_id.to_string()),
        ];
        if let Err(err) = self
            .dynamo
            .client()
            .transact_write_items(transact_items, transact_errors)
            .await
        {
            record_transaction_failure("add_comment");
            return Err(err);
        }

        if !by_post_owner {
            if let Err(err) = post.register_new_comment_activity(now).await {
                warn!(
                    post_id = %post_id,
                    comment_id = %comment_id,
                    error = %err,
                    "Failed to register new comment activity"
                );
            }
        }
        info!(comment_id = %comment_id, post_id = %post_id, user_id = %user_id, "Added comment");

        let item = self
            .dynamo
            .get_comment(comment_id, true)
            .await?
            .ok_or_else(|| CommentError::CommentDoesNotExist(comment_id.to_string()))?;
        Ok(self.init_comment(item))
    }

    async fn check_commenter(&self, post_owner_id: &str, user_id: &str) -> Result<(), CommentError> {
        if self.block_manager.is_blocked(post_owner_id, user_id).await? {
            return Err(CommentError::BlockedByPostOwner {
                post_owner_id: post_owner_id.to_string(),
                user_id: user_id.to_string(),
            });
        }
        if self.block_manager.is_blocked(user_id, post_owner_id).await? {
            return Err(CommentError::BlockedPostOwner {
                user_id: user_id.to_string(),
                post_owner_id: post_owner_id.to_string(),
            });
        }

        let poster_is_private = self
            .user_manager
            .get_user(post_owner_id)
            .await?
            .is_some_and(|poster| poster.is_private());
        if poster_is_private {
            let following = self
                .follow_manager
                .get_follow(user_id, post_owner_id)
                .await?
                .is_some_and(|follow| follow.is_following());
            if !following {
                return Err(CommentError::NotFollower {
                    post_owner_id: post_owner_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Record views of the given comments; repeated ids count as repeated
    /// views. A post owner viewing comments on their own post clears its new
    /// comment activity.
    pub async fn record_views<S: AsRef<str>>(
        &self,
        comment_ids: &[S],
        user_id: &str,
        viewed_at: DateTime<Utc>,
    ) -> Result<(), CommentError> {
        let mut grouped: BTreeMap<&str, i64> = BTreeMap::new();
        for comment_id in comment_ids {
            *grouped.entry(comment_id.as_ref()).or_default() += 1;
        }
        if grouped.is_empty() {
            return Ok(());
        }

        let mut post_ids = BTreeSet::new();
        for (comment_id, view_count) in grouped {
            let Some(mut comment) = self.get_comment(comment_id).await? else {
                warn!(
                    comment_id = %comment_id,
                    user_id = %user_id,
                    "Cannot record view(s) by user `{}` on DNE comment `{}`",
                    user_id,
                    comment_id
                );
                continue;
            };
            if comment.record_view_count(user_id, view_count, viewed_at).await? {
                post_ids.insert(comment.post_id().to_string());
            }
        }

        for post_id in post_ids {
            let Some(mut post) = self.post_manager.get_post(&post_id, false).await? else {
                continue;
            };
            if post.user_id() == user_id {
                post.clear_new_comment_activity().await?;
            }
        }
        Ok(())
    }

    /// Only the comment's author or the post's owner may delete it.
    pub async fn delete_comment(
        &self,
        comment_id: &str,
        deleter_user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CommentError> {
        let comment = self
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CommentError::CommentDoesNotExist(comment_id.to_string()))?;
        if deleter_user_id != comment.user_id() {
            let post_owner_id = self
                .post_manager
                .get_post(comment.post_id(), false)
                .await?
                .map(|post| post.user_id().to_string());
            if post_owner_id.as_deref() != Some(deleter_user_id) {
                return Err(CommentError::NotAuthorizedToDelete {
                    user_id: deleter_user_id.to_string(),
                    comment_id: comment_id.to_string(),
                });
            }
        }
        comment.delete(Some(deleter_user_id), false, now).await
    }

    pub async fn delete_all_by_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<usize, CommentError> {
        let mut paginator = self.dynamo.generate_by_user(user_id);
        let mut deleted = 0;
        while let Some(page) = paginator.next_page().await? {
            for item in page {
                self.init_comment(from_item(item)?).delete(None, false, now).await?;
                deleted += 1;
            }
        }
        info!(user_id = %user_id, deleted, "Deleted all comments by user");
        Ok(deleted)
    }

    pub async fn delete_all_on_post(&self, post_id: &str, now: DateTime<Utc>) -> Result<usize, CommentError> {
        let mut paginator = self.dynamo.generate_by_post(post_id);
        let mut deleted = 0;
        while let Some(page) = paginator.next_page().await? {
            for item in page {
                self.init_comment(from_item(item)?).delete(None, false, now).await?;
                deleted += 1;
            }
        }
        info!(post_id = %post_id, deleted, "Deleted all comments on post");
        Ok(deleted)
    }

    /// Flag a comment. Returns `None` when the flag caused the comment to be
    /// force-deleted: the post owner flagged it, or it reached
    /// [`FLAG_AUTO_DELETE_COUNT`] flags.
    pub async fn flag_comment(
        &self,
        comment_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Comment>, CommentError> {
        let mut comment = self
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CommentError::CommentDoesNotExist(comment_id.to_string()))?;
        if comment.user_id() == user_id {
            return Err(CommentError::CannotFlagOwnComment {
                user_id: user_id.to_string(),
                comment_id: comment_id.to_string(),
            });
        }
        let author_id = comment.user_id().to_string();
        if self.block_manager.is_blocked(&author_id, user_id).await?
            || self.block_manager.is_blocked(user_id, &author_id).await?
        {
            return Err(CommentError::FlagBlocked {
                user_id: user_id.to_string(),
                comment_id: comment_id.to_string(),
            });
        }

        match self
            .flag_dynamo
            .add_flag(&comment.item.partition_key, user_id, now)
            .await
        {
            Ok(_) => {}
            Err(err) if err.is_conditional_check_failed() => {
                return Err(CommentError::AlreadyFlagged {
                    user_id: user_id.to_string(),
                    comment_id: comment_id.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        }
        if let Some(item) = self.dynamo.increment_flag_count(comment_id).await? {
            comment.item = item;
        }

        let flagged_by_post_owner = self
            .post_manager
            .get_post(comment.post_id(), false)
            .await?
            .is_some_and(|post| post.user_id() == user_id);
        if flagged_by_post_owner || comment.flag_count() >= FLAG_AUTO_DELETE_COUNT {
            warn!(
                comment_id = %comment_id,
                flag_count = comment.flag_count(),
                flagged_by_post_owner,
                "Force deleting flagged comment"
            );
            comment.delete(None, true, now).await?;
            return Ok(None);
        }
        Ok(Some(comment))
    }

    pub async fn unflag_comment(&self, comment_id: &str, user_id: &str) -> Result<Comment, CommentError> {
        let mut comment = self
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CommentError::CommentDoesNotExist(comment_id.to_string()))?;
        match self
            .flag_dynamo
            .delete_flag(&comment.item.partition_key, user_id)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_conditional_check_failed() => {
                return Err(CommentError::NotFlagged {
                    user_id: user_id.to_string(),
                    comment_id: comment_id.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        }
        if let Some(item) = self.dynamo.decrement_flag_count(comment_id).await? {
            comment.item = item;
        }
        Ok(comment)
    }
}
