use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{Post, PostDynamo, PostItem};
use crate::error::PostError;
use crate::metrics::record_transaction_failure;
use crate::models::card::CardManager;
use crate::models::feed::FeedManager;
use crate::models::user::UserManager;

#[derive(Clone)]
pub struct PostManager {
    dynamo: PostDynamo,
    user_manager: UserManager,
    card_manager: CardManager,
    feed_manager: FeedManager,
}

impl PostManager {
    pub fn new(
        dynamo: PostDynamo,
        user_manager: UserManager,
        card_manager: CardManager,
        feed_manager: FeedManager,
    ) -> Self {
        Self {
            dynamo,
            user_manager,
            card_manager,
            feed_manager,
        }
    }

    pub fn dynamo(&self) -> &PostDynamo {
        &self.dynamo
    }

    pub fn init_post(&self, item: PostItem) -> Post {
        Post::new(
            item,
            self.dynamo.clone(),
            self.user_manager.dynamo().clone(),
            self.card_manager.clone(),
        )
    }

    pub async fn get_post(&self, post_id: &str, strongly_consistent: bool) -> Result<Option<Post>, PostError> {
        Ok(self
            .dynamo
            .get_post(post_id, strongly_consistent)
            .await?
            .map(|item| self.init_post(item)))
    }

    pub async fn add_post(
        &self,
        post_id: &str,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
        comments_disabled: bool,
    ) -> Result<Post, PostError> {
        let text_tags = self.user_manager.get_text_tags(text).await?;
        let item = PostDynamo::build_item(post_id, user_id, text, text_tags, now, comments_disabled);

        let transact_items = vec![
            self.dynamo.transact_add_post(&item)?,
            self.user_manager.dynamo().transact_post_added(user_id),
        ];
        let transact_errors = vec![
            PostError::PostIdTaken(post_id.to_string()),
            PostError::UserPostCountIncrement(user_id.to_string()),
        ];
        if let Err(err) = self
            .dynamo
            .client()
            .transact_write_items(transact_items, transact_errors)
            .await
        {
            record_transaction_failure("add_post");
            return Err(err);
        }

        self.feed_manager
            .add_post_to_followers_feeds(user_id, &item)
            .await?;
        info!(post_id = %post_id, user_id = %user_id, "Added post");

        let mut post = self.init_post(item);
        post.refresh_item(true).await?;
        Ok(post)
    }

    /// Only the post's owner may toggle comments.
    pub async fn set_comments_disabled(
        &self,
        post_id: &str,
        user_id: &str,
        disabled: bool,
    ) -> Result<Post, PostError> {
        let post = self
            .get_post(post_id, false)
            .await?
            .ok_or_else(|| PostError::PostDoesNotExist(post_id.to_string()))?;
        if post.user_id() != user_id {
            return Err(PostError::NotPostOwner {
                user_id: user_id.to_string(),
                post_id: post_id.to_string(),
            });
        }
        let item = self
            .dynamo
            .set_comments_disabled(post_id, disabled)
            .await
            .map_err(|err| {
                if err.is_conditional_check_failed() {
                    PostError::PostDoesNotExist(post_id.to_string())
                } else {
                    err.into()
                }
            })?;
        Ok(self.init_post(item))
    }

    /// Remove the post from every feed it was fanned out to, settle its
    /// comment activity, then delete the row and the owner's count together.
    pub async fn delete_post(&self, post_id: &str) -> Result<(), PostError> {
        let mut post = self
            .get_post(post_id, true)
            .await?
            .ok_or_else(|| PostError::PostDoesNotExist(post_id.to_string()))?;
        let user_id = post.user_id().to_string();

        let removed = self
            .feed_manager
            .delete_post_from_followers_feeds(&user_id, post_id)
            .await?;
        post.clear_new_comment_activity().await?;

        let mut transact_items = vec![self.dynamo.transact_delete_post(post_id)];
        let mut transact_errors = vec![PostError::PostDeleteFailed(post_id.to_string())];
        if self.user_manager.get_user(&user_id).await?.is_some() {
            transact_items.push(self.user_manager.dynamo().transact_post_deleted(&user_id));
            transact_errors.push(PostError::UserPostCountDecrement(user_id.clone()));
        } else {
            warn!(post_id = %post_id, user_id = %user_id, "Deleting post of missing user");
        }
        if let Err(err) = self
            .dynamo
            .client()
            .transact_write_items(transact_items, transact_errors)
            .await
        {
            record_transaction_failure("delete_post");
            return Err(err);
        }
        info!(post_id = %post_id, user_id = %user_id, feed_rows_removed = removed, "Deleted post");
        Ok(())
    }
}
