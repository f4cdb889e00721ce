use chrono::{DateTime, Utc};
use doc_store::{
    Condition, Index, PrimaryKey, Query, StoreClient, StoreError, StoreResult, TransactItem,
    Update, PARTITION_KEY,
};

use super::{PostItem, PostStatus};
use crate::models::user::TextTag;
use crate::models::{from_item, to_item};
use crate::timestamp;

#[derive(Clone)]
pub struct PostDynamo {
    client: StoreClient,
}

impl PostDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    pub fn pk(post_id: &str) -> PrimaryKey {
        PrimaryKey::new(format!("post/{post_id}"), "-")
    }

    pub fn build_item(
        post_id: &str,
        user_id: &str,
        text: &str,
        text_tags: Vec<TextTag>,
        posted_at: DateTime<Utc>,
        comments_disabled: bool,
    ) -> PostItem {
        let key = Self::pk(post_id);
        let status = PostStatus::Completed;
        PostItem {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 0,
            gsi_a2_partition_key: format!("post/{user_id}"),
            gsi_a2_sort_key: format!("{}/{}", status.as_str(), timestamp::format(&posted_at)),
            gsi_a3_partition_key: None,
            gsi_a3_sort_key: None,
            post_id: post_id.to_string(),
            posted_by_user_id: user_id.to_string(),
            post_status: status,
            text: text.to_string(),
            text_tags,
            posted_at,
            comments_disabled: comments_disabled.then_some(true),
            comment_count: None,
            comments_unviewed_count: None,
            has_new_comment_activity: None,
        }
    }

    pub fn transact_add_post(&self, post: &PostItem) -> StoreResult<TransactItem> {
        Ok(TransactItem::add(to_item(post)?))
    }

    pub fn transact_delete_post(&self, post_id: &str) -> TransactItem {
        TransactItem::delete_existing(Self::pk(post_id))
    }

    pub async fn get_post(&self, post_id: &str, strongly_consistent: bool) -> StoreResult<Option<PostItem>> {
        self.client
            .get_item(&Self::pk(post_id), strongly_consistent)
            .await?
            .map(from_item)
            .transpose()
    }

    /// The user's completed posts, oldest first.
    pub async fn completed_posts_by_user(&self, user_id: &str) -> StoreResult<Vec<PostItem>> {
        let query = Query::new(Index::GsiA2, format!("post/{user_id}"))
            .sort_begins_with(format!("{}/", PostStatus::Completed.as_str()));
        self.client
            .query_all(query)
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    /// Posts of the user with comment activity pending, oldest activity first.
    pub async fn posts_with_new_comment_activity(&self, user_id: &str) -> StoreResult<Vec<PostItem>> {
        let query = Query::new(Index::GsiA3, format!("post/{user_id}"));
        self.client
            .query_all(query)
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    pub async fn set_comments_disabled(&self, post_id: &str, disabled: bool) -> StoreResult<PostItem> {
        let item = self
            .client
            .update_item(
                &Self::pk(post_id),
                &Update::new().set("commentsDisabled", disabled),
                Some(&Condition::exists(PARTITION_KEY)),
            )
            .await?;
        from_item(item)
    }

    pub fn transact_increment_comment_count(
        &self,
        post_id: &str,
        include_comments_unviewed_count: bool,
    ) -> TransactItem {
        let mut update = Update::new().add("commentCount", 1);
        if include_comments_unviewed_count {
            update = update.add("commentsUnviewedCount", 1);
        }
        TransactItem::update_existing(Self::pk(post_id), update, None)
    }

    pub fn transact_decrement_comment_count(&self, post_id: &str) -> TransactItem {
        TransactItem::update_existing(
            Self::pk(post_id),
            Update::new().add("commentCount", -1),
            Some(Condition::greater_than("commentCount", 0)),
        )
    }

    /// Returns the updated post on the not-set -> set transition, `None` if
    /// activity was already pending or the post is gone.
    pub async fn set_new_comment_activity(
        &self,
        post: &PostItem,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PostItem>> {
        let update = Update::new()
            .set("hasNewCommentActivity", true)
            .set("gsiA3PartitionKey", format!("post/{}", post.posted_by_user_id))
            .set("gsiA3SortKey", timestamp::format(&now));
        let condition = Condition::exists(PARTITION_KEY)
            .and(Condition::not_exists("hasNewCommentActivity"));
        self.conditional_update(&post.post_id, update, condition).await
    }

    /// Move the activity stamp forward on a post whose activity is pending.
    pub async fn touch_new_comment_activity(
        &self,
        post: &PostItem,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<PostItem>> {
        let update = Update::new().set("gsiA3SortKey", timestamp::format(&now));
        let condition =
            Condition::exists(PARTITION_KEY).and(Condition::exists("hasNewCommentActivity"));
        self.conditional_update(&post.post_id, update, condition).await
    }

    /// Returns the updated post on the set -> not-set transition.
    pub async fn clear_new_comment_activity(&self, post_id: &str) -> StoreResult<Option<PostItem>> {
        let update = Update::new()
            .remove("hasNewCommentActivity")
            .remove("gsiA3PartitionKey")
            .remove("gsiA3SortKey")
            .set("commentsUnviewedCount", 0);
        let condition =
            Condition::exists(PARTITION_KEY).and(Condition::exists("hasNewCommentActivity"));
        self.conditional_update(post_id, update, condition).await
    }

    async fn conditional_update(
        &self,
        post_id: &str,
        update: Update,
        condition: Condition,
    ) -> StoreResult<Option<PostItem>> {
        match self
            .client
            .update_item(&Self::pk(post_id), &update, Some(&condition))
            .await
        {
            Ok(item) => from_item(item).map(Some),
            Err(StoreError::ConditionalCheckFailed) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
