use chrono::{DateTime, Utc};
use doc_store::{
    Condition, Index, PrimaryKey, Query, QueryPaginator, StoreClient, StoreError, StoreResult,
    TransactItem, Update, PARTITION_KEY,
};

use super::CommentItem;
use crate::models::user::TextTag;
use crate::models::{from_item, to_item};
use crate::timestamp;

#[derive(Clone)]
pub struct CommentDynamo {
    client: StoreClient,
}

impl CommentDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    pub fn pk(comment_id: &str) -> PrimaryKey {
        PrimaryKey::new(format!("comment/{comment_id}"), "-")
    }

    pub fn transact_add_comment(
        &self,
        comment_id: &str,
        post_id: &str,
        user_id: &str,
        text: &str,
        text_tags: Vec<TextTag>,
        commented_at: DateTime<Utc>,
    ) -> StoreResult<TransactItem> {
        let key = Self::pk(comment_id);
        let commented_at_str = timestamp::format(&commented_at);
        let item = CommentItem {
            partition_key: key.partition_key,
            sort_key: key.sort_key,
            schema_version: 1,
            gsi_a1_partition_key: format!("comment/{post_id}"),
            gsi_a1_sort_key: commented_at_str.clone(),
            gsi_a2_partition_key: format!("comment/{user_id}"),
            gsi_a2_sort_key: commented_at_str,
            comment_id: comment_id.to_string(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
            text_tags,
            commented_at,
            viewed_by_count: None,
            flag_count: None,
        };
        Ok(TransactItem::add(to_item(&item)?))
    }

    pub fn transact_delete_comment(&self, comment_id: &str) -> TransactItem {
        TransactItem::delete_existing(Self::pk(comment_id))
    }

    pub async fn get_comment(&self, comment_id: &str, strongly_consistent: bool) -> StoreResult<Option<CommentItem>> {
        self.client
            .get_item(&Self::pk(comment_id), strongly_consistent)
            .await?
            .map(from_item)
            .transpose()
    }

    /// `None` if the comment is gone.
    pub async fn increment_viewed_by_count(&self, comment_id: &str) -> StoreResult<Option<CommentItem>> {
        self.update_counter(comment_id, "viewedByCount", 1, Condition::exists(PARTITION_KEY))
            .await
    }

    pub async fn increment_flag_count(&self, comment_id: &str) -> StoreResult<Option<CommentItem>> {
        self.update_counter(comment_id, "flagCount", 1, Condition::exists(PARTITION_KEY))
            .await
    }

    /// `None` if the comment is gone or has no flags left.
    pub async fn decrement_flag_count(&self, comment_id: &str) -> StoreResult<Option<CommentItem>> {
        let condition = Condition::exists(PARTITION_KEY).and(Condition::greater_than("flagCount", 0));
        self.update_counter(comment_id, "flagCount", -1, condition).await
    }

    async fn update_counter(
        &self,
        comment_id: &str,
        attribute: &str,
        delta: i64,
        condition: Condition,
    ) -> StoreResult<Option<CommentItem>> {
        match self
            .client
            .update_item(&Self::pk(comment_id), &Update::new().add(attribute, delta), Some(&condition))
            .await
        {
            Ok(item) => from_item(item).map(Some),
            Err(StoreError::ConditionalCheckFailed) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// The user's comments, oldest first.
    pub fn generate_by_user(&self, user_id: &str) -> QueryPaginator {
        self.client
            .paginate(Query::new(Index::GsiA2, format!("comment/{user_id}")))
    }

    /// The post's comments, oldest first.
    pub fn generate_by_post(&self, post_id: &str) -> QueryPaginator {
        self.client
            .paginate(Query::new(Index::GsiA1, format!("comment/{post_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_add_and_enumerate_comments() {
        let dynamo = CommentDynamo::new(StoreClient::in_memory());
        let at = Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
        for (comment_id, post_id, user_id) in [("c1", "p1", "u1"), ("c2", "p1", "u2"), ("c3", "p2", "u1")] {
            let item = dynamo
                .transact_add_comment(comment_id, post_id, user_id, "lore", Vec::new(), at)
                .unwrap();
            dynamo
                .client()
                .transact_write_items(vec![item], vec![StoreError::ConditionalCheckFailed])
                .await
                .unwrap();
        }

        let comment = dynamo.get_comment("c2", true).await.unwrap().unwrap();
        assert_eq!(comment.gsi_a1_partition_key, "comment/p1");
        assert_eq!(comment.gsi_a2_partition_key, "comment/u2");
        assert_eq!(comment.commented_at, at);

        let on_post = dynamo.generate_by_post("p1").collect_all().await.unwrap();
        assert_eq!(on_post.len(), 2);
        let by_user = dynamo.generate_by_user("u1").collect_all().await.unwrap();
        assert_eq!(by_user.len(), 2);
    }

    #[tokio::test]
    async fn test_flag_count_never_goes_negative() {
        let dynamo = CommentDynamo::new(StoreClient::in_memory());
        let at = Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
        let item = dynamo
            .transact_add_comment("c1", "p1", "u1", "lore", Vec::new(), at)
            .unwrap();
        dynamo
            .client()
            .transact_write_items(vec![item], vec![StoreError::ConditionalCheckFailed])
            .await
            .unwrap();

        assert!(dynamo.decrement_flag_count("c1").await.unwrap().is_none());
        let flagged = dynamo.increment_flag_count("c1").await.unwrap().unwrap();
        assert_eq!(flagged.flag_count, Some(1));
        let unflagged = dynamo.decrement_flag_count("c1").await.unwrap().unwrap();
        assert_eq!(unflagged.flag_count, Some(0));
        assert!(dynamo.increment_viewed_by_count("c9").await.unwrap().is_none());
    }
}
