use doc_store::{Index, Item, PrimaryKey, Query, QueryPaginator, StoreClient, StoreResult};
use serde_json::json;

use crate::models::post::PostItem;
use crate::timestamp;

/// Row key layout. Rows written before the migration are keyed by feed
/// owner; current rows are keyed by post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheme {
    /// pk `post/{postId}`, sk `feed/{feedUserId}`
    Current,
    /// pk `user/{feedUserId}`, sk `feed/{postId}`
    Legacy,
}

#[derive(Clone)]
pub struct FeedDynamo {
    client: StoreClient,
}

impl FeedDynamo {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    pub fn build_pk(feed_user_id: &str, post_id: &str, scheme: KeyScheme) -> PrimaryKey {
        match scheme {
            KeyScheme::Current => PrimaryKey::new(format!("post/{post_id}"), format!("feed/{feed_user_id}")),
            KeyScheme::Legacy => PrimaryKey::new(format!("user/{feed_user_id}"), format!("feed/{post_id}")),
        }
    }

    /// Split a feed key into `(feed_user_id, post_id)`, whichever scheme it uses.
    pub fn parse_pk(pk: &PrimaryKey) -> Option<(String, String)> {
        let (pk_prefix, pk_id) = pk.partition_key.split_once('/')?;
        let (sk_prefix, sk_id) = pk.sort_key.split_once('/')?;
        if sk_prefix != "feed" {
            return None;
        }
        match pk_prefix {
            "user" => Some((pk_id.to_string(), sk_id.to_string())),
            "post" => Some((sk_id.to_string(), pk_id.to_string())),
            _ => None,
        }
    }

    pub fn build_item(feed_user_id: &str, post: &PostItem, scheme: KeyScheme) -> Item {
        let key = Self::build_pk(feed_user_id, &post.post_id, scheme);
        let posted_at = timestamp::format(&post.posted_at);
        let posted_by_user_id = &post.posted_by_user_id;
        let mut item = key.to_item();
        let attributes = json!({
            "schemaVersion": 2,
            "gsiA1PartitionKey": format!("feed/{feed_user_id}"),
            "gsiA1SortKey": posted_at,
            "gsiA2PartitionKey": format!("feed/{feed_user_id}"),
            "gsiA2SortKey": posted_by_user_id,
            "userId": feed_user_id,
            "postId": post.post_id,
            "postedAt": posted_at,
            "postedByUserId": posted_by_user_id,
            "gsiK2PartitionKey": format!("feed/{feed_user_id}/{posted_by_user_id}"),
            "gsiK2SortKey": posted_at,
        });
        if let serde_json::Value::Object(attributes) = attributes {
            item.extend(attributes);
        }
        if scheme == KeyScheme::Legacy {
            item.remove("gsiA2PartitionKey");
            item.remove("gsiA2SortKey");
        }
        item
    }

    /// Put many posts into one user's feed.
    pub async fn add_posts_to_feed<'a, I>(
        &self,
        feed_user_id: &str,
        posts: I,
        scheme: KeyScheme,
    ) -> StoreResult<usize>
    where
        I: IntoIterator<Item = &'a PostItem>,
    {
        let items = posts
            .into_iter()
            .map(|post| Self::build_item(feed_user_id, post, scheme));
        self.client.batch_put_items(items).await
    }

    /// Put one post into many users' feeds.
    pub async fn add_post_to_feeds<I, S>(
        &self,
        feed_user_ids: I,
        post: &PostItem,
        scheme: KeyScheme,
    ) -> StoreResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items = feed_user_ids
            .into_iter()
            .map(|feed_user_id| Self::build_item(feed_user_id.as_ref(), post, scheme));
        self.client.batch_put_items(items).await
    }

    /// Delete every post by `posted_by_user_id` from the feed of `feed_user_id`.
    pub async fn delete_by_post_owner(&self, feed_user_id: &str, posted_by_user_id: &str) -> StoreResult<usize> {
        let mut paginator = self.generate_feed_pks_by_posted_by_user(feed_user_id, posted_by_user_id);
        let mut deleted = 0;
        while let Some(page) = paginator.next_page().await? {
            let keys = page
                .iter()
                .map(PrimaryKey::from_item)
                .collect::<StoreResult<Vec<_>>>()?;
            deleted += self.client.batch_delete_items(keys).await?;
        }
        Ok(deleted)
    }

    /// Delete `post_id` from each listed feed, under both key schemes. Returns
    /// the number of delete requests issued.
    pub async fn delete_by_post<I, S>(&self, post_id: &str, feed_user_ids: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let feed_user_ids: Vec<S> = feed_user_ids.into_iter().collect();
        let mut deleted = 0;
        for scheme in [KeyScheme::Current, KeyScheme::Legacy] {
            let keys = feed_user_ids
                .iter()
                .map(|feed_user_id| Self::build_pk(feed_user_id.as_ref(), post_id, scheme));
            deleted += self.client.batch_delete_items(keys).await?;
        }
        Ok(deleted)
    }

    /// The user's feed, newest post first.
    pub fn generate_feed(&self, feed_user_id: &str) -> QueryPaginator {
        self.client
            .paginate(Query::new(Index::GsiA1, format!("feed/{feed_user_id}")).descending())
    }

    /// Keys of the rows in `feed_user_id`'s feed authored by `posted_by_user_id`.
    pub fn generate_feed_pks_by_posted_by_user(
        &self,
        feed_user_id: &str,
        posted_by_user_id: &str,
    ) -> QueryPaginator {
        let query = Query::new(
            Index::GsiK2,
            format!("feed/{feed_user_id}/{posted_by_user_id}"),
        )
        .keys_only();
        self.client.paginate(query)
    }
}
