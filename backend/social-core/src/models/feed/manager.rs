use doc_store::{QueryPaginator, StoreResult};
use std::iter;
use tracing::debug;

use super::{FeedDynamo, KeyScheme};
use crate::models::follow::FollowDynamo;
use crate::models::post::{PostDynamo, PostItem};

/// Keeps feeds in line with posts and follows. A user's own posts appear in
/// their own feed.
#[derive(Clone)]
pub struct FeedManager {
    dynamo: FeedDynamo,
    post_dynamo: PostDynamo,
    follow_dynamo: FollowDynamo,
}

impl FeedManager {
    pub fn new(dynamo: FeedDynamo, post_dynamo: PostDynamo, follow_dynamo: FollowDynamo) -> Self {
        Self {
            dynamo,
            post_dynamo,
            follow_dynamo,
        }
    }

    pub fn dynamo(&self) -> &FeedDynamo {
        &self.dynamo
    }

    /// Back-fill `feed_user_id`'s feed with every completed post of `posted_by_user_id`.
    pub async fn add_users_posts_to_feed(
        &self,
        feed_user_id: &str,
        posted_by_user_id: &str,
    ) -> StoreResult<usize> {
        let posts = self.post_dynamo.completed_posts_by_user(posted_by_user_id).await?;
        let added = self
            .dynamo
            .add_posts_to_feed(feed_user_id, &posts, KeyScheme::Current)
            .await?;
        debug!(feed_user_id = %feed_user_id, posted_by_user_id = %posted_by_user_id, added, "Back-filled feed");
        Ok(added)
    }

    /// Fan a new post out to its author's followers and to the author.
    pub async fn add_post_to_followers_feeds(
        &self,
        followed_user_id: &str,
        post: &PostItem,
    ) -> StoreResult<usize> {
        let follower_ids = self.follow_dynamo.follower_user_ids(followed_user_id).await?;
        let feed_user_ids = follower_ids
            .iter()
            .map(String::as_str)
            .chain(iter::once(followed_user_id));
        let added = self
            .dynamo
            .add_post_to_feeds(feed_user_ids, post, KeyScheme::Current)
            .await?;
        debug!(post_id = %post.post_id, added, "Fanned out post to feeds");
        Ok(added)
    }

    pub async fn delete_users_posts_from_feed(
        &self,
        feed_user_id: &str,
        posted_by_user_id: &str,
    ) -> StoreResult<usize> {
        self.dynamo
            .delete_by_post_owner(feed_user_id, posted_by_user_id)
            .await
    }

    pub async fn delete_post_from_followers_feeds(
        &self,
        followed_user_id: &str,
        post_id: &str,
    ) -> StoreResult<usize> {
        let follower_ids = self.follow_dynamo.follower_user_ids(followed_user_id).await?;
        let feed_user_ids = follower_ids
            .iter()
            .map(String::as_str)
            .chain(iter::once(followed_user_id));
        self.dynamo.delete_by_post(post_id, feed_user_ids).await
    }

    /// The user's feed, newest first, a page at a time.
    pub fn generate_feed(&self, feed_user_id: &str) -> QueryPaginator {
        self.dynamo.generate_feed(feed_user_id)
    }
}
