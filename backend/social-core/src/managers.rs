//! One-time wiring of every manager over a shared store client.

use chrono::{DateTime, Utc};
use doc_store::StoreClient;
use std::sync::Arc;

use crate::clients::{PushEndpointClient, SearchClient};
use crate::error::CommentError;
use crate::models::block::{BlockDynamo, BlockManager};
use crate::models::card::{CardDynamo, CardManager};
use crate::models::comment::{CommentDynamo, CommentManager};
use crate::models::feed::{FeedDynamo, FeedManager};
use crate::models::flag::FlagDynamo;
use crate::models::follow::{FollowDynamo, FollowManager};
use crate::models::post::{PostDynamo, PostManager};
use crate::models::user::{UserDynamo, UserManager};
use crate::models::view::ViewDynamo;

#[derive(Clone)]
pub struct Managers {
    pub block: BlockManager,
    pub card: CardManager,
    pub comment: CommentManager,
    pub feed: FeedManager,
    pub follow: FollowManager,
    pub post: PostManager,
    pub user: UserManager,
}

impl Managers {
    pub fn new(
        store: StoreClient,
        search_client: Option<Arc<dyn SearchClient>>,
        push_client: Option<Arc<dyn PushEndpointClient>>,
    ) -> Self {
        let post_dynamo = PostDynamo::new(store.clone());
        let follow_dynamo = FollowDynamo::new(store.clone());
        let block_dynamo = BlockDynamo::new(store.clone());

        let card = CardManager::new(CardDynamo::new(store.clone()));
        let user = UserManager::new(
            UserDynamo::new(store.clone()),
            card.clone(),
            search_client,
            push_client,
        );
        let feed = FeedManager::new(
            FeedDynamo::new(store.clone()),
            post_dynamo.clone(),
            follow_dynamo.clone(),
        );
        let follow = FollowManager::new(follow_dynamo, block_dynamo.clone(), user.clone(), feed.clone());
        let block = BlockManager::new(block_dynamo, follow.clone(), feed.clone());
        let post = PostManager::new(post_dynamo, user.clone(), card.clone(), feed.clone());
        let comment = CommentManager::new(
            CommentDynamo::new(store.clone()),
            ViewDynamo::new(store.clone()),
            FlagDynamo::new(store),
            post.clone(),
            user.clone(),
            follow.clone(),
            block.clone(),
        );

        Self {
            block,
            card,
            comment,
            feed,
            follow,
            post,
            user,
        }
    }

    /// Delete a post and every comment on it.
    pub async fn delete_post(&self, post_id: &str, now: DateTime<Utc>) -> Result<(), CommentError> {
        self.comment.delete_all_on_post(post_id, now).await?;
        self.post.delete_post(post_id).await?;
        Ok(())
    }
}
