use chrono::{DateTime, Utc};
use tracing::info;

use super::{Block, BlockDynamo};
use crate::error::BlockError;
use crate::models::feed::FeedManager;
use crate::models::follow::FollowManager;

#[derive(Clone)]
pub struct BlockManager {
    dynamo: BlockDynamo,
    follow_manager: FollowManager,
    feed_manager: FeedManager,
}

impl BlockManager {
    pub fn new(dynamo: BlockDynamo, follow_manager: FollowManager, feed_manager: FeedManager) -> Self {
        Self {
            dynamo,
            follow_manager,
            feed_manager,
        }
    }

    pub fn dynamo(&self) -> &BlockDynamo {
        &self.dynamo
    }

    pub async fn is_blocked(&self, blocker_user_id: &str, blocked_user_id: &str) -> Result<bool, BlockError> {
        Ok(self
            .dynamo
            .get_block(blocker_user_id, blocked_user_id)
            .await?
            .is_some())
    }

    /// Block a user. Any follow between the two is removed and neither keeps
    /// the other's posts in their feed.
    pub async fn block(
        &self,
        blocker_user_id: &str,
        blocked_user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Block, BlockError> {
        if blocker_user_id == blocked_user_id {
            return Err(BlockError::CannotBlockSelf(blocker_user_id.to_string()));
        }
        let block = match self.dynamo.add_block(blocker_user_id, blocked_user_id, now).await {
            Ok(block) => block,
            Err(err) if err.is_conditional_check_failed() => {
                return Err(BlockError::AlreadyBlocked {
                    blocker_id: blocker_user_id.to_string(),
                    blocked_id: blocked_user_id.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let severed = self
            .follow_manager
            .sever_on_block(blocker_user_id, blocked_user_id)
            .await?;
        self.feed_manager
            .delete_users_posts_from_feed(blocker_user_id, blocked_user_id)
            .await?;
        self.feed_manager
            .delete_users_posts_from_feed(blocked_user_id, blocker_user_id)
            .await?;
        info!(
            blocker_user_id = %blocker_user_id,
            blocked_user_id = %blocked_user_id,
            severed,
            "User blocked"
        );
        Ok(block)
    }

    pub async fn unblock(&self, blocker_user_id: &str, blocked_user_id: &str) -> Result<Block, BlockError> {
        let block = self
            .dynamo
            .delete_block(blocker_user_id, blocked_user_id)
            .await?
            .ok_or_else(|| BlockError::NotBlocked {
                blocker_id: blocker_user_id.to_string(),
                blocked_id: blocked_user_id.to_string(),
            })?;
        info!(blocker_user_id = %blocker_user_id, blocked_user_id = %blocked_user_id, "User unblocked");
        Ok(block)
    }
}
