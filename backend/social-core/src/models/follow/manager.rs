use chrono::{DateTime, Utc};
use doc_store::StoreError;
use tracing::info;

use super::{Follow, FollowDynamo, FollowStatus};
use crate::error::{FollowError, UserError};
use crate::models::block::BlockDynamo;
use crate::models::feed::FeedManager;
use crate::models::user::UserManager;

#[derive(Clone)]
pub struct FollowManager {
    dynamo: FollowDynamo,
    block_dynamo: BlockDynamo,
    user_manager: UserManager,
    feed_manager: FeedManager,
}

impl FollowManager {
    pub fn new(
        dynamo: FollowDynamo,
        block_dynamo: BlockDynamo,
        user_manager: UserManager,
        feed_manager: FeedManager,
    ) -> Self {
        Self {
            dynamo,
            block_dynamo,
            user_manager,
            feed_manager,
        }
    }

    pub fn dynamo(&self) -> &FollowDynamo {
        &self.dynamo
    }

    pub async fn get_follow(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> Result<Option<Follow>, FollowError> {
        Ok(self
            .dynamo
            .get_following(follower_user_id, followed_user_id)
            .await?)
    }

    fn invalid_transition(follow: &Follow) -> FollowError {
        FollowError::InvalidTransition {
            follower_id: follow.follower_user_id.clone(),
            followed_id: follow.followed_user_id.clone(),
            status: follow.follow_status.as_str().to_string(),
        }
    }

    fn stale(follow: &Follow, err: StoreError) -> FollowError {
        if err.is_conditional_check_failed() {
            Self::invalid_transition(follow)
        } else {
            err.into()
        }
    }

    /// Follow a public user outright, or request to follow a private one.
    pub async fn request_to_follow(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Follow, FollowError> {
        if follower_user_id == followed_user_id {
            return Err(FollowError::CannotFollowSelf(follower_user_id.to_string()));
        }
        let blocked = self
            .block_dynamo
            .get_block(followed_user_id, follower_user_id)
            .await?
            .is_some()
            || self
                .block_dynamo
                .get_block(follower_user_id, followed_user_id)
                .await?
                .is_some();
        if blocked {
            return Err(FollowError::Blocked {
                follower_id: follower_user_id.to_string(),
                followed_id: followed_user_id.to_string(),
            });
        }

        if self.user_manager.get_user(follower_user_id).await?.is_none() {
            return Err(UserError::UserDoesNotExist(follower_user_id.to_string()).into());
        }
        let followed = self
            .user_manager
            .get_user(followed_user_id)
            .await?
            .ok_or_else(|| UserError::UserDoesNotExist(followed_user_id.to_string()))?;

        let status = if followed.is_private() {
            FollowStatus::Requested
        } else {
            FollowStatus::Following
        };
        let follow = match self
            .dynamo
            .add_following(follower_user_id, followed_user_id, status, now)
            .await
        {
            Ok(follow) => follow,
            Err(err) if err.is_conditional_check_failed() => {
                return Err(FollowError::AlreadyFollowing {
                    follower_id: follower_user_id.to_string(),
                    followed_id: followed_user_id.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        match status {
            FollowStatus::Requested => {
                self.user_manager
                    .dynamo()
                    .increment_count(followed_user_id, "followersRequestedCount")
                    .await?;
            }
            _ => self.start_following(follower_user_id, followed_user_id).await?,
        }
        info!(
            follower_user_id = %follower_user_id,
            followed_user_id = %followed_user_id,
            status = status.as_str(),
            "Follow requested"
        );
        Ok(follow)
    }

    /// Accept a requested (or previously denied) follower.
    pub async fn accept_follower(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> Result<Follow, FollowError> {
        let follow = self.require_follow(follower_user_id, followed_user_id).await?;
        if follow.is_following() {
            return Err(Self::invalid_transition(&follow));
        }
        let updated = self
            .dynamo
            .update_following_status(&follow, FollowStatus::Following)
            .await
            .map_err(|err| Self::stale(&follow, err))?;
        if follow.status() == FollowStatus::Requested {
            self.user_manager
                .dynamo()
                .decrement_count(followed_user_id, "followersRequestedCount")
                .await?;
        }
        self.start_following(follower_user_id, followed_user_id).await?;
        Ok(updated)
    }

    /// Deny a requested follower, or revoke an accepted one.
    pub async fn deny_follower(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> Result<Follow, FollowError> {
        let follow = self.require_follow(follower_user_id, followed_user_id).await?;
        if follow.status() == FollowStatus::Denied {
            return Err(Self::invalid_transition(&follow));
        }
        let updated = self
            .dynamo
            .update_following_status(&follow, FollowStatus::Denied)
            .await
            .map_err(|err| Self::stale(&follow, err))?;
        self.release_counts(&follow).await?;
        Ok(updated)
    }

    /// Stop following, or withdraw a pending request. A denied follower cannot
    /// remove the denial.
    pub async fn unfollow(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> Result<Follow, FollowError> {
        let follow = self.require_follow(follower_user_id, followed_user_id).await?;
        if follow.status() == FollowStatus::Denied {
            return Err(Self::invalid_transition(&follow));
        }
        self.remove_follow(follow).await
    }

    /// Remove any follow between the two users, in both directions, whatever its status.
    pub async fn sever_on_block(
        &self,
        blocker_user_id: &str,
        blocked_user_id: &str,
    ) -> Result<usize, FollowError> {
        let mut severed = 0;
        for (follower, followed) in [
            (blocker_user_id, blocked_user_id),
            (blocked_user_id, blocker_user_id),
        ] {
            if let Some(follow) = self.dynamo.get_following(follower, followed).await? {
                self.remove_follow(follow).await?;
                severed += 1;
            }
        }
        Ok(severed)
    }

    async fn require_follow(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> Result<Follow, FollowError> {
        self.dynamo
            .get_following(follower_user_id, followed_user_id)
            .await?
            .ok_or_else(|| FollowError::NotFollowing {
                follower_id: follower_user_id.to_string(),
                followed_id: followed_user_id.to_string(),
            })
    }

    async fn remove_follow(&self, follow: Follow) -> Result<Follow, FollowError> {
        let removed = self
            .dynamo
            .delete_following(&follow.follower_user_id, &follow.followed_user_id)
            .await?;
        // someone else removed it first; their call released the counts
        let Some(removed) = removed else {
            return Ok(follow);
        };
        self.release_counts(&removed).await?;
        info!(
            follower_user_id = %removed.follower_user_id,
            followed_user_id = %removed.followed_user_id,
            "Follow removed"
        );
        Ok(removed)
    }

    async fn start_following(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
    ) -> Result<(), FollowError> {
        let users = self.user_manager.dynamo();
        users.increment_count(followed_user_id, "followerCount").await?;
        users.increment_count(follower_user_id, "followedCount").await?;
        self.feed_manager
            .add_users_posts_to_feed(follower_user_id, followed_user_id)
            .await?;
        Ok(())
    }

    /// Undo the counters (and feed rows) that `follow`'s status holds.
    async fn release_counts(&self, follow: &Follow) -> Result<(), FollowError> {
        let users = self.user_manager.dynamo();
        match follow.status() {
            FollowStatus::Requested => {
                users
                    .decrement_count(&follow.followed_user_id, "followersRequestedCount")
                    .await?;
            }
            FollowStatus::Following => {
                users
                    .decrement_count(&follow.followed_user_id, "followerCount")
                    .await?;
                users
                    .decrement_count(&follow.follower_user_id, "followedCount")
                    .await?;
                self.feed_manager
                    .delete_users_posts_from_feed(&follow.follower_user_id, &follow.followed_user_id)
                    .await?;
            }
            FollowStatus::Denied => {}
        }
        Ok(())
    }
}
