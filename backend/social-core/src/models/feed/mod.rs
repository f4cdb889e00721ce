//! Feed rows: one per (feed owner, visible post).

mod dynamo;
mod manager;

use doc_store::{get_str, Item};

pub use dynamo::{FeedDynamo, KeyScheme};
pub use manager::FeedManager;

/// A decoded feed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub feed_user_id: String,
    pub post_id: String,
    pub posted_at: String,
    pub posted_by_user_id: String,
}

impl FeedEntry {
    /// `None` for items missing any of the feed attributes.
    pub fn from_item(item: &Item) -> Option<Self> {
        Some(Self {
            feed_user_id: get_str(item, "userId")?.to_string(),
            post_id: get_str(item, "postId")?.to_string(),
            posted_at: get_str(item, "postedAt")?.to_string(),
            posted_by_user_id: get_str(item, "postedByUserId")?.to_string(),
        })
    }
}
