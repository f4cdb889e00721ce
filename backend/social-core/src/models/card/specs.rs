//! Card specifications: which card a user should see, derived from counters.

/// Deep-link target of every card action.
const APP_URL: &str = "https://real.app";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSpec {
    pub card_id: String,
    pub user_id: String,
    pub title: String,
    pub action: String,
    pub post_id: Option<String>,
}

fn pluralize(count: i64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

impl CardSpec {
    /// "You have N pending follow request(s)".
    pub fn requested_followers(user_id: &str, count: i64) -> Self {
        Self {
            card_id: format!("{user_id}:REQUESTED_FOLLOWERS"),
            user_id: user_id.to_string(),
            title: format!(
                "You have {}",
                pluralize(count, "pending follow request", "pending follow requests")
            ),
            action: format!("{APP_URL}/user/{user_id}/follower_requests"),
            post_id: None,
        }
    }

    /// "You have N chat(s) with new messages".
    pub fn chat_activity(user_id: &str, count: i64) -> Self {
        Self {
            card_id: format!("{user_id}:CHAT_ACTIVITY"),
            user_id: user_id.to_string(),
            title: format!(
                "You have {} with new messages",
                pluralize(count, "chat", "chats")
            ),
            action: format!("{APP_URL}/chat/"),
            post_id: None,
        }
    }

    /// New comments on one of the user's posts.
    pub fn comment_activity(user_id: &str, post_id: &str) -> Self {
        Self {
            card_id: format!("{user_id}:COMMENT_ACTIVITY:{post_id}"),
            user_id: user_id.to_string(),
            title: "You have new comments".to_string(),
            action: format!("{APP_URL}/user/{user_id}/post/{post_id}/comments"),
            post_id: Some(post_id.to_string()),
        }
    }
}
