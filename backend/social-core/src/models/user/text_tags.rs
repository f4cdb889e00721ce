//! `@username` mentions in user-authored text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use super::UserManager;
use crate::error::UserError;

/// `@` followed by the characters a username may contain.
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z0-9_.]+)").expect("Invalid text tag regex"));

/// A mention that resolved to an existing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTag {
    /// The tag as written, including the `@`.
    pub tag: String,
    pub user_id: String,
}

/// Usernames mentioned in `text`, deduplicated, in order of first occurrence.
pub fn extract_usernames(text: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    TAG_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .filter(|username| seen.insert(*username))
        .collect()
}

impl UserManager {
    /// Resolve every mention in `text` to a user, dropping unknown usernames.
    pub async fn get_text_tags(&self, text: &str) -> Result<Vec<TextTag>, UserError> {
        let mut tags = Vec::new();
        for username in extract_usernames(text) {
            if let Some(user) = self.dynamo().get_user_by_username(username).await? {
                tags.push(TextTag {
                    tag: format!("@{username}"),
                    user_id: user.user_id,
                });
            }
        }
        Ok(tags)
    }
}
