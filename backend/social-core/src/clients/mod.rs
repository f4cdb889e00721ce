//! Clients for the external services the sync methods push derived state to.

pub mod push;
pub mod search;

use async_trait::async_trait;
use thiserror::Error;

pub use push::HttpPushClient;
pub use search::HttpSearchClient;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} responded with status {status}: {body}")]
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// Search index holding one document per user.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn put_user(
        &self,
        user_id: &str,
        username: &str,
        full_name: Option<&str>,
    ) -> Result<(), ClientError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), ClientError>;
}

/// Delivery channel of a push endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "EMAIL",
            Channel::Sms => "SMS",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry of per-user push-notification endpoints.
#[async_trait]
pub trait PushEndpointClient: Send + Sync {
    async fn update_user_endpoint(
        &self,
        user_id: &str,
        channel: Channel,
        address: &str,
    ) -> Result<(), ClientError>;

    async fn delete_user_endpoint(&self, user_id: &str, channel: Channel)
        -> Result<(), ClientError>;

    async fn enable_user_endpoints(&self, user_id: &str) -> Result<(), ClientError>;

    async fn disable_user_endpoints(&self, user_id: &str) -> Result<(), ClientError>;

    async fn delete_user_endpoints(&self, user_id: &str) -> Result<(), ClientError>;
}

/// Turn a non-success response into `UnexpectedStatus`. A 404 counts as success
/// when `allow_not_found` is set, which makes deletes idempotent.
pub(crate) async fn check_response(
    service: &'static str,
    response: reqwest::Response,
    allow_not_found: bool,
) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() || (allow_not_found && status == reqwest::StatusCode::NOT_FOUND) {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::UnexpectedStatus {
        service,
        status: status.as_u16(),
        body,
    })
}
