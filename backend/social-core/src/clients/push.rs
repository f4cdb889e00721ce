use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{check_response, Channel, ClientError, PushEndpointClient};

/// Push endpoint registry reached over HTTP.
///
/// Endpoints live under `{base}/users/{userId}/endpoints`, one per channel.
#[derive(Clone)]
pub struct HttpPushClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPushClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoints_url(&self, user_id: &str) -> String {
        format!("{}/users/{}/endpoints", self.base_url, user_id)
    }

    async fn set_endpoints_enabled(&self, user_id: &str, enabled: bool) -> Result<(), ClientError> {
        let response = self
            .client
            .patch(self.endpoints_url(user_id))
            .json(&json!({ "enabled": enabled }))
            .send()
            .await?;
        // a user without endpoints has nothing to toggle
        check_response("push", response, true).await?;
        debug!(user_id = %user_id, enabled, "Toggled push endpoints");
        Ok(())
    }
}

#[async_trait]
impl PushEndpointClient for HttpPushClient {
    async fn update_user_endpoint(
        &self,
        user_id: &str,
        channel: Channel,
        address: &str,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .put(format!("{}/{}", self.endpoints_url(user_id), channel))
            .json(&json!({ "address": address }))
            .send()
            .await?;
        check_response("push", response, false).await?;
        debug!(user_id = %user_id, channel = %channel, "Updated push endpoint");
        Ok(())
    }

    async fn delete_user_endpoint(
        &self,
        user_id: &str,
        channel: Channel,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.endpoints_url(user_id), channel))
            .send()
            .await?;
        check_response("push", response, true).await
    }

    async fn enable_user_endpoints(&self, user_id: &str) -> Result<(), ClientError> {
        self.set_endpoints_enabled(user_id, true).await
    }

    async fn disable_user_endpoints(&self, user_id: &str) -> Result<(), ClientError> {
        self.set_endpoints_enabled(user_id, false).await
    }

    async fn delete_user_endpoints(&self, user_id: &str) -> Result<(), ClientError> {
        let response = self.client.delete(self.endpoints_url(user_id)).send().await?;
        check_response("push", response, true).await?;
        debug!(user_id = %user_id, "Deleted all push endpoints");
        Ok(())
    }
}
