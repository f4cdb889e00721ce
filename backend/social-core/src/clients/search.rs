use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{check_response, ClientError, SearchClient};

/// User document as stored in the search index
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument<'a> {
    user_id: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
}

/// Search client speaking the Elasticsearch document API
#[derive(Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl HttpSearchClient {
    pub fn new(client: reqwest::Client, base_url: &str, index: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.into(),
        }
    }

    fn document_url(&self, user_id: &str) -> String {
        format!("{}/{}/_doc/{}", self.base_url, self.index, user_id)
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn put_user(
        &self,
        user_id: &str,
        username: &str,
        full_name: Option<&str>,
    ) -> Result<(), ClientError> {
        let document = UserDocument {
            user_id,
            username,
            full_name,
        };
        let response = self
            .client
            .put(self.document_url(user_id))
            .json(&document)
            .send()
            .await?;
        check_response("search", response, false).await?;
        debug!(user_id = %user_id, "Indexed user document");
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ClientError> {
        let response = self.client.delete(self.document_url(user_id)).send().await?;
        check_response("search", response, true).await?;
        debug!(user_id = %user_id, "Removed user document");
        Ok(())
    }
}
