//! Webhook API implementation

use super::client::Client;
use super::common::{segment, PatchOperation, Statement};
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Webhook {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    pub secret: Option<String>,
    #[serde(default)]
    pub on: bool,
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub statements: Option<Vec<Statement>>,
}

/// Request body for POST /api/v2/webhooks
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPost {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Requests are signed whenever a secret is set
    pub sign: bool,
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,
}

pub struct WebhooksApi<'a> {
    client: &'a Client,
}

impl<'a> WebhooksApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /api/v2/webhooks/{id}
    pub async fn get(&self, id: &str) -> Result<Webhook, ApiError> {
        self.client
            .get(&format!("/api/v2/webhooks/{}", segment(id)))
            .await
    }

    /// POST /api/v2/webhooks
    pub async fn create(&self, body: &WebhookPost) -> Result<Webhook, ApiError> {
        self.client.post("/api/v2/webhooks", body).await
    }

    /// PATCH /api/v2/webhooks/{id}
    pub async fn patch(&self, id: &str, ops: &[PatchOperation]) -> Result<Webhook, ApiError> {
        self.client
            .patch(&format!("/api/v2/webhooks/{}", segment(id)), ops)
            .await
    }

    /// DELETE /api/v2/webhooks/{id}
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/api/v2/webhooks/{}", segment(id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::create_test_client;
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn create_signs_when_secret_present() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/webhooks")
            .match_body(Matcher::PartialJson(json!({"secret": "s3cr3t", "sign": true})))
            .with_status(201)
            .with_body(r#"{"_id":"wh-1","url":"https://example.com/hook","on":true}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let body = WebhookPost {
            url: "https://example.com/hook".to_string(),
            secret: Some("s3cr3t".to_string()),
            sign: true,
            on: true,
            name: None,
            tags: vec![],
            statements: vec![],
        };
        let webhook = client.webhooks().create(&body).await.unwrap();

        assert_eq!(webhook.id, "wh-1");
        mock.assert_async().await;
    }
}
