//! Metric API implementation

use super::client::Client;
use super::common::{segment, PatchOperation};
use super::error::ApiError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub key: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_numeric: bool,
    pub unit: Option<String>,
    pub selector: Option<String>,
    pub event_key: Option<String>,
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub urls: Vec<UrlMatcher>,
    pub maintainer_id: Option<String>,
}

/// Page matcher used by click and pageview metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UrlMatcher {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Request body for POST /api/v2/metrics/{projectKey}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPost {
    pub key: String,
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub is_active: bool,
    pub is_numeric: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<UrlMatcher>,
}

pub struct MetricsApi<'a> {
    client: &'a Client,
}

impl<'a> MetricsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(project_key: &str, key: &str) -> String {
        format!("/api/v2/metrics/{}/{}", segment(project_key), segment(key))
    }

    /// GET /api/v2/metrics/{projectKey}/{metricKey}
    pub async fn get(&self, project_key: &str, key: &str) -> Result<Metric, ApiError> {
        self.client.get(&Self::path(project_key, key)).await
    }

    /// POST /api/v2/metrics/{projectKey}
    pub async fn create(&self, project_key: &str, body: &MetricPost) -> Result<Metric, ApiError> {
        self.client
            .post(&format!("/api/v2/metrics/{}", segment(project_key)), body)
            .await
    }

    /// PATCH /api/v2/metrics/{projectKey}/{metricKey}
    pub async fn patch(
        &self,
        project_key: &str,
        key: &str,
        ops: &[PatchOperation],
    ) -> Result<Metric, ApiError> {
        self.client.patch(&Self::path(project_key, key), ops).await
    }

    /// DELETE /api/v2/metrics/{projectKey}/{metricKey}
    pub async fn delete(&self, project_key: &str, key: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(project_key, key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::create_test_client;
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn create_sends_only_set_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/metrics/p")
            .match_body(Matcher::Json(json!({
                "key": "signup",
                "name": "Signup",
                "kind": "pageview",
                "isActive": true,
                "isNumeric": false,
                "urls": [{"kind": "exact", "url": "https://example.com/signup"}]
            })))
            .with_status(201)
            .with_body(r#"{"key":"signup","name":"Signup","kind":"pageview"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let body = MetricPost {
            key: "signup".to_string(),
            name: "Signup".to_string(),
            kind: "pageview".to_string(),
            description: String::new(),
            tags: vec![],
            is_active: true,
            is_numeric: false,
            unit: None,
            selector: None,
            event_key: None,
            success_criteria: None,
            urls: vec![UrlMatcher {
                kind: "exact".to_string(),
                url: Some("https://example.com/signup".to_string()),
                ..Default::default()
            }],
        };
        let metric = client.metrics().create("p", &body).await.unwrap();

        assert_eq!(metric.kind, "pageview");
        mock.assert_async().await;
    }
}
