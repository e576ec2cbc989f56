//! Types shared across LaunchDarkly API endpoints

use serde::{Deserialize, Serialize};

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Paged collection wrapper used by list endpoints and `expand` fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Items<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub total_count: Option<u64>,
}

impl<T> Default for Items<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: None,
        }
    }
}

/// One RFC 6902 JSON patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

pub fn patch_replace(path: impl Into<String>, value: impl Serialize) -> PatchOperation {
    PatchOperation {
        op: "replace".to_string(),
        path: path.into(),
        value: Some(serde_json::to_value(value).unwrap_or(serde_json::Value::Null)),
    }
}

pub fn patch_add(path: impl Into<String>, value: impl Serialize) -> PatchOperation {
    PatchOperation {
        op: "add".to_string(),
        path: path.into(),
        value: Some(serde_json::to_value(value).unwrap_or(serde_json::Value::Null)),
    }
}

pub fn patch_remove(path: impl Into<String>) -> PatchOperation {
    PatchOperation {
        op: "remove".to_string(),
        path: path.into(),
        value: None,
    }
}

/// JSON patch plus the audit-log comment attached to the change.
#[derive(Debug, Clone, Serialize)]
pub struct PatchWithComment {
    pub comment: String,
    pub patch: Vec<PatchOperation>,
}

impl PatchWithComment {
    pub fn terraform(patch: Vec<PatchOperation>) -> Self {
        Self {
            comment: "Terraform".to_string(),
            patch,
        }
    }
}

/// Semantic patch body. Sent with the semantic-patch content type.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub instructions: Vec<serde_json::Value>,
}

/// A role or webhook policy statement as the API stores it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub effect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_actions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSideAvailability {
    pub using_environment_id: bool,
    pub using_mobile_key: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// Escapes one path segment of an API URL.
pub fn segment(s: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_helpers_serialize_like_json_patch() {
        let ops = vec![
            patch_replace("/name", "x"),
            patch_add("/variations/2", json!({"value": 3})),
            patch_remove("/variations/3"),
        ];

        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                {"op": "replace", "path": "/name", "value": "x"},
                {"op": "add", "path": "/variations/2", "value": {"value": 3}},
                {"op": "remove", "path": "/variations/3"},
            ])
        );
    }

    #[test]
    fn patch_with_comment_uses_terraform_comment() {
        let body = PatchWithComment::terraform(vec![patch_replace("/on", true)]);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["comment"], "Terraform");
        assert_eq!(value["patch"][0]["value"], true);
    }

    #[test]
    fn query_params_encode_values() {
        let query = ApiQueryParams::new()
            .add("filter", "team:my team")
            .add_optional("limit", Some(20))
            .add_optional("offset", None::<u32>)
            .to_query_string();

        assert_eq!(query, "?filter=team%3Amy%20team&limit=20");
        assert_eq!(ApiQueryParams::new().to_query_string(), "");
    }

    #[test]
    fn statement_omits_empty_sides() {
        let statement = Statement {
            effect: "allow".to_string(),
            resources: Some(vec!["proj/*".to_string()]),
            actions: Some(vec!["*".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&statement).unwrap(),
            json!({"effect": "allow", "resources": ["proj/*"], "actions": ["*"]})
        );
    }
}
