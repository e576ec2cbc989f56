//! Audit log subscription config fields per integration.
//!
//! Users write config keys in snake_case with string values. The API
//! expects each integration's own key casing and typed values.

use super::error::ConvertError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const KEBAB_CASE_INTEGRATIONS: [&str; 1] = ["splunk"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Uri,
    Boolean,
    Enum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormVariable {
    pub field_type: FieldType,
    pub is_optional: bool,
    pub allowed_values: Vec<String>,
    pub is_secret: bool,
}

impl FormVariable {
    fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            is_optional: false,
            allowed_values: Vec::new(),
            is_secret: false,
        }
    }

    fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    fn secret(mut self) -> Self {
        self.is_secret = true;
        self
    }

    fn allowed(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Field name, in the integration's own casing, to its form variable.
pub type IntegrationConfig = BTreeMap<String, FormVariable>;

/// Immutable table of supported integrations. Built once by the provider
/// and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct IntegrationRegistry {
    configs: BTreeMap<String, IntegrationConfig>,
}

impl IntegrationRegistry {
    pub fn from_configs<I, K>(configs: I) -> Self
    where
        I: IntoIterator<Item = (K, IntegrationConfig)>,
        K: Into<String>,
    {
        Self {
            configs: configs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn builtin() -> Self {
        let fields = |entries: Vec<(&str, FormVariable)>| -> IntegrationConfig {
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect()
        };
        Self::from_configs([
            (
                "datadog",
                fields(vec![
                    ("apiKey", FormVariable::required(FieldType::String).secret()),
                    (
                        "hostURL",
                        FormVariable::required(FieldType::Enum).optional().allowed(&[
                            "https://api.datadoghq.com",
                            "https://api.datadoghq.eu",
                            "https://us3.datadoghq.com",
                            "https://us5.datadoghq.com",
                            "https://api.ddog-gov.com",
                        ]),
                    ),
                ]),
            ),
            (
                "dynatrace",
                fields(vec![
                    ("apiToken", FormVariable::required(FieldType::String).secret()),
                    ("url", FormVariable::required(FieldType::Uri)),
                    (
                        "entity",
                        FormVariable::required(FieldType::Enum).optional().allowed(&[
                            "APPLICATION",
                            "BROWSER",
                            "HTTP_CHECK",
                            "HOST",
                            "PROCESS_GROUP",
                            "SERVICE",
                        ]),
                    ),
                ]),
            ),
            (
                "elastic",
                fields(vec![
                    ("url", FormVariable::required(FieldType::Uri)),
                    ("token", FormVariable::required(FieldType::String).secret()),
                    ("index", FormVariable::required(FieldType::String)),
                ]),
            ),
            (
                "honeycomb",
                fields(vec![
                    ("datasetName", FormVariable::required(FieldType::String)),
                    ("apiKey", FormVariable::required(FieldType::String).secret()),
                ]),
            ),
            (
                "logdna",
                fields(vec![
                    ("ingestionKey", FormVariable::required(FieldType::String).secret()),
                    ("level", FormVariable::required(FieldType::String).optional()),
                ]),
            ),
            ("msteams", fields(vec![("url", FormVariable::required(FieldType::Uri))])),
            (
                "new-relic-apm",
                fields(vec![
                    ("apiKey", FormVariable::required(FieldType::String).secret()),
                    ("applicationId", FormVariable::required(FieldType::String)),
                    (
                        "domain",
                        FormVariable::required(FieldType::Enum)
                            .optional()
                            .allowed(&["api.newrelic.com", "api.eu.newrelic.com"]),
                    ),
                ]),
            ),
            (
                "signalfx",
                fields(vec![
                    ("accessToken", FormVariable::required(FieldType::String).secret()),
                    ("realm", FormVariable::required(FieldType::String)),
                ]),
            ),
            ("slack", fields(vec![("url", FormVariable::required(FieldType::Uri))])),
            (
                "splunk",
                fields(vec![
                    ("base-url", FormVariable::required(FieldType::Uri)),
                    ("token", FormVariable::required(FieldType::String).secret()),
                    (
                        "skip-ca-verification",
                        FormVariable::required(FieldType::Boolean).optional(),
                    ),
                ]),
            ),
        ])
    }

    /// Sorted, for schema validation and docs.
    pub fn keys(&self) -> Vec<&str> {
        self.configs.keys().map(String::as_str).collect()
    }

    pub fn schema(&self, integration_key: &str) -> Result<&IntegrationConfig, ConvertError> {
        self.configs
            .get(integration_key)
            .ok_or_else(|| ConvertError::UnknownIntegration(integration_key.to_string()))
    }

    /// Validates user config and produces the API body.
    pub fn config_from_user(
        &self,
        integration_key: &str,
        user: &BTreeMap<String, String>,
    ) -> Result<Map<String, Value>, ConvertError> {
        let schema = self.schema(integration_key)?;
        for key in user.keys() {
            if !schema.contains_key(&api_field_key(integration_key, key)) {
                return Err(ConvertError::validation(format!(
                    "config variable {} not valid for integration type {}",
                    key, integration_key
                )));
            }
        }

        let mut converted = Map::new();
        for (field, variable) in schema {
            let user_key = snake_case(field);
            let Some(raw) = user.get(&user_key) else {
                if variable.is_optional {
                    continue;
                }
                return Err(ConvertError::validation(format!(
                    "config variable {} must be set",
                    user_key
                )));
            };
            let value = match variable.field_type {
                FieldType::String | FieldType::Uri => Value::String(raw.clone()),
                FieldType::Boolean => Value::Bool(parse_bool(raw).ok_or_else(|| {
                    ConvertError::validation(format!(
                        "config value {} for {} must be of type bool",
                        raw, field
                    ))
                })?),
                FieldType::Enum => {
                    if !variable.allowed_values.contains(raw) {
                        return Err(ConvertError::validation(format!(
                            "config value {} for {} must be one of the following approved string values: {:?}",
                            raw, field, variable.allowed_values
                        )));
                    }
                    Value::String(raw.clone())
                }
            };
            converted.insert(field.clone(), value);
        }
        Ok(converted)
    }

    /// Converts an API config back to user form. Outside lookups, keys the
    /// user never set are dropped, and secrets keep the user's own value
    /// since the API only returns them masked.
    pub fn config_to_user(
        &self,
        integration_key: &str,
        api: &Map<String, Value>,
        prior: &BTreeMap<String, String>,
        is_lookup: bool,
    ) -> Result<BTreeMap<String, String>, ConvertError> {
        let schema = self.schema(integration_key)?;
        let mut converted = BTreeMap::new();
        for (field, value) in api {
            let key = snake_case(field);
            let prior_value = prior.get(&key);
            if prior_value.is_none() && !is_lookup {
                continue;
            }
            let is_secret = schema.get(field).is_some_and(|v| v.is_secret);
            let text = match (is_secret, prior_value) {
                (true, Some(original)) => original.clone(),
                _ => match value {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                },
            };
            converted.insert(key, text);
        }
        Ok(converted)
    }
}

/// Key the API uses for a snake_case user key.
pub fn api_field_key(integration_key: &str, user_key: &str) -> String {
    if KEBAB_CASE_INTEGRATIONS.contains(&integration_key) {
        return snake_case(user_key).replace('_', "-");
    }
    let key = lower_camel_case(user_key);
    if integration_key == "datadog" && key == "hostUrl" {
        return "hostURL".to_string();
    }
    key
}

/// `hostURL` -> `host_url`, `base-url` -> `base_url`.
pub fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '_' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

pub fn lower_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Accepts `1`/`0`, `t`/`f` and `true`/`false` in the usual casings.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn case_conversions() {
        assert_eq!(snake_case("hostURL"), "host_url");
        assert_eq!(snake_case("apiKey"), "api_key");
        assert_eq!(snake_case("skip-ca-verification"), "skip_ca_verification");
        assert_eq!(lower_camel_case("dataset_name"), "datasetName");
        assert_eq!(api_field_key("datadog", "host_url"), "hostURL");
        assert_eq!(api_field_key("splunk", "base_url"), "base-url");
    }

    #[test]
    fn datadog_config_is_converted() {
        let registry = IntegrationRegistry::builtin();
        let config = registry
            .config_from_user(
                "datadog",
                &user(&[("api_key", "k"), ("host_url", "https://api.datadoghq.com")]),
            )
            .unwrap();
        assert_eq!(config.get("apiKey"), Some(&json!("k")));
        assert_eq!(config.get("hostURL"), Some(&json!("https://api.datadoghq.com")));
    }

    #[test]
    fn splunk_boolean_is_coerced() {
        let registry = IntegrationRegistry::builtin();
        let config = registry
            .config_from_user(
                "splunk",
                &user(&[
                    ("base_url", "https://splunk.example.com"),
                    ("token", "t"),
                    ("skip_ca_verification", "true"),
                ]),
            )
            .unwrap();
        assert_eq!(config.get("skip-ca-verification"), Some(&json!(true)));

        let err = registry
            .config_from_user(
                "splunk",
                &user(&[
                    ("base_url", "https://splunk.example.com"),
                    ("token", "t"),
                    ("skip_ca_verification", "maybe"),
                ]),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "config value maybe for skip-ca-verification must be of type bool"
        );
    }

    #[test]
    fn unknown_and_missing_keys_are_rejected() {
        let registry = IntegrationRegistry::builtin();
        let err = registry
            .config_from_user("honeycomb", &user(&[("dataset", "x")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "config variable dataset not valid for integration type honeycomb"
        );

        let err = registry
            .config_from_user("honeycomb", &user(&[("dataset_name", "x")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "config variable api_key must be set");

        let err = registry.config_from_user("pagerduty", &user(&[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "pagerduty is not a valid integration_key for audit log subscriptions"
        );
    }

    #[test]
    fn enum_values_are_checked() {
        let registry = IntegrationRegistry::builtin();
        let err = registry
            .config_from_user(
                "datadog",
                &user(&[("api_key", "k"), ("host_url", "https://example.com")]),
            )
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("config value https://example.com for hostURL must be one of the following approved string values"));
    }

    #[test]
    fn reading_keeps_secrets_and_drops_unset_defaults() {
        let registry = IntegrationRegistry::builtin();
        let mut api = Map::new();
        api.insert("apiKey".to_string(), json!("********"));
        api.insert("hostURL".to_string(), json!("https://api.datadoghq.com"));
        let prior = user(&[("api_key", "real-key")]);

        let config = registry.config_to_user("datadog", &api, &prior, false).unwrap();
        assert_eq!(config, user(&[("api_key", "real-key")]));

        let looked_up = registry.config_to_user("datadog", &api, &BTreeMap::new(), true).unwrap();
        assert_eq!(looked_up.get("host_url").map(String::as_str), Some("https://api.datadoghq.com"));
    }

    #[test]
    fn booleans_read_back_as_strings() {
        let registry = IntegrationRegistry::builtin();
        let mut api = Map::new();
        api.insert("skip-ca-verification".to_string(), json!(false));
        let prior = user(&[("skip_ca_verification", "false")]);
        let config = registry.config_to_user("splunk", &api, &prior, false).unwrap();
        assert_eq!(config.get("skip_ca_verification").map(String::as_str), Some("false"));
    }
}
