//! Data export destination config per destination kind.
//!
//! Users key config in snake_case. The API expects camelCase and, for
//! mParticle user identities, a decoded JSON array.

use super::error::ConvertError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DESTINATION_KINDS: [&str; 5] = [
    "kinesis",
    "google-pubsub",
    "mparticle",
    "azure-event-hubs",
    "segment",
];

/// Keys the API masks on read. State keeps what the user wrote.
const OBFUSCATED_KEYS: [&str; 4] = ["api_key", "secret", "write_key", "policy_key"];

const USER_IDENTITIES: &str = "user_identities";

/// `(user key, API key)` pairs.
struct KindFields {
    required: &'static [(&'static str, &'static str)],
    optional: &'static [(&'static str, &'static str)],
}

impl KindFields {
    fn all(&self) -> impl Iterator<Item = &(&'static str, &'static str)> {
        self.required.iter().chain(self.optional)
    }
}

fn fields(kind: &str) -> Option<KindFields> {
    let fields = match kind {
        "kinesis" => KindFields {
            required: &[
                ("region", "region"),
                ("role_arn", "roleArn"),
                ("stream_name", "streamName"),
            ],
            optional: &[],
        },
        "mparticle" => KindFields {
            required: &[
                ("api_key", "apiKey"),
                ("secret", "secret"),
                ("environment", "environment"),
            ],
            optional: &[
                (USER_IDENTITIES, "userIdentities"),
                ("anonymous_user_identity", "anonymousUserIdentity"),
                ("user_identity", "userIdentity"),
            ],
        },
        "segment" => KindFields {
            required: &[("write_key", "writeKey")],
            optional: &[
                ("anonymous_id_context_kind", "anonymousIDContextKind"),
                ("user_id_context_kind", "userIDContextKind"),
            ],
        },
        "google-pubsub" => KindFields {
            required: &[("project", "project"), ("topic", "topic")],
            optional: &[],
        },
        "azure-event-hubs" => KindFields {
            required: &[
                ("namespace", "namespace"),
                ("name", "name"),
                ("policy_name", "policyName"),
                ("policy_key", "policyKey"),
            ],
            optional: &[],
        },
        _ => return None,
    };
    Some(fields)
}

fn user_identities(kind: &str, raw: &str) -> Result<Value, ConvertError> {
    let identities: Vec<Map<String, Value>> = serde_json::from_str(raw).map_err(|e| {
        ConvertError::validation(format!(
            "config field {:?} for destination kind {:?} is not valid: {}",
            USER_IDENTITIES, kind, e
        ))
    })?;
    for identity in &identities {
        for field in ["ldContextKind", "mparticleUserIdentity"] {
            match identity.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(ConvertError::validation(format!(
                        "badly-formed mParticle user_identities field: {} must be a string",
                        field
                    )))
                }
                None => {
                    return Err(ConvertError::validation(format!(
                        "badly-formed mParticle user_identities field: missing field {}",
                        field
                    )))
                }
            }
        }
    }
    Ok(Value::Array(identities.into_iter().map(Value::Object).collect()))
}

/// Renames configured keys to the API's and drops keys the kind does not use.
pub fn destination_config_from_user(
    kind: &str,
    config: &BTreeMap<String, String>,
) -> Result<Map<String, Value>, ConvertError> {
    let table = fields(kind).ok_or_else(|| {
        ConvertError::validation(format!("{:?} is not one of the supported destination kinds", kind))
    })?;

    let mut api = Map::new();
    for (user_key, api_key) in table.required {
        let value = config.get(*user_key).ok_or_else(|| {
            ConvertError::validation(format!(
                "missing required config field {:?} for destination kind {:?}",
                user_key, kind
            ))
        })?;
        api.insert(api_key.to_string(), Value::String(value.clone()));
    }
    for (user_key, api_key) in table.optional {
        let Some(value) = config.get(*user_key) else {
            continue;
        };
        let value = if *user_key == USER_IDENTITIES {
            user_identities(kind, value)?
        } else {
            Value::String(value.clone())
        };
        api.insert(api_key.to_string(), value);
    }
    Ok(api)
}

/// Maps API config back to user keys. Masked secrets are taken from
/// `prior` when it has them.
pub fn destination_config_to_user(
    kind: &str,
    api: &Map<String, Value>,
    prior: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let Some(table) = fields(kind) else {
        return BTreeMap::new();
    };
    let mut config = BTreeMap::new();
    for (user_key, api_key) in table.all() {
        let value = match api.get(*api_key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        config.insert(user_key.to_string(), value);
    }
    for key in OBFUSCATED_KEYS {
        if let (Some(slot), Some(known)) = (config.get_mut(key), prior.get(key)) {
            *slot = known.clone();
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn kinesis_keys_become_camel_case() {
        let config = user(&[
            ("region", "us-east-1"),
            ("role_arn", "arn:aws:iam::123:role/ld"),
            ("stream_name", "events"),
            ("ignored", "x"),
        ]);
        let api = destination_config_from_user("kinesis", &config).unwrap();
        assert_eq!(
            Value::Object(api),
            json!({"region": "us-east-1", "roleArn": "arn:aws:iam::123:role/ld", "streamName": "events"})
        );
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = destination_config_from_user("google-pubsub", &user(&[("project", "p")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"missing required config field "topic" for destination kind "google-pubsub""#
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = destination_config_from_user("webhook", &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("not one of the supported destination kinds"));
    }

    #[test]
    fn mparticle_identities_are_decoded_and_checked() {
        let base = [("api_key", "k"), ("secret", "s"), ("environment", "production")];
        let mut config = user(&base);
        config.insert(
            USER_IDENTITIES.to_string(),
            r#"[{"ldContextKind":"user","mparticleUserIdentity":"customer_id"}]"#.to_string(),
        );
        let api = destination_config_from_user("mparticle", &config).unwrap();
        assert_eq!(
            api["userIdentities"],
            json!([{"ldContextKind": "user", "mparticleUserIdentity": "customer_id"}])
        );

        config.insert(USER_IDENTITIES.to_string(), r#"[{"ldContextKind":"user"}]"#.to_string());
        let err = destination_config_from_user("mparticle", &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "badly-formed mParticle user_identities field: missing field mparticleUserIdentity"
        );
    }

    #[test]
    fn masked_secrets_keep_configured_value() {
        let api = json!({"writeKey": "****abcd", "userIDContextKind": "user"});
        let Value::Object(api) = api else { unreachable!() };
        let config = destination_config_to_user("segment", &api, &user(&[("write_key", "real-key")]));
        assert_eq!(config, user(&[("user_id_context_kind", "user"), ("write_key", "real-key")]));

        // Nothing known locally, as after import.
        let config = destination_config_to_user("segment", &api, &BTreeMap::new());
        assert_eq!(config.get("write_key").map(String::as_str), Some("****abcd"));
    }

    #[test]
    fn identities_read_back_as_json_text() {
        let api = json!({
            "apiKey": "k",
            "secret": "s",
            "environment": "production",
            "userIdentities": [{"ldContextKind": "user", "mparticleUserIdentity": "email"}]
        });
        let Value::Object(api) = api else { unreachable!() };
        let config = destination_config_to_user("mparticle", &api, &BTreeMap::new());
        assert_eq!(
            config.get(USER_IDENTITIES).map(String::as_str),
            Some(r#"[{"ldContextKind":"user","mparticleUserIdentity":"email"}]"#)
        );
    }
}
