//! Composite resource ids such as `project_key/flag_key`.

use super::error::ConvertError;

#[derive(Debug, Clone, Copy)]
pub struct IdFormat {
    pub kind: &'static str,
    pub parts: &'static [&'static str],
}

pub const ENVIRONMENT_ID: IdFormat = IdFormat {
    kind: "environment",
    parts: &["project_key", "env_key"],
};
pub const FLAG_ID: IdFormat = IdFormat {
    kind: "flag",
    parts: &["project_key", "flag_key"],
};
pub const FLAG_ENVIRONMENT_ID: IdFormat = IdFormat {
    kind: "flag",
    parts: &["project_key", "env_key", "flag_key"],
};
pub const SEGMENT_ID: IdFormat = IdFormat {
    kind: "segment",
    parts: &["project_key", "env_key", "segment_key"],
};
pub const METRIC_ID: IdFormat = IdFormat {
    kind: "metric",
    parts: &["project_key", "metric_key"],
};
pub const TRIGGER_ID: IdFormat = IdFormat {
    kind: "trigger",
    parts: &["project_key", "env_key", "flag_key", "trigger_id"],
};
pub const DESTINATION_ID: IdFormat = IdFormat {
    kind: "destination",
    parts: &["project_key", "env_key", "destination_id"],
};
pub const AUDIT_LOG_SUBSCRIPTION_ID: IdFormat = IdFormat {
    kind: "audit log subscription",
    parts: &["integration_key", "id"],
};
pub const RELEASE_POLICY_ID: IdFormat = IdFormat {
    kind: "release policy",
    parts: &["project_key", "release_policy_key"],
};
pub const AI_CONFIG_ID: IdFormat = IdFormat {
    kind: "AI config",
    parts: &["project_key", "ai_config_key"],
};

impl IdFormat {
    pub fn pattern(&self) -> String {
        self.parts.join("/")
    }

    /// Splits `id` into exactly `parts.len()` non-empty segments.
    pub fn parse<'a>(&self, id: &'a str) -> Result<Vec<&'a str>, ConvertError> {
        let segments: Vec<&str> = id.split('/').collect();
        if segments.len() != self.parts.len() || segments.iter().any(|s| s.is_empty()) {
            return Err(ConvertError::InvalidId {
                kind: self.kind.to_string(),
                id: id.to_string(),
                pattern: self.pattern(),
            });
        }
        Ok(segments)
    }

    pub fn join<S: AsRef<str>>(&self, segments: &[S]) -> String {
        segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join("/")
    }
}
