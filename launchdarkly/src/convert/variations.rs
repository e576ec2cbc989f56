//! Flag variations, their declared type and the default on/off pair.

use super::error::ConvertError;
use super::value::{self, ValueType};
use super::Attrs;
use crate::api::common::{patch_add, patch_remove, patch_replace, PatchOperation};
use crate::api::flags::{Defaults, Variation};
use serde_json::Value;
use std::fmt;
use tfplug::types::Dynamic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariationType {
    #[default]
    Boolean,
    String,
    Number,
    Json,
}

impl VariationType {
    pub const ALL: [&'static str; 4] = ["boolean", "string", "number", "json"];

    pub fn parse(s: &str) -> Result<Self, ConvertError> {
        match s {
            "boolean" => Ok(VariationType::Boolean),
            "string" => Ok(VariationType::String),
            "number" => Ok(VariationType::Number),
            "json" => Ok(VariationType::Json),
            other => Err(ConvertError::validation(format!(
                "\"variation_type\" contains an invalid value {:?}. Valid values are `boolean`, `string`, `number`, and `json`",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariationType::Boolean => "boolean",
            VariationType::String => "string",
            VariationType::Number => "number",
            VariationType::Json => "json",
        }
    }

    /// Declared type of a flag read back from the API, judged by its first
    /// variation.
    pub fn infer(variations: &[Variation]) -> Self {
        match variations.first().map(|v| &v.value) {
            Some(Value::Bool(_)) | None => VariationType::Boolean,
            Some(Value::String(_)) => VariationType::String,
            Some(Value::Number(_)) => VariationType::Number,
            Some(_) => VariationType::Json,
        }
    }
}

impl fmt::Display for VariationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn boolean_pair() -> Vec<Variation> {
    [true, false]
        .into_iter()
        .map(|b| Variation {
            value: Value::Bool(b),
            ..Default::default()
        })
        .collect()
}

fn parse_value(raw: &str, variation_type: VariationType) -> Result<Value, ConvertError> {
    match variation_type {
        VariationType::Boolean => value::decode(raw, ValueType::Bool),
        VariationType::String => Ok(Value::String(raw.to_string())),
        VariationType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(value::number_value)
            .ok_or_else(|| {
                ConvertError::validation(format!(
                    "{:?} is an invalid number variation value. expected a finite number",
                    raw
                ))
            }),
        VariationType::Json => serde_json::from_str(raw).map_err(|e| {
            ConvertError::validation(format!(
                "{:?} is an invalid json variation value. {}",
                raw, e
            ))
        }),
    }
}

/// A boolean flag with no configured variations gets `[true, false]`.
pub fn variations_from_config(
    list: &[Dynamic],
    variation_type: VariationType,
) -> Result<Vec<Variation>, ConvertError> {
    if variation_type == VariationType::Boolean && list.is_empty() {
        return Ok(boolean_pair());
    }
    if variation_type != VariationType::Boolean && list.len() < 2 {
        return Err(ConvertError::validation(
            "multivariate flags must have at least two variations defined",
        ));
    }
    list.iter()
        .map(|item| {
            let attrs = Attrs::new(item);
            Ok(Variation {
                id: None,
                value: parse_value(&attrs.str_or_empty("value"), variation_type)?,
                name: attrs.non_empty("name"),
                description: attrs.non_empty("description"),
            })
        })
        .collect()
}

/// JSON values are re-serialized compactly so formatting differences in
/// configuration never show up as drift.
pub fn variation_value_to_string(value: &Value, variation_type: VariationType) -> String {
    match variation_type {
        VariationType::Json => value.to_string(),
        _ => value::encode(value),
    }
}

pub fn variations_to_config(variations: &[Variation], variation_type: VariationType) -> Dynamic {
    Dynamic::List(
        variations
            .iter()
            .map(|v| {
                Dynamic::object([
                    (
                        "value",
                        Dynamic::from(variation_value_to_string(&v.value, variation_type)),
                    ),
                    ("name", Dynamic::from(v.name.clone())),
                    ("description", Dynamic::from(v.description.clone())),
                ])
            })
            .collect(),
    )
}

/// Boolean flags default to (0, 1); others to (0, last).
pub fn resolve_defaults(
    variations: &[Variation],
    variation_type: VariationType,
    explicit: Option<(i64, i64)>,
) -> Result<Defaults, ConvertError> {
    let count = if variation_type == VariationType::Boolean {
        variations.len().max(2)
    } else {
        variations.len()
    };
    let max = count.saturating_sub(1) as i64;
    let (on, off) = explicit.unwrap_or((0, max));
    for (field, index) in [("on_variation", on), ("off_variation", off)] {
        if index < 0 || index > max {
            return Err(ConvertError::OutOfRange {
                field: field.to_string(),
                value: index,
                max,
            });
        }
    }
    Ok(Defaults {
        on_variation: on as usize,
        off_variation: off as usize,
    })
}

pub fn defaults_from_config(attrs: Attrs<'_>) -> Result<Option<(i64, i64)>, ConvertError> {
    let Some(block) = attrs.block("defaults") else {
        return Ok(None);
    };
    match (block.int("on_variation"), block.int("off_variation")) {
        (Some(on), Some(off)) => Ok(Some((on, off))),
        (None, None) => Ok(None),
        _ => Err(ConvertError::validation(
            "defaults require both on_variation and off_variation",
        )),
    }
}

pub fn defaults_to_config(defaults: &Defaults) -> Dynamic {
    Dynamic::List(vec![Dynamic::object([
        ("on_variation", Dynamic::from(defaults.on_variation as i64)),
        ("off_variation", Dynamic::from(defaults.off_variation as i64)),
    ])])
}

/// Positional patch set turning `old` into `new`. Removals run from the
/// highest index down so earlier removals never shift later ones.
pub fn variation_patches(old: &[Variation], new: &[Variation]) -> Vec<PatchOperation> {
    if old.is_empty() {
        return Vec::new();
    }
    let mut patches: Vec<PatchOperation> = (new.len()..old.len())
        .rev()
        .map(|idx| patch_remove(format!("/variations/{}", idx)))
        .collect();
    for (idx, variation) in new.iter().enumerate() {
        if idx < old.len() {
            patches.push(patch_replace(format!("/variations/{}/value", idx), &variation.value));
            patches.push(patch_replace(format!("/variations/{}/name", idx), &variation.name));
            patches.push(patch_replace(
                format!("/variations/{}/description", idx),
                &variation.description,
            ));
        } else {
            patches.push(patch_add(format!("/variations/{}", idx), variation));
        }
    }
    patches
}
