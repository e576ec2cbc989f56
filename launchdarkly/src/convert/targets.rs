//! Individual targets, keyed by the variation they serve.

use super::error::ConvertError;
use super::{string_list, Attrs};
use crate::api::flags::Target;
use std::collections::BTreeMap;
use tfplug::types::Dynamic;

pub const USER_CONTEXT_KIND: &str = "user";

fn is_user(target: &Target) -> bool {
    target
        .context_kind
        .as_deref()
        .map_or(true, |kind| kind == USER_CONTEXT_KIND)
}

/// `targets` blocks always address the `user` context kind.
pub fn targets_from_config(list: &[Dynamic]) -> Result<Vec<Target>, ConvertError> {
    list.iter()
        .map(|item| {
            let attrs = Attrs::new(item);
            Ok(Target {
                values: attrs.strings("values"),
                variation: attrs.index("variation")?.unwrap_or(0),
                context_kind: Some(USER_CONTEXT_KIND.to_string()),
            })
        })
        .collect()
}

pub fn context_targets_from_config(list: &[Dynamic]) -> Result<Vec<Target>, ConvertError> {
    list.iter()
        .map(|item| {
            let attrs = Attrs::new(item);
            let context_kind = attrs.str_or_empty("context_kind");
            if context_kind.is_empty() || context_kind == USER_CONTEXT_KIND {
                return Err(ConvertError::validation(
                    "context_targets require a context_kind other than \"user\"; use targets for user contexts",
                ));
            }
            Ok(Target {
                values: attrs.strings("values"),
                variation: attrs.index("variation")?.unwrap_or(0),
                context_kind: Some(context_kind),
            })
        })
        .collect()
}

/// User targets grouped by variation, ascending.
pub fn targets_to_config(targets: &[Target]) -> Dynamic {
    let mut by_variation: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for target in targets.iter().filter(|t| is_user(t) && !t.values.is_empty()) {
        by_variation
            .entry(target.variation)
            .or_default()
            .extend(target.values.iter().cloned());
    }
    Dynamic::List(
        by_variation
            .into_iter()
            .map(|(variation, values)| {
                Dynamic::object([
                    ("values", string_list(&values)),
                    ("variation", Dynamic::from(variation as i64)),
                ])
            })
            .collect(),
    )
}

/// Non-user targets ordered by variation, then context kind.
pub fn context_targets_to_config(targets: &[Target]) -> Dynamic {
    let mut grouped: BTreeMap<(usize, String), Vec<String>> = BTreeMap::new();
    for target in targets.iter().filter(|t| !is_user(t)) {
        let kind = target.context_kind.clone().unwrap_or_default();
        grouped
            .entry((target.variation, kind))
            .or_default()
            .extend(target.values.iter().cloned());
    }
    Dynamic::List(
        grouped
            .into_iter()
            .map(|((variation, context_kind), values)| {
                Dynamic::object([
                    ("values", string_list(&values)),
                    ("variation", Dynamic::from(variation as i64)),
                    ("context_kind", Dynamic::from(context_kind)),
                ])
            })
            .collect(),
    )
}
