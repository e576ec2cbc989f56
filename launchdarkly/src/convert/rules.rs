//! Targeting rules, rollouts, fallthrough and prerequisites.

use super::clause::{clauses_from_config, clauses_to_config};
use super::error::ConvertError;
use super::Attrs;
use crate::api::flags::{Fallthrough, Prerequisite, Rollout, Rule, WeightedVariation};
use std::collections::BTreeMap;
use tfplug::types::Dynamic;

/// Weights are thousandths of a percent.
pub const MAX_ROLLOUT_WEIGHT: i64 = 100_000;

/// Position in `weights` is the variation index.
pub fn rollout_from_config(weights: &[i64]) -> Rollout {
    Rollout {
        variations: weights
            .iter()
            .enumerate()
            .map(|(variation, &weight)| WeightedVariation { variation, weight })
            .collect(),
        bucket_by: None,
        context_kind: None,
    }
}

/// Weights ordered by variation index, whatever order the API used.
pub fn rollout_weights(rollout: &Rollout) -> Vec<i64> {
    rollout
        .variations
        .iter()
        .map(|wv| (wv.variation, wv.weight))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect()
}

fn validate_weights(weights: &[i64]) -> Result<(), ConvertError> {
    match weights.iter().find(|w| !(0..=MAX_ROLLOUT_WEIGHT).contains(*w)) {
        Some(w) => Err(ConvertError::validation(format!(
            "rollout weight {} must be between 0 and {}",
            w, MAX_ROLLOUT_WEIGHT
        ))),
        None => Ok(()),
    }
}

/// Either a fixed variation or a percentage rollout.
fn serve_from_config(
    attrs: Attrs<'_>,
    context: &str,
) -> Result<(Option<usize>, Option<Rollout>), ConvertError> {
    let weights = attrs.ints("rollout_weights");
    let bucket_by = attrs.non_empty("bucket_by");
    if !weights.is_empty() {
        validate_weights(&weights)?;
        let mut rollout = rollout_from_config(&weights);
        rollout.bucket_by = bucket_by;
        return Ok((None, Some(rollout)));
    }
    if bucket_by.is_some() {
        return Err(ConvertError::validation(format!(
            "{}: cannot use bucket_by argument with variation, only with rollout_weights",
            context
        )));
    }
    Ok((Some(attrs.index("variation")?.unwrap_or(0)), None))
}

fn serve_to_config(variation: Option<usize>, rollout: Option<&Rollout>) -> [(&'static str, Dynamic); 3] {
    match rollout {
        Some(rollout) => [
            ("variation", Dynamic::Null),
            (
                "rollout_weights",
                Dynamic::List(
                    rollout_weights(rollout)
                        .into_iter()
                        .map(Dynamic::from)
                        .collect(),
                ),
            ),
            ("bucket_by", Dynamic::from(rollout.bucket_by.clone())),
        ],
        None => [
            ("variation", Dynamic::from(variation.map(|v| v as i64))),
            ("rollout_weights", Dynamic::List(vec![])),
            ("bucket_by", Dynamic::Null),
        ],
    }
}

pub fn rule_from_config(attrs: Attrs<'_>) -> Result<Rule, ConvertError> {
    let (variation, rollout) = serve_from_config(attrs, "rules")?;
    Ok(Rule {
        id: None,
        variation,
        rollout,
        clauses: clauses_from_config(attrs.list("clauses"))?,
        track_events: false,
        description: attrs.non_empty("description"),
    })
}

pub fn rules_from_config(list: &[Dynamic]) -> Result<Vec<Rule>, ConvertError> {
    list.iter().map(|item| rule_from_config(Attrs::new(item))).collect()
}

pub fn rule_to_config(rule: &Rule) -> Dynamic {
    let mut fields = vec![
        ("clauses", clauses_to_config(&rule.clauses)),
        ("description", Dynamic::from(rule.description.clone())),
    ];
    fields.extend(serve_to_config(rule.variation, rule.rollout.as_ref()));
    Dynamic::object(fields)
}

pub fn rules_to_config(rules: &[Rule]) -> Dynamic {
    Dynamic::List(rules.iter().map(rule_to_config).collect())
}

/// An absent block serves the first variation.
pub fn fallthrough_from_config(block: Option<Attrs<'_>>) -> Result<Fallthrough, ConvertError> {
    let Some(attrs) = block else {
        return Ok(Fallthrough {
            variation: Some(0),
            rollout: None,
        });
    };
    let (variation, rollout) = serve_from_config(attrs, "flag_fallthrough")?;
    Ok(Fallthrough { variation, rollout })
}

pub fn fallthrough_to_config(fallthrough: &Fallthrough) -> Dynamic {
    Dynamic::List(vec![Dynamic::object(serve_to_config(
        fallthrough.variation,
        fallthrough.rollout.as_ref(),
    ))])
}

pub fn prerequisites_from_config(list: &[Dynamic]) -> Result<Vec<Prerequisite>, ConvertError> {
    list.iter()
        .map(|item| {
            let attrs = Attrs::new(item);
            Ok(Prerequisite {
                key: attrs.str_or_empty("flag_key"),
                variation: attrs.index("variation")?.unwrap_or(0),
            })
        })
        .collect()
}

pub fn prerequisites_to_config(prerequisites: &[Prerequisite]) -> Dynamic {
    Dynamic::List(
        prerequisites
            .iter()
            .map(|p| {
                Dynamic::object([
                    ("flag_key", Dynamic::from(p.key.as_str())),
                    ("variation", Dynamic::from(p.variation as i64)),
                ])
            })
            .collect(),
    )
}
