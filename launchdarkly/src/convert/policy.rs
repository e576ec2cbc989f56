//! Policy statements for custom roles, webhooks and audit log subscriptions.

use super::error::ConvertError;
use super::{string_list, Attrs};
use crate::api::common::Statement;
use tfplug::types::Dynamic;

pub const EFFECTS: [&str; 2] = ["allow", "deny"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyStatement {
    pub effect: String,
    pub resources: Vec<String>,
    pub not_resources: Vec<String>,
    pub actions: Vec<String>,
    pub not_actions: Vec<String>,
}

impl PolicyStatement {
    pub fn from_attrs(attrs: Attrs<'_>) -> Self {
        Self {
            effect: attrs.str_or_empty("effect"),
            resources: attrs.strings("resources"),
            not_resources: attrs.strings("not_resources"),
            actions: attrs.strings("actions"),
            not_actions: attrs.strings("not_actions"),
        }
    }

    /// Exactly one of each exclusive pair must be non-empty.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !EFFECTS.contains(&self.effect.as_str()) {
            return Err(ConvertError::validation(format!(
                "policy statement effect must be one of {:?}, got {:?}",
                EFFECTS, self.effect
            )));
        }
        exclusive_pair(&self.resources, &self.not_resources, "resources")?;
        exclusive_pair(&self.actions, &self.not_actions, "actions")
    }

    pub fn to_api(&self) -> Result<Statement, ConvertError> {
        self.validate()?;
        Ok(Statement {
            effect: self.effect.clone(),
            resources: non_empty(&self.resources),
            not_resources: non_empty(&self.not_resources),
            actions: non_empty(&self.actions),
            not_actions: non_empty(&self.not_actions),
        })
    }

    pub fn from_api(statement: &Statement) -> Self {
        let list = |v: &Option<Vec<String>>| v.clone().unwrap_or_default();
        Self {
            effect: statement.effect.clone(),
            resources: list(&statement.resources),
            not_resources: list(&statement.not_resources),
            actions: list(&statement.actions),
            not_actions: list(&statement.not_actions),
        }
    }

    /// Empty lists are left null rather than written as `[]`.
    pub fn to_dynamic(&self) -> Dynamic {
        let list = |v: &Vec<String>| {
            if v.is_empty() {
                Dynamic::Null
            } else {
                string_list(v)
            }
        };
        Dynamic::object([
            ("effect", Dynamic::from(self.effect.as_str())),
            ("resources", list(&self.resources)),
            ("not_resources", list(&self.not_resources)),
            ("actions", list(&self.actions)),
            ("not_actions", list(&self.not_actions)),
        ])
    }
}

fn exclusive_pair(positive: &[String], negative: &[String], name: &str) -> Result<(), ConvertError> {
    match (positive.is_empty(), negative.is_empty()) {
        (false, false) => Err(ConvertError::validation(format!(
            "policy statements cannot contain both '{0}' and 'not_{0}'",
            name
        ))),
        (true, true) => Err(ConvertError::validation(format!(
            "policy statements must contain either '{0}' or 'not_{0}'",
            name
        ))),
        _ => Ok(()),
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

pub fn statements_from_config(list: &[Dynamic]) -> Result<Vec<Statement>, ConvertError> {
    list.iter()
        .map(|item| PolicyStatement::from_attrs(Attrs::new(item)).to_api())
        .collect()
}

pub fn statements_to_config(statements: &[Statement]) -> Dynamic {
    Dynamic::List(
        statements
            .iter()
            .map(|s| PolicyStatement::from_api(s).to_dynamic())
            .collect(),
    )
}
