use super::error::ConvertError;
use super::value::{self, ValueType};
use super::{string_list, Attrs};
use crate::api::flags::Clause;
use tfplug::types::Dynamic;

pub const CLAUSE_OPS: [&str; 15] = [
    "in",
    "endsWith",
    "startsWith",
    "matches",
    "contains",
    "lessThan",
    "lessThanOrEqual",
    "greaterThan",
    "greaterThanOrEqual",
    "before",
    "after",
    "segmentMatch",
    "semVerEqual",
    "semVerLessThan",
    "semVerGreaterThan",
];

/// A targeting clause as written in configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClauseConfig {
    pub attribute: String,
    pub op: String,
    pub values: Vec<String>,
    pub value_type: ValueType,
    pub negate: bool,
    pub context_kind: Option<String>,
}

impl ClauseConfig {
    pub fn from_attrs(attrs: Attrs<'_>) -> Result<Self, ConvertError> {
        let value_type = match attrs.non_empty("value_type") {
            Some(raw) => ValueType::parse(&raw)?,
            None => ValueType::String,
        };
        let op = attrs.str_or_empty("op");
        if !CLAUSE_OPS.contains(&op.as_str()) {
            return Err(ConvertError::validation(format!(
                "{} is an invalid value for Clause argument Op",
                op
            )));
        }
        Ok(Self {
            attribute: attrs.str_or_empty("attribute"),
            op,
            values: attrs.strings("values"),
            value_type,
            negate: attrs.bool_or("negate", false),
            context_kind: attrs.non_empty("context_kind"),
        })
    }

    pub fn to_dynamic(&self) -> Dynamic {
        Dynamic::object([
            ("attribute", Dynamic::from(self.attribute.as_str())),
            ("op", Dynamic::from(self.op.as_str())),
            ("values", string_list(&self.values)),
            ("value_type", Dynamic::from(self.value_type.as_str())),
            ("negate", Dynamic::from(self.negate)),
            ("context_kind", Dynamic::from(self.context_kind.clone())),
        ])
    }

    pub fn to_api(&self) -> Result<Clause, ConvertError> {
        let values = self
            .values
            .iter()
            .map(|raw| value::decode(raw, self.value_type))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Clause {
            attribute: self.attribute.clone(),
            op: self.op.clone(),
            values,
            negate: self.negate,
            context_kind: self.context_kind.clone(),
        })
    }

    /// The value type is inferred from the values themselves; an empty
    /// list reads back as `string`.
    pub fn from_api(clause: &Clause) -> Self {
        let value_type = clause
            .values
            .last()
            .map(ValueType::of)
            .unwrap_or_default();
        Self {
            attribute: clause.attribute.clone(),
            op: clause.op.clone(),
            values: clause.values.iter().map(value::encode).collect(),
            value_type,
            negate: clause.negate,
            context_kind: clause.context_kind.clone(),
        }
    }
}

pub fn clauses_from_config(list: &[Dynamic]) -> Result<Vec<Clause>, ConvertError> {
    list.iter()
        .map(|item| ClauseConfig::from_attrs(Attrs::new(item))?.to_api())
        .collect()
}

pub fn clauses_to_config(clauses: &[Clause]) -> Dynamic {
    Dynamic::List(
        clauses
            .iter()
            .map(|c| ClauseConfig::from_api(c).to_dynamic())
            .collect(),
    )
}
