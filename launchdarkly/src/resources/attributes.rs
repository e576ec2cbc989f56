//! Schema fragments shared across resources and data sources.

use crate::convert::clause::CLAUSE_OPS;
use crate::convert::policy::EFFECTS;
use crate::convert::value::ValueType;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, Block, BlockBuilder, NestedBlock};
use tfplug::validator::{EachElement, StringOneOfValidator, StringPatternValidator};

pub const KEY_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$";
pub const KEY_DESCRIPTION: &str =
    "must contain only letters, numbers, '.', '-', or '_' and must start with an alphanumeric";
pub const TAG_PATTERN: &str = r"^[a-zA-Z0-9_.-]{1,64}$";

fn strings() -> AttributeType {
    AttributeType::list_of(AttributeType::String)
}

fn string_set() -> AttributeType {
    AttributeType::set_of(AttributeType::String)
}

pub fn key_validator() -> StringPatternValidator {
    StringPatternValidator::new(KEY_PATTERN, KEY_DESCRIPTION)
}

/// Required, immutable key of the object itself or of its parent.
pub fn key(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .force_new()
        .validator(key_validator())
        .build()
}

pub fn id() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("Identifier of this object in state")
        .computed()
        .build()
}

pub fn tags() -> Attribute {
    AttributeBuilder::new("tags", string_set())
        .description("Tags associated with the object")
        .optional()
        .validator(EachElement::new(StringPatternValidator::new(
            TAG_PATTERN,
            "must be 1-64 characters of letters, numbers, '.', '_' or '-'",
        )))
        .build()
}

pub fn optional_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .build()
}

pub fn required_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .build()
}

/// The API always reports booleans, so an unset one takes the remote value.
pub fn optional_bool(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .description(description)
        .optional()
        .computed()
        .build()
}

pub fn optional_number(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Number)
        .description(description)
        .optional()
        .build()
}

pub fn maintainer_id() -> Attribute {
    AttributeBuilder::new("maintainer_id", AttributeType::String)
        .description("ID of the member who maintains this object")
        .optional()
        .computed()
        .build()
}

pub fn computed_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .computed()
        .build()
}

pub fn computed_secret(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .computed()
        .sensitive()
        .build()
}

pub fn string_list(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, strings())
        .description(description)
        .optional()
        .build()
}

pub fn string_set_attr(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, string_set())
        .description(description)
        .optional()
        .build()
}

pub fn policy_statement_block() -> Block {
    BlockBuilder::new()
        .attribute(
            AttributeBuilder::new("effect", AttributeType::String)
                .description("Either `allow` or `deny`")
                .required()
                .validator(StringOneOfValidator::new(EFFECTS))
                .build(),
        )
        .attribute(string_list("resources", "Resource specifiers the statement applies to"))
        .attribute(string_list(
            "not_resources",
            "Resource specifiers the statement does not apply to",
        ))
        .attribute(string_list("actions", "Actions the statement applies to"))
        .attribute(string_list("not_actions", "Actions the statement does not apply to"))
        .build()
}

/// `name` is the block type name, e.g. `statements` or `policy_statements`.
pub fn policy_statements(name: &str) -> NestedBlock {
    NestedBlock::list(name, policy_statement_block())
}

pub fn clause_block() -> Block {
    BlockBuilder::new()
        .attribute(required_string("attribute", "User or context attribute to match"))
        .attribute(
            AttributeBuilder::new("op", AttributeType::String)
                .description("Operator")
                .required()
                .validator(StringOneOfValidator::new(CLAUSE_OPS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("values", strings())
                .description("Values to match, written as strings")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("value_type", AttributeType::String)
                .description("How `values` are typed: `string`, `number` or `boolean`")
                .optional()
                .default_value("string")
                .validator(StringOneOfValidator::new(ValueType::ALL))
                .build(),
        )
        .attribute(optional_bool("negate", "Invert the match"))
        .attribute(optional_string(
            "context_kind",
            "Context kind the attribute belongs to",
        ))
        .build()
}

pub fn clauses() -> NestedBlock {
    NestedBlock::list("clauses", clause_block())
}
