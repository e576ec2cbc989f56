//! Schema types and builders for tfplug
//!
//! Resources, data sources and the provider describe their configuration with
//! a [`Schema`]. Besides describing the shape of a block, a schema can check a
//! configuration against itself: required arguments, attribute validators and
//! nested block cardinality.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;

/// Terraform's type system
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    pub fn list_of(elem: AttributeType) -> Self {
        AttributeType::List(Box::new(elem))
    }

    pub fn set_of(elem: AttributeType) -> Self {
        AttributeType::Set(Box::new(elem))
    }

    pub fn map_of(elem: AttributeType) -> Self {
        AttributeType::Map(Box::new(elem))
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub deprecated: bool,
}

pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// A change to this attribute replaces the remote object
    pub force_new: bool,
    pub deprecated: bool,
    pub default: Option<Dynamic>,
    pub validators: Vec<std::sync::Arc<dyn Validator>>,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("force_new", &self.force_new)
            .field("default", &self.default)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl Clone for Attribute {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            r#type: self.r#type.clone(),
            description: self.description.clone(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            force_new: self.force_new,
            deprecated: self.deprecated,
            default: self.default.clone(),
            validators: self.validators.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: usize,
    /// Zero means unbounded
    pub max_items: usize,
    pub force_new: bool,
}

impl NestedBlock {
    pub fn list(type_name: &str, block: Block) -> Self {
        Self {
            type_name: type_name.to_string(),
            block,
            nesting: NestingMode::List,
            min_items: 0,
            max_items: 0,
            force_new: false,
        }
    }

    pub fn set(type_name: &str, block: Block) -> Self {
        Self {
            nesting: NestingMode::Set,
            ..Self::list(type_name, block)
        }
    }

    /// A list block limited to one element.
    pub fn single(type_name: &str, block: Block) -> Self {
        Self {
            max_items: 1,
            ..Self::list(type_name, block)
        }
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = min;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingMode {
    List,
    Set,
}

/// Attribute-level validation run against configuration before any apply.
pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

#[derive(Default)]
pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

impl Schema {
    /// Checks `config` against the schema and returns every problem found.
    pub fn validate_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.block
            .validate(&config.value, &AttributePath::root(), &mut diagnostics);
        tracing::trace!(diagnostics = diagnostics.len(), "validated configuration");
        diagnostics
    }

    /// Paths of force-new attributes and blocks whose value differs between
    /// `prior` and `planned`.
    pub fn requires_replace(
        &self,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Vec<AttributePath> {
        let mut paths = Vec::new();
        if prior.is_null() {
            return paths;
        }
        for attr in self.block.attributes.iter().filter(|a| a.force_new) {
            let before = prior.value.get(&attr.name).unwrap_or(&Dynamic::Null);
            let after = planned.value.get(&attr.name).unwrap_or(&Dynamic::Null);
            if after.is_unknown() && attr.computed {
                continue;
            }
            if before != after {
                paths.push(AttributePath::new(&attr.name));
            }
        }
        for nested in self.block.block_types.iter().filter(|b| b.force_new) {
            if prior.value.get(&nested.type_name) != planned.value.get(&nested.type_name) {
                paths.push(AttributePath::new(&nested.type_name));
            }
        }
        paths
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }
}

impl Block {
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if value.is_unknown() {
            return;
        }
        let empty = HashMap::new();
        let fields = value.as_map().unwrap_or(&empty);

        for attr in &self.attributes {
            let attr_path = path.clone().attribute(&attr.name);
            let attr_value = fields.get(&attr.name).unwrap_or(&Dynamic::Null);

            if attr_value.is_null() {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("The argument \"{}\" is required, but no definition was found.", attr_path),
                        )
                        .with_attribute(attr_path),
                    );
                }
                continue;
            }
            if attr_value.is_unknown() {
                continue;
            }
            if attr.computed && !attr.optional && !attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Value for unconfigurable attribute",
                        format!("Can't configure a value for \"{}\": its value will be decided automatically.", attr_path),
                    )
                    .with_attribute(attr_path),
                );
                continue;
            }

            for validator in &attr.validators {
                let response = validator.validate(ValidatorRequest {
                    config_value: DynamicValue::new(attr_value.clone()),
                    path: attr_path.clone(),
                });
                diagnostics.extend(response.diagnostics);
            }
        }

        for nested in &self.block_types {
            let nested_path = path.clone().attribute(&nested.type_name);
            let items = match fields.get(&nested.type_name) {
                None | Some(Dynamic::Null) => &[][..],
                Some(Dynamic::List(items)) => items.as_slice(),
                Some(Dynamic::Unknown) => continue,
                Some(other) => {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid block",
                            format!("expected a list of blocks, got {}", other.type_name()),
                        )
                        .with_attribute(nested_path),
                    );
                    continue;
                }
            };

            if items.len() < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(
                        "Insufficient blocks",
                        format!(
                            "At least {} \"{}\" blocks are required.",
                            nested.min_items, nested.type_name
                        ),
                    )
                    .with_attribute(nested_path.clone()),
                );
            }
            if nested.max_items > 0 && items.len() > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(
                        "Too many blocks",
                        format!(
                            "No more than {} \"{}\" blocks are allowed.",
                            nested.max_items, nested.type_name
                        ),
                    )
                    .with_attribute(nested_path.clone()),
                );
            }

            for (i, item) in items.iter().enumerate() {
                nested
                    .block
                    .validate(item, &nested_path.clone().index(i as i64), diagnostics);
            }
        }
    }
}

/// Fluent construction of [`Attribute`]s
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                force_new: false,
                deprecated: false,
                default: None,
                validators: Vec::new(),
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.attribute.force_new = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    /// Value used when the attribute is left unset. Implies optional + computed.
    pub fn default_value(mut self, value: impl Into<Dynamic>) -> Self {
        self.attribute.default = Some(value.into());
        self.attribute.optional = true;
        self.attribute.computed = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(std::sync::Arc::new(validator));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// Fluent construction of [`Block`]s, shared by schemas and nested blocks
#[derive(Default)]
pub struct BlockBuilder {
    block: Block,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.block.description = desc.to_string();
        self
    }

    pub fn build(self) -> Block {
        self.block
    }
}

pub struct SchemaBuilder {
    version: i64,
    block: BlockBuilder,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            version: 0,
            block: BlockBuilder::new(),
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.block = self.block.attribute(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.block = self.block.block(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.block = self.block.description(desc);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            version: self.version,
            block: self.block.build(),
        }
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::NumberRangeValidator;

    fn flag_like_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("key", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(
                NestedBlock::list(
                    "rules",
                    BlockBuilder::new()
                        .attribute(
                            AttributeBuilder::new("variation", AttributeType::Number)
                                .optional()
                                .validator(NumberRangeValidator::new(Some(0.0), None))
                                .build(),
                        )
                        .build(),
                )
                .max_items(2),
            )
            .build()
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(attr.required);
        assert!(!attr.optional);
    }

    #[test]
    fn default_value_makes_attribute_optional_and_computed() {
        let attr = AttributeBuilder::new("base_permissions", AttributeType::String)
            .default_value("reader")
            .build();

        assert!(attr.optional && attr.computed);
        assert_eq!(attr.default, Some(Dynamic::from("reader")));
    }

    #[test]
    fn missing_required_argument_is_reported() {
        let schema = flag_like_schema();
        let diags = schema.validate_config(&DynamicValue::empty_object());

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing required argument");
        assert_eq!(diags[0].attribute, Some(AttributePath::new("key")));
    }

    #[test]
    fn nested_validators_and_cardinality() {
        let schema = flag_like_schema();
        let rule = |v: f64| Dynamic::object([("variation", Dynamic::Number(v))]);
        let config = DynamicValue::new(Dynamic::object([
            ("key", Dynamic::from("flag")),
            ("rules", Dynamic::List(vec![rule(0.0), rule(-1.0), rule(1.0)])),
        ]));

        let diags = schema.validate_config(&config);
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();

        assert!(summaries.contains(&"Too many blocks"));
        assert!(diags
            .iter()
            .any(|d| d.attribute == Some(AttributePath::new("rules").index(1).attribute("variation"))));
    }

    #[test]
    fn computed_only_attribute_cannot_be_configured() {
        let schema = flag_like_schema();
        let config = DynamicValue::new(Dynamic::object([
            ("key", Dynamic::from("flag")),
            ("id", Dynamic::from("p/flag")),
        ]));

        let diags = schema.validate_config(&config);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Value for unconfigurable attribute");
    }

    #[test]
    fn requires_replace_tracks_force_new_changes() {
        let schema = flag_like_schema();
        let prior = DynamicValue::new(Dynamic::object([("key", Dynamic::from("a"))]));
        let same = prior.clone();
        let changed = DynamicValue::new(Dynamic::object([("key", Dynamic::from("b"))]));

        assert!(schema.requires_replace(&prior, &same).is_empty());
        assert_eq!(
            schema.requires_replace(&prior, &changed),
            vec![AttributePath::new("key")]
        );
        assert!(schema
            .requires_replace(&DynamicValue::null(), &changed)
            .is_empty());
    }
}
