use super::{key_hash, string_list, Attrs};
use crate::api::flags::CustomProperty;
use std::collections::BTreeMap;
use tfplug::types::Dynamic;

pub const MAX_CUSTOM_PROPERTIES: usize = 64;
pub const MAX_CUSTOM_PROPERTY_VALUES: usize = 64;

/// Values are sorted so the set compares stably.
pub fn custom_properties_from_config(list: &[Dynamic]) -> BTreeMap<String, CustomProperty> {
    list.iter()
        .map(|item| {
            let attrs = Attrs::new(item);
            let mut value = attrs.strings("value");
            value.sort();
            (
                attrs.str_or_empty("key"),
                CustomProperty {
                    name: attrs.str_or_empty("name"),
                    value,
                },
            )
        })
        .collect()
}

pub fn custom_properties_to_config(properties: &BTreeMap<String, CustomProperty>) -> Dynamic {
    Dynamic::List(
        properties
            .iter()
            .map(|(key, property)| {
                Dynamic::object([
                    ("key", Dynamic::from(key.as_str())),
                    ("name", Dynamic::from(property.name.as_str())),
                    ("value", string_list(&property.value)),
                ])
            })
            .collect(),
    )
}

pub fn custom_property_hash(item: &Dynamic) -> u64 {
    key_hash(Attrs::new(item).string("key").as_deref().unwrap_or_default())
}
