//! Translation between Terraform configuration values and API payloads.
//!
//! Every converter is pure: configuration goes in as [`Dynamic`], API
//! structs come out (and back). Nothing here touches the network.

pub mod approvals;
pub mod clause;
pub mod custom_properties;
pub mod destinations;
pub mod environments;
pub mod error;
pub mod ids;
pub mod integration_config;
pub mod policy;
pub mod rules;
pub mod targets;
pub mod value;
pub mod variations;

pub use error::ConvertError;

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tfplug::types::{Dynamic, DynamicValue};

static NULL: Dynamic = Dynamic::Null;

/// Read-only view over an object-shaped configuration value.
///
/// Missing, null and unknown attributes all read as "not set".
#[derive(Debug, Clone, Copy)]
pub struct Attrs<'a> {
    value: &'a Dynamic,
}

impl<'a> Attrs<'a> {
    pub fn new(value: &'a Dynamic) -> Self {
        Self { value }
    }

    pub fn of(value: &'a DynamicValue) -> Self {
        Self::new(&value.value)
    }

    pub fn raw(&self) -> &'a Dynamic {
        self.value
    }

    pub fn get(&self, name: &str) -> &'a Dynamic {
        self.value.get(name).unwrap_or(&NULL)
    }

    /// Present at all, null included. Import seeds carry only their keys.
    pub fn has(&self, name: &str) -> bool {
        self.value.get(name).is_some()
    }

    pub fn is_set(&self, name: &str) -> bool {
        let value = self.get(name);
        value.is_known() && !value.is_null()
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).as_str().map(str::to_string)
    }

    /// Empty strings count as unset.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.string(name).filter(|s| !s.is_empty())
    }

    pub fn str_or_empty(&self, name: &str) -> String {
        self.string(name).unwrap_or_default()
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).as_bool()
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.bool(name).unwrap_or(default)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).as_number().filter(|n| n.is_finite())
    }

    /// Fractional parts are truncated.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.number(name).map(|n| n.trunc() as i64)
    }

    /// Variation indexes and other non-negative positions.
    pub fn index(&self, name: &str) -> Result<Option<usize>, ConvertError> {
        match self.int(name) {
            None => Ok(None),
            Some(n) if n < 0 => Err(ConvertError::validation(format!(
                "{} must be a non-negative integer, got {}",
                name, n
            ))),
            Some(n) => Ok(Some(n as usize)),
        }
    }

    pub fn list(&self, name: &str) -> &'a [Dynamic] {
        self.get(name).as_list().unwrap_or(&[])
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        self.list(name)
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    pub fn ints(&self, name: &str) -> Vec<i64> {
        self.list(name)
            .iter()
            .filter_map(Dynamic::as_number)
            .map(|n| n.trunc() as i64)
            .collect()
    }

    pub fn blocks(&self, name: &str) -> Vec<Attrs<'a>> {
        self.list(name).iter().map(Attrs::new).collect()
    }

    /// Single nested block, stored either as an object or a one-element list.
    pub fn block(&self, name: &str) -> Option<Attrs<'a>> {
        let value = self.get(name);
        match value {
            Dynamic::Map(_) => Some(Attrs::new(value)),
            Dynamic::List(items) => items.first().filter(|v| !v.is_null()).map(Attrs::new),
            _ => None,
        }
    }

    pub fn string_map(&self, name: &str) -> BTreeMap<String, String> {
        self.get(name)
            .as_map()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Stable hash of a set element identified by a single key.
pub fn key_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

pub fn string_list(items: &[String]) -> Dynamic {
    Dynamic::string_list(items.iter().cloned())
}
