//! Environment blocks nested in projects, and the standalone environment.

use super::approvals::{approval_patches, approval_settings_to_config};
use super::error::ConvertError;
use super::{key_hash, string_list, Attrs};
use crate::api::common::{patch_replace, PatchOperation};
use crate::api::environments::{Environment, EnvironmentPost};
use std::collections::HashSet;
use tfplug::types::Dynamic;

pub const MAX_DEFAULT_TTL: i64 = 60;

/// Minutes; fractional input is truncated.
pub fn default_ttl(attrs: Attrs<'_>) -> Result<Option<i64>, ConvertError> {
    match attrs.int("default_ttl") {
        Some(ttl) if !(0..=MAX_DEFAULT_TTL).contains(&ttl) => Err(ConvertError::validation(
            format!(
                "default_ttl {} must be between 0 and {}",
                ttl, MAX_DEFAULT_TTL
            ),
        )),
        ttl => Ok(ttl),
    }
}

/// Creation body: identity and TTL. Everything else goes through
/// [`environment_patches`].
pub fn environment_post(attrs: Attrs<'_>) -> Result<EnvironmentPost, ConvertError> {
    Ok(EnvironmentPost {
        key: attrs.str_or_empty("key"),
        name: attrs.str_or_empty("name"),
        color: attrs.str_or_empty("color"),
        default_ttl: default_ttl(attrs)?,
        ..Default::default()
    })
}

pub fn environment_posts(list: &[Dynamic]) -> Result<Vec<EnvironmentPost>, ConvertError> {
    list.iter().map(|item| environment_post(Attrs::new(item))).collect()
}

/// Name and color are always replaced; the rest only when configured.
/// `prior` is the environment as last applied, if it was.
pub fn environment_patches(
    attrs: Attrs<'_>,
    prior: Option<Attrs<'_>>,
) -> Result<Vec<PatchOperation>, ConvertError> {
    let mut patches = vec![
        patch_replace("/name", attrs.str_or_empty("name")),
        patch_replace("/color", attrs.str_or_empty("color")),
    ];
    if let Some(ttl) = default_ttl(attrs)? {
        patches.push(patch_replace("/defaultTtl", ttl));
    }
    for (name, path) in [
        ("secure_mode", "/secureMode"),
        ("default_track_events", "/defaultTrackEvents"),
        ("require_comments", "/requireComments"),
        ("confirm_changes", "/confirmChanges"),
    ] {
        if let Some(flag) = attrs.bool(name) {
            patches.push(patch_replace(path, flag));
        }
    }
    if attrs.is_set("tags") {
        patches.push(patch_replace("/tags", attrs.strings("tags")));
    }
    patches.extend(approval_patches(
        prior.and_then(|p| p.block("approval_settings")),
        attrs.block("approval_settings"),
    )?);
    Ok(patches)
}

/// Set identity of an environment block is its key alone.
pub fn environment_hash(item: &Dynamic) -> u64 {
    key_hash(Attrs::new(item).string("key").as_deref().unwrap_or_default())
}

pub fn environment_identities(list: &[Dynamic]) -> HashSet<u64> {
    list.iter().map(environment_hash).collect()
}

/// Approval settings are reported when there is no `prior` to compare
/// with, or when `prior` declared them.
pub fn environment_to_config(env: &Environment, prior: Option<Attrs<'_>>) -> Dynamic {
    let approvals = match &env.approval_settings {
        Some(settings) if prior.map_or(true, |p| p.block("approval_settings").is_some()) => {
            approval_settings_to_config(settings)
        }
        _ => Dynamic::List(vec![]),
    };
    Dynamic::object([
        ("key", Dynamic::from(env.key.as_str())),
        ("name", Dynamic::from(env.name.as_str())),
        ("color", Dynamic::from(env.color.as_str())),
        ("default_ttl", Dynamic::from(env.default_ttl)),
        ("secure_mode", Dynamic::from(env.secure_mode)),
        ("default_track_events", Dynamic::from(env.default_track_events)),
        ("require_comments", Dynamic::from(env.require_comments)),
        ("confirm_changes", Dynamic::from(env.confirm_changes)),
        ("tags", string_list(&env.tags)),
        ("api_key", Dynamic::from(env.api_key.as_str())),
        ("mobile_key", Dynamic::from(env.mob_key.as_str())),
        ("client_side_id", Dynamic::from(env.id.as_str())),
        ("approval_settings", approvals),
    ])
}

/// The block in `list` whose key is `key`.
pub fn find_environment<'a>(list: &'a [Dynamic], key: &str) -> Option<Attrs<'a>> {
    list.iter()
        .map(Attrs::new)
        .find(|env| env.string("key").as_deref() == Some(key))
}

/// Environments declared in `prior` come first in that order; any others
/// follow sorted by key.
pub fn environments_to_config(envs: &[Environment], prior: &[Dynamic]) -> Dynamic {
    let configured = configured_keys(prior);
    let mut ordered: Vec<&Environment> = configured
        .iter()
        .filter_map(|key| envs.iter().find(|e| &e.key == key))
        .collect();
    let mut extras: Vec<&Environment> = envs
        .iter()
        .filter(|e| !configured.contains(&e.key))
        .collect();
    extras.sort_by(|a, b| a.key.cmp(&b.key));
    ordered.extend(extras);
    Dynamic::List(
        ordered
            .into_iter()
            .map(|env| environment_to_config(env, find_environment(prior, &env.key)))
            .collect(),
    )
}

pub fn configured_keys(list: &[Dynamic]) -> Vec<String> {
    list.iter()
        .filter_map(|item| Attrs::new(item).string("key"))
        .collect()
}
