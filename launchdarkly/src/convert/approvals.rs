//! Approval settings block shared by standalone and project environments.

use super::error::ConvertError;
use super::{string_list, Attrs};
use crate::api::common::{patch_remove, patch_replace, PatchOperation};
use crate::api::environments::ApprovalSettings;
use tfplug::types::Dynamic;

pub const MIN_APPROVALS: i64 = 1;
pub const MAX_APPROVALS: i64 = 5;

/// Unset fields take the server defaults. `required` and
/// `required_approval_tags` are mutually exclusive.
pub fn approval_settings_from_config(block: Attrs<'_>) -> Result<ApprovalSettings, ConvertError> {
    let defaults = ApprovalSettings::default();
    let min_num_approvals = block.int("min_num_approvals").unwrap_or(defaults.min_num_approvals);
    if !(MIN_APPROVALS..=MAX_APPROVALS).contains(&min_num_approvals) {
        return Err(ConvertError::validation(format!(
            "min_num_approvals {} must be between {} and {}",
            min_num_approvals, MIN_APPROVALS, MAX_APPROVALS
        )));
    }
    let required = block.bool_or("required", false);
    let required_approval_tags = block.strings("required_approval_tags");
    if required && !required_approval_tags.is_empty() {
        return Err(ConvertError::validation(
            "invalid approval_settings config: required and required_approval_tags cannot be set simultaneously",
        ));
    }
    Ok(ApprovalSettings {
        required,
        can_review_own_request: block.bool_or("can_review_own_request", false),
        min_num_approvals,
        can_apply_declined_changes: block
            .bool_or("can_apply_declined_changes", defaults.can_apply_declined_changes),
        required_approval_tags,
    })
}

pub fn approval_settings_to_config(settings: &ApprovalSettings) -> Dynamic {
    Dynamic::List(vec![Dynamic::object([
        ("required", Dynamic::from(settings.required)),
        ("can_review_own_request", Dynamic::from(settings.can_review_own_request)),
        ("min_num_approvals", Dynamic::from(settings.min_num_approvals)),
        (
            "can_apply_declined_changes",
            Dynamic::from(settings.can_apply_declined_changes),
        ),
        (
            "required_approval_tags",
            string_list(&settings.required_approval_tags),
        ),
    ])])
}

/// Moving from `old` to `new`. Dropping the block lifts the approval
/// requirement and leaves the rest to the server.
pub fn approval_patches(
    old: Option<Attrs<'_>>,
    new: Option<Attrs<'_>>,
) -> Result<Vec<PatchOperation>, ConvertError> {
    let Some(new) = new else {
        return Ok(match old {
            Some(_) => vec![
                patch_remove("/approvalSettings/required"),
                patch_remove("/approvalSettings/requiredApprovalTags"),
            ],
            None => Vec::new(),
        });
    };
    let settings = approval_settings_from_config(new)?;
    Ok(vec![
        patch_replace("/approvalSettings/required", settings.required),
        patch_replace(
            "/approvalSettings/canReviewOwnRequest",
            settings.can_review_own_request,
        ),
        patch_replace("/approvalSettings/minNumApprovals", settings.min_num_approvals),
        patch_replace(
            "/approvalSettings/canApplyDeclinedChanges",
            settings.can_apply_declined_changes,
        ),
        patch_replace(
            "/approvalSettings/requiredApprovalTags",
            &settings.required_approval_tags,
        ),
    ])
}
