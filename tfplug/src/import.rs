//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Copies the import ID verbatim into `attr_path`.
///
/// Example: ID "my-role" -> state.key = "my-role"
pub fn import_state_passthrough_id(
    ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    import_state_with_attributes(ctx, vec![(attr_path, request.id.clone())], request, response);
}

/// Seeds several attributes parsed from a composite import ID. The raw ID is
/// always stored as `id`.
pub fn import_state_with_attributes(
    _ctx: &Context,
    attributes: Vec<(AttributePath, String)>,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::empty_object();

    let id_path = AttributePath::new("id");
    let seeded = std::iter::once((id_path, request.id.clone())).chain(attributes);
    for (path, value) in seeded {
        if let Err(e) = state.set_string(&path, value) {
            response.diagnostics.push(
                Diagnostic::error(
                    "Failed to set import ID",
                    format!("could not seed {} from import ID {:?}: {}", path, request.id, e),
                )
                .with_attribute(path),
            );
            return;
        }
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> ImportResourceStateRequest {
        ImportResourceStateRequest {
            type_name: "launchdarkly_custom_role".to_string(),
            id: id.to_string(),
        }
    }

    #[test]
    fn passthrough_sets_attribute_and_id() {
        let ctx = Context::new();
        let mut response = ImportResourceStateResponse::default();

        import_state_passthrough_id(&ctx, AttributePath::new("key"), &request("admin"), &mut response);

        assert!(response.diagnostics.is_empty());
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("key")).unwrap(), "admin");
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "admin");
    }

    #[test]
    fn composite_attributes_are_seeded() {
        let ctx = Context::new();
        let mut response = ImportResourceStateResponse::default();

        import_state_with_attributes(
            &ctx,
            vec![
                (AttributePath::new("project_key"), "p".to_string()),
                (AttributePath::new("key"), "f".to_string()),
            ],
            &request("p/f"),
            &mut response,
        );

        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("project_key")).unwrap(), "p");
        assert_eq!(state.get_string(&AttributePath::new("key")).unwrap(), "f");
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "p/f");
    }
}
