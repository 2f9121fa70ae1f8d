//! OpenAPI documentation for the storage routes.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Medvault Storage Gateway",
        version = "0.1.0",
        description = "Upload targets and authenticated downloads for clinical files"
    ),
    paths(
        handlers::uploads::issue_upload_target,
        handlers::objects::download_object,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::uploads::UploadTargetResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "uploads", description = "Time-boxed upload capabilities"),
        (name = "objects", description = "Download proxy for stored objects")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_both_storage_routes() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/uploads"));
        assert!(spec.paths.paths.contains_key("/api/objects/{key}"));
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
