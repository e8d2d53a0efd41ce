//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GRC Platform API",
        version = "0.1.0",
        description = "Multi-tenant governance, risk and compliance platform.\n\nTenant onboarding, regulatory scope derivation, risk/control/assessment/evidence management, governance policies, audits and workflow orchestration. Management endpoints live under `/api/v1` and require a bearer token from `POST /api/v1/auth/login`.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Operations", description = "Health, readiness, and liveness probes"),
        (name = "Onboarding", description = "Organization profile and asset inventory that drive scope derivation"),
    ),
    paths(
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        crate::rest::HealthResponse,
        crate::rest::ReadinessResponse,
        grc_core::types::OrganizationProfile,
        grc_core::types::Asset,
        grc_core::types::AssetCriticality,
        grc_core::types::DataClassification,
    ))
)]
pub struct ApiDoc;
