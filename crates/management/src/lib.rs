//! GRC management backend: onboarding, scope derivation, risks, controls,
//! assessments and evidence, governance policies, audits, workflows and
//! dashboards for every tenant.
//!
//! Provides REST API endpoints for the management UI.
//! Data stored in DashMap; swap to PostgreSQL for production.

pub mod assessments;
pub mod audits;
pub mod auth;
pub mod controls;
pub mod dashboard;
pub mod enforcement;
pub mod handlers;
pub mod models;
pub mod onboarding;
pub mod policies;
pub mod risks;
pub mod router;
pub mod routing;
pub mod rules;
pub mod store;
pub mod workflows;

pub use enforcement::{CallerContext, PolicyGate};
pub use handlers::ManagementState;
pub use router::management_router;
pub use rules::RulesEngine;
pub use store::ManagementStore;
pub use workflows::WorkflowEngine;
