//! SaaS platform capabilities: multi-tenancy, permission catalog, RBAC,
//! session authentication, tamper-evident audit trail, and policy enforcement.

pub mod audit;
pub mod auth;
pub mod permissions;
pub mod policy;
pub mod rbac;
pub mod tenancy;

pub use audit::AuditLogger;
pub use auth::AuthManager;
pub use policy::PolicyEnforcer;
pub use rbac::RbacEngine;
pub use tenancy::TenantManager;
