//! GRC permission catalog. Every permission is a `Grc.{Module}.{Action}` string.

pub const GROUP_NAME: &str = "Grc";

macro_rules! permission_module {
    ($module:ident, $name:literal, [$($const:ident => $action:literal),* $(,)?]) => {
        pub mod $module {
            pub const DEFAULT: &str = concat!("Grc.", $name);
            $(pub const $const: &str = concat!("Grc.", $name, ".", $action);)*

            /// Every permission in this module, including the module default.
            pub const ALL: &[&str] = &[DEFAULT, $($const),*];
        }
    };
}

permission_module!(home, "Home", []);
permission_module!(dashboard, "Dashboard", [
    EXECUTIVE => "Executive",
    OPERATIONS => "Operations",
    SECURITY => "Security",
]);
permission_module!(admin, "Admin", [
    ACCESS => "Access",
    USERS => "Users",
    ROLES => "Roles",
    TENANTS => "Tenants",
]);
permission_module!(tenants, "Tenants", [
    VIEW => "View",
    MANAGE => "Manage",
]);
permission_module!(frameworks, "Frameworks", [
    VIEW => "View",
    CREATE => "Create",
    UPDATE => "Update",
    DELETE => "Delete",
    IMPORT => "Import",
]);
permission_module!(regulators, "Regulators", [
    VIEW => "View",
    MANAGE => "Manage",
]);
permission_module!(assessments, "Assessments", [
    VIEW => "View",
    CREATE => "Create",
    UPDATE => "Update",
    SUBMIT => "Submit",
    APPROVE => "Approve",
    DELETE => "Delete",
]);
permission_module!(evidence, "Evidence", [
    VIEW => "View",
    UPLOAD => "Upload",
    UPDATE => "Update",
    DELETE => "Delete",
    APPROVE => "Approve",
    SUBMIT => "Submit",
    REVIEW => "Review",
    ARCHIVE => "Archive",
]);
permission_module!(risks, "Risks", [
    VIEW => "View",
    MANAGE => "Manage",
    ACCEPT => "Accept",
    CREATE => "Create",
    EDIT => "Edit",
    DELETE => "Delete",
    APPROVE => "Approve",
    MONITOR => "Monitor",
    ESCALATE => "Escalate",
]);
permission_module!(audits, "Audits", [
    VIEW => "View",
    MANAGE => "Manage",
    CLOSE => "Close",
    CREATE => "Create",
    EDIT => "Edit",
    DELETE => "Delete",
    FIELDWORK => "Fieldwork",
    REPORT => "Report",
]);
permission_module!(action_plans, "ActionPlans", [
    VIEW => "View",
    MANAGE => "Manage",
    ASSIGN => "Assign",
    CLOSE => "Close",
]);
permission_module!(policies, "Policies", [
    VIEW => "View",
    MANAGE => "Manage",
    APPROVE => "Approve",
    PUBLISH => "Publish",
    CREATE => "Create",
    EDIT => "Edit",
    DELETE => "Delete",
    REVIEW => "Review",
]);
permission_module!(compliance_calendar, "ComplianceCalendar", [
    VIEW => "View",
    MANAGE => "Manage",
]);
permission_module!(workflow, "Workflow", [
    VIEW => "View",
    MANAGE => "Manage",
    CREATE => "Create",
    APPROVE => "Approve",
    REJECT => "Reject",
    ASSIGN_TASK => "AssignTask",
    ESCALATE => "Escalate",
    MONITOR => "Monitor",
]);
permission_module!(controls, "Controls", [
    VIEW => "View",
    CREATE => "Create",
    EDIT => "Edit",
    DELETE => "Delete",
    IMPLEMENT => "Implement",
    TEST => "Test",
]);
permission_module!(users, "Users", [
    VIEW => "View",
    CREATE => "Create",
    EDIT => "Edit",
    DELETE => "Delete",
    ASSIGN_ROLE => "AssignRole",
]);
permission_module!(roles, "Roles", [
    VIEW => "View",
    CREATE => "Create",
    EDIT => "Edit",
    DELETE => "Delete",
]);
permission_module!(reports, "Reports", [
    VIEW => "View",
    EXPORT => "Export",
]);
permission_module!(vendors, "Vendors", [
    VIEW => "View",
    MANAGE => "Manage",
    ASSESS => "Assess",
]);
permission_module!(onboarding, "Onboarding", [
    VIEW => "View",
    MANAGE => "Manage",
    DERIVE_SCOPE => "DeriveScope",
]);

/// Every permission in the catalog.
pub fn all_permissions() -> Vec<&'static str> {
    [
        home::ALL,
        dashboard::ALL,
        admin::ALL,
        tenants::ALL,
        frameworks::ALL,
        regulators::ALL,
        assessments::ALL,
        evidence::ALL,
        risks::ALL,
        audits::ALL,
        action_plans::ALL,
        policies::ALL,
        compliance_calendar::ALL,
        workflow::ALL,
        controls::ALL,
        users::ALL,
        roles::ALL,
        reports::ALL,
        vendors::ALL,
        onboarding::ALL,
    ]
    .concat()
}

/// Module segment of a permission, e.g. `Risks` for `Grc.Risks.Accept`.
pub fn module_of(permission: &str) -> Option<&str> {
    let mut parts = permission.split('.');
    match (parts.next(), parts.next()) {
        (Some(GROUP_NAME), Some(module)) if !module.is_empty() => Some(module),
        _ => None,
    }
}

pub fn is_known(permission: &str) -> bool {
    all_permissions().contains(&permission)
}
