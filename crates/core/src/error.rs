use thiserror::Error;

pub type GrcResult<T> = Result<T, GrcError>;

#[derive(Error, Debug)]
pub enum GrcError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Policy violation [{rule_id}]: {message}")]
    PolicyViolation {
        rule_id: String,
        message: String,
        remediation_hint: Option<String>,
    },

    #[error("Rules engine error: {0}")]
    RulesEngine(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GrcError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        GrcError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        GrcError::InvalidTransition {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GrcError::not_found("Risk", "abc");
        assert_eq!(err.to_string(), "Risk not found: abc");

        let err = GrcError::invalid_transition("Draft", "Published");
        assert_eq!(
            err.to_string(),
            "Invalid transition from \"Draft\" to \"Published\""
        );

        let err = GrcError::PolicyViolation {
            rule_id: "R1".into(),
            message: "owner required".into(),
            remediation_hint: None,
        };
        assert!(err.to_string().contains("[R1]"));
    }
}
