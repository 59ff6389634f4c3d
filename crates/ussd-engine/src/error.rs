//! Error types for the session engine.

use ussd_core::error::UssdError;

/// Errors reported by the registration and geography collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("National ID already registered as {membership_number}")]
    Duplicate { membership_number: String },
    #[error("Invalid application: {0}")]
    InvalidApplication(String),
}

impl From<UssdError> for ServiceError {
    fn from(err: UssdError) -> Self {
        ServiceError::Unavailable(err.to_string())
    }
}

/// Flow outcomes that end or interrupt a session.
///
/// Every variant maps to a stable kebab-case code used in logs and in
/// the session log `outcome` column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("No option '{token}' at {node}")]
    InvalidChoice { node: String, token: String },
    #[error("Invalid input at {node}: {detail}")]
    InvalidFormat { node: String, detail: String },
    #[error("Too many invalid attempts at {node} ({attempts})")]
    TooManyAttempts { node: String, attempts: u32 },
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Already registered as {membership_number}")]
    DuplicateRegistration { membership_number: String },
}

impl FlowError {
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::InvalidChoice { .. } => "invalid-choice",
            FlowError::InvalidFormat { .. } => "invalid-format",
            FlowError::TooManyAttempts { .. } => "too-many-attempts",
            FlowError::UpstreamUnavailable(_) => "upstream-unavailable",
            FlowError::DuplicateRegistration { .. } => "duplicate-registration",
        }
    }

    /// Whether the session can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FlowError::InvalidChoice { .. } | FlowError::InvalidFormat { .. }
        )
    }
}

impl From<ServiceError> for FlowError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(msg) => FlowError::UpstreamUnavailable(msg),
            ServiceError::Duplicate { membership_number } => {
                FlowError::DuplicateRegistration { membership_number }
            }
            ServiceError::InvalidApplication(detail) => FlowError::InvalidFormat {
                node: "submit".to_string(),
                detail,
            },
        }
    }
}

/// Structural faults found while building a navigation graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("Unknown root node: {0}")]
    UnknownRoot(String),
    #[error("Node {from} points at unknown node {to}")]
    DanglingEdge { from: String, to: String },
    #[error("Node {0} has more than one parent")]
    MultipleParents(String),
    #[error("Node {0} is unreachable from the root")]
    Unreachable(String),
    #[error("Node {0} has no children")]
    NoChildren(String),
}

impl From<GraphError> for UssdError {
    fn from(err: GraphError) -> Self {
        UssdError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_codes() {
        let cases = [
            (
                FlowError::InvalidChoice {
                    node: "main".to_string(),
                    token: "9".to_string(),
                },
                "invalid-choice",
            ),
            (
                FlowError::InvalidFormat {
                    node: "reg_national_id".to_string(),
                    detail: "bad".to_string(),
                },
                "invalid-format",
            ),
            (
                FlowError::TooManyAttempts {
                    node: "main".to_string(),
                    attempts: 3,
                },
                "too-many-attempts",
            ),
            (
                FlowError::UpstreamUnavailable("down".to_string()),
                "upstream-unavailable",
            ),
            (
                FlowError::DuplicateRegistration {
                    membership_number: "PM12345678".to_string(),
                },
                "duplicate-registration",
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_only_input_errors_are_recoverable() {
        assert!(FlowError::InvalidChoice {
            node: "main".to_string(),
            token: "x".to_string()
        }
        .is_recoverable());
        assert!(!FlowError::UpstreamUnavailable(String::new()).is_recoverable());
        assert!(!FlowError::TooManyAttempts {
            node: "main".to_string(),
            attempts: 3
        }
        .is_recoverable());
    }

    #[test]
    fn test_service_error_into_flow_error() {
        let err: FlowError = ServiceError::Duplicate {
            membership_number: "PM1".to_string(),
        }
        .into();
        assert_eq!(
            err,
            FlowError::DuplicateRegistration {
                membership_number: "PM1".to_string()
            }
        );

        let err: FlowError = ServiceError::Unavailable("timeout".to_string()).into();
        assert_eq!(err.code(), "upstream-unavailable");
    }

    #[test]
    fn test_service_error_from_storage() {
        let err: ServiceError = UssdError::Storage("disk full".to_string()).into();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_graph_error_into_config_error() {
        let err: UssdError = GraphError::NoChildren("main".to_string()).into();
        assert!(matches!(err, UssdError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: Node main has no children");
    }
}
