use thiserror::Error;

use crate::access::AccessError;
use crate::lifecycle::LifecycleError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{resource} `{id}` was not found")]
    NotFound { resource: &'static str, id: String },
    #[error("{0} changed concurrently, please retry")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("`{operation}` timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { resource, id: id.into() }
    }

    /// Transient failures of an external collaborator; the initiating action stays retryable.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Timeout { .. } | Self::Integration(_))
    }
}

impl From<AccessError> for ApplicationError {
    fn from(value: AccessError) -> Self {
        Self::Domain(DomainError::Access(value))
    }
}

impl From<LifecycleError> for ApplicationError {
    fn from(value: LifecycleError) -> Self {
        Self::Domain(DomainError::Lifecycle(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unauthorized { .. } => "Please sign in to continue.",
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Conflict { .. } => "This record changed, please retry.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            ApplicationError::Domain(DomainError::Access(AccessError::Unauthenticated)) => {
                Self::Unauthorized { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Access(_)) => {
                Self::Forbidden { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Lifecycle(LifecycleError::Access(
                AccessError::Unauthenticated,
            ))) => Self::Unauthorized { message, correlation_id },
            ApplicationError::Domain(DomainError::Lifecycle(LifecycleError::Access(_))) => {
                Self::Forbidden { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Lifecycle(LifecycleError::TerminalState {
                ..
            }))
            | ApplicationError::Domain(DomainError::Lifecycle(
                LifecycleError::InvalidTransition { .. },
            ))
            | ApplicationError::Conflict(_) => Self::Conflict { message, correlation_id },
            ApplicationError::Domain(DomainError::Validation(_))
            | ApplicationError::Domain(DomainError::Lifecycle(LifecycleError::Validation(_)))
            | ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::NotFound { .. } => Self::NotFound { message, correlation_id },
            ApplicationError::Persistence(_)
            | ApplicationError::Timeout { .. }
            | ApplicationError::Integration(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(_) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::access::{AccessError, Gate};
    use crate::domain::actor::Role;
    use crate::domain::quote::QuoteStatus;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::lifecycle::LifecycleError;

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::Validation(
            "rejection reason is required".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.http_status(), 400);
    }

    #[test]
    fn access_errors_split_into_unauthorized_and_forbidden() {
        let anonymous = ApplicationError::from(AccessError::Unauthenticated).into_interface("r");
        assert!(matches!(anonymous, InterfaceError::Unauthorized { .. }));

        let forbidden = ApplicationError::from(AccessError::Forbidden {
            gate: Gate::ApproveQuote,
            role: Role::Client,
        })
        .into_interface("r");
        assert!(matches!(forbidden, InterfaceError::Forbidden { .. }));
        assert_eq!(forbidden.user_message(), "You are not allowed to perform this action.");
    }

    #[test]
    fn terminal_state_and_cas_mismatch_map_to_conflict() {
        let terminal = ApplicationError::from(LifecycleError::TerminalState {
            status: QuoteStatus::Signed,
        })
        .into_interface("r");
        assert_eq!(terminal.http_status(), 409);

        let conflict = ApplicationError::Conflict("quote Q-1".to_owned()).into_interface("r");
        assert_eq!(conflict.user_message(), "This record changed, please retry.");
    }

    #[test]
    fn persistence_and_timeout_map_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-3");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));

        let timeout =
            ApplicationError::Timeout { operation: "quotes.save".to_owned(), timeout_ms: 50 };
        assert!(timeout.is_external());
        assert_eq!(timeout.into_interface("req-4").http_status(), 503);
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("invalid pepper".to_owned()).into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
