use thiserror::Error;

use crate::domain::session::SessionId;
use crate::domain::tenant::PlanTier;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("session `{0}` is already completed")]
    SessionAlreadyCompleted(String),
    #[error("required slots are missing: {missing}")]
    SlotsIncomplete { missing: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("dialog quota exhausted: {used}/{limit} on plan {plan}")]
    QuotaExceeded { used: u32, limit: u32, plan: PlanTier },
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The model call failed after the user turn was stored. The session stays open and
    /// already paid for, so callers resume it instead of opening another.
    #[error("assistant unavailable in session `{session_id}`: {reason}")]
    AssistantUnavailable { session_id: SessionId, reason: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Domain(DomainError::Validation(message.into()))
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("quota exceeded: {used}/{limit} on plan {plan}")]
    QuotaExceeded { used: u32, limit: u32, plan: PlanTier, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, session_id: Option<String>, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unauthorized { .. } => "A valid agency key is required.",
            Self::NotFound { .. } => "The requested resource was not found.",
            Self::QuotaExceeded { .. } => {
                "The dialog limit for this plan has been reached. Upgrade the plan to continue."
            }
            Self::ServiceUnavailable { .. } => "The assistant is temporarily unavailable.",
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::QuotaExceeded { correlation_id, .. }
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
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::QuotaExceeded { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::QuotaExceeded { used, limit, plan } => {
                Self::QuotaExceeded { used, limit, plan, correlation_id }
            }
            ApplicationError::NotFound { entity, id } => {
                Self::NotFound { message: format!("{entity} `{id}` not found"), correlation_id }
            }
            ApplicationError::Unauthorized(message) => Self::Unauthorized { message, correlation_id },
            ApplicationError::AssistantUnavailable { session_id, .. } => Self::ServiceUnavailable {
                message: "assistant temporarily unavailable".to_owned(),
                session_id: Some(session_id.0),
                correlation_id,
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, session_id: None, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::session::SessionId;
    use crate::domain::tenant::PlanTier;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn validation_error_maps_to_bad_request() {
        let interface = ApplicationError::from(DomainError::Validation(
            "message is required".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn quota_error_keeps_usage_payload() {
        let interface =
            ApplicationError::QuotaExceeded { used: 100, limit: 100, plan: PlanTier::Basic }
                .into_interface("req-2");

        assert_eq!(
            interface,
            InterfaceError::QuotaExceeded {
                used: 100,
                limit: 100,
                plan: PlanTier::Basic,
                correlation_id: "req-2".to_owned(),
            }
        );
    }

    #[test]
    fn assistant_failure_hides_provider_detail() {
        let interface = ApplicationError::AssistantUnavailable {
            session_id: SessionId("session-7".to_owned()),
            reason: "upstream 529: overloaded".to_owned(),
        }
        .into_interface("req-3");

        assert!(matches!(
            interface,
            InterfaceError::ServiceUnavailable { ref session_id, .. }
                if session_id.as_deref() == Some("session-7")
        ));
        assert!(!interface.to_string().contains("529"));
        assert_eq!(interface.user_message(), "The assistant is temporarily unavailable.");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("vault secret missing".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.correlation_id(), "req-4");
    }
}
