use thiserror::Error;

use crate::domain::provider::ProviderId;
use crate::domain::request::{RequestId, RequestStatus};
use crate::lifecycle::transitions::LifecycleEvent;
use crate::store::StoreError;

/// Rule violations detected on a single entity, before anything is persisted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid request transition from {from:?} using event {event:?}")]
    InvalidTransition { from: RequestStatus, event: LifecycleEvent },
    #[error("request {request_id} already has an approved bid")]
    AlreadyApproved { request_id: RequestId },
    #[error("provider {provider_id} already has a bid on this request")]
    DuplicateBid { provider_id: ProviderId },
    #[error("provider {provider_id} has no bid on this request")]
    UnknownBid { provider_id: ProviderId },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    Conflict,
    InvalidArgument,
    Store,
}

/// Error returned by every engine operation. Each rejection has a distinguishable kind.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("actor `{actor}` is not allowed to {operation} request `{request_id}`")]
    Forbidden { actor: String, operation: &'static str, request_id: String },
    #[error("cannot {operation} request `{request_id}` while it is {status:?}")]
    InvalidState { operation: &'static str, request_id: String, status: RequestStatus },
    #[error("{operation} conflict: {message}")]
    Conflict { operation: &'static str, message: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{operation} failed in entity store: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Store { .. } => ErrorKind::Store,
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Wraps a collaborator failure with the operation name. A stale version token is
    /// reported as a conflict so the caller can re-read and retry.
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        match source {
            StoreError::VersionConflict { id, expected, found } => Self::Conflict {
                operation,
                message: format!(
                    "request `{id}` was modified concurrently (expected version {expected}, \
                     found {found:?})"
                ),
            },
            source => Self::Store { operation, source },
        }
    }

    /// Maps a domain rule violation raised while applying `operation` to `request_id`.
    pub fn from_domain(
        operation: &'static str,
        request_id: &RequestId,
        error: DomainError,
    ) -> Self {
        match error {
            DomainError::InvalidTransition { from, .. } => {
                Self::InvalidState { operation, request_id: request_id.0.clone(), status: from }
            }
            DomainError::AlreadyApproved { .. } | DomainError::DuplicateBid { .. } => {
                Self::Conflict { operation, message: error.to_string() }
            }
            DomainError::UnknownBid { provider_id } => {
                Self::NotFound { entity: "bid", id: format!("{request_id}/{provider_id}") }
            }
            DomainError::InvariantViolation(message) => {
                Self::Conflict { operation, message: format!("invariant violation: {message}") }
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Forbidden { .. } => "You are not allowed to change this request.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl LifecycleError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self.kind() {
            ErrorKind::NotFound => InterfaceError::NotFound { message, correlation_id },
            ErrorKind::Forbidden => InterfaceError::Forbidden { message, correlation_id },
            ErrorKind::InvalidState | ErrorKind::Conflict | ErrorKind::InvalidArgument => {
                InterfaceError::BadRequest { message, correlation_id }
            }
            ErrorKind::Store => InterfaceError::ServiceUnavailable { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::provider::ProviderId;
    use crate::domain::request::{RequestId, RequestStatus};
    use crate::errors::{DomainError, ErrorKind, InterfaceError, LifecycleError};
    use crate::lifecycle::transitions::LifecycleEvent;
    use crate::store::StoreError;

    fn request_id() -> RequestId {
        RequestId("REQ-1".to_owned())
    }

    #[test]
    fn invalid_transition_maps_to_invalid_state() {
        let error = LifecycleError::from_domain(
            "cancel",
            &request_id(),
            DomainError::InvalidTransition {
                from: RequestStatus::Pending,
                event: LifecycleEvent::CancelRequested,
            },
        );

        assert_eq!(error.kind(), ErrorKind::InvalidState);
        assert!(error.to_string().contains("Pending"));
    }

    #[test]
    fn double_approval_maps_to_conflict() {
        let error = LifecycleError::from_domain(
            "approve",
            &request_id(),
            DomainError::AlreadyApproved { request_id: request_id() },
        );
        assert_eq!(error.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn unknown_bid_maps_to_not_found() {
        let error = LifecycleError::from_domain(
            "approve",
            &request_id(),
            DomainError::UnknownBid { provider_id: ProviderId("P9".to_owned()) },
        );
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(error.to_string().contains("REQ-1/P9"));
    }

    #[test]
    fn version_conflict_from_store_is_a_conflict() {
        let error = LifecycleError::store(
            "accept",
            StoreError::VersionConflict { id: "REQ-1".to_owned(), expected: 2, found: Some(3) },
        );
        assert_eq!(error.kind(), ErrorKind::Conflict);

        let error =
            LifecycleError::store("accept", StoreError::Unavailable("disk full".to_owned()));
        assert_eq!(error.kind(), ErrorKind::Store);
        assert!(error.to_string().starts_with("accept failed"));
    }

    #[test]
    fn interface_mapping_keeps_correlation_id() {
        let interface = LifecycleError::not_found("request", "REQ-404").into_interface("req-7");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.correlation_id(), "req-7");
        assert_eq!(interface.user_message(), "The requested record does not exist.");
    }

    #[test]
    fn store_failures_are_service_unavailable() {
        let interface =
            LifecycleError::store("approve", StoreError::Unavailable("locked".to_owned()))
                .into_interface("req-8");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }
}
