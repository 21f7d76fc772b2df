use serde::{Deserialize, Serialize};

use crate::domain::request::RequestStatus;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    BidPlaced,
    ProviderDeclined,
    BidApproved,
    CancelRequested,
    ApprovedCancelRequested,
    RescheduleRequested,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BidPlaced => "bid_placed",
            Self::ProviderDeclined => "provider_declined",
            Self::BidApproved => "bid_approved",
            Self::CancelRequested => "cancel_requested",
            Self::ApprovedCancelRequested => "approved_cancel_requested",
            Self::RescheduleRequested => "reschedule_requested",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub event: LifecycleEvent,
}

/// Resolves the status reached by applying `event` in `current`, without mutating anything.
pub fn next_status(
    current: RequestStatus,
    event: LifecycleEvent,
) -> Result<TransitionOutcome, DomainError> {
    use LifecycleEvent::{
        ApprovedCancelRequested, BidApproved, BidPlaced, CancelRequested, ProviderDeclined,
        RescheduleRequested,
    };
    use RequestStatus::{Accepted, Approved, Cancelled, Declined, Pending};

    let to = match (current, event) {
        (Pending, BidPlaced) | (Accepted, BidPlaced) => Accepted,
        (Pending, ProviderDeclined) => Declined,
        (Accepted, BidApproved) => Approved,
        (Accepted, CancelRequested) => Cancelled,
        (Approved, ApprovedCancelRequested) => Cancelled,
        (Pending, RescheduleRequested) => Pending,
        (Accepted, RescheduleRequested) => Accepted,
        _ => return Err(DomainError::InvalidTransition { from: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event })
}

#[cfg(test)]
mod tests {
    use crate::domain::request::RequestStatus;
    use crate::errors::DomainError;

    use super::{next_status, LifecycleEvent};

    const ALL_STATUSES: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::Approved,
        RequestStatus::Cancelled,
        RequestStatus::Declined,
    ];

    #[test]
    fn first_bid_moves_pending_to_accepted() {
        let outcome =
            next_status(RequestStatus::Pending, LifecycleEvent::BidPlaced).expect("pending bid");
        assert_eq!(outcome.to, RequestStatus::Accepted);

        let outcome =
            next_status(RequestStatus::Accepted, LifecycleEvent::BidPlaced).expect("second bid");
        assert_eq!(outcome.to, RequestStatus::Accepted);
    }

    #[test]
    fn bidding_closes_once_a_request_is_settled() {
        for status in [RequestStatus::Approved, RequestStatus::Cancelled, RequestStatus::Declined] {
            let error = next_status(status, LifecycleEvent::BidPlaced).expect_err("closed");
            assert!(matches!(error, DomainError::InvalidTransition { from, .. } if from == status));
        }
    }

    #[test]
    fn terminal_states_reject_every_event_except_approved_cancel() {
        let events = [
            LifecycleEvent::BidPlaced,
            LifecycleEvent::ProviderDeclined,
            LifecycleEvent::BidApproved,
            LifecycleEvent::CancelRequested,
            LifecycleEvent::RescheduleRequested,
        ];
        for status in ALL_STATUSES.into_iter().filter(RequestStatus::is_terminal) {
            for event in events {
                assert!(next_status(status, event).is_err(), "{status:?} accepted {event:?}");
            }
        }

        let outcome = next_status(RequestStatus::Approved, LifecycleEvent::ApprovedCancelRequested)
            .expect("approved engagement can be aborted");
        assert_eq!(outcome.to, RequestStatus::Cancelled);
    }

    #[test]
    fn cancel_requires_a_bid() {
        assert!(next_status(RequestStatus::Pending, LifecycleEvent::CancelRequested).is_err());
        assert!(next_status(RequestStatus::Accepted, LifecycleEvent::ApprovedCancelRequested)
            .is_err());
    }

    #[test]
    fn reschedule_keeps_status() {
        for status in [RequestStatus::Pending, RequestStatus::Accepted] {
            let outcome =
                next_status(status, LifecycleEvent::RescheduleRequested).expect("reschedule");
            assert_eq!(outcome.from, outcome.to);
        }
    }
}
