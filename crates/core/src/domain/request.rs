use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bids::{BidRegistry, ProviderBid};
use crate::domain::householder::{Householder, HouseholderId};
use crate::domain::provider::ProviderId;
use crate::domain::service::{Service, ServiceId};
use crate::errors::DomainError;
use crate::lifecycle::transitions::{next_status, LifecycleEvent, TransitionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("REQ-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Approved,
    Cancelled,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Approved => "approved",
            Self::Cancelled => "cancelled",
            Self::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Cancelled | Self::Declined)
    }

    /// Statuses in which providers may still bid.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "approved" => Ok(Self::Approved),
            "cancelled" => Ok(Self::Cancelled),
            "declined" => Ok(Self::Declined),
            other => {
                Err(DomainError::InvariantViolation(format!("unknown request status `{other}`")))
            }
        }
    }
}

/// A householder's ask for a named service at a scheduled time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub householder_id: HouseholderId,
    pub householder_name: String,
    pub householder_address: String,
    pub service_id: ServiceId,
    pub service_name: String,
    pub requested_time: DateTime<Utc>,
    pub scheduled_time: DateTime<Utc>,
    pub status: RequestStatus,
    pub approve_status: bool,
    pub bids: BidRegistry,
    /// Optimistic concurrency token, bumped on every persisted write.
    pub version: u64,
}

impl ServiceRequest {
    pub fn new(
        householder: &Householder,
        service: &Service,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            householder_id: householder.id.clone(),
            householder_name: householder.name.clone(),
            householder_address: householder.address.clone(),
            service_id: service.id.clone(),
            service_name: service.name.clone(),
            requested_time: Utc::now(),
            scheduled_time,
            status: RequestStatus::Pending,
            approve_status: false,
            bids: BidRegistry::new(),
            version: 1,
        }
    }

    pub fn place_bid(&mut self, bid: ProviderBid) -> Result<TransitionOutcome, DomainError> {
        let outcome = next_status(self.status, LifecycleEvent::BidPlaced)?;
        self.bids.append(bid)?;
        self.apply(outcome);
        Ok(outcome)
    }

    pub fn decline(&mut self) -> Result<TransitionOutcome, DomainError> {
        let outcome = next_status(self.status, LifecycleEvent::ProviderDeclined)?;
        self.apply(outcome);
        Ok(outcome)
    }

    /// Selects the bid of `provider_id`. A second approval is a conflict, never a no-op.
    pub fn approve(&mut self, provider_id: &ProviderId) -> Result<TransitionOutcome, DomainError> {
        if self.approve_status {
            return Err(DomainError::AlreadyApproved { request_id: self.id.clone() });
        }
        let outcome = next_status(self.status, LifecycleEvent::BidApproved)?;
        self.bids.mark_approved(provider_id)?;
        self.apply(outcome);
        Ok(outcome)
    }

    pub fn cancel(&mut self) -> Result<TransitionOutcome, DomainError> {
        let outcome = next_status(self.status, LifecycleEvent::CancelRequested)?;
        self.apply(outcome);
        Ok(outcome)
    }

    /// Aborts an approved engagement. Returns the provider whose approval was withdrawn.
    pub fn cancel_approved(
        &mut self,
    ) -> Result<(TransitionOutcome, Option<ProviderId>), DomainError> {
        let outcome = next_status(self.status, LifecycleEvent::ApprovedCancelRequested)?;
        let previous = self.bids.clear_approval();
        self.apply(outcome);
        Ok((outcome, previous))
    }

    pub fn reschedule(
        &mut self,
        scheduled_time: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DomainError> {
        let outcome = next_status(self.status, LifecycleEvent::RescheduleRequested)?;
        self.scheduled_time = scheduled_time;
        Ok(outcome)
    }

    /// Checks the approval and bid invariants that must hold for every stored request.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let approved_bids = self.bids.approved_count();
        let approved_status = self.status == RequestStatus::Approved;

        if self.approve_status != approved_status || (approved_bids == 1) != approved_status {
            return Err(DomainError::InvariantViolation(format!(
                "request {} has approve_status={}, status={:?} and {} approved bids",
                self.id, self.approve_status, self.status, approved_bids
            )));
        }

        if approved_bids > 1 {
            return Err(DomainError::InvariantViolation(format!(
                "request {} has {} approved bids",
                self.id, approved_bids
            )));
        }

        let bids_allowed = matches!(
            self.status,
            RequestStatus::Accepted | RequestStatus::Approved | RequestStatus::Cancelled
        );
        if !self.bids.is_empty() && !bids_allowed {
            return Err(DomainError::InvariantViolation(format!(
                "request {} carries bids in status {:?}",
                self.id, self.status
            )));
        }

        Ok(())
    }

    fn apply(&mut self, outcome: TransitionOutcome) {
        self.status = outcome.to;
        self.approve_status =
            self.status == RequestStatus::Approved && self.bids.approved_count() == 1;
    }
}
