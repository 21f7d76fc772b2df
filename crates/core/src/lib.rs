pub mod audit;
pub mod authz;
pub mod bids;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod locks;
pub mod matching;
pub mod rating;
pub mod store;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use authz::{ActorRole, AuthorizationGuard};
pub use bids::{BidRegistry, ProviderBid};
pub use domain::householder::{Householder, HouseholderId};
pub use domain::provider::{Provider, ProviderId};
pub use domain::request::{RequestId, RequestStatus, ServiceRequest};
pub use domain::review::{Review, ReviewId};
pub use domain::service::{Service, ServiceId};
pub use errors::{DomainError, ErrorKind, InterfaceError, LifecycleError};
pub use lifecycle::{LifecycleEngine, LifecycleEvent, TransitionOutcome};
pub use matching::{AnyProvider, ProviderMatcher};
pub use rating::{NewReview, RatingAggregator};
pub use store::{EntityStore, InMemoryEntityStore, StoreError};
