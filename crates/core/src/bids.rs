//! Ordered, append-only collection of provider bids attached to a request.
//!
//! At most one bid carries `approved == true`. The registry never removes a bid; approval
//! flags are the only mutable part.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::provider::{Provider, ProviderId};
use crate::errors::DomainError;

/// One provider's response to a request, with a profile snapshot taken at bid time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderBid {
    pub provider_id: ProviderId,
    pub name: String,
    pub contact: String,
    pub address: String,
    pub estimated_price: Decimal,
    pub rating: f64,
    pub approved: bool,
    pub placed_at: DateTime<Utc>,
}

impl ProviderBid {
    pub fn from_provider(provider: &Provider, estimated_price: Decimal) -> Self {
        Self {
            provider_id: provider.id.clone(),
            name: provider.name.clone(),
            contact: provider.contact.clone(),
            address: provider.address.clone(),
            estimated_price,
            rating: provider.rating,
            approved: false,
            placed_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidRegistry {
    bids: Vec<ProviderBid>,
}

impl BidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from persisted bids, preserving their order.
    pub fn from_bids(bids: Vec<ProviderBid>) -> Self {
        Self { bids }
    }

    pub fn append(&mut self, bid: ProviderBid) -> Result<(), DomainError> {
        if self.contains(&bid.provider_id) {
            return Err(DomainError::DuplicateBid { provider_id: bid.provider_id });
        }
        self.bids.push(bid);
        Ok(())
    }

    pub fn find_by_provider(&self, provider_id: &ProviderId) -> Option<&ProviderBid> {
        self.bids.iter().find(|bid| &bid.provider_id == provider_id)
    }

    pub fn contains(&self, provider_id: &ProviderId) -> bool {
        self.find_by_provider(provider_id).is_some()
    }

    /// Flags the bid of `provider_id` as the approved one, clearing every other flag.
    ///
    /// Nothing is touched when the provider has no bid.
    pub fn mark_approved(&mut self, provider_id: &ProviderId) -> Result<(), DomainError> {
        if !self.contains(provider_id) {
            return Err(DomainError::UnknownBid { provider_id: provider_id.clone() });
        }
        for bid in &mut self.bids {
            bid.approved = &bid.provider_id == provider_id;
        }
        Ok(())
    }

    /// Clears every approval flag, returning the provider that held it.
    pub fn clear_approval(&mut self) -> Option<ProviderId> {
        let previous = self.approved().map(|bid| bid.provider_id.clone());
        for bid in &mut self.bids {
            bid.approved = false;
        }
        previous
    }

    pub fn approved(&self) -> Option<&ProviderBid> {
        self.bids.iter().find(|bid| bid.approved)
    }

    pub fn approved_count(&self) -> usize {
        self.bids.iter().filter(|bid| bid.approved).count()
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderBid> {
        self.bids.iter()
    }

    pub fn as_slice(&self) -> &[ProviderBid] {
        &self.bids
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::provider::{Provider, ProviderId};
    use crate::errors::DomainError;

    use super::{BidRegistry, ProviderBid};

    fn bid(provider: &str, price: i64) -> ProviderBid {
        let provider =
            Provider::new(ProviderId(provider.to_string()), provider, "555-0100", "1 Main St");
        ProviderBid::from_provider(&provider, Decimal::new(price, 0))
    }

    #[test]
    fn append_preserves_order() {
        let mut registry = BidRegistry::new();
        registry.append(bid("P1", 100)).expect("first bid");
        registry.append(bid("P2", 90)).expect("second bid");

        let order: Vec<_> = registry.iter().map(|bid| bid.provider_id.0.as_str()).collect();
        assert_eq!(order, vec!["P1", "P2"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_provider_is_rejected() {
        let mut registry = BidRegistry::new();
        registry.append(bid("P1", 100)).expect("first bid");

        let error = registry.append(bid("P1", 80)).expect_err("second bid from P1");
        assert!(matches!(error, DomainError::DuplicateBid { .. }));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.as_slice()[0].estimated_price, Decimal::new(100, 0));
    }

    #[test]
    fn mark_approved_keeps_a_single_flag() {
        let mut registry = BidRegistry::new();
        registry.append(bid("P1", 100)).expect("bid");
        registry.append(bid("P2", 90)).expect("bid");

        registry.mark_approved(&ProviderId("P1".to_string())).expect("approve P1");
        registry.mark_approved(&ProviderId("P2".to_string())).expect("approve P2");

        assert_eq!(registry.approved_count(), 1);
        assert_eq!(registry.approved().map(|bid| bid.provider_id.0.as_str()), Some("P2"));
    }

    #[test]
    fn mark_approved_for_unknown_provider_changes_nothing() {
        let mut registry = BidRegistry::new();
        registry.append(bid("P1", 100)).expect("bid");
        registry.mark_approved(&ProviderId("P1".to_string())).expect("approve");

        let error = registry.mark_approved(&ProviderId("P9".to_string())).expect_err("no bid");

        assert!(matches!(error, DomainError::UnknownBid { .. }));
        assert_eq!(registry.approved().map(|bid| bid.provider_id.0.as_str()), Some("P1"));
    }

    #[test]
    fn clear_approval_reports_previous_holder() {
        let mut registry = BidRegistry::new();
        registry.append(bid("P1", 100)).expect("bid");
        registry.mark_approved(&ProviderId("P1".to_string())).expect("approve");

        assert_eq!(registry.clear_approval(), Some(ProviderId("P1".to_string())));
        assert_eq!(registry.approved_count(), 0);
        assert_eq!(registry.clear_approval(), None);
    }
}
