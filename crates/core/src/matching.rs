use crate::domain::provider::Provider;
use crate::domain::request::ServiceRequest;

/// Decides whether a provider may bid on a request.
///
/// Geographic proximity and similar rules plug in here; the engine only consults the verdict.
pub trait ProviderMatcher: Send + Sync {
    fn is_eligible(&self, provider: &Provider, request: &ServiceRequest) -> bool;
}

/// Admits every provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyProvider;

impl ProviderMatcher for AnyProvider {
    fn is_eligible(&self, _provider: &Provider, _request: &ServiceRequest) -> bool {
        true
    }
}

impl<F> ProviderMatcher for F
where
    F: Fn(&Provider, &ServiceRequest) -> bool + Send + Sync,
{
    fn is_eligible(&self, provider: &Provider, request: &ServiceRequest) -> bool {
        self(provider, request)
    }
}
