use std::sync::Arc;

use homeserve_core::{
    HouseholderId, InterfaceError, LifecycleEngine, LifecycleError, ProviderId, ServiceRequest,
};
use homeserve_db::SqlEntityStore;
use serde::Serialize;

use crate::commands::{escape_json, open_migrated, prepare, CommandFailure, CommandResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestFilter {
    All,
    Householder(String),
    Provider(String),
    /// Requests still open to bids that the provider has not bid on.
    OpenFor(String),
}

#[derive(Debug, Serialize)]
struct RequestListing<'a> {
    command: &'static str,
    status: &'static str,
    count: usize,
    requests: &'a [ServiceRequest],
}

pub fn run(filter: RequestFilter) -> CommandResult {
    let (config, runtime) = match prepare("requests") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated(&config).await?;
        let store = Arc::new(SqlEntityStore::new(pool.clone()));
        let engine = LifecycleEngine::new(store).with_config(config.lifecycle.clone());

        let listed = match &filter {
            RequestFilter::All => engine.get_all_service_requests().await,
            RequestFilter::Householder(id) => engine.view_status(&HouseholderId(id.clone())).await,
            RequestFilter::Provider(id) => {
                engine.view_provider_requests(&ProviderId(id.clone())).await
            }
            RequestFilter::OpenFor(id) => engine.view_open_requests(&ProviderId(id.clone())).await,
        };
        pool.close().await;
        listed.map_err(lifecycle_failure)
    });

    match result {
        Ok(requests) => {
            let listing = RequestListing {
                command: "requests",
                status: "ok",
                count: requests.len(),
                requests: &requests,
            };
            let output = serde_json::to_string(&listing).unwrap_or_else(|error| {
                format!(
                    "{{\"command\":\"requests\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                    escape_json(&error.to_string())
                )
            });
            CommandResult { exit_code: 0, output }
        }
        Err(failure) => CommandResult::from_failure("requests", failure),
    }
}

fn lifecycle_failure(error: LifecycleError) -> CommandFailure {
    let error = error.into_interface(uuid::Uuid::new_v4().to_string());
    tracing::warn!(
        event_name = "cli.requests_failed",
        correlation_id = error.correlation_id(),
        error = %error,
        "request listing failed"
    );

    let (class, exit_code) = match &error {
        InterfaceError::NotFound { .. } => ("not_found", 8u8),
        InterfaceError::ServiceUnavailable { .. } => ("store_unavailable", 4u8),
        InterfaceError::BadRequest { .. } => ("bad_request", 9u8),
        InterfaceError::Forbidden { .. } => ("forbidden", 10u8),
    };
    let message = format!(
        "{} {error} (correlation_id {})",
        error.user_message(),
        error.correlation_id()
    );
    (class, message, exit_code)
}

#[cfg(test)]
mod tests {
    use homeserve_core::{LifecycleError, StoreError};

    use super::lifecycle_failure;

    #[test]
    fn missing_owner_maps_to_not_found_class() {
        let (class, message, code) =
            lifecycle_failure(LifecycleError::not_found("householder", "H404"));

        assert_eq!(class, "not_found");
        assert_eq!(code, 8);
        assert!(message.contains("H404"));
        assert!(message.contains("The requested record does not exist."));
        assert!(message.contains("correlation_id"));
    }

    #[test]
    fn store_outage_maps_to_unavailable_class() {
        let (class, message, code) = lifecycle_failure(LifecycleError::store(
            "view_status",
            StoreError::Unavailable("database is locked".to_string()),
        ));

        assert_eq!(class, "store_unavailable");
        assert_eq!(code, 4);
        assert!(message.contains("temporarily unavailable"));
    }
}
