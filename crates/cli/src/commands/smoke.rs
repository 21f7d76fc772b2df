use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use homeserve_core::config::{AppConfig, LoadOptions};
use homeserve_core::{
    ErrorKind, HouseholderId, LifecycleEngine, NewReview, ProviderId, RequestStatus, ServiceId,
};
use homeserve_db::{connect_with_config, migrations, DbPool, DemoDataset, SqlEntityStore};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

const DATABASE_CHECKS: &[&str] = &[
    "db_connectivity",
    "migration_visibility",
    "demo_seed",
    "lifecycle_scenario",
    "rating_update",
];

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config_started = Instant::now();
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(passed("config_validation", config_started, "configuration loaded"));
            config
        }
        Err(error) => {
            checks.push(failed("config_validation", config_started, error.to_string()));
            checks.extend(DATABASE_CHECKS.iter().copied().map(skipped));
            return finalize_report(checks, elapsed_ms(started));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(failed(
                "db_connectivity",
                Instant::now(),
                format!("failed to initialize async runtime: {error}"),
            ));
            checks.extend(DATABASE_CHECKS[1..].iter().copied().map(skipped));
            return finalize_report(checks, elapsed_ms(started));
        }
    };

    runtime.block_on(run_database_checks(&config, &mut checks));
    finalize_report(checks, elapsed_ms(started))
}

async fn run_database_checks(config: &AppConfig, checks: &mut Vec<SmokeCheck>) {
    let db_started = Instant::now();
    let pool = match connect_with_config(&config.database).await {
        Ok(pool) => {
            checks.push(passed(
                "db_connectivity",
                db_started,
                format!("connected using `{}`", config.database.url),
            ));
            pool
        }
        Err(error) => {
            let message = format!("failed to connect: {error}");
            checks.push(failed("db_connectivity", db_started, message));
            checks.extend(DATABASE_CHECKS[1..].iter().copied().map(skipped));
            return;
        }
    };

    let ok = record(checks, "migration_visibility", apply_migrations(&pool)).await
        && record(checks, "demo_seed", seed_demo(&pool)).await
        && record(checks, "lifecycle_scenario", lifecycle_scenario(&pool, config)).await
        && record(checks, "rating_update", rating_update(&pool, config)).await;
    if !ok {
        let missing: Vec<&'static str> = DATABASE_CHECKS
            .iter()
            .copied()
            .filter(|name| checks.iter().all(|check| check.name != *name))
            .collect();
        checks.extend(missing.into_iter().map(skipped));
    }

    pool.close().await;
}

/// Runs one step, appends its check and reports whether it passed.
async fn record(
    checks: &mut Vec<SmokeCheck>,
    name: &'static str,
    step: impl Future<Output = Result<String, String>>,
) -> bool {
    let started = Instant::now();
    match step.await {
        Ok(message) => {
            checks.push(passed(name, started, message));
            true
        }
        Err(message) => {
            checks.push(failed(name, started, message));
            false
        }
    }
}

async fn apply_migrations(pool: &DbPool) -> Result<String, String> {
    migrations::run_pending(pool)
        .await
        .map(|()| "migrations are visible and executable".to_string())
        .map_err(|error| format!("migration execution failed: {error}"))
}

async fn seed_demo(pool: &DbPool) -> Result<String, String> {
    DemoDataset::load(pool).await.map_err(|error| format!("seed failed: {error}"))?;
    let verification =
        DemoDataset::verify(pool).await.map_err(|error| format!("verify failed: {error}"))?;
    if verification.all_present {
        Ok(format!("{} demo records verified", verification.checks.len()))
    } else {
        Err("demo dataset is incomplete".to_string())
    }
}

fn engine_for(pool: &DbPool, config: &AppConfig) -> LifecycleEngine<SqlEntityStore> {
    LifecycleEngine::new(Arc::new(SqlEntityStore::new(pool.clone())))
        .with_config(config.lifecycle.clone())
}

async fn lifecycle_scenario(pool: &DbPool, config: &AppConfig) -> Result<String, String> {
    let engine = engine_for(pool, config);
    let householder = HouseholderId("H1".to_string());
    let first = ProviderId("P1".to_string());
    let second = ProviderId("P2".to_string());

    let request_id = engine
        .request_service(&householder, "Plumbing", Utc::now() + Duration::days(1))
        .await
        .map_err(|error| format!("request_service: {error}"))?;
    engine
        .accept(&first, &request_id, Decimal::new(100, 0))
        .await
        .map_err(|error| format!("first bid: {error}"))?;
    engine
        .accept(&second, &request_id, Decimal::new(90, 0))
        .await
        .map_err(|error| format!("second bid: {error}"))?;
    let approved = engine
        .approve(&householder, &request_id, &second)
        .await
        .map_err(|error| format!("approve: {error}"))?;

    if approved.status != RequestStatus::Approved || approved.bids.approved_count() != 1 {
        return Err(format!("request {request_id} did not settle on a single approved bid"));
    }
    match engine.approve(&householder, &request_id, &first).await {
        Err(error) if error.kind() == ErrorKind::Conflict => {}
        Err(error) => return Err(format!("second approval failed with the wrong kind: {error}")),
        Ok(_) => return Err("second approval unexpectedly succeeded".to_string()),
    }

    Ok(format!("request {request_id} approved for {second} after 2 bids"))
}

async fn rating_update(pool: &DbPool, config: &AppConfig) -> Result<String, String> {
    let engine = engine_for(pool, config);
    let review = engine
        .add_review(NewReview {
            provider_id: ProviderId("P2".to_string()),
            householder_id: HouseholderId("H1".to_string()),
            service_id: ServiceId("SVC-plumbing".to_string()),
            comments: "smoke check".to_string(),
            rating: 5.0,
        })
        .await
        .map_err(|error| format!("add_review: {error}"))?;
    Ok(format!("review {} recorded", review.id))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn passed(name: &'static str, started: Instant, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Pass,
        elapsed_ms: elapsed_ms(started),
        message: message.into(),
    }
}

fn failed(name: &'static str, started: Instant, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Fail,
        elapsed_ms: elapsed_ms(started),
        message: message.into(),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
