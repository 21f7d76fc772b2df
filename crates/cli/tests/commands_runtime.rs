use std::env;
use std::sync::{Mutex, OnceLock};

use homeserve_cli::commands::requests::{self, RequestFilter};
use homeserve_cli::commands::{doctor, migrate, seed, smoke};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_memory_database() {
    with_env(&[("HOMESERVE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_config_failure_for_invalid_env() {
    with_env(
        &[
            ("HOMESERVE_DATABASE_URL", "sqlite::memory:"),
            ("HOMESERVE_DATABASE_MAX_CONNECTIONS", "many"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn seed_lists_demo_entities() {
    with_env(&[("HOMESERVE_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        let message = payload["message"].as_str().expect("message should be a string");
        assert!(message.contains("H1, H2, H3"));
        assert!(message.contains("Plumbing"));
    });
}

#[test]
fn smoke_drives_full_lifecycle_against_file_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("smoke.db").display());

    with_env(&[("HOMESERVE_DATABASE_URL", url.as_str())], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected passing smoke run: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "config_validation",
                "db_connectivity",
                "migration_visibility",
                "demo_seed",
                "lifecycle_scenario",
                "rating_update",
            ]
        );

        let listing = requests::run(RequestFilter::Householder("H1".to_string()));
        assert_eq!(listing.exit_code, 0, "{}", listing.output);
        let payload = parse_payload(&listing.output);
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["requests"][0]["status"], "Approved");
        assert_eq!(payload["requests"][0]["bids"].as_array().map(Vec::len), Some(2));

        let open = requests::run(RequestFilter::OpenFor("P3".to_string()));
        assert_eq!(parse_payload(&open.output)["count"], 0);

        let bid_on = requests::run(RequestFilter::Provider("P2".to_string()));
        assert_eq!(bid_on.exit_code, 0, "{}", bid_on.output);
        assert_eq!(parse_payload(&bid_on.output)["count"], 1);
        let never_bid = requests::run(RequestFilter::Provider("P3".to_string()));
        assert_eq!(parse_payload(&never_bid.output)["count"], 0);
    });
}

#[test]
fn smoke_skips_database_checks_when_config_is_invalid() {
    with_env(&[("HOMESERVE_LOGGING_FORMAT", "xml")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(last_line(&result.output));
        let statuses: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["status"].as_str())
            .collect();
        assert_eq!(statuses, vec!["fail", "skipped", "skipped", "skipped", "skipped", "skipped"]);
    });
}

#[test]
fn requests_for_unknown_householder_is_not_found() {
    with_env(&[("HOMESERVE_DATABASE_URL", "sqlite::memory:")], || {
        let result = requests::run(RequestFilter::Householder("H404".to_string()));
        assert_eq!(result.exit_code, 8);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "not_found");
    });
}

#[test]
fn requests_for_unknown_provider_is_not_found() {
    with_env(&[("HOMESERVE_DATABASE_URL", "sqlite::memory:")], || {
        let result = requests::run(RequestFilter::Provider("P404".to_string()));
        assert_eq!(result.exit_code, 8, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "not_found");
        assert!(payload["message"].as_str().is_some_and(|message| message.contains("P404")));
    });
}

#[test]
fn doctor_flags_missing_schema_on_fresh_database() {
    with_env(&[("HOMESERVE_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][1]["name"], "database_connectivity");
        assert_eq!(payload["checks"][1]["status"], "pass");
        assert_eq!(payload["checks"][2]["name"], "schema_readiness");
        assert_eq!(payload["checks"][2]["status"], "fail");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HOMESERVE_DATABASE_URL",
        "HOMESERVE_DATABASE_MAX_CONNECTIONS",
        "HOMESERVE_DATABASE_TIMEOUT_SECS",
        "HOMESERVE_LIFECYCLE_ALLOW_CUSTOM_SERVICES",
        "HOMESERVE_LIFECYCLE_CUSTOM_SERVICE_LABEL",
        "HOMESERVE_LOGGING_LEVEL",
        "HOMESERVE_LOGGING_FORMAT",
        "HOMESERVE_LOG_LEVEL",
        "HOMESERVE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
