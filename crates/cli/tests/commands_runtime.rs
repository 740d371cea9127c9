use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

use chrono::{TimeZone, Utc};
use haulrate_cli::commands::calculate::CalculateRequest;
use haulrate_cli::commands::{calculate, import, migrate, seed, suggest};
use haulrate_core::import::ImportMode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("HAULRATE_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_malformed_override() {
    with_env(
        &[
            ("HAULRATE_DATABASE_URL", "sqlite::memory:"),
            ("HAULRATE_DATABASE_MAX_CONNECTIONS", "plenty"),
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
fn seed_lists_every_seeded_master() {
    with_env(&[("HAULRATE_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("fare seed dataset loaded with 5 rate masters:"));
        assert!(message.contains(
            "  - rm-seoul-5: 서울센터 5t (Seoul 5t: regional base, call and waypoint fees)"
        ));
        assert!(message.contains("  - rm-incheon-11: 인천센터 11t (Incheon 11t: deactivated master)"));
    });
}

#[test]
fn seed_is_idempotent_against_a_file_database() {
    let database = TempDatabase::new();
    with_env(&[("HAULRATE_DATABASE_URL", database.url())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn calculate_quotes_seeded_multi_stop_trip() {
    let database = TempDatabase::new();
    with_env(&[("HAULRATE_DATABASE_URL", database.url())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = calculate::run(request("서울센터", dec!(5), &["서울", "경기"], Some(3)));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "calculate");
        assert_eq!(payload["data"]["rate_master"]["id"], "rm-seoul-5");
        assert_eq!(decimal_at(&payload["data"]["breakdown"]["total"]), dec!(78000));
        assert_eq!(payload["data"]["calculation"]["total_stops"], 3);
    });
}

#[test]
fn calculate_unknown_center_returns_suggestions() {
    let database = TempDatabase::new();
    with_env(&[("HAULRATE_DATABASE_URL", database.url())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = calculate::run(request("미등록센터", dec!(5), &["서울"], None));
        assert_eq!(result.exit_code, 8);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "rate_not_found");
        let centers = payload["data"]["suggestions"]["available_centers"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(centers, vec![Value::from("대구센터"), Value::from("부산센터"), Value::from("서울센터")]);
    });
}

#[test]
fn calculate_expired_rate_is_distinct_from_missing_rate() {
    let database = TempDatabase::new();
    with_env(&[("HAULRATE_DATABASE_URL", database.url())], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = calculate::run(request("대구센터", dec!(5), &["대구"], None));
        assert_eq!(result.exit_code, 9);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "no_valid_rates_for_date");
        assert!(payload["message"].as_str().unwrap_or("").contains("2026-04-01"));
        assert!(payload.get("data").is_none());
    });
}

#[test]
fn calculate_rejects_non_positive_tonnage() {
    with_env(&[("HAULRATE_DATABASE_URL", "sqlite::memory:")], || {
        let result = calculate::run(request("서울센터", Decimal::ZERO, &["서울"], None));
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_query");
    });
}

#[test]
fn suggest_lists_active_catalog() {
    let database = TempDatabase::new();
    with_env(&[("HAULRATE_DATABASE_URL", database.url())], || {
        let empty = suggest::run();
        assert_eq!(parse_payload(&empty.output)["message"], "no active rates are configured");

        assert_eq!(seed::run().exit_code, 0);
        let result = suggest::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "centers: 대구센터, 부산센터, 서울센터; tonnages: 1t, 2.5t, 5t");
    });
}

#[test]
fn import_simulates_then_commits_then_rejects_duplicates() {
    let database = TempDatabase::new();
    let sheet = database.write_file(
        "rates.csv",
        "센터명,톤수,요금종류,지역,금액\n광주센터,3.5,BASE,,42000\n광주센터,3.5,CALL_FEE,,4000\n",
    );

    with_env(&[("HAULRATE_DATABASE_URL", database.url())], || {
        let simulated = import::run(sheet.clone(), ImportMode::Simulate);
        assert_eq!(simulated.exit_code, 0, "unexpected output: {}", simulated.output);
        let payload = parse_payload(&simulated.output);
        assert_eq!(payload["data"]["accepted"], 1);
        assert_eq!(payload["data"]["created_master_ids"], Value::Array(Vec::new()));

        let committed = import::run(sheet.clone(), ImportMode::Commit);
        assert_eq!(committed.exit_code, 0, "unexpected output: {}", committed.output);
        assert_eq!(parse_payload(&committed.output)["message"], "commit: imported 1 rates from 2 rows, 0 rejected");

        let quoted = calculate::run(request("광주센터", dec!(3.5), &["광주"], None));
        assert_eq!(decimal_at(&parse_payload(&quoted.output)["data"]["breakdown"]["total"]), dec!(42000));

        let again = import::run(sheet.clone(), ImportMode::Simulate);
        assert_eq!(again.exit_code, 8);
        let payload = parse_payload(&again.output);
        assert_eq!(payload["error_class"], "import_rejected");
        assert_eq!(payload["data"]["errors"][0]["kind"], "duplicate_key");
    });
}

#[test]
fn import_reports_unreadable_file() {
    with_env(&[("HAULRATE_DATABASE_URL", "sqlite::memory:")], || {
        let result = import::run("does/not/exist.csv".into(), ImportMode::Simulate);
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "import_file");
    });
}

fn request(center: &str, tonnage: Decimal, regions: &[&str], stops: Option<u32>) -> CalculateRequest {
    CalculateRequest {
        center: center.to_string(),
        tonnage,
        regions: regions.iter().map(|region| region.to_string()).collect(),
        total_stops: stops,
        distinct_regions: None,
        as_of: Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).single(),
    }
}

fn decimal_at(value: &Value) -> Decimal {
    let raw = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    Decimal::from_str(&raw).expect("decimal value")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

struct TempDatabase {
    dir: TempDir,
    url: String,
}

impl TempDatabase {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("haulrate.db").display());
        Self { dir, url }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn write_file(&self, name: &str, contents: &str) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write fixture");
        assert!(Path::new(&path).exists());
        path
    }
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HAULRATE_DATABASE_URL",
        "HAULRATE_DATABASE_MAX_CONNECTIONS",
        "HAULRATE_DATABASE_TIMEOUT_SECS",
        "HAULRATE_SERVER_BIND_ADDRESS",
        "HAULRATE_SERVER_PORT",
        "HAULRATE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "HAULRATE_LOGGING_LEVEL",
        "HAULRATE_LOGGING_FORMAT",
        "HAULRATE_LOG_LEVEL",
        "HAULRATE_LOG_FORMAT",
        "HAULRATE_IMPORT_MAX_ROWS",
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
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
