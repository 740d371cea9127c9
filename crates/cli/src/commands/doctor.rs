use haulrate_core::config::{AppConfig, LoadOptions};
use haulrate_core::fare::FareEngine;
use haulrate_db::{connect_with_config, migrations, SqlRateCatalog};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["database_connectivity", "schema_migrations", "rate_catalog"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    finish_report(checks)
}

fn finish_report(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Connectivity, schema state and catalog contents. Read-only: pending
/// migrations are reported, not applied.
fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("schema_migrations", "the async runtime did not start"),
                DoctorCheck::skipped("rate_catalog", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("schema_migrations", "the database is unreachable"),
                    DoctorCheck::skipped("rate_catalog", "the database is unreachable"),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];

        let expected = migrations::MIGRATOR
            .iter()
            .filter(|migration| migration.migration_type.is_up_migration())
            .count();
        match migrations::applied_versions(&pool).await {
            Ok(versions) if versions.len() >= expected => {
                checks.push(DoctorCheck::pass(
                    "schema_migrations",
                    format!("{} of {expected} migrations applied", versions.len()),
                ));
                checks.push(check_catalog(&pool).await);
            }
            Ok(versions) => {
                checks.push(DoctorCheck::fail(
                    "schema_migrations",
                    format!(
                        "{} of {expected} migrations applied; run `haulrate migrate`",
                        versions.len()
                    ),
                ));
                checks.push(DoctorCheck::skipped("rate_catalog", "the schema is not current"));
            }
            Err(error) => {
                checks.push(DoctorCheck::fail(
                    "schema_migrations",
                    format!("migration history unreadable ({error}); run `haulrate migrate`"),
                ));
                checks.push(DoctorCheck::skipped("rate_catalog", "the schema is not current"));
            }
        }

        pool.close().await;
        checks
    })
}

async fn check_catalog(pool: &haulrate_db::DbPool) -> DoctorCheck {
    let engine = FareEngine::new(SqlRateCatalog::new(pool.clone()));
    match engine.suggestions().await {
        Ok(suggestions) if suggestions.is_empty() => DoctorCheck::pass(
            "rate_catalog",
            "catalog is reachable but holds no active rates; run `haulrate seed` or import a sheet",
        ),
        Ok(suggestions) => DoctorCheck::pass(
            "rate_catalog",
            format!(
                "{} active centers, {} active tonnages",
                suggestions.available_centers.len(),
                suggestions.available_tonnages.len()
            ),
        ),
        Err(error) => DoctorCheck::fail("rate_catalog", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
