use lounge_core::config::{AppConfig, LoadOptions};
use lounge_db::{connect, migrations, ping};
use serde::Serialize;

use crate::commands::block_on;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn passed(&self) -> bool {
        self.overall_status == CheckStatus::Pass
    }
}

/// Returns the rendered report and whether every required check passed.
pub fn run(json_output: bool) -> (String, bool) {
    let report = build_report();
    let passed = report.passed();

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (output, passed);
    }

    (render_human(&report), passed)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_admin_chat(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["admin_chat", "database_connectivity", "database_schema"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| matches!(check.status, CheckStatus::Pass | CheckStatus::Warn));
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_admin_chat(config: &AppConfig) -> DoctorCheck {
    match config.telegram.admin_chat_id {
        Some(chat_id) => DoctorCheck {
            name: "admin_chat",
            status: CheckStatus::Pass,
            details: format!("operator notifications go to chat {chat_id}"),
        },
        None => DoctorCheck {
            name: "admin_chat",
            status: CheckStatus::Warn,
            details: "telegram.admin_chat_id is unset; operator notifications will be dropped"
                .to_string(),
        },
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let result = block_on("doctor", async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        ping(&pool).await.map_err(|error| format!("database did not answer: {error}"))?;
        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| format!("failed to read migration history: {error}"));
        pool.close().await;
        Ok::<_, String>(pending)
    });

    let connectivity = |status, details| DoctorCheck { name: "database_connectivity", status, details };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(_) => Err("failed to initialize async runtime".to_string()),
    };

    match outcome {
        Err(error) => vec![
            connectivity(CheckStatus::Fail, error),
            DoctorCheck {
                name: "database_schema",
                status: CheckStatus::Skipped,
                details: "skipped because the database is unreachable".to_string(),
            },
        ],
        Ok(pending) => {
            let schema = match pending {
                Ok(versions) if versions.is_empty() => DoctorCheck {
                    name: "database_schema",
                    status: CheckStatus::Pass,
                    details: "all migrations applied".to_string(),
                },
                Ok(versions) => DoctorCheck {
                    name: "database_schema",
                    status: CheckStatus::Fail,
                    details: format!("pending migrations {versions:?}; run `lounge migrate`"),
                },
                Err(error) => {
                    DoctorCheck { name: "database_schema", status: CheckStatus::Fail, details: error }
                }
            };
            vec![
                connectivity(CheckStatus::Pass, format!("connected using `{}`", config.database.url)),
                schema,
            ]
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
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
