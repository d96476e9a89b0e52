use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use wellbeing_monitor::config::Settings;
use wellbeing_monitor::db::{self, ImportMode};
use wellbeing_monitor::models::{
    AlertStatus, MetricKind, Student, StudentSummary, SurveyResponse,
};
use wellbeing_monitor::{aggregate, alerts, classify, render, report};

#[derive(Parser)]
#[command(name = "wellbeing-monitor")]
#[command(about = "Student wellbeing survey tracker with threshold alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import survey responses from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Clamp out-of-range scores instead of rejecting the file
        #[arg(long)]
        clamp: bool,
    },
    /// Evaluate recent responses and raise new alerts
    Evaluate {
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        /// Consecutive surveys that must breach a threshold
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        window: Option<u32>,
    },
    /// List students with their current status
    #[command(group(
        ArgGroup::new("scope")
            .args(["program", "email"])
            .multiple(false)
    ))]
    Students {
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        /// Number of newest responses averaged per student
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        window: Option<u32>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one student's summary, recent surveys and alert history
    Student {
        #[arg(long)]
        email: String,
        /// Number of newest surveys to show
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        limit: u32,
    },
    /// List alerts
    Alerts {
        #[arg(long, value_enum)]
        status: Option<AlertStatus>,
    },
    /// Mark an alert as resolved
    Resolve {
        #[arg(long)]
        id: Uuid,
    },
    /// Generate a markdown report
    #[command(group(
        ArgGroup::new("scope")
            .args(["program", "email"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        program: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Classify a single set of scores without touching the database
    Classify {
        #[arg(long)]
        mood: f64,
        #[arg(long)]
        stress: Option<f64>,
        #[arg(long)]
        sleep: Option<f64>,
    },
}

fn cutoff(since_days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(since_days.max(1))
}

fn summarize_all(
    students: &[Student],
    responses: &[SurveyResponse],
    window: usize,
) -> anyhow::Result<Vec<StudentSummary>> {
    students
        .iter()
        .map(|student| {
            aggregate::summarize_student(student, responses, window)
                .with_context(|| format!("failed to summarize {}", student.email))
        })
        .collect()
}

fn run_classify(mood: f64, stress: Option<f64>, sleep: Option<f64>) -> anyhow::Result<()> {
    let status = classify::classify_status(mood)?;
    println!(
        "status: {} ({})",
        render::status_label(status),
        render::status_tone(status).as_str()
    );

    for (kind, value) in [
        (MetricKind::Mood, Some(mood)),
        (MetricKind::Stress, stress),
        (MetricKind::Sleep, sleep),
    ] {
        if let Some(value) = value {
            let severity = classify::classify_metric_severity(kind, value)?;
            println!(
                "{kind}: {value:.1}/5 severity {} ({})",
                render::severity_label(severity),
                render::score_tone(kind, value)?.as_str()
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wellbeing_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Classify {
        mood,
        stress,
        sleep,
    } = cli.command
    {
        return run_classify(mood, stress, sleep);
    }

    let settings = Settings::from_env()?;
    let pool = db::connect(&settings).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, &settings.scales).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv, clamp } => {
            let mode = if clamp {
                ImportMode::Clamp
            } else {
                ImportMode::Strict
            };
            let inserted = db::import_csv(&pool, &csv, &settings.scales, mode).await?;
            println!("Inserted {inserted} survey responses from {}.", csv.display());
        }
        Commands::Evaluate { since_days, window } => {
            let mut policy = settings.alert_policy;
            if let Some(window) = window {
                policy.window_days = window as usize;
            }

            let responses =
                db::fetch_responses(&pool, cutoff(since_days), None, None, &settings.scales)
                    .await?;
            // Resolved alerts count too: a kind is only raised again after a newer survey.
            let known = db::fetch_alerts(&pool, None).await?;

            let mut by_subject: BTreeMap<Uuid, Vec<SurveyResponse>> = BTreeMap::new();
            for response in responses {
                by_subject
                    .entry(response.subject_id)
                    .or_default()
                    .push(response);
            }

            let now = Utc::now();
            let mut raised = 0usize;
            for (subject_id, history) in &by_subject {
                let new_alerts = alerts::evaluate_subject(*subject_id, history, &policy, &known, now)
                    .with_context(|| format!("failed to evaluate student {subject_id}"))?;
                for alert in new_alerts {
                    if db::insert_alert(&pool, &alert).await? {
                        tracing::info!(
                            student = %alert.subject_id,
                            kind = %alert.kind,
                            severity = %alert.severity,
                            "alert raised"
                        );
                        println!(
                            "- [{}] {}: {}",
                            render::severity_label(alert.severity),
                            alert.subject_id,
                            alert.description
                        );
                        raised += 1;
                    }
                }
            }

            println!(
                "Evaluated {} students, raised {raised} alerts.",
                by_subject.len()
            );
        }
        Commands::Students {
            program,
            email,
            since_days,
            window,
            limit,
        } => {
            let students =
                db::fetch_students(&pool, program.as_deref(), email.as_deref()).await?;
            let responses = db::fetch_responses(
                &pool,
                cutoff(since_days),
                program.as_deref(),
                email.as_deref(),
                &settings.scales,
            )
            .await?;
            let window = window.map_or(settings.status_window, |window| window as usize);
            let summaries = summarize_all(&students, &responses, window)?;

            if summaries.is_empty() {
                println!("No students found for this scope.");
                return Ok(());
            }

            println!("Students by concern:");
            for summary in report::rank_by_concern(&summaries).into_iter().take(limit) {
                let status = summary
                    .status
                    .map(render::status_label)
                    .unwrap_or("No recent surveys");
                let mood = summary
                    .average_mood
                    .map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}/5"));
                println!(
                    "- {} ({}, {}) {} mood {} across {} surveys",
                    summary.student.full_name,
                    summary.student.email,
                    summary.student.program,
                    status,
                    mood,
                    summary.survey_count
                );
            }
        }
        Commands::Student { email, limit } => {
            let Some(student) = db::fetch_student_by_email(&pool, &email).await? else {
                println!("No student with email {email}.");
                return Ok(());
            };
            let responses =
                db::fetch_recent_responses(&pool, student.id, i64::from(limit), &settings.scales)
                    .await?;
            let summary =
                aggregate::summarize_student(&student, &responses, settings.status_window)?;
            let alerts = db::fetch_alerts_for_student(&pool, student.id).await?;

            print!("{}", report::student_detail(&summary, &responses, &alerts));
        }
        Commands::Alerts { status } => {
            let alerts = db::fetch_alerts(&pool, status).await?;
            if alerts.is_empty() {
                println!("No alerts found.");
                return Ok(());
            }

            for alert in alerts {
                println!(
                    "- {} [{}] {} {} ({}) on {}: {}",
                    alert.id,
                    render::severity_label(alert.severity),
                    alert.kind,
                    alert.subject_id,
                    alert.status,
                    alert.created_at.date_naive(),
                    alert.description
                );
            }
        }
        Commands::Resolve { id } => {
            if db::resolve_alert(&pool, id, Utc::now()).await? {
                tracing::info!(alert = %id, "alert resolved");
                println!("Alert {id} resolved.");
            } else {
                println!("No active alert with id {id}.");
            }
        }
        Commands::Report {
            program,
            email,
            since_days,
            out,
        } => {
            let since = cutoff(since_days);
            let students =
                db::fetch_students(&pool, program.as_deref(), email.as_deref()).await?;
            let responses = db::fetch_responses(
                &pool,
                since,
                program.as_deref(),
                email.as_deref(),
                &settings.scales,
            )
            .await?;
            let trends =
                db::fetch_weekly_trends(&pool, since, program.as_deref(), email.as_deref())
                    .await?;
            let summaries = summarize_all(&students, &responses, settings.status_window)?;

            let alerts: Vec<_> = db::fetch_alerts(&pool, None)
                .await?
                .into_iter()
                .filter(|alert| summaries.iter().any(|s| s.student.id == alert.subject_id))
                .collect();

            let cutoff_date: NaiveDate = since.date_naive();
            let report = report::build_report(
                program.as_deref().or(email.as_deref()),
                since_days,
                cutoff_date,
                &summaries,
                &alerts,
                &trends,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Classify {
            mood,
            stress,
            sleep,
        } => run_classify(mood, stress, sleep)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};

    #[test]
    fn window_flags_reject_zero() {
        assert!(Cli::try_parse_from(["wellbeing-monitor", "evaluate", "--window", "0"]).is_err());
        assert!(Cli::try_parse_from(["wellbeing-monitor", "students", "--window", "0"]).is_err());

        let cli = Cli::try_parse_from(["wellbeing-monitor", "evaluate", "--window", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Evaluate { window: Some(5), .. }));
    }

    #[test]
    fn student_command_defaults_limit() {
        let cli = Cli::try_parse_from(["wellbeing-monitor", "student", "--email", "a@example.edu"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Student { limit: 10, .. }));
        assert!(Cli::try_parse_from(["wellbeing-monitor", "student"]).is_err());
    }
}
