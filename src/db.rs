use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::{
    Alert, AlertSnapshot, AlertStatus, MetricKind, MetricScales, MetricScore, MetricScores,
    Student, SurveyResponse, WeeklyTrend,
};

/// How out-of-range scores are handled when data enters from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Reject the whole import.
    Strict,
    /// Clamp into range and log a warning.
    Clamp,
}

pub async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")?;
    tracing::debug!(max_connections = settings.max_connections, "database pool ready");
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations applied");
    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    program: &str,
    semester: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO wellbeing.students (id, full_name, email, program, semester)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            program = EXCLUDED.program,
            semester = EXCLUDED.semester
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .bind(program)
    .bind(semester)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

async fn insert_response(
    pool: &PgPool,
    student_id: Uuid,
    submitted_at: DateTime<Utc>,
    scores: &MetricScores,
    answers: &BTreeMap<String, String>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO wellbeing.survey_responses
        (id, student_id, submitted_at, mood, stress, sleep, energy, answers, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(submitted_at)
    .bind(scores.mood.value())
    .bind(scores.stress.value())
    .bind(scores.sleep.value())
    .bind(scores.energy.map(|score| score.value()))
    .bind(Json(answers))
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool, scales: &MetricScales) -> anyhow::Result<()> {
    let students = [
        ("Maria Gonzalez", "maria.gonzalez@universidad.edu", "Psychology", "6"),
        ("Luis Herrera", "luis.herrera@universidad.edu", "Law", "2"),
        ("Ana Rodriguez", "ana.rodriguez@universidad.edu", "Medicine", "8"),
        ("Carlos Mendoza", "carlos.mendoza@universidad.edu", "Engineering", "4"),
        ("Sofia Ramirez", "sofia.ramirez@universidad.edu", "Architecture", "3"),
    ];

    // Five daily surveys per student, oldest first: (mood, stress, sleep).
    let histories: [[(f64, f64, f64); 5]; 5] = [
        [(3.5, 3.5, 3.8), (2.8, 4.1, 2.5), (2.5, 4.2, 3.0), (2.1, 4.5, 3.2), (2.0, 4.8, 3.0)],
        [(3.0, 3.8, 3.0), (2.0, 3.6, 2.5), (1.9, 3.8, 2.4), (2.1, 3.8, 2.5), (1.8, 3.9, 2.2)],
        [(3.4, 4.0, 2.4), (3.3, 4.1, 1.9), (3.2, 4.1, 1.8), (3.2, 4.0, 1.7), (3.1, 4.1, 1.8)],
        [(4.1, 2.1, 4.0), (4.0, 2.5, 3.9), (4.2, 2.0, 4.1), (3.9, 2.2, 4.0), (4.1, 2.3, 4.2)],
        [(4.5, 1.5, 4.6), (4.6, 1.2, 4.8), (4.4, 1.8, 4.5), (4.7, 1.4, 4.9), (4.5, 1.6, 4.7)],
    ];

    let today = Utc::now();

    for ((name, email, program, semester), history) in students.iter().zip(histories.iter()) {
        let student_id = upsert_student(pool, name, email, program, semester).await?;

        for (index, (mood, stress, sleep)) in history.iter().enumerate() {
            let days_ago = (history.len() - index) as i64;
            let scores = MetricScores {
                mood: MetricScore::new(MetricKind::Mood, *mood, scales.for_kind(MetricKind::Mood))?,
                stress: MetricScore::new(
                    MetricKind::Stress,
                    *stress,
                    scales.for_kind(MetricKind::Stress),
                )?,
                sleep: MetricScore::new(
                    MetricKind::Sleep,
                    *sleep,
                    scales.for_kind(MetricKind::Sleep),
                )?,
                energy: None,
            };
            let source_key = format!("seed-{email}-{index}");
            insert_response(
                pool,
                student_id,
                today - Duration::days(days_ago),
                &scores,
                &BTreeMap::new(),
                &source_key,
            )
            .await?;
        }
    }

    tracing::info!(students = students.len(), "seed data inserted");
    Ok(())
}

/// Stable key for a CSV row that carries none, so re-imports are no-ops.
fn derived_source_key(email: &str, submitted_on: NaiveDate, scores: &MetricScores) -> String {
    let energy = scores
        .energy
        .map(|score| score.value().to_string())
        .unwrap_or_default();
    let content = format!(
        "{}|{}|{}|{}|{}|{}",
        email.trim().to_ascii_lowercase(),
        submitted_on,
        scores.mood.value(),
        scores.stress.value(),
        scores.sleep.value(),
        energy
    );
    format!("import-{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()))
}

fn score_from_input(
    kind: MetricKind,
    value: f64,
    scales: &MetricScales,
    mode: ImportMode,
    line: usize,
) -> anyhow::Result<MetricScore> {
    let scale = scales.for_kind(kind);
    match mode {
        ImportMode::Strict => MetricScore::new(kind, value, scale)
            .with_context(|| format!("row {line}: rejected survey response")),
        ImportMode::Clamp => {
            let (score, clamped) = MetricScore::clamped(kind, value, scale)
                .with_context(|| format!("row {line}: rejected survey response"))?;
            if clamped {
                tracing::warn!(
                    line,
                    metric = %kind,
                    value,
                    clamped_to = score.value(),
                    "clamped out-of-range score"
                );
            }
            Ok(score)
        }
    }
}

pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    scales: &MetricScales,
    mode: ImportMode,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        program: String,
        semester: String,
        submitted_on: NaiveDate,
        mood: f64,
        stress: f64,
        sleep: f64,
        energy: Option<f64>,
        answers: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    // Every row is validated before the first write.
    let mut prepared = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.with_context(|| format!("row {line}: malformed CSV record"))?;

        let scores = MetricScores {
            mood: score_from_input(MetricKind::Mood, row.mood, scales, mode, line)?,
            stress: score_from_input(MetricKind::Stress, row.stress, scales, mode, line)?,
            sleep: score_from_input(MetricKind::Sleep, row.sleep, scales, mode, line)?,
            energy: row
                .energy
                .map(|value| score_from_input(MetricKind::Energy, value, scales, mode, line))
                .transpose()?,
        };

        let answers: BTreeMap<String, String> = match row.answers.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
                .with_context(|| format!("row {line}: answers must be a JSON object of strings"))?,
            _ => BTreeMap::new(),
        };

        let submitted_at = row
            .submitted_on
            .and_hms_opt(12, 0, 0)
            .context("invalid submission time")?
            .and_utc();

        let source_key = match row.source_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => derived_source_key(&row.email, row.submitted_on, &scores),
        };

        prepared.push((row, scores, answers, submitted_at, source_key));
    }

    let mut inserted = 0usize;

    for (row, scores, answers, submitted_at, source_key) in prepared {
        let student_id =
            upsert_student(pool, &row.full_name, &row.email, &row.program, &row.semester).await?;

        if insert_response(pool, student_id, submitted_at, &scores, &answers, &source_key).await? {
            inserted += 1;
        } else {
            tracing::debug!(%source_key, "skipped already imported response");
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "csv import finished");
    Ok(inserted)
}

pub async fn fetch_students(
    pool: &PgPool,
    program: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from(
        "SELECT id, full_name, email, program, semester FROM wellbeing.students",
    );

    if program.is_some() {
        query.push_str(" WHERE program = $1");
    } else if email.is_some() {
        query.push_str(" WHERE email = $1");
    }
    query.push_str(" ORDER BY full_name");

    let mut rows = sqlx::query(&query);
    if let Some(value) = program.or(email) {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let students = records
        .into_iter()
        .map(|row| Student {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            program: row.get("program"),
            semester: row.get("semester"),
        })
        .collect();

    Ok(students)
}

fn response_from_row(row: &PgRow, scales: &MetricScales) -> anyhow::Result<SurveyResponse> {
    let id: Uuid = row.get("id");
    let stored = |kind: MetricKind, value: f64| {
        MetricScore::new(kind, value, scales.for_kind(kind))
            .with_context(|| format!("survey response {id} holds an invalid score"))
    };

    let energy: Option<f64> = row.get("energy");
    let Json(answers): Json<BTreeMap<String, String>> = row.get("answers");

    Ok(SurveyResponse {
        id,
        subject_id: row.get("student_id"),
        submitted_at: row.get("submitted_at"),
        answers,
        scores: MetricScores {
            mood: stored(MetricKind::Mood, row.get("mood"))?,
            stress: stored(MetricKind::Stress, row.get("stress"))?,
            sleep: stored(MetricKind::Sleep, row.get("sleep"))?,
            energy: energy.map(|value| stored(MetricKind::Energy, value)).transpose()?,
        },
    })
}

/// Responses since `since`, oldest first.
pub async fn fetch_responses(
    pool: &PgPool,
    since: DateTime<Utc>,
    program: Option<&str>,
    email: Option<&str>,
    scales: &MetricScales,
) -> anyhow::Result<Vec<SurveyResponse>> {
    let mut query = String::from(
        "SELECT r.id, r.student_id, r.submitted_at, r.mood, r.stress, r.sleep, r.energy, r.answers \
         FROM wellbeing.survey_responses r \
         JOIN wellbeing.students st ON st.id = r.student_id \
         WHERE r.submitted_at >= $1",
    );

    if program.is_some() {
        query.push_str(" AND st.program = $2");
    } else if email.is_some() {
        query.push_str(" AND st.email = $2");
    }
    query.push_str(" ORDER BY r.submitted_at");

    let mut rows = sqlx::query(&query).bind(since);
    if let Some(value) = program.or(email) {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    records
        .iter()
        .map(|row| response_from_row(row, scales))
        .collect()
}

fn alert_from_row(row: &PgRow) -> anyhow::Result<Alert> {
    let kind: String = row.get("kind");
    let severity: String = row.get("severity");
    let status: String = row.get("status");

    Ok(Alert {
        id: row.get("id"),
        subject_id: row.get("student_id"),
        kind: kind.parse()?,
        severity: severity.parse()?,
        description: row.get("description"),
        created_at: row.get("created_at"),
        status: status.parse()?,
        resolved_at: row.get("resolved_at"),
        snapshot: row
            .get::<Option<Json<AlertSnapshot>>, _>("snapshot")
            .map(|Json(snapshot)| snapshot),
    })
}

pub async fn fetch_alerts(
    pool: &PgPool,
    status: Option<AlertStatus>,
) -> anyhow::Result<Vec<Alert>> {
    let mut query = String::from(
        "SELECT id, student_id, kind, severity, description, created_at, status, resolved_at, snapshot \
         FROM wellbeing.alerts",
    );
    if status.is_some() {
        query.push_str(" WHERE status = $1");
    }
    query.push_str(" ORDER BY created_at DESC");

    let mut rows = sqlx::query(&query);
    if let Some(value) = status {
        rows = rows.bind(value.as_str());
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(alert_from_row).collect()
}

/// Every alert raised for one student, newest first, active and resolved.
pub async fn fetch_alerts_for_student(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<Alert>> {
    let records = sqlx::query(
        r#"
        SELECT id, student_id, kind, severity, description, created_at, status, resolved_at, snapshot
        FROM wellbeing.alerts
        WHERE student_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    records.iter().map(alert_from_row).collect()
}

pub async fn fetch_student_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Option<Student>> {
    Ok(fetch_students(pool, None, Some(email)).await?.into_iter().next())
}

/// The newest `limit` responses of one student, returned oldest first.
pub async fn fetch_recent_responses(
    pool: &PgPool,
    student_id: Uuid,
    limit: i64,
    scales: &MetricScales,
) -> anyhow::Result<Vec<SurveyResponse>> {
    let records = sqlx::query(
        r#"
        SELECT id, student_id, submitted_at, mood, stress, sleep, energy, answers
        FROM wellbeing.survey_responses
        WHERE student_id = $1
        ORDER BY submitted_at DESC
        LIMIT $2
        "#,
    )
    .bind(student_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut responses = records
        .iter()
        .map(|row| response_from_row(row, scales))
        .collect::<anyhow::Result<Vec<_>>>()?;
    responses.reverse();
    Ok(responses)
}

/// Returns false when an active alert of the same kind already exists.
pub async fn insert_alert(pool: &PgPool, alert: &Alert) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO wellbeing.alerts
        (id, student_id, kind, severity, description, created_at, status, resolved_at, snapshot)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (student_id, kind) WHERE status = 'active' DO NOTHING
        "#,
    )
    .bind(alert.id)
    .bind(alert.subject_id)
    .bind(alert.kind.as_str())
    .bind(alert.severity.as_str())
    .bind(&alert.description)
    .bind(alert.created_at)
    .bind(alert.status.as_str())
    .bind(alert.resolved_at)
    .bind(alert.snapshot.map(Json))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Marks an active alert resolved. Returns false if it was missing or already resolved.
pub async fn resolve_alert(pool: &PgPool, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE wellbeing.alerts
        SET status = 'resolved', resolved_at = $2
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(id)
    .bind(at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_weekly_trends(
    pool: &PgPool,
    since: DateTime<Utc>,
    program: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<WeeklyTrend>> {
    let mut query = String::from(
        "SELECT date_trunc('week', r.submitted_at)::date AS week_start, \
         COUNT(*) AS response_count, \
         AVG(r.mood) AS avg_mood, \
         AVG(r.stress) AS avg_stress, \
         AVG(r.sleep) AS avg_sleep, \
         COUNT(DISTINCT r.student_id) AS student_count \
         FROM wellbeing.survey_responses r \
         JOIN wellbeing.students st ON st.id = r.student_id \
         WHERE r.submitted_at >= $1",
    );

    if program.is_some() {
        query.push_str(" AND st.program = $2");
    } else if email.is_some() {
        query.push_str(" AND st.email = $2");
    }
    query.push_str(" GROUP BY week_start ORDER BY week_start");

    let mut rows = sqlx::query(&query).bind(since);
    if let Some(value) = program.or(email) {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let trends = records
        .into_iter()
        .map(|row| WeeklyTrend {
            week_start: row.get("week_start"),
            response_count: row.get("response_count"),
            avg_mood: row.get("avg_mood"),
            avg_stress: row.get("avg_stress"),
            avg_sleep: row.get("avg_sleep"),
            student_count: row.get("student_count"),
        })
        .collect();

    Ok(trends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreScale;

    #[test]
    fn strict_import_rejects_out_of_range_scores() {
        let scales = MetricScales::default();
        let err = score_from_input(MetricKind::Stress, 0.0, &scales, ImportMode::Strict, 4)
            .unwrap_err();
        assert!(format!("{err:#}").contains("row 4"));
        assert!(format!("{err:#}").contains("Invalid stress score 0"));
    }

    #[test]
    fn zero_based_stress_scale_accepts_zero() {
        let scales = MetricScales {
            stress: ScoreScale::ZERO_BASED,
        };
        let score =
            score_from_input(MetricKind::Stress, 0.0, &scales, ImportMode::Strict, 2).unwrap();
        assert_eq!(score.value(), 0.0);
    }

    fn scores(mood: f64, stress: f64, sleep: f64) -> MetricScores {
        let scale = ScoreScale::STANDARD;
        MetricScores {
            mood: MetricScore::new(MetricKind::Mood, mood, scale).unwrap(),
            stress: MetricScore::new(MetricKind::Stress, stress, scale).unwrap(),
            sleep: MetricScore::new(MetricKind::Sleep, sleep, scale).unwrap(),
            energy: None,
        }
    }

    #[test]
    fn derived_source_key_is_stable_across_imports() {
        let email = "maria.gonzalez@universidad.edu";
        let day = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let first = derived_source_key(" Maria.Gonzalez@universidad.edu ", day, &scores(2.1, 4.8, 3.1));
        let second = derived_source_key(email, day, &scores(2.1, 4.8, 3.1));
        assert_eq!(first, second);
        assert!(first.starts_with("import-"));

        let other_day = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_ne!(first, derived_source_key(email, other_day, &scores(2.1, 4.8, 3.1)));
        assert_ne!(first, derived_source_key(email, day, &scores(2.1, 4.7, 3.1)));
    }

    #[test]
    fn clamp_import_pulls_scores_into_range() {
        let scales = MetricScales::default();
        let score =
            score_from_input(MetricKind::Mood, 5.4, &scales, ImportMode::Clamp, 3).unwrap();
        assert_eq!(score.value(), 5.0);
        assert!(
            score_from_input(MetricKind::Mood, f64::NAN, &scales, ImportMode::Clamp, 3).is_err()
        );
    }
}
