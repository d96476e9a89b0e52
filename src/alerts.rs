use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify;
use crate::error::ClassifyError;
use crate::models::{Alert, AlertKind, AlertSnapshot, AlertStatus, Severity, SurveyResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Number of newest consecutive responses that must all breach.
    pub window_days: usize,
    /// Weakest severity that still raises an alert.
    pub min_severity: Severity,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        AlertPolicy {
            window_days: 3,
            min_severity: Severity::Medium,
        }
    }
}

impl AlertPolicy {
    /// Severities to try, strongest first, stopping at `min_severity`.
    fn candidate_severities(&self) -> impl Iterator<Item = Severity> + '_ {
        [Severity::High, Severity::Medium, Severity::Low]
            .into_iter()
            .filter(move |severity| *severity >= self.min_severity)
    }
}

/// Raises new alerts for one subject from their response history.
///
/// At most one alert per kind is raised, at the strongest severity the
/// policy window sustains. `known_alerts` holds the subject's existing
/// alerts of any status. A kind with an active alert is skipped, and a kind
/// whose latest alert was created after the newest response is skipped too,
/// so a resolved alert only comes back once a fresh survey breaches again.
/// Existing alerts are never touched.
pub fn evaluate_subject(
    subject_id: Uuid,
    responses: &[SurveyResponse],
    policy: &AlertPolicy,
    known_alerts: &[Alert],
    now: DateTime<Utc>,
) -> Result<Vec<Alert>, ClassifyError> {
    let mut own: Vec<&SurveyResponse> = responses
        .iter()
        .filter(|response| response.subject_id == subject_id)
        .collect();
    own.sort_by_key(|response| response.submitted_at);

    let Some(newest) = own.last() else {
        return Ok(Vec::new());
    };

    let mut raised = Vec::new();

    for kind in AlertKind::ALL {
        let latest = known_alerts
            .iter()
            .filter(|alert| alert.subject_id == subject_id && alert.kind == kind)
            .max_by_key(|alert| alert.created_at);
        if let Some(latest) = latest {
            if latest.is_active() || newest.submitted_at <= latest.created_at {
                continue;
            }
        }

        let metric = kind.metric();
        let history: Vec<f64> = own
            .iter()
            .filter_map(|response| response.scores.get(metric))
            .map(|score| score.value())
            .collect();

        for severity in policy.candidate_severities() {
            if classify::should_raise_alert(
                &history,
                metric.direction(),
                severity,
                policy.window_days,
            )? {
                let streak = classify::streak_length(&history, metric.direction(), severity)?;
                raised.push(Alert {
                    id: Uuid::new_v4(),
                    subject_id,
                    kind,
                    severity,
                    description: describe(kind, severity, &history, streak),
                    created_at: now,
                    status: AlertStatus::Active,
                    resolved_at: None,
                    snapshot: Some(AlertSnapshot::of(newest)),
                });
                break;
            }
        }
    }

    Ok(raised)
}

fn describe(kind: AlertKind, severity: Severity, history: &[f64], streak: usize) -> String {
    let latest = history.last().copied().unwrap_or_default();
    let level = match kind {
        AlertKind::Stress => match severity {
            Severity::High => "High stress",
            Severity::Medium => "Elevated stress",
            Severity::Low => "Stress",
        },
        AlertKind::Mood => match severity {
            Severity::High => "Persistently low mood",
            Severity::Medium => "Low mood",
            Severity::Low => "Mood",
        },
        AlertKind::Sleep => match severity {
            Severity::High => "Very poor sleep",
            Severity::Medium => "Poor sleep",
            Severity::Low => "Sleep",
        },
    };
    format!("{level} ({latest:.1}/5) reported for {streak} consecutive surveys")
}
