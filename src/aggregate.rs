use crate::classify;
use crate::error::ClassifyError;
use crate::models::{
    Alert, DashboardStats, MetricKind, Severity, Student, StudentSummary, SurveyResponse,
};

/// Mean of the newest `window` values. `values` is ordered oldest first.
pub fn rolling_average(values: &[f64], window: usize) -> Option<f64> {
    let window = window.max(1).min(values.len());
    if window == 0 {
        return None;
    }

    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Builds a per-student view over their newest `window` responses.
///
/// `responses` may arrive in any order and may include other students; only
/// this student's rows are used. Status comes from the averaged mood.
pub fn summarize_student(
    student: &Student,
    responses: &[SurveyResponse],
    window: usize,
) -> Result<StudentSummary, ClassifyError> {
    let mut own: Vec<&SurveyResponse> = responses
        .iter()
        .filter(|response| response.subject_id == student.id)
        .collect();
    own.sort_by_key(|response| response.submitted_at);

    let series = |kind: MetricKind| -> Vec<f64> {
        own.iter()
            .filter_map(|response| response.scores.get(kind))
            .map(|score| score.value())
            .collect()
    };

    let average_mood = rolling_average(&series(MetricKind::Mood), window);
    let status = average_mood.map(classify::classify_status).transpose()?;

    Ok(StudentSummary {
        student: student.clone(),
        average_mood,
        average_stress: rolling_average(&series(MetricKind::Stress), window),
        average_sleep: rolling_average(&series(MetricKind::Sleep), window),
        status,
        survey_count: own.len(),
        last_survey: own.last().map(|response| response.submitted_at),
    })
}

pub fn dashboard_stats(summaries: &[StudentSummary], alerts: &[Alert]) -> DashboardStats {
    let mut stats = DashboardStats {
        total_students: summaries.len(),
        ..DashboardStats::default()
    };

    let moods: Vec<f64> = summaries.iter().filter_map(|s| s.average_mood).collect();
    if !moods.is_empty() {
        stats.average_mood = Some(moods.iter().sum::<f64>() / moods.len() as f64);
    }

    for summary in summaries {
        if let Some(status) = summary.status {
            *stats.status_counts.entry(status).or_insert(0) += 1;
        }
    }

    for alert in alerts.iter().filter(|alert| alert.is_active()) {
        stats.active_alerts += 1;
        match alert.severity {
            Severity::High => stats.high_alerts += 1,
            Severity::Medium => stats.medium_alerts += 1,
            Severity::Low => stats.low_alerts += 1,
        }
    }

    stats
}
