use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregate;
use crate::models::{Alert, StudentSummary, SurveyResponse, WeeklyTrend, WellbeingStatus};
use crate::render;

/// Students sorted so the most concerning come first: by status, then by
/// lowest averaged mood. Students without responses go last.
pub fn rank_by_concern(summaries: &[StudentSummary]) -> Vec<&StudentSummary> {
    let mut ranked: Vec<&StudentSummary> = summaries.iter().collect();
    ranked.sort_by(|a, b| {
        let rank = |s: &StudentSummary| s.status.map(|status| status as i32).unwrap_or(-1);
        rank(b).cmp(&rank(a)).then_with(|| {
            a.average_mood
                .unwrap_or(f64::MAX)
                .partial_cmp(&b.average_mood.unwrap_or(f64::MAX))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    ranked
}

fn fmt_score(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}/5"))
}

pub fn build_report(
    scope: Option<&str>,
    since_days: i64,
    cutoff: NaiveDate,
    summaries: &[StudentSummary],
    alerts: &[Alert],
    trends: &[WeeklyTrend],
) -> String {
    let stats = aggregate::dashboard_stats(summaries, alerts);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all programs");

    let _ = writeln!(output, "# Student Wellbeing Report");
    let _ = writeln!(
        output,
        "Generated for {} (responses since {}, {} days)",
        scope_label, cutoff, since_days
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Students: {}", stats.total_students);
    let _ = writeln!(output, "- Average mood: {}", fmt_score(stats.average_mood));
    let _ = writeln!(
        output,
        "- Active alerts: {} (high {}, medium {}, low {})",
        stats.active_alerts, stats.high_alerts, stats.medium_alerts, stats.low_alerts
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Distribution");
    for status in WellbeingStatus::ALL {
        let count = stats.status_counts.get(&status).copied().unwrap_or(0);
        let _ = writeln!(output, "- {}: {}", render::status_label(status), count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");

    let flagged: Vec<&StudentSummary> = rank_by_concern(summaries)
        .into_iter()
        .filter(|s| {
            matches!(
                s.status,
                Some(WellbeingStatus::Attention | WellbeingStatus::Critical)
            )
        })
        .collect();

    if flagged.is_empty() {
        let _ = writeln!(output, "No students below a good status in this window.");
    } else {
        for summary in flagged.iter().take(10) {
            let status = summary.status.map(render::status_label).unwrap_or("Unknown");
            let _ = writeln!(
                output,
                "- {} ({}, {}) {}: mood {}, stress {}, sleep {} across {} surveys",
                summary.student.full_name,
                summary.student.email,
                summary.student.program,
                status,
                fmt_score(summary.average_mood),
                fmt_score(summary.average_stress),
                fmt_score(summary.average_sleep),
                summary.survey_count
            );
        }
    }

    let mut active: Vec<&Alert> = alerts.iter().filter(|alert| alert.is_active()).collect();
    active.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Alerts");

    if active.is_empty() {
        let _ = writeln!(output, "No active alerts.");
    } else {
        for alert in active {
            let name = summaries
                .iter()
                .find(|s| s.student.id == alert.subject_id)
                .map(|s| s.student.full_name.as_str())
                .unwrap_or("Unknown student");
            let _ = writeln!(
                output,
                "- [{}] {} ({}) on {}: {}",
                render::severity_label(alert.severity),
                name,
                alert.kind,
                alert.created_at.date_naive(),
                alert.description
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Trends");

    if trends.is_empty() {
        let _ = writeln!(output, "No survey responses recorded for this window.");
    } else {
        for trend in trends {
            let _ = writeln!(
                output,
                "- Week of {}: {} responses from {} students (mood {:.1}, stress {:.1}, sleep {:.1})",
                trend.week_start,
                trend.response_count,
                trend.student_count,
                trend.avg_mood,
                trend.avg_stress,
                trend.avg_sleep
            );
        }
    }

    output
}

/// Detail view for one student: summary, recent surveys (newest first) and
/// the full alert history.
pub fn student_detail(
    summary: &StudentSummary,
    responses: &[SurveyResponse],
    alerts: &[Alert],
) -> String {
    let mut output = String::new();
    let student = &summary.student;
    let status = summary
        .status
        .map(render::status_label)
        .unwrap_or("No recent surveys");

    let _ = writeln!(output, "{} <{}>", student.full_name, student.email);
    let _ = writeln!(
        output,
        "Program: {}, semester {}",
        student.program, student.semester
    );
    let _ = writeln!(output, "Status: {status}");
    let _ = writeln!(
        output,
        "Averages: mood {}, stress {}, sleep {} across {} surveys",
        fmt_score(summary.average_mood),
        fmt_score(summary.average_stress),
        fmt_score(summary.average_sleep),
        summary.survey_count
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "Recent surveys:");
    if responses.is_empty() {
        let _ = writeln!(output, "  none");
    }
    for response in responses.iter().rev() {
        let scores = &response.scores;
        let energy = scores
            .energy
            .map(|score| format!(", energy {:.1}/5", score.value()))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "  {}: mood {:.1}/5, stress {:.1}/5, sleep {:.1}/5{}",
            response.submitted_at.date_naive(),
            scores.mood.value(),
            scores.stress.value(),
            scores.sleep.value(),
            energy
        );
        for (question, answer) in &response.answers {
            let _ = writeln!(output, "    {question}: {answer}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Alerts:");
    if alerts.is_empty() {
        let _ = writeln!(output, "  none");
    }
    let mut history: Vec<&Alert> = alerts.iter().collect();
    history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    for alert in history {
        let resolved = alert
            .resolved_at
            .map(|at| format!(", resolved {}", at.date_naive()))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "  [{}] {} {} on {}{}: {}",
            render::severity_label(alert.severity),
            alert.kind,
            alert.status,
            alert.created_at.date_naive(),
            resolved,
            alert.description
        );
    }

    output
}
