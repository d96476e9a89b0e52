use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClassifyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Mood,
    Stress,
    Sleep,
    Energy,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Mood => "mood",
            MetricKind::Stress => "stress",
            MetricKind::Sleep => "sleep",
            MetricKind::Energy => "energy",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            MetricKind::Stress => Direction::HigherIsWorse,
            MetricKind::Mood | MetricKind::Sleep | MetricKind::Energy => Direction::HigherIsBetter,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of the scale is the concerning one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    HigherIsWorse,
    HigherIsBetter,
}

/// Closed range a metric is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreScale {
    pub min: f64,
    pub max: f64,
}

impl ScoreScale {
    pub const STANDARD: ScoreScale = ScoreScale { min: 1.0, max: 5.0 };
    pub const ZERO_BASED: ScoreScale = ScoreScale { min: 0.0, max: 5.0 };

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn check(&self, metric: &'static str, value: f64) -> Result<f64, ClassifyError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(ClassifyError::InvalidMetricRange {
                metric,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

impl Default for ScoreScale {
    fn default() -> Self {
        ScoreScale::STANDARD
    }
}

/// Declared domain of every metric, with stress configurable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricScales {
    pub stress: ScoreScale,
}

impl MetricScales {
    pub fn for_kind(&self, kind: MetricKind) -> ScoreScale {
        match kind {
            MetricKind::Stress => self.stress,
            _ => ScoreScale::STANDARD,
        }
    }
}

impl Default for MetricScales {
    fn default() -> Self {
        MetricScales {
            stress: ScoreScale::STANDARD,
        }
    }
}

/// A self-reported score that has been checked against its scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricScore {
    kind: MetricKind,
    value: f64,
}

impl MetricScore {
    pub fn new(kind: MetricKind, value: f64, scale: ScoreScale) -> Result<Self, ClassifyError> {
        let value = scale.check(kind.as_str(), value)?;
        Ok(MetricScore { kind, value })
    }

    /// Clamps into the scale. The flag is true when the input had to move.
    /// Non-finite input cannot be clamped meaningfully and is still rejected.
    pub fn clamped(
        kind: MetricKind,
        value: f64,
        scale: ScoreScale,
    ) -> Result<(Self, bool), ClassifyError> {
        if !value.is_finite() {
            return Err(ClassifyError::InvalidMetricRange {
                metric: kind.as_str(),
                value,
                min: scale.min,
                max: scale.max,
            });
        }
        let clamped = value.clamp(scale.min, scale.max);
        Ok((MetricScore { kind, value: clamped }, clamped != value))
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricScores {
    pub mood: MetricScore,
    pub stress: MetricScore,
    pub sleep: MetricScore,
    pub energy: Option<MetricScore>,
}

impl MetricScores {
    pub fn get(&self, kind: MetricKind) -> Option<MetricScore> {
        match kind {
            MetricKind::Mood => Some(self.mood),
            MetricKind::Stress => Some(self.stress),
            MetricKind::Sleep => Some(self.sleep),
            MetricKind::Energy => self.energy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub program: String,
    pub semester: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyResponse {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub answers: BTreeMap<String, String>,
    pub scores: MetricScores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellbeingStatus {
    Excellent,
    Good,
    Attention,
    Critical,
}

impl WellbeingStatus {
    pub const ALL: [WellbeingStatus; 4] = [
        WellbeingStatus::Excellent,
        WellbeingStatus::Good,
        WellbeingStatus::Attention,
        WellbeingStatus::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WellbeingStatus::Excellent => "excellent",
            WellbeingStatus::Good => "good",
            WellbeingStatus::Attention => "attention",
            WellbeingStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for WellbeingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => anyhow::bail!("unknown severity '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Stress,
    Mood,
    Sleep,
}

impl AlertKind {
    pub const ALL: [AlertKind; 3] = [AlertKind::Stress, AlertKind::Mood, AlertKind::Sleep];

    pub fn metric(self) -> MetricKind {
        match self {
            AlertKind::Stress => MetricKind::Stress,
            AlertKind::Mood => MetricKind::Mood,
            AlertKind::Sleep => MetricKind::Sleep,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.metric().as_str()
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stress" => Ok(AlertKind::Stress),
            "mood" => Ok(AlertKind::Mood),
            "sleep" => Ok(AlertKind::Sleep),
            other => anyhow::bail!("unknown alert kind '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AlertStatus::Active),
            "resolved" => Ok(AlertStatus::Resolved),
            other => anyhow::bail!("unknown alert status '{other}'"),
        }
    }
}

/// Scores of the newest response in the streak that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub submitted_at: DateTime<Utc>,
    pub mood: f64,
    pub stress: f64,
    pub sleep: f64,
}

impl AlertSnapshot {
    pub fn of(response: &SurveyResponse) -> Self {
        AlertSnapshot {
            submitted_at: response.submitted_at,
            mood: response.scores.mood.value(),
            stress: response.scores.stress.value(),
            sleep: response.scores.sleep.value(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub kind: AlertKind,
    pub severity: Severity,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: AlertStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub snapshot: Option<AlertSnapshot>,
}

impl Alert {
    /// Staff action. Resolving twice keeps the first resolution time.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        if self.status == AlertStatus::Active {
            self.status = AlertStatus::Resolved;
            self.resolved_at = Some(at);
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct StudentSummary {
    pub student: Student,
    pub average_mood: Option<f64>,
    pub average_stress: Option<f64>,
    pub average_sleep: Option<f64>,
    pub status: Option<WellbeingStatus>,
    pub survey_count: usize,
    pub last_survey: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_students: usize,
    pub average_mood: Option<f64>,
    pub active_alerts: usize,
    pub high_alerts: usize,
    pub medium_alerts: usize,
    pub low_alerts: usize,
    pub status_counts: BTreeMap<WellbeingStatus, usize>,
}

#[derive(Debug, Clone)]
pub struct WeeklyTrend {
    pub week_start: NaiveDate,
    pub response_count: i64,
    pub avg_mood: f64,
    pub avg_stress: f64,
    pub avg_sleep: f64,
    pub student_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn scale_rejects_values_outside_declared_range() {
        assert_matches!(
            MetricScore::new(MetricKind::Mood, 5.5, ScoreScale::STANDARD),
            Err(ClassifyError::InvalidMetricRange { metric: "mood", .. })
        );
        assert_matches!(
            MetricScore::new(MetricKind::Stress, 0.0, ScoreScale::STANDARD),
            Err(ClassifyError::InvalidMetricRange { .. })
        );
        assert!(MetricScore::new(MetricKind::Stress, 0.0, ScoreScale::ZERO_BASED).is_ok());
        assert!(MetricScore::new(MetricKind::Sleep, f64::NAN, ScoreScale::STANDARD).is_err());
    }

    #[test]
    fn clamping_reports_adjustment() {
        let (score, moved) =
            MetricScore::clamped(MetricKind::Sleep, 6.2, ScoreScale::STANDARD).unwrap();
        assert_eq!(score.value(), 5.0);
        assert!(moved);

        let (score, moved) =
            MetricScore::clamped(MetricKind::Sleep, 3.0, ScoreScale::STANDARD).unwrap();
        assert_eq!(score.value(), 3.0);
        assert!(!moved);

        assert!(MetricScore::clamped(MetricKind::Sleep, f64::INFINITY, ScoreScale::STANDARD).is_err());
    }

    #[test]
    fn stress_is_the_only_inverted_metric() {
        assert_eq!(MetricKind::Stress.direction(), Direction::HigherIsWorse);
        assert_eq!(MetricKind::Mood.direction(), Direction::HigherIsBetter);
        assert_eq!(MetricKind::Sleep.direction(), Direction::HigherIsBetter);
        assert_eq!(MetricKind::Energy.direction(), Direction::HigherIsBetter);
    }

    #[test]
    fn severity_orders_low_to_high() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn resolving_keeps_first_timestamp() {
        let first = Utc::now();
        let mut alert = Alert {
            id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            kind: AlertKind::Stress,
            severity: Severity::High,
            description: "stress high".to_string(),
            created_at: first,
            status: AlertStatus::Active,
            resolved_at: None,
            snapshot: None,
        };
        alert.resolve(first);
        alert.resolve(first + chrono::Duration::hours(1));
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert_eq!(alert.resolved_at, Some(first));
        assert!(!alert.is_active());
    }
}
