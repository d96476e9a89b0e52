//! Display labels and colours for statuses, severities and raw scores.
//!
//! Kept apart from `classify` so threshold logic has no rendering dependency.

use crate::classify;
use crate::error::ClassifyError;
use crate::models::{MetricKind, Severity, WellbeingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Neutral,
    Amber,
    Red,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Green => "green",
            Tone::Neutral => "neutral",
            Tone::Amber => "amber",
            Tone::Red => "red",
        }
    }
}

pub fn status_tone(status: WellbeingStatus) -> Tone {
    match status {
        WellbeingStatus::Excellent => Tone::Green,
        WellbeingStatus::Good => Tone::Neutral,
        WellbeingStatus::Attention => Tone::Amber,
        WellbeingStatus::Critical => Tone::Red,
    }
}

pub fn status_label(status: WellbeingStatus) -> &'static str {
    match status {
        WellbeingStatus::Excellent => "Excellent",
        WellbeingStatus::Good => "Good",
        WellbeingStatus::Attention => "Needs attention",
        WellbeingStatus::Critical => "Critical",
    }
}

pub fn severity_tone(severity: Severity) -> Tone {
    match severity {
        Severity::High => Tone::Red,
        Severity::Medium => Tone::Amber,
        Severity::Low => Tone::Neutral,
    }
}

pub fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
    }
}

/// Colour for a single raw score, read in the metric's own direction.
pub fn score_tone(kind: MetricKind, score: f64) -> Result<Tone, ClassifyError> {
    let severity = classify::classify_metric_severity(kind, score)?;
    Ok(match severity {
        Severity::Low => Tone::Green,
        Severity::Medium => Tone::Amber,
        Severity::High => Tone::Red,
    })
}
