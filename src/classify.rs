//! Threshold classification of self-reported wellbeing scores.
//!
//! Every function here is pure: same input, same output, no logging.

use crate::error::ClassifyError;
use crate::models::{Direction, MetricKind, ScoreScale, Severity, WellbeingStatus};

/// Domain accepted by the classifier. Wide enough for the zero-based stress scale.
pub const CLASSIFIER_DOMAIN: ScoreScale = ScoreScale::ZERO_BASED;

/// Maps an already-averaged mood score to a status.
///
/// `[4, 5]` excellent, `[3, 4)` good, `[2, 3)` attention, `[0, 2)` critical.
pub fn classify_status(average_mood: f64) -> Result<WellbeingStatus, ClassifyError> {
    let score = CLASSIFIER_DOMAIN.check("mood", average_mood)?;

    let status = if score >= 4.0 {
        WellbeingStatus::Excellent
    } else if score >= 3.0 {
        WellbeingStatus::Good
    } else if score >= 2.0 {
        WellbeingStatus::Attention
    } else {
        WellbeingStatus::Critical
    };

    Ok(status)
}

/// Severity of a single score, read in the metric's direction.
///
/// Higher-is-worse: `>= 4` high, `[3, 4)` medium, else low.
/// Higher-is-better: `<= 2` high, `(2, 3]` medium, else low.
pub fn classify_severity(score: f64, direction: Direction) -> Result<Severity, ClassifyError> {
    let label = match direction {
        Direction::HigherIsWorse => "higher-is-worse",
        Direction::HigherIsBetter => "higher-is-better",
    };
    severity_in(label, score, direction)
}

/// Severity of a score for a known metric; errors name the metric.
pub fn classify_metric_severity(kind: MetricKind, score: f64) -> Result<Severity, ClassifyError> {
    severity_in(kind.as_str(), score, kind.direction())
}

fn severity_in(
    metric: &'static str,
    score: f64,
    direction: Direction,
) -> Result<Severity, ClassifyError> {
    let score = CLASSIFIER_DOMAIN.check(metric, score)?;

    let severity = match direction {
        Direction::HigherIsWorse => {
            if score >= 4.0 {
                Severity::High
            } else if score >= 3.0 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
        Direction::HigherIsBetter => {
            if score <= 2.0 {
                Severity::High
            } else if score <= 3.0 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
    };

    Ok(severity)
}

/// True when each of the newest `min_consecutive_days` entries of `history`
/// (oldest first) classifies at or above `threshold`.
///
/// Scans backward from the newest entry and stops at the first entry that
/// does not qualify; entries older than that are never inspected.
pub fn should_raise_alert(
    history: &[f64],
    direction: Direction,
    threshold: Severity,
    min_consecutive_days: usize,
) -> Result<bool, ClassifyError> {
    if min_consecutive_days == 0 || history.len() < min_consecutive_days {
        return Ok(false);
    }

    for &score in history.iter().rev().take(min_consecutive_days) {
        if classify_severity(score, direction)? < threshold {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Number of newest consecutive entries classifying at or above `threshold`.
///
/// Scans backward and stops at the first entry that does not qualify.
pub fn streak_length(
    history: &[f64],
    direction: Direction,
    threshold: Severity,
) -> Result<usize, ClassifyError> {
    let mut length = 0;
    for &score in history.iter().rev() {
        if classify_severity(score, direction)? < threshold {
            break;
        }
        length += 1;
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn grid() -> impl Iterator<Item = f64> {
        (0..=500).map(|step| step as f64 / 100.0)
    }

    #[test]
    fn status_partition_matches_bands() {
        for score in grid() {
            let expected = if score >= 4.0 {
                WellbeingStatus::Excellent
            } else if score >= 3.0 {
                WellbeingStatus::Good
            } else if score >= 2.0 {
                WellbeingStatus::Attention
            } else {
                WellbeingStatus::Critical
            };
            assert_eq!(classify_status(score).unwrap(), expected, "score {score}");
        }
    }

    #[test]
    fn status_boundaries_land_in_upper_band() {
        assert_eq!(classify_status(5.0).unwrap(), WellbeingStatus::Excellent);
        assert_eq!(classify_status(4.0).unwrap(), WellbeingStatus::Excellent);
        assert_eq!(classify_status(3.999).unwrap(), WellbeingStatus::Good);
        assert_eq!(classify_status(3.0).unwrap(), WellbeingStatus::Good);
        assert_eq!(classify_status(2.0).unwrap(), WellbeingStatus::Attention);
        assert_eq!(classify_status(1.999).unwrap(), WellbeingStatus::Critical);
        assert_eq!(classify_status(0.0).unwrap(), WellbeingStatus::Critical);
    }

    #[test]
    fn low_mood_follows_partition_and_is_stable() {
        // 2.1 sits in [2, 3); only sub-2 averages are critical.
        assert_eq!(classify_status(2.1).unwrap(), WellbeingStatus::Attention);
        assert_eq!(classify_status(1.9).unwrap(), WellbeingStatus::Critical);
        assert_eq!(classify_status(3.2).unwrap(), classify_status(3.2).unwrap());
    }

    #[test]
    fn out_of_domain_scores_are_rejected() {
        assert_matches!(
            classify_status(-0.1),
            Err(ClassifyError::InvalidMetricRange { metric: "mood", .. })
        );
        assert_matches!(classify_status(5.01), Err(ClassifyError::InvalidMetricRange { .. }));
        assert!(classify_status(f64::NAN).is_err());
        assert!(classify_severity(7.0, Direction::HigherIsWorse).is_err());
        assert!(classify_severity(-1.0, Direction::HigherIsBetter).is_err());
    }

    #[test]
    fn stress_severity_bands() {
        assert_eq!(classify_severity(4.0, Direction::HigherIsWorse).unwrap(), Severity::High);
        assert_eq!(classify_severity(3.8, Direction::HigherIsWorse).unwrap(), Severity::Medium);
        assert_eq!(classify_severity(3.0, Direction::HigherIsWorse).unwrap(), Severity::Medium);
        assert_eq!(classify_severity(2.9, Direction::HigherIsWorse).unwrap(), Severity::Low);
    }

    #[test]
    fn mood_severity_bands() {
        assert_eq!(classify_severity(1.8, Direction::HigherIsBetter).unwrap(), Severity::High);
        assert_eq!(classify_severity(2.0, Direction::HigherIsBetter).unwrap(), Severity::High);
        assert_eq!(classify_severity(2.5, Direction::HigherIsBetter).unwrap(), Severity::Medium);
        assert_eq!(classify_severity(3.0, Direction::HigherIsBetter).unwrap(), Severity::Medium);
        assert_eq!(classify_severity(3.2, Direction::HigherIsBetter).unwrap(), Severity::Low);
    }

    #[test]
    fn high_stress_is_not_read_as_good_mood() {
        // The same raw value means opposite things depending on direction.
        assert_eq!(classify_severity(4.5, Direction::HigherIsWorse).unwrap(), Severity::High);
        assert_eq!(classify_severity(4.5, Direction::HigherIsBetter).unwrap(), Severity::Low);
    }

    #[test]
    fn severity_is_monotone_in_direction() {
        let scores: Vec<f64> = grid().collect();
        for pair in scores.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            assert!(
                classify_severity(higher, Direction::HigherIsWorse).unwrap()
                    >= classify_severity(lower, Direction::HigherIsWorse).unwrap()
            );
            assert!(
                classify_severity(higher, Direction::HigherIsBetter).unwrap()
                    <= classify_severity(lower, Direction::HigherIsBetter).unwrap()
            );
        }
    }

    #[test]
    fn empty_history_never_alerts() {
        assert!(!should_raise_alert(&[], Direction::HigherIsWorse, Severity::Low, 3).unwrap());
    }

    #[test]
    fn partial_window_does_not_alert() {
        assert!(!should_raise_alert(&[4.5, 4.5], Direction::HigherIsWorse, Severity::High, 3).unwrap());
    }

    #[test]
    fn full_streak_alerts() {
        assert!(should_raise_alert(&[4.5, 4.5, 4.5], Direction::HigherIsWorse, Severity::High, 3).unwrap());
        assert!(should_raise_alert(&[4.5, 4.2, 4.8], Direction::HigherIsWorse, Severity::High, 3).unwrap());
    }

    #[test]
    fn single_gap_breaks_streak() {
        assert!(!should_raise_alert(&[4.5, 2.0, 4.5], Direction::HigherIsWorse, Severity::High, 3).unwrap());
    }

    #[test]
    fn only_the_tail_counts() {
        let history = [1.0, 1.5, 4.1, 4.4, 4.9];
        assert!(should_raise_alert(&history, Direction::HigherIsWorse, Severity::High, 3).unwrap());
        assert!(!should_raise_alert(&history, Direction::HigherIsWorse, Severity::High, 4).unwrap());
    }

    #[test]
    fn lower_threshold_accepts_higher_severities() {
        let history = [3.1, 4.6, 3.5];
        assert!(should_raise_alert(&history, Direction::HigherIsWorse, Severity::Medium, 3).unwrap());
        assert!(!should_raise_alert(&history, Direction::HigherIsWorse, Severity::High, 3).unwrap());
    }

    #[test]
    fn low_mood_streak_alerts() {
        let history = [2.0, 1.8, 1.5];
        assert!(should_raise_alert(&history, Direction::HigherIsBetter, Severity::High, 3).unwrap());
    }

    #[test]
    fn zero_window_never_alerts() {
        assert!(!should_raise_alert(&[4.5], Direction::HigherIsWorse, Severity::High, 0).unwrap());
    }

    #[test]
    fn scan_stops_before_older_entries() {
        // The invalid score sits behind a non-qualifying one and is never reached.
        let history = [9.0, 2.0, 4.5];
        assert!(!should_raise_alert(&history, Direction::HigherIsWorse, Severity::High, 3).unwrap());

        let history = [2.0, 9.0, 4.5];
        assert_matches!(
            should_raise_alert(&history, Direction::HigherIsWorse, Severity::High, 3),
            Err(ClassifyError::InvalidMetricRange { .. })
        );
    }

    #[test]
    fn metric_severity_names_the_metric_in_errors() {
        assert_eq!(classify_metric_severity(MetricKind::Stress, 4.2).unwrap(), Severity::High);
        assert_eq!(classify_metric_severity(MetricKind::Sleep, 4.2).unwrap(), Severity::Low);
        assert_matches!(
            classify_metric_severity(MetricKind::Sleep, 6.0),
            Err(ClassifyError::InvalidMetricRange { metric: "sleep", .. })
        );
        assert_matches!(
            classify_metric_severity(MetricKind::Stress, -0.5),
            Err(ClassifyError::InvalidMetricRange { metric: "stress", .. })
        );
    }

    #[test]
    fn streak_counts_the_whole_qualifying_tail() {
        let history = [2.0, 4.5, 4.5, 4.5, 4.5, 4.5, 4.5, 4.5];
        assert_eq!(streak_length(&history, Direction::HigherIsWorse, Severity::High).unwrap(), 7);
        assert_eq!(streak_length(&[4.5, 2.0], Direction::HigherIsWorse, Severity::High).unwrap(), 0);
        assert_eq!(streak_length(&[], Direction::HigherIsWorse, Severity::High).unwrap(), 0);
        assert_eq!(
            streak_length(&[9.0, 2.0, 4.1], Direction::HigherIsWorse, Severity::High).unwrap(),
            1
        );
    }
}
