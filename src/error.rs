/// The only failure the classifier can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    #[error("Invalid {metric} score {value}: expected a value in [{min}, {max}]")]
    InvalidMetricRange {
        metric: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}
