pub mod aggregate;
pub mod alerts;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod render;
pub mod report;

pub use classify::{
    classify_metric_severity, classify_severity, classify_status, should_raise_alert,
};
pub use error::ClassifyError;
