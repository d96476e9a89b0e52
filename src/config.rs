use std::str::FromStr;

use anyhow::Context;

use crate::alerts::AlertPolicy;
use crate::models::{MetricScales, ScoreScale, Severity};

/// Runtime settings, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub scales: MetricScales,
    pub alert_policy: AlertPolicy,
    pub status_window: usize,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Self::from_lookup(database_url, |key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; `from_env` passes the process env.
    pub fn from_lookup<F>(database_url: String, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stress_min: u8 = parse_or(&lookup, "WELLBEING_STRESS_MIN", 1)?;
        let stress = match stress_min {
            0 => ScoreScale::ZERO_BASED,
            1 => ScoreScale::STANDARD,
            other => anyhow::bail!("WELLBEING_STRESS_MIN must be 0 or 1, got {other}"),
        };

        let window_days: usize = parse_or(&lookup, "WELLBEING_ALERT_WINDOW_DAYS", 3)?;
        if window_days == 0 {
            anyhow::bail!("WELLBEING_ALERT_WINDOW_DAYS must be at least 1");
        }

        let status_window: usize = parse_or(&lookup, "WELLBEING_STATUS_WINDOW", 7)?;
        if status_window == 0 {
            anyhow::bail!("WELLBEING_STATUS_WINDOW must be at least 1");
        }

        Ok(Settings {
            database_url,
            max_connections: parse_or(&lookup, "WELLBEING_MAX_CONNECTIONS", 5)?,
            scales: MetricScales { stress },
            alert_policy: AlertPolicy {
                window_days,
                min_severity: parse_or(&lookup, "WELLBEING_ALERT_MIN_SEVERITY", Severity::Medium)?,
            },
            status_window,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("invalid {key} value '{raw}': {err}")),
        None => Ok(default),
    }
}
