use anyhow::{anyhow, Context};
use chrono::Duration;
use std::path::PathBuf;

pub const DEFAULT_URGENT_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Clone)]
pub struct Config {
    /// Opened at start-up when set; otherwise the client sends `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub bcrypt_cost: u32,
    pub urgent_window_hours: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            urgent_window_hours: DEFAULT_URGENT_WINDOW_HOURS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        if let Some(ws) = lookup("DEADLINE_WORKSPACE") {
            if !ws.trim().is_empty() {
                cfg.workspace = Some(PathBuf::from(ws.trim()));
            }
        }

        if let Some(raw) = lookup("DEADLINE_BCRYPT_COST") {
            let cost: u32 = raw
                .trim()
                .parse()
                .with_context(|| format!("DEADLINE_BCRYPT_COST is not a number: {raw}"))?;
            if !(4..=31).contains(&cost) {
                return Err(anyhow!("DEADLINE_BCRYPT_COST must be between 4 and 31, got {cost}"));
            }
            cfg.bcrypt_cost = cost;
        }

        if let Some(raw) = lookup("DEADLINE_URGENT_WINDOW_HOURS") {
            let hours: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("DEADLINE_URGENT_WINDOW_HOURS is not a number: {raw}"))?;
            if hours <= 0 || Duration::try_hours(hours).is_none() {
                return Err(anyhow!("DEADLINE_URGENT_WINDOW_HOURS is out of range, got {hours}"));
            }
            cfg.urgent_window_hours = hours;
        }

        Ok(cfg)
    }

    pub fn urgent_window(&self) -> Duration {
        Duration::try_hours(self.urgent_window_hours)
            .unwrap_or_else(crate::temporal::default_urgent_window)
    }
}
