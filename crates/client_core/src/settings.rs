use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::resource::RollbackPolicy;

pub const DEFAULT_SETTINGS_FILE: &str = "course-checker.toml";
const ENV_PREFIXES: [&str; 2] = ["COURSE_CHECKER_", "APP__"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Every request path is joined onto this. A missing trailing `/` is added.
    pub api_base_url: String,
    pub session_db_url: String,
    /// No timeout unless set.
    pub request_timeout_secs: Option<u64>,
    pub rollback_policy: RollbackPolicy,
    pub page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/".into(),
            session_db_url: "sqlite://./data/session.db".into(),
            request_timeout_secs: None,
            rollback_policy: RollbackPolicy::default(),
            page_size: 10,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Applies `COURSE_CHECKER_*` (or `APP__*`) overrides from `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| {
            ENV_PREFIXES
                .iter()
                .find_map(|prefix| lookup(&format!("{prefix}{name}")))
        };

        if let Some(url) = var("API_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = var("SESSION_DB") {
            self.session_db_url = url;
        }
        if let Some(raw) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(
                raw.parse()
                    .map_err(|e| anyhow!("invalid REQUEST_TIMEOUT_SECS '{raw}': {e}"))?,
            );
        }
        if let Some(raw) = var("ROLLBACK_POLICY") {
            self.rollback_policy = match raw.to_ascii_lowercase().as_str() {
                "keep_stale" => RollbackPolicy::KeepStale,
                "restore" => RollbackPolicy::Restore,
                other => return Err(anyhow!("unknown ROLLBACK_POLICY '{other}'")),
            };
        }
        if let Some(raw) = var("PAGE_SIZE") {
            self.page_size = raw
                .parse()
                .map_err(|e| anyhow!("invalid PAGE_SIZE '{raw}': {e}"))?;
        }
        Ok(())
    }
}

/// Reads `course-checker.toml` from the working directory when present,
/// then applies environment overrides.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(settings_path())
}

pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    let mut settings = if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?
    } else {
        Settings::default()
    };
    settings.apply_env_overrides(|name| std::env::var(name).ok())?;
    Ok(settings)
}

fn settings_path() -> PathBuf {
    std::env::var("COURSE_CHECKER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
