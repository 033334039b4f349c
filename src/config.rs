use std::{path::PathBuf, time::Duration};

use crate::session::ControllerConfig;

const APP_DIR_NAME: &str = "mindful";
const DB_FILE_NAME: &str = "mindful.sqlite3";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Runtime configuration: defaults, then environment, then CLI flags.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Holds the history database and `settings.json`.
    pub data_dir: PathBuf,

    /// JSON script catalog replacing the built-in scripts.
    pub catalog_path: Option<PathBuf>,

    pub tick_interval: Duration,

    /// Progress checkpoint cadence, in ticks.
    pub checkpoint_every_ticks: u32,

    /// Initial OS color-scheme signal.
    pub prefers_dark: bool,

    pub color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME),
            catalog_path: None,
            tick_interval: Duration::from_secs(1),
            checkpoint_every_ticks: 10,
            prefers_dark: false,
            color: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Recognised variables: `MINDFUL_DATA_DIR`, `MINDFUL_CATALOG`,
    /// `MINDFUL_DEBUG` (checkpoint on every tick), `MINDFUL_PREFERS_DARK`,
    /// `NO_COLOR`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("MINDFUL_DATA_DIR").filter(|v| !v.is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("MINDFUL_CATALOG").filter(|v| !v.is_empty()) {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if flag(lookup("MINDFUL_DEBUG")) {
            config.checkpoint_every_ticks = 1;
        }
        config.prefers_dark = flag(lookup("MINDFUL_PREFERS_DARK"));
        if lookup("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            config.color = false;
        }

        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            tick_interval: self.tick_interval,
            checkpoint_every_ticks: self.checkpoint_every_ticks,
        }
    }
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.checkpoint_every_ticks, 10);
        assert!(!config.prefers_dark);
        assert!(config.color);
        assert!(config.db_path().ends_with("mindful/mindful.sqlite3"));
    }

    #[test]
    fn environment_overrides() {
        let config = config_from(&[
            ("MINDFUL_DATA_DIR", "/tmp/mf"),
            ("MINDFUL_DEBUG", "TRUE"),
            ("MINDFUL_PREFERS_DARK", "1"),
            ("NO_COLOR", "1"),
        ]);
        assert_eq!(config.settings_path(), PathBuf::from("/tmp/mf/settings.json"));
        assert_eq!(config.controller_config().checkpoint_every_ticks, 1);
        assert!(config.prefers_dark);
        assert!(!config.color);
    }
}
