//! Project configuration file support for sessiontally.
//!
//! Loads configuration from `sessiontally.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use sessiontally_core::ConflictPolicy;
use sessiontally_logging::LogFormat;

/// What to do with events that could not be paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrayHandling {
    /// Drop them silently
    Discard,
    /// Report only how many there were
    Count,
    /// Log and list every stray
    Report,
}

/// Project-level configuration loaded from `sessiontally.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Conflict policy for a second open on an already-open user
    pub policy: Option<ConflictPolicy>,
    /// Stray handling mode
    pub strays: Option<StrayHandling>,
    /// Carry-over file location
    pub carry_over: Option<PathBuf>,
    /// JSONL file receiving stray events in report mode
    pub stray_report: Option<PathBuf>,
    /// Skip malformed log lines instead of failing
    pub skip_malformed: Option<bool>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[logging]` table
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<PathBuf>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "sessiontally.toml";

const DEFAULT_LOG_LEVEL: &str = "warn";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let mut config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        config.resolve_paths(working_dir);

        Ok(Some(config))
    }

    /// Relative paths in the file are relative to the directory holding it.
    fn resolve_paths(&mut self, working_dir: &Path) {
        for path in [
            &mut self.carry_over,
            &mut self.stray_report,
            &mut self.logging.file,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = working_dir.join(&*path);
            }
        }
    }

    /// Effective conflict policy.
    /// Priority: CLI > config > error (there is no default)
    pub fn policy(&self, cli: Option<ConflictPolicy>) -> Result<ConflictPolicy> {
        cli.or(self.policy).with_context(|| {
            format!(
                "No conflict policy given. Pass --policy or set `policy` in {} \
                 (keep-latest-open, keep-earliest-open, close-on-reopen)",
                CONFIG_FILE_NAME
            )
        })
    }

    /// Effective stray handling.
    /// Priority: CLI > config > error (there is no default)
    pub fn strays(&self, cli: Option<StrayHandling>) -> Result<StrayHandling> {
        cli.or(self.strays).with_context(|| {
            format!(
                "No stray handling given. Pass --strays or set `strays` in {} \
                 (discard, count, report)",
                CONFIG_FILE_NAME
            )
        })
    }

    /// Effective log format.
    /// Priority: CLI > [logging].format > pretty
    pub fn log_format(&self, cli: Option<LogFormat>) -> Result<LogFormat> {
        if let Some(format) = cli {
            return Ok(format);
        }
        match self.logging.format.as_deref() {
            Some(raw) => raw.parse().map_err(anyhow::Error::msg),
            None => Ok(LogFormat::default()),
        }
    }

    /// Effective tracing level.
    /// Priority: CLI > [logging].level > warn
    pub fn log_level(&self, cli: Option<&str>) -> String {
        cli.or(self.logging.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    }

    pub fn skip_malformed(&self, cli: bool) -> bool {
        cli || self.skip_malformed.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_config_is_none() {
        let dir = tempdir().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
policy = "close-on-reopen"
strays = "count"
carry_over = "state/incomplete.txt"
stray_report = "/var/log/strays.jsonl"
skip_malformed = true

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();

        assert_eq!(config.policy(None).unwrap(), ConflictPolicy::CloseOnReopen);
        assert_eq!(config.strays(None).unwrap(), StrayHandling::Count);
        assert_eq!(
            config.carry_over,
            Some(dir.path().join("state").join("incomplete.txt"))
        );
        assert_eq!(config.stray_report, Some(PathBuf::from("/var/log/strays.jsonl")));
        assert!(config.skip_malformed(false));
        assert_eq!(config.log_level(None), "debug");
        assert_eq!(config.log_format(None).unwrap(), LogFormat::Json);
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = ProjectConfig {
            policy: Some(ConflictPolicy::KeepEarliestOpen),
            strays: Some(StrayHandling::Discard),
            ..Default::default()
        };

        assert_eq!(
            config.policy(Some(ConflictPolicy::KeepLatestOpen)).unwrap(),
            ConflictPolicy::KeepLatestOpen
        );
        assert_eq!(
            config.strays(Some(StrayHandling::Report)).unwrap(),
            StrayHandling::Report
        );
        assert_eq!(config.log_level(Some("trace")), "trace");
    }

    #[test]
    fn test_policy_and_strays_have_no_default() {
        let config = ProjectConfig::default();

        let err = config.policy(None).unwrap_err();
        assert!(err.to_string().contains("--policy"));
        assert!(config.strays(None).is_err());
        assert_eq!(config.log_level(None), "warn");
        assert_eq!(config.log_format(None).unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "polcy = \"keep-latest-open\"\n").unwrap();

        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "policy = \"merge\"\n").unwrap();

        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
