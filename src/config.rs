//! Configuration for logmon.
//!
//! [`Config::load`] reads `config.toml` from `$XDG_CONFIG_HOME/logmon` (or
//! `~/.config/logmon`). A missing default file yields [`Config::defaults`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

use logmon_core::{Charset, ColumnConfig, ColumnMapping, ColumnType, LevelValue, LogFile, UnknownCharset};
use logmon_types::{MappingError, UnknownLevel};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("unknown mapping '{0}'")]
    UnknownMapping(String),

    #[error(transparent)]
    Charset(#[from] UnknownCharset),

    #[error(transparent)]
    Level(#[from] UnknownLevel),
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    logging: LoggingSection,
    #[serde(default)]
    monitor: MonitorSection,
    #[serde(default)]
    mappings: Vec<MappingSection>,
    #[serde(default)]
    logs: Vec<LogSection>,
}

/// `[logging]`
#[derive(Debug, Deserialize)]
struct LoggingSection {
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// `[monitor]`
#[derive(Debug, Default, Deserialize)]
struct MonitorSection {
    charset: Option<String>,
}

/// `[[mappings]]`
#[derive(Debug, Deserialize)]
struct MappingSection {
    name: String,
    separator: Option<String>,
    pattern: Option<String>,
    #[serde(default, rename = "default")]
    is_default: bool,
    #[serde(default = "default_true")]
    ignore_empty_lines: bool,
    #[serde(default)]
    columns: Vec<ColumnSection>,
}

/// `[[mappings.columns]]`
#[derive(Debug, Deserialize)]
struct ColumnSection {
    header: Option<String>,
    #[serde(rename = "type")]
    column_type: ColumnType,
    path: Option<String>,
}

/// `[[logs]]`
#[derive(Debug, Deserialize)]
struct LogSection {
    path: PathBuf,
    mapping: Option<String>,
    #[serde(default)]
    autostart: bool,
    #[serde(default)]
    filter_levels: Vec<String>,
    #[serde(default)]
    filter_highlight: usize,
    filter_text: Option<String>,
}

fn default_true() -> bool {
    true
}

impl MappingSection {
    fn into_mapping(self) -> Result<ColumnMapping, MappingError> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                ColumnConfig::new(
                    c.header.as_deref().unwrap_or_default(),
                    c.column_type,
                    c.path.as_deref(),
                )
            })
            .collect();

        Ok(ColumnMapping::new(self.name, columns, self.separator, self.pattern)?
            .as_default(self.is_default)
            .with_ignore_empty_lines(self.ignore_empty_lines))
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Validated configuration with mappings built and log entries resolved
#[derive(Debug, Clone)]
pub struct Config {
    pub logging_enabled: bool,
    pub charset: Charset,
    /// Never empty; holds the built-in mapping when none is configured
    pub mappings: Vec<ColumnMapping>,
    pub logs: Vec<LogFile>,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicitly given file must exist; a missing default file means
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::defaults());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "loaded config file");
        Self::parse(&text)
    }

    /// Built-in defaults: logging on, windows-1251, the default mapping, no logs
    pub fn defaults() -> Self {
        Self {
            logging_enabled: true,
            charset: Charset::default(),
            mappings: vec![ColumnMapping::builtin_default()],
            logs: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;

        let charset = match raw.monitor.charset.as_deref() {
            Some(name) => name.parse()?,
            None => Charset::default(),
        };

        let mut mappings = raw
            .mappings
            .into_iter()
            .map(MappingSection::into_mapping)
            .collect::<Result<Vec<_>, _>>()?;
        if mappings.is_empty() {
            mappings.push(ColumnMapping::builtin_default());
        }

        let mut config = Self {
            logging_enabled: raw.logging.enabled,
            charset,
            mappings,
            logs: Vec::with_capacity(raw.logs.len()),
        };

        for log in raw.logs {
            let mapping = match log.mapping.as_deref() {
                Some(name) => config.mapping(Some(name)).unwrap_or_else(|_| {
                    tracing::warn!(mapping = name, path = %log.path.display(), "unknown mapping, using default");
                    config.default_mapping()
                }),
                None => config.default_mapping(),
            }
            .clone();

            let filter_levels = log
                .filter_levels
                .iter()
                .map(|l| l.parse::<LevelValue>())
                .collect::<Result<Vec<_>, _>>()?;

            let mut entry = LogFile::new(log.path, mapping).with_auto_start(log.autostart);
            entry.filter_levels = filter_levels;
            entry.filter_highlight = log.filter_highlight;
            entry.filter_text = log.filter_text.filter(|t| !t.is_empty());
            config.logs.push(entry);
        }

        Ok(config)
    }

    /// Mapping by name; with no name, the default-flagged mapping or the first
    pub fn mapping(&self, name: Option<&str>) -> Result<&ColumnMapping, ConfigError> {
        match name {
            Some(name) => self
                .mappings
                .iter()
                .find(|m| m.name == name)
                .ok_or_else(|| ConfigError::UnknownMapping(name.to_string())),
            None => Ok(self.default_mapping()),
        }
    }

    fn default_mapping(&self) -> &ColumnMapping {
        self.mappings
            .iter()
            .find(|m| m.is_default)
            .unwrap_or(&self.mappings[0])
    }

    /// Registry entry for `path`, if configured
    pub fn log_for(&self, path: &Path) -> Option<&LogFile> {
        self.logs.iter().find(|l| l.path == path)
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("logmon")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
