//! Shared types for logmon
//!
//! This crate contains the column mapping definitions and log-file registry
//! entries used by the tailing engine and by its consumers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Column Types
// ============================================================================

/// Semantic type of a column in a mapping
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Time,
    Level,
    Message,
    Text,
    Skip,
}

impl ColumnType {
    /// Canonical name, also the default field path for Time/Level/Message
    pub fn name(&self) -> &'static str {
        match self {
            Self::Time => "Time",
            Self::Level => "Level",
            Self::Message => "Message",
            Self::Text => "Text",
            Self::Skip => "Skip",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Time => 0,
            Self::Level => 1,
            Self::Message => 2,
            Self::Text => 3,
            Self::Skip => 4,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-type counters for auto-generated headers. Only used for uniqueness.
static UNNAMED_COLUMNS: [AtomicUsize; 5] = [const { AtomicUsize::new(0) }; 5];

/// One column of a mapping
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnConfig {
    pub header: String,
    pub column_type: ColumnType,
    pub path: String,
}

impl ColumnConfig {
    /// Create a column. A blank header becomes `"<type><n>"`; a blank path
    /// falls back to the type name for Time/Level/Message and to the header
    /// otherwise.
    pub fn new(header: &str, column_type: ColumnType, path: Option<&str>) -> Self {
        let header = if header.trim().is_empty() {
            let n = UNNAMED_COLUMNS[column_type.index()].fetch_add(1, Ordering::Relaxed);
            format!("{}{}", column_type.name(), n)
        } else {
            header.to_string()
        };

        let path = match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => match column_type {
                ColumnType::Time | ColumnType::Level | ColumnType::Message => {
                    column_type.name().to_string()
                }
                _ => header.clone(),
            },
        };

        Self {
            header,
            column_type,
            path,
        }
    }
}

impl fmt::Display for ColumnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)
    }
}

// ============================================================================
// Column Mapping
// ============================================================================

/// How a raw line is carved into fields
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitRule {
    /// Fixed separator string between fields
    Separator(String),
    /// Regular expression whose capture groups are the fields
    Pattern(String),
}

/// Mapping validation failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("mapping '{0}': use only one of separator, pattern")]
    AmbiguousSplit(String),

    #[error("mapping '{0}': one of separator, pattern is required")]
    MissingSplit(String),

    #[error("mapping '{0}' has no columns")]
    NoColumns(String),
}

/// Schema describing how raw lines decompose into named, typed fields
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMapping {
    pub name: String,
    pub columns: Vec<ColumnConfig>,
    pub split: SplitRule,
    pub is_default: bool,
    pub ignore_empty_lines: bool,
}

impl ColumnMapping {
    /// Create a mapping. Exactly one of `separator` and `pattern` must be a
    /// non-empty string.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnConfig>,
        separator: Option<String>,
        pattern: Option<String>,
    ) -> Result<Self, MappingError> {
        let name = name.into();
        let separator = separator.filter(|s| !s.is_empty());
        let pattern = pattern.filter(|p| !p.trim().is_empty());

        let split = match (separator, pattern) {
            (Some(sep), None) => SplitRule::Separator(sep),
            (None, Some(pat)) => SplitRule::Pattern(pat),
            (Some(_), Some(_)) => return Err(MappingError::AmbiguousSplit(name)),
            (None, None) => return Err(MappingError::MissingSplit(name)),
        };

        if columns.is_empty() {
            return Err(MappingError::NoColumns(name));
        }

        Ok(Self {
            name,
            columns,
            split,
            is_default: false,
            ignore_empty_lines: true,
        })
    }

    /// Mark this mapping as the default one
    pub fn as_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_ignore_empty_lines(mut self, ignore: bool) -> Self {
        self.ignore_empty_lines = ignore;
        self
    }

    /// Mapping used when nothing is configured: `Time|Level|Cite|Message`
    pub fn builtin_default() -> Self {
        Self {
            name: "default".to_string(),
            columns: vec![
                ColumnConfig::new("Time", ColumnType::Time, None),
                ColumnConfig::new("Level", ColumnType::Level, None),
                ColumnConfig::new("Cite", ColumnType::Text, None),
                ColumnConfig::new("Message", ColumnType::Message, None),
            ],
            split: SplitRule::Separator("|".to_string()),
            is_default: true,
            ignore_empty_lines: true,
        }
    }

    /// Expected field count for every line parsed with this mapping
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn separator(&self) -> Option<&str> {
        match &self.split {
            SplitRule::Separator(s) => Some(s),
            SplitRule::Pattern(_) => None,
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        match &self.split {
            SplitRule::Pattern(p) => Some(p),
            SplitRule::Separator(_) => None,
        }
    }

    /// First column of the given type, if any
    pub fn column_of(&self, column_type: ColumnType) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.column_type == column_type)
    }
}

impl fmt::Display for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
// Levels
// ============================================================================

/// Level values understood by consumer-side filters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LevelValue {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LevelValue {
    pub const ALL: [LevelValue; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Info => "Info",
            Self::Warn => "Warn",
            Self::Error => "Error",
            Self::Fatal => "Fatal",
        }
    }

    /// Parse a comma separated list such as `"error,fatal"`
    pub fn parse_list(values: &str) -> Result<Vec<LevelValue>, UnknownLevel> {
        values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for LevelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for LevelValue {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

// ============================================================================
// Log File Registry
// ============================================================================

/// A predefined log file. The engine reads `path` and `mapping`; the rest is
/// consumer-side filter state.
#[derive(Clone, Debug)]
pub struct LogFile {
    pub path: PathBuf,
    pub mapping: ColumnMapping,
    pub auto_start: bool,
    pub filter_levels: Vec<LevelValue>,
    pub filter_highlight: usize,
    pub filter_text: Option<String>,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>, mapping: ColumnMapping) -> Self {
        Self {
            path: path.into(),
            mapping,
            auto_start: false,
            filter_levels: Vec::new(),
            filter_highlight: 0,
            filter_text: None,
        }
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }
}
