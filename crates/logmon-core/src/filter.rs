use regex::Regex;
use std::collections::HashSet;

use logmon_types::{LevelValue, LogFile};

use crate::record::Record;

/// Compiled consumer-side filter for records
#[derive(Clone)]
pub struct CompiledFilter {
    /// Escaped text matcher (if any)
    regex: Option<Regex>,

    /// Original filter text
    text: String,

    /// Levels to include (empty = all)
    levels: HashSet<LevelValue>,

    /// Minimum highlight level, 0 = off
    min_highlight: usize,

    case_insensitive: bool,
}

impl CompiledFilter {
    /// Create a case-sensitive filter on message text
    pub fn new(text: &str) -> Self {
        Self::build(text, false)
    }

    /// Create a case-insensitive filter on message text
    pub fn new_case_insensitive(text: &str) -> Self {
        Self::build(text, true)
    }

    fn build(text: &str, case_insensitive: bool) -> Self {
        let regex = if text.is_empty() {
            None
        } else {
            let escaped = regex::escape(text);
            let source = if case_insensitive {
                format!("(?i){escaped}")
            } else {
                escaped
            };
            // An escaped literal always compiles
            Regex::new(&source).ok()
        };

        Self {
            regex,
            text: text.to_string(),
            levels: HashSet::new(),
            min_highlight: 0,
            case_insensitive,
        }
    }

    /// Filter state stored with a registry entry
    pub fn for_log_file(log: &LogFile, case_insensitive: bool) -> Self {
        let text = log.filter_text.as_deref().unwrap_or_default();
        Self::build(text, case_insensitive)
            .with_levels(log.filter_levels.iter().copied())
            .with_min_highlight(log.filter_highlight)
    }

    /// Set levels to filter by
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LevelValue>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_min_highlight(mut self, min_highlight: usize) -> Self {
        self.min_highlight = min_highlight;
        self
    }

    /// Check if a record passes this filter
    pub fn matches(&self, record: &Record) -> bool {
        if !self.levels.is_empty() {
            let level = record.level().unwrap_or_default();
            if !self
                .levels
                .iter()
                .any(|l| l.as_str().eq_ignore_ascii_case(level))
            {
                return false;
            }
        }

        if self.min_highlight > 0 && record.highlight_level() < self.min_highlight {
            return false;
        }

        match &self.regex {
            Some(re) => record.message().is_some_and(|m| re.is_match(m)),
            None => true,
        }
    }

    /// Find all match positions in a string (for emphasis)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.regex.is_none() && self.levels.is_empty() && self.min_highlight == 0
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

impl Default for CompiledFilter {
    fn default() -> Self {
        Self::new("")
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("text", &self.text)
            .field("levels", &self.levels)
            .field("min_highlight", &self.min_highlight)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}
