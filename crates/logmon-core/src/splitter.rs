use regex::Regex;

use logmon_types::{ColumnMapping, SplitRule};

use crate::error::MonitorError;

/// Turns one raw line into an ordered list of field strings
pub trait FieldSplitter: Send + Sync {
    fn split(&self, line: &str) -> Vec<String>;
}

/// Build the splitter a mapping asks for
pub fn for_mapping(mapping: &ColumnMapping) -> Result<Box<dyn FieldSplitter>, MonitorError> {
    let columns = mapping.column_count();
    match &mapping.split {
        SplitRule::Separator(sep) => Ok(Box::new(SeparatorSplitter::new(sep, columns))),
        SplitRule::Pattern(pat) => {
            let splitter =
                PatternSplitter::new(pat, columns).map_err(|source| MonitorError::Pattern {
                    mapping: mapping.name.clone(),
                    source,
                })?;
            Ok(Box::new(splitter))
        }
    }
}

/// Splits on every occurrence of a fixed separator
#[derive(Clone, Debug)]
pub struct SeparatorSplitter {
    separator: String,
    columns: usize,
}

impl SeparatorSplitter {
    pub fn new(separator: &str, columns: usize) -> Self {
        Self {
            separator: separator.to_string(),
            columns,
        }
    }
}

impl FieldSplitter for SeparatorSplitter {
    fn split(&self, line: &str) -> Vec<String> {
        // An empty separator would never advance; treat the line as one field
        if self.separator.is_empty() {
            return vec![line.to_string()];
        }

        let mut fields = Vec::with_capacity(self.columns);
        fields.extend(line.split(self.separator.as_str()).map(str::to_string));
        fields
    }
}

/// Uses the capture groups of a regular expression as fields
#[derive(Clone, Debug)]
pub struct PatternSplitter {
    regex: Regex,
    columns: usize,
}

impl PatternSplitter {
    pub fn new(pattern: &str, columns: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            columns,
        })
    }
}

impl FieldSplitter for PatternSplitter {
    fn split(&self, line: &str) -> Vec<String> {
        let Some(caps) = self.regex.captures(line) else {
            return Vec::new();
        };

        let mut fields = Vec::with_capacity(self.columns);
        // Group 0 is the whole match; groups that did not participate are skipped
        fields.extend(
            caps.iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().to_string()),
        );
        fields
    }
}
