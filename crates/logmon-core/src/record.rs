use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use logmon_types::{ColumnMapping, ColumnType, LevelValue};

const DEFAULT_TIME_PATH: &str = "Time";
const DEFAULT_LEVEL_PATH: &str = "Level";
const DEFAULT_MESSAGE_PATH: &str = "Message";

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Value stored under a field path
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Raw field text
    Text(String),
    /// Time column whose text parsed as a date-time; the raw text is kept for display
    Time { value: NaiveDateTime, raw: String },
    /// Padding for a line that produced fewer fields than the mapping has columns
    Empty,
}

impl FieldValue {
    /// Text as it appeared in the file
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Time { raw, .. } => Some(raw),
            Self::Empty => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }
}

/// One parsed log entry: a raw line, possibly merged with continuation lines
#[derive(Clone, Debug, Serialize)]
pub struct Record {
    /// Zero-based index of the first raw line of this record in the file
    number: usize,

    /// Field values keyed by column path
    fields: BTreeMap<String, FieldValue>,

    /// Count of leading `*`/`#` characters in the message
    highlight_level: usize,

    #[serde(skip)]
    time_path: String,

    #[serde(skip)]
    level_path: String,

    #[serde(skip)]
    message_path: String,

    /// Position of the preceding record in the owning list
    #[serde(skip)]
    previous: Option<usize>,
}

impl Record {
    /// Build a record from split fields. Missing trailing fields are padded;
    /// a Time column that does not parse keeps its raw text.
    pub fn from_fields(
        number: usize,
        mapping: &ColumnMapping,
        fields: Vec<String>,
        previous: Option<usize>,
    ) -> Self {
        let mut record = Self::empty(number, previous);
        let mut values = fields.into_iter().map(Some).chain(std::iter::repeat(None));

        for column in &mapping.columns {
            let value = values.next().flatten();
            let stored = match column.column_type {
                ColumnType::Skip => continue,
                ColumnType::Time => {
                    record.time_path = column.path.clone();
                    match value {
                        Some(raw) => match parse_time(&raw) {
                            Some(value) => FieldValue::Time { value, raw },
                            None => FieldValue::Text(raw),
                        },
                        None => FieldValue::Empty,
                    }
                }
                ColumnType::Level => {
                    record.level_path = column.path.clone();
                    value.map_or(FieldValue::Empty, FieldValue::Text)
                }
                ColumnType::Message => {
                    record.message_path = column.path.clone();
                    value.map_or(FieldValue::Empty, FieldValue::Text)
                }
                ColumnType::Text => value.map_or(FieldValue::Empty, FieldValue::Text),
            };
            record.fields.insert(column.path.clone(), stored);
        }

        record.highlight_level = highlight_of(record.message());
        record
    }

    /// Fallback record for a line that does not fit the mapping
    pub fn unparsed(number: usize, raw: &str, previous: Option<usize>) -> Self {
        let mut record = Self::empty(number, previous);
        record
            .fields
            .insert(record.message_path.clone(), FieldValue::Text(raw.to_string()));
        record.highlight_level = highlight_of(Some(raw));
        record
    }

    fn empty(number: usize, previous: Option<usize>) -> Self {
        Self {
            number,
            fields: BTreeMap::new(),
            highlight_level: 0,
            time_path: DEFAULT_TIME_PATH.to_string(),
            level_path: DEFAULT_LEVEL_PATH.to_string(),
            message_path: DEFAULT_MESSAGE_PATH.to_string(),
            previous,
        }
    }

    /// Merge a continuation line into the message
    pub(crate) fn append_message(&mut self, line: &str) {
        let entry = self
            .fields
            .entry(self.message_path.clone())
            .or_insert(FieldValue::Empty);
        let mut message = entry.as_str().unwrap_or_default().to_string();
        message.push('\n');
        message.push_str(line);
        *entry = FieldValue::Text(message);
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Index of the preceding record in the list this record belongs to
    pub fn previous(&self) -> Option<usize> {
        self.previous
    }

    pub fn highlight_level(&self) -> usize {
        self.highlight_level
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlight_level > 0
    }

    /// Parsed time, `None` when the time text did not parse or is absent
    pub fn time(&self) -> Option<NaiveDateTime> {
        match self.fields.get(&self.time_path) {
            Some(FieldValue::Time { value, .. }) => Some(*value),
            _ => None,
        }
    }

    /// Raw time text, empty when the record has no time field
    pub fn time_string(&self) -> &str {
        self.fields
            .get(&self.time_path)
            .and_then(FieldValue::as_str)
            .unwrap_or_default()
    }

    /// Level text; records without a level field report `Info`
    pub fn level(&self) -> Option<&str> {
        match self.fields.get(&self.level_path) {
            Some(value) => value.as_str(),
            None => Some(LevelValue::Info.as_str()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.fields
            .get(&self.message_path)
            .and_then(FieldValue::as_str)
    }

    /// Raw field lookup by path
    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        self.fields.get(path)
    }

    pub fn contains_key(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    /// True when this record's time falls in a different second than `previous`
    pub fn is_next_second(&self, previous: &Record) -> bool {
        let stamp = |r: &Record| r.time().map_or((0, 0), |t| (t.minute(), t.second()));
        stamp(previous) != stamp(self)
    }
}

/// Records are the same logical entry when position, raw time text and
/// message all match.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.time_string() == other.time_string()
            && self.message() == other.message()
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.number.hash(state);
        self.time_string().hash(state);
        self.message().hash(state);
    }
}

fn highlight_of(message: Option<&str>) -> usize {
    message
        .unwrap_or_default()
        .chars()
        .take_while(|&ch| ch == '*' || ch == '#')
        .count()
}

/// Best-effort date-time parse. Time-only text is placed on today's date.
pub fn parse_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_local());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return Some(Local::now().date_naive().and_time(time));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use logmon_types::ColumnConfig;

    fn mapping() -> ColumnMapping {
        ColumnMapping::builtin_default()
    }

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_typed_accessors() {
        let record = Record::from_fields(
            3,
            &mapping(),
            fields(&["2024-01-15 10:30:00", "Error", "db", "timeout"]),
            Some(2),
        );

        assert_eq!(record.number(), 3);
        assert_eq!(record.previous(), Some(2));
        assert_eq!(record.time_string(), "2024-01-15 10:30:00");
        assert_eq!(
            record.time(),
            NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(10, 30, 0))
        );
        assert_eq!(record.level(), Some("Error"));
        assert_eq!(record.message(), Some("timeout"));
        assert_eq!(record.get("Cite").and_then(FieldValue::as_str), Some("db"));
    }

    #[test]
    fn test_bad_time_keeps_raw_text() {
        let record = Record::from_fields(0, &mapping(), fields(&["yesterday", "Info", "", "x"]), None);
        assert_eq!(record.time(), None);
        assert_eq!(record.time_string(), "yesterday");
        assert_eq!(record.get("Time"), Some(&FieldValue::Text("yesterday".into())));
    }

    #[test]
    fn test_short_line_is_padded() {
        let record = Record::from_fields(0, &mapping(), fields(&["10:00:00", "Warn"]), None);
        assert_eq!(record.level(), Some("Warn"));
        assert_eq!(record.message(), None);
        assert_eq!(record.get("Cite"), Some(&FieldValue::Empty));
        assert_eq!(record.highlight_level(), 0);
    }

    #[test]
    fn test_skip_and_custom_paths() {
        let mapping = ColumnMapping::new(
            "custom",
            vec![
                ColumnConfig::new("pid", ColumnType::Skip, None),
                ColumnConfig::new("Severity", ColumnType::Level, Some("sev")),
                ColumnConfig::new("Text", ColumnType::Message, Some("text")),
            ],
            Some(";".into()),
            None,
        )
        .unwrap();

        let record = Record::from_fields(0, &mapping, fields(&["1234", "Fatal", "boom"]), None);
        assert!(!record.contains_key("pid"));
        assert_eq!(record.level(), Some("Fatal"));
        assert_eq!(record.message(), Some("boom"));
        // No time column: time text is empty and time is unset
        assert_eq!(record.time_string(), "");
        assert_eq!(record.time(), None);
    }

    #[test]
    fn test_highlight_level() {
        let hot = Record::from_fields(0, &mapping(), fields(&["", "Error", "", "**disk full"]), None);
        let calm = Record::from_fields(1, &mapping(), fields(&["", "Error", "", "disk full"]), None);
        let mixed = Record::unparsed(2, "#*#alert", None);

        assert_eq!(hot.highlight_level(), 2);
        assert!(hot.is_highlighted());
        assert_eq!(calm.highlight_level(), 0);
        assert_eq!(mixed.highlight_level(), 3);
    }

    #[test]
    fn test_unparsed_and_append() {
        let mut record = Record::unparsed(0, "garbage", None);
        assert_eq!(record.message(), Some("garbage"));
        assert_eq!(record.level(), Some("Info"));

        record.append_message("more");
        record.append_message("");
        assert_eq!(record.message(), Some("garbage\nmore\n"));
    }

    #[test]
    fn test_equality_ignores_other_fields() {
        let a = Record::from_fields(5, &mapping(), fields(&["10:00:00", "Info", "a", "msg"]), None);
        let b = Record::from_fields(5, &mapping(), fields(&["10:00:00", "Error", "b", "msg"]), None);
        let moved = Record::from_fields(6, &mapping(), fields(&["10:00:00", "Info", "a", "msg"]), None);
        let edited = Record::from_fields(5, &mapping(), fields(&["10:00:00", "Info", "a", "msg!"]), None);

        assert_eq!(a, b);
        assert_ne!(a, moved);
        assert_ne!(a, edited);
    }

    #[test]
    fn test_is_next_second() {
        let first = Record::from_fields(0, &mapping(), fields(&["2024-01-15 10:00:00.100", "Info", "", "a"]), None);
        let same = Record::from_fields(1, &mapping(), fields(&["2024-01-15 10:00:00.900", "Info", "", "b"]), Some(0));
        let next = Record::from_fields(2, &mapping(), fields(&["2024-01-15 10:00:01", "Info", "", "c"]), Some(1));

        assert!(!same.is_next_second(&first));
        assert!(next.is_next_second(&same));
    }

    #[test]
    fn test_parse_time_formats() {
        assert!(parse_time("2024-01-15T10:30:00Z").is_some());
        assert!(parse_time("2024-01-15T10:30:00.123+03:00").is_some());
        assert!(parse_time("2024/01/15 10:30:00").is_some());
        assert!(parse_time("15.01.2024 10:30:00,5").is_none());
        assert!(parse_time("15.01.2024 10:30:00").is_some());
        assert!(parse_time("2024-01-15").is_some());
        assert!(parse_time("10:30:00.250").is_some());
        assert!(parse_time("").is_none());
        assert!(parse_time("not a time").is_none());
    }

    #[test]
    fn test_serialize() {
        let record = Record::from_fields(0, &mapping(), fields(&["10:00:00", "Info", "c"]), None);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["number"], 0);
        assert_eq!(json["fields"]["Time"], "10:00:00");
        assert_eq!(json["fields"]["Message"], serde_json::Value::Null);
        assert_eq!(json["highlight_level"], 0);
    }
}
