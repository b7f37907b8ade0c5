use std::path::Path;

use logmon_types::ColumnMapping;

use crate::charset::Charset;
use crate::record::Record;
use crate::splitter::FieldSplitter;

/// Read the whole file and parse it into records.
///
/// Any I/O failure is logged and yields no records for this pass; the next
/// change event retries.
pub fn read_records(
    path: &Path,
    mapping: &ColumnMapping,
    splitter: &dyn FieldSplitter,
    charset: Charset,
) -> Vec<Record> {
    // std opens files with shared read/write access, so a writer holding the
    // file open for append is never locked out.
    match std::fs::read(path) {
        Ok(bytes) => parse_text(&charset.decode(&bytes), mapping, splitter),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read log file");
            Vec::new()
        }
    }
}

/// Parse decoded file text into records, merging continuation lines.
pub fn parse_text(text: &str, mapping: &ColumnMapping, splitter: &dyn FieldSplitter) -> Vec<Record> {
    let mut lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    // Trailing terminator leaves an empty last line
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let columns = mapping.column_count();
    let mut records: Vec<Record> = Vec::new();

    for (number, line) in lines.into_iter().enumerate() {
        let fields = splitter.split(line);
        let previous = records.len().checked_sub(1);

        if fields.len() == columns {
            records.push(Record::from_fields(number, mapping, fields, previous));
            continue;
        }

        match records.last_mut() {
            Some(last) => {
                if !mapping.ignore_empty_lines || !line.is_empty() {
                    last.append_message(line);
                }
            }
            None => records.push(Record::unparsed(number, line, previous)),
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splitter::{PatternSplitter, SeparatorSplitter};
    use logmon_types::{ColumnConfig, ColumnType};

    fn four_columns() -> (ColumnMapping, SeparatorSplitter) {
        (ColumnMapping::builtin_default(), SeparatorSplitter::new("|", 4))
    }

    #[test]
    fn test_parse_lines() {
        let (mapping, splitter) = four_columns();
        let records = parse_text("t1|Info|a|one\nt2|Warn|b|two\n", &mapping, &splitter);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message(), Some("one"));
        assert_eq!(records[1].level(), Some("Warn"));
        assert_eq!(records[1].number(), 1);
        assert_eq!(records[1].previous(), Some(0));
    }

    #[test]
    fn test_crlf_terminators() {
        let (mapping, splitter) = four_columns();
        let records = parse_text("t1|Info|a|one\r\nt2|Warn|b|two\r\n", &mapping, &splitter);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message(), Some("one"));
        assert_eq!(records[1].message(), Some("two"));
    }

    #[test]
    fn test_continuation_lines() {
        let (mapping, splitter) = four_columns();
        let text = "t1|Error|a|failed\n  at frame 1\nat|frame\nt2|Info|b|next\n";
        let records = parse_text(text, &mapping, &splitter);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message(), Some("failed\n  at frame 1\nat|frame"));
        assert_eq!(records[1].number(), 3);
    }

    #[test]
    fn test_leading_unparsed_line() {
        let (mapping, splitter) = four_columns();
        let records = parse_text("banner\nt1|Info|a|one\n", &mapping, &splitter);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message(), Some("banner"));
        assert_eq!(records[0].number(), 0);
        assert_eq!(records[1].previous(), Some(0));
    }

    #[test]
    fn test_leading_lines_merge_into_fallback() {
        let (mapping, splitter) = four_columns();
        let records = parse_text("banner\nsecond\n", &mapping, &splitter);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message(), Some("banner\nsecond"));
    }

    #[test]
    fn test_empty_continuation_lines() {
        let (mapping, splitter) = four_columns();
        let text = "t1|Info|a|one\n\nstill one\n";

        let ignoring = parse_text(text, &mapping, &splitter);
        assert_eq!(ignoring[0].message(), Some("one\nstill one"));

        let keeping = parse_text(text, &mapping.clone().with_ignore_empty_lines(false), &splitter);
        assert_eq!(keeping[0].message(), Some("one\n\nstill one"));
    }

    #[test]
    fn test_unterminated_last_line_is_kept() {
        let (mapping, splitter) = four_columns();
        let records = parse_text("t1|Info|a|one\nt2|Info|b|tw", &mapping, &splitter);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message(), Some("tw"));
    }

    #[test]
    fn test_empty_text() {
        let (mapping, splitter) = four_columns();
        assert!(parse_text("", &mapping, &splitter).is_empty());
    }

    #[test]
    fn test_pattern_mapping() {
        let mapping = ColumnMapping::new(
            "pattern",
            vec![
                ColumnConfig::new("Time", ColumnType::Time, None),
                ColumnConfig::new("Level", ColumnType::Level, None),
                ColumnConfig::new("Message", ColumnType::Message, None),
            ],
            None,
            Some(r"^(\S+ \S+) \[(\w+)\] (.*)$".into()),
        )
        .unwrap();
        let splitter = PatternSplitter::new(mapping.pattern().unwrap(), 3).unwrap();

        let text = "2024-01-15 10:00:00 [Error] boom\ntrace line\n2024-01-15 10:00:01 [Info] ok\n";
        let records = parse_text(text, &mapping, &splitter);

        assert_eq!(records.len(), 2);
        assert!(records[0].time().is_some());
        assert_eq!(records[0].message(), Some("boom\ntrace line"));
        assert_eq!(records[1].level(), Some("Info"));
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let (mapping, splitter) = four_columns();
        let dir = tempfile::tempdir().unwrap();
        let records = read_records(&dir.path().join("absent.log"), &mapping, &splitter, Charset::Utf8);
        assert!(records.is_empty());
    }
}
