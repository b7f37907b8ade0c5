use std::io::{self, Write};

use logmon_core::{ArcRecord, ColumnConfig, ColumnMapping, ColumnType, CompiledFilter, FieldValue};

const SEPARATOR: &str = " | ";
const EMPHASIS_ON: &str = "\x1b[1;33m";
const EMPHASIS_OFF: &str = "\x1b[0m";

/// How records are written to stdout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Mapped columns joined by ` | `
    Columns,
    /// One JSON object per record
    Json,
}

/// Writes records in the chosen format.
///
/// In column mode the time is only printed when it moves to a new second,
/// and filter matches in the message can be emphasized with ANSI colors.
pub struct Printer<W: Write> {
    out: W,
    format: OutputFormat,
    columns: Vec<ColumnConfig>,
    emphasis: bool,
    last: Option<ArcRecord>,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, format: OutputFormat, mapping: &ColumnMapping, emphasis: bool) -> Self {
        let columns = mapping
            .columns
            .iter()
            .filter(|c| c.column_type != ColumnType::Skip)
            .cloned()
            .collect();

        Self {
            out,
            format,
            columns,
            emphasis,
            last: None,
        }
    }

    /// Column headers; nothing in JSON mode
    pub fn header(&mut self) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return Ok(());
        }
        let headers: Vec<&str> = self.columns.iter().map(|c| c.header.as_str()).collect();
        writeln!(self.out, "{}", headers.join(SEPARATOR))
    }

    pub fn record(&mut self, record: &ArcRecord, filter: &CompiledFilter) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, record.as_ref()).map_err(io::Error::other)?;
                writeln!(self.out)?;
            }
            OutputFormat::Columns => {
                let same_second = self.last.as_ref().is_some_and(|prev| {
                    prev.time().is_some()
                        && record.time().is_some()
                        && !record.is_next_second(prev)
                });

                let cells: Vec<String> = self
                    .columns
                    .iter()
                    .map(|column| {
                        let text = record
                            .get(&column.path)
                            .and_then(FieldValue::as_str)
                            .unwrap_or_default();
                        match column.column_type {
                            ColumnType::Time if same_second => " ".repeat(text.chars().count()),
                            ColumnType::Message if self.emphasis => emphasize(text, filter),
                            _ => text.to_string(),
                        }
                    })
                    .collect();

                writeln!(self.out, "{}", cells.join(SEPARATOR))?;
            }
        }

        self.last = Some(record.clone());
        Ok(())
    }

    /// Forget the previous record after the view was cleared
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}

fn emphasize(text: &str, filter: &CompiledFilter) -> String {
    let matches = filter.find_matches(text);
    if matches.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + matches.len() * 12);
    let mut pos = 0;
    for (start, end) in matches {
        out.push_str(&text[pos..start]);
        out.push_str(EMPHASIS_ON);
        out.push_str(&text[start..end]);
        out.push_str(EMPHASIS_OFF);
        pos = end;
    }
    out.push_str(&text[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use logmon_core::parse_text;
    use logmon_core::SeparatorSplitter;
    use std::sync::Arc;

    fn records(text: &str) -> Vec<ArcRecord> {
        let mapping = ColumnMapping::builtin_default();
        parse_text(text, &mapping, &SeparatorSplitter::new("|", 4))
            .into_iter()
            .map(Arc::new)
            .collect()
    }

    fn render(format: OutputFormat, emphasis: bool, filter: &CompiledFilter, text: &str) -> String {
        let mut printer = Printer::new(Vec::new(), format, &ColumnMapping::builtin_default(), emphasis);
        for record in records(text) {
            printer.record(&record, filter).unwrap();
        }
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn test_columns_repeat_time_only_on_new_second() {
        let text = "2024-01-15 10:00:00|Info|a|one\n2024-01-15 10:00:00|Info|a|two\n2024-01-15 10:00:01|Warn|b|three\n";
        let out = render(OutputFormat::Columns, false, &CompiledFilter::default(), text);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "2024-01-15 10:00:00 | Info | a | one");
        assert_eq!(lines[1], "                    | Info | a | two");
        assert_eq!(lines[2], "2024-01-15 10:00:01 | Warn | b | three");
    }

    #[test]
    fn test_time_after_unparsed_record_is_printed() {
        let text = "banner\n2024-01-15 00:00:00|Info|a|one\n";
        let out = render(OutputFormat::Columns, false, &CompiledFilter::default(), text);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "2024-01-15 00:00:00 | Info | a | one");
    }

    #[test]
    fn test_header_line() {
        let mut printer = Printer::new(
            Vec::new(),
            OutputFormat::Columns,
            &ColumnMapping::builtin_default(),
            false,
        );
        printer.header().unwrap();
        assert_eq!(String::from_utf8(printer.into_inner()).unwrap(), "Time | Level | Cite | Message\n");
    }

    #[test]
    fn test_json_lines() {
        let out = render(OutputFormat::Json, false, &CompiledFilter::default(), "t|Error|c|boom\n");
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["number"], 0);
        assert_eq!(value["fields"]["Level"], "Error");
        assert_eq!(value["fields"]["Message"], "boom");
    }

    #[test]
    fn test_emphasis_wraps_matches() {
        let filter = CompiledFilter::new("disk");
        assert_eq!(
            emphasize("disk full, disk gone", &filter),
            format!("{EMPHASIS_ON}disk{EMPHASIS_OFF} full, {EMPHASIS_ON}disk{EMPHASIS_OFF} gone")
        );
        assert_eq!(emphasize("plain", &filter), "plain");
    }
}
