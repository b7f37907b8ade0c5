//! Log file tailing for logmon
//!
//! This crate watches a log file, parses it into records with a column
//! mapping and publishes appended records to subscribers. Consumer-side
//! filtering and record views live here as well.

mod charset;
mod error;
mod event;
mod filter;
mod monitor;
mod reader;
mod record;
mod splitter;
mod view;
mod watcher;

pub use charset::{Charset, UnknownCharset};
pub use error::MonitorError;
pub use event::{ArcRecord, MonitorEvent, Snapshot};
pub use filter::CompiledFilter;
pub use monitor::{Monitor, MonitorOptions};
pub use reader::{parse_text, read_records};
pub use record::{FieldValue, Record, parse_time};
pub use splitter::{FieldSplitter, PatternSplitter, SeparatorSplitter, for_mapping};
pub use view::{LevelCounts, RecordView};
pub use watcher::{DirWatch, WatchEvent};

// Re-export types used in our public API
pub use logmon_types::{ColumnConfig, ColumnMapping, ColumnType, LevelValue, LogFile, MappingError};
