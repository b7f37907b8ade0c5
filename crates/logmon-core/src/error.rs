use std::path::PathBuf;

/// Errors surfaced by the tailing engine.
///
/// File-lifecycle churn (missing file, locked file, truncation) never ends up
/// here; it is logged and absorbed by the monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid pattern for mapping '{mapping}': {source}")]
    Pattern {
        mapping: String,
        #[source]
        source: regex::Error,
    },

    #[error("cannot watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
