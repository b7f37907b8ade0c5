use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use logmon_core::{Charset, CompiledFilter, LevelValue, LogFile, MonitorOptions};

mod app;
mod config;
mod output;

use app::Session;
use config::Config;
use output::{OutputFormat, Printer};

/// Logmon - follow a growing log file and split its lines into columns
#[derive(Parser, Debug)]
#[command(name = "logmon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file to follow (defaults to the first configured log)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Config file (defaults to ~/.config/logmon/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Column mapping used for FILE
    #[arg(long, value_name = "NAME")]
    mapping: Option<String>,

    /// Start following immediately
    #[arg(long)]
    run: bool,

    /// Only show these levels, e.g. `error,fatal`
    #[arg(long, value_name = "LEVELS", value_delimiter = ',')]
    levels: Vec<LevelValue>,

    /// Only show records with at least this many leading `*`/`#` marks
    #[arg(long, value_name = "N")]
    highlight: Option<usize>,

    /// Only show records whose message contains TEXT
    #[arg(long, value_name = "TEXT")]
    filter: Option<String>,

    /// Match --filter case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// File charset: windows-1251, utf-8 or latin-1
    #[arg(long, value_name = "NAME")]
    charset: Option<Charset>,

    /// Diagnostic logging to stderr
    #[arg(long, value_enum, value_name = "on|off")]
    log: Option<Switch>,

    /// Print records as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    let logging = match args.log {
        Some(switch) => switch == Switch::On,
        None => config.logging_enabled,
    };
    if logging {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::WARN.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    // Run the application
    let result = run_app(args, config).await;

    // Handle any errors
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args, config: Config) -> Result<()> {
    let log = select_log(&args, &config)?;
    let start = args.run || log.auto_start;

    let filter = build_filter(&args, &log);
    let options = MonitorOptions {
        charset: args.charset.unwrap_or(config.charset),
        ..MonitorOptions::default()
    };

    let stdout = std::io::stdout();
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Columns
    };
    let emphasis = !args.json && stdout.is_terminal();
    let mut printer = Printer::new(stdout.lock(), format, &log.mapping, emphasis);
    printer.header()?;

    tracing::info!(path = %log.path.display(), mapping = %log.mapping, start, "following log file");

    let mut session = Session::open(log, options, filter, printer)?;
    if start {
        session.start();
    }

    session
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let counts = session.view().level_counts();
    tracing::info!(
        total = counts.total(),
        warn = counts.warn,
        error = counts.error,
        fatal = counts.fatal,
        "session finished"
    );

    Ok(())
}

/// FILE from the command line, or the first registry entry. A FILE that is
/// not registered is used with the selected or default mapping.
fn select_log(args: &Args, config: &Config) -> Result<LogFile> {
    match &args.file {
        Some(path) => match config.log_for(path) {
            Some(log) if args.mapping.is_none() => Ok(log.clone()),
            registered => {
                let mapping = config.mapping(args.mapping.as_deref())?.clone();
                let auto_start = registered.is_some_and(|l| l.auto_start);
                Ok(LogFile::new(path, mapping).with_auto_start(auto_start))
            }
        },
        None => config
            .logs
            .first()
            .cloned()
            .context("no log file given and none configured"),
    }
}

/// Registry filter settings overridden by command line flags
fn build_filter(args: &Args, log: &LogFile) -> CompiledFilter {
    let text = args
        .filter
        .as_deref()
        .or(log.filter_text.as_deref())
        .unwrap_or_default();

    let filter = if args.case_sensitive {
        CompiledFilter::new(text)
    } else {
        CompiledFilter::new_case_insensitive(text)
    };

    let levels = if args.levels.is_empty() {
        log.filter_levels.clone()
    } else {
        args.levels.clone()
    };

    filter
        .with_levels(levels)
        .with_min_highlight(args.highlight.unwrap_or(log.filter_highlight))
}
