// Logging bootstrap for roost
//
// Thin setup layer over the `tracing` ecosystem. The pool itself only ever
// emits through the `tracing` macros and never requires a subscriber to be
// installed: with none present every emission is a no-op, which is exactly
// the contract the pool's shutdown paths rely on. Embedding applications
// that already install their own subscriber can ignore this module
// entirely.

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, Layer};

// Re-exported so callers can log through the same facade the pool uses.
pub use tracing::{debug, error, info, trace, warn};

/// Configuration for the logging bootstrap.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: Level,
    /// Emit JSON records instead of human-readable lines.
    pub json_format: bool,
    /// Include file and line information.
    pub show_file_line: bool,
    /// Include thread names and ids. Worker threads carry their pool name,
    /// so this is the first thing to turn on when debugging placement.
    pub show_thread_info: bool,
    /// Extra target filters, `"target=level,target2=level2"` style.
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

// Initialization guard so repeated init calls stay harmless
static INIT: Once = Once::new();

/// Install a global subscriber built from `config`. Safe to call multiple
/// times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let env_filter = build_filter(&config);

        let registry = tracing_subscriber::registry().with(env_filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else {
            Box::new(registry.with(console_layer(&config)))
        };

        set_global_subscriber(subscriber);
    });
}

/// Install the default INFO-level console subscriber.
pub fn init_default() {
    init(LogConfig::default());
}

/// Install a subscriber logging to both the console and `log_file`
/// (appended, created if missing, never colored).
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    // Open eagerly so a bad path surfaces as an error instead of being
    // swallowed inside the writer closure.
    file_writer(log_file)?;
    let log_file_path = log_file.to_string();

    INIT.call_once(move || {
        let env_filter = build_filter(&config);

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()) as Box<dyn io::Write + Send + Sync>,
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer(&config))
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

fn console_layer<S>(config: &LogConfig) -> impl Layer<S>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info)
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Appending boxed writer for log files.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}
