use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "storybook.logs.jsonl";

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// Filter directive, e.g. `info` or `storybook_server=debug`.
    pub filter: String,
    /// JSON lines go to this file when set; otherwise compact text to stderr.
    pub json_path: Option<PathBuf>,
}

impl LogSettings {
    /// Reads `STORYBOOK_OBSERVABILITY_ENABLED`, `STORYBOOK_LOG_LEVEL`,
    /// `RUST_LOG` and `STORYBOOK_JSON_LOG_PATH`.
    pub fn from_env(default_level: &str) -> Self {
        Self::from_lookup(default_level, |key| std::env::var(key).ok())
    }

    fn from_lookup(default_level: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("STORYBOOK_OBSERVABILITY_ENABLED")
            .and_then(|value| parse_flag(&value))
            .unwrap_or(true);
        // An unparsable override falls through to the next source.
        let filter = ["STORYBOOK_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(|key| lookup(key))
            .find(|directive| EnvFilter::try_new(directive).is_ok())
            .unwrap_or_else(|| default_level.to_string());
        let json_path = lookup("STORYBOOK_JSON_LOG_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            filter,
            json_path,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file)
}

/// Installs the global subscriber once per process.
///
/// `default_level` applies when neither `STORYBOOK_LOG_LEVEL` nor `RUST_LOG`
/// holds a valid filter. Later calls are no-ops.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| install(&LogSettings::from_env(default_level)));
}

fn install(settings: &LogSettings) {
    if !settings.enabled {
        return;
    }
    let registry = tracing_subscriber::registry().with(settings.env_filter());

    match &settings.json_path {
        Some(path) => {
            let (dir, file) = split_log_path(path);
            let _ = std::fs::create_dir_all(dir);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(tracing_appender::rolling::never(dir, file));
            let _ = registry.with(layer).try_init();
        }
        None => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = registry.with(layer).try_init();
        }
    }
}
