use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "sitegen.logs.jsonl";

/// Where log records go.
#[derive(Debug, PartialEq, Eq)]
enum LogOutput {
    /// Compact lines on stderr, leaving stdout to the caller.
    Console,
    /// One JSON object per line, appended to `dir/file_name`.
    JsonFile { dir: PathBuf, file_name: String },
}

/// Logging settings resolved from the environment.
#[derive(Debug, PartialEq, Eq)]
struct LogSettings {
    enabled: bool,
    filter: String,
    output: LogOutput,
}

impl LogSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, default_level: &str) -> Self {
        let enabled = lookup("SITEGEN_OBSERVABILITY_ENABLED")
            .and_then(|v| parse_switch(&v))
            .unwrap_or(true);

        // The first directive that parses wins.
        let filter = ["SITEGEN_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(&lookup)
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty() && EnvFilter::try_new(v).is_ok())
            .unwrap_or_else(|| default_level.to_string());

        let output = match lookup("SITEGEN_JSON_LOG_PATH").filter(|v| !v.trim().is_empty()) {
            Some(raw) => json_file(Path::new(raw.trim())),
            None => LogOutput::Console,
        };

        Self {
            enabled,
            filter,
            output,
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn json_file(path: &Path) -> LogOutput {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    LogOutput::JsonFile { dir, file_name }
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `SITEGEN_OBSERVABILITY_ENABLED`: enable/disable switch (default enabled).
/// - `SITEGEN_LOG_LEVEL`, then `RUST_LOG`: filter directives (`info`, `sitegen_stream=debug`, ...).
/// - `SITEGEN_JSON_LOG_PATH`: write JSONL records to this file instead of stderr.
///
/// `default_level` applies when neither filter variable holds a valid directive.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| {
        let settings = LogSettings::from_lookup(|key| std::env::var(key).ok(), default_level);
        if settings.enabled {
            install(settings);
        }
    });
}

fn install(settings: LogSettings) {
    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let _ = match settings.output {
        LogOutput::Console => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogOutput::JsonFile { dir, file_name } => {
            let _ = std::fs::create_dir_all(&dir);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(false)
                        .with_writer(tracing_appender::rolling::never(dir, file_name)),
                )
                .try_init()
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)], default_level: &str) -> LogSettings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| map.get(key).cloned(), default_level)
    }

    #[test]
    fn defaults_to_console_at_given_level() {
        assert_eq!(
            settings(&[], "info"),
            LogSettings {
                enabled: true,
                filter: "info".into(),
                output: LogOutput::Console,
            }
        );
    }

    #[test]
    fn sitegen_level_beats_rust_log_and_bad_directives_fall_through() {
        let s = settings(
            &[("SITEGEN_LOG_LEVEL", "debug"), ("RUST_LOG", "trace")],
            "info",
        );
        assert_eq!(s.filter, "debug");
        let s = settings(
            &[("SITEGEN_LOG_LEVEL", "sitegen=loud"), ("RUST_LOG", "warn")],
            "info",
        );
        assert_eq!(s.filter, "warn");
    }

    #[test]
    fn json_path_and_switch_are_read() {
        let s = settings(
            &[
                ("SITEGEN_OBSERVABILITY_ENABLED", " Off "),
                ("SITEGEN_JSON_LOG_PATH", "logs/run.jsonl"),
            ],
            "info",
        );
        assert!(!s.enabled);
        assert_eq!(
            s.output,
            LogOutput::JsonFile {
                dir: PathBuf::from("logs"),
                file_name: "run.jsonl".into(),
            }
        );
        assert_eq!(
            json_file(Path::new("bare.jsonl")),
            LogOutput::JsonFile {
                dir: PathBuf::from("."),
                file_name: "bare.jsonl".into(),
            }
        );
        assert_eq!(parse_switch("maybe"), None);
    }

    #[test]
    fn init_is_idempotent() {
        init_observability("warn");
        init_observability("debug");
        assert!(INIT.get().is_some());
    }
}
