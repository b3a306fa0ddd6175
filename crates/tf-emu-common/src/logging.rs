//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Shared configuration and logging primitives."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "TF_EMU_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

static GUARDS: OnceCell<Vec<WorkerGuard>> = OnceCell::new();

/// Console formats for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Name of the rolling log file for `service`.
///
/// A configured prefix names the deployment, the service tells daemons
/// sharing one log directory apart.
pub fn log_file_name(service_name: &str, config: &LoggingConfig) -> String {
    match config.file_prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() && prefix != service_name => {
            format!("{prefix}-{service_name}.log")
        }
        _ => format!("{service_name}.log"),
    }
}

/// Install the global tracing subscriber for `service_name`.
///
/// The filter comes from `TF_EMU_LOG`, then `RUST_LOG`, then `info`.
/// Console output follows `config.format`. Unless `config.file` is off, a
/// daily rolling JSON file named by [`log_file_name`] is written to
/// `config.directory` as well.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let mut guards = Vec::with_capacity(2);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);

    let console = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .json()
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_writer(stdout_writer)
            .boxed(),
    };

    let file = if config.file {
        std::fs::create_dir_all(&config.directory).with_context(|| {
            format!("unable to create log directory {}", config.directory.display())
        })?;
        let appender = daily(&config.directory, log_file_name(service_name, config));
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        guards.push(file_guard);
        Some(
            fmt::layer()
                .with_ansi(false)
                .json()
                .with_current_span(false)
                .with_writer(file_writer)
                .boxed(),
        )
    } else {
        None
    };

    let filter = build_filter(std::env::var(LOG_ENV).ok());
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .is_ok();
    // A second call keeps the first subscriber and its writers.
    if installed {
        let _ = GUARDS.set(guards);
    }

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        log_file = ?config.file.then(|| log_file_name(service_name, config)),
        format = ?config.format,
        installed,
        "tracing initialised"
    );
    Ok(())
}

fn build_filter(directive: Option<String>) -> EnvFilter {
    match directive {
        Some(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); defaulting to {DEFAULT_DIRECTIVE}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}
