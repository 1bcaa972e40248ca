//! Logger bootstrap for the command-line tools.
//!
//! The library only emits through the `log` facade; binaries call
//! [`init_logging`] once to route records to stderr via `flexi_logger`.
//! `RUST_LOG` takes precedence over the requested level.

use std::sync::OnceLock;

use flexi_logger::{Logger, LoggerHandle};

static LOGGER: OnceLock<(&'static str, LoggerHandle)> = OnceLock::new();

/// Default level for the CLI: rejected charges and lenient zero-fills
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Start stderr logging at `level`.
///
/// Idempotent for the same level; a second call with a different level is
/// rejected.
pub fn init_logging(level: &str) -> Result<(), String> {
    let level = normalize_level(level)?;

    if let Some((active, _)) = LOGGER.get() {
        if *active != level {
            return Err(format!(
                "logging already initialized with level `{}`; refusing to switch to `{}`",
                active, level
            ));
        }
        return Ok(());
    }

    let handle = Logger::try_with_env_or_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    // Lost race: another thread started a logger first and owns the facade.
    let _ = LOGGER.set((level, handle));
    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        )),
    }
}
