//! Stderr logging for binaries and tests.
//!
//! Lines look like `[  0.042s  INFO calib_dots_board] message`. The level can
//! be given directly or read from `CALIB_DOTS_LOG`.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::Uptime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV: &str = "CALIB_DOTS_LOG";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Module paths are noise at this granularity; keep the crate.
        let origin = record.target().split("::").next().unwrap_or_default();
        let mut out = std::io::stderr().lock();
        let _ = writeln!(
            out,
            "[{:7.3}s {:>5} {origin}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the given level filter.
///
/// Only the first call installs a logger; later calls keep the first level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Level named by `value` (`off`, `error`, ..., `trace`), `Info` when unset or unknown.
fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the stderr logger with the level from [`LOG_ENV`].
pub fn init_from_env() -> Result<(), log::SetLoggerError> {
    let value = std::env::var(LOG_ENV).ok();
    init_with_level(level_from(value.as_deref()))
}

/// `tracing` filter from directives such as `calib_dots_board=debug,info`.
///
/// Unset or malformed directives fall back to `info`.
#[cfg(feature = "tracing")]
fn tracing_filter(value: Option<&str>) -> EnvFilter {
    value
        .and_then(|v| EnvFilter::try_new(v.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install a `tracing` subscriber that reports span timings.
///
/// Directives are read from [`LOG_ENV`], the same variable as [`init_from_env`].
/// With `json` set every event is one flattened JSON object per line.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let value = std::env::var(LOG_ENV).ok();
    let text = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(Uptime::default())
            .with_span_events(FmtSpan::CLOSE)
    });
    let structured = json.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
    });
    let _ = tracing_subscriber::registry()
        .with(tracing_filter(value.as_deref()))
        .with(text)
        .with(structured)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_leniently() {
        assert_eq!(level_from(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from(Some(" WARN ")), LevelFilter::Warn);
        assert_eq!(level_from(Some("loud")), LevelFilter::Info);
        assert_eq!(level_from(None), LevelFilter::Info);
    }

    #[test]
    fn repeated_initialization_is_harmless() {
        init_with_level(LevelFilter::Warn).expect("first init");
        init_with_level(LevelFilter::Trace).expect("second init");
        init_from_env().expect("env init");
        log::warn!("logger smoke test");
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn tracing_directives_fall_back_to_info() {
        let custom = tracing_filter(Some("calib_dots_board=debug")).to_string();
        assert!(custom.contains("calib_dots_board=debug"), "{custom}");
        let malformed = tracing_filter(Some("calib_dots_board=loud")).to_string();
        assert!(malformed.eq_ignore_ascii_case("info"), "{malformed}");
        let unset = tracing_filter(None).to_string();
        assert!(unset.eq_ignore_ascii_case("info"), "{unset}");
    }
}
