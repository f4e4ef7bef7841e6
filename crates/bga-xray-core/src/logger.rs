//! Stderr logging for the inspection tools.
//!
//! Records from the `bga_xray*` crates are shown down to the requested level;
//! records from other crates (image decoders and the like) are capped at
//! `Warn` so `--log-level debug` stays readable. Lines look like
//! `[  0.042s DEBUG inspect::alignment] ...`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const ENGINE_PREFIX: &str = "bga_xray";
const ENGINE_CRATES: [&str; 3] = ["bga_xray", "bga_xray_core", "bga_xray_inspect"];

fn is_engine_target(target: &str) -> bool {
    target == ENGINE_PREFIX || target.starts_with("bga_xray_") || target.starts_with("bga_xray::")
}

/// `bga_xray_inspect::alignment` -> `inspect::alignment`.
fn short_target(target: &str) -> &str {
    target
        .strip_prefix("bga_xray_")
        .or_else(|| target.strip_prefix("bga_xray::"))
        .unwrap_or(target)
}

fn foreign_level(level: LevelFilter) -> LevelFilter {
    level.min(LevelFilter::Warn)
}

struct InspectLogger {
    engine: LevelFilter,
    started: Instant,
}

impl InspectLogger {
    fn passes(&self, level: Level, target: &str) -> bool {
        if is_engine_target(target) {
            level <= self.engine
        } else {
            level <= foreign_level(self.engine)
        }
    }
}

impl Log for InspectLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.passes(metadata.level(), metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<InspectLogger> = OnceLock::new();

/// Install the stderr logger; engine records are shown down to `level`.
///
/// Only the first call installs anything.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| InspectLogger {
            engine: level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// `EnvFilter` directives equivalent to the stderr logger's policy.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn filter_directives(level: LevelFilter) -> String {
    let engine = level.as_str().to_ascii_lowercase();
    let mut directives = foreign_level(level).as_str().to_ascii_lowercase();
    for krate in ENGINE_CRATES {
        directives.push_str(&format!(",{krate}={engine}"));
    }
    directives
}

/// Install a `tracing` subscriber. `RUST_LOG` wins over `level` when set.
///
/// Spans are reported on close, so the instrumented stages show their timings.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
