//! Stderr logging. The library crates log through the `log` facade; records
//! are bridged into a `tracing` fmt subscriber.

use std::io::IsTerminal;

use log::LevelFilter;
use tracing::level_filters::LevelFilter as TraceLevel;
use tracing_subscriber::FmtSubscriber;

/// Install the subscriber and the `log` bridge. Fails if either is already set.
pub fn init(level: LevelFilter) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level(level))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| e.to_string())?;
    tracing_log::LogTracer::init_with_filter(level).map_err(|e| e.to_string())
}

fn trace_level(level: LevelFilter) -> TraceLevel {
    match level {
        LevelFilter::Off => TraceLevel::OFF,
        LevelFilter::Error => TraceLevel::ERROR,
        LevelFilter::Warn => TraceLevel::WARN,
        LevelFilter::Info => TraceLevel::INFO,
        LevelFilter::Debug => TraceLevel::DEBUG,
        LevelFilter::Trace => TraceLevel::TRACE,
    }
}

/// `-q` wins over `-v`; otherwise each `-v` raises the configured default.
pub fn effective_level(default: LevelFilter, verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => default,
        1 => default.max(LevelFilter::Debug),
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags() {
        assert_eq!(effective_level(LevelFilter::Warn, 0, false), LevelFilter::Warn);
        assert_eq!(effective_level(LevelFilter::Warn, 1, false), LevelFilter::Debug);
        assert_eq!(effective_level(LevelFilter::Warn, 3, false), LevelFilter::Trace);
        assert_eq!(effective_level(LevelFilter::Warn, 2, true), LevelFilter::Error);
        assert_eq!(effective_level(LevelFilter::Trace, 1, false), LevelFilter::Trace);
    }

    #[test]
    fn levels_map_onto_tracing() {
        assert_eq!(trace_level(LevelFilter::Off), TraceLevel::OFF);
        assert_eq!(trace_level(LevelFilter::Warn), TraceLevel::WARN);
        assert_eq!(trace_level(LevelFilter::Trace), TraceLevel::TRACE);
    }

    #[test]
    fn second_init_is_refused() {
        assert!(init(LevelFilter::Warn).is_ok());
        assert!(init(LevelFilter::Debug).is_err());
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
