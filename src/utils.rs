//! Various helper-utilities

use crate::cli::Opts;
use anyhow::Result;
use clap::crate_name;
use flexi_logger::{
    style,
    AdaptiveFormat,
    Age,
    Cleanup,
    Criterion,
    DeferredNow,
    Duplicate,
    FileSpec,
    Level,
    Logger,
    LoggerHandle,
    Naming,
    Record,
    WriteMode,
};
use std::{
    env,
    io::{self, Write},
    panic,
    path::PathBuf,
};
use xdpy::config::Config;

/// Environment variable holding the log specification
const LOG_VAR: &str = "XDPY_LOG";

/// Shorter way of testing if the user wants color for the output of `--help`
pub(crate) fn wants_color() -> bool {
    env::var_os("NO_COLOR").is_none()
}

/// Log level for the number of `-v` flags
fn verbosity_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initializes logging for this crate
///
/// The returned handle must be kept alive; dropping it flushes and stops the
/// logger.
pub(crate) fn initialize_logging(config: &Config, args: &Opts) -> Result<(LoggerHandle, PathBuf)> {
    /// Customize the format of the log (colored)
    fn colored_format(
        w: &mut dyn Write,
        _now: &mut DeferredNow,
        record: &Record,
    ) -> Result<(), io::Error> {
        let level = record.level();
        write!(
            w,
            "{:<5} [{}:{}]: {}",
            style(level, level),
            style(Level::Trace, record.module_path().unwrap_or("<unnamed>")),
            record.line().unwrap_or(0),
            &record.args()
        )
    }

    /// Customize the format of the log (uncolored)
    fn uncolored_format(
        w: &mut dyn Write,
        now: &mut DeferredNow,
        record: &Record,
    ) -> Result<(), io::Error> {
        // Event descriptions may carry ansi sequences from `colored`
        write!(
            w,
            "[{:>}] {:<5} [{}:{}]: {}",
            now.now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("<unnamed>"),
            record.line().unwrap_or(0),
            String::from_utf8(strip_ansi_escapes::strip(
                &record.args().to_string().as_bytes()
            )?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        )
    }

    // Untrapped X errors abort in debug builds; show a readable backtrace
    if cfg!(debug_assertions) {
        better_panic::install();
        panic::set_hook(Box::new(|panic_info| {
            better_panic::Settings::auto().create_panic_handler()(panic_info);
        }));
    }

    let log_dir = config
        .logging
        .log_dir
        .clone()
        .unwrap_or_else(|| env::temp_dir().join(crate_name!()));

    let mut logger = Logger::try_with_str(
        env::var(LOG_VAR).unwrap_or_else(|_| verbosity_level(args.verbose).to_owned()),
    )?
    .write_mode(WriteMode::BufferAndFlush)
    .adaptive_format_for_stderr(AdaptiveFormat::Custom(uncolored_format, colored_format))
    .set_palette(String::from("9;11;14;5;13"));

    if config.logging.log_to_file {
        logger = logger
            .duplicate_to_stderr(Duplicate::All)
            .rotate(
                Criterion::AgeOrSize(Age::Day, 50_000_000),
                Naming::Numbers,
                Cleanup::KeepLogFiles(2),
            )
            .log_to_file(
                FileSpec::default()
                    .basename(crate_name!())
                    .directory(&log_dir),
            )
            .format_for_files(uncolored_format);
    }

    let handle = logger.start()?;

    Ok((handle, log_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(verbosity_level(0), "info");
        assert_eq!(verbosity_level(1), "debug");
        assert_eq!(verbosity_level(2), "trace");
        assert_eq!(verbosity_level(9), "trace");
    }
}
