//! Logging setup.
//!
//! Uses the `log` facade with the `env_logger` backend. The level comes from
//! (first match wins):
//!
//! 1. `DGCATALOG_LOG`, then `RUST_LOG` (full `env_logger` filter syntax)
//! 2. CLI flags: `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. Default: info
//!
//! Debug builds print a timestamp and, when verbose, the module path.
//! Release builds print level and message only.
//!
//! ```rust,no_run
//! use dgcatalog::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Environment variables checked for a filter, in order.
pub const LOG_ENV_VARS: [&str; 2] = ["DGCATALOG_LOG", "RUST_LOG"];

/// Initialize logging once at startup. Later calls are ignored.
pub fn init_logging(verbose: u8, quiet: bool) {
    let env_filter = LOG_ENV_VARS
        .iter()
        .find_map(|name| env::var(name).ok().map(|value| (*name, value)));

    let mut builder = Builder::new();
    match &env_filter {
        Some((_, filter)) => {
            builder.parse_filters(filter);
        }
        None => {
            builder.filter_level(determine_level(verbose, quiet));
        }
    }
    configure_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return;
    }
    match env_filter {
        Some((name, filter)) => log::debug!("Logging initialized from {}={}", name, filter),
        None => log::debug!(
            "Logging initialized at level: {:?}",
            determine_level(verbose, quiet)
        ),
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let level_style = buf.default_level_style(level);
            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} [{}] {}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} {}",
                    timestamp,
                    level,
                    record.args()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let level_style = buf.default_level_style(level);
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        });
    }
}
