/// Logging initialization module
///
/// The chosen level applies to the `iconfontgen` modules. Font parsing and writing crates
/// only report warnings. A RUST_LOG style filter string is used as is.

use crate::args::IconFontArgs;
use env_logger::Builder;
use log::{Level, LevelFilter};

const CRATE_TARGET: &str = "iconfontgen";

/// Level of a plain level name, `None` for a filter string such as `iconfontgen::sfnt=trace`
fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// Module path without the crate name, `generator::card` for `iconfontgen::generator::card`
fn short_target(target: &str) -> &str {
    target
        .strip_prefix(CRATE_TARGET)
        .and_then(|rest| rest.strip_prefix("::"))
        .unwrap_or(target)
}

/// Initialize logging based on CLI arguments and environment variables
///
/// # Log Level Selection Priority
///
/// 1. RUST_LOG environment variable (highest priority)
/// 2. --verbose-level flag
/// 3. -q flag (quiet, only show errors)
/// 4. Count of -v flags (-v = debug, -vv = trace)
/// 5. Default (info level)
///
/// Debug and trace lines carry the module they come from: `[DEBUG sfnt::font_builder] ...`.
pub fn init_logging(args: &IconFontArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Builder::new();

    let level_str = args.effective_log_level();
    match parse_level(&level_str) {
        Some(level_filter) => {
            builder.filter_level(level_filter.min(LevelFilter::Warn));
            builder.filter_module(CRATE_TARGET, level_filter);
        }
        None => {
            builder.filter_level(LevelFilter::Info);
            builder.parse_filters(&level_str);
        }
    }

    builder.format(|buf, record| {
        use std::io::Write;
        if record.level() > Level::Info {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                short_target(record.target()),
                record.args()
            )
        } else {
            writeln!(buf, "[{}] {}", record.level(), record.args())
        }
    });

    builder
        .try_init()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    Ok(())
}
