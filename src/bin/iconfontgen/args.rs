/// Command-line argument parsing module
///
/// This module defines the CLI structure using clap with derive macros.
/// It supports:
/// - Standard verbosity flags: -v, -vv
/// - Quiet flag: -q
/// - Verbose level flag: --verbose-level=LEVEL
/// - Environment variable RUST_LOG integration

use clap::Parser;
use std::path::PathBuf;

/// Generate icon font subsets, headers, embedded sources and glyph cards from a project file
///
/// The project file lists the fonts, the glyphs selected in each of them with their new code
/// points and names, and the artifacts to write.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct IconFontArgs {
    /// Path to the TOML project file
    #[arg(long, short = 'p', value_name = "PATH")]
    pub project: PathBuf,

    /// Write artifacts here instead of the project's output_dir (created if missing)
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override the generation mode: current, batch or merged
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Index of the font used by the current mode
    #[arg(long, value_name = "INDEX")]
    pub font: Option<usize>,

    /// Only report duplicated names and code points, exit with code 1 if any
    #[arg(long)]
    pub check: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease verbosity level (suppress most output except errors)
    #[arg(short)]
    pub quiet: bool,

    /// Set explicit verbosity level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub verbose_level: Option<String>,
}

impl IconFontArgs {
    /// Determine the effective log level based on CLI flags and environment variables
    ///
    /// Priority:
    /// 1. RUST_LOG environment variable (highest priority)
    /// 2. --verbose-level flag
    /// 3. -q flag, then the count of -v flags (lowest priority)
    pub fn effective_log_level(&self) -> String {
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            return rust_log;
        }

        if let Some(level) = &self.verbose_level {
            return level.clone();
        }

        if self.quiet {
            return "error".to_string();
        }

        match self.verbose {
            0 => "info".to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}
