//! The iconfontgen library turns glyph selections taken from TrueType icon fonts into artifacts
//! that can be embedded in C, C++ or C# programs.
//!
//! A project holds one selection per font. Each selection maps an original code point to a new
//! code point and a symbolic name. From a project the generator can write:
//!
//! * a subset font file holding only the selected glyphs, optionally merged with other fonts and
//!   rescaled to the metrics of a base font,
//! * a header of `#define ICON_<PREFIX>_<NAME> u8"\uXXXX"` lines,
//! * a source file embedding the subset font as a compressed base85 buffer,
//! * a "card" PNG showing every glyph next to its label.
//!
//! Basic usage loads a TOML project and runs every artifact it requests:
//! ```rust,no_run
//! use iconfontgen::config::{load_project, ConfigSource};
//! use iconfontgen::generator::Generator;
//! use iconfontgen::messages::LogSink;
//! use std::error::Error;
//!
//! fn example() -> Result<(), Box<dyn Error>> {
//!     let (project, request) = load_project(ConfigSource::File("icons.toml"))?;
//!     let sink = LogSink;
//!     let outcome = Generator::new(&project, &sink).generate(&request);
//!     println!("{} files written", outcome.written.len());
//!     Ok(())
//! }
//! ```
//!
//! A project file looks like this:
//! ```toml
//! output_dir = "generated"
//!
//! [generate]
//! targets = ["font", "header"]
//! mode = "batch"
//! language = "cpp"
//!
//! [[font]]
//! path = "fonts/fontawesome.ttf"
//! prefix = "FA"
//! output_name = "fa_icons"
//! glyphs = [
//!     { code_point = 0xf015, name = "home" },
//!     { code_point = 0xf007, new_code_point = 0xe001, name = "user" },
//! ]
//! ```
//!
//! ## Pipeline
//! ```text
//! +-------------+     +----------------+     +------------------+
//! | Font file   |     | Remap table    |     | Subset font      |
//! | (glyf/loca) | --> | old cp -> new  | --> | glyf, loca, cmap |
//! |             |     | cp + name      |     | hmtx, post ...   |
//! +-------------+     +----------------+     +------------------+
//!                                                     |
//!        +--------------------+-----------------------+
//!        v                    v                       v
//! +-------------+     +----------------+     +------------------+
//! | Header .h   |     | compress +     |     | Card .png        |
//! | #define ... |     | base85 source  |     | glyph + label    |
//! +-------------+     +----------------+     +------------------+
//! ```

pub mod base85;
pub mod compress;
pub mod config;
pub mod generator;
pub mod messages;
pub mod project;
pub mod remap;
pub mod sfnt;

use std::error::Error;
use std::fmt;
use std::path::Path;

/// Errors raised while building one artifact.
///
/// Every variant carries a short suggestion so the binary can print something actionable.
#[derive(Debug)]
pub enum GenError {
    /// The output path is empty or malformed
    PathError {
        message: String,
        path: Option<String>,
        suggestion: String,
    },
    /// The source font is missing, unreadable or unparsable
    SourceError {
        path: String,
        message: String,
        suggestion: String,
    },
    /// A font taking part in the generation has no selected glyph
    EmptySelection { font: String, suggestion: String },
    /// A target file could not be written
    WriteError {
        path: String,
        message: String,
        suggestion: String,
    },
    /// Duplicated names or code points forbid the requested artifact
    DuplicateError { message: String, suggestion: String },
    /// The project file is invalid
    ConfigError { message: String, suggestion: String },
    /// A binary stream (compressed buffer, base85 text, font table) is malformed
    FormatError { message: String },
    /// The request asks for a combination that is not implemented
    Unsupported { message: String },
}

impl Error for GenError {}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenError::PathError {
                message,
                path,
                suggestion,
            } => {
                write!(f, "❌ Path Error: {}", message)?;
                if let Some(p) = path {
                    write!(f, "\n📁 Path: {}", p)?;
                }
                write!(f, "\n💡 Suggestion: {}", suggestion)
            }
            GenError::SourceError {
                path,
                message,
                suggestion,
            } => {
                write!(f, "❌ Font Error: Failed to load font '{}'", path)?;
                write!(f, "\n   Reason: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)
            }
            GenError::EmptySelection { font, suggestion } => {
                write!(f, "❌ Selection Error: no glyph selected in font '{}'", font)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)
            }
            GenError::WriteError {
                path,
                message,
                suggestion,
            } => {
                write!(f, "❌ File Error: {}", message)?;
                write!(f, "\n📁 Path: {}", path)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)
            }
            GenError::DuplicateError {
                message,
                suggestion,
            } => {
                write!(f, "❌ Duplicate Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)
            }
            GenError::ConfigError {
                message,
                suggestion,
            } => {
                write!(f, "❌ Configuration Error: {}", message)?;
                write!(f, "\n💡 Suggestion: {}", suggestion)
            }
            GenError::FormatError { message } => write!(f, "❌ Format Error: {}", message),
            GenError::Unsupported { message } => write!(f, "❌ Unsupported: {}", message),
        }
    }
}

impl GenError {
    /// Creates a source error for a font that could not be read or parsed
    pub fn source_error(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        GenError::SourceError {
            path: path.as_ref().display().to_string(),
            message: message.into(),
            suggestion: "Check that the file exists and is a TrueType font with glyf outlines"
                .to_string(),
        }
    }

    /// Creates a write error from an I/O failure
    pub fn write_error(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        GenError::WriteError {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
            suggestion: "Check that the output directory exists and you have write permissions"
                .to_string(),
        }
    }

    /// Creates a format error with just a message
    pub fn format_error(message: impl Into<String>) -> Self {
        GenError::FormatError {
            message: message.into(),
        }
    }

    /// Creates a configuration error
    pub fn config_error(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        GenError::ConfigError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// Writes `contents` to `path`, mapping failures to [`GenError::WriteError`].
///
/// An empty path or a path whose parent directory does not exist is reported as a
/// [`GenError::PathError`] before anything is created, so no partial file is left behind.
pub fn write_output(path: &Path, contents: &[u8]) -> Result<(), GenError> {
    if path.as_os_str().is_empty() || path.file_name().is_none() {
        return Err(GenError::PathError {
            message: "Output path is empty or has no file name".to_string(),
            path: Some(path.display().to_string()),
            suggestion: "Set an output name for the font or for the merged output".to_string(),
        });
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(GenError::PathError {
                message: "Output directory does not exist".to_string(),
                path: Some(parent.display().to_string()),
                suggestion: format!("Create the directory first: mkdir -p {}", parent.display()),
            });
        }
    }
    std::fs::write(path, contents).map_err(|e| GenError::write_error(path, e))
}
