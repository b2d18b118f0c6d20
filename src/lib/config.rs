//! Project files.
//!
//! A project is a TOML file listing the fonts, the glyphs selected in each of them and what to
//! generate. Relative paths are resolved against the directory of the project file, and a
//! leading `~` is replaced by the home directory.
//!
//! # Project Structure
//!
//! - `output_dir` is where every artifact is written (default: the project directory)
//! - `[generate]` selects the artifacts (`targets`), the mode (`current`, `batch` or `merged`),
//!   the source `language` (`c`, `cpp` or `csharp`), `export_glyph_names` and `header_order`
//!   (`names` or `codepoint`)
//! - `[merge]` holds the merged output settings: `base_font`, `prefix`, `output_name` and
//!   `disable_glyph_rescale`
//! - each `[[font]]` names a font file with its `prefix`, `output_name`, `enabled` flag, `card`
//!   layout and `glyphs`
//!
//! # Example
//!
//! ```toml
//! output_dir = "generated"
//!
//! [generate]
//! targets = ["font", "source", "header"]
//! mode = "merged"
//! language = "c"
//!
//! [merge]
//! base_font = 0
//! prefix = "ICONS"
//! output_name = "icons"
//!
//! [[font]]
//! path = "fonts/fontawesome.ttf"
//! glyphs = [{ code_point = 0xf015, new_code_point = 0xe000, name = "home" }]
//!
//! [[font]]
//! path = "~/fonts/material.ttf"
//! card = { glyph_height = 40, max_rows = 10 }
//! glyphs = [{ code_point = "U+E88A", new_code_point = 0xe001 }]
//! ```
//!
//! A glyph without `new_code_point` keeps its code point, a glyph without `name` is called
//! `uniXXXX`. `select_all = true` selects every glyph mapped by the font's `cmap`.

use crate::base85::SourceLanguage;
use crate::project::{
    ArtifactKind, ArtifactSet, CardSettings, FontId, FontSelection, GenerationPlan, GenerationRequest, HeaderOrder,
    MergeSettings, MergedTargets, ProjectSelection,
};
use crate::remap::GlyphRemapTable;
use crate::sfnt::FontSource;
use crate::GenError;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

/// Where the project TOML comes from
#[derive(Debug, Clone)]
pub enum ConfigSource<'a> {
    /// Project file on disk, relative paths resolve against its directory
    File(&'a str),
    /// Project text, relative paths resolve against the current directory
    Embedded(&'a str),
}

/// Expands `~` and resolves relative paths against `base`
fn resolve_path(base: &Path, value: &str) -> PathBuf {
    let expanded = if value == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(value))
    } else if let Some(rest) = value.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(value),
        }
    } else {
        PathBuf::from(value)
    };
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Parses a code point given as an integer, `"U+F015"`, `"0xf015"` or a decimal string
fn parse_code_point(value: &Value, field: &str) -> Result<u32, GenError> {
    let invalid = || {
        GenError::config_error(
            format!("invalid code point in `{}`: {}", field, value),
            "Write code points as integers (0xf015) or strings (\"U+F015\")",
        )
    };
    match value {
        Value::Integer(i) => u32::try_from(*i).map_err(|_| invalid()),
        Value::String(s) => {
            let s = s.trim();
            let parsed = if let Some(hex) = s.strip_prefix("U+").or_else(|| s.strip_prefix("u+")) {
                u32::from_str_radix(hex, 16)
            } else if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u32::from_str_radix(hex, 16)
            } else {
                s.parse::<u32>()
            };
            parsed.map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

fn get_str<'v>(value: &'v Value, field: &str) -> Result<Option<&'v str>, GenError> {
    match value.get(field) {
        None => Ok(None),
        Some(v) => v.as_str().map(Some).ok_or_else(|| {
            GenError::config_error(format!("`{}` must be a string", field), format!("Quote the value of `{}`", field))
        }),
    }
}

fn get_bool(value: &Value, field: &str) -> Result<Option<bool>, GenError> {
    match value.get(field) {
        None => Ok(None),
        Some(v) => v.as_bool().map(Some).ok_or_else(|| {
            GenError::config_error(format!("`{}` must be a boolean", field), "Use true or false")
        }),
    }
}

fn get_index(value: &Value, field: &str) -> Result<Option<usize>, GenError> {
    match value.get(field) {
        None => Ok(None),
        Some(v) => v
            .as_integer()
            .and_then(|i| usize::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| {
                GenError::config_error(
                    format!("`{}` must be a non negative integer", field),
                    "Fonts are numbered from 0 in the order of the [[font]] entries",
                )
            }),
    }
}

/// Parses the `targets` array
fn parse_targets(value: Option<&Value>) -> Result<ArtifactSet, GenError> {
    let Some(value) = value else {
        return Ok(ArtifactSet::of(&[ArtifactKind::Font, ArtifactKind::Header]));
    };
    let items = value.as_array().ok_or_else(|| {
        GenError::config_error("`targets` must be an array", "Example: targets = [\"font\", \"header\"]")
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str().and_then(ArtifactKind::parse).ok_or_else(|| {
                GenError::config_error(
                    format!("unknown target {}", item),
                    "Valid targets are font, source, header and card",
                )
            })
        })
        .collect()
}

/// Builds the plan of `mode` for the given targets
pub fn plan_for_mode(
    mode: &str,
    current: usize,
    targets: ArtifactSet,
    project: &ProjectSelection,
) -> Result<GenerationPlan, GenError> {
    match mode.to_lowercase().as_str() {
        "current" => {
            if current >= project.fonts.len() {
                return Err(GenError::config_error(
                    format!("current font {} does not exist, the project has {} font(s)", current, project.fonts.len()),
                    "Set `current` to the index of a [[font]] entry, starting at 0",
                ));
            }
            Ok(GenerationPlan::Current {
                font: FontId(current),
                targets,
            })
        }
        "batch" => Ok(GenerationPlan::Batch { targets }),
        "merged" | "merge" => Ok(GenerationPlan::Merged {
            targets: MergedTargets::try_from(targets)?,
        }),
        other => Err(GenError::config_error(
            format!("unknown mode '{}'", other),
            "Valid modes are current, batch and merged",
        )),
    }
}

fn parse_card(value: Option<&Value>, base: &Path) -> Result<CardSettings, GenError> {
    let mut card = CardSettings::default();
    let Some(value) = value else {
        return Ok(card);
    };
    if let Some(height) = value.get("glyph_height").and_then(|v| v.as_integer()) {
        card.glyph_height = u32::try_from(height).unwrap_or(0);
    }
    if let Some(rows) = value.get("max_rows").and_then(|v| v.as_integer()) {
        card.max_rows = u32::try_from(rows).unwrap_or(0);
    }
    if card.glyph_height == 0 || card.max_rows == 0 {
        return Err(GenError::config_error(
            "card glyph_height and max_rows must be positive",
            "Example: card = { glyph_height = 50, max_rows = 20 }",
        ));
    }
    if let Some(label_font) = get_str(value, "label_font")? {
        card.label_font = Some(resolve_path(base, label_font));
    }
    Ok(card)
}

fn parse_font(value: &Value, base: &Path) -> Result<FontSelection, GenError> {
    let path = get_str(value, "path")?.ok_or_else(|| {
        GenError::config_error("a [[font]] entry has no path", "Add path = \"fonts/icons.ttf\" to every [[font]]")
    })?;
    let mut font = FontSelection::new(resolve_path(base, path));
    if let Some(prefix) = get_str(value, "prefix")? {
        font.settings.prefix = prefix.to_string();
    }
    if let Some(name) = get_str(value, "output_name")? {
        font.settings.output_name = name.to_string();
    }
    if let Some(enabled) = get_bool(value, "enabled")? {
        font.settings.enabled = enabled;
    }
    font.settings.card = parse_card(value.get("card"), base)?;

    if get_bool(value, "select_all")?.unwrap_or(false) {
        let source = FontSource::open(&font.path)?;
        font.table = GlyphRemapTable::from_code_points(source.mappings().into_iter().map(|(cp, _)| cp));
        debug!("Selected all {} glyphs of {}", font.table.len(), font.display_name());
    }

    if let Some(glyphs) = value.get("glyphs") {
        let glyphs = glyphs.as_array().ok_or_else(|| {
            GenError::config_error(
                "`glyphs` must be an array",
                "Example: glyphs = [{ code_point = 0xf015, name = \"home\" }]",
            )
        })?;
        for glyph in glyphs {
            let code_point = glyph
                .get("code_point")
                .ok_or_else(|| {
                    GenError::config_error(
                        format!("a glyph of {} has no code_point", font.display_name()),
                        "Every glyph needs the code point it has in the source font",
                    )
                })
                .and_then(|v| parse_code_point(v, "code_point"))?;
            let new_code_point = match glyph.get("new_code_point") {
                Some(v) => parse_code_point(v, "new_code_point")?,
                None => code_point,
            };
            let name = get_str(glyph, "name")?
                .map(str::to_string)
                .unwrap_or_else(|| format!("uni{:04X}", code_point));
            if font.table.get(code_point).is_some() {
                warn!(
                    "U+{:04X} is listed twice in {}, keeping the last entry",
                    code_point,
                    font.display_name()
                );
            }
            font.table.add(code_point, new_code_point, name)?;
        }
    }
    Ok(font)
}

fn parse_merge(value: Option<&Value>) -> Result<MergeSettings, GenError> {
    let mut merge = MergeSettings::default();
    let Some(value) = value else {
        return Ok(merge);
    };
    merge.base_font = get_index(value, "base_font")?.map(FontId);
    if let Some(prefix) = get_str(value, "prefix")? {
        merge.prefix = prefix.to_string();
    }
    if let Some(name) = get_str(value, "output_name")? {
        merge.output_name = name.to_string();
    }
    merge.disable_glyph_rescale = get_bool(value, "disable_glyph_rescale")?.unwrap_or(false);
    Ok(merge)
}

/// Parses project text. Relative paths resolve against `base`.
pub fn parse_project_string(
    content: &str,
    base: &Path,
) -> Result<(ProjectSelection, GenerationRequest), GenError> {
    let config: Value = toml::from_str(content).map_err(|e| {
        GenError::config_error(
            format!("invalid TOML: {}", e),
            "Check the syntax of the project file",
        )
    })?;

    let output_dir = match get_str(&config, "output_dir")? {
        Some(dir) => resolve_path(base, dir),
        None => base.to_path_buf(),
    };
    let mut project = ProjectSelection::new(output_dir);

    if let Some(fonts) = config.get("font") {
        let fonts = fonts.as_array().ok_or_else(|| {
            GenError::config_error("`font` must be an array of tables", "Declare fonts with [[font]]")
        })?;
        for font in fonts {
            project.add_font(parse_font(font, base)?);
        }
    }

    project.merge = parse_merge(config.get("merge"))?;
    if let Some(id) = project.merge.base_font {
        if project.font(id).is_none() {
            return Err(GenError::config_error(
                format!("merge base_font {} does not exist", id.0),
                "Set base_font to the index of a [[font]] entry, starting at 0",
            ));
        }
    }

    let generate = config.get("generate");
    let field = |name: &str| generate.and_then(|g| g.get(name));
    let targets = parse_targets(field("targets"))?;
    let mode = match field("mode") {
        Some(v) => v.as_str().ok_or_else(|| {
            GenError::config_error("`mode` must be a string", "Valid modes are current, batch and merged")
        })?,
        None => "batch",
    };
    let current = match generate {
        Some(g) => get_index(g, "current")?.unwrap_or(0),
        None => 0,
    };
    let mut request = GenerationRequest::new(plan_for_mode(mode, current, targets, &project)?);

    if let Some(language) = field("language") {
        request.language = language.as_str().and_then(SourceLanguage::parse).ok_or_else(|| {
            GenError::config_error(format!("unknown language {}", language), "Valid languages are c, cpp and csharp")
        })?;
    }
    if let Some(g) = generate {
        request.export_glyph_names = get_bool(g, "export_glyph_names")?.unwrap_or(false);
    }
    if let Some(order) = field("header_order") {
        request.header_order = match order.as_str() {
            Some("names") | Some("name") => HeaderOrder::Names,
            Some("codepoint") | Some("code_point") => HeaderOrder::CodePoint,
            _ => {
                return Err(GenError::config_error(
                    format!("unknown header order {}", order),
                    "Valid orders are names and codepoint",
                ))
            }
        };
    }

    debug!(
        "Project loaded: {} font(s), output in {}",
        project.fonts.len(),
        project.output_dir.display()
    );
    Ok((project, request))
}

/// Loads a project from a file or from embedded text
pub fn load_project(source: ConfigSource) -> Result<(ProjectSelection, GenerationRequest), GenError> {
    match source {
        ConfigSource::File(path) => {
            let path = Path::new(path);
            let content = fs::read_to_string(path).map_err(|e| GenError::PathError {
                message: format!("Cannot read project file: {}", e),
                path: Some(path.display().to_string()),
                suggestion: "Check the --project path".to_string(),
            })?;
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            parse_project_string(&content, &base)
        }
        ConfigSource::Embedded(content) => {
            let base = std::env::current_dir().unwrap_or_default();
            parse_project_string(content, &base)
        }
    }
}
