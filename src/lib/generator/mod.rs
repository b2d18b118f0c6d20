//! Artifact generation.
//!
//! The [`Generator`] reads a [`ProjectSelection`] and writes fonts, headers, sources and cards
//! into the project's output directory. A failing artifact is reported to the
//! [`MessageSink`] and the remaining artifacts are still attempted.

pub mod card;
pub mod header;
pub mod source;

use crate::base85::{CompressedArtifact, SourceLanguage};
use crate::messages::MessageSink;
use crate::project::{
    ArtifactKind, ArtifactSet, FontId, FontSelection, GenerationPlan, GenerationRequest, MergedTargets,
    ProjectSelection,
};
use crate::remap::{header_identifier, GlyphRemapTable};
use crate::sfnt::font_builder::{self, BuildOptions, SubsetPart};
use crate::sfnt::{FontSource, MergeBaseline};
use crate::GenError;
use header::FontReference;
use log::{debug, info, warn};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Files written by a generation run, and the reasons of the artifacts that failed
#[derive(Debug, Default)]
pub struct GenerationOutcome {
    pub written: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A file removed when the guard goes out of scope
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(path: PathBuf) -> Self {
        TempFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.path.exists() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed temporary file {}", self.path.display()),
                Err(e) => warn!("Could not remove temporary file {}: {}", self.path.display(), e),
            }
        }
    }
}

/// Output stem with `-` replaced by `_`
fn sanitize_stem(stem: &str) -> String {
    stem.replace('-', "_")
}

/// Glyphs of a font for headers and cards: the selection, or every mapped glyph when nothing
/// is selected
fn effective_table<'a>(font: &'a FontSelection) -> Result<Cow<'a, GlyphRemapTable>, GenError> {
    if !font.table.is_empty() {
        return Ok(Cow::Borrowed(&font.table));
    }
    let source = FontSource::open(&font.path)?;
    info!(
        "No glyph selected in {}, using every glyph of the font",
        font.display_name()
    );
    Ok(Cow::Owned(GlyphRemapTable::from_code_points(
        source.mappings().into_iter().map(|(cp, _)| cp),
    )))
}

/// Writes artifacts for one project
pub struct Generator<'a> {
    project: &'a ProjectSelection,
    sink: &'a dyn MessageSink,
}

impl<'a> Generator<'a> {
    pub fn new(project: &'a ProjectSelection, sink: &'a dyn MessageSink) -> Self {
        Generator { project, sink }
    }

    /// Runs every artifact of `request`
    pub fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut outcome = GenerationOutcome::default();
        match request.plan {
            GenerationPlan::Current { font, targets } => {
                self.generate_one(font, targets, request, &mut outcome);
            }
            GenerationPlan::Batch { targets } => {
                let enabled: Vec<FontId> = self
                    .project
                    .ids()
                    .filter(|id| self.project.fonts[id.0].settings.enabled)
                    .collect();
                if enabled.is_empty() {
                    self.fail(&mut outcome, GenError::EmptySelection {
                        font: String::new(),
                        suggestion: "Add a font to the project or enable one".to_string(),
                    });
                }
                for id in enabled {
                    self.generate_one(id, targets, request, &mut outcome);
                }
            }
            GenerationPlan::Merged { targets } => {
                self.generate_merged(targets, request, &mut outcome);
            }
        }
        info!(
            "Generation finished: {} file(s) written, {} failure(s)",
            outcome.written.len(),
            outcome.failures.len()
        );
        outcome
    }

    fn fail(&self, outcome: &mut GenerationOutcome, err: GenError) {
        let text = err.to_string();
        self.sink.error(&text);
        outcome.failures.push(text);
    }

    /// Keeps the written paths or reports the error, returns true on success
    fn record(&self, outcome: &mut GenerationOutcome, result: Result<Vec<PathBuf>, GenError>) -> bool {
        match result {
            Ok(paths) => {
                outcome.written.extend(paths);
                true
            }
            Err(e) => {
                self.fail(outcome, e);
                false
            }
        }
    }

    fn font(&self, id: FontId) -> Result<&'a FontSelection, GenError> {
        self.project.font(id).ok_or_else(|| {
            GenError::config_error(
                format!("no font with index {}", id.0),
                "Use the index of a [[font]] entry of the project, starting at 0",
            )
        })
    }

    fn output_path(&self, stem: &str, suffix: &str, extension: &str) -> Result<PathBuf, GenError> {
        let stem = sanitize_stem(stem);
        if stem.is_empty() {
            return Err(GenError::PathError {
                message: "Output name is empty".to_string(),
                path: None,
                suggestion: "Set output_name for the font or the merged output".to_string(),
            });
        }
        Ok(self.project.output_dir.join(format!("{}{}.{}", stem, suffix, extension)))
    }

    /// Header path: `<stem>.h`, or `<stem>_Labels.cs` for C#
    fn header_path(&self, stem: &str, language: SourceLanguage) -> Result<PathBuf, GenError> {
        match language {
            SourceLanguage::CSharp => self.output_path(stem, "_Labels", language.header_extension()),
            _ => self.output_path(stem, "", language.header_extension()),
        }
    }

    /// Source path: `<stem>.c`, `<stem>.cpp` or `<stem>_Bytes.cs`
    fn source_path(&self, stem: &str, language: SourceLanguage) -> Result<PathBuf, GenError> {
        match language {
            SourceLanguage::CSharp => self.output_path(stem, "_Bytes", language.source_extension()),
            _ => self.output_path(stem, "", language.source_extension()),
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn generate_one(
        &self,
        id: FontId,
        targets: ArtifactSet,
        request: &GenerationRequest,
        outcome: &mut GenerationOutcome,
    ) {
        let font = match self.font(id) {
            Ok(font) => font,
            Err(e) => return self.fail(outcome, e),
        };
        if targets.is_empty() {
            self.sink
                .warning(&format!("Nothing to generate for {}", font.display_name()));
            return;
        }
        if font.duplicate_flags().any() {
            return self.fail(outcome, GenError::DuplicateError {
                message: format!(
                    "{} has glyphs sharing a name or a code point",
                    font.display_name()
                ),
                suggestion: "Rename or renumber the duplicated glyphs, or run with --check to list them"
                    .to_string(),
            });
        }
        info!("Generating for {}", font.display_name());

        let with_header = targets.contains(ArtifactKind::Header);
        if targets.contains(ArtifactKind::Source) {
            let result = self.generate_source(id, with_header, request);
            self.record(outcome, result);
        }
        let mut font_ok = true;
        if targets.contains(ArtifactKind::Font) {
            let result = self.generate_font_file(id, request).and_then(|font_path| {
                let mut paths = vec![font_path.clone()];
                if with_header && !targets.contains(ArtifactKind::Source) {
                    let name = Self::file_name(&font_path);
                    paths.push(self.generate_header(id, FontReference::File(&name), request)?);
                }
                Ok(paths)
            });
            font_ok = self.record(outcome, result);
        }
        if with_header && !targets.contains(ArtifactKind::Source) && !targets.contains(ArtifactKind::Font) {
            let result = self.output_path(&font.settings.output_name, "", "ttf").and_then(|font_path| {
                let name = Self::file_name(&font_path);
                self.generate_header(id, FontReference::File(&name), request).map(|p| vec![p])
            });
            self.record(outcome, result);
        }
        if targets.contains(ArtifactKind::Card) {
            if !font_ok {
                debug!("Skipping the card of {}, its font file failed", font.display_name());
                return;
            }
            let result = self.generate_card(id).map(|p| vec![p]);
            self.record(outcome, result);
        }
    }

    /// Writes the subset font of one font
    pub fn generate_font_file(&self, id: FontId, request: &GenerationRequest) -> Result<PathBuf, GenError> {
        let font = self.font(id)?;
        let path = self.output_path(&font.settings.output_name, "", "ttf")?;
        if font.table.is_empty() {
            return Err(GenError::EmptySelection {
                font: font.display_name(),
                suggestion: "Select glyphs in this font before generating a font file".to_string(),
            });
        }
        font_builder::build_subset(&font.path, &font.table, request.export_glyph_names, &path)?;
        Ok(path)
    }

    /// Writes the header of one font
    pub fn generate_header(
        &self,
        id: FontId,
        reference: FontReference,
        request: &GenerationRequest,
    ) -> Result<PathBuf, GenError> {
        let font = self.font(id)?;
        let path = self.header_path(&font.settings.output_name, request.language)?;
        let table = effective_table(font)?;
        let glyphs = header::header_glyphs([table.as_ref()]);
        self.write_header(&path, &font.settings.prefix, reference, &glyphs, request)?;
        Ok(path)
    }

    fn write_header(
        &self,
        path: &Path,
        prefix: &str,
        reference: FontReference,
        glyphs: &BTreeMap<String, u32>,
        request: &GenerationRequest,
    ) -> Result<(), GenError> {
        let text = match request.language {
            SourceLanguage::CSharp => header::render_csharp_labels(prefix, reference, glyphs, request.header_order),
            _ => header::render_header(prefix, reference, glyphs, request.header_order),
        };
        crate::write_output(path, text.as_bytes())?;
        info!("Header written to {}", path.display());
        Ok(())
    }

    /// Writes the source embedding one font, and its header when `with_header` is set.
    ///
    /// Without a selection the whole original font is embedded.
    pub fn generate_source(
        &self,
        id: FontId,
        with_header: bool,
        request: &GenerationRequest,
    ) -> Result<Vec<PathBuf>, GenError> {
        let font = self.font(id)?;
        let stem = &font.settings.output_name;
        let source_path = self.source_path(stem, request.language)?;

        let font_bytes = if font.table.is_empty() {
            info!("No glyph selected in {}, embedding the whole font", font.display_name());
            std::fs::read(&font.path).map_err(|e| GenError::source_error(&font.path, e.to_string()))?
        } else {
            let temp = TempFile::new(self.output_path(&format!("temporary_{}", stem), "", "ttf")?);
            font_builder::build_subset(&font.path, &font.table, request.export_glyph_names, temp.path())?;
            std::fs::read(temp.path()).map_err(|e| GenError::source_error(temp.path(), e.to_string()))?
        };

        let prefix = &font.settings.prefix;
        let artifact = CompressedArtifact::from_font_bytes(prefix, &font_bytes);
        let mut written = Vec::new();
        let mut include = None;
        if with_header {
            let header_path = self.header_path(stem, request.language)?;
            let reference = FontReference::Buffer {
                name: &artifact.buffer_name,
                size: artifact.buffer_size,
            };
            let table = effective_table(font)?;
            let glyphs = header::header_glyphs([table.as_ref()]);
            self.write_header(&header_path, prefix, reference, &glyphs, request)?;
            include = Some(Self::file_name(&header_path));
            written.push(header_path);
        }

        let text = source::render_source(request.language, prefix, &artifact, include.as_deref(), None);
        crate::write_output(&source_path, text.as_bytes())?;
        info!("Source written to {}", source_path.display());
        written.push(source_path);
        Ok(written)
    }

    /// Writes the card picture of one font
    pub fn generate_card(&self, id: FontId) -> Result<PathBuf, GenError> {
        let font = self.font(id)?;
        let path = self.output_path(&font.settings.output_name, "", "png")?;
        let glyph_font = card::load_font(&font.path)?;
        let label_font = card::label_font(&font.settings.card, &glyph_font)?;

        let table = effective_table(font)?;
        let labels: BTreeMap<String, u32> = table
            .iter()
            .map(|e| {
                let id = header_identifier(&e.new_name);
                let label = if font.settings.prefix.is_empty() {
                    id
                } else {
                    format!("ICON_{}_{}", font.settings.prefix, id)
                };
                (label, e.original_code_point)
            })
            .collect();

        let image = card::render_card(&glyph_font, &label_font, &labels, &font.settings.card)?;
        card::write_card_png(&path, &image)?;
        info!("Card written to {} ({}x{})", path.display(), image.width, image.height);
        Ok(path)
    }

    fn generate_merged(&self, targets: MergedTargets, request: &GenerationRequest, outcome: &mut GenerationOutcome) {
        if !(targets.font || targets.source || targets.header) {
            self.sink.warning("Nothing to generate for the merged font");
            return;
        }
        if let Err(e) = self.check_merge() {
            return self.fail(outcome, e);
        }
        let stem = &self.project.merge.output_name;
        if targets.source {
            let result = self.generate_source_merged(targets.header, request);
            self.record(outcome, result);
        }
        if targets.font {
            let result = self.generate_font_file_merged(request).and_then(|font_path| {
                let mut paths = vec![font_path.clone()];
                if targets.header && !targets.source {
                    let name = Self::file_name(&font_path);
                    paths.push(self.generate_header_merged(FontReference::File(&name), request)?);
                }
                Ok(paths)
            });
            self.record(outcome, result);
        }
        if targets.header && !targets.source && !targets.font {
            let result = self.output_path(stem, "", "ttf").and_then(|font_path| {
                let name = Self::file_name(&font_path);
                self.generate_header_merged(FontReference::File(&name), request).map(|p| vec![p])
            });
            self.record(outcome, result);
        }
    }

    fn enabled_fonts(&self) -> Vec<&'a FontSelection> {
        self.project.fonts.iter().filter(|f| f.settings.enabled).collect()
    }

    /// Every enabled font needs a selection, and no name or code point may be shared
    fn check_merge(&self) -> Result<(), GenError> {
        let fonts = self.enabled_fonts();
        if fonts.is_empty() {
            return Err(GenError::EmptySelection {
                font: String::new(),
                suggestion: "Enable at least one font to merge".to_string(),
            });
        }
        if let Some(font) = fonts.iter().find(|f| f.table.is_empty()) {
            return Err(GenError::EmptySelection {
                font: font.display_name(),
                suggestion: "Every merged font needs at least one selected glyph".to_string(),
            });
        }
        if self.project.duplicate_report().global.any() {
            return Err(GenError::DuplicateError {
                message: "glyphs of different fonts share a name or a code point".to_string(),
                suggestion: "Rerange the selection or rename glyphs, then run with --check".to_string(),
            });
        }
        Ok(())
    }

    /// Parsed enabled fonts, the baseline and the index of the template font
    fn merge_sources(&self) -> Result<(Vec<FontSource>, Option<MergeBaseline>, usize), GenError> {
        let fonts = self.enabled_fonts();
        let sources = fonts
            .iter()
            .map(|f| FontSource::open(&f.path))
            .collect::<Result<Vec<_>, _>>()?;

        let merge = &self.project.merge;
        let base_path = merge
            .base_font
            .and_then(|id| self.project.font(id))
            .map(|f| f.path.as_path());
        let template = match base_path {
            Some(path) => fonts.iter().position(|f| f.path == path).unwrap_or_else(|| {
                warn!("The merge base font is disabled, using {} instead", fonts[0].display_name());
                0
            }),
            None => 0,
        };

        let baseline = if merge.disable_glyph_rescale {
            None
        } else {
            Some(MergeBaseline::from_font(&sources[template]))
        };
        Ok((sources, baseline, template))
    }

    fn merged_bytes(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenError> {
        let fonts = self.enabled_fonts();
        let (sources, baseline, template) = self.merge_sources()?;
        let parts: Vec<SubsetPart> = sources
            .iter()
            .zip(&fonts)
            .map(|(source, font)| SubsetPart {
                source,
                table: &font.table,
            })
            .collect();
        font_builder::build_merged_bytes(
            &parts,
            &BuildOptions {
                baseline,
                template,
                export_names: request.export_glyph_names,
            },
        )
    }

    /// Writes the merged font
    pub fn generate_font_file_merged(&self, request: &GenerationRequest) -> Result<PathBuf, GenError> {
        self.check_merge()?;
        let path = self.output_path(&self.project.merge.output_name, "", "ttf")?;
        let bytes = self.merged_bytes(request)?;
        crate::write_output(&path, &bytes)?;
        info!("Merged font written to {}", path.display());
        Ok(path)
    }

    /// Writes the merged header
    pub fn generate_header_merged(
        &self,
        reference: FontReference,
        request: &GenerationRequest,
    ) -> Result<PathBuf, GenError> {
        let merge = &self.project.merge;
        let path = self.header_path(&merge.output_name, request.language)?;
        let glyphs = header::header_glyphs(self.enabled_fonts().into_iter().map(|f| &f.table));
        self.write_header(&path, &merge.prefix, reference, &glyphs, request)?;
        Ok(path)
    }

    /// Writes the source embedding the merged font, and its header when `with_header` is set
    pub fn generate_source_merged(&self, with_header: bool, request: &GenerationRequest) -> Result<Vec<PathBuf>, GenError> {
        self.check_merge()?;
        let merge = &self.project.merge;
        let stem = &merge.output_name;
        let source_path = self.source_path(stem, request.language)?;

        let temp = TempFile::new(self.output_path(&format!("temporary_{}", stem), "", "ttf")?);
        let bytes = self.merged_bytes(request)?;
        crate::write_output(temp.path(), &bytes)?;
        let font_bytes =
            std::fs::read(temp.path()).map_err(|e| GenError::source_error(temp.path(), e.to_string()))?;
        drop(temp);

        let artifact = CompressedArtifact::from_font_bytes(&merge.prefix, &font_bytes);
        let mut written = Vec::new();
        let mut include = None;
        let mut alias = None;
        if with_header {
            let reference = FontReference::Buffer {
                name: &artifact.buffer_name,
                size: artifact.buffer_size,
            };
            let header_path = self.generate_header_merged(reference, request)?;
            include = Some(Self::file_name(&header_path));
            alias = Some(format!("FONT_ICON_BUFFER_NAME_{}", merge.prefix));
            written.push(header_path);
        }

        let text = source::render_source(
            request.language,
            &merge.prefix,
            &artifact,
            include.as_deref(),
            alias.as_deref(),
        );
        crate::write_output(&source_path, text.as_bytes())?;
        info!("Merged source written to {}", source_path.display());
        written.push(source_path);
        Ok(written)
    }
}
