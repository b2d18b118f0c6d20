//! In-memory project: the fonts, their selections and the generation settings.
//!
//! Fonts live in an arena (`ProjectSelection::fonts`) and are addressed by [`FontId`]. Nothing
//! holds a reference to a font across calls, so closing or reordering fonts never leaves a
//! dangling glyph behind.

use crate::base85::SourceLanguage;
use crate::remap::{self, DuplicateFlags, DuplicateReport, DuplicateScope, GlyphRef, GlyphRemapTable};
use crate::GenError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Index of a font in [`ProjectSelection::fonts`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontId(pub usize);

/// Layout of the glyph card picture
#[derive(Debug, Clone, PartialEq)]
pub struct CardSettings {
    /// Height of one row in pixels
    pub glyph_height: u32,
    /// Rows per column before wrapping to a new column
    pub max_rows: u32,
    /// Font used for the labels, a system sans-serif font when unset
    pub label_font: Option<PathBuf>,
}

impl Default for CardSettings {
    fn default() -> Self {
        CardSettings {
            glyph_height: 50,
            max_rows: 20,
            label_font: None,
        }
    }
}

/// Per font generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct FontSettings {
    /// Stem of the generated files, without extension
    pub output_name: String,
    /// Symbol prefix, as in `ICON_<PREFIX>_HOME`
    pub prefix: String,
    pub card: CardSettings,
    /// Disabled fonts are skipped by batch and merged generation
    pub enabled: bool,
}

/// A font file and the glyphs chosen from it
#[derive(Debug, Clone, PartialEq)]
pub struct FontSelection {
    pub path: PathBuf,
    pub table: GlyphRemapTable,
    pub settings: FontSettings,
}

impl FontSelection {
    /// Selection with settings derived from the file name
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix: String = stem
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        FontSelection {
            settings: FontSettings {
                output_name: stem,
                prefix,
                card: CardSettings::default(),
                enabled: true,
            },
            path,
            table: GlyphRemapTable::new(),
        }
    }

    /// File name used in messages
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Names or code points repeated inside this selection, whether the font is enabled or not
    pub fn duplicate_flags(&self) -> DuplicateFlags {
        remap::detect_duplicates(DuplicateScope::PerFont, &[&self.table])
            .per_font
            .first()
            .copied()
            .unwrap_or_default()
    }
}

/// Settings of merged generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeSettings {
    /// Font whose bounding box, ascent and descent every other font is scaled to
    pub base_font: Option<FontId>,
    pub prefix: String,
    pub output_name: String,
    pub disable_glyph_rescale: bool,
}

/// Everything the generator needs, passed explicitly to every call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSelection {
    pub fonts: Vec<FontSelection>,
    pub merge: MergeSettings,
    pub output_dir: PathBuf,
}

impl ProjectSelection {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        ProjectSelection {
            output_dir: output_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn add_font(&mut self, font: FontSelection) -> FontId {
        self.fonts.push(font);
        FontId(self.fonts.len() - 1)
    }

    pub fn font(&self, id: FontId) -> Option<&FontSelection> {
        self.fonts.get(id.0)
    }

    pub fn font_mut(&mut self, id: FontId) -> Option<&mut FontSelection> {
        self.fonts.get_mut(id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = FontId> + '_ {
        (0..self.fonts.len()).map(FontId)
    }

    /// Tables of every font, indexed like `fonts`
    pub fn tables(&self) -> Vec<&GlyphRemapTable> {
        self.fonts.iter().map(|f| &f.table).collect()
    }

    /// See [`remap::rerange_after_start`]
    pub fn rerange_after_start(&mut self, start: u32, selection: &BTreeSet<GlyphRef>) -> usize {
        let mut tables: Vec<&mut GlyphRemapTable> =
            self.fonts.iter_mut().map(|f| &mut f.table).collect();
        remap::rerange_after_start(&mut tables, start, selection)
    }

    /// See [`remap::rerange_before_end`]
    pub fn rerange_before_end(&mut self, end: u32, selection: &BTreeSet<GlyphRef>) -> usize {
        let mut tables: Vec<&mut GlyphRemapTable> =
            self.fonts.iter_mut().map(|f| &mut f.table).collect();
        remap::rerange_before_end(&mut tables, end, selection)
    }

    /// Duplicate report of enabled fonts only, indexed like `fonts` (disabled fonts report no
    /// duplicates)
    pub fn duplicate_report(&self) -> DuplicateReport {
        let empty = GlyphRemapTable::new();
        let tables: Vec<&GlyphRemapTable> = self
            .fonts
            .iter()
            .map(|f| if f.settings.enabled { &f.table } else { &empty })
            .collect();
        DuplicateReport::analyse(&tables)
    }

    /// Drops every selection, keeping the fonts
    pub fn clear_selections(&mut self) {
        for font in &mut self.fonts {
            font.table.clear();
        }
    }
}

/// One kind of generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Font,
    Source,
    Header,
    Card,
}

impl ArtifactKind {
    fn bit(self) -> u8 {
        match self {
            ArtifactKind::Font => 1,
            ArtifactKind::Source => 2,
            ArtifactKind::Header => 4,
            ArtifactKind::Card => 8,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "font" => Some(ArtifactKind::Font),
            "source" | "src" => Some(ArtifactKind::Source),
            "header" => Some(ArtifactKind::Header),
            "card" => Some(ArtifactKind::Card),
            _ => None,
        }
    }
}

/// Combinable set of [`ArtifactKind`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactSet(u8);

impl ArtifactSet {
    pub fn empty() -> Self {
        ArtifactSet(0)
    }

    pub fn of(kinds: &[ArtifactKind]) -> Self {
        kinds.iter().copied().collect()
    }

    pub fn insert(&mut self, kind: ArtifactKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<ArtifactKind> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = ArtifactKind>>(iter: I) -> Self {
        let mut set = ArtifactSet::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Artifacts available in merged mode. There is no card here: merged cards are not generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergedTargets {
    pub font: bool,
    pub source: bool,
    pub header: bool,
}

impl TryFrom<ArtifactSet> for MergedTargets {
    type Error = GenError;

    fn try_from(set: ArtifactSet) -> Result<Self, Self::Error> {
        if set.contains(ArtifactKind::Card) {
            return Err(GenError::Unsupported {
                message: "card generation is not available for merged fonts".to_string(),
            });
        }
        Ok(MergedTargets {
            font: set.contains(ArtifactKind::Font),
            source: set.contains(ArtifactKind::Source),
            header: set.contains(ArtifactKind::Header),
        })
    }
}

/// Which fonts to generate from, and what
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPlan {
    /// One font
    Current { font: FontId, targets: ArtifactSet },
    /// One output set per enabled font
    Batch { targets: ArtifactSet },
    /// All enabled fonts combined into one output
    Merged { targets: MergedTargets },
}

impl GenerationPlan {
    /// Requested artifacts, whatever the mode
    pub fn targets(&self) -> ArtifactSet {
        match *self {
            GenerationPlan::Current { targets, .. } | GenerationPlan::Batch { targets } => targets,
            GenerationPlan::Merged { targets } => {
                let mut set = ArtifactSet::empty();
                if targets.font {
                    set.insert(ArtifactKind::Font);
                }
                if targets.source {
                    set.insert(ArtifactKind::Source);
                }
                if targets.header {
                    set.insert(ArtifactKind::Header);
                }
                set
            }
        }
    }
}

/// Order of the glyph defines in headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderOrder {
    #[default]
    Names,
    CodePoint,
}

/// A full generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub plan: GenerationPlan,
    pub language: SourceLanguage,
    /// Write glyph names in a version 2 `post` table
    pub export_glyph_names: bool,
    pub header_order: HeaderOrder,
}

impl GenerationRequest {
    pub fn new(plan: GenerationPlan) -> Self {
        GenerationRequest {
            plan,
            language: SourceLanguage::default(),
            export_glyph_names: false,
            header_order: HeaderOrder::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_selection_defaults_from_path() {
        let sel = FontSelection::new("fonts/font-awesome.ttf");
        assert_eq!(sel.settings.output_name, "font-awesome");
        assert_eq!(sel.settings.prefix, "FONTAWESOME");
        assert_eq!(sel.display_name(), "font-awesome.ttf");
        assert!(sel.settings.enabled);
    }

    #[test]
    fn test_artifact_set() {
        let set = ArtifactSet::of(&[ArtifactKind::Source, ArtifactKind::Header]);
        assert!(set.contains(ArtifactKind::Source));
        assert!(set.contains(ArtifactKind::Header));
        assert!(!set.contains(ArtifactKind::Font));
        assert!(ArtifactSet::empty().is_empty());
    }

    #[test]
    fn test_merged_targets_reject_card() {
        let with_card = ArtifactSet::of(&[ArtifactKind::Font, ArtifactKind::Card]);
        assert!(MergedTargets::try_from(with_card).is_err());
        let ok = MergedTargets::try_from(ArtifactSet::of(&[ArtifactKind::Font])).unwrap();
        assert!(ok.font && !ok.source && !ok.header);
    }

    #[test]
    fn test_duplicate_report_ignores_disabled_fonts() {
        let mut project = ProjectSelection::new("out");
        let mut a = FontSelection::new("a.ttf");
        a.table.add(0x41, 0xE000, "x").unwrap();
        let mut b = FontSelection::new("b.ttf");
        b.table.add(0x41, 0xE000, "x").unwrap();
        project.add_font(a);
        let id = project.add_font(b);
        assert!(project.duplicate_report().global.any());

        project.font_mut(id).unwrap().settings.enabled = false;
        assert!(!project.duplicate_report().any());
    }

    #[test]
    fn test_duplicate_flags_of_disabled_font() {
        let mut font = FontSelection::new("a.ttf");
        font.table.add(0x41, 0xE000, "home").unwrap();
        font.table.add(0x42, 0xE000, "Home").unwrap();
        font.settings.enabled = false;

        let flags = font.duplicate_flags();
        assert!(flags.name_in_double);
        assert!(flags.code_point_in_double);
    }

    #[test]
    fn test_rerange_through_project() {
        let mut project = ProjectSelection::new("out");
        let mut a = FontSelection::new("a.ttf");
        a.table.add(0x41, 0x41, "a").unwrap();
        a.table.add(0x42, 0x42, "b").unwrap();
        let id = project.add_font(a);
        let selection: BTreeSet<GlyphRef> = [0x41, 0x42]
            .iter()
            .map(|&cp| GlyphRef {
                font: id,
                original_code_point: cp,
            })
            .collect();
        assert_eq!(project.rerange_after_start(0xE000, &selection), 2);
        assert_eq!(project.rerange_after_start(0xE000, &selection), 0);
        let table = &project.font(id).unwrap().table;
        assert_eq!(table.new_code_points().into_iter().collect::<Vec<_>>(), vec![0xE000, 0xE001]);
    }
}
