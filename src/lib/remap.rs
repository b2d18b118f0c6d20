//! Glyph remapping tables.
//!
//! A [`GlyphRemapTable`] belongs to one font and maps the original code point of every selected
//! glyph to its new code point and symbolic name. Tables never reject duplicated names or code
//! points: duplication is a condition reported by [`detect_duplicates`] and checked by the
//! generator before producing headers or merged fonts.

use crate::project::FontId;
use crate::GenError;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Highest code point a remapped glyph may use
pub const MAX_CODE_POINT: u32 = 0xFFFF;

/// One selected glyph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphRemapEntry {
    pub original_code_point: u32,
    pub new_code_point: u32,
    pub new_name: String,
}

impl GlyphRemapEntry {
    /// Identifier used in generated headers and cards
    pub fn header_identifier(&self) -> String {
        header_identifier(&self.new_name)
    }
}

/// Turns a glyph name into a C identifier fragment.
///
/// Spaces and hyphens become underscores, every `.` becomes `DOT_` (so `.notdef` gives
/// `DOT_NOTDEF`) and the result is upper-cased.
pub fn header_identifier(name: &str) -> String {
    name.replace([' ', '-'], "_")
        .replace('.', "DOT_")
        .to_ascii_uppercase()
}

fn check_code_point(code_point: u32) -> Result<(), GenError> {
    if code_point > MAX_CODE_POINT {
        return Err(GenError::config_error(
            format!("code point 0x{:x} is outside 0..=0xffff", code_point),
            "Use a code point of the Basic Multilingual Plane, the Private Use Area starts at 0xe000",
        ));
    }
    Ok(())
}

/// Original code point to new code point and name, for one font
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphRemapTable {
    entries: BTreeMap<u32, GlyphRemapEntry>,
}

impl GlyphRemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity selection of every mapping, named `uniXXXX`
    pub fn from_code_points(code_points: impl IntoIterator<Item = u32>) -> Self {
        let mut table = Self::new();
        for cp in code_points.into_iter().filter(|&cp| cp <= MAX_CODE_POINT) {
            table.entries.insert(
                cp,
                GlyphRemapEntry {
                    original_code_point: cp,
                    new_code_point: cp,
                    new_name: format!("uni{:04X}", cp),
                },
            );
        }
        table
    }

    /// Inserts or overwrites the entry of `original_code_point`
    pub fn add(
        &mut self,
        original_code_point: u32,
        new_code_point: u32,
        new_name: impl Into<String>,
    ) -> Result<(), GenError> {
        check_code_point(new_code_point)?;
        self.entries.insert(
            original_code_point,
            GlyphRemapEntry {
                original_code_point,
                new_code_point,
                new_name: new_name.into(),
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, original_code_point: u32) -> Option<GlyphRemapEntry> {
        self.entries.remove(&original_code_point)
    }

    /// Returns false when the glyph is not selected
    pub fn rename(&mut self, original_code_point: u32, new_name: impl Into<String>) -> bool {
        match self.entries.get_mut(&original_code_point) {
            Some(entry) => {
                entry.new_name = new_name.into();
                true
            }
            None => false,
        }
    }

    /// Returns `Ok(false)` when the glyph is not selected
    pub fn renumber(&mut self, original_code_point: u32, new_code_point: u32) -> Result<bool, GenError> {
        check_code_point(new_code_point)?;
        Ok(match self.entries.get_mut(&original_code_point) {
            Some(entry) => {
                entry.new_code_point = new_code_point;
                true
            }
            None => false,
        })
    }

    pub fn get(&self, original_code_point: u32) -> Option<&GlyphRemapEntry> {
        self.entries.get(&original_code_point)
    }

    /// Entries in original code point order
    pub fn iter(&self) -> impl Iterator<Item = &GlyphRemapEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn new_code_points(&self) -> BTreeSet<u32> {
        self.entries.values().map(|e| e.new_code_point).collect()
    }

    /// Smallest and largest new code point
    pub fn code_point_range(&self) -> Option<(u32, u32)> {
        let min = self.entries.values().map(|e| e.new_code_point).min()?;
        let max = self.entries.values().map(|e| e.new_code_point).max()?;
        Some((min, max))
    }
}

impl<'a> IntoIterator for &'a GlyphRemapTable {
    type Item = &'a GlyphRemapEntry;
    type IntoIter = std::collections::btree_map::Values<'a, u32, GlyphRemapEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// Which duplicate flags [`detect_duplicates`] computes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateScope {
    /// Repeats inside one table
    PerFont,
    /// Repeats across the union of all tables
    Global,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateFlags {
    pub name_in_double: bool,
    pub code_point_in_double: bool,
}

impl DuplicateFlags {
    pub fn any(&self) -> bool {
        self.name_in_double || self.code_point_in_double
    }

    fn all(&self) -> bool {
        self.name_in_double && self.code_point_in_double
    }
}

/// Result of a duplicate scan. Flags of a scope that was not requested stay false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    /// One entry per table, in input order
    pub per_font: Vec<DuplicateFlags>,
    pub global: DuplicateFlags,
}

impl DuplicateReport {
    /// Both scopes at once
    pub fn analyse(tables: &[&GlyphRemapTable]) -> Self {
        let mut report = detect_duplicates(DuplicateScope::PerFont, tables);
        report.global = detect_duplicates(DuplicateScope::Global, tables).global;
        report
    }

    pub fn font(&self, id: FontId) -> DuplicateFlags {
        self.per_font.get(id.0).copied().unwrap_or_default()
    }

    pub fn any(&self) -> bool {
        self.global.any() || self.per_font.iter().any(DuplicateFlags::any)
    }
}

/// Scans names and new code points for repeats.
///
/// Names are compared on their header identifier, since that is what collides in generated
/// code: `"a"` and `"A"` are duplicates. A font stops being scanned as soon as every flag it can
/// still change is set.
pub fn detect_duplicates(scope: DuplicateScope, tables: &[&GlyphRemapTable]) -> DuplicateReport {
    let mut report = DuplicateReport {
        per_font: vec![DuplicateFlags::default(); tables.len()],
        global: DuplicateFlags::default(),
    };
    let mut global_names = HashSet::new();
    let mut global_code_points = HashSet::new();

    for (index, table) in tables.iter().enumerate() {
        let mut names = HashSet::new();
        let mut code_points = HashSet::new();
        let flags = &mut report.per_font[index];

        for entry in table.iter() {
            let name = entry.header_identifier();
            match scope {
                DuplicateScope::PerFont => {
                    if !flags.name_in_double && !names.insert(name) {
                        flags.name_in_double = true;
                    }
                    if !flags.code_point_in_double && !code_points.insert(entry.new_code_point) {
                        flags.code_point_in_double = true;
                    }
                    if flags.all() {
                        break;
                    }
                }
                DuplicateScope::Global => {
                    if !report.global.name_in_double && !global_names.insert(name) {
                        report.global.name_in_double = true;
                    }
                    if !report.global.code_point_in_double
                        && !global_code_points.insert(entry.new_code_point)
                    {
                        report.global.code_point_in_double = true;
                    }
                    if report.global.all() {
                        return report;
                    }
                }
            }
        }
    }
    report
}

/// A selected glyph, addressed by its font and its original code point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlyphRef {
    pub font: FontId,
    pub original_code_point: u32,
}

fn occupied_outside(tables: &[&mut GlyphRemapTable], selection: &BTreeSet<GlyphRef>) -> HashSet<i64> {
    let mut occupied = HashSet::new();
    for (index, table) in tables.iter().enumerate() {
        for entry in table.iter() {
            let key = GlyphRef {
                font: FontId(index),
                original_code_point: entry.original_code_point,
            };
            if !selection.contains(&key) {
                occupied.insert(entry.new_code_point as i64);
            }
        }
    }
    occupied
}

fn rerange<'a>(
    tables: &mut [&mut GlyphRemapTable],
    first: i64,
    step: i64,
    order: impl Iterator<Item = &'a GlyphRef>,
    occupied: &HashSet<i64>,
) -> usize {
    let mut changed = 0;
    let mut pos = first;
    for glyph in order {
        let Some(entry) = tables
            .get_mut(glyph.font.0)
            .and_then(|t| t.entries.get_mut(&glyph.original_code_point))
        else {
            continue;
        };
        while occupied.contains(&pos) {
            pos += step;
        }
        if (0..=MAX_CODE_POINT as i64).contains(&pos) && entry.new_code_point as i64 != pos {
            entry.new_code_point = pos as u32;
            changed += 1;
        }
        pos += step;
    }
    changed
}

/// Gives the selected glyphs consecutive free code points from `start` upwards.
///
/// Code points held by glyphs outside the selection, in any font, are skipped. A glyph whose
/// slot falls above 0xFFFF keeps its code point. Returns how many entries changed, so running
/// it again with the same selection returns 0.
pub fn rerange_after_start(
    tables: &mut [&mut GlyphRemapTable],
    start: u32,
    selection: &BTreeSet<GlyphRef>,
) -> usize {
    let occupied = occupied_outside(tables, selection);
    rerange(tables, start as i64, 1, selection.iter(), &occupied)
}

/// Same as [`rerange_after_start`], walking down from `end`: the last selected glyph gets the
/// highest free code point not above `end`.
pub fn rerange_before_end(
    tables: &mut [&mut GlyphRemapTable],
    end: u32,
    selection: &BTreeSet<GlyphRef>,
) -> usize {
    let occupied = occupied_outside(tables, selection);
    rerange(tables, end as i64, -1, selection.iter().rev(), &occupied)
}
