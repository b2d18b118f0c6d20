//! TrueType reading and writing.
//!
//! Only fonts with `glyf` outlines are supported. Reading goes through `read-fonts` for the
//! table directory and through `skrifa` for the character map; the few header fields the
//! builder needs are read straight from the raw tables.

pub mod cmap_builder;
pub mod font_builder;
pub mod glyf;
pub mod post_table_builder;

use crate::GenError;
use byteorder::{BigEndian, ByteOrder};
use glyf::{GlyphOutline, LocaOffsets};
use log::debug;
use read_fonts::types::Tag;
use read_fonts::{FontRef, TableProvider};
use skrifa::MetadataProvider;
use std::path::Path;

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Result<u16, GenError> {
    data.get(offset..offset + 2)
        .map(BigEndian::read_u16)
        .ok_or_else(|| GenError::format_error(format!("table truncated at offset {}", offset)))
}

pub(crate) fn read_i16(data: &[u8], offset: usize) -> Result<i16, GenError> {
    read_u16(data, offset).map(|v| v as i16)
}

pub(crate) fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    if let Some(slot) = data.get_mut(offset..offset + 2) {
        BigEndian::write_u16(slot, value);
    }
}

pub(crate) fn write_i16(data: &mut [u8], offset: usize, value: i16) {
    write_u16(data, offset, value as u16);
}

/// Horizontal metric of one glyph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HMetric {
    pub advance: u16,
    pub lsb: i16,
}

/// A parsed source font
#[derive(Debug, Clone)]
pub struct FontSource {
    name: String,
    data: Vec<u8>,
    num_glyphs: u16,
    units_per_em: u16,
    bounding_box: [i32; 4],
    ascent: i32,
    descent: i32,
    loca: LocaOffsets,
    h_metrics: Vec<HMetric>,
}

fn required_table<'a>(font: &FontRef<'a>, name: &str, tag: &[u8; 4]) -> Result<&'a [u8], GenError> {
    font.table_data(Tag::new(tag))
        .map(|d| d.as_bytes())
        .ok_or_else(|| {
            GenError::source_error(
                name,
                format!(
                    "missing '{}' table (only TrueType outlines are supported)",
                    String::from_utf8_lossy(tag)
                ),
            )
        })
}

impl FontSource {
    /// Reads and parses a font file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GenError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| GenError::source_error(path, e.to_string()))?;
        Self::from_bytes(path.display().to_string(), data)
    }

    /// Parses font bytes; `name` is only used in messages
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, GenError> {
        let name = name.into();
        let font = FontRef::new(&data).map_err(|e| GenError::source_error(&name, e.to_string()))?;
        let num_glyphs = font
            .maxp()
            .map_err(|e| GenError::source_error(&name, e.to_string()))?
            .num_glyphs();

        let head = required_table(&font, &name, b"head")?;
        let hhea = required_table(&font, &name, b"hhea")?;
        let hmtx = required_table(&font, &name, b"hmtx")?;
        let loca = required_table(&font, &name, b"loca")?;
        required_table(&font, &name, b"glyf")?;

        let units_per_em = read_u16(head, 18)?;
        let bounding_box = [
            read_i16(head, 36)? as i32,
            read_i16(head, 38)? as i32,
            read_i16(head, 40)? as i32,
            read_i16(head, 42)? as i32,
        ];
        let is_short = read_i16(head, 50)? == 0;
        let ascent = read_i16(hhea, 4)? as i32;
        let descent = read_i16(hhea, 6)? as i32;
        let number_of_h_metrics = read_u16(hhea, 34)?;

        let loca = LocaOffsets::from_bytes(loca, num_glyphs, is_short)
            .map_err(|e| GenError::source_error(&name, format!("bad 'loca' table: {}", e)))?;
        let h_metrics = expand_h_metrics(hmtx, num_glyphs, number_of_h_metrics)?;

        debug!(
            "Opened {}: {} glyphs, {} units per em, bbox {:?}",
            name, num_glyphs, units_per_em, bounding_box
        );

        Ok(FontSource {
            name,
            data,
            num_glyphs,
            units_per_em,
            bounding_box,
            ascent,
            descent,
            loca,
            h_metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_glyphs(&self) -> u16 {
        self.num_glyphs
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// `[x_min, y_min, x_max, y_max]` from `head`
    pub fn bounding_box(&self) -> [i32; 4] {
        self.bounding_box
    }

    pub fn ascent(&self) -> i32 {
        self.ascent
    }

    pub fn descent(&self) -> i32 {
        self.descent
    }

    /// Raw bytes of a table
    pub fn table(&self, tag: &[u8; 4]) -> Option<&[u8]> {
        let font = FontRef::new(&self.data).ok()?;
        font.table_data(Tag::new(tag)).map(|d| d.as_bytes())
    }

    /// Glyph mapped to `code_point` by the font's cmap
    pub fn glyph_id(&self, code_point: u32) -> Option<u16> {
        let font = skrifa::FontRef::new(&self.data).ok()?;
        let gid = font.charmap().map(code_point)?;
        u16::try_from(gid.to_u32()).ok()
    }

    /// Every `(code point, glyph)` pair of the cmap
    pub fn mappings(&self) -> Vec<(u32, u16)> {
        let Ok(font) = skrifa::FontRef::new(&self.data) else {
            return Vec::new();
        };
        font.charmap()
            .mappings()
            .filter_map(|(cp, gid)| u16::try_from(gid.to_u32()).ok().map(|g| (cp, g)))
            .collect()
    }

    /// Raw `glyf` record of a glyph, empty for glyphs without outline
    pub fn glyph_data(&self, gid: u16) -> Result<&[u8], GenError> {
        let glyf = self
            .table(b"glyf")
            .ok_or_else(|| GenError::source_error(&self.name, "missing 'glyf' table"))?;
        glyf::extract_glyph_data(glyf, gid, &self.loca).ok_or_else(|| {
            GenError::format_error(format!("glyph {} is out of the 'glyf' table of {}", gid, self.name))
        })
    }

    pub fn outline(&self, gid: u16) -> Result<GlyphOutline, GenError> {
        GlyphOutline::parse(self.glyph_data(gid)?)
    }

    /// Metric of a glyph, zero when the glyph id is out of range
    pub fn h_metric(&self, gid: u16) -> HMetric {
        self.h_metrics.get(gid as usize).copied().unwrap_or_default()
    }
}

/// Expands `hmtx` to one metric per glyph
fn expand_h_metrics(
    hmtx: &[u8],
    num_glyphs: u16,
    number_of_h_metrics: u16,
) -> Result<Vec<HMetric>, GenError> {
    let long = number_of_h_metrics.min(num_glyphs) as usize;
    let mut metrics = Vec::with_capacity(num_glyphs as usize);
    for gid in 0..long {
        metrics.push(HMetric {
            advance: read_u16(hmtx, gid * 4)?,
            lsb: read_i16(hmtx, gid * 4 + 2)?,
        });
    }
    let last_advance = metrics.last().map(|m| m.advance).unwrap_or(0);
    for gid in long..num_glyphs as usize {
        let offset = long * 4 + (gid - long) * 2;
        metrics.push(HMetric {
            advance: last_advance,
            lsb: read_i16(hmtx, offset).unwrap_or(0),
        });
    }
    Ok(metrics)
}

/// Metrics every merged font is scaled to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeBaseline {
    pub bounding_box: [i32; 4],
    pub ascent: i32,
    pub descent: i32,
}

impl MergeBaseline {
    pub fn from_font(font: &FontSource) -> Self {
        MergeBaseline {
            bounding_box: font.bounding_box(),
            ascent: font.ascent(),
            descent: font.descent(),
        }
    }

    /// Isotropic scale fitting `bbox` into the baseline box
    pub fn scale_for_box(&self, bbox: [i32; 4]) -> f64 {
        let base_w = (self.bounding_box[2] - self.bounding_box[0]) as f64;
        let base_h = (self.bounding_box[3] - self.bounding_box[1]) as f64;
        let w = (bbox[2] - bbox[0]) as f64;
        let h = (bbox[3] - bbox[1]) as f64;
        if w <= 0.0 || h <= 0.0 || base_w <= 0.0 || base_h <= 0.0 {
            return 1.0;
        }
        (base_w / w).min(base_h / h)
    }

    pub fn scale_for(&self, font: &FontSource) -> f64 {
        self.scale_for_box(font.bounding_box())
    }
}
