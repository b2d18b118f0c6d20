/// Assemble subset and merged fonts
///
/// Glyphs are taken from one or more [`FontSource`], optionally rescaled to a
/// [`MergeBaseline`], and written into a new font holding only the tables needed to render
/// them: `glyf`, `loca`, `maxp`, `cmap`, `hmtx`, `hhea`, `head`, `post`, plus `name` and `OS/2`
/// copied from the template font.
use super::glyf::{self, GlyphOutline, LocaOffsets};
use super::{cmap_builder, post_table_builder, read_u16, write_i16, write_u16, FontSource, HMetric, MergeBaseline};
use crate::remap::{GlyphRemapEntry, GlyphRemapTable};
use crate::GenError;
use byteorder::{BigEndian, ByteOrder};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use write_fonts::{types::Tag, FontBuilder};

/// One font and the glyphs selected from it
#[derive(Debug, Clone, Copy)]
pub struct SubsetPart<'a> {
    pub source: &'a FontSource,
    pub table: &'a GlyphRemapTable,
}

/// Knobs of [`build_font`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Scale every part to these metrics
    pub baseline: Option<MergeBaseline>,
    /// Part whose `head`, `hhea`, `maxp`, `name`, `OS/2` and `post` header are reused
    pub template: usize,
    /// Write a version 2 `post` table with the new glyph names
    pub export_names: bool,
}

/// A glyph of the output font
struct OutputGlyph {
    part: usize,
    old_gid: u16,
    name: Option<String>,
}

/// Running statistics over the written glyphs
#[derive(Default)]
struct OutlineStats {
    bounding_box: Option<[i32; 4]>,
    max_points: u16,
    max_contours: u16,
    min_lsb: Option<i32>,
    min_rsb: Option<i32>,
    max_extent: Option<i32>,
}

impl OutlineStats {
    fn add(&mut self, outline: &GlyphOutline, metric: HMetric) {
        self.max_points = self.max_points.max(outline.point_count() as u16);
        self.max_contours = self.max_contours.max(outline.contour_count() as u16);
        let Some(bbox) = outline.bounding_box() else {
            return;
        };
        self.bounding_box = Some(match self.bounding_box {
            Some(b) => [b[0].min(bbox[0]), b[1].min(bbox[1]), b[2].max(bbox[2]), b[3].max(bbox[3])],
            None => bbox,
        });
        let lsb = metric.lsb as i32;
        let width = bbox[2] - bbox[0];
        let rsb = metric.advance as i32 - lsb - width;
        let extent = lsb + width;
        self.min_lsb = Some(self.min_lsb.map_or(lsb, |v| v.min(lsb)));
        self.min_rsb = Some(self.min_rsb.map_or(rsb, |v| v.min(rsb)));
        self.max_extent = Some(self.max_extent.map_or(extent, |v| v.max(extent)));
    }
}

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Glyph order of the output: `.notdef` of the template, then per part the selected glyphs
/// and their components in old glyph id order.
fn collect_glyphs(parts: &[SubsetPart], template: usize) -> Result<(Vec<OutputGlyph>, BTreeMap<u32, u16>), GenError> {
    let mut glyphs = vec![OutputGlyph {
        part: template,
        old_gid: 0,
        name: Some(".notdef".to_string()),
    }];
    let mut new_ids: HashMap<(usize, u16), u16> = HashMap::from([((template, 0), 0)]);
    let mut cmap = BTreeMap::new();

    for (index, part) in parts.iter().enumerate() {
        if part.table.is_empty() {
            return Err(GenError::EmptySelection {
                font: part.source.name().to_string(),
                suggestion: "Select at least one glyph or disable this font".to_string(),
            });
        }
        let mut roots: Vec<(u16, &GlyphRemapEntry)> = Vec::new();
        for entry in part.table.iter() {
            if entry.new_code_point > cmap_builder::LAST_MAPPABLE_CODE_POINT {
                return Err(GenError::config_error(
                    format!(
                        "{}: glyph {} cannot be mapped to U+{:04X}",
                        part.source.name(),
                        entry.new_name,
                        entry.new_code_point
                    ),
                    "U+FFFF ends the character map, renumber the glyph to U+FFFE or below",
                ));
            }
            let gid = part.source.glyph_id(entry.original_code_point).ok_or_else(|| {
                GenError::source_error(
                    part.source.name(),
                    format!("code point U+{:04X} is not mapped by the font", entry.original_code_point),
                )
            })?;
            roots.push((gid, entry));
        }

        let closure = glyf::component_closure(roots.iter().map(|(gid, _)| *gid), |gid| part.source.outline(gid))?;
        let mut names: HashMap<u16, &str> = HashMap::new();
        for (gid, entry) in &roots {
            names.entry(*gid).or_insert(entry.new_name.as_str());
        }
        for old_gid in closure {
            if new_ids.contains_key(&(index, old_gid)) {
                continue;
            }
            let new_gid = u16::try_from(glyphs.len())
                .map_err(|_| GenError::format_error("too many glyphs for one font"))?;
            new_ids.insert((index, old_gid), new_gid);
            glyphs.push(OutputGlyph {
                part: index,
                old_gid,
                name: names.get(&old_gid).map(|n| n.to_string()),
            });
        }
        for (gid, entry) in &roots {
            if let Some(&new_gid) = new_ids.get(&(index, *gid)) {
                cmap.insert(entry.new_code_point, new_gid);
            }
        }
    }
    Ok((glyphs, cmap))
}

/// Builds a font from the selected glyphs of `parts`
pub fn build_font(parts: &[SubsetPart], options: &BuildOptions) -> Result<Vec<u8>, GenError> {
    let template = parts.get(options.template).ok_or_else(|| GenError::EmptySelection {
        font: String::new(),
        suggestion: "Add at least one font with selected glyphs".to_string(),
    })?;
    let template_font = template.source;
    let (glyphs, cmap) = collect_glyphs(parts, options.template)?;

    info!(
        "Building font from {} part(s): {} glyphs, {} code points",
        parts.len(),
        glyphs.len(),
        cmap.len()
    );

    let scales: Vec<f64> = parts
        .iter()
        .map(|p| options.baseline.map_or(1.0, |b| b.scale_for(p.source)))
        .collect();
    for (part, scale) in parts.iter().zip(&scales) {
        debug!("Scale for {}: {}", part.source.name(), scale);
    }

    // old -> new glyph ids, per part
    let mut remaps: Vec<HashMap<u16, u16>> = vec![HashMap::new(); parts.len()];
    for (new_gid, g) in glyphs.iter().enumerate() {
        remaps[g.part].insert(g.old_gid, new_gid as u16);
    }

    let mut glyf_data = Vec::new();
    let mut offsets = vec![0u32];
    let mut metrics = Vec::with_capacity(glyphs.len());
    let mut stats = OutlineStats::default();
    for g in &glyphs {
        let source = parts[g.part].source;
        let scale = scales[g.part];
        let mut outline = source.outline(g.old_gid)?;
        if scale != 1.0 {
            outline.scale(scale);
        }
        outline.remap_components(&remaps[g.part]);

        let original = source.h_metric(g.old_gid);
        let metric = HMetric {
            advance: (original.advance as f64 * scale).floor().clamp(0.0, u16::MAX as f64) as u16,
            lsb: clamp_i16((original.lsb as f64 * scale).floor() as i32),
        };
        stats.add(&outline, metric);
        metrics.push(metric);

        glyf_data.extend_from_slice(&outline.to_bytes()?);
        while glyf_data.len() % 4 != 0 {
            glyf_data.push(0);
        }
        offsets.push(glyf_data.len() as u32);
    }
    let loca = LocaOffsets::long(offsets)
        .to_bytes()
        .map_err(|e| GenError::format_error(e.to_string()))?;

    let (hmtx, number_of_h_metrics, advance_width_max) = build_hmtx(&metrics);
    let head = build_head(template_font, options.baseline.as_ref(), &stats)?;
    let hhea = build_hhea(
        template_font,
        options.baseline.as_ref(),
        &stats,
        number_of_h_metrics,
        advance_width_max,
    )?;
    let maxp = build_maxp(parts, template_font, glyphs.len() as u16, &stats)?;
    let cmap_table = cmap_builder::build_cmap_table(&cmap).map_err(|e| GenError::format_error(e.to_string()))?;
    let post = if options.export_names {
        let names: Vec<String> = glyphs
            .iter()
            .enumerate()
            .map(|(i, g)| g.name.clone().unwrap_or_else(|| format!("glyph{}", i)))
            .collect();
        post_table_builder::build_post_v2(template_font.table(b"post"), &names)
    } else {
        post_table_builder::build_post_v3(template_font.table(b"post"))
    }
    .map_err(|e| GenError::format_error(e.to_string()))?;

    let mut builder = FontBuilder::new();
    builder.add_raw(Tag::new(b"head"), head);
    builder.add_raw(Tag::new(b"hhea"), hhea);
    builder.add_raw(Tag::new(b"maxp"), maxp);
    builder.add_raw(Tag::new(b"cmap"), cmap_table);
    builder.add_raw(Tag::new(b"hmtx"), hmtx);
    builder.add_raw(Tag::new(b"loca"), loca);
    builder.add_raw(Tag::new(b"glyf"), glyf_data);
    builder.add_raw(Tag::new(b"post"), post);
    if let Some(name) = template_font.table(b"name") {
        builder.add_raw(Tag::new(b"name"), name.to_vec());
    }
    if let Some(os2) = template_font.table(b"OS/2") {
        builder.add_raw(Tag::new(b"OS/2"), build_os2(os2, &cmap));
    }

    let mut font = builder.build();
    fix_checksum_adjustment(&mut font);
    debug!("Assembled font: {} bytes", font.len());
    Ok(font)
}

/// Long metrics up to the last advance change, then bare side bearings
fn build_hmtx(metrics: &[HMetric]) -> (Vec<u8>, u16, u16) {
    let last_advance = metrics.last().map(|m| m.advance).unwrap_or(0);
    let mut long = metrics.len();
    while long > 1 && metrics[long - 2].advance == last_advance {
        long -= 1;
    }
    let mut data = vec![0u8; long * 4 + (metrics.len() - long) * 2];
    let mut advance_width_max = 0;
    for (i, m) in metrics.iter().enumerate() {
        if i < long {
            advance_width_max = advance_width_max.max(m.advance);
            write_u16(&mut data, i * 4, m.advance);
            write_i16(&mut data, i * 4 + 2, m.lsb);
        } else {
            write_i16(&mut data, long * 4 + (i - long) * 2, m.lsb);
        }
    }
    (data, long as u16, advance_width_max)
}

fn template_table(font: &FontSource, tag: &[u8; 4]) -> Result<Vec<u8>, GenError> {
    font.table(tag).map(|t| t.to_vec()).ok_or_else(|| {
        GenError::source_error(
            font.name(),
            format!("missing '{}' table", String::from_utf8_lossy(tag)),
        )
    })
}

fn build_head(font: &FontSource, baseline: Option<&MergeBaseline>, stats: &OutlineStats) -> Result<Vec<u8>, GenError> {
    let mut head = template_table(font, b"head")?;
    if head.len() < 54 {
        return Err(GenError::source_error(font.name(), "'head' table is truncated"));
    }
    BigEndian::write_u32(&mut head[8..12], 0);
    let bbox = baseline
        .map(|b| b.bounding_box)
        .or(stats.bounding_box)
        .unwrap_or_else(|| font.bounding_box());
    for (i, v) in bbox.iter().enumerate() {
        write_i16(&mut head, 36 + i * 2, clamp_i16(*v));
    }
    write_i16(&mut head, 50, 1);
    Ok(head)
}

fn build_hhea(
    font: &FontSource,
    baseline: Option<&MergeBaseline>,
    stats: &OutlineStats,
    number_of_h_metrics: u16,
    advance_width_max: u16,
) -> Result<Vec<u8>, GenError> {
    let mut hhea = template_table(font, b"hhea")?;
    if hhea.len() < 36 {
        return Err(GenError::source_error(font.name(), "'hhea' table is truncated"));
    }
    if let Some(b) = baseline {
        write_i16(&mut hhea, 4, clamp_i16(b.ascent));
        write_i16(&mut hhea, 6, clamp_i16(b.descent));
    }
    write_u16(&mut hhea, 10, advance_width_max);
    write_i16(&mut hhea, 12, clamp_i16(stats.min_lsb.unwrap_or(0)));
    write_i16(&mut hhea, 14, clamp_i16(stats.min_rsb.unwrap_or(0)));
    write_i16(&mut hhea, 16, clamp_i16(stats.max_extent.unwrap_or(0)));
    write_u16(&mut hhea, 34, number_of_h_metrics);
    Ok(hhea)
}

/// Version 1.0 `maxp` gets point and contour maxima from the written glyphs and composite
/// limits from the largest source. Instructions are not carried, so their size is zero.
fn build_maxp(parts: &[SubsetPart], font: &FontSource, num_glyphs: u16, stats: &OutlineStats) -> Result<Vec<u8>, GenError> {
    let mut maxp = template_table(font, b"maxp")?;
    if maxp.len() < 6 {
        return Err(GenError::source_error(font.name(), "'maxp' table is truncated"));
    }
    write_u16(&mut maxp, 4, num_glyphs);
    if maxp.len() >= 32 {
        write_u16(&mut maxp, 6, stats.max_points);
        write_u16(&mut maxp, 8, stats.max_contours);
        for offset in [10, 12, 28, 30] {
            let mut value = 0;
            for part in parts {
                if let Some(v) = part.source.table(b"maxp").and_then(|t| read_u16(t, offset).ok()) {
                    value = value.max(v);
                }
            }
            write_u16(&mut maxp, offset, value);
        }
        write_u16(&mut maxp, 26, 0);
    }
    Ok(maxp)
}

/// Template `OS/2` with the character range of the new cmap
fn build_os2(os2: &[u8], cmap: &BTreeMap<u32, u16>) -> Vec<u8> {
    let mut os2 = os2.to_vec();
    if let (Some(first), Some(last)) = (cmap.keys().next(), cmap.keys().next_back()) {
        write_u16(&mut os2, 64, (*first).min(0xFFFF) as u16);
        write_u16(&mut os2, 66, (*last).min(0xFFFF) as u16);
    }
    os2
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Sets `head.checkSumAdjustment` so the whole file sums to `0xB1B0AFBA`
fn fix_checksum_adjustment(font: &mut [u8]) {
    let Ok(num_tables) = read_u16(font, 4) else {
        return;
    };
    let head_offset = (0..num_tables as usize)
        .map(|i| 12 + i * 16)
        .find(|&record| font.get(record..record + 4) == Some(b"head".as_slice()))
        .and_then(|record| font.get(record + 8..record + 12))
        .map(|offset| BigEndian::read_u32(offset) as usize);
    let Some(head_offset) = head_offset else {
        return;
    };
    let Some(slot) = font.get_mut(head_offset + 8..head_offset + 12) else {
        return;
    };
    slot.copy_from_slice(&[0; 4]);
    let adjustment = 0xB1B0_AFBAu32.wrapping_sub(checksum(font));
    BigEndian::write_u32(&mut font[head_offset + 8..head_offset + 12], adjustment);
}

/// Subset of one font, as bytes
pub fn build_subset_bytes(source: &FontSource, table: &GlyphRemapTable, export_names: bool) -> Result<Vec<u8>, GenError> {
    build_font(
        &[SubsetPart { source, table }],
        &BuildOptions {
            baseline: None,
            template: 0,
            export_names,
        },
    )
}

/// Writes the subset of the font at `source_path` to `out_path`
pub fn build_subset(
    source_path: &Path,
    table: &GlyphRemapTable,
    export_names: bool,
    out_path: &Path,
) -> Result<(), GenError> {
    let source = FontSource::open(source_path)?;
    let bytes = build_subset_bytes(&source, table, export_names)?;
    crate::write_output(out_path, &bytes)?;
    info!("Font written to {}", out_path.display());
    Ok(())
}

/// Merges the selections of several fonts into one font, as bytes
pub fn build_merged_bytes(parts: &[SubsetPart], options: &BuildOptions) -> Result<Vec<u8>, GenError> {
    build_font(parts, options)
}

/// Merges the selections of several fonts and writes the result to `out_path`
pub fn build_merged(parts: &[SubsetPart], options: &BuildOptions, out_path: &Path) -> Result<(), GenError> {
    let bytes = build_merged_bytes(parts, options)?;
    crate::write_output(out_path, &bytes)?;
    info!("Merged font written to {}", out_path.display());
    Ok(())
}
