//! `glyf` and `loca` handling
//!
//! Glyph records are decoded into [`GlyphOutline`] so they can be rescaled and have their
//! component references rewritten, then encoded again. Encoding never emits hinting
//! instructions: the instruction tables are not carried into generated fonts.

use crate::GenError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::io::Cursor;

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

/// Offsets of each glyph in the glyf table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaOffsets {
    /// `num_glyphs + 1` byte offsets
    pub offsets: Vec<u32>,
    /// 0 for short offsets (stored halved), 1 for long offsets
    pub format: u16,
}

impl LocaOffsets {
    /// Parse the loca table from raw bytes
    pub fn from_bytes(data: &[u8], num_glyphs: u16, is_short_format: bool) -> std::io::Result<Self> {
        let mut cursor = Cursor::new(data);
        let mut offsets = Vec::with_capacity(num_glyphs as usize + 1);

        for _ in 0..=num_glyphs {
            let offset = if is_short_format {
                cursor.read_u16::<BigEndian>()? as u32 * 2
            } else {
                cursor.read_u32::<BigEndian>()?
            };
            offsets.push(offset);
        }

        Ok(LocaOffsets {
            offsets,
            format: if is_short_format { 0 } else { 1 },
        })
    }

    /// Long offsets for glyph records laid out back to back
    pub fn long(offsets: Vec<u32>) -> Self {
        LocaOffsets { offsets, format: 1 }
    }

    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let width = if self.format == 0 { 2 } else { 4 };
        let mut buf = Vec::with_capacity(self.offsets.len() * width);

        for offset in &self.offsets {
            if self.format == 0 {
                buf.write_u16::<BigEndian>((offset / 2) as u16)?;
            } else {
                buf.write_u32::<BigEndian>(*offset)?;
            }
        }

        Ok(buf)
    }
}

/// Glyph record of `glyph_id`, `None` when loca points outside of `glyf_data`
pub fn extract_glyph_data<'a>(glyf_data: &'a [u8], glyph_id: u16, loca: &LocaOffsets) -> Option<&'a [u8]> {
    let start = *loca.offsets.get(glyph_id as usize)? as usize;
    let end = *loca.offsets.get(glyph_id as usize + 1)? as usize;

    if start > end || end > glyf_data.len() {
        return None;
    }

    Some(&glyf_data[start..end])
}

/// An outline point in font units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub on_curve: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleGlyph {
    /// Index of the last point of each contour
    pub end_points: Vec<u16>,
    /// Absolute coordinates
    pub points: Vec<Point>,
}

/// One component of a composite glyph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub flags: u16,
    pub glyph_id: u16,
    /// Offset when `ARGS_ARE_XY_VALUES` is set, point numbers otherwise
    pub arg1: i32,
    pub arg2: i32,
    /// Raw F2Dot14 values: none, one scale, x and y scales, or a 2x2 matrix
    pub transform: Vec<i16>,
}

impl Component {
    fn args_are_offsets(&self) -> bool {
        self.flags & ARGS_ARE_XY_VALUES != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeGlyph {
    pub bounding_box: [i32; 4],
    pub components: Vec<Component>,
}

/// A decoded glyph record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlyphOutline {
    Empty,
    Simple(SimpleGlyph),
    Composite(CompositeGlyph),
}

fn truncated(_: std::io::Error) -> GenError {
    GenError::format_error("glyph record is truncated")
}

impl GlyphOutline {
    pub fn parse(data: &[u8]) -> Result<Self, GenError> {
        if data.is_empty() {
            return Ok(GlyphOutline::Empty);
        }
        let mut cursor = Cursor::new(data);
        let contours = cursor.read_i16::<BigEndian>().map_err(truncated)?;
        let mut bbox = [0i32; 4];
        for v in bbox.iter_mut() {
            *v = cursor.read_i16::<BigEndian>().map_err(truncated)? as i32;
        }
        if contours >= 0 {
            parse_simple(&mut cursor, contours as usize)
        } else {
            parse_composite(&mut cursor, bbox)
        }
    }

    /// Scales the outline around the origin, rounding to whole units.
    ///
    /// Composite components keep their own transform; only their offsets move.
    pub fn scale(&mut self, factor: f64) {
        let s = |v: i32| (v as f64 * factor).round() as i32;
        match self {
            GlyphOutline::Empty => {}
            GlyphOutline::Simple(glyph) => {
                for p in &mut glyph.points {
                    p.x = s(p.x);
                    p.y = s(p.y);
                }
            }
            GlyphOutline::Composite(glyph) => {
                for v in glyph.bounding_box.iter_mut() {
                    *v = s(*v);
                }
                for c in &mut glyph.components {
                    if c.args_are_offsets() {
                        c.arg1 = s(c.arg1);
                        c.arg2 = s(c.arg2);
                    }
                }
            }
        }
    }

    /// Glyphs referenced by a composite
    pub fn component_ids(&self) -> Vec<u16> {
        match self {
            GlyphOutline::Composite(glyph) => glyph.components.iter().map(|c| c.glyph_id).collect(),
            _ => Vec::new(),
        }
    }

    /// Rewrites component references through `map`; unknown ids are left alone
    pub fn remap_components(&mut self, map: &HashMap<u16, u16>) {
        if let GlyphOutline::Composite(glyph) = self {
            for c in &mut glyph.components {
                if let Some(&new_id) = map.get(&c.glyph_id) {
                    c.glyph_id = new_id;
                }
            }
        }
    }

    /// `[x_min, y_min, x_max, y_max]`, `None` for an empty glyph
    pub fn bounding_box(&self) -> Option<[i32; 4]> {
        match self {
            GlyphOutline::Empty => None,
            GlyphOutline::Simple(glyph) => {
                let first = glyph.points.first()?;
                let mut bbox = [first.x, first.y, first.x, first.y];
                for p in &glyph.points[1..] {
                    bbox[0] = bbox[0].min(p.x);
                    bbox[1] = bbox[1].min(p.y);
                    bbox[2] = bbox[2].max(p.x);
                    bbox[3] = bbox[3].max(p.y);
                }
                Some(bbox)
            }
            GlyphOutline::Composite(glyph) => Some(glyph.bounding_box),
        }
    }

    /// Number of points of a simple glyph
    pub fn point_count(&self) -> usize {
        match self {
            GlyphOutline::Simple(glyph) => glyph.points.len(),
            _ => 0,
        }
    }

    pub fn contour_count(&self) -> usize {
        match self {
            GlyphOutline::Simple(glyph) => glyph.end_points.len(),
            _ => 0,
        }
    }

    /// Encodes the glyph record, unpadded
    pub fn to_bytes(&self) -> Result<Vec<u8>, GenError> {
        let mut buf = Vec::new();
        match self {
            GlyphOutline::Empty => {}
            GlyphOutline::Simple(glyph) => {
                let Some(bbox) = self.bounding_box() else {
                    return Ok(buf);
                };
                write_simple(&mut buf, glyph, bbox).map_err(|e| GenError::format_error(e.to_string()))?;
            }
            GlyphOutline::Composite(glyph) => {
                write_composite(&mut buf, glyph).map_err(|e| GenError::format_error(e.to_string()))?;
            }
        }
        Ok(buf)
    }
}

fn parse_simple(cursor: &mut Cursor<&[u8]>, contours: usize) -> Result<GlyphOutline, GenError> {
    let mut end_points = Vec::with_capacity(contours);
    for _ in 0..contours {
        end_points.push(cursor.read_u16::<BigEndian>().map_err(truncated)?);
    }
    let num_points = end_points.last().map(|&e| e as usize + 1).unwrap_or(0);
    if end_points.windows(2).any(|w| w[1] < w[0]) {
        return Err(GenError::format_error("contour end points are not increasing"));
    }

    let instruction_len = cursor.read_u16::<BigEndian>().map_err(truncated)?;
    cursor.set_position(cursor.position() + instruction_len as u64);

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = cursor.read_u8().map_err(truncated)?;
        flags.push(flag);
        if flag & REPEAT != 0 {
            let count = cursor.read_u8().map_err(truncated)?;
            for _ in 0..count {
                flags.push(flag);
            }
        }
    }
    flags.truncate(num_points);

    let xs = read_coordinates(cursor, &flags, X_SHORT, X_SAME_OR_POSITIVE)?;
    let ys = read_coordinates(cursor, &flags, Y_SHORT, Y_SAME_OR_POSITIVE)?;

    let points = flags
        .iter()
        .zip(xs.into_iter().zip(ys))
        .map(|(flag, (x, y))| Point {
            x,
            y,
            on_curve: flag & ON_CURVE != 0,
        })
        .collect();

    Ok(GlyphOutline::Simple(SimpleGlyph { end_points, points }))
}

/// Decodes one delta-encoded coordinate array into absolute values
fn read_coordinates(
    cursor: &mut Cursor<&[u8]>,
    flags: &[u8],
    short: u8,
    same_or_positive: u8,
) -> Result<Vec<i32>, GenError> {
    let mut values = Vec::with_capacity(flags.len());
    let mut current = 0i32;
    for flag in flags {
        let delta = if flag & short != 0 {
            let v = cursor.read_u8().map_err(truncated)? as i32;
            if flag & same_or_positive != 0 {
                v
            } else {
                -v
            }
        } else if flag & same_or_positive != 0 {
            0
        } else {
            cursor.read_i16::<BigEndian>().map_err(truncated)? as i32
        };
        current += delta;
        values.push(current);
    }
    Ok(values)
}

fn parse_composite(cursor: &mut Cursor<&[u8]>, bounding_box: [i32; 4]) -> Result<GlyphOutline, GenError> {
    let mut components = Vec::new();
    loop {
        let flags = cursor.read_u16::<BigEndian>().map_err(truncated)?;
        let glyph_id = cursor.read_u16::<BigEndian>().map_err(truncated)?;
        let signed = flags & ARGS_ARE_XY_VALUES != 0;
        let (arg1, arg2) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            if signed {
                (
                    cursor.read_i16::<BigEndian>().map_err(truncated)? as i32,
                    cursor.read_i16::<BigEndian>().map_err(truncated)? as i32,
                )
            } else {
                (
                    cursor.read_u16::<BigEndian>().map_err(truncated)? as i32,
                    cursor.read_u16::<BigEndian>().map_err(truncated)? as i32,
                )
            }
        } else if signed {
            (
                cursor.read_i8().map_err(truncated)? as i32,
                cursor.read_i8().map_err(truncated)? as i32,
            )
        } else {
            (
                cursor.read_u8().map_err(truncated)? as i32,
                cursor.read_u8().map_err(truncated)? as i32,
            )
        };

        let transform_len = if flags & WE_HAVE_A_SCALE != 0 {
            1
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            2
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            4
        } else {
            0
        };
        let mut transform = Vec::with_capacity(transform_len);
        for _ in 0..transform_len {
            transform.push(cursor.read_i16::<BigEndian>().map_err(truncated)?);
        }

        components.push(Component {
            flags,
            glyph_id,
            arg1,
            arg2,
            transform,
        });

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(GlyphOutline::Composite(CompositeGlyph {
        bounding_box,
        components,
    }))
}

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn write_bbox(buf: &mut Vec<u8>, bbox: [i32; 4]) -> std::io::Result<()> {
    for v in bbox {
        buf.write_i16::<BigEndian>(clamp_i16(v))?;
    }
    Ok(())
}

fn write_simple(buf: &mut Vec<u8>, glyph: &SimpleGlyph, bbox: [i32; 4]) -> std::io::Result<()> {
    buf.write_i16::<BigEndian>(glyph.end_points.len() as i16)?;
    write_bbox(buf, bbox)?;
    for end in &glyph.end_points {
        buf.write_u16::<BigEndian>(*end)?;
    }
    buf.write_u16::<BigEndian>(0)?;

    let mut flags = Vec::with_capacity(glyph.points.len());
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let (mut last_x, mut last_y) = (0i32, 0i32);
    for p in &glyph.points {
        let mut flag = if p.on_curve { ON_CURVE } else { 0 };
        flag |= encode_delta(&mut xs, p.x - last_x, X_SHORT, X_SAME_OR_POSITIVE)?;
        flag |= encode_delta(&mut ys, p.y - last_y, Y_SHORT, Y_SAME_OR_POSITIVE)?;
        flags.push(flag);
        last_x = p.x;
        last_y = p.y;
    }
    buf.extend_from_slice(&flags);
    buf.extend_from_slice(&xs);
    buf.extend_from_slice(&ys);
    Ok(())
}

/// Appends the coordinate bytes for `delta` and returns its flag bits
fn encode_delta(out: &mut Vec<u8>, delta: i32, short: u8, same_or_positive: u8) -> std::io::Result<u8> {
    if delta == 0 {
        Ok(same_or_positive)
    } else if delta.abs() <= 255 {
        out.push(delta.unsigned_abs() as u8);
        Ok(short | if delta > 0 { same_or_positive } else { 0 })
    } else {
        out.write_i16::<BigEndian>(clamp_i16(delta))?;
        Ok(0)
    }
}

fn write_composite(buf: &mut Vec<u8>, glyph: &CompositeGlyph) -> std::io::Result<()> {
    buf.write_i16::<BigEndian>(-1)?;
    write_bbox(buf, glyph.bounding_box)?;
    let last = glyph.components.len().saturating_sub(1);
    for (i, c) in glyph.components.iter().enumerate() {
        let mut flags = (c.flags | ARG_1_AND_2_ARE_WORDS) & !(WE_HAVE_INSTRUCTIONS | MORE_COMPONENTS);
        if i < last {
            flags |= MORE_COMPONENTS;
        }
        buf.write_u16::<BigEndian>(flags)?;
        buf.write_u16::<BigEndian>(c.glyph_id)?;
        if c.args_are_offsets() {
            buf.write_i16::<BigEndian>(clamp_i16(c.arg1))?;
            buf.write_i16::<BigEndian>(clamp_i16(c.arg2))?;
        } else {
            buf.write_u16::<BigEndian>(c.arg1.clamp(0, u16::MAX as i32) as u16)?;
            buf.write_u16::<BigEndian>(c.arg2.clamp(0, u16::MAX as i32) as u16)?;
        }
        for v in &c.transform {
            buf.write_i16::<BigEndian>(*v)?;
        }
    }
    Ok(())
}

/// `roots` plus every glyph they reach through composite references
pub fn component_closure(
    roots: impl IntoIterator<Item = u16>,
    outline: impl Fn(u16) -> Result<GlyphOutline, GenError>,
) -> Result<BTreeSet<u16>, GenError> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<u16> = VecDeque::new();
    for gid in roots {
        if seen.insert(gid) {
            queue.push_back(gid);
        }
    }
    while let Some(gid) = queue.pop_front() {
        for child in outline(gid)?.component_ids() {
            if seen.insert(child) {
                queue.push_back(child);
            }
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_bytes() -> Vec<u8> {
        vec![
            0x00, 0x01, // one contour
            0x00, 0x00, 0x00, 0x00, 0x00, 0x64, 0x00, 0x64, // bbox
            0x00, 0x02, // end point
            0x00, 0x01, 0xAA, // one instruction byte
            0x31, 0x33, 0x27, // flags
            0x64, 0x32, // x
            0x64, // y
        ]
    }

    #[test]
    fn test_parse_simple_glyph() {
        let outline = GlyphOutline::parse(&triangle_bytes()).unwrap();
        let GlyphOutline::Simple(glyph) = &outline else {
            panic!("expected a simple glyph");
        };
        assert_eq!(glyph.end_points, vec![2]);
        let coords: Vec<(i32, i32)> = glyph.points.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(0, 0), (100, 0), (50, 100)]);
        assert!(glyph.points.iter().all(|p| p.on_curve));
        assert_eq!(outline.bounding_box(), Some([0, 0, 100, 100]));
    }

    #[test]
    fn test_repeat_flag() {
        let bytes = vec![
            0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, // header
            0x00, 0x02, // three points
            0x00, 0x00, // no instructions
            0x39, 0x02, // on curve, same x, same y, repeated twice
        ];
        let outline = GlyphOutline::parse(&bytes).unwrap();
        assert_eq!(outline.point_count(), 3);
    }

    #[test]
    fn test_encode_drops_instructions_and_keeps_points() {
        let outline = GlyphOutline::parse(&triangle_bytes()).unwrap();
        let bytes = outline.to_bytes().unwrap();
        assert_eq!(&bytes[12..14], &[0x00, 0x00]);
        assert_eq!(GlyphOutline::parse(&bytes).unwrap(), outline);
    }

    #[test]
    fn test_long_deltas() {
        let glyph = GlyphOutline::Simple(SimpleGlyph {
            end_points: vec![1],
            points: vec![
                Point { x: -1000, y: 0, on_curve: true },
                Point { x: 1000, y: -700, on_curve: false },
            ],
        });
        let parsed = GlyphOutline::parse(&glyph.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, glyph);
        assert_eq!(parsed.bounding_box(), Some([-1000, -700, 1000, 0]));
    }

    #[test]
    fn test_scale_rounds() {
        let mut outline = GlyphOutline::parse(&triangle_bytes()).unwrap();
        outline.scale(0.25);
        assert_eq!(outline.bounding_box(), Some([0, 0, 25, 25]));
        let GlyphOutline::Simple(glyph) = outline else {
            panic!("expected a simple glyph");
        };
        assert_eq!((glyph.points[2].x, glyph.points[2].y), (13, 25));
    }

    fn composite_bytes() -> Vec<u8> {
        vec![
            0xFF, 0xFF, // composite
            0x00, 0x00, 0x00, 0x00, 0x00, 0xC8, 0x00, 0x64, // bbox
            0x00, 0x22, 0x00, 0x03, 0x0A, 0xF6, // xy byte args, more components, glyph 3
            0x01, 0x03, 0x00, 0x05, 0x00, 0x64, 0x00, 0x00, // xy word args, instructions, glyph 5
            0x00, 0x01, 0x02, // instructions
        ]
    }

    #[test]
    fn test_parse_composite() {
        let outline = GlyphOutline::parse(&composite_bytes()).unwrap();
        assert_eq!(outline.component_ids(), vec![3, 5]);
        let GlyphOutline::Composite(glyph) = &outline else {
            panic!("expected a composite glyph");
        };
        assert_eq!((glyph.components[0].arg1, glyph.components[0].arg2), (10, -10));
        assert_eq!(glyph.components[1].arg1, 100);
    }

    #[test]
    fn test_composite_remap_scale_and_write() {
        let mut outline = GlyphOutline::parse(&composite_bytes()).unwrap();
        outline.remap_components(&HashMap::from([(3, 1), (5, 2)]));
        outline.scale(0.5);
        let bytes = outline.to_bytes().unwrap();
        let parsed = GlyphOutline::parse(&bytes).unwrap();
        assert_eq!(parsed.component_ids(), vec![1, 2]);
        assert_eq!(parsed.bounding_box(), Some([0, 0, 100, 50]));
        let GlyphOutline::Composite(glyph) = parsed else {
            panic!("expected a composite glyph");
        };
        assert_eq!((glyph.components[0].arg1, glyph.components[0].arg2), (5, -5));
        assert_eq!(glyph.components[1].flags & WE_HAVE_INSTRUCTIONS, 0);
        assert_eq!(glyph.components[1].flags & MORE_COMPONENTS, 0);
        assert_ne!(glyph.components[0].flags & MORE_COMPONENTS, 0);
    }

    #[test]
    fn test_loca_short_and_long() {
        let short = [0x00, 0x00, 0x00, 0x05, 0x00, 0x05];
        let loca = LocaOffsets::from_bytes(&short, 2, true).unwrap();
        assert_eq!(loca.offsets, vec![0, 10, 10]);
        assert_eq!(loca.to_bytes().unwrap(), short.to_vec());

        let long = LocaOffsets::long(vec![0, 12, 12]);
        assert_eq!(long.to_bytes().unwrap().len(), 12);
        assert!(LocaOffsets::from_bytes(&short, 3, true).is_err());
    }

    #[test]
    fn test_extract_glyph_data_bounds() {
        let glyf = [1u8, 2, 3, 4];
        let loca = LocaOffsets::long(vec![0, 2, 2, 8]);
        assert_eq!(extract_glyph_data(&glyf, 0, &loca), Some(&glyf[0..2]));
        assert_eq!(extract_glyph_data(&glyf, 1, &loca), Some(&glyf[2..2]));
        assert_eq!(extract_glyph_data(&glyf, 2, &loca), None);
        assert_eq!(extract_glyph_data(&glyf, 7, &loca), None);
    }

    #[test]
    fn test_component_closure_follows_nested_references() {
        let outlines: HashMap<u16, Vec<u16>> =
            HashMap::from([(1, vec![]), (2, vec![3]), (3, vec![4, 1]), (4, vec![])]);
        let closure = component_closure([2], |gid| {
            let children = outlines.get(&gid).cloned().unwrap_or_default();
            Ok(if children.is_empty() {
                GlyphOutline::Empty
            } else {
                GlyphOutline::Composite(CompositeGlyph {
                    bounding_box: [0; 4],
                    components: children
                        .into_iter()
                        .map(|glyph_id| Component {
                            flags: ARGS_ARE_XY_VALUES,
                            glyph_id,
                            arg1: 0,
                            arg2: 0,
                            transform: Vec::new(),
                        })
                        .collect(),
                })
            })
        })
        .unwrap();
        assert_eq!(closure.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }
}
