/// Build and serialize a cmap (character map) table
///
/// Generated fonts only map code points of the Basic Multilingual Plane, so a single format 4
/// subtable is written and shared by a Unicode (0/3) and a Windows (3/1) encoding record.
use byteorder::{BigEndian, WriteBytesExt};
use log::debug;
use std::collections::BTreeMap;

/// Highest code point a format 4 subtable can map, `0xFFFF` closes the last segment
pub const LAST_MAPPABLE_CODE_POINT: u32 = 0xFFFE;

/// Build a cmap table from code point to glyph id mappings.
///
/// Code points above [`LAST_MAPPABLE_CODE_POINT`] are ignored.
pub fn build_cmap_table(codepoint_to_glyph_id: &BTreeMap<u32, u16>) -> std::io::Result<Vec<u8>> {
    let subtable = build_cmap_format4(codepoint_to_glyph_id)?;

    let mut cmap_data = Vec::with_capacity(20 + subtable.len());
    cmap_data.write_u16::<BigEndian>(0)?; // version
    cmap_data.write_u16::<BigEndian>(2)?; // numTables
    let offset = 4 + 2 * 8;
    for (platform, encoding) in [(0u16, 3u16), (3, 1)] {
        cmap_data.write_u16::<BigEndian>(platform)?;
        cmap_data.write_u16::<BigEndian>(encoding)?;
        cmap_data.write_u32::<BigEndian>(offset)?;
    }
    cmap_data.extend_from_slice(&subtable);

    debug!(
        "Built cmap table: {} mappings, {} bytes",
        codepoint_to_glyph_id.len(),
        cmap_data.len()
    );
    Ok(cmap_data)
}

/// A run of consecutive code points mapped to consecutive glyph ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    start: u16,
    end: u16,
    start_gid: u16,
}

fn segments(codepoint_to_glyph_id: &BTreeMap<u32, u16>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for (&cp, &gid) in codepoint_to_glyph_id.range(..=LAST_MAPPABLE_CODE_POINT) {
        let cp = cp as u16;
        if let Some(last) = segments.last_mut() {
            let run = cp - last.start;
            if cp == last.end + 1 && last.start_gid.wrapping_add(run) == gid {
                last.end = cp;
                continue;
            }
        }
        segments.push(Segment {
            start: cp,
            end: cp,
            start_gid: gid,
        });
    }
    // end-of-table marker
    segments.push(Segment {
        start: 0xFFFF,
        end: 0xFFFF,
        start_gid: 0,
    });
    segments
}

/// Build cmap format 4 subtable (BMP: 0x0000-0xFFFE)
fn build_cmap_format4(codepoint_to_glyph_id: &BTreeMap<u32, u16>) -> std::io::Result<Vec<u8>> {
    let segments = segments(codepoint_to_glyph_id);
    let seg_count = segments.len() as u16;

    let mut power = 1u16;
    while power * 2 <= seg_count {
        power <<= 1;
    }
    let search_range = power * 2;
    let entry_selector = power.trailing_zeros() as u16;
    let range_shift = seg_count * 2 - search_range;

    let mut data = Vec::new();
    data.write_u16::<BigEndian>(4)?; // format
    data.write_u16::<BigEndian>(16 + seg_count * 8)?; // length
    data.write_u16::<BigEndian>(0)?; // language
    data.write_u16::<BigEndian>(seg_count * 2)?;
    data.write_u16::<BigEndian>(search_range)?;
    data.write_u16::<BigEndian>(entry_selector)?;
    data.write_u16::<BigEndian>(range_shift)?;

    for s in &segments {
        data.write_u16::<BigEndian>(s.end)?;
    }
    data.write_u16::<BigEndian>(0)?; // reservedPad
    for s in &segments {
        data.write_u16::<BigEndian>(s.start)?;
    }
    for s in &segments {
        // glyph = (cp + delta) mod 65536; the marker maps 0xFFFF to glyph 0
        let delta = if s.start == 0xFFFF {
            1
        } else {
            s.start_gid.wrapping_sub(s.start)
        };
        data.write_u16::<BigEndian>(delta)?;
    }
    for _ in &segments {
        data.write_u16::<BigEndian>(0)?; // idRangeOffset
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ByteOrder;

    /// Format 4 lookup as a font reader performs it
    fn lookup(cmap: &[u8], cp: u16) -> u16 {
        let sub = &cmap[BigEndian::read_u32(&cmap[8..12]) as usize..];
        let seg_x2 = BigEndian::read_u16(&sub[6..8]) as usize;
        let ends = 14;
        let starts = ends + seg_x2 + 2;
        let deltas = starts + seg_x2;
        for i in 0..seg_x2 / 2 {
            let end = BigEndian::read_u16(&sub[ends + i * 2..]);
            if cp <= end {
                let start = BigEndian::read_u16(&sub[starts + i * 2..]);
                if cp < start {
                    return 0;
                }
                return cp.wrapping_add(BigEndian::read_u16(&sub[deltas + i * 2..]));
            }
        }
        0
    }

    #[test]
    fn test_header_and_records() {
        let map = BTreeMap::from([(0xE000, 1u16)]);
        let cmap = build_cmap_table(&map).unwrap();
        assert_eq!(BigEndian::read_u16(&cmap[2..4]), 2);
        assert_eq!(&cmap[4..8], &[0, 0, 0, 3]);
        assert_eq!(&cmap[12..16], &[0, 3, 0, 1]);
        assert_eq!(BigEndian::read_u32(&cmap[8..12]), 20);
        assert_eq!(BigEndian::read_u32(&cmap[16..20]), 20);

        let sub = &cmap[20..];
        assert_eq!(BigEndian::read_u16(&sub[0..2]), 4);
        // two segments: the glyph and the marker
        assert_eq!(BigEndian::read_u16(&sub[2..4]) as usize, sub.len());
        assert_eq!(sub.len(), 16 + 2 * 8);
        assert_eq!(BigEndian::read_u16(&sub[6..8]), 4); // segCountX2
        assert_eq!(BigEndian::read_u16(&sub[8..10]), 4); // searchRange
        assert_eq!(BigEndian::read_u16(&sub[10..12]), 1); // entrySelector
        assert_eq!(BigEndian::read_u16(&sub[12..14]), 0); // rangeShift
    }

    #[test]
    fn test_lookup_with_wrapping_deltas() {
        let map = BTreeMap::from([(0x41, 5u16), (0x42, 6), (0x43, 2), (0xF000, 1), (0xF001, 3)]);
        let segs = segments(&map);
        assert_eq!(segs.len(), 5);
        let cmap = build_cmap_table(&map).unwrap();
        for (&cp, &gid) in &map {
            assert_eq!(lookup(&cmap, cp as u16), gid, "code point {:#x}", cp);
        }
        assert_eq!(lookup(&cmap, 0x44), 0);
        assert_eq!(lookup(&cmap, 0xFFFF), 0);
    }

    #[test]
    fn test_last_mappable_code_point() {
        let map = BTreeMap::from([(0xFFFE, 3u16), (0xFFFF, 4)]);
        let cmap = build_cmap_table(&map).unwrap();
        assert_eq!(lookup(&cmap, 0xFFFE), 3);
        assert_eq!(lookup(&cmap, 0xFFFF), 0);
    }

    #[test]
    fn test_empty_map_has_marker_only() {
        let cmap = build_cmap_table(&BTreeMap::new()).unwrap();
        let sub = &cmap[20..];
        assert_eq!(BigEndian::read_u16(&sub[6..8]), 2);
        assert_eq!(sub.len(), 24);
    }

    #[test]
    fn test_search_parameters_for_many_segments() {
        let map: BTreeMap<u32, u16> = (0..5u32).map(|i| (0x100 + i * 2, i as u16 + 1)).collect();
        let cmap = build_cmap_table(&map).unwrap();
        let sub = &cmap[20..];
        // five glyph segments plus the marker
        assert_eq!(BigEndian::read_u16(&sub[6..8]), 12);
        assert_eq!(BigEndian::read_u16(&sub[8..10]), 8);
        assert_eq!(BigEndian::read_u16(&sub[10..12]), 2);
        assert_eq!(BigEndian::read_u16(&sub[12..14]), 4);
    }
}
