//! Small TrueType fonts built in memory for the integration tests.
#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};
use iconfontgen::sfnt::cmap_builder::build_cmap_table;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use write_fonts::{types::Tag, FontBuilder};

/// One glyph of a test font
#[derive(Debug, Clone, Copy)]
pub enum TestGlyph {
    /// Square from (0, 0) to (size, size)
    Square { code_point: u32, size: i16 },
    /// Reference to another glyph, shifted by `dx`
    Composite { code_point: u32, component: u16, dx: i16 },
}

/// Layout of a test font. Glyph 0 is an empty `.notdef`, `glyphs` follow in order.
#[derive(Debug, Clone)]
pub struct TestFont {
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub advance: u16,
    pub bounding_box: [i16; 4],
    pub glyphs: Vec<TestGlyph>,
}

impl TestFont {
    /// Squares of `size` units, one per code point
    pub fn squares(units_per_em: u16, size: i16, code_points: &[u32]) -> Self {
        TestFont {
            units_per_em,
            ascent: size,
            descent: 0,
            advance: size as u16,
            bounding_box: [0, 0, size, size],
            glyphs: code_points
                .iter()
                .map(|&code_point| TestGlyph::Square { code_point, size })
                .collect(),
        }
    }

    fn glyph_bytes(&self, glyph: &TestGlyph) -> Vec<u8> {
        let mut data = Vec::new();
        match *glyph {
            TestGlyph::Square { size, .. } => {
                data.write_i16::<BigEndian>(1).unwrap();
                for v in [0, 0, size, size] {
                    data.write_i16::<BigEndian>(v).unwrap();
                }
                data.write_u16::<BigEndian>(3).unwrap();
                data.write_u16::<BigEndian>(0).unwrap();
                data.extend_from_slice(&[0x01; 4]);
                for dx in [0, size, 0, -size] {
                    data.write_i16::<BigEndian>(dx).unwrap();
                }
                for dy in [0, 0, size, 0] {
                    data.write_i16::<BigEndian>(dy).unwrap();
                }
            }
            TestGlyph::Composite { component, dx, .. } => {
                let size = self.component_size(component);
                data.write_i16::<BigEndian>(-1).unwrap();
                for v in [dx, 0, dx + size, size] {
                    data.write_i16::<BigEndian>(v).unwrap();
                }
                // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
                data.write_u16::<BigEndian>(0x0003).unwrap();
                data.write_u16::<BigEndian>(component).unwrap();
                data.write_i16::<BigEndian>(dx).unwrap();
                data.write_i16::<BigEndian>(0).unwrap();
            }
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }
        data
    }

    fn component_size(&self, gid: u16) -> i16 {
        match self.glyphs.get(gid as usize - 1) {
            Some(TestGlyph::Square { size, .. }) => *size,
            _ => 0,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let num_glyphs = self.glyphs.len() as u16 + 1;

        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        loca.write_u32::<BigEndian>(0).unwrap();
        // empty .notdef
        loca.write_u32::<BigEndian>(0).unwrap();
        for glyph in &self.glyphs {
            glyf.extend_from_slice(&self.glyph_bytes(glyph));
            loca.write_u32::<BigEndian>(glyf.len() as u32).unwrap();
        }

        let mut cmap = BTreeMap::new();
        for (i, glyph) in self.glyphs.iter().enumerate() {
            let code_point = match *glyph {
                TestGlyph::Square { code_point, .. } | TestGlyph::Composite { code_point, .. } => code_point,
            };
            cmap.insert(code_point, i as u16 + 1);
        }

        let mut head = Vec::new();
        head.write_u32::<BigEndian>(0x0001_0000).unwrap();
        head.write_u32::<BigEndian>(0x0001_0000).unwrap();
        head.write_u32::<BigEndian>(0).unwrap();
        head.write_u32::<BigEndian>(0x5F0F_3CF5).unwrap();
        head.write_u16::<BigEndian>(0x000B).unwrap();
        head.write_u16::<BigEndian>(self.units_per_em).unwrap();
        head.extend_from_slice(&[0; 16]);
        for v in self.bounding_box {
            head.write_i16::<BigEndian>(v).unwrap();
        }
        head.write_u16::<BigEndian>(0).unwrap(); // macStyle
        head.write_u16::<BigEndian>(8).unwrap(); // lowestRecPPEM
        head.write_i16::<BigEndian>(2).unwrap(); // fontDirectionHint
        head.write_i16::<BigEndian>(1).unwrap(); // long loca
        head.write_i16::<BigEndian>(0).unwrap();

        let mut hhea = Vec::new();
        hhea.write_u32::<BigEndian>(0x0001_0000).unwrap();
        hhea.write_i16::<BigEndian>(self.ascent).unwrap();
        hhea.write_i16::<BigEndian>(self.descent).unwrap();
        hhea.write_i16::<BigEndian>(0).unwrap();
        hhea.write_u16::<BigEndian>(self.advance).unwrap();
        hhea.write_i16::<BigEndian>(0).unwrap();
        hhea.write_i16::<BigEndian>(0).unwrap();
        hhea.write_i16::<BigEndian>(self.advance as i16).unwrap();
        hhea.write_i16::<BigEndian>(1).unwrap();
        hhea.write_i16::<BigEndian>(0).unwrap();
        hhea.extend_from_slice(&[0; 10]);
        hhea.write_i16::<BigEndian>(0).unwrap(); // metricDataFormat
        hhea.write_u16::<BigEndian>(num_glyphs).unwrap();

        let mut maxp = Vec::new();
        maxp.write_u32::<BigEndian>(0x0001_0000).unwrap();
        maxp.write_u16::<BigEndian>(num_glyphs).unwrap();
        for v in [4u16, 1, 4, 1, 2, 0, 0, 0, 0, 0, 0, 1, 1] {
            maxp.write_u16::<BigEndian>(v).unwrap();
        }

        let mut hmtx = Vec::new();
        for _ in 0..num_glyphs {
            hmtx.write_u16::<BigEndian>(self.advance).unwrap();
            hmtx.write_i16::<BigEndian>(0).unwrap();
        }

        let mut post = Vec::new();
        post.write_u32::<BigEndian>(0x0003_0000).unwrap();
        post.extend_from_slice(&[0; 28]);

        let mut builder = FontBuilder::new();
        builder.add_raw(Tag::new(b"head"), head);
        builder.add_raw(Tag::new(b"hhea"), hhea);
        builder.add_raw(Tag::new(b"maxp"), maxp);
        builder.add_raw(Tag::new(b"cmap"), build_cmap_table(&cmap).unwrap());
        builder.add_raw(Tag::new(b"hmtx"), hmtx);
        builder.add_raw(Tag::new(b"loca"), loca);
        builder.add_raw(Tag::new(b"glyf"), glyf);
        builder.add_raw(Tag::new(b"post"), post);
        builder.build()
    }

    /// Writes the font to `dir/name` and returns its path
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

/// 1000 units per em font: `A` and `C` are squares, `B` is a composite of `A`
pub fn composite_font() -> TestFont {
    TestFont {
        units_per_em: 1000,
        ascent: 800,
        descent: -200,
        advance: 1000,
        bounding_box: [0, 0, 900, 800],
        glyphs: vec![
            TestGlyph::Square { code_point: 0x41, size: 800 },
            TestGlyph::Composite {
                code_point: 0x42,
                component: 1,
                dx: 100,
            },
            TestGlyph::Square { code_point: 0x43, size: 600 },
        ],
    }
}
