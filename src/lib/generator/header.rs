//! Header generation: `#define` lines for C and C++, a label class for C#.

use crate::project::HeaderOrder;
use crate::remap::{header_identifier, GlyphRemapTable, MAX_CODE_POINT};
use std::collections::BTreeMap;

/// How the header tells the program where the font is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontReference<'a> {
    /// Font embedded in a source file
    Buffer { name: &'a str, size: usize },
    /// Font shipped as a file next to the program
    File(&'a str),
}

/// Identifier to new code point, for every glyph of `tables`.
///
/// When two glyphs share an identifier the last one wins.
pub fn header_glyphs<'a>(tables: impl IntoIterator<Item = &'a GlyphRemapTable>) -> BTreeMap<String, u32> {
    let mut glyphs = BTreeMap::new();
    for table in tables {
        for entry in table {
            glyphs.insert(header_identifier(&entry.new_name), entry.new_code_point);
        }
    }
    glyphs
}

fn ordered(glyphs: &BTreeMap<String, u32>, order: HeaderOrder) -> Vec<(&str, u32)> {
    let mut items: Vec<(&str, u32)> = glyphs.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    if order == HeaderOrder::CodePoint {
        items.sort_by_key(|&(name, cp)| (cp, name));
    }
    items
}

/// `(min, max)` new code point, `(0xffff, 0)` when there is no glyph
fn code_point_range(glyphs: &BTreeMap<String, u32>) -> (u32, u32) {
    glyphs
        .values()
        .fold((MAX_CODE_POINT, 0), |(min, max), &cp| (min.min(cp), max.max(cp)))
}

/// C/C++ header text
pub fn render_header(
    prefix: &str,
    reference: FontReference,
    glyphs: &BTreeMap<String, u32>,
    order: HeaderOrder,
) -> String {
    let mut out = String::new();
    out.push_str("//Header Generated with https://github.com/aiekick/ImGuiFontStudio\n");
    out.push_str("//Based on https://github.com/juliettef/IconFontCppHeaders\n");
    out.push('\n');
    out.push_str("#pragma once\n");
    out.push('\n');

    match reference {
        FontReference::Buffer { name, size } => {
            out.push_str(&format!("#define FONT_ICON_BUFFER_NAME_{} {}\n", prefix, name));
            out.push_str(&format!("#define FONT_ICON_BUFFER_SIZE_{} 0x{:x}\n", prefix, size));
        }
        FontReference::File(file) => {
            out.push_str(&format!("#define FONT_ICON_FILE_NAME_{} \"{}\"\n", prefix, file));
        }
    }
    out.push('\n');

    let (min, max) = code_point_range(glyphs);
    out.push_str(&format!("#define ICON_MIN_{} 0x{:x}\n", prefix, min));
    out.push_str(&format!("#define ICON_MAX_{} 0x{:x}\n", prefix, max));
    out.push('\n');

    for (id, cp) in ordered(glyphs, order) {
        out.push_str(&format!("#define ICON_{}_{} u8\"\\u{:04x}\"\n", prefix, id, cp));
    }
    out.push('\n');
    out
}

/// C# member names cannot start with a digit
fn csharp_member(id: &str) -> String {
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", id)
    } else {
        id.to_string()
    }
}

/// C# companion of [`render_header`]: a static class of string constants
pub fn render_csharp_labels(
    prefix: &str,
    reference: FontReference,
    glyphs: &BTreeMap<String, u32>,
    order: HeaderOrder,
) -> String {
    let mut out = String::new();
    out.push_str("//Header Generated with https://github.com/aiekick/ImGuiFontStudio\n");
    out.push_str("//Based on https://github.com/juliettef/IconFontCppHeaders\n");
    out.push('\n');
    out.push_str("using System;\n\n");
    out.push_str("namespace IconFonts\n{\n");
    out.push_str(&format!("\tpublic static class {}_Labels\n\t{{\n", prefix));

    match reference {
        FontReference::Buffer { name, size } => {
            out.push_str(&format!("\t\tpublic const string BufferName = \"{}\";\n", name));
            out.push_str(&format!("\t\tpublic const int BufferSize = 0x{:x};\n", size));
        }
        FontReference::File(file) => {
            out.push_str(&format!("\t\tpublic const string FileName = \"{}\";\n", file));
        }
    }
    let (min, max) = code_point_range(glyphs);
    out.push_str(&format!("\t\tpublic const int IconMin = 0x{:x};\n", min));
    out.push_str(&format!("\t\tpublic const int IconMax = 0x{:x};\n", max));
    for (id, cp) in ordered(glyphs, order) {
        out.push_str(&format!(
            "\t\tpublic const string {} = \"\\u{:04x}\";\n",
            csharp_member(id),
            cp
        ));
    }
    out.push_str("\t}\n}\n");
    out
}
