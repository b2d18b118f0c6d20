/// Build the post table of generated fonts
///
/// Version 2.0 names every glyph: standard Macintosh names are referenced by index, other names
/// are stored as Pascal strings after the index array. Version 3.0 carries no names at all.
use byteorder::{BigEndian, WriteBytesExt};
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Longest name written, as recommended for PostScript glyph names
const MAX_NAME_LEN: usize = 63;

/// The 258 glyph names every version 2.0 post table can reference by index
pub static STANDARD_MAC_NAMES: [&str; 258] = [
    ".notdef", ".null", "nonmarkingreturn", "space", "exclam", "quotedbl", "numbersign", "dollar",
    "percent", "ampersand", "quotesingle", "parenleft", "parenright", "asterisk", "plus", "comma",
    "hyphen", "period", "slash", "zero", "one", "two", "three", "four", "five", "six", "seven",
    "eight", "nine", "colon", "semicolon", "less", "equal", "greater", "question", "at", "A", "B",
    "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U",
    "V", "W", "X", "Y", "Z", "bracketleft", "backslash", "bracketright", "asciicircum",
    "underscore", "grave", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n",
    "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar", "braceright",
    "asciitilde", "Adieresis", "Aring", "Ccedilla", "Eacute", "Ntilde", "Odieresis", "Udieresis",
    "aacute", "agrave", "acircumflex", "adieresis", "atilde", "aring", "ccedilla", "eacute",
    "egrave", "ecircumflex", "edieresis", "iacute", "igrave", "icircumflex", "idieresis",
    "ntilde", "oacute", "ograve", "ocircumflex", "odieresis", "otilde", "uacute", "ugrave",
    "ucircumflex", "udieresis", "dagger", "degree", "cent", "sterling", "section", "bullet",
    "paragraph", "germandbls", "registered", "copyright", "trademark", "acute", "dieresis",
    "notequal", "AE", "Oslash", "infinity", "plusminus", "lessequal", "greaterequal", "yen", "mu",
    "partialdiff", "summation", "product", "pi", "integral", "ordfeminine", "ordmasculine",
    "Omega", "ae", "oslash", "questiondown", "exclamdown", "logicalnot", "radical", "florin",
    "approxequal", "Delta", "guillemotleft", "guillemotright", "ellipsis", "nonbreakingspace",
    "Agrave", "Atilde", "Otilde", "OE", "oe", "endash", "emdash", "quotedblleft", "quotedblright",
    "quoteleft", "quoteright", "divide", "lozenge", "ydieresis", "Ydieresis", "fraction",
    "currency", "guilsinglleft", "guilsinglright", "fi", "fl", "daggerdbl", "periodcentered",
    "quotesinglbase", "quotedblbase", "perthousand", "Acircumflex", "Ecircumflex", "Aacute",
    "Edieresis", "Egrave", "Iacute", "Icircumflex", "Idieresis", "Igrave", "Oacute",
    "Ocircumflex", "apple", "Ograve", "Uacute", "Ucircumflex", "Ugrave", "dotlessi", "circumflex",
    "tilde", "macron", "breve", "dotaccent", "ring", "cedilla", "hungarumlaut", "ogonek", "caron",
    "Lslash", "lslash", "Scaron", "scaron", "Zcaron", "zcaron", "brokenbar", "Eth", "eth",
    "Yacute", "yacute", "Thorn", "thorn", "minus", "multiply", "onesuperior", "twosuperior",
    "threesuperior", "onehalf", "onequarter", "threequarters", "franc", "Gbreve", "gbreve",
    "Idotaccent", "Scedilla", "scedilla", "Cacute", "cacute", "Ccaron", "ccaron", "dcroat",
];

static STANDARD_INDEX: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    STANDARD_MAC_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i as u16))
        .collect()
});

/// Restricts a name to the PostScript glyph name alphabet
pub fn postscript_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
        .take(MAX_NAME_LEN)
        .collect();
    if cleaned.is_empty() {
        ".notdef".to_string()
    } else {
        cleaned
    }
}

/// The 32 byte header: version, then italic angle, underline and memory fields from `base_post`
fn write_header(buf: &mut Vec<u8>, version: u32, base_post: Option<&[u8]>) -> std::io::Result<()> {
    buf.write_u32::<BigEndian>(version)?;
    match base_post.and_then(|p| p.get(4..32)) {
        Some(rest) => buf.extend_from_slice(rest),
        None => buf.extend_from_slice(&[0u8; 28]),
    }
    Ok(())
}

/// Version 3.0 table without glyph names
pub fn build_post_v3(base_post: Option<&[u8]>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(32);
    write_header(&mut buf, 0x0003_0000, base_post)?;
    Ok(buf)
}

/// Version 2.0 table naming glyph `i` after `glyph_names[i]`
pub fn build_post_v2(base_post: Option<&[u8]>, glyph_names: &[String]) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_header(&mut buf, 0x0002_0000, base_post)?;
    buf.write_u16::<BigEndian>(glyph_names.len() as u16)?;

    let mut custom: Vec<String> = Vec::new();
    let mut custom_index: HashMap<String, u16> = HashMap::new();
    for name in glyph_names {
        let name = postscript_name(name);
        let index = match STANDARD_INDEX.get(name.as_str()) {
            Some(&i) => i,
            None => *custom_index.entry(name.clone()).or_insert_with(|| {
                custom.push(name);
                (STANDARD_MAC_NAMES.len() + custom.len() - 1) as u16
            }),
        };
        buf.write_u16::<BigEndian>(index)?;
    }

    for name in &custom {
        buf.write_u8(name.len() as u8)?;
        buf.extend_from_slice(name.as_bytes());
    }

    debug!(
        "Built post table v2: {} glyphs, {} custom names",
        glyph_names.len(),
        custom.len()
    );
    Ok(buf)
}
