//! Base85 encoding of compressed font bytes for embedding in C, C++ and C# sources.
//!
//! Each little-endian 32-bit word becomes five printable digits in `'#'..='x'`, skipping the
//! backslash. Short buffers are written as a quoted string literal. Buffers whose encoded size
//! reaches 65536 characters are written as a byte array, since some compilers refuse longer
//! string literals.

use crate::compress;
use crate::GenError;
use log::debug;

/// Encoded sizes at or above this limit are emitted as byte arrays
pub const STRING_LITERAL_LIMIT: usize = 65536;

/// Output languages for embedded buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceLanguage {
    C,
    #[default]
    Cpp,
    CSharp,
}

impl SourceLanguage {
    /// File extension of the source file holding the buffer
    pub fn source_extension(&self) -> &'static str {
        match self {
            SourceLanguage::C => "c",
            SourceLanguage::Cpp => "cpp",
            SourceLanguage::CSharp => "cs",
        }
    }

    /// Extension of the companion header (`.h`, or a `_Labels.cs` class for C#)
    pub fn header_extension(&self) -> &'static str {
        match self {
            SourceLanguage::C | SourceLanguage::Cpp => "h",
            SourceLanguage::CSharp => "cs",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "c" => Some(SourceLanguage::C),
            "cpp" | "c++" | "cxx" => Some(SourceLanguage::Cpp),
            "csharp" | "c#" | "cs" => Some(SourceLanguage::CSharp),
            _ => None,
        }
    }
}

/// Result of [`encode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBuffer {
    /// Raw digits, five per 32-bit word, without quotes, escapes or line breaks
    pub digits: String,
    /// Number of digits, `ceil(len / 4) * 5`
    pub size: usize,
    /// True when `size >= 65536`
    pub is_byte_array: bool,
}

fn encode_digit(x: u32) -> char {
    let x = (x % 85) + 35;
    let x = if x >= b'\\' as u32 { x + 1 } else { x };
    x as u8 as char
}

fn decode_digit(c: u8) -> Result<u32, GenError> {
    match c {
        b'#'..=b'[' => Ok((c - 35) as u32),
        b']'..=b'x' => Ok((c - 36) as u32),
        _ => Err(GenError::format_error(format!(
            "'{}' is not a base85 digit",
            c as char
        ))),
    }
}

/// Encode compressed bytes into base85 digits.
///
/// The input is zero padded to a multiple of four bytes.
pub fn encode(compressed: &[u8]) -> EncodedBuffer {
    let size = compressed.len().div_ceil(4) * 5;
    let mut digits = String::with_capacity(size);
    for word in compressed.chunks(4) {
        let mut padded = [0u8; 4];
        padded[..word.len()].copy_from_slice(word);
        let mut d = u32::from_le_bytes(padded);
        for _ in 0..5 {
            digits.push(encode_digit(d));
            d /= 85;
        }
    }
    EncodedBuffer {
        digits,
        size,
        is_byte_array: size >= STRING_LITERAL_LIMIT,
    }
}

/// Decode base85 text back into bytes (including the zero padding added by [`encode`]).
///
/// Accepts either the raw digits or a rendered string literal: quotes, whitespace and the
/// `\?` trigraph escape are ignored.
pub fn decode(text: &str) -> Result<Vec<u8>, GenError> {
    let clean: Vec<u8> = text
        .bytes()
        .filter(|b| !matches!(b, b'"' | b'\\' | b' ' | b'\n' | b'\r' | b'\t'))
        .collect();
    if clean.len() % 5 != 0 {
        return Err(GenError::format_error(format!(
            "base85 text holds {} digits, expected a multiple of 5",
            clean.len()
        )));
    }
    let mut out = Vec::with_capacity(clean.len() / 5 * 4);
    for group in clean.chunks(5) {
        let mut value: u64 = 0;
        for &c in group.iter().rev() {
            value = value * 85 + decode_digit(c)? as u64;
        }
        let word = u32::try_from(value)
            .map_err(|_| GenError::format_error("base85 group overflows 32 bits"))?;
        out.extend_from_slice(&word.to_le_bytes());
    }
    Ok(out)
}

/// Digits per line in generated sources (28 words)
const DIGITS_PER_LINE: usize = 28 * 5;
const C_LINE_BREAK: &str = "\"\n    \"";
const CSHARP_LINE_BREAK: &str = "\" +\n    \"";

/// Quoted string literal body, wrapped every 28 words with `line_break`, `??` escaped
fn render_string_literal(digits: &str, escape_trigraphs: bool, line_break: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 16);
    out.push('"');
    let mut prev = '\0';
    for (i, c) in digits.chars().enumerate() {
        if escape_trigraphs && c == '?' && prev == '?' {
            out.push('\\');
        }
        out.push(c);
        prev = c;
        if (i + 1) % DIGITS_PER_LINE == 0 {
            out.push_str(line_break);
        }
    }
    out.push('"');
    out
}

/// `0x..` byte array body, wrapped every 28 words
fn render_byte_array(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() * 6);
    for (i, c) in digits.bytes().enumerate() {
        out.push_str(&format!("0x{:02x}, ", c));
        if (i + 1) % DIGITS_PER_LINE == 0 {
            out.push('\n');
        }
    }
    let trimmed = out.trim_end().trim_end_matches(',');
    trimmed.to_string()
}

/// A compressed and encoded font, ready to be written in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArtifact {
    /// Identifier of the buffer, `<prefix>_compressed_data_base85`
    pub buffer_name: String,
    /// Encoded size in characters
    pub buffer_size: usize,
    pub encoded: EncodedBuffer,
}

impl CompressedArtifact {
    /// Compress then encode font bytes
    pub fn from_font_bytes(prefix: &str, font_bytes: &[u8]) -> Self {
        let compressed = compress::compress(font_bytes);
        let encoded = encode(&compressed);
        debug!(
            "Font of {} bytes compressed to {} bytes, {} base85 digits (byte array: {})",
            font_bytes.len(),
            compressed.len(),
            encoded.size,
            encoded.is_byte_array
        );
        CompressedArtifact {
            buffer_name: format!("{}_compressed_data_base85", prefix),
            buffer_size: encoded.size,
            encoded,
        }
    }

    /// Buffer declaration for `language`.
    ///
    /// C and C++ get `static const char <name>[<size>+1] = ...;`. C# gets a class member; the
    /// caller wraps it in the `IconFonts` namespace.
    pub fn render(&self, language: SourceLanguage) -> String {
        let digits = &self.encoded.digits;
        match language {
            SourceLanguage::C | SourceLanguage::Cpp => {
                if self.encoded.is_byte_array {
                    format!(
                        "static const char {}[{}+1] ={{\n{}}};\n",
                        self.buffer_name,
                        self.buffer_size,
                        render_byte_array(digits)
                    )
                } else {
                    format!(
                        "static const char {}[{}+1] =\n    {};\n\n",
                        self.buffer_name,
                        self.buffer_size,
                        render_string_literal(digits, true, C_LINE_BREAK)
                    )
                }
            }
            SourceLanguage::CSharp => {
                if self.encoded.is_byte_array {
                    format!(
                        "\t\tpublic static readonly byte[] {} = new byte[{}] {{\n{}}};\n",
                        self.buffer_name,
                        self.buffer_size,
                        render_byte_array(digits)
                    )
                } else {
                    format!(
                        "\t\tpublic const string {} =\n    {};\n",
                        self.buffer_name,
                        render_string_literal(digits, false, CSHARP_LINE_BREAK)
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_alphabet_skips_backslash() {
        let all: Vec<char> = (0..85).map(encode_digit).collect();
        assert_eq!(all[0], '#');
        assert_eq!(all[84], 'x');
        assert!(!all.contains(&'\\'));
        for (i, c) in all.iter().enumerate() {
            assert_eq!(decode_digit(*c as u8).unwrap(), i as u32);
        }
    }

    #[test]
    fn test_encode_pads_and_sizes() {
        let enc = encode(&[1, 2, 3, 4, 5]);
        assert_eq!(enc.size, 10);
        assert_eq!(enc.digits.len(), 10);
        assert!(!enc.is_byte_array);
        assert_eq!(decode(&enc.digits).unwrap(), vec![1, 2, 3, 4, 5, 0, 0, 0]);
        assert_eq!(encode(&[]).size, 0);
    }

    #[test]
    fn test_string_literal_escapes_repeated_question_marks() {
        let rendered = render_string_literal("a???b", true, C_LINE_BREAK);
        assert_eq!(rendered, "\"a?\\?\\?b\"");
        assert_eq!(render_string_literal("a???b", false, C_LINE_BREAK), "\"a???b\"");
    }

    #[test]
    fn test_string_literal_wraps_every_28_words() {
        let digits = "#".repeat(DIGITS_PER_LINE * 2 + 5);
        let rendered = render_string_literal(&digits, true, C_LINE_BREAK);
        assert_eq!(rendered.matches("\"\n    \"").count(), 2);
    }

    #[test]
    fn test_rendered_literal_decodes() {
        let data: Vec<u8> = (0..400u32)
            .flat_map(|i| i.wrapping_mul(2_654_435_761).to_le_bytes())
            .collect();
        let enc = encode(&data);
        let rendered = render_string_literal(&enc.digits, true, C_LINE_BREAK);
        assert_eq!(decode(&rendered).unwrap(), data);
    }

    #[test]
    fn test_threshold_between_string_and_byte_array() {
        // 13107 words give 65535 digits; one more word gives 65540
        let below = vec![0u8; 13107 * 4];
        let above = vec![0u8; 13108 * 4];
        assert_eq!(encode(&below).size, 65535);
        assert!(!encode(&below).is_byte_array);
        assert_eq!(encode(&above).size, 65540);
        assert!(encode(&above).is_byte_array);
    }

    #[test]
    fn test_render_c_string_form() {
        let artifact = CompressedArtifact::from_font_bytes("FA", b"not really a font");
        let src = artifact.render(SourceLanguage::Cpp);
        assert!(src.starts_with(&format!(
            "static const char FA_compressed_data_base85[{}+1] =\n    \"",
            artifact.buffer_size
        )));
        assert!(src.ends_with("\";\n\n"));
    }

    #[test]
    fn test_render_byte_array_form() {
        let mut artifact = CompressedArtifact::from_font_bytes("FA", b"0123456789abcdef");
        artifact.encoded.is_byte_array = true;
        let src = artifact.render(SourceLanguage::C);
        assert!(src.contains("={\n0x"));
        assert!(src.ends_with("};\n"));
        assert!(!src.contains(", }"));
        let cs = artifact.render(SourceLanguage::CSharp);
        assert!(cs.contains("public static readonly byte[] FA_compressed_data_base85"));
    }

    #[test]
    fn test_full_pipeline_round_trip() {
        let font_like: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let artifact = CompressedArtifact::from_font_bytes("X", &font_like);
        let bytes = decode(&artifact.encoded.digits).unwrap();
        // drop the zero padding, the stream is self-delimiting
        assert_eq!(compress::decompress(&bytes).unwrap(), font_like);
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!(SourceLanguage::parse("C#"), Some(SourceLanguage::CSharp));
        assert_eq!(SourceLanguage::parse("cpp"), Some(SourceLanguage::Cpp));
        assert_eq!(SourceLanguage::parse("rust"), None);
    }
}
