//! Source files embedding a compressed font

use crate::base85::{CompressedArtifact, SourceLanguage};

/// Text of the source file holding `artifact`.
///
/// `header_include` adds an `#include` line in C and C++. `buffer_alias` renames the C/C++
/// buffer, which lets a merged header define the real name through
/// `FONT_ICON_BUFFER_NAME_<PREFIX>`.
pub fn render_source(
    language: SourceLanguage,
    class_prefix: &str,
    artifact: &CompressedArtifact,
    header_include: Option<&str>,
    buffer_alias: Option<&str>,
) -> String {
    let buffer = artifact.render(language);
    match language {
        SourceLanguage::C | SourceLanguage::Cpp => {
            let mut out = String::new();
            if let Some(header) = header_include {
                out.push_str(&format!("#include \"{}\"\n\n", header));
            }
            match buffer_alias {
                Some(alias) => out.push_str(&buffer.replacen(&artifact.buffer_name, alias, 1)),
                None => out.push_str(&buffer),
            }
            out
        }
        SourceLanguage::CSharp => {
            let mut out = String::new();
            out.push_str("using System;\n");
            out.push_str("using System.Collections.Generic;\n\n");
            out.push_str(&format!(
                "namespace IconFonts\n{{\n\tpublic static class {}_Bytes\n\t{{ \n",
                class_prefix
            ));
            out.push_str(&buffer);
            out.push_str("\t}\n}\n");
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpp_source_with_include() {
        let artifact = CompressedArtifact::from_font_bytes("FA", b"font bytes");
        let src = render_source(SourceLanguage::Cpp, "FA", &artifact, Some("fa.h"), None);
        assert!(src.starts_with("#include \"fa.h\"\n\nstatic const char FA_compressed_data_base85["));
    }

    #[test]
    fn test_buffer_alias() {
        let artifact = CompressedArtifact::from_font_bytes("ICONS", b"font bytes");
        let src = render_source(SourceLanguage::C, "ICONS", &artifact, None, Some("FONT_ICON_BUFFER_NAME_ICONS"));
        assert!(src.starts_with("static const char FONT_ICON_BUFFER_NAME_ICONS["));
        assert!(!src.contains("ICONS_compressed_data_base85"));
    }

    #[test]
    fn test_csharp_source_is_wrapped_in_class() {
        let artifact = CompressedArtifact::from_font_bytes("FA", b"font bytes");
        let src = render_source(SourceLanguage::CSharp, "FA", &artifact, Some("ignored.h"), None);
        assert!(src.starts_with("using System;\nusing System.Collections.Generic;\n\nnamespace IconFonts\n{\n\tpublic static class FA_Bytes\n\t{ \n"));
        assert!(src.contains("public const string FA_compressed_data_base85"));
        assert!(src.ends_with("\t}\n}\n"));
        assert!(!src.contains("#include"));
    }
}
