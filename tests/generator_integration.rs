mod common;

use common::{composite_font, TestFont};
use iconfontgen::base85::SourceLanguage;
use iconfontgen::generator::Generator;
use iconfontgen::messages::MessageLog;
use iconfontgen::project::{
    ArtifactKind, ArtifactSet, FontId, FontSelection, GenerationPlan, GenerationRequest, MergedTargets,
    ProjectSelection,
};
use iconfontgen::sfnt::FontSource;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn project_with_font(dir: &Path, output_name: &str) -> ProjectSelection {
    let font_path = composite_font().write_to(dir, "icons.ttf");
    let mut project = ProjectSelection::new(dir.join("out"));
    fs::create_dir_all(&project.output_dir).unwrap();
    let mut font = FontSelection::new(font_path);
    font.settings.prefix = "FA".to_string();
    font.settings.output_name = output_name.to_string();
    font.table.add(0x41, 0xe000, "home").unwrap();
    font.table.add(0x42, 0xe001, "user-circle").unwrap();
    project.add_font(font);
    project
}

fn request(plan: GenerationPlan, language: SourceLanguage) -> GenerationRequest {
    let mut request = GenerationRequest::new(plan);
    request.language = language;
    request
}

fn no_temporary_file(dir: &Path) -> bool {
    fs::read_dir(dir)
        .unwrap()
        .all(|e| !e.unwrap().file_name().to_string_lossy().starts_with("temporary_"))
}

#[test]
fn test_font_and_header_reference_the_file() {
    let tmp = tempdir().unwrap();
    let project = project_with_font(tmp.path(), "fa-icons");
    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Batch {
            targets: ArtifactSet::of(&[ArtifactKind::Font, ArtifactKind::Header]),
        },
        SourceLanguage::Cpp,
    );

    let outcome = Generator::new(&project, &log).generate(&req);
    assert!(outcome.is_success(), "{:?}", outcome.failures);

    let out = &project.output_dir;
    let font = FontSource::open(out.join("fa_icons.ttf")).unwrap();
    assert!(font.glyph_id(0xe000).is_some());
    assert!(font.glyph_id(0xe001).is_some());

    let header = fs::read_to_string(out.join("fa_icons.h")).unwrap();
    assert!(header.contains("#define FONT_ICON_FILE_NAME_FA \"fa_icons.ttf\"\n"));
    assert!(header.contains("#define ICON_MIN_FA 0xe000\n#define ICON_MAX_FA 0xe001\n"));
    assert!(header.contains("#define ICON_FA_HOME u8\"\\ue000\"\n"));
    assert!(header.contains("#define ICON_FA_USER_CIRCLE u8\"\\ue001\"\n"));
}

#[test]
fn test_cpp_source_includes_header_and_removes_temporary_font() {
    let tmp = tempdir().unwrap();
    let project = project_with_font(tmp.path(), "fa");
    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Current {
            font: FontId(0),
            targets: ArtifactSet::of(&[ArtifactKind::Source, ArtifactKind::Header]),
        },
        SourceLanguage::Cpp,
    );

    let outcome = Generator::new(&project, &log).generate(&req);
    assert!(outcome.is_success(), "{:?}", outcome.failures);
    assert_eq!(outcome.written.len(), 2);

    let out = &project.output_dir;
    let source = fs::read_to_string(out.join("fa.cpp")).unwrap();
    assert!(source.starts_with("#include \"fa.h\"\n\nstatic const char FA_compressed_data_base85["));
    let header = fs::read_to_string(out.join("fa.h")).unwrap();
    assert!(header.contains("#define FONT_ICON_BUFFER_NAME_FA FA_compressed_data_base85\n"));
    assert!(header.contains("#define FONT_ICON_BUFFER_SIZE_FA 0x"));
    assert!(!out.join("fa.ttf").exists());
    assert!(no_temporary_file(out));
}

#[test]
fn test_csharp_files() {
    let tmp = tempdir().unwrap();
    let project = project_with_font(tmp.path(), "fa");
    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Batch {
            targets: ArtifactSet::of(&[ArtifactKind::Source, ArtifactKind::Header]),
        },
        SourceLanguage::CSharp,
    );

    let outcome = Generator::new(&project, &log).generate(&req);
    assert!(outcome.is_success(), "{:?}", outcome.failures);

    let out = &project.output_dir;
    let bytes = fs::read_to_string(out.join("fa_Bytes.cs")).unwrap();
    assert!(bytes.contains("public static class FA_Bytes"));
    assert!(!bytes.contains("#include"));
    let labels = fs::read_to_string(out.join("fa_Labels.cs")).unwrap();
    assert!(labels.contains("public static class FA_Labels"));
    assert!(labels.contains("public const string BufferName = \"FA_compressed_data_base85\";"));
    assert!(labels.contains("public const string HOME = \"\\ue000\";"));
}

#[test]
fn test_empty_selection_uses_whole_font() {
    let tmp = tempdir().unwrap();
    let mut project = project_with_font(tmp.path(), "fa");
    project.clear_selections();
    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Batch {
            targets: ArtifactSet::of(&[ArtifactKind::Font, ArtifactKind::Source, ArtifactKind::Header]),
        },
        SourceLanguage::C,
    );

    let outcome = Generator::new(&project, &log).generate(&req);
    // the font file needs a selection, the source and header do not
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].contains("no glyph selected"));

    let out = &project.output_dir;
    assert!(!out.join("fa.ttf").exists());
    assert!(out.join("fa.c").exists());
    let header = fs::read_to_string(out.join("fa.h")).unwrap();
    assert!(header.contains("#define ICON_FA_UNI0041 u8\"\\u0041\"\n"));
    assert!(header.contains("#define ICON_FA_UNI0043 u8\"\\u0043\"\n"));
    assert!(header.contains("#define ICON_MIN_FA 0x41\n#define ICON_MAX_FA 0x43\n"));
}

#[test]
fn test_card_is_a_grayscale_png() {
    let tmp = tempdir().unwrap();
    let project = project_with_font(tmp.path(), "fa");
    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Current {
            font: FontId(0),
            targets: ArtifactSet::of(&[ArtifactKind::Card]),
        },
        SourceLanguage::Cpp,
    );

    let outcome = Generator::new(&project, &log).generate(&req);
    assert!(outcome.is_success(), "{:?}", outcome.failures);

    let file = fs::File::open(project.output_dir.join("fa.png")).unwrap();
    let reader = png::Decoder::new(file).read_info().unwrap();
    let info = reader.info();
    assert_eq!(info.color_type, png::ColorType::Grayscale);
    assert!(info.width > 0);
    assert_eq!(info.height, 2 + 2 * 50);
}

#[test]
fn test_merged_source_aliases_buffer() {
    let tmp = tempdir().unwrap();
    let mut project = project_with_font(tmp.path(), "fa");
    let other = TestFont::squares(2048, 1600, &[0x61]).write_to(tmp.path(), "other.ttf");
    let mut font = FontSelection::new(other);
    font.table.add(0x61, 0xe010, "star").unwrap();
    project.add_font(font);
    project.merge.prefix = "ICONS".to_string();
    project.merge.output_name = "all-icons".to_string();

    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Merged {
            targets: MergedTargets {
                font: true,
                source: true,
                header: true,
            },
        },
        SourceLanguage::C,
    );

    let outcome = Generator::new(&project, &log).generate(&req);
    assert!(outcome.is_success(), "{:?}", outcome.failures);

    let out = &project.output_dir;
    let source = fs::read_to_string(out.join("all_icons.c")).unwrap();
    assert!(source.starts_with("#include \"all_icons.h\"\n\nstatic const char FONT_ICON_BUFFER_NAME_ICONS["));
    let header = fs::read_to_string(out.join("all_icons.h")).unwrap();
    assert!(header.contains("#define FONT_ICON_BUFFER_NAME_ICONS ICONS_compressed_data_base85\n"));
    assert!(header.contains("#define ICON_ICONS_HOME u8\"\\ue000\"\n"));
    assert!(header.contains("#define ICON_ICONS_STAR u8\"\\ue010\"\n"));
    assert!(no_temporary_file(out));

    let merged = FontSource::open(out.join("all_icons.ttf")).unwrap();
    assert_eq!(merged.bounding_box(), [0, 0, 900, 800]);
    let star = merged.glyph_id(0xe010).unwrap();
    // 1600 units fitted in the 900x800 box of the base font
    assert_eq!(merged.outline(star).unwrap().bounding_box(), Some([0, 0, 800, 800]));
}

#[test]
fn test_batch_skips_font_with_duplicates() {
    let tmp = tempdir().unwrap();
    let mut project = project_with_font(tmp.path(), "fa");
    let other = TestFont::squares(1000, 500, &[0x61, 0x62]).write_to(tmp.path(), "other.ttf");
    let mut font = FontSelection::new(other);
    font.settings.output_name = "dup".to_string();
    font.table.add(0x61, 0xe100, "same").unwrap();
    font.table.add(0x62, 0xe100, "Same").unwrap();
    project.add_font(font);

    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Batch {
            targets: ArtifactSet::of(&[ArtifactKind::Font]),
        },
        SourceLanguage::Cpp,
    );
    let outcome = Generator::new(&project, &log).generate(&req);

    assert_eq!(outcome.failures.len(), 1);
    assert!(log.errors()[0].contains("Duplicate"));
    assert!(project.output_dir.join("fa.ttf").exists());
    assert!(!project.output_dir.join("dup.ttf").exists());
}

#[test]
fn test_disabled_font_is_skipped_in_batch() {
    let tmp = tempdir().unwrap();
    let mut project = project_with_font(tmp.path(), "fa");
    project.font_mut(FontId(0)).unwrap().settings.enabled = false;
    let log = MessageLog::new();
    let req = request(
        GenerationPlan::Batch {
            targets: ArtifactSet::of(&[ArtifactKind::Font]),
        },
        SourceLanguage::Cpp,
    );
    let outcome = Generator::new(&project, &log).generate(&req);
    assert!(outcome.written.is_empty());
    assert!(!project.output_dir.join("fa.ttf").exists());
}

fn current_font_and_header() -> GenerationRequest {
    request(
        GenerationPlan::Current {
            font: FontId(0),
            targets: ArtifactSet::of(&[ArtifactKind::Font, ArtifactKind::Header]),
        },
        SourceLanguage::Cpp,
    )
}

#[test]
fn test_current_mode_refuses_duplicates() {
    let tmp = tempdir().unwrap();
    let mut project = project_with_font(tmp.path(), "fa");
    project
        .font_mut(FontId(0))
        .unwrap()
        .table
        .add(0x43, 0xe000, "Home")
        .unwrap();

    let log = MessageLog::new();
    let outcome = Generator::new(&project, &log).generate(&current_font_and_header());

    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].contains("Duplicate Error"));
    assert!(outcome.written.is_empty());
    assert!(!project.output_dir.join("fa.ttf").exists());
    assert!(!project.output_dir.join("fa.h").exists());
}

#[test]
fn test_current_mode_refuses_duplicates_of_disabled_font() {
    let tmp = tempdir().unwrap();
    let mut project = project_with_font(tmp.path(), "fa");
    let font = project.font_mut(FontId(0)).unwrap();
    font.settings.enabled = false;
    font.table.add(0x43, 0xe000, "Home").unwrap();

    let log = MessageLog::new();
    let outcome = Generator::new(&project, &log).generate(&current_font_and_header());

    assert_eq!(outcome.failures.len(), 1);
    assert!(log.errors()[0].contains("Duplicate Error"));
    assert!(outcome.written.is_empty());
    assert!(!project.output_dir.join("fa.ttf").exists());
    assert!(!project.output_dir.join("fa.h").exists());
}

#[test]
fn test_current_mode_generates_disabled_font() {
    let tmp = tempdir().unwrap();
    let mut project = project_with_font(tmp.path(), "fa");
    project.font_mut(FontId(0)).unwrap().settings.enabled = false;

    let log = MessageLog::new();
    let outcome = Generator::new(&project, &log).generate(&current_font_and_header());

    assert!(outcome.is_success(), "{:?}", outcome.failures);
    assert!(project.output_dir.join("fa.ttf").exists());
    assert!(project.output_dir.join("fa.h").exists());
}

/// Card pixels and width, decoded from the PNG
fn read_card(path: &Path) -> (Vec<u8>, usize) {
    let file = fs::File::open(path).unwrap();
    let mut reader = png::Decoder::new(file).read_info().unwrap();
    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels).unwrap();
    pixels.truncate(info.buffer_size());
    (pixels, info.width as usize)
}

/// Inked pixels right of the glyph column, where the labels are drawn
fn label_ink(pixels: &[u8], width: usize, glyph_column: usize) -> usize {
    pixels
        .chunks(width)
        .flat_map(|row| row[glyph_column..].iter())
        .filter(|&&v| v > 0)
        .count()
}

fn pua_only_project(dir: &Path) -> ProjectSelection {
    let font_path = TestFont::squares(1000, 800, &[0xe000]).write_to(dir, "pua.ttf");
    let mut project = ProjectSelection::new(dir.join("out"));
    fs::create_dir_all(&project.output_dir).unwrap();
    let mut font = FontSelection::new(font_path);
    font.settings.prefix = "FA".to_string();
    font.table.add(0xe000, 0xe000, "home").unwrap();
    project.add_font(font);
    project
}

fn card_request() -> GenerationRequest {
    request(
        GenerationPlan::Current {
            font: FontId(0),
            targets: ArtifactSet::of(&[ArtifactKind::Card]),
        },
        SourceLanguage::Cpp,
    )
}

#[test]
fn test_card_labels_use_label_font() {
    let tmp = tempdir().unwrap();
    let mut project = pua_only_project(tmp.path());
    let latin: Vec<u32> = ('A'..='Z').chain('0'..='9').chain(['_']).map(u32::from).collect();
    let label_path = TestFont::squares(1000, 600, &latin).write_to(tmp.path(), "labels.ttf");
    project.font_mut(FontId(0)).unwrap().settings.card.label_font = Some(label_path);

    let log = MessageLog::new();
    let outcome = Generator::new(&project, &log).generate(&card_request());
    assert!(outcome.is_success(), "{:?}", outcome.failures);

    let (pixels, width) = read_card(&project.output_dir.join("pua.png"));
    // padding 5 plus the 50 pixel glyph square
    assert!(width > 55);
    assert!(label_ink(&pixels, width, 55) > 0);
}

#[test]
fn test_card_labels_of_pua_font_use_system_font() {
    if iconfontgen::generator::card::system_label_font().is_none() {
        // no usable font installed on this machine
        return;
    }
    let tmp = tempdir().unwrap();
    let project = pua_only_project(tmp.path());

    let log = MessageLog::new();
    let outcome = Generator::new(&project, &log).generate(&card_request());
    assert!(outcome.is_success(), "{:?}", outcome.failures);

    let (pixels, width) = read_card(&project.output_dir.join("pua.png"));
    assert!(width > 55);
    assert!(label_ink(&pixels, width, 55) > 0);
}
