//! Glyph card: a grayscale picture listing every glyph next to its label.
//!
//! Each row holds one glyph drawn at 0.8 times the row height followed by its label at half the
//! row height. After `max_rows` rows the next glyph starts a new column.
//!
//! Labels are drawn with `CardSettings::label_font`, or with a sans-serif font of the system
//! when none is configured.

use crate::project::CardSettings;
use crate::GenError;
use fontdb::Database;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use rusttype::{point, Font, PositionedGlyph, Scale};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Attempts at shrinking a glyph that does not fit its row
const MAX_SHRINK_STEPS: usize = 32;

/// An 8-bit single channel picture, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Sizes derived from the settings and the labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLayout {
    pub row_height: i32,
    pub glyph_height: i32,
    pub label_height: i32,
    pub padding_x: i32,
    pub padding_y: i32,
    pub max_rows: usize,
    pub columns: usize,
    pub buffer_width: usize,
    pub buffer_height: usize,
}

impl CardLayout {
    pub fn new(settings: &CardSettings, count: usize, max_label_chars: usize) -> Result<Self, GenError> {
        if settings.glyph_height == 0 || settings.max_rows == 0 {
            return Err(GenError::config_error(
                "card glyph height and max rows must be positive",
                "Set card.glyph_height and card.max_rows to values above zero",
            ));
        }
        let h = settings.glyph_height as f32;
        let row_height = settings.glyph_height as i32;
        let glyph_height = (h * 0.8) as i32;
        let label_height = (h * 0.5) as i32;
        let max_rows = settings.max_rows as usize;
        let columns = count.div_ceil(max_rows);
        let item_width = glyph_height as usize + max_label_chars * label_height as usize;
        Ok(CardLayout {
            row_height,
            glyph_height,
            label_height,
            padding_x: (h * 0.1) as i32,
            padding_y: 2,
            max_rows,
            columns,
            buffer_width: item_width * columns,
            buffer_height: row_height as usize * (max_rows + 2),
        })
    }
}

struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    fn blit(&mut self, glyph: &PositionedGlyph, row_top: i32) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            return;
        };
        let (width, height) = (self.width as i32, self.height as i32);
        let pixels = &mut self.pixels;
        glyph.draw(|x, y, v| {
            let px = bb.min.x + x as i32;
            let py = row_top + bb.min.y + y as i32;
            if px >= 0 && py >= 0 && px < width && py < height {
                let idx = py as usize * width as usize + px as usize;
                pixels[idx] = pixels[idx].max((v * 255.0).round() as u8);
            }
        });
    }
}

/// Glyph centered in a `row_height` square at `x`, shrunk until its box starts inside the row
fn place_glyph<'f>(font: &Font<'f>, c: char, height: f32, row_height: f32, x: f32) -> Option<PositionedGlyph<'f>> {
    let mut px = height;
    for _ in 0..MAX_SHRINK_STEPS {
        let scale = Scale::uniform(px);
        let v = font.v_metrics(scale);
        let glyph = font.glyph(c).scaled(scale);
        let advance = glyph.h_metrics().advance_width;
        let x_shift = row_height * 0.5 - advance * 0.5;
        let y_shift = row_height * 0.5 - (v.ascent - v.descent) * 0.5;
        let positioned = glyph.positioned(point(x + x_shift, v.ascent + y_shift));
        match positioned.pixel_bounding_box() {
            Some(bb) if bb.min.x < 0 || bb.min.y < 0 => px *= 0.9,
            _ => return Some(positioned),
        }
    }
    None
}

/// Draws every `label -> code point` pair, in label order
pub fn render_card(
    glyph_font: &Font,
    label_font: &Font,
    labels: &BTreeMap<String, u32>,
    settings: &CardSettings,
) -> Result<CardImage, GenError> {
    let max_label_chars = labels.keys().map(|l| l.chars().count()).max().unwrap_or(0);
    let layout = CardLayout::new(settings, labels.len(), max_label_chars)?;
    debug!("Card layout: {:?}", layout);

    let mut canvas = Canvas {
        width: layout.buffer_width,
        height: layout.buffer_height,
        pixels: vec![0; layout.buffer_width * layout.buffer_height],
    };

    let row_h = layout.row_height as f32;
    let label_scale = Scale::uniform(layout.label_height as f32);
    let label_ascent = label_font.v_metrics(label_scale).ascent;
    let label_y = label_ascent + row_h * 0.5 - layout.label_height as f32 * 0.5;

    let mut ypos = layout.padding_y;
    let mut column_offset = 0;
    let mut column_max_width = 0;
    let mut final_width = 0;
    let mut final_height = 0;
    let mut count_rows = 0;

    for (label, &code_point) in labels {
        let Some(c) = char::from_u32(code_point) else {
            warn!("Skipping {} on the card: U+{:04X} is not a character", label, code_point);
            continue;
        };
        let mut xpos = column_offset + layout.padding_x;

        if let Some(glyph) = place_glyph(glyph_font, c, layout.glyph_height as f32, row_h, xpos as f32) {
            canvas.blit(&glyph, ypos);
        }
        xpos += layout.row_height;

        let text = format!(" {}", label);
        let mut last_advance = 0.0;
        let mut end = xpos as f32;
        for glyph in label_font.layout(&text, label_scale, point(xpos as f32, label_y)) {
            canvas.blit(&glyph, ypos);
            last_advance = glyph.unpositioned().h_metrics().advance_width;
            end = glyph.position().x + last_advance;
        }
        xpos = end as i32 + last_advance as i32;

        count_rows += 1;
        ypos += layout.row_height;

        column_max_width = column_max_width.max(xpos - column_offset);
        final_width = final_width.max(xpos);
        final_height = final_height.max(ypos);

        if count_rows % layout.max_rows == 0 {
            ypos = layout.padding_y;
            column_offset += column_max_width + layout.padding_x;
            column_max_width = 0;
        }
    }

    if final_width <= 0 || final_height <= 0 {
        return Err(GenError::format_error(format!(
            "card has no drawable glyph, computed size {}x{}",
            final_width, final_height
        )));
    }

    let width = ((final_width + layout.padding_x) as usize).min(canvas.width);
    let height = (final_height as usize).min(canvas.height);
    let mut pixels = Vec::with_capacity(width * height);
    for row in canvas.pixels.chunks(canvas.width).take(height) {
        pixels.extend_from_slice(&row[..width]);
    }
    Ok(CardImage {
        width: width as u32,
        height: height as u32,
        pixels,
    })
}

fn png_error(e: png::EncodingError) -> GenError {
    GenError::format_error(format!("PNG encoding failed: {}", e))
}

/// Grayscale PNG bytes of `image`
pub fn encode_png(image: &CardImage) -> Result<Vec<u8>, GenError> {
    let mut bytes = Vec::new();
    let mut encoder = png::Encoder::new(&mut bytes, image.width, image.height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(png_error)?;
    writer.write_image_data(&image.pixels).map_err(png_error)?;
    writer.finish().map_err(png_error)?;
    Ok(bytes)
}

pub fn write_card_png(path: &Path, image: &CardImage) -> Result<(), GenError> {
    crate::write_output(path, &encode_png(image)?)
}

/// Loads a font for drawing
pub fn load_font(path: &Path) -> Result<Font<'static>, GenError> {
    let bytes = fs::read(path).map_err(|e| GenError::source_error(path, e.to_string()))?;
    Font::try_from_vec(bytes).ok_or_else(|| GenError::source_error(path, "the font cannot be rasterized"))
}

/// File name fragments of common sans-serif fonts, in order of preference
const LABEL_FONT_CANDIDATES: &[&str] = &[
    "dejavusans.",
    "liberationsans-regular",
    "arial.",
    "helvetica",
    "notosans-regular",
    "roboto-regular",
    "freesans.",
    "verdana.",
    "segoeui.",
];

/// Characters a label can hold once its identifier is sanitized
fn covers_labels(font: &Font) -> bool {
    ('A'..='Z')
        .chain('0'..='9')
        .chain(['_'])
        .all(|c| font.glyph(c).id().0 != 0)
}

/// rusttype reads single TTF/OTF files, not collections
fn is_single_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
}

/// Bytes of a system font able to draw labels, preferring the candidates list
fn find_system_label_font() -> Option<Vec<u8>> {
    let mut db = Database::new();
    db.load_system_fonts();

    let files: Vec<&Path> = db
        .faces()
        .filter_map(|face| match &face.source {
            fontdb::Source::File(p) => Some(p.as_path()),
            _ => None,
        })
        .filter(|p| is_single_font_file(p))
        .collect();
    let usable = |path: &Path| -> Option<Vec<u8>> {
        let bytes = fs::read(path).ok()?;
        let font = Font::try_from_bytes(&bytes)?;
        covers_labels(&font).then_some(bytes)
    };

    for candidate in LABEL_FONT_CANDIDATES {
        for path in &files {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_lowercase();
            if file_name.starts_with(candidate) {
                if let Some(bytes) = usable(*path) {
                    info!("Card labels use {}", path.display());
                    return Some(bytes);
                }
            }
        }
    }
    files.iter().find_map(|path| {
        let bytes = usable(*path)?;
        info!("Card labels use {}", path.display());
        Some(bytes)
    })
}

static SYSTEM_LABEL_FONT: Lazy<Option<Vec<u8>>> = Lazy::new(find_system_label_font);

/// A system font able to draw labels, looked up once per process
pub fn system_label_font() -> Option<Font<'static>> {
    SYSTEM_LABEL_FONT
        .as_ref()
        .and_then(|bytes| Font::try_from_vec(bytes.clone()))
}

/// Font of the labels: the configured one, else a system font, else the glyph font itself
pub fn label_font(settings: &CardSettings, glyph_font: &Font<'static>) -> Result<Font<'static>, GenError> {
    if let Some(path) = &settings.label_font {
        return load_font(path);
    }
    if let Some(font) = system_label_font() {
        return Ok(font);
    }
    if !covers_labels(glyph_font) {
        warn!("No system font found for the card labels, set card.label_font to draw them");
    }
    Ok(glyph_font.clone())
}
