//! PDF report emitter.
//!
//! Generated text is laid out on A4 pages in 12 pt Helvetica: one wrapped
//! paragraph per input line, 8 mm line height, 10 mm left/top/right margins
//! and an automatic page break 15 mm above the bottom edge. Layout is a pure
//! function ([`layout`]); [`render_pdf`] serializes it with `lopdf` and
//! replaces the output file atomically.
//!
//! Text is encoded as WinAnsi. Characters without a WinAnsi code point are
//! written as `?`.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use thiserror::Error;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
pub const MARGIN_MM: f64 = 10.0;
pub const BOTTOM_MARGIN_MM: f64 = 15.0;
pub const LINE_HEIGHT_MM: f64 = 8.0;
pub const FONT_SIZE_PT: f64 = 12.0;
/// Horizontal padding inside a text cell.
const CELL_MARGIN_MM: f64 = 1.0;
const PT_PER_MM: f64 = 72.0 / 25.4;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF encoding failed: {0}")]
    Encode(#[from] lopdf::Error),
}

/// One line of text positioned on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    /// Left edge of the glyphs, from the page's left edge.
    pub x_mm: f64,
    /// Baseline, from the page's top edge.
    pub baseline_mm: f64,
    /// WinAnsi-encoded text.
    pub text: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

// Helvetica advance widths (1/1000 em) for WinAnsi codes 32..=255.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 224] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350,
    556, 750, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 750, 611, 750,
    750, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 750, 500, 667,
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

fn glyph_width(byte: u8) -> u32 {
    match byte {
        32..=255 => HELVETICA_WIDTHS[(byte - 32) as usize] as u32,
        _ => 0,
    }
}

/// Maps a character to its WinAnsi byte, or `?`.
pub fn winansi_byte(c: char) -> u8 {
    let code = c as u32;
    match code {
        0x20..=0x7e | 0xa0..=0xff => code as u8,
        _ => match c {
            '\t' => b' ',
            '\u{20ac}' => 0x80,
            '\u{201a}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201e}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02c6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8a,
            '\u{2039}' => 0x8b,
            '\u{0152}' => 0x8c,
            '\u{017d}' => 0x8e,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02dc}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9a,
            '\u{203a}' => 0x9b,
            '\u{0153}' => 0x9c,
            '\u{017e}' => 0x9e,
            '\u{0178}' => 0x9f,
            _ => b'?',
        },
    }
}

pub fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars().filter(|c| *c != '\r').map(winansi_byte).collect()
}

/// Splits one paragraph into lines no wider than `max_units`
/// (thousandths of the font size).
///
/// Lines break after the last space that fits; a word longer than a whole
/// line is broken between characters. The space at a break is dropped.
fn wrap_paragraph(text: &[u8], max_units: u32) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut sep: Option<usize> = None;
    let mut width = 0u32;

    while i < text.len() {
        let c = text[i];
        if c == b' ' {
            sep = Some(i);
        }
        width += glyph_width(c);
        if width > max_units {
            match sep {
                Some(s) => {
                    lines.push(text[start..s].to_vec());
                    i = s + 1;
                }
                None => {
                    if i == start {
                        i += 1;
                    }
                    lines.push(text[start..i].to_vec());
                }
            }
            start = i;
            sep = None;
            width = 0;
        } else {
            i += 1;
        }
    }
    if start < text.len() || lines.is_empty() {
        lines.push(text[start..].to_vec());
    }
    lines
}

/// Lays `text` out on pages. Always returns at least one page.
pub fn layout(text: &str) -> Vec<Page> {
    let font_size_mm = FONT_SIZE_PT / PT_PER_MM;
    let text_width_mm = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - 2.0 * CELL_MARGIN_MM;
    let max_units = (text_width_mm * 1000.0 / font_size_mm) as u32;
    let break_at = PAGE_HEIGHT_MM - BOTTOM_MARGIN_MM;

    let mut pages = vec![Page::default()];
    let mut y = MARGIN_MM;

    for paragraph in text.split('\n') {
        for line in wrap_paragraph(&encode_winansi(paragraph), max_units) {
            if y + LINE_HEIGHT_MM > break_at {
                pages.push(Page::default());
                y = MARGIN_MM;
            }
            if !line.is_empty() {
                let baseline_mm = y + 0.5 * LINE_HEIGHT_MM + 0.3 * font_size_mm;
                if let Some(page) = pages.last_mut() {
                    page.lines.push(PlacedLine {
                        x_mm: MARGIN_MM + CELL_MARGIN_MM,
                        baseline_mm,
                        text: line,
                    });
                }
            }
            y += LINE_HEIGHT_MM;
        }
    }
    pages
}

fn page_content(page: &Page) -> Content {
    let mut operations = Vec::with_capacity(page.lines.len() * 5);
    for line in &page.lines {
        let x = (line.x_mm * PT_PER_MM) as f32;
        let y = ((PAGE_HEIGHT_MM - line.baseline_mm) * PT_PER_MM) as f32;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), (FONT_SIZE_PT as i64).into()]));
        operations.push(Operation::new("Td", vec![x.into(), y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(line.text.clone(), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

/// Builds the PDF document for laid-out pages.
pub fn build_document(pages: &[Page]) -> Result<Document, ReportError> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let media_box: Vec<Object> = vec![
        0.into(),
        0.into(),
        ((PAGE_WIDTH_MM * PT_PER_MM) as f32).into(),
        ((PAGE_HEIGHT_MM * PT_PER_MM) as f32).into(),
    ];

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let content = page_content(page);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => media_box.clone(),
        });
        kids.push(Object::from(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

/// Renders `text` to a PDF at `path`, replacing any existing file.
///
/// The document is written to a sibling temporary file and renamed into
/// place, so readers never observe a partial report.
pub fn render_pdf(text: &str, path: &Path) -> Result<PathBuf, ReportError> {
    let pages = layout(text);
    let mut doc = build_document(&pages)?;

    let io_err = |source: std::io::Error| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let written = doc.save(&tmp).map(drop).and_then(|_| std::fs::rename(&tmp, path));
    if let Err(source) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(source));
    }

    tracing::info!(path = %path.display(), pages = pages.len(), "report written");
    Ok(path.to_path_buf())
}
