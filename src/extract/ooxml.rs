//! Office Open XML readers (`.docx`, `.pptx`, `.xlsx`).
//!
//! Each package is opened with `zip` and the relevant parts are streamed
//! through `quick-xml`. Entry reads are bounded to guard against zip bombs.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{read_bytes, tabular, ExtractError, Extractor};

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum cells read from one worksheet.
const XLSX_MAX_CELLS: usize = 100_000;
/// Columns per sheet in Excel (`A` through `XFD`).
const XLSX_MAX_COLUMNS: usize = 16_384;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

fn has_entry(archive: &Archive<'_>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

/// Part names `{prefix}{N}.xml`, ordered by `N`.
fn numbered_parts(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix(prefix)?.strip_suffix(".xml")?.parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, name)| name).collect()
}

fn xml_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

// ============ docx ============

/// Paragraphs of `word/document.xml`, one per line.
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        docx_text(&read_bytes(path)?)
    }
}

pub fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    if !has_entry(&archive, "word/document.xml") {
        return Err(ExtractError::Ooxml("word/document.xml not found".to_string()));
    }
    let xml = read_entry_bounded(&mut archive, "word/document.xml")?;
    Ok(docx_paragraphs(&xml)?.join("\n"))
}

fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    // Text boxes nest paragraphs; only the outermost one is emitted.
    let mut depth = 0usize;
    let mut in_text = false;
    // `w:tab` inside `w:tabs` is a tab stop definition, not a tab character.
    let mut in_tab_stops = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => depth += 1,
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" if depth == 0 => paragraphs.push(String::new()),
                b"tab" if depth > 0 && !in_tab_stops => current.push('\t'),
                b"br" | b"cr" if depth > 0 => current.push('\n'),
                _ => {}
            },
            Event::Text(te) if in_text => {
                current.push_str(&te.unescape().map_err(xml_err)?);
            }
            Event::CData(cd) if in_text => {
                current.push_str(&String::from_utf8_lossy(&cd));
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

// ============ pptx ============

/// Text of every shape on every slide, slides in numeric order.
pub struct PptxExtractor;

impl Extractor for PptxExtractor {
    fn name(&self) -> &'static str {
        "pptx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        pptx_text(&read_bytes(path)?)
    }
}

pub fn pptx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut shapes = Vec::new();
    for name in numbered_parts(&archive, "ppt/slides/slide") {
        let xml = read_entry_bounded(&mut archive, &name)?;
        shapes.extend(slide_shapes(&xml)?);
    }
    Ok(shapes.join("\n"))
}

/// Text of each `p:sp` shape on a slide. Shapes without text are dropped.
fn slide_shapes(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut shapes = Vec::new();
    let mut shape_depth = 0usize;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sp" => shape_depth += 1,
                b"p" if shape_depth > 0 => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" if in_paragraph => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" if shape_depth > 0 => paragraphs.push(String::new()),
                b"br" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Event::Text(te) if in_text => {
                current.push_str(&te.unescape().map_err(xml_err)?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if in_paragraph => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                b"sp" if shape_depth > 0 => {
                    shape_depth -= 1;
                    if shape_depth == 0 {
                        let text = paragraphs.join("\n");
                        paragraphs.clear();
                        if !text.trim().is_empty() {
                            shapes.push(text);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(shapes)
}

// ============ xlsx ============

/// First worksheet rendered as a text table with its first row as header.
pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        xlsx_text(&read_bytes(path)?)
    }
}

pub fn xlsx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = if has_entry(&archive, "xl/sharedStrings.xml") {
        let xml = read_entry_bounded(&mut archive, "xl/sharedStrings.xml")?;
        shared_strings(&xml)?
    } else {
        Vec::new()
    };
    let sheet = first_sheet_part(&mut archive)?;
    let xml = read_entry_bounded(&mut archive, &sheet)?;
    let mut rows = sheet_rows(&xml, &shared)?;
    if rows.is_empty() {
        return Ok(String::new());
    }
    let header = rows.remove(0);
    Ok(tabular::render_table(&header, &rows))
}

/// Resolves the first `<sheet>` in `xl/workbook.xml` through the workbook
/// relationships, falling back to the lowest-numbered `sheetN.xml`.
fn first_sheet_part(archive: &mut Archive<'_>) -> Result<String, ExtractError> {
    if let Some(part) = first_sheet_from_workbook(archive)? {
        if has_entry(archive, &part) {
            return Ok(part);
        }
    }
    numbered_parts(archive, "xl/worksheets/sheet")
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::Ooxml("workbook has no worksheets".to_string()))
}

fn first_sheet_from_workbook(archive: &mut Archive<'_>) -> Result<Option<String>, ExtractError> {
    const RELS: &str = "xl/_rels/workbook.xml.rels";
    if !has_entry(archive, "xl/workbook.xml") || !has_entry(archive, RELS) {
        return Ok(None);
    }

    let workbook = read_entry_bounded(archive, "xl/workbook.xml")?;
    let mut reader = Reader::from_reader(workbook.as_slice());
    let mut buf = Vec::new();
    let mut rel_id = None;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                rel_id = attr(&e, b"id");
                break;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let Some(rel_id) = rel_id else {
        return Ok(None);
    };

    let rels = read_entry_bounded(archive, RELS)?;
    let mut reader = Reader::from_reader(rels.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id").as_deref() == Some(rel_id.as_str()) {
                    return Ok(attr(&e, b"Target").map(|target| resolve_target(&target)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(None)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// One string per `<si>`, rich-text runs concatenated.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_text = false;
    // Phonetic hints (`rPh`) are not part of the cell value.
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(te) if in_text => current.push_str(&te.unescape().map_err(xml_err)?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index of a cell reference such as `C7`.
///
/// `Ok(None)` when the reference has no column letters. Columns past `XFD`
/// are rejected.
fn column_index(reference: &str) -> Result<Option<usize>, ExtractError> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return Ok(None);
    }
    let too_wide = || ExtractError::Ooxml(format!("cell reference '{}' is out of range", reference));
    let mut n = 0usize;
    for b in letters {
        n = n
            .checked_mul(26)
            .and_then(|n| n.checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize))
            .filter(|n| *n <= XLSX_MAX_COLUMNS)
            .ok_or_else(too_wide)?;
    }
    Ok(Some(n - 1))
}

/// Column of a `<c>` element: its `r` attribute, or the one after the
/// previous cell.
fn cell_column(e: &BytesStart<'_>, next_column: usize) -> Result<usize, ExtractError> {
    let column = match attr(e, b"r") {
        Some(r) => column_index(&r)?.unwrap_or(next_column),
        None => next_column,
    };
    if column >= XLSX_MAX_COLUMNS {
        return Err(ExtractError::Ooxml(format!(
            "row has more than {} columns",
            XLSX_MAX_COLUMNS
        )));
    }
    Ok(column)
}

#[derive(Default)]
struct CellState {
    kind: Option<String>,
    column: usize,
    value: String,
    in_value: bool,
    in_inline: bool,
}

fn cell_text(state: &CellState, shared: &[String]) -> String {
    let raw = state.value.as_str();
    match state.kind.as_deref() {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        Some("b") => match raw.trim() {
            "1" => "TRUE".to_string(),
            "0" => "FALSE".to_string(),
            other => other.to_string(),
        },
        _ => raw.to_string(),
    }
}

/// Cell values by row, missing cells filled with empty strings.
fn sheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: HashMap<usize, String> = HashMap::new();
    let mut in_row = false;
    let mut cell: Option<CellState> = None;
    let mut next_column = 0usize;
    let mut cells_seen = 0usize;

    let finish_row = |row: &mut HashMap<usize, String>, rows: &mut Vec<Vec<String>>| {
        let width = row.keys().max().map(|m| m + 1).unwrap_or(0);
        let mut values = vec![String::new(); width];
        for (i, v) in row.drain() {
            values[i] = v;
        }
        rows.push(values);
    };

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    in_row = true;
                    next_column = 0;
                }
                b"c" if in_row => {
                    let column = cell_column(&e, next_column)?;
                    cell = Some(CellState {
                        kind: attr(&e, b"t"),
                        column,
                        ..CellState::default()
                    });
                }
                b"v" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = true;
                    }
                }
                b"is" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_inline = true;
                    }
                }
                b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = c.in_inline;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => rows.push(Vec::new()),
                b"c" if in_row => next_column = cell_column(&e, next_column)? + 1,
                _ => {}
            },
            Event::Text(te) => {
                if let Some(c) = cell.as_mut().filter(|c| c.in_value) {
                    c.value.push_str(&te.unescape().map_err(xml_err)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = false;
                    }
                }
                b"is" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_inline = false;
                    }
                }
                b"c" => {
                    if let Some(c) = cell.take() {
                        next_column = c.column + 1;
                        let text = cell_text(&c, shared);
                        if !text.is_empty() {
                            row.insert(c.column, text);
                        }
                        cells_seen += 1;
                        if cells_seen >= XLSX_MAX_CELLS {
                            break;
                        }
                    }
                }
                b"row" => {
                    in_row = false;
                    finish_row(&mut row, &mut rows);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if in_row {
        finish_row(&mut row, &mut rows);
    }

    // Trailing rows without values carry no data.
    while rows.last().is_some_and(|r| r.iter().all(|v| v.is_empty())) {
        rows.pop();
    }
    Ok(rows)
}
