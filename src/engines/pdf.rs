//! Plain-text PDF renderer built on `lopdf`.
//!
//! Fixed A4 layout: 10 mm left/right/top margins, 15 mm bottom page-break
//! margin, Helvetica 12 pt on a 10 mm line pitch. Each input line becomes one
//! word-wrapped block; a page break is inserted whenever the next line would
//! cross the bottom margin. The standard-14 Helvetica font with WinAnsi
//! encoding needs no embedding, so characters outside Latin-1 are replaced
//! with `?`.

use super::{DocumentRenderer, EngineResult};
use crate::error::EngineError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

const MM: f32 = 72.0 / 25.4;
const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const SIDE_MARGIN: f32 = 10.0 * MM;
const TOP_MARGIN: f32 = 10.0 * MM;
const BREAK_MARGIN: f32 = 15.0 * MM;
const LINE_HEIGHT: f32 = 10.0 * MM;
const FONT_SIZE: f32 = 12.0;
/// Mean Helvetica advance width, in em, used for wrapping.
const AVG_CHAR_WIDTH_EM: f32 = 0.5;

/// [`DocumentRenderer`] producing a simple paginated PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextRenderer;

impl DocumentRenderer for PdfTextRenderer {
    fn render(&self, text: &str) -> EngineResult<Vec<u8>> {
        let pages = paginate(&layout_lines(text));
        let bytes = write_pdf(&pages).map_err(|e| EngineError::new(e.to_string()))?;
        debug!("Rendered {} PDF pages, {} bytes", pages.len(), bytes.len());
        Ok(bytes)
    }
}

/// Characters that fit on one line of the text area.
fn chars_per_line() -> usize {
    let usable = PAGE_WIDTH - 2.0 * SIDE_MARGIN;
    (usable / (FONT_SIZE * AVG_CHAR_WIDTH_EM)).floor() as usize
}

/// Wrap every input line to the text width. Blank input lines are kept as
/// blank output lines so paragraph spacing survives.
fn layout_lines(text: &str) -> Vec<String> {
    let width = chars_per_line();
    let source: Vec<&str> = if text.lines().next().is_none() {
        vec![text]
    } else {
        text.lines().collect()
    };

    let mut out = Vec::new();
    for line in source {
        let wrapped = wrap_line(line, width);
        if wrapped.is_empty() {
            out.push(String::new());
        } else {
            out.extend(wrapped);
        }
    }
    out
}

/// Greedy word wrap; words longer than `width` are split hard.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                rows.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            rows.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width && current_len > 0 {
            rows.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 {
        rows.push(current);
    }
    rows
}

/// Split rows into pages honouring the bottom break margin.
fn paginate(rows: &[String]) -> Vec<Vec<String>> {
    let usable = PAGE_HEIGHT - TOP_MARGIN - BREAK_MARGIN;
    let per_page = ((usable / LINE_HEIGHT).floor() as usize).max(1);
    let mut pages: Vec<Vec<String>> = rows.chunks(per_page).map(|c| c.to_vec()).collect();
    if pages.is_empty() {
        pages.push(Vec::new());
    }
    pages
}

/// Latin-1 bytes for the WinAnsi-encoded standard font.
fn to_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match u32::from(c) {
            0x09 => b' ',
            code @ 0x20..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}

fn page_content(rows: &[String]) -> Content {
    let mut operations = Vec::with_capacity(rows.len() * 5);
    // Baseline sits in the middle of the 10 mm cell, like a text cell.
    let first_baseline = PAGE_HEIGHT - TOP_MARGIN - (LINE_HEIGHT + FONT_SIZE * 0.7) / 2.0;

    for (i, row) in rows.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let y = first_baseline - i as f32 * LINE_HEIGHT;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
        operations.push(Operation::new("Td", vec![SIDE_MARGIN.into(), y.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(to_latin1(row))]));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

fn write_pdf(pages: &[Vec<String>]) -> lopdf::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for rows in pages {
        let content = page_content(rows);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let media_box: Vec<Object> = vec![
        Object::Integer(0),
        Object::Integer(0),
        PAGE_WIDTH.into(),
        PAGE_HEIGHT.into(),
    ];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => media_box,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}
