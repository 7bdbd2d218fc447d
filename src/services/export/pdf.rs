// Standard Helvetica faces only: nothing is embedded, text is WinAnsi.

use super::layout::{Align, Document, DrawOp, FontStyle, Page, Rgb, PAGE_HEIGHT, PAGE_WIDTH};
use crate::core::error::ExportError;
use crate::utils::text::{text_width_mm, PT_TO_MM};
use log::warn;
use std::io::Write;

const FONTS: [(&str, &str); 3] = [
    ("F1", "Helvetica"),
    ("F2", "Helvetica-Bold"),
    ("F3", "Helvetica-Oblique"),
];

fn font_name(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "F1",
        FontStyle::Bold => "F2",
        FontStyle::Italic => "F3",
    }
}

fn pt(mm: f32) -> f32 {
    mm / PT_TO_MM
}

fn color(c: Rgb) -> String {
    format!(
        "{:.3} {:.3} {:.3}",
        c.0 as f32 / 255.0,
        c.1 as f32 / 255.0,
        c.2 as f32 / 255.0
    )
}

fn winansi(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\t' => b' ',
        '\u{2026}' => 0x85,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        _ => b'?',
    }
}

fn is_unmappable(c: char) -> bool {
    c != '?' && winansi(c) == b'?'
}

/// Characters in `doc` that the standard fonts cannot show.
pub fn unmappable_chars(doc: &Document) -> usize {
    let count = |text: &str| text.chars().filter(|c| is_unmappable(*c)).count();
    count(&doc.title)
        + doc
            .pages
            .iter()
            .flat_map(|page| page.texts())
            .map(|(text, _)| count(text))
            .sum::<usize>()
}

/// Encodes `text` as a PDF literal string body.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match winansi(c) {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b @ 0x20..=0x7E => out.push(b as char),
            b => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

fn content_stream(page: &Page) -> String {
    let mut s = String::new();
    for op in &page.ops {
        match op {
            DrawOp::FillRect { x, y, w, h, color: c } => {
                s.push_str(&format!(
                    "{} rg {:.2} {:.2} {:.2} {:.2} re f\n",
                    color(*c),
                    pt(*x),
                    pt(PAGE_HEIGHT - y - h),
                    pt(*w),
                    pt(*h)
                ));
            }
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color: c,
            } => {
                s.push_str(&format!(
                    "{} RG {:.2} w {:.2} {:.2} m {:.2} {:.2} l S\n",
                    color(*c),
                    pt(*width),
                    pt(*x1),
                    pt(PAGE_HEIGHT - y1),
                    pt(*x2),
                    pt(PAGE_HEIGHT - y2)
                ));
            }
            DrawOp::Text {
                x,
                y,
                size,
                style,
                color: c,
                align,
                text,
            } => {
                let width = text_width_mm(text, *size);
                let left = match align {
                    Align::Left => *x,
                    Align::Center => x - width / 2.0,
                    Align::Right => x - width,
                };
                s.push_str(&format!(
                    "BT /{} {:.1} Tf {} rg {:.2} {:.2} Td ({}) Tj ET\n",
                    font_name(*style),
                    size,
                    color(*c),
                    pt(left),
                    pt(PAGE_HEIGHT - y),
                    escape_text(text)
                ));
            }
        }
    }
    s
}

struct Writer {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl Writer {
    fn object(&mut self, id: usize, body: &str) -> std::io::Result<()> {
        self.offsets[id - 1] = self.buf.len();
        write!(self.buf, "{} 0 obj\n{}\nendobj\n", id, body)
    }
}

/// Serializes `doc` into PDF bytes.
pub fn encode(doc: &Document) -> Result<Vec<u8>, ExportError> {
    if doc.pages.is_empty() {
        return Err(ExportError::Empty("document has no pages"));
    }
    let replaced = unmappable_chars(doc);
    if replaced > 0 {
        warn!(
            "\"{}\": {} character(s) have no glyph in the PDF fonts and were written as '?'",
            doc.title, replaced
        );
    }
    write_pdf(doc).map_err(|e| ExportError::Encode(e.to_string()))
}

fn write_pdf(doc: &Document) -> std::io::Result<Vec<u8>> {
    // 1 catalog, 2 page tree, 3..=5 fonts, 6 info, then a page and its
    // content stream per page
    let first_page = 7;
    let count = 6 + doc.pages.len() * 2;
    let mut w = Writer {
        buf: Vec::new(),
        offsets: vec![0; count],
    };
    w.buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    w.object(1, "<< /Type /Catalog /Pages 2 0 R >>")?;

    let kids: Vec<String> = (0..doc.pages.len())
        .map(|i| format!("{} 0 R", first_page + i * 2))
        .collect();
    w.object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            doc.pages.len()
        ),
    )?;

    for (i, (_, base)) in FONTS.iter().enumerate() {
        w.object(
            3 + i,
            &format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                base
            ),
        )?;
    }
    w.object(
        6,
        &format!(
            "<< /Title ({}) /Producer (storyforge) >>",
            escape_text(&doc.title)
        ),
    )?;

    let font_refs: Vec<String> = FONTS
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("/{} {} 0 R", name, 3 + i))
        .collect();
    let resources = format!("<< /Font << {} >> >>", font_refs.join(" "));

    for (i, page) in doc.pages.iter().enumerate() {
        let page_id = first_page + i * 2;
        let content_id = page_id + 1;
        w.object(
            page_id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] /Resources {} /Contents {} 0 R >>",
                pt(PAGE_WIDTH),
                pt(PAGE_HEIGHT),
                resources,
                content_id
            ),
        )?;
        let stream = content_stream(page);
        w.object(
            content_id,
            &format!(
                "<< /Length {} >>\nstream\n{}endstream",
                stream.len(),
                stream
            ),
        )?;
    }

    let xref_at = w.buf.len();
    write!(w.buf, "xref\n0 {}\n0000000000 65535 f \n", count + 1)?;
    for offset in &w.offsets {
        write!(w.buf, "{:010} 00000 n \n", offset)?;
    }
    write!(
        w.buf,
        "trailer\n<< /Size {} /Root 1 0 R /Info 6 0 R >>\nstartxref\n{}\n%%EOF\n",
        count + 1,
        xref_at
    )?;
    Ok(w.buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::export::layout::{episode_document, LayoutOptions};
    use crate::core::state::{Episode, StoryBible};

    fn sample() -> Document {
        let bible = StoryBible {
            title: "The Keeper's Light".to_string(),
            ..Default::default()
        };
        let episode = Episode {
            number: 1,
            title: "Fog (Part 1)".to_string(),
            content: "Intro paragraph.\n\nJohn: \u{201C}Hello there.\u{201D}".to_string(),
            scenes: vec![],
        };
        episode_document(
            &bible,
            &episode,
            &LayoutOptions {
                generated_on: "October 19, 2026".to_string(),
            },
        )
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text(r"a\b (c)"), r"a\\b \(c\)");
        assert_eq!(escape_text("\u{201C}Hi\u{201D}"), "\\223Hi\\224");
        assert_eq!(escape_text("caf\u{e9} \u{65e5}"), "caf\\351 ?");
    }

    #[test]
    fn test_unmappable_chars_are_counted() {
        assert_eq!(unmappable_chars(&sample()), 0);

        let mut doc = sample();
        doc.title = "\u{5149} light?".to_string();
        if let Some(DrawOp::Text { text, .. }) = doc.pages[1]
            .ops
            .iter_mut()
            .find(|op| matches!(op, DrawOp::Text { .. }))
        {
            *text = "\u{1F600}\u{65e5} caf\u{e9}".to_string();
        }
        assert_eq!(unmappable_chars(&doc), 3);
        // still encodes, with placeholders
        assert!(encode(&doc).is_ok());
    }

    #[test]
    fn test_encoded_document_structure() {
        let doc = sample();
        let bytes = encode(&doc).unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.ends_with("%%EOF\n"));
        assert_eq!(text.matches("/Type /Page ").count(), doc.pages.len());
        assert!(text.contains("/BaseFont /Helvetica-Oblique"));
        assert!(text.contains("(Episode 1: Fog \\(Part 1\\)) Tj"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = encode(&sample()).unwrap();
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let startxref = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let xref_at: usize = text[startxref..].lines().next().unwrap().parse().unwrap();
        assert!(bytes[xref_at..].starts_with(b"xref"));

        let table = String::from_utf8_lossy(&bytes[xref_at..]).into_owned();
        let entries: Vec<usize> = table
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (i, offset) in entries.iter().enumerate() {
            let header = format!("{} 0 obj", i + 1);
            assert!(bytes[*offset..].starts_with(header.as_bytes()), "bad offset for {}", header);
        }
    }

    #[test]
    fn test_empty_document_rejected() {
        let doc = Document {
            title: String::new(),
            pages: vec![],
        };
        assert!(matches!(encode(&doc), Err(ExportError::Empty(_))));
    }
}
