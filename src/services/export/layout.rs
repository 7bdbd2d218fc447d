use crate::core::error::ExportError;
use crate::core::state::{Episode, StoryBible};
use crate::services::bible::{blocks, BibleTab, Block};
use crate::utils::text::{text_width_mm, wrap_text, PT_TO_MM};
use once_cell::sync::Lazy;
use regex::Regex;

// Millimetres on A4, origin top-left, text y is the baseline.
pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 20.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - MARGIN;

pub const LINE_HEIGHT: f32 = 6.0;
pub const PARAGRAPH_GAP: f32 = 8.0;
const FIELD_GAP: f32 = 3.0;
const TOC_ROW: f32 = 8.0;
const TOC_FIRST_ROW: f32 = MARGIN + 15.0;

const INK: Rgb = Rgb(60, 60, 60);
const BODY_INK: Rgb = Rgb(80, 80, 80);
const SOFT_INK: Rgb = Rgb(100, 100, 100);
const FAINT_INK: Rgb = Rgb(120, 120, 120);
const FOOTER_INK: Rgb = Rgb(150, 150, 150);
const RULE: Rgb = Rgb(200, 200, 200);
const PAPER: Rgb = Rgb(245, 245, 245);
const GREEN: Rgb = Rgb(76, 175, 80);
const ORANGE: Rgb = Rgb(255, 152, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        style: FontStyle,
        color: Rgb,
        align: Align,
        text: String,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Rgb,
    },
    FillRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    fn text(&mut self, x: f32, y: f32, style: TextStyle, align: Align, text: impl Into<String>) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            size: style.size,
            style: style.font,
            color: style.color,
            align,
            text: text.into(),
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgb) {
        self.ops.push(DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
        });
    }

    fn fill(&mut self, color: Rgb) {
        self.ops.push(DrawOp::FillRect {
            x: 0.0,
            y: 0.0,
            w: PAGE_WIDTH,
            h: PAGE_HEIGHT,
            color,
        });
    }

    /// Text runs on this page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, FontStyle)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, style, .. } => Some((text.as_str(), *style)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size: f32,
    font: FontStyle,
    color: Rgb,
}

impl TextStyle {
    const fn new(size: f32, font: FontStyle, color: Rgb) -> Self {
        Self { size, font, color }
    }

    fn line_height(self) -> f32 {
        self.size * PT_TO_MM * 1.3
    }
}

const BODY: TextStyle = TextStyle::new(11.0, FontStyle::Regular, BODY_INK);
const DIALOGUE: TextStyle = TextStyle::new(11.0, FontStyle::Italic, BODY_INK);
const BLOCK_HEADING: TextStyle = TextStyle::new(13.0, FontStyle::Bold, INK);
const ENTRY_TITLE: TextStyle = TextStyle::new(11.0, FontStyle::Bold, INK);
const FOOTER: TextStyle = TextStyle::new(8.0, FontStyle::Regular, FOOTER_INK);

#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Shown on title pages as "Generated on ...".
    pub generated_on: String,
}

// --- Paragraph helpers ---

static DIALOGUE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[A-Za-z\s]+\s*:\s*["“]"#).expect("valid regex"));
static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));

/// A paragraph is dialogue when it opens with `Name:` and a quotation mark.
pub fn is_dialogue(paragraph: &str) -> bool {
    DIALOGUE_LINE.is_match(paragraph)
}

/// Splits body text on blank lines, dropping empty paragraphs.
pub fn split_paragraphs(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n");
    BLANK_LINE
        .split(&normalized)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn paragraph_height(line_count: usize) -> f32 {
    line_count as f32 * LINE_HEIGHT
}

// --- Flowing text across pages ---

struct Flow {
    pages: Vec<Page>,
    y: f32,
}

impl Flow {
    fn new() -> Self {
        let mut flow = Self {
            pages: Vec::new(),
            y: MARGIN,
        };
        flow.new_page();
        flow
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = MARGIN;
    }

    fn page(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn at_top(&self) -> bool {
        self.y <= MARGIN
    }

    fn fits(&self, height: f32) -> bool {
        self.y + height <= CONTENT_BOTTOM
    }

    // A block that does not fit moves to a fresh page; one taller than a
    // page is split line by line.
    fn lines(&mut self, lines: &[String], style: TextStyle, x: f32, gap_after: f32) {
        let height = paragraph_height(lines.len());
        if !self.fits(height) && !self.at_top() {
            self.new_page();
        }
        for line in lines {
            if !self.fits(LINE_HEIGHT) && !self.at_top() {
                self.new_page();
            }
            let y = self.y;
            self.page().text(x, y, style, Align::Left, line.as_str());
            self.y += LINE_HEIGHT;
        }
        self.y += gap_after;
    }

    fn paragraph(&mut self, text: &str, style: TextStyle, gap_after: f32) {
        let lines = wrap_text(text, CONTENT_WIDTH, style.size);
        self.lines(&lines, style, MARGIN, gap_after);
    }

    fn heading(&mut self, text: &str) {
        let lines = wrap_text(text, CONTENT_WIDTH, BLOCK_HEADING.size);
        // keep a heading together with the first line that follows it
        if !self.fits(paragraph_height(lines.len() + 1)) && !self.at_top() {
            self.new_page();
        }
        self.y += 2.0;
        self.lines(&lines, BLOCK_HEADING, MARGIN, 1.0);
    }

    fn finish(self) -> Vec<Page> {
        self.pages
    }
}

fn centered(page: &mut Page, text: &str, y: f32, style: TextStyle) -> f32 {
    let mut y = y;
    for line in wrap_text(text, CONTENT_WIDTH, style.size) {
        page.text(PAGE_WIDTH / 2.0, y, style, Align::Center, line);
        y += style.line_height();
    }
    y
}

fn decorated_title_page(accent: Rgb) -> Page {
    let mut page = Page::default();
    page.fill(PAPER);
    page.line(MARGIN, 30.0, PAGE_WIDTH - MARGIN, 30.0, 1.5, accent);
    page.line(
        MARGIN,
        PAGE_HEIGHT - 30.0,
        PAGE_WIDTH - MARGIN,
        PAGE_HEIGHT - 30.0,
        1.5,
        accent,
    );
    page
}

fn generated_on(page: &mut Page, options: &LayoutOptions, y: f32) {
    let style = TextStyle::new(10.0, FontStyle::Regular, FAINT_INK);
    page.text(
        PAGE_WIDTH / 2.0,
        y,
        style,
        Align::Center,
        format!("Generated on {}", options.generated_on),
    );
}

fn display_title(bible: &StoryBible) -> &str {
    if bible.title.trim().is_empty() {
        "Untitled Story"
    } else {
        &bible.title
    }
}

pub fn episode_heading(episode: &Episode) -> String {
    format!("Episode {}: {}", episode.number, episode.title)
}

/// Adds "Page N of M" to every page after the first `skip` pages.
fn add_footers(pages: &mut [Page], skip: usize) {
    let total = pages.len();
    for (i, page) in pages.iter_mut().enumerate().skip(skip) {
        page.text(
            PAGE_WIDTH - MARGIN,
            PAGE_HEIGHT - 10.0,
            FOOTER,
            Align::Right,
            format!("Page {} of {}", i + 1, total),
        );
    }
}

// --- Story bible ---

pub fn story_bible_document(bible: &StoryBible, options: &LayoutOptions) -> Document {
    let title = display_title(bible);

    let mut cover = Page::default();
    let mut y = centered(&mut cover, title, 40.0, TextStyle::new(24.0, FontStyle::Bold, INK));
    if !bible.tagline.trim().is_empty() {
        y = centered(
            &mut cover,
            &bible.tagline,
            y.max(50.0),
            TextStyle::new(12.0, FontStyle::Regular, SOFT_INK),
        );
    }
    centered(
        &mut cover,
        "STORY BIBLE",
        (y + 10.0).max(70.0),
        TextStyle::new(14.0, FontStyle::Bold, BODY_INK),
    );
    generated_on(&mut cover, options, PAGE_HEIGHT - 20.0);

    let mut pages = vec![cover];
    for tab in BibleTab::ALL {
        pages.extend(section_pages(bible, *tab));
    }
    add_footers(&mut pages, 1);

    Document {
        title: format!("{} - Story Bible", title),
        pages,
    }
}

fn section_pages(bible: &StoryBible, tab: BibleTab) -> Vec<Page> {
    let mut flow = Flow::new();
    let section_style = TextStyle::new(16.0, FontStyle::Bold, INK);
    flow.page().text(MARGIN, MARGIN + 5.0, section_style, Align::Left, tab.title());
    flow.page().line(
        MARGIN,
        MARGIN + 8.0,
        MARGIN + 40.0,
        MARGIN + 8.0,
        0.5,
        Rgb(80, 175, 80),
    );
    flow.y = MARGIN + 18.0;

    for block in blocks(bible, tab) {
        match block {
            Block::Heading(text) => flow.heading(&text),
            Block::Paragraph(text) => flow.paragraph(&text, BODY, PARAGRAPH_GAP),
            Block::Field { label, value } => {
                flow.paragraph(&format!("{}: {}", label, value), BODY, FIELD_GAP)
            }
            Block::Entry { title, body } => {
                flow.paragraph(&title, ENTRY_TITLE, 0.0);
                if !body.trim().is_empty() {
                    flow.paragraph(&body, BODY, FIELD_GAP);
                }
                flow.y += PARAGRAPH_GAP - FIELD_GAP;
            }
        }
    }
    flow.finish()
}

// --- Episodes ---

fn episode_body_pages(episode: &Episode) -> Vec<Page> {
    let mut flow = Flow::new();
    let heading_style = TextStyle::new(18.0, FontStyle::Bold, INK);
    let heading = wrap_text(&episode_heading(episode), CONTENT_WIDTH, heading_style.size);
    let mut y = MARGIN + 10.0;
    for line in &heading {
        flow.page().text(MARGIN, y, heading_style, Align::Left, line.as_str());
        y += heading_style.line_height();
    }
    let rule_y = y - heading_style.line_height() + 5.0;
    flow.page()
        .line(MARGIN, rule_y, PAGE_WIDTH - MARGIN, rule_y, 0.5, RULE);
    flow.y = rule_y + 10.0;

    for paragraph in split_paragraphs(&episode.content) {
        let style = if is_dialogue(&paragraph) { DIALOGUE } else { BODY };
        flow.paragraph(&paragraph, style, PARAGRAPH_GAP);
    }
    flow.finish()
}

pub fn episode_document(
    bible: &StoryBible,
    episode: &Episode,
    options: &LayoutOptions,
) -> Document {
    let story_title = display_title(bible);

    let mut cover = decorated_title_page(GREEN);
    let y = centered(&mut cover, story_title, 50.0, TextStyle::new(24.0, FontStyle::Bold, INK));
    let y = centered(
        &mut cover,
        &episode_heading(episode),
        y.max(70.0),
        TextStyle::new(16.0, FontStyle::Regular, BODY_INK),
    );
    if !bible.tagline.trim().is_empty() {
        centered(
            &mut cover,
            &bible.tagline,
            (y + 5.0).max(85.0),
            TextStyle::new(12.0, FontStyle::Regular, SOFT_INK),
        );
    }
    generated_on(&mut cover, options, PAGE_HEIGHT - 40.0);

    let mut pages = vec![cover];
    pages.extend(episode_body_pages(episode));
    add_footers(&mut pages, 1);

    Document {
        title: format!("{} - {}", story_title, episode_heading(episode)),
        pages,
    }
}

fn toc_rows_per_page() -> usize {
    ((CONTENT_BOTTOM - TOC_FIRST_ROW) / TOC_ROW) as usize + 1
}

// First page of each episode, counting from 1.
pub fn toc_page_numbers(body_page_counts: &[usize]) -> Vec<usize> {
    let toc_pages = body_page_counts.len().div_ceil(toc_rows_per_page()).max(1);
    let mut next = 1 + toc_pages + 1;
    body_page_counts
        .iter()
        .map(|count| {
            let start = next;
            next += count;
            start
        })
        .collect()
}

fn truncate_to_width(text: &str, max_width: f32, size: f32) -> String {
    if text_width_mm(text, size) <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        out.push(c);
        if text_width_mm(&format!("{}...", out), size) > max_width {
            out.pop();
            break;
        }
    }
    format!("{}...", out.trim_end())
}

fn toc_pages(episodes: &[Episode], starts: &[usize]) -> Vec<Page> {
    let entry_style = TextStyle::new(12.0, FontStyle::Regular, INK);
    let number_style = TextStyle::new(10.0, FontStyle::Regular, FAINT_INK);
    let heading_style = TextStyle::new(20.0, FontStyle::Bold, INK);

    let mut pages = Vec::new();
    for (chunk_index, chunk) in episodes
        .iter()
        .zip(starts)
        .collect::<Vec<_>>()
        .chunks(toc_rows_per_page())
        .enumerate()
    {
        let mut page = Page::default();
        let heading = if chunk_index == 0 {
            "Table of Contents"
        } else {
            "Table of Contents (continued)"
        };
        page.text(PAGE_WIDTH / 2.0, MARGIN, heading_style, Align::Center, heading);
        page.line(MARGIN, MARGIN + 5.0, PAGE_WIDTH - MARGIN, MARGIN + 5.0, 0.5, RULE);

        let mut y = TOC_FIRST_ROW;
        for (episode, start) in chunk {
            let label = truncate_to_width(&episode_heading(episode), CONTENT_WIDTH - 25.0, entry_style.size);
            page.text(MARGIN, y, entry_style, Align::Left, label);
            page.text(
                PAGE_WIDTH - MARGIN,
                y,
                number_style,
                Align::Right,
                format!("Page {}", start),
            );
            y += TOC_ROW;
        }
        pages.push(page);
    }
    if pages.is_empty() {
        pages.push(Page::default());
    }
    pages
}

pub fn complete_story_document(
    bible: &StoryBible,
    episodes: &[Episode],
    options: &LayoutOptions,
) -> Result<Document, ExportError> {
    if episodes.is_empty() {
        return Err(ExportError::Empty(
            "No episodes to download. Generate at least one episode first.",
        ));
    }
    let story_title = display_title(bible);

    let mut cover = decorated_title_page(ORANGE);
    let y = centered(&mut cover, story_title, 50.0, TextStyle::new(28.0, FontStyle::Bold, INK));
    let y = centered(
        &mut cover,
        "Complete Story",
        y.max(70.0),
        TextStyle::new(18.0, FontStyle::Regular, BODY_INK),
    );
    let y = if bible.tagline.trim().is_empty() {
        y
    } else {
        centered(
            &mut cover,
            &bible.tagline,
            (y + 5.0).max(85.0),
            TextStyle::new(12.0, FontStyle::Regular, SOFT_INK),
        )
    };
    let count_label = if episodes.len() == 1 {
        "1 Episode".to_string()
    } else {
        format!("{} Episodes", episodes.len())
    };
    centered(
        &mut cover,
        &count_label,
        (y + 5.0).max(100.0),
        TextStyle::new(14.0, FontStyle::Regular, Rgb(90, 90, 90)),
    );
    generated_on(&mut cover, options, PAGE_HEIGHT - 40.0);

    // Lay the bodies out first so the contents can point at real pages.
    let bodies: Vec<Vec<Page>> = episodes.iter().map(episode_body_pages).collect();
    let counts: Vec<usize> = bodies.iter().map(Vec::len).collect();
    let starts = toc_page_numbers(&counts);

    let mut pages = vec![cover];
    pages.extend(toc_pages(episodes, &starts));
    if pages.len() != starts[0] - 1 {
        return Err(ExportError::Layout(format!(
            "contents expected {} front pages, laid out {}",
            starts[0] - 1,
            pages.len()
        )));
    }
    for body in bodies {
        pages.extend(body);
    }
    add_footers(&mut pages, 1);

    Ok(Document {
        title: format!("{} - Complete Story", story_title),
        pages,
    })
}
