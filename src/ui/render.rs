use crate::core::session::Step;
use crate::core::state::{Episode, Perspective, StoryBible};
use crate::services::bible::{blocks, BibleTab, Block};
use crate::services::export::layout::{episode_heading, split_paragraphs};

/// "[x] [x] [>] [ ] [ ]  Step 3: Customize Story"
pub fn step_header(step: Step) -> String {
    let marks: Vec<&str> = Step::ALL
        .iter()
        .map(|s| match s.cmp(&step) {
            std::cmp::Ordering::Less => "[x]",
            std::cmp::Ordering::Equal => "[>]",
            std::cmp::Ordering::Greater => "[ ]",
        })
        .collect();
    format!("{}  {}", marks.join(" "), step)
}

pub fn perspective_label(perspective: &Perspective, selected: bool) -> String {
    let mark = if selected { "(*)" } else { "( )" };
    let icon = if perspective.icon.is_empty() {
        String::new()
    } else {
        format!("{} ", perspective.icon)
    };
    let kind = if perspective.kind.is_empty() {
        String::new()
    } else {
        format!("[{}] ", perspective.kind)
    };
    format!("{} {}{}{}", mark, icon, kind, perspective.title)
}

pub fn perspective_detail(perspective: &Perspective) -> String {
    if perspective.preview.is_empty() {
        perspective.title.clone()
    } else {
        format!("{}\n  {}", perspective.title, perspective.preview)
    }
}

pub fn tab_bar(current: BibleTab) -> String {
    BibleTab::ALL
        .iter()
        .map(|tab| {
            if *tab == current {
                format!("[{}]", tab.title())
            } else {
                tab.title().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn bible_tab(bible: &StoryBible, tab: BibleTab) -> String {
    let mut out = String::new();
    out.push_str(&bible.title);
    out.push('\n');
    if !bible.tagline.is_empty() {
        out.push_str(&bible.tagline);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&tab_bar(tab));
    out.push_str("\n\n");
    for block in blocks(bible, tab) {
        match block {
            Block::Heading(text) => {
                out.push_str(&format!("\n== {} ==\n", text));
            }
            Block::Paragraph(text) => {
                out.push_str(&text);
                out.push_str("\n\n");
            }
            Block::Field { label, value } => {
                out.push_str(&format!("{}: {}\n", label, value));
            }
            Block::Entry { title, body } => {
                out.push_str(&format!("* {}\n", title));
                if !body.is_empty() {
                    out.push_str(&format!("  {}\n", body));
                }
            }
        }
    }
    out
}

pub fn episode(episode: &Episode) -> String {
    let heading = episode_heading(episode);
    let mut out = format!("{}\n{}\n\n", heading, "-".repeat(heading.chars().count()));
    for paragraph in split_paragraphs(&episode.content) {
        out.push_str(&paragraph);
        out.push_str("\n\n");
    }
    out
}
