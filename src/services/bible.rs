use crate::core::state::StoryBible;
use std::fmt;

const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BibleTab {
    Overview,
    Characters,
    Plot,
    World,
    Themes,
}

impl BibleTab {
    pub const ALL: &'static [BibleTab] = &[
        BibleTab::Overview,
        BibleTab::Characters,
        BibleTab::Plot,
        BibleTab::World,
        BibleTab::Themes,
    ];

    pub fn title(self) -> &'static str {
        match self {
            BibleTab::Overview => "Overview",
            BibleTab::Characters => "Characters",
            BibleTab::Plot => "Plot Structure",
            BibleTab::World => "World Building",
            BibleTab::Themes => "Themes & Conflicts",
        }
    }
}

impl fmt::Display for BibleTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    Field { label: String, value: String },
    Entry { title: String, body: String },
}

fn field(label: &str, value: &str) -> Block {
    let value = if value.trim().is_empty() {
        NOT_SPECIFIED
    } else {
        value
    };
    Block::Field {
        label: label.to_string(),
        value: value.to_string(),
    }
}

fn section(heading: &str, body: &str) -> [Block; 2] {
    let body = if body.trim().is_empty() {
        NOT_SPECIFIED
    } else {
        body
    };
    [
        Block::Heading(heading.to_string()),
        Block::Paragraph(body.to_string()),
    ]
}

pub fn blocks(bible: &StoryBible, tab: BibleTab) -> Vec<Block> {
    let mut out = Vec::new();
    match tab {
        BibleTab::Overview => {
            if !bible.premise.trim().is_empty() {
                out.push(Block::Paragraph(bible.premise.clone()));
            }
            out.push(field("Theme", &bible.theme));
            out.push(field("Setting", &bible.setting));
            out.push(field("Tone", &bible.tone));
            out.push(field("Genre", &bible.genre));
        }
        BibleTab::Characters => {
            if bible.characters.is_empty() {
                out.push(Block::Paragraph("No characters were generated.".to_string()));
            }
            for character in &bible.characters {
                out.push(Block::Heading(character.name.clone()));
                out.push(field("Role", &character.role));
                out.push(field("Traits", &character.traits));
                out.push(field("Motivation", &character.motivation));
                out.push(field("Background", &character.background));
                out.push(field("Arc", &character.arc));
            }
        }
        BibleTab::Plot => {
            out.extend(section("Act 1: Setup", &bible.plot.act1));
            out.extend(section("Act 2: Confrontation", &bible.plot.act2));
            out.extend(section("Act 3: Resolution", &bible.plot.act3));
            if !bible.plot.key_events.is_empty() {
                out.push(Block::Heading("Key Plot Points".to_string()));
                for (i, event) in bible.plot.key_events.iter().enumerate() {
                    out.push(Block::Entry {
                        title: format!("{}. {}", i + 1, event.title),
                        body: event.description.clone(),
                    });
                }
            }
        }
        BibleTab::World => {
            let world = &bible.world_building;
            out.extend(section("Physical Environment", &world.environment));
            out.extend(section("Society & Culture", &world.society));
            out.extend(section("Rules & Systems", &world.rules));
            out.extend(section("History & Background", &world.history));
            if !world.locations.is_empty() {
                out.push(Block::Heading("Key Locations".to_string()));
                for location in &world.locations {
                    out.push(Block::Entry {
                        title: location.name.clone(),
                        body: location.description.clone(),
                    });
                }
            }
        }
        BibleTab::Themes => {
            out.push(Block::Heading("Central Themes".to_string()));
            for theme in &bible.themes.central {
                out.push(Block::Entry {
                    title: theme.name.clone(),
                    body: theme.exploration.clone(),
                });
            }
            out.push(Block::Heading("Major Conflicts".to_string()));
            for conflict in &bible.conflicts {
                out.push(Block::Entry {
                    title: conflict.kind.clone(),
                    body: conflict.description.clone(),
                });
            }
        }
    }
    out
}
