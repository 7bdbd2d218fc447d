use super::render;
use super::{BibleAction, EpisodeAction, Frontend, IdeaEvent, ParameterEvent, PerspectiveEvent};
use crate::core::session::Step;
use crate::core::state::{
    Audience, Episode, EpisodeLog, Genre, Importance, ImportanceEdit, ImportanceField, Level,
    ParameterEdit, ParameterField, Parameters, Perspective, StoryBible, StoryLength, Tone,
    EXAMPLE_PROMPTS, PROMPT_MAX_CHARS,
};
use crate::services::bible::BibleTab;
use anyhow::{Context, Result};
use inquire::{Confirm, InquireError, Select, Text};
use rand::seq::IndexedRandom;

/// Result of a menu: Esc steps back, Ctrl-C quits.
enum Choice<T> {
    Picked(T),
    Back,
    Quit,
}

fn choose<T: Clone>(message: &str, items: Vec<(String, T)>, cursor: usize) -> Result<Choice<T>> {
    let labels: Vec<String> = items.iter().map(|(label, _)| label.clone()).collect();
    let cursor = cursor.min(labels.len().saturating_sub(1));
    match Select::new(message, labels)
        .with_page_size(12)
        .with_starting_cursor(cursor)
        .raw_prompt()
    {
        Ok(option) => Ok(Choice::Picked(items[option.index].1.clone())),
        Err(InquireError::OperationCanceled) => Ok(Choice::Back),
        Err(InquireError::OperationInterrupted) => Ok(Choice::Quit),
        Err(e) => Err(e).context("Terminal prompt failed"),
    }
}

fn choose_level(label: &str, current: Level) -> Result<Choice<Level>> {
    let items = Level::all().map(|l| (l.to_string(), l)).collect();
    let cursor = (current.get() - Level::MIN) as usize;
    choose(&format!("{} (1-5):", label), items, cursor)
}

fn choose_option<T: Copy + PartialEq + std::fmt::Display>(
    label: &str,
    all: &[T],
    current: T,
) -> Result<Choice<T>> {
    let items = all.iter().map(|v| (v.to_string(), *v)).collect();
    let cursor = all.iter().position(|v| *v == current).unwrap_or(0);
    choose(&format!("{}:", label), items, cursor)
}

#[derive(Clone, Copy)]
enum IdeaSource {
    Own,
    Example(usize),
    Surprise,
}

#[derive(Clone, Copy)]
enum ParameterItem {
    Field(ParameterField),
    Importance(ImportanceField),
    Submit,
    Back,
}

#[derive(Clone, Copy)]
enum PerspectiveItem {
    Pick(usize),
    Continue,
    Back,
}

#[derive(Default)]
pub struct TerminalFrontend;

impl TerminalFrontend {
    pub fn new() -> Self {
        Self
    }

    fn edit_parameter(
        &self,
        parameters: &Parameters,
        field: ParameterField,
    ) -> Result<Choice<ParameterEdit>> {
        let label = field.label();
        let edit = match field {
            ParameterField::Genre => {
                choose_option(label, Genre::ALL, parameters.genre)?.map(ParameterEdit::Genre)
            }
            ParameterField::TargetAudience => {
                choose_option(label, Audience::ALL, parameters.target_audience)?
                    .map(ParameterEdit::TargetAudience)
            }
            ParameterField::ToneAndMood => {
                choose_option(label, Tone::ALL, parameters.tone_and_mood)?
                    .map(ParameterEdit::ToneAndMood)
            }
            ParameterField::StoryLength => {
                choose_option(label, StoryLength::ALL, parameters.story_length)?
                    .map(ParameterEdit::StoryLength)
            }
            _ => {
                let current = parameters.level(field).unwrap_or_default();
                choose_level(label, current)?.map(|l| ParameterEdit::Level(field, l))
            }
        };
        Ok(edit)
    }
}

impl<T> Choice<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Choice<U> {
        match self {
            Choice::Picked(v) => Choice::Picked(f(v)),
            Choice::Back => Choice::Back,
            Choice::Quit => Choice::Quit,
        }
    }
}

impl Frontend for TerminalFrontend {
    fn show_step(&mut self, step: Step) {
        println!("\n{}\n", render::step_header(step));
    }

    fn read_idea(&mut self, current: Option<&str>) -> Result<IdeaEvent> {
        loop {
            let mut items = vec![("Write my own idea".to_string(), IdeaSource::Own)];
            for (i, example) in EXAMPLE_PROMPTS.iter().enumerate() {
                items.push((format!("Example: {}", example), IdeaSource::Example(i)));
            }
            items.push(("Surprise me".to_string(), IdeaSource::Surprise));

            let initial = match choose("What's your story idea?", items, 0)? {
                Choice::Picked(IdeaSource::Own) => current.unwrap_or_default().to_string(),
                Choice::Picked(IdeaSource::Example(i)) => EXAMPLE_PROMPTS[i].to_string(),
                Choice::Picked(IdeaSource::Surprise) => EXAMPLE_PROMPTS
                    .choose(&mut rand::rng())
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                Choice::Back | Choice::Quit => return Ok(IdeaEvent::Quit),
            };

            let help = format!("Up to {} characters. Esc to go back.", PROMPT_MAX_CHARS);
            match Text::new("Story idea:")
                .with_initial_value(&initial)
                .with_help_message(&help)
                .prompt()
            {
                Ok(text) => return Ok(IdeaEvent::Submit(text)),
                Err(InquireError::OperationCanceled) => continue,
                Err(InquireError::OperationInterrupted) => return Ok(IdeaEvent::Quit),
                Err(e) => return Err(e).context("Failed to read story idea"),
            }
        }
    }

    fn perspective_event(
        &mut self,
        perspectives: &[Perspective],
        selected: Option<usize>,
    ) -> Result<PerspectiveEvent> {
        for (i, perspective) in perspectives.iter().enumerate() {
            println!("{}. {}", i + 1, render::perspective_detail(perspective));
        }
        println!();

        let mut items: Vec<(String, PerspectiveItem)> = perspectives
            .iter()
            .enumerate()
            .map(|(i, p)| {
                (
                    render::perspective_label(p, selected == Some(i)),
                    PerspectiveItem::Pick(i),
                )
            })
            .collect();
        // Continue only appears once something is selected.
        if selected.is_some() {
            items.push(("Continue".to_string(), PerspectiveItem::Continue));
        }
        items.push(("Back".to_string(), PerspectiveItem::Back));

        let cursor = if selected.is_some() { perspectives.len() } else { 0 };
        Ok(match choose("Choose a perspective:", items, cursor)? {
            Choice::Picked(PerspectiveItem::Pick(i)) => PerspectiveEvent::Select(i),
            Choice::Picked(PerspectiveItem::Continue) => PerspectiveEvent::Continue,
            Choice::Picked(PerspectiveItem::Back) | Choice::Back => PerspectiveEvent::Back,
            Choice::Quit => PerspectiveEvent::Quit,
        })
    }

    fn parameter_event(
        &mut self,
        parameters: &Parameters,
        importance: Option<&Importance>,
    ) -> Result<ParameterEvent> {
        let mut items: Vec<(String, ParameterItem)> = parameters
            .fields()
            .into_iter()
            .map(|f| {
                (
                    format!("{}: {}", f.label(), parameters.describe(f)),
                    ParameterItem::Field(f),
                )
            })
            .collect();
        if let Some(importance) = importance {
            for f in ImportanceField::ALL {
                items.push((
                    format!("{} importance: {}", f.label(), importance.get(*f)),
                    ParameterItem::Importance(*f),
                ));
            }
        }
        items.push(("Generate Story Bible".to_string(), ParameterItem::Submit));
        items.push(("Back".to_string(), ParameterItem::Back));

        loop {
            let item = match choose("Customize your story:", items.clone(), 0)? {
                Choice::Picked(item) => item,
                Choice::Back => return Ok(ParameterEvent::Back),
                Choice::Quit => return Ok(ParameterEvent::Quit),
            };
            let event = match item {
                ParameterItem::Submit => return Ok(ParameterEvent::Submit),
                ParameterItem::Back => return Ok(ParameterEvent::Back),
                ParameterItem::Field(field) => {
                    self.edit_parameter(parameters, field)?.map(ParameterEvent::Set)
                }
                ParameterItem::Importance(field) => {
                    let current = importance.map(|i| i.get(field)).unwrap_or_default();
                    choose_level(&format!("{} importance", field.label()), current)?
                        .map(|level| ParameterEvent::SetImportance(ImportanceEdit { field, level }))
                }
            };
            match event {
                Choice::Picked(event) => return Ok(event),
                // Esc inside a sub-menu returns to the parameter list
                Choice::Back => continue,
                Choice::Quit => return Ok(ParameterEvent::Quit),
            }
        }
    }

    fn show_bible_tab(&mut self, bible: &StoryBible, tab: BibleTab) {
        println!("{}", render::bible_tab(bible, tab));
    }

    fn bible_action(&mut self, _bible: &StoryBible, tab: BibleTab) -> Result<BibleAction> {
        let mut items: Vec<(String, BibleAction)> = BibleTab::ALL
            .iter()
            .filter(|t| **t != tab)
            .map(|t| (format!("Show {}", t), BibleAction::ShowTab(*t)))
            .collect();
        items.push(("Download Story Bible PDF".to_string(), BibleAction::Export));
        items.push(("Continue to Full Story".to_string(), BibleAction::Continue));
        items.push(("Back".to_string(), BibleAction::Back));
        items.push(("Quit".to_string(), BibleAction::Quit));

        Ok(match choose("Story Bible:", items, 0)? {
            Choice::Picked(action) => action,
            Choice::Back => BibleAction::Back,
            Choice::Quit => BibleAction::Quit,
        })
    }

    fn show_episode(&mut self, episode: &Episode) {
        println!("{}", render::episode(episode));
    }

    fn episode_action(
        &mut self,
        episodes: &EpisodeLog,
        viewing: Option<u32>,
    ) -> Result<EpisodeAction> {
        let mut items = vec![(
            format!("Generate Episode {}", episodes.next_number()),
            EpisodeAction::Generate,
        )];
        for episode in episodes.as_slice() {
            let mark = if viewing == Some(episode.number) { " (viewing)" } else { "" };
            items.push((
                format!("View Episode {}: {}{}", episode.number, episode.title, mark),
                EpisodeAction::View(episode.number),
            ));
        }
        if viewing.is_some() {
            items.push(("Download this episode as PDF".to_string(), EpisodeAction::Export));
        }
        if !episodes.is_empty() {
            items.push((
                "Download complete story as PDF".to_string(),
                EpisodeAction::ExportAll,
            ));
        }
        items.push(("Back to Story Bible".to_string(), EpisodeAction::Back));
        items.push(("Quit".to_string(), EpisodeAction::Quit));

        Ok(match choose("Full Story:", items, 0)? {
            Choice::Picked(action) => action,
            Choice::Back => EpisodeAction::Back,
            Choice::Quit => EpisodeAction::Quit,
        })
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("Error: {}", message);
    }

    fn alert(&mut self, message: &str) -> Result<()> {
        println!("{}", message);
        match Confirm::new("OK?").with_default(true).prompt() {
            Ok(_) | Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
                Ok(())
            }
            Err(e) => Err(e).context("Failed to show alert"),
        }
    }

    fn notice(&mut self, message: &str) {
        println!("{}", message);
    }
}
