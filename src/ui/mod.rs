pub mod render;
pub mod terminal;

use crate::core::session::Step;
use crate::core::state::{
    Episode, EpisodeLog, Importance, ImportanceEdit, ParameterEdit, Parameters, Perspective,
    StoryBible,
};
use crate::services::bible::BibleTab;
use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdeaEvent {
    /// Raw text; validation happens in the wizard.
    Submit(String),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerspectiveEvent {
    Select(usize),
    Continue,
    Back,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterEvent {
    Set(ParameterEdit),
    SetImportance(ImportanceEdit),
    Submit,
    Back,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BibleAction {
    ShowTab(BibleTab),
    Export,
    Continue,
    Back,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeAction {
    Generate,
    View(u32),
    Export,
    ExportAll,
    Back,
    Quit,
}

pub trait Frontend {
    fn show_step(&mut self, step: Step);

    /// `current` is the prompt already submitted, if any.
    fn read_idea(&mut self, current: Option<&str>) -> Result<IdeaEvent>;

    fn perspective_event(
        &mut self,
        perspectives: &[Perspective],
        selected: Option<usize>,
    ) -> Result<PerspectiveEvent>;

    /// `importance` is `None` when the server does not take weights.
    fn parameter_event(
        &mut self,
        parameters: &Parameters,
        importance: Option<&Importance>,
    ) -> Result<ParameterEvent>;

    fn show_bible_tab(&mut self, bible: &StoryBible, tab: BibleTab);

    fn bible_action(&mut self, bible: &StoryBible, tab: BibleTab) -> Result<BibleAction>;

    fn show_episode(&mut self, episode: &Episode);

    fn episode_action(&mut self, episodes: &EpisodeLog, viewing: Option<u32>)
        -> Result<EpisodeAction>;

    /// Inline failure; the user stays on the current step.
    fn show_error(&mut self, message: &str);

    fn alert(&mut self, message: &str) -> Result<()>;

    fn notice(&mut self, message: &str);
}
