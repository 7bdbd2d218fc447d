use crate::core::config::{ApiVariant, Config};
use crate::core::error::{ExportError, ValidationError};
use crate::core::session::{Handoff, Step};
use crate::core::state::{Importance, Parameters, Prompt};
use crate::services::bible::BibleTab;
use crate::services::export::Exporter;
use crate::services::generation::{GenerationClient, StoryBibleRequest};
use crate::ui::{BibleAction, EpisodeAction, Frontend, IdeaEvent, ParameterEvent, PerspectiveEvent};
use crate::utils::progress::while_waiting;
use anyhow::Result;
use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::Arc;

/// Which perspective, if any, the user has picked. Picking again replaces
/// the earlier choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerspectiveSelection {
    len: usize,
    selected: Option<usize>,
}

impl PerspectiveSelection {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            selected: None,
        }
    }

    /// Returns false and keeps the current choice when `index` is out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.len {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn require(&self) -> Result<usize, ValidationError> {
        self.selected.ok_or(ValidationError::NoSelection)
    }
}

enum Transition {
    To(Step, Handoff),
    Quit(Handoff),
}

fn story_bible_request<'a>(
    variant: ApiVariant,
    handoff: &'a Handoff,
    parameters: &'a Parameters,
    importance: &'a Importance,
) -> Option<StoryBibleRequest<'a>> {
    let perspective = handoff.perspective()?;
    match variant {
        ApiVariant::Classic => Some(StoryBibleRequest::Classic {
            perspective,
            parameters,
            importance,
        }),
        ApiVariant::Prompted => Some(StoryBibleRequest::Prompted {
            prompt: handoff.prompt()?,
            perspective,
            parameters,
        }),
    }
}

pub struct Wizard {
    variant: ApiVariant,
    client: Arc<dyn GenerationClient>,
    frontend: Box<dyn Frontend>,
    exporter: Exporter,
}

impl Wizard {
    pub fn new(
        config: &Config,
        client: Arc<dyn GenerationClient>,
        frontend: Box<dyn Frontend>,
        exporter: Exporter,
    ) -> Self {
        Self {
            variant: config.server.variant,
            client,
            frontend,
            exporter,
        }
    }

    pub async fn run(&mut self) -> Result<Handoff> {
        self.run_from(Step::Idea, Handoff::new()).await
    }

    /// Drives the wizard until the user quits and returns the final state.
    pub async fn run_from(&mut self, step: Step, handoff: Handoff) -> Result<Handoff> {
        let mut step = step;
        let mut handoff = handoff;
        loop {
            let resolved = handoff.resolve(step);
            if resolved != step {
                info!("{} is missing its input, showing {} instead", step, resolved);
                step = resolved;
            }
            self.frontend.show_step(step);

            let transition = match step {
                Step::Idea => self.idea_page(handoff).await?,
                Step::Perspectives => self.perspective_page(handoff)?,
                Step::Parameters => self.parameter_page(handoff).await?,
                Step::StoryBible => self.story_bible_page(handoff).await?,
                Step::Episodes => self.episode_page(handoff).await?,
            };
            match transition {
                Transition::To(next, next_handoff) => {
                    step = next;
                    handoff = next_handoff;
                }
                Transition::Quit(final_handoff) => {
                    println!("Goodbye.");
                    return Ok(final_handoff);
                }
            }
        }
    }

    async fn idea_page(&mut self, handoff: Handoff) -> Result<Transition> {
        loop {
            let event = self
                .frontend
                .read_idea(handoff.prompt().map(Prompt::as_str))?;
            let text = match event {
                IdeaEvent::Submit(text) => text,
                IdeaEvent::Quit => return Ok(Transition::Quit(handoff)),
            };

            let prompt = match Prompt::new(&text) {
                Ok(prompt) => prompt,
                Err(e) => {
                    self.frontend.show_error(&e.to_string());
                    continue;
                }
            };

            debug!("Requesting perspectives for {:?}", prompt.as_str());
            let result = while_waiting(
                "Generating perspectives...",
                self.client.request_perspectives(&prompt),
            )
            .await;
            match result {
                Ok(perspectives) if perspectives.is_empty() => {
                    error!("Server returned no perspectives");
                    self.frontend
                        .show_error("The server returned no perspectives. Please try again.");
                }
                Ok(perspectives) => {
                    info!("Received {} perspectives", perspectives.len());
                    return Ok(Transition::To(
                        Step::Perspectives,
                        handoff.with_perspectives(prompt, perspectives),
                    ));
                }
                Err(e) => {
                    error!("Perspective request failed: {}", e);
                    self.frontend.show_error(&e.to_string());
                }
            }
        }
    }

    fn perspective_page(&mut self, handoff: Handoff) -> Result<Transition> {
        let mut selection = PerspectiveSelection::new(handoff.perspectives().len());
        if let Some(current) = handoff.perspective() {
            if let Some(i) = handoff.perspectives().iter().position(|p| p == current) {
                selection.select(i);
            }
        }

        loop {
            match self
                .frontend
                .perspective_event(handoff.perspectives(), selection.selected())?
            {
                PerspectiveEvent::Select(i) => {
                    if !selection.select(i) {
                        debug!("Ignoring selection {} of {}", i, handoff.perspectives().len());
                    }
                }
                PerspectiveEvent::Continue => {
                    let Ok(index) = selection.require() else {
                        continue;
                    };
                    let chosen = handoff.perspectives()[index].clone();
                    info!("Selected perspective: {}", chosen.title);
                    // Re-confirming the same perspective keeps the story bible.
                    let next = if handoff.perspective() == Some(&chosen) {
                        handoff
                    } else {
                        handoff.with_perspective(chosen)
                    };
                    return Ok(Transition::To(Step::Parameters, next));
                }
                PerspectiveEvent::Back => return Ok(Transition::To(Step::Idea, handoff)),
                PerspectiveEvent::Quit => return Ok(Transition::Quit(handoff)),
            }
        }
    }

    async fn parameter_page(&mut self, handoff: Handoff) -> Result<Transition> {
        let mut parameters = match self.variant {
            ApiVariant::Classic => Parameters::classic(),
            ApiVariant::Prompted => Parameters::prompted(),
        };
        let mut importance = Importance::default();

        loop {
            let shown_importance = match self.variant {
                ApiVariant::Classic => Some(&importance),
                ApiVariant::Prompted => None,
            };
            match self.frontend.parameter_event(&parameters, shown_importance)? {
                ParameterEvent::Set(edit) => parameters = parameters.apply(edit),
                ParameterEvent::SetImportance(edit) => importance = importance.apply(edit),
                ParameterEvent::Back => return Ok(Transition::To(Step::Perspectives, handoff)),
                ParameterEvent::Quit => return Ok(Transition::Quit(handoff)),
                ParameterEvent::Submit => {
                    let result = match story_bible_request(
                        self.variant,
                        &handoff,
                        &parameters,
                        &importance,
                    ) {
                        Some(request) => {
                            debug!(
                                "Requesting story bible for perspective {:?}",
                                request.perspective().title
                            );
                            while_waiting(
                                "Generating story bible...",
                                self.client.request_story_bible(&request),
                            )
                            .await
                        }
                        None => return Ok(Transition::To(Step::Idea, handoff)),
                    };
                    match result {
                        Ok(bible) => {
                            info!("Story bible ready: {}", bible.title);
                            return Ok(Transition::To(
                                Step::StoryBible,
                                handoff.with_story_bible(bible),
                            ));
                        }
                        Err(e) => {
                            error!("Story bible request failed: {}", e);
                            self.frontend.show_error(&e.to_string());
                        }
                    }
                }
            }
        }
    }

    async fn story_bible_page(&mut self, handoff: Handoff) -> Result<Transition> {
        let mut tab = BibleTab::Overview;
        let mut shown = None;
        loop {
            let Some(bible) = handoff.story_bible() else {
                return Ok(Transition::To(Step::Parameters, handoff));
            };
            if shown != Some(tab) {
                self.frontend.show_bible_tab(bible, tab);
                shown = Some(tab);
            }
            match self.frontend.bible_action(bible, tab)? {
                BibleAction::ShowTab(next) => tab = next,
                BibleAction::Export => {
                    let result =
                        while_waiting("Creating PDF...", self.exporter.export_story_bible(bible))
                            .await;
                    self.report_export(result)?;
                }
                BibleAction::Continue => return Ok(Transition::To(Step::Episodes, handoff)),
                BibleAction::Back => return Ok(Transition::To(Step::Parameters, handoff)),
                BibleAction::Quit => return Ok(Transition::Quit(handoff)),
            }
        }
    }

    async fn episode_page(&mut self, handoff: Handoff) -> Result<Transition> {
        let mut episodes = handoff.episodes().clone();
        let mut viewing = episodes.latest().map(|e| e.number);
        if let Some(episode) = episodes.latest() {
            self.frontend.show_episode(episode);
        }

        loop {
            let Some(bible) = handoff.story_bible() else {
                return Ok(Transition::To(Step::Parameters, handoff));
            };
            match self.frontend.episode_action(&episodes, viewing)? {
                EpisodeAction::Generate => {
                    // Always the next slot, whichever episode is on screen.
                    let number = episodes.next_number();
                    debug!(
                        "Requesting episode {} with {} previous episodes",
                        number,
                        episodes.len()
                    );
                    let message = format!("Generating episode {}...", number);
                    let result = while_waiting(
                        &message,
                        self.client
                            .request_episode(bible, number, episodes.as_slice()),
                    )
                    .await;
                    match result {
                        Ok(episode) => {
                            let episode = episodes.append(episode);
                            info!("Episode {} ready: {}", episode.number, episode.title);
                            viewing = Some(episode.number);
                            self.frontend.show_episode(episode);
                        }
                        Err(e) => {
                            error!("Episode {} request failed: {}", number, e);
                            self.frontend
                                .show_error(&format!("Failed to generate episode: {}", e));
                        }
                    }
                }
                EpisodeAction::View(number) => match episodes.get(number) {
                    Some(episode) => {
                        viewing = Some(number);
                        self.frontend.show_episode(episode);
                    }
                    None => debug!("No episode {} to view", number),
                },
                EpisodeAction::Export => {
                    if let Some(episode) = viewing.and_then(|n| episodes.get(n)) {
                        let result = while_waiting(
                            "Creating PDF...",
                            self.exporter.export_episode(bible, episode),
                        )
                        .await;
                        self.report_export(result)?;
                    }
                }
                EpisodeAction::ExportAll => {
                    let result = while_waiting(
                        "Creating PDF...",
                        self.exporter
                            .export_complete_story(bible, episodes.as_slice()),
                    )
                    .await;
                    self.report_export(result)?;
                }
                EpisodeAction::Back => {
                    return Ok(Transition::To(
                        Step::StoryBible,
                        handoff.with_episodes(episodes),
                    ))
                }
                EpisodeAction::Quit => return Ok(Transition::Quit(handoff.with_episodes(episodes))),
            }
        }
    }

    fn report_export(&mut self, result: Result<PathBuf, ExportError>) -> Result<()> {
        match result {
            Ok(path) => {
                self.frontend.notice(&format!("Saved {}", path.display()));
                Ok(())
            }
            Err(e) => {
                error!("Export failed: {}", e);
                self.frontend
                    .alert(&format!("Failed to generate PDF. Please try again. ({})", e))
            }
        }
    }
}
