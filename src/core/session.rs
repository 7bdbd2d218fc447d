use crate::core::state::{EpisodeLog, Perspective, Prompt, StoryBible};
use std::fmt;

/// The five wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Idea,
    Perspectives,
    Parameters,
    StoryBible,
    Episodes,
}

impl Step {
    pub const ALL: &'static [Step] = &[
        Step::Idea,
        Step::Perspectives,
        Step::Parameters,
        Step::StoryBible,
        Step::Episodes,
    ];

    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Idea => "Story Idea",
            Step::Perspectives => "Choose Perspective",
            Step::Parameters => "Customize Story",
            Step::StoryBible => "Story Bible",
            Step::Episodes => "Full Story",
        }
    }

    pub fn previous(self) -> Option<Step> {
        match self {
            Step::Idea => None,
            Step::Perspectives => Some(Step::Idea),
            Step::Parameters => Some(Step::Perspectives),
            Step::StoryBible => Some(Step::Parameters),
            Step::Episodes => Some(Step::StoryBible),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {}", self.number(), self.label())
    }
}

/// State carried from one step to the next.
///
/// A handoff is moved, never shared: the active step owns it and passes it on
/// when it transitions. Builder methods consume `self` and return the next
/// value so that no step mutates state another step still holds.
#[derive(Debug, Clone, Default)]
pub struct Handoff {
    prompt: Option<Prompt>,
    perspectives: Vec<Perspective>,
    perspective: Option<Perspective>,
    story_bible: Option<StoryBible>,
    episodes: EpisodeLog,
}

impl Handoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn perspectives(&self) -> &[Perspective] {
        &self.perspectives
    }

    pub fn perspective(&self) -> Option<&Perspective> {
        self.perspective.as_ref()
    }

    pub fn story_bible(&self) -> Option<&StoryBible> {
        self.story_bible.as_ref()
    }

    pub fn episodes(&self) -> &EpisodeLog {
        &self.episodes
    }

    /// A fresh perspective list invalidates everything downstream of it.
    pub fn with_perspectives(self, prompt: Prompt, perspectives: Vec<Perspective>) -> Self {
        Self {
            prompt: Some(prompt),
            perspectives,
            ..Self::default()
        }
    }

    pub fn with_perspective(self, perspective: Perspective) -> Self {
        Self {
            perspective: Some(perspective),
            story_bible: None,
            episodes: EpisodeLog::new(),
            ..self
        }
    }

    /// Episodes belong to the story bible they were generated from.
    pub fn with_story_bible(self, story_bible: StoryBible) -> Self {
        Self {
            story_bible: Some(story_bible),
            episodes: EpisodeLog::new(),
            ..self
        }
    }

    pub fn with_episodes(self, episodes: EpisodeLog) -> Self {
        Self { episodes, ..self }
    }

    pub fn satisfies(&self, step: Step) -> bool {
        match step {
            Step::Idea => true,
            Step::Perspectives => !self.perspectives.is_empty(),
            Step::Parameters => self.perspective.is_some(),
            Step::StoryBible | Step::Episodes => self.story_bible.is_some(),
        }
    }

    /// The nearest step at or before `step` whose upstream state is present.
    pub fn resolve(&self, step: Step) -> Step {
        let mut current = step;
        while !self.satisfies(current) {
            match current.previous() {
                Some(prev) => current = prev,
                None => break,
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Episode;

    fn perspective(title: &str) -> Perspective {
        Perspective {
            id: None,
            kind: "Hero".to_string(),
            title: title.to_string(),
            preview: String::new(),
            icon: String::new(),
            raw: None,
        }
    }

    fn bible() -> StoryBible {
        StoryBible {
            title: "Beacon".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_handoff_resolves_every_step_to_idea() {
        let handoff = Handoff::new();
        for step in Step::ALL {
            assert_eq!(handoff.resolve(*step), Step::Idea, "{}", step);
        }
    }

    #[test]
    fn test_resolve_picks_nearest_valid_step() {
        let handoff = Handoff::new().with_perspectives(
            Prompt::new("idea").unwrap(),
            vec![perspective("a"), perspective("b")],
        );
        assert_eq!(handoff.resolve(Step::Perspectives), Step::Perspectives);
        assert_eq!(handoff.resolve(Step::Parameters), Step::Perspectives);
        assert_eq!(handoff.resolve(Step::Episodes), Step::Perspectives);

        let handoff = handoff.with_perspective(perspective("b"));
        assert_eq!(handoff.resolve(Step::StoryBible), Step::Parameters);

        let handoff = handoff.with_story_bible(bible());
        assert_eq!(handoff.resolve(Step::Episodes), Step::Episodes);
    }

    #[test]
    fn test_new_story_bible_clears_episodes() {
        let mut log = EpisodeLog::new();
        log.append(Episode {
            number: 1,
            title: "One".to_string(),
            content: String::new(),
            scenes: vec![],
        });

        let handoff = Handoff::new()
            .with_perspective(perspective("a"))
            .with_story_bible(bible())
            .with_episodes(log);
        assert_eq!(handoff.episodes().len(), 1);

        let handoff = handoff.with_story_bible(bible());
        assert!(handoff.episodes().is_empty());
    }

    #[test]
    fn test_new_perspectives_reset_downstream_state() {
        let handoff = Handoff::new()
            .with_perspective(perspective("a"))
            .with_story_bible(bible())
            .with_perspectives(Prompt::new("again").unwrap(), vec![perspective("c")]);
        assert!(handoff.perspective().is_none());
        assert!(handoff.story_bible().is_none());
        assert_eq!(handoff.prompt().unwrap().as_str(), "again");
    }
}
