use crate::core::error::ValidationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

pub const PROMPT_MAX_CHARS: usize = 500;

pub const EXAMPLE_PROMPTS: &[&str] = &[
    "Create a thrilling mystery story set in a futuristic city",
    "Write a heartwarming tale about friendship and adventure",
    "Craft a fantasy story with magical creatures and epic battles",
    "Develop a sci-fi narrative about space exploration and discovery",
];

// --- Prompt ---

/// The user's story idea. Always trimmed, non-empty and within the length cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: &str) -> Result<Self, ValidationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let len = trimmed.chars().count();
        if len > PROMPT_MAX_CHARS {
            return Err(ValidationError::PromptTooLong {
                len,
                max: PROMPT_MAX_CHARS,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Lenient decoding helpers ---

// Generated payloads are not strictly typed: a "string" field can come back
// as a list or a number. Flatten anything scalar-ish into display text.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .values()
            .map(flatten_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(flatten_text).unwrap_or_default())
}

// A list of entries where any single element may arrive in the wrong shape.
// A bare scalar stands in for the entry's main text; anything else that does
// not decode is skipped so one bad element never sinks the whole payload.
fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromText,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => vec![other],
    };
    Ok(items.into_iter().filter_map(lenient_entry).collect())
}

fn lenient_entry<T: DeserializeOwned + FromText>(item: Value) -> Option<T> {
    match item {
        Value::Null => None,
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            Some(T::from_text(flatten_text(&item)))
        }
        Value::Object(_) => match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("skipping story bible entry: {}", e);
                None
            }
        },
        Value::Array(_) => {
            log::warn!("skipping story bible entry that is a nested list");
            None
        }
    }
}

// Nested sections (plot, world building, themes) fall back to empty when the
// server sends something other than an object.
fn lenient_section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value @ Value::Object(_)) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            log::warn!("ignoring story bible section: {}", e);
            T::default()
        })),
        Some(other) => {
            log::warn!("ignoring story bible section of unexpected shape: {}", other);
            Ok(T::default())
        }
    }
}

// Server payloads are kept verbatim next to the decoded view.
fn decode_object<T: DeserializeOwned>(raw: &Value) -> Result<T, serde_json::Error> {
    if !raw.is_object() {
        return Err(serde::de::Error::custom(format!(
            "expected a JSON object, got {}",
            raw
        )));
    }
    T::deserialize(raw)
}

/// Entries that can be built from a bare string.
trait FromText {
    fn from_text(text: String) -> Self;
}

// --- Perspective ---

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Perspective {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub preview: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub icon: String,
    /// The card as the server sent it. Sent back unchanged when chosen.
    #[serde(skip)]
    pub raw: Option<Value>,
}

impl Perspective {
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let mut perspective: Self = decode_object(&raw)?;
        perspective.raw = Some(raw);
        Ok(perspective)
    }
}

impl Serialize for Perspective {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Fields<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            id: Option<&'a Value>,
            #[serde(rename = "type", skip_serializing_if = "str::is_empty")]
            kind: &'a str,
            #[serde(skip_serializing_if = "str::is_empty")]
            title: &'a str,
            #[serde(skip_serializing_if = "str::is_empty")]
            preview: &'a str,
            #[serde(skip_serializing_if = "str::is_empty")]
            icon: &'a str,
        }

        match &self.raw {
            Some(raw) => raw.serialize(serializer),
            None => Fields {
                id: self.id.as_ref(),
                kind: &self.kind,
                title: &self.title,
                preview: &self.preview,
                icon: &self.icon,
            }
            .serialize(serializer),
        }
    }
}

// --- Parameters ---

/// A 1-5 slider value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;
    pub const DEFAULT: Level = Level(3);

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Level> {
        (Self::MIN..=Self::MAX).map(Level)
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value).ok_or_else(|| format!("level must be between 1 and 5, got {}", value))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! choice {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal, $label:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self { $($name::$variant => $label),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

choice!(Genre {
    Fantasy => "fantasy", "Fantasy";
    SciFi => "sci-fi", "Science Fiction";
    Mystery => "mystery", "Mystery";
    Romance => "romance", "Romance";
    Thriller => "thriller", "Thriller";
    Horror => "horror", "Horror";
    Historical => "historical", "Historical";
    Adventure => "adventure", "Adventure";
});

choice!(Audience {
    Children => "children", "Children";
    MiddleGrade => "middle-grade", "Middle Grade";
    YoungAdult => "young adult", "Young Adult";
    Adult => "adult", "Adult";
});

choice!(Tone {
    Lighthearted => "lighthearted", "Lighthearted";
    Dramatic => "dramatic", "Dramatic";
    Dark => "dark", "Dark";
    Humorous => "humorous", "Humorous";
    Suspenseful => "suspenseful", "Suspenseful";
    Whimsical => "whimsical", "Whimsical";
});

choice!(StoryLength {
    Short => "short", "Short";
    Medium => "medium", "Medium";
    Long => "long", "Long";
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    pub genre: Genre,
    pub target_audience: Audience,
    pub tone_and_mood: Tone,
    pub story_length: StoryLength,
    pub complexity: Level,
    pub pacing: Level,
    pub world_building_depth: Level,
    pub character_development: Level,
    /// Only part of the classic request shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_emphasis: Option<Level>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterField {
    Genre,
    TargetAudience,
    ToneAndMood,
    StoryLength,
    Complexity,
    Pacing,
    WorldBuildingDepth,
    CharacterDevelopment,
    ThemeEmphasis,
}

impl ParameterField {
    pub const ALL: &'static [ParameterField] = &[
        ParameterField::Genre,
        ParameterField::TargetAudience,
        ParameterField::ToneAndMood,
        ParameterField::StoryLength,
        ParameterField::Complexity,
        ParameterField::Pacing,
        ParameterField::WorldBuildingDepth,
        ParameterField::CharacterDevelopment,
        ParameterField::ThemeEmphasis,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ParameterField::Genre => "Genre",
            ParameterField::TargetAudience => "Target Audience",
            ParameterField::ToneAndMood => "Tone & Mood",
            ParameterField::StoryLength => "Story Length",
            ParameterField::Complexity => "Complexity",
            ParameterField::Pacing => "Pacing",
            ParameterField::WorldBuildingDepth => "World-Building Depth",
            ParameterField::CharacterDevelopment => "Character Development",
            ParameterField::ThemeEmphasis => "Theme Emphasis",
        }
    }
}

/// Replacement of exactly one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterEdit {
    Genre(Genre),
    TargetAudience(Audience),
    ToneAndMood(Tone),
    StoryLength(StoryLength),
    Level(ParameterField, Level),
}

impl Parameters {
    pub fn classic() -> Self {
        Self {
            theme_emphasis: Some(Level::DEFAULT),
            ..Self::prompted()
        }
    }

    pub fn prompted() -> Self {
        Self {
            genre: Genre::Fantasy,
            target_audience: Audience::YoungAdult,
            tone_and_mood: Tone::Dramatic,
            story_length: StoryLength::Medium,
            complexity: Level::DEFAULT,
            pacing: Level::DEFAULT,
            world_building_depth: Level::DEFAULT,
            character_development: Level::DEFAULT,
            theme_emphasis: None,
        }
    }

    /// Fields the user can edit for this request shape.
    pub fn fields(&self) -> Vec<ParameterField> {
        ParameterField::ALL
            .iter()
            .copied()
            .filter(|f| *f != ParameterField::ThemeEmphasis || self.theme_emphasis.is_some())
            .collect()
    }

    pub fn describe(&self, field: ParameterField) -> String {
        match field {
            ParameterField::Genre => self.genre.to_string(),
            ParameterField::TargetAudience => self.target_audience.to_string(),
            ParameterField::ToneAndMood => self.tone_and_mood.to_string(),
            ParameterField::StoryLength => self.story_length.to_string(),
            _ => self
                .level(field)
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }

    pub fn level(&self, field: ParameterField) -> Option<Level> {
        match field {
            ParameterField::Complexity => Some(self.complexity),
            ParameterField::Pacing => Some(self.pacing),
            ParameterField::WorldBuildingDepth => Some(self.world_building_depth),
            ParameterField::CharacterDevelopment => Some(self.character_development),
            ParameterField::ThemeEmphasis => self.theme_emphasis,
            _ => None,
        }
    }

    /// Returns a new mapping with one field replaced.
    pub fn apply(&self, edit: ParameterEdit) -> Self {
        let mut next = self.clone();
        match edit {
            ParameterEdit::Genre(v) => next.genre = v,
            ParameterEdit::TargetAudience(v) => next.target_audience = v,
            ParameterEdit::ToneAndMood(v) => next.tone_and_mood = v,
            ParameterEdit::StoryLength(v) => next.story_length = v,
            ParameterEdit::Level(field, level) => match field {
                ParameterField::Complexity => next.complexity = level,
                ParameterField::Pacing => next.pacing = level,
                ParameterField::WorldBuildingDepth => next.world_building_depth = level,
                ParameterField::CharacterDevelopment => next.character_development = level,
                ParameterField::ThemeEmphasis => {
                    if next.theme_emphasis.is_some() {
                        next.theme_emphasis = Some(level);
                    }
                }
                _ => log::warn!("ignoring level edit for non-level field {:?}", field),
            },
        }
        next
    }
}

// --- Importance ---

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Importance {
    pub characters_importance: Level,
    pub plot_importance: Level,
    pub world_building_importance: Level,
    pub theme_importance: Level,
    pub conflict_importance: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportanceField {
    Characters,
    Plot,
    WorldBuilding,
    Theme,
    Conflict,
}

impl ImportanceField {
    pub const ALL: &'static [ImportanceField] = &[
        ImportanceField::Characters,
        ImportanceField::Plot,
        ImportanceField::WorldBuilding,
        ImportanceField::Theme,
        ImportanceField::Conflict,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ImportanceField::Characters => "Characters",
            ImportanceField::Plot => "Plot",
            ImportanceField::WorldBuilding => "World Building",
            ImportanceField::Theme => "Theme",
            ImportanceField::Conflict => "Conflict",
        }
    }
}

/// Replacement of one importance weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportanceEdit {
    pub field: ImportanceField,
    pub level: Level,
}

impl Importance {
    pub fn get(&self, field: ImportanceField) -> Level {
        match field {
            ImportanceField::Characters => self.characters_importance,
            ImportanceField::Plot => self.plot_importance,
            ImportanceField::WorldBuilding => self.world_building_importance,
            ImportanceField::Theme => self.theme_importance,
            ImportanceField::Conflict => self.conflict_importance,
        }
    }

    pub fn with(&self, field: ImportanceField, level: Level) -> Self {
        let mut next = self.clone();
        match field {
            ImportanceField::Characters => next.characters_importance = level,
            ImportanceField::Plot => next.plot_importance = level,
            ImportanceField::WorldBuilding => next.world_building_importance = level,
            ImportanceField::Theme => next.theme_importance = level,
            ImportanceField::Conflict => next.conflict_importance = level,
        }
        next
    }

    pub fn apply(&self, edit: ImportanceEdit) -> Self {
        self.with(edit.field, edit.level)
    }
}

// --- Story bible ---

/// A render-oriented reading of a generated story bible. Requests that carry
/// the bible back to the server send `raw` when it is present.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryBible {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tagline: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub premise: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub theme: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub setting: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tone: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub genre: String,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub characters: Vec<Character>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub plot: Plot,
    #[serde(default, deserialize_with = "lenient_section")]
    pub world_building: WorldBuilding,
    #[serde(default, deserialize_with = "lenient_section")]
    pub themes: Themes,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub conflicts: Vec<Conflict>,
    #[serde(skip)]
    pub raw: Option<Value>,
}

impl StoryBible {
    /// Reads a server payload and keeps it verbatim.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let mut bible: Self = decode_object(&raw)?;
        bible.raw = Some(raw);
        Ok(bible)
    }
}

impl Serialize for StoryBible {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Fields<'a> {
            title: &'a str,
            tagline: &'a str,
            premise: &'a str,
            theme: &'a str,
            setting: &'a str,
            tone: &'a str,
            genre: &'a str,
            characters: &'a [Character],
            plot: &'a Plot,
            world_building: &'a WorldBuilding,
            themes: &'a Themes,
            conflicts: &'a [Conflict],
        }

        match &self.raw {
            Some(raw) => raw.serialize(serializer),
            None => Fields {
                title: &self.title,
                tagline: &self.tagline,
                premise: &self.premise,
                theme: &self.theme,
                setting: &self.setting,
                tone: &self.tone,
                genre: &self.genre,
                characters: &self.characters,
                plot: &self.plot,
                world_building: &self.world_building,
                themes: &self.themes,
                conflicts: &self.conflicts,
            }
            .serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Character {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub traits: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub motivation: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub background: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub arc: String,
}

impl FromText for Character {
    fn from_text(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plot {
    #[serde(default, deserialize_with = "lenient_text")]
    pub act1: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub act2: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub act3: String,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub key_events: Vec<KeyEvent>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyEvent {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
}

impl FromText for KeyEvent {
    fn from_text(description: String) -> Self {
        Self {
            description,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldBuilding {
    #[serde(default, deserialize_with = "lenient_text")]
    pub environment: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub society: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rules: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub history: String,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
}

impl FromText for Location {
    fn from_text(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Themes {
    #[serde(default, deserialize_with = "lenient_entries")]
    pub central: Vec<Theme>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub exploration: String,
}

impl FromText for Theme {
    fn from_text(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
}

impl FromText for Conflict {
    fn from_text(description: String) -> Self {
        Self {
            description,
            ..Default::default()
        }
    }
}

// --- Episodes ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub number: u32,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub scenes: Vec<Value>,
}

/// Generated episodes in generation order. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeLog {
    episodes: Vec<Episode>,
}

impl EpisodeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_number(&self) -> u32 {
        self.episodes.len() as u32 + 1
    }

    /// Appends an episode, pinning its number to the next slot.
    pub fn append(&mut self, mut episode: Episode) -> &Episode {
        let expected = self.next_number();
        if episode.number != expected {
            log::warn!(
                "episode arrived numbered {} but the next slot is {}; renumbering",
                episode.number,
                expected
            );
            episode.number = expected;
        }
        self.episodes.push(episode);
        &self.episodes[self.episodes.len() - 1]
    }

    pub fn get(&self, number: u32) -> Option<&Episode> {
        number
            .checked_sub(1)
            .and_then(|idx| self.episodes.get(idx as usize))
    }

    pub fn latest(&self) -> Option<&Episode> {
        self.episodes.last()
    }

    pub fn as_slice(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_validation() {
        assert_eq!(Prompt::new("   \n\t"), Err(ValidationError::EmptyPrompt));
        assert_eq!(Prompt::new("  a lighthouse  ").unwrap().as_str(), "a lighthouse");

        let long = "x".repeat(PROMPT_MAX_CHARS + 1);
        assert!(matches!(
            Prompt::new(&long),
            Err(ValidationError::PromptTooLong { len: 501, max: 500 })
        ));
        assert!(Prompt::new(&"x".repeat(PROMPT_MAX_CHARS)).is_ok());
    }

    #[test]
    fn test_default_parameters_wire_shape() {
        let classic = serde_json::to_value(Parameters::classic()).unwrap();
        assert_eq!(
            classic,
            serde_json::json!({
                "genre": "fantasy",
                "targetAudience": "young adult",
                "toneAndMood": "dramatic",
                "storyLength": "medium",
                "complexity": 3,
                "pacing": 3,
                "worldBuildingDepth": 3,
                "characterDevelopment": 3,
                "themeEmphasis": 3
            })
        );

        let prompted = serde_json::to_value(Parameters::prompted()).unwrap();
        assert!(prompted.get("themeEmphasis").is_none());
        assert!(!Parameters::prompted().fields().contains(&ParameterField::ThemeEmphasis));
    }

    #[test]
    fn test_parameter_edit_replaces_one_field() {
        let base = Parameters::classic();
        let edited = base
            .apply(ParameterEdit::Genre(Genre::Mystery))
            .apply(ParameterEdit::Level(ParameterField::Pacing, Level::new(5).unwrap()));

        assert_eq!(edited.genre, Genre::Mystery);
        assert_eq!(edited.pacing.get(), 5);
        assert_eq!(edited.complexity, base.complexity);
        // the original value is untouched
        assert_eq!(base.genre, Genre::Fantasy);

        // theme emphasis stays absent for the prompted shape
        let prompted = Parameters::prompted()
            .apply(ParameterEdit::Level(ParameterField::ThemeEmphasis, Level::new(1).unwrap()));
        assert_eq!(prompted.theme_emphasis, None);
    }

    #[test]
    fn test_level_bounds() {
        assert!(Level::new(0).is_none());
        assert!(Level::new(6).is_none());
        assert_eq!(Level::all().count(), 5);
        assert!(serde_json::from_str::<Level>("9").is_err());
        assert_eq!(serde_json::from_str::<Level>("4").unwrap().get(), 4);
    }

    #[test]
    fn test_choice_wire_names() {
        assert_eq!(serde_json::to_value(Genre::SciFi).unwrap(), "sci-fi");
        assert_eq!(
            serde_json::from_str::<Audience>(r#""young adult""#).unwrap(),
            Audience::YoungAdult
        );
        assert!(serde_json::from_str::<Genre>(r#""western""#).is_err());
        assert_eq!(Genre::SciFi.label(), "Science Fiction");
    }

    #[test]
    fn test_importance_with() {
        let imp = Importance::default().with(ImportanceField::Plot, Level::new(5).unwrap());
        assert_eq!(imp.get(ImportanceField::Plot).get(), 5);
        assert_eq!(imp.get(ImportanceField::Theme).get(), 3);
        let json = serde_json::to_value(&imp).unwrap();
        assert_eq!(json["plotImportance"], 5);
        assert_eq!(json["worldBuildingImportance"], 3);
    }

    #[test]
    fn test_story_bible_lenient_decoding() {
        let bible = StoryBible::from_value(json!({
            "title": "The Keeper's Light",
            "tagline": "Some lights should stay dark",
            "characters": [
                { "name": "Ada", "traits": ["stubborn", "curious"], "role": "Detective" }
            ],
            "plot": { "act1": "Arrival", "keyEvents": null },
            "worldBuilding": { "locations": [ { "name": "The Tower" } ] },
            "conflicts": [ { "type": "Internal", "description": "Guilt" } ],
            "seriesNotes": "kept"
        }))
        .unwrap();

        assert_eq!(bible.title, "The Keeper's Light");
        assert_eq!(bible.characters[0].traits, "stubborn, curious");
        assert!(bible.plot.key_events.is_empty());
        assert_eq!(bible.world_building.locations[0].name, "The Tower");
        assert_eq!(bible.conflicts[0].kind, "Internal");
        assert!(bible.themes.central.is_empty());
    }

    #[test]
    fn test_story_bible_coerces_or_skips_odd_entries() {
        let bible = StoryBible::from_value(json!({
            "title": "Beacon",
            "conflicts": ["Man vs Self"],
            "characters": ["Ada", { "name": "Bo" }, [1, 2], null],
            "plot": "told elsewhere",
            "themes": { "central": "Grief" },
            "worldBuilding": { "locations": [42] }
        }))
        .unwrap();

        assert_eq!(bible.conflicts.len(), 1);
        assert_eq!(bible.conflicts[0].description, "Man vs Self");
        assert_eq!(bible.conflicts[0].kind, "");
        let names: Vec<&str> = bible.characters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Ada", "Bo"]);
        assert_eq!(bible.plot, Plot::default());
        assert_eq!(bible.themes.central[0].name, "Grief");
        assert_eq!(bible.world_building.locations[0].name, "42");
    }

    #[test]
    fn test_story_bible_serializes_server_payload_verbatim() {
        let raw = json!({
            "theme": ["grief", "hope"],
            "characters": [ { "name": "Ada", "age": 41 } ],
            "seriesNotes": "kept"
        });
        let bible = StoryBible::from_value(raw.clone()).unwrap();
        assert_eq!(bible.theme, "grief, hope");
        assert_eq!(bible.characters[0].role, "");

        assert_eq!(serde_json::to_value(&bible).unwrap(), raw);
    }

    #[test]
    fn test_story_bible_must_be_an_object() {
        assert!(StoryBible::from_value(json!("just a title")).is_err());
        assert!(StoryBible::from_value(json!(["Beacon"])).is_err());
    }

    #[test]
    fn test_local_story_bible_serializes_view() {
        let bible = StoryBible {
            title: "Beacon".to_string(),
            conflicts: vec![Conflict::from_text("Storm".to_string())],
            ..Default::default()
        };
        let json = serde_json::to_value(&bible).unwrap();
        assert_eq!(json["title"], "Beacon");
        assert_eq!(json["conflicts"][0]["description"], "Storm");
        assert!(json["worldBuilding"].is_object());
    }

    #[test]
    fn test_perspective_is_sent_back_as_received() {
        let raw = json!({ "id": 2, "title": "The Keeper", "preview": "...", "mood": "grim" });
        let p = Perspective::from_value(raw.clone()).unwrap();
        assert_eq!(p.kind, "");
        assert_eq!(p.title, "The Keeper");
        assert_eq!(serde_json::to_value(&p).unwrap(), raw);
        assert!(Perspective::from_value(json!("The Keeper")).is_err());
    }

    #[test]
    fn test_local_perspective_omits_empty_fields() {
        let p = Perspective {
            id: Some(json!(1)),
            title: "The Investigator".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({ "id": 1, "title": "The Investigator" })
        );
    }

    fn episode(number: u32) -> Episode {
        Episode {
            number,
            title: format!("Ep {}", number),
            content: String::new(),
            scenes: vec![],
        }
    }

    #[test]
    fn test_episode_log_numbering() {
        let mut log = EpisodeLog::new();
        assert_eq!(log.next_number(), 1);
        log.append(episode(1));
        assert_eq!(log.next_number(), 2);

        // a stray number is pinned to the next slot
        let appended = log.append(episode(7)).number;
        assert_eq!(appended, 2);
        assert_eq!(log.get(2).unwrap().title, "Ep 7");
        assert!(log.get(0).is_none());
        assert!(log.get(3).is_none());
        assert_eq!(log.latest().unwrap().number, 2);
    }
}
