//! Story requests and the analyzer that builds them from free text.

use crate::completion::{CompletionClient, GenerationError, StageParams};
use crate::parser::{split_list, ExtractionSchema, FieldSpec};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Setting used when neither the menu nor the model supplies one.
pub const DEFAULT_SETTING: &str = "a magical land";

/// The seven story categories.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum StoryCategory {
    Adventure,
    Fantasy,
    Animal,
    Friendship,
    #[default]
    Bedtime,
    Educational,
    Funny,
}

impl StoryCategory {
    /// Capitalized display name.
    pub fn title(&self) -> &'static str {
        match self {
            StoryCategory::Adventure => "Adventure",
            StoryCategory::Fantasy => "Fantasy",
            StoryCategory::Animal => "Animal",
            StoryCategory::Friendship => "Friendship",
            StoryCategory::Bedtime => "Bedtime",
            StoryCategory::Educational => "Educational",
            StoryCategory::Funny => "Funny",
        }
    }
}

/// The six story tones.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Whimsical,
    Exciting,
    Calming,
    Humorous,
    Heartwarming,
    Inspiring,
}

/// Find the first word in `value` naming a member of `T`.
///
/// Tolerates `funny`, `[Funny]`, `Funny story` and `funny|animal`.
pub fn parse_choice<T: FromStr>(value: &str) -> Option<T> {
    value
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| !word.is_empty())
        .find_map(|word| word.parse().ok())
}

/// Explicit choices from the menu layer. `None` means "not chosen".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuSelection {
    pub category: Option<StoryCategory>,
    pub tone: Option<Tone>,
    pub setting: Option<String>,
}

impl MenuSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: StoryCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        let setting = setting.into();
        self.setting = (!setting.trim().is_empty()).then(|| setting.trim().to_string());
        self
    }
}

/// Everything the storyteller needs. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub raw_input: String,
    pub category: StoryCategory,
    pub characters: Vec<String>,
    pub themes: Vec<String>,
    pub setting: String,
    pub tone: Tone,
}

impl StoryRequest {
    /// A request built from menu choices alone, without analysis.
    pub fn from_selection(raw_input: impl Into<String>, selection: &MenuSelection) -> Self {
        Self {
            raw_input: raw_input.into(),
            category: selection.category.unwrap_or_default(),
            characters: Vec::new(),
            themes: Vec::new(),
            setting: selection
                .setting
                .clone()
                .unwrap_or_else(|| DEFAULT_SETTING.to_string()),
            tone: selection.tone.unwrap_or_default(),
        }
    }

    /// Characters as prompt text.
    pub fn characters_text(&self) -> String {
        if self.characters.is_empty() {
            "Create appropriate characters".to_string()
        } else {
            self.characters.join(", ")
        }
    }

    /// Themes as prompt text.
    pub fn themes_text(&self) -> String {
        if self.themes.is_empty() {
            "friendship and kindness".to_string()
        } else {
            self.themes.join(", ")
        }
    }

    /// The menu-level choices every revision must keep.
    pub fn details(&self) -> String {
        format!(
            "Category: {}\nTone: {}\nSetting: {}",
            self.category, self.tone, self.setting
        )
    }

    /// Title used when a story response carries none.
    pub fn fallback_title(&self) -> String {
        let category = self.category.title();
        let article = if category.starts_with(['A', 'E', 'I', 'O', 'U']) {
            "An"
        } else {
            "A"
        };
        format!("{article} {category} Tale from {}", self.setting)
    }
}

const ANALYZER_FIELDS: &[FieldSpec] = &[
    FieldSpec::line("category", &["category"], ""),
    FieldSpec::line("characters", &["characters?", "main characters?"], ""),
    FieldSpec::line("themes", &["themes?"], ""),
    FieldSpec::line("setting", &["setting", "location"], ""),
    FieldSpec::line("tone", &["tone", "mood"], ""),
];

lazy_static::lazy_static! {
    static ref ANALYZER_SCHEMA: ExtractionSchema =
        ExtractionSchema::new(ANALYZER_FIELDS).expect("valid analyzer labels");
}

/// Turns a free-text idea plus menu choices into a [`StoryRequest`].
#[derive(Clone)]
pub struct RequestAnalyzer {
    client: CompletionClient,
    params: StageParams,
}

impl RequestAnalyzer {
    pub fn new(client: CompletionClient, params: StageParams) -> Self {
        Self { client, params }
    }

    /// Analyze `raw_input`. Menu values always win over model suggestions;
    /// anything still unresolved takes the documented default.
    pub async fn analyze(
        &self,
        raw_input: &str,
        selection: &MenuSelection,
    ) -> Result<StoryRequest, GenerationError> {
        let prompt = format!("Analyze this bedtime story request: {raw_input}");
        let response = self
            .client
            .complete(&prompt, prompts::analyzer_system_prompt(), self.params)
            .await?;

        let request = resolve_request(raw_input, &response, selection);
        tracing::info!(
            category = %request.category,
            tone = %request.tone,
            characters = request.characters.len(),
            themes = request.themes.len(),
            "request analyzed"
        );
        Ok(request)
    }
}

/// Merge the analyzer's response with explicit menu choices.
pub(crate) fn resolve_request(
    raw_input: &str,
    response: &str,
    selection: &MenuSelection,
) -> StoryRequest {
    let fields = ANALYZER_SCHEMA.extract(response);

    let suggested_category = parse_choice::<StoryCategory>(fields.get("category"));
    if suggested_category.is_none() && !fields.was_defaulted("category") {
        tracing::debug!(value = fields.get("category"), "unrecognized category suggestion");
    }
    let suggested_tone = parse_choice::<Tone>(fields.get("tone"));
    let suggested_setting = Some(fields.get("setting").to_string()).filter(|s| !s.is_empty());

    StoryRequest {
        raw_input: raw_input.to_string(),
        category: selection
            .category
            .or(suggested_category)
            .unwrap_or_default(),
        characters: split_list(fields.get("characters")),
        themes: split_list(fields.get("themes")),
        setting: selection
            .setting
            .clone()
            .or(suggested_setting)
            .unwrap_or_else(|| DEFAULT_SETTING.to_string()),
        tone: selection.tone.or(suggested_tone).unwrap_or_default(),
    }
}
