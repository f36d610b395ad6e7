//! First drafts, and the story-response parsing every writing stage shares.

use crate::completion::{CompletionClient, GenerationError, StageParams};
use crate::parser::{ExtractionSchema, FieldSpec};
use crate::prompts;
use crate::request::StoryRequest;
use crate::story::Story;

/// Moral used when a response carries none and there is nothing to keep.
pub const DEFAULT_MORAL: &str = "Being kind and brave makes every day a little brighter.";

/// Target length for a story body, in words.
pub const TARGET_WORDS: std::ops::RangeInclusive<usize> = 400..=600;

const STORY_FIELDS: &[FieldSpec] = &[
    FieldSpec::line("title", &["title", "story title"], ""),
    FieldSpec::block("story", &["story", "story text", "content"], ""),
    FieldSpec::block("moral", &["moral", "moral of the story", "lesson"], ""),
    // Echoed from the context block; only here to end the moral.
    FieldSpec::line("version", &["version"], ""),
];

lazy_static::lazy_static! {
    static ref STORY_SCHEMA: ExtractionSchema =
        ExtractionSchema::new(STORY_FIELDS).expect("valid story labels");
}

/// Title, body and moral pulled out of a writing stage's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoryParts {
    pub title: String,
    pub content: String,
    pub moral: String,
}

/// Parse a `TITLE / STORY / MORAL` response.
///
/// Missing title -> `fallback_title`. Missing `STORY` label -> whatever
/// text no other label claimed. Missing moral -> `fallback_moral`.
pub(crate) fn parse_story_response(
    text: &str,
    fallback_title: &str,
    fallback_moral: &str,
) -> StoryParts {
    let fields = STORY_SCHEMA.extract_with_defaults(
        text,
        &[("title", fallback_title), ("moral", fallback_moral)],
    );

    let content = if fields.was_defaulted("story") {
        if fields.unlabeled().is_empty() {
            text.trim().to_string()
        } else {
            fields.unlabeled().to_string()
        }
    } else {
        fields.get("story").to_string()
    };

    StoryParts {
        title: fields.get("title").to_string(),
        content,
        moral: fields.get("moral").to_string(),
    }
}

pub(crate) fn log_length(story: &Story) {
    let words = story.word_count();
    if TARGET_WORDS.contains(&words) {
        tracing::debug!(words, version = story.version(), "story length on target");
    } else {
        tracing::debug!(words, version = story.version(), "story length outside target");
    }
}

/// Writes the first draft of a story.
#[derive(Clone)]
pub struct Storyteller {
    client: CompletionClient,
    params: StageParams,
}

impl Storyteller {
    pub fn new(client: CompletionClient, params: StageParams) -> Self {
        Self { client, params }
    }

    /// Write version 1 of a story for `request`.
    pub async fn generate(&self, request: &StoryRequest) -> Result<Story, GenerationError> {
        let prompt = format!(
            "Create a bedtime story with these elements:\n\
             - Characters: {}\n\
             - Themes: {}\n\
             - Setting: {}\n\
             - Tone: {}\n\
             - Original request: \"{}\"\n",
            request.characters_text(),
            request.themes_text(),
            request.setting,
            request.tone,
            request.raw_input,
        );

        let response = self
            .client
            .complete(
                &prompt,
                prompts::storyteller_system_prompt(request.category),
                self.params,
            )
            .await?;

        let parts = parse_story_response(&response, &request.fallback_title(), DEFAULT_MORAL);
        let story = Story::draft(parts.title, parts.content, parts.moral);
        tracing::info!(title = %story.title, "first draft written");
        log_length(&story);
        Ok(story)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_story() {
        let text = "TITLE: Whiskers and the Moon\nSTORY:\nWhiskers looked up.\n\nShe smiled.\nMORAL: Wonder is everywhere.";
        let parts = parse_story_response(text, "fallback", DEFAULT_MORAL);
        assert_eq!(parts.title, "Whiskers and the Moon");
        assert_eq!(parts.content, "Whiskers looked up.\n\nShe smiled.");
        assert_eq!(parts.moral, "Wonder is everywhere.");
    }

    #[test]
    fn test_lowercase_markers() {
        let text = "title: Pip's Picnic\nstory: Pip packed a basket.\nmoral: Sharing is fun.";
        let parts = parse_story_response(text, "fallback", DEFAULT_MORAL);
        assert_eq!(parts.title, "Pip's Picnic");
        assert_eq!(parts.content, "Pip packed a basket.");
        assert_eq!(parts.moral, "Sharing is fun.");
    }

    #[test]
    fn test_no_title_marker_uses_fallback() {
        let text = "Once upon a time, a cat named Tom wore a hat.\nMORAL: Be yourself.";
        let parts = parse_story_response(text, "A Funny Tale from a magical land", DEFAULT_MORAL);
        assert_eq!(parts.title, "A Funny Tale from a magical land");
        assert_eq!(parts.content, "Once upon a time, a cat named Tom wore a hat.");
        assert_eq!(parts.moral, "Be yourself.");
    }

    #[test]
    fn test_unformatted_response_becomes_body() {
        let text = "Tom the cat had a very silly day.";
        let parts = parse_story_response(text, "Fallback", "Keep smiling.");
        assert_eq!(parts.title, "Fallback");
        assert_eq!(parts.content, text);
        assert_eq!(parts.moral, "Keep smiling.");
    }

    #[test]
    fn test_echoed_version_line_is_dropped() {
        let text = "TITLE: Tom's Hat\nSTORY:\nTom wore a hat.\nMORAL: Share the fun.\nVERSION: 3";
        let parts = parse_story_response(text, "f", DEFAULT_MORAL);
        assert_eq!(parts.content, "Tom wore a hat.");
        assert_eq!(parts.moral, "Share the fun.");

        let unlabeled = "Tom wore a hat.\nVERSION: 2";
        let parts = parse_story_response(unlabeled, "f", "Keep smiling.");
        assert_eq!(parts.content, "Tom wore a hat.");
    }

    #[test]
    fn test_moral_of_the_story_label() {
        let text = "TITLE: T\nSTORY:\nBody.\nMoral of the story: Listen well.";
        let parts = parse_story_response(text, "f", DEFAULT_MORAL);
        assert_eq!(parts.content, "Body.");
        assert_eq!(parts.moral, "Listen well.");
    }
}
