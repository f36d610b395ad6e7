//! Revision stages: judge-driven refinement and user-driven modification.
//!
//! Both produce the next [`Story`] version from the current one. Neither
//! touches the judge history.

use crate::completion::{CompletionClient, GenerationError, StageParams};
use crate::prompts;
use crate::request::StoryRequest;
use crate::story::{JudgeFeedback, Story};
use crate::storyteller::{log_length, parse_story_response};

/// Rewrites a story to address the judge's suggestions.
#[derive(Clone)]
pub struct Refiner {
    client: CompletionClient,
    params: StageParams,
}

impl Refiner {
    pub fn new(client: CompletionClient, params: StageParams) -> Self {
        Self { client, params }
    }

    /// Produce `story.version() + 1`. The title is kept unless the
    /// feedback asks for a new one.
    pub async fn refine(
        &self,
        story: &Story,
        request: &StoryRequest,
        feedback: &JudgeFeedback,
    ) -> Result<Story, GenerationError> {
        let title_rule = if feedback.targets_title() {
            "The feedback mentions the title, so you may change it."
        } else {
            "Keep the title exactly as it is."
        };

        let prompt = format!(
            "Improve this bedtime story using the judge's feedback.\n\n\
             ORIGINAL REQUEST: \"{}\"\n\n\
             REQUEST DETAILS:\n{}\n\n\
             CURRENT STORY:\n{}\n\n\
             JUDGE FEEDBACK:\n{}\n\
             Address every suggestion above with a specific change. Keep what already works.\n\
             Keep the requested category, tone, and setting.\n\
             {title_rule}\n\
             Stay within 400-600 words and keep the TITLE / STORY / MORAL format.\n",
            request.raw_input,
            request.details(),
            story.to_context(),
            feedback.to_context(),
        );

        let response = self
            .client
            .complete(
                &prompt,
                prompts::storyteller_system_prompt(request.category),
                self.params,
            )
            .await?;

        let parts = parse_story_response(&response, &story.title, &story.moral);
        let title = if feedback.targets_title() {
            parts.title
        } else {
            story.title.clone()
        };

        let refined = story.revise(title, parts.content, parts.moral);
        tracing::info!(
            version = refined.version(),
            addressed = feedback.suggestions.len(),
            "story refined"
        );
        log_length(&refined);
        Ok(refined)
    }
}

/// Applies a free-text change request from the reader.
#[derive(Clone)]
pub struct Modifier {
    client: CompletionClient,
    params: StageParams,
}

impl Modifier {
    pub fn new(client: CompletionClient, params: StageParams) -> Self {
        Self { client, params }
    }

    /// Produce `story.version() + 1` with `change_request` applied.
    pub async fn modify(
        &self,
        story: &Story,
        request: &StoryRequest,
        change_request: &str,
    ) -> Result<Story, GenerationError> {
        let prompt = format!(
            "Modify this bedtime story based on the reader's request.\n\n\
             ORIGINAL REQUEST: \"{}\"\n\n\
             REQUEST DETAILS:\n{}\n\n\
             CURRENT STORY:\n{}\n\n\
             CHANGE REQUESTED: \"{}\"\n\n\
             Make the requested change while keeping the story suitable for ages 5-10.\n\
             Keep the requested category, tone, and setting unless the change asks otherwise.\n\
             Keep the TITLE / STORY / MORAL format.\n",
            request.raw_input,
            request.details(),
            story.to_context(),
            change_request.trim(),
        );

        let response = self
            .client
            .complete(
                &prompt,
                prompts::storyteller_system_prompt(request.category),
                self.params,
            )
            .await?;

        let parts = parse_story_response(&response, &story.title, &story.moral);
        let modified = story.revise(parts.title, parts.content, parts.moral);
        tracing::info!(version = modified.version(), "story modified");
        log_length(&modified);
        Ok(modified)
    }
}
