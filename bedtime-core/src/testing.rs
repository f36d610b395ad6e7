//! Testing utilities for the story pipeline.
//!
//! This module provides tools for deterministic testing:
//! - `MockCompletion` for scripted completion replies without API calls
//! - Reply builders for well-formed analyzer, story and judge responses
//! - Assertion helpers for verifying cycle outcomes

use crate::completion::{CompletionClient, CompletionService, RetryPolicy, ServiceError};
use crate::config::PipelineConfig;
use crate::session::StoryPipeline;
use crate::story::{JudgeFeedback, Story};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Text returned once the script runs out.
pub const EXHAUSTED_REPLY: &str = "The mock has no more scripted replies.";

/// A scripted reply from the mock service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Text(String),
    Failure(ServiceError),
}

impl MockReply {
    /// A successful completion.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A failure the client should retry.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Failure(ServiceError::Transient(reason.into()))
    }

    /// A failure the client should give up on.
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Failure(ServiceError::Permanent(reason.into()))
    }
}

/// One call the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// When the call arrived (tokio clock, so paused tests see virtual time).
    pub at: tokio::time::Instant,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    calls: Vec<RecordedCall>,
}

/// A completion service that returns scripted replies in order.
///
/// Use this for deterministic tests without API calls.
#[derive(Default)]
pub struct MockCompletion {
    state: Mutex<MockState>,
}

impl MockCompletion {
    /// Create a mock with scripted replies.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            state: Mutex::new(MockState {
                replies: replies.into(),
                calls: Vec::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a reply to the end of the script.
    pub fn queue(&self, reply: MockReply) {
        self.state().replies.push_back(reply);
    }

    /// Add a successful text reply to the end of the script.
    pub fn queue_text(&self, text: impl Into<String>) {
        self.queue(MockReply::text(text));
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Calls made at a given temperature, i.e. by one stage.
    pub fn calls_at(&self, temperature: f32) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| (c.temperature - temperature).abs() < f32::EPSILON)
            .count()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.state().replies.len()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, ServiceError> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            prompt: prompt.to_string(),
            system_prompt: system_prompt.to_string(),
            temperature,
            max_tokens,
            at: tokio::time::Instant::now(),
        });
        match state.replies.pop_front() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Failure(err)) => Err(err),
            None => Ok(EXHAUSTED_REPLY.to_string()),
        }
    }
}

/// A pipeline over `mock` with default settings and instant retries.
pub fn mock_pipeline(mock: &Arc<MockCompletion>) -> StoryPipeline {
    mock_pipeline_with(mock, PipelineConfig::default())
}

/// A pipeline over `mock` with `config`; retry delays are zeroed.
pub fn mock_pipeline_with(mock: &Arc<MockCompletion>, config: PipelineConfig) -> StoryPipeline {
    let retry = RetryPolicy {
        base_delay: Duration::ZERO,
        ..config.retry
    };
    let config = config.with_retry(retry);
    let client = CompletionClient::new(mock.clone()).with_policy(config.retry);
    StoryPipeline::new(client, config)
}

// ============================================================================
// Reply builders
// ============================================================================

/// A well-formed analyzer reply.
pub fn analysis_reply(
    category: &str,
    characters: &str,
    themes: &str,
    setting: &str,
    tone: &str,
) -> String {
    format!(
        "CATEGORY: {category}\nCHARACTERS: {characters}\nTHEMES: {themes}\nSETTING: {setting}\nTONE: {tone}"
    )
}

/// A well-formed storyteller reply.
pub fn story_reply(title: &str, body: &str, moral: &str) -> String {
    format!("TITLE: {title}\nSTORY:\n{body}\nMORAL: {moral}")
}

/// A judge reply with uniform criteria and one suggestion.
pub fn judge_reply(score: u8) -> String {
    judge_reply_with(score, false, &["Add a gentle sound effect to the climax"])
}

/// A judge reply with an explicit exceptional flag and suggestions.
pub fn judge_reply_with(score: u8, exceptional: bool, suggestions: &[&str]) -> String {
    let mut reply = format!(
        "OVERALL_SCORE: {score}\nEXCEPTIONAL: {}\nAGE_APPROPRIATENESS: {score}\nENGAGEMENT: {score}\nMORAL_CLARITY: {score}\nSTORY_STRUCTURE: {score}\nLANGUAGE_QUALITY: {score}\nFEEDBACK: A warm story with room to grow.\nSUGGESTIONS:\n",
        if exceptional { "yes" } else { "no" }
    );
    for suggestion in suggestions {
        reply.push_str(&format!("- {suggestion}\n"));
    }
    reply
}

// ============================================================================
// Assertion helpers
// ============================================================================

/// Assert each history entry's round matches its 1-based position.
#[track_caller]
pub fn assert_rounds_sequential(history: &[JudgeFeedback]) {
    for (index, feedback) in history.iter().enumerate() {
        assert_eq!(
            feedback.round,
            index as u32 + 1,
            "Expected round {} at history position {index}, got {}",
            index + 1,
            feedback.round
        );
    }
}

/// Assert a story is at the expected version.
#[track_caller]
pub fn assert_version(story: &Story, version: u32) {
    assert_eq!(
        story.version(),
        version,
        "Expected story version {version}, got {}",
        story.version()
    );
}

/// Assert no first-draft score exceeds the ceiling without the flag.
#[track_caller]
pub fn assert_round_one_ceiling(history: &[JudgeFeedback], ceiling: u8) {
    if let Some(first) = history.first() {
        assert!(
            first.exceptional || first.overall_score <= ceiling,
            "Expected round 1 score at most {ceiling}, got {}",
            first.overall_score
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_script_then_default() {
        let mock = MockCompletion::new(vec![MockReply::text("one"), MockReply::transient("down")]);
        assert_eq!(mock.complete("p", "s", 0.5, 10).await, Ok("one".to_string()));
        assert!(matches!(
            mock.complete("p", "s", 0.5, 10).await,
            Err(ServiceError::Transient(_))
        ));
        assert_eq!(
            mock.complete("p", "s", 0.5, 10).await,
            Ok(EXHAUSTED_REPLY.to_string())
        );
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls_at(0.5), 3);
    }

    #[tokio::test]
    async fn test_queue_appends() {
        let mock = MockCompletion::default();
        mock.queue_text("later");
        assert_eq!(mock.remaining(), 1);
        assert_eq!(mock.complete("p", "s", 0.1, 1).await, Ok("later".to_string()));
        assert_eq!(mock.calls()[0].prompt, "p");
    }

    #[test]
    fn test_judge_reply_shape() {
        let reply = judge_reply_with(9, true, &["a", "b"]);
        assert!(reply.starts_with("OVERALL_SCORE: 9\nEXCEPTIONAL: yes"));
        assert!(reply.ends_with("- a\n- b\n"));
    }
}
