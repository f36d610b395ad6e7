//! Story sessions - the main entry point for the pipeline.

use crate::choices::{ChoicePair, ChoiceProposer, Continuation, ContinuationBeat};
use crate::completion::{CompletionClient, GenerationError};
use crate::config::PipelineConfig;
use crate::judge::Judge;
use crate::quality_loop::{CycleOutcome, LoopEvent, QualityLoop, StopReason};
use crate::refine::{Modifier, Refiner};
use crate::request::{MenuSelection, RequestAnalyzer, StoryRequest};
use crate::story::{JudgeFeedback, Story};
use crate::storyteller::Storyteller;
use claude::Claude;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

/// Errors that can occur during a story session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("No API key configured - set ANTHROPIC_API_KEY environment variable")]
    NoApiKey,

    #[error("Client error: {0}")]
    Client(#[source] claude::Error),

    #[error("The change request was empty")]
    EmptyChange,
}

/// Identifies one session in logs and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Every stage, wired to one completion client. Cheap to clone.
#[derive(Clone)]
pub struct StoryPipeline {
    config: PipelineConfig,
    analyzer: RequestAnalyzer,
    modifier: Modifier,
    quality_loop: QualityLoop,
    choice_proposer: ChoiceProposer,
    continuation: Continuation,
}

impl StoryPipeline {
    /// Build every stage over `client` using `config`.
    pub fn new(client: CompletionClient, config: PipelineConfig) -> Self {
        let client = client.with_policy(config.retry);
        let quality_loop = QualityLoop::new(
            Storyteller::new(client.clone(), config.storyteller),
            Judge::new(client.clone(), config.judge, config.round_one_ceiling),
            Refiner::new(client.clone(), config.refiner),
            config.max_rounds,
            config.score_threshold,
        );
        Self {
            analyzer: RequestAnalyzer::new(client.clone(), config.analyzer),
            modifier: Modifier::new(client.clone(), config.modifier),
            choice_proposer: ChoiceProposer::new(client.clone(), config.choice_proposer),
            continuation: Continuation::new(client, config.continuation),
            quality_loop,
            config,
        }
    }

    /// A pipeline over the Anthropic API.
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    pub fn from_env(config: PipelineConfig) -> Result<Self, SessionError> {
        let claude = Claude::from_env().map_err(|e| match e {
            claude::Error::NoApiKey => SessionError::NoApiKey,
            other => SessionError::Client(other),
        })?;
        let claude = match &config.model {
            Some(model) => claude.with_model(model),
            None => claude,
        };
        tracing::info!(model = claude.model(), "using Anthropic completion service");
        Ok(Self::new(CompletionClient::new(Arc::new(claude)), config))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// A serializable record of a session's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub request: StoryRequest,
    pub story: Story,
    pub history: Vec<JudgeFeedback>,
    pub stop: StopReason,
}

/// One reader's story: the request, the current story and the judge
/// history of the latest cycle.
pub struct StorySession {
    id: SessionId,
    pipeline: StoryPipeline,
    request: StoryRequest,
    story: Story,
    history: Vec<JudgeFeedback>,
    stop: StopReason,
}

impl StorySession {
    /// Analyze the idea, then run the first cycle.
    pub async fn begin(
        pipeline: &StoryPipeline,
        raw_input: &str,
        selection: MenuSelection,
    ) -> Result<Self, SessionError> {
        Self::begin_with(pipeline, raw_input, selection, |_| {}).await
    }

    /// Like [`StorySession::begin`], reporting cycle progress to `observe`.
    pub async fn begin_with<F>(
        pipeline: &StoryPipeline,
        raw_input: &str,
        selection: MenuSelection,
        observe: F,
    ) -> Result<Self, SessionError>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let id = SessionId::new();
        let span = tracing::info_span!("story_session", session = %id);
        Self::start(pipeline, id, raw_input, selection, observe)
            .instrument(span)
            .await
    }

    async fn start<F>(
        pipeline: &StoryPipeline,
        id: SessionId,
        raw_input: &str,
        selection: MenuSelection,
        observe: F,
    ) -> Result<Self, SessionError>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let request = match pipeline.analyzer.analyze(raw_input, &selection).await {
            Ok(request) => request,
            Err(GenerationError::Unavailable { attempts, reason }) => {
                tracing::warn!(
                    attempts,
                    error = %reason,
                    "analysis unavailable, using menu selections"
                );
                StoryRequest::from_selection(raw_input, &selection)
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = run_cycle(pipeline, id, &request, observe).await?;
        Ok(Self {
            id,
            pipeline: pipeline.clone(),
            request,
            story: outcome.story,
            history: outcome.history,
            stop: outcome.stop,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn request(&self) -> &StoryRequest {
        &self.request
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    /// Judge history of the latest cycle, round 1 first.
    pub fn history(&self) -> &[JudgeFeedback] {
        &self.history
    }

    /// How the latest cycle ended.
    pub fn stop_reason(&self) -> StopReason {
        self.stop
    }

    /// Start a new cycle from a fresh draft with the same request.
    ///
    /// On failure the previous story and history are kept.
    pub async fn regenerate(&mut self) -> Result<&Story, SessionError> {
        self.regenerate_with(|_| {}).await
    }

    pub async fn regenerate_with<F>(&mut self, observe: F) -> Result<&Story, SessionError>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let outcome = run_cycle(&self.pipeline, self.id, &self.request, observe).await?;
        self.story = outcome.story;
        self.history = outcome.history;
        self.stop = outcome.stop;
        Ok(&self.story)
    }

    /// Apply the reader's change request. The judge history is untouched.
    pub async fn modify(&mut self, change_request: &str) -> Result<&Story, SessionError> {
        if change_request.trim().is_empty() {
            return Err(SessionError::EmptyChange);
        }
        let span = tracing::info_span!("story_session", session = %self.id);
        let modified = self
            .pipeline
            .modifier
            .modify(&self.story, &self.request, change_request)
            .instrument(span)
            .await?;
        self.story = modified;
        Ok(&self.story)
    }

    /// Two options for what happens next at `step` of `total`.
    pub async fn propose_choices(&self, step: u32, total: u32) -> Result<ChoicePair, SessionError> {
        let span = tracing::info_span!("story_session", session = %self.id);
        Ok(self
            .pipeline
            .choice_proposer
            .propose(&self.story, &self.request, step, total)
            .instrument(span)
            .await?)
    }

    /// Continue the story with the reader's chosen option.
    pub async fn continue_with_choice(
        &mut self,
        option: &str,
        step: u32,
        total: u32,
    ) -> Result<ContinuationBeat, SessionError> {
        let span = tracing::info_span!("story_session", session = %self.id);
        let beat = self
            .pipeline
            .continuation
            .extend(&self.story, &self.request, option, step, total)
            .instrument(span)
            .await?;
        self.story = beat.story.clone();
        Ok(beat)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            request: self.request.clone(),
            story: self.story.clone(),
            history: self.history.clone(),
            stop: self.stop,
        }
    }

    /// End the session, keeping only the request.
    pub fn into_request(self) -> StoryRequest {
        self.request
    }
}

async fn run_cycle<F>(
    pipeline: &StoryPipeline,
    id: SessionId,
    request: &StoryRequest,
    observe: F,
) -> Result<CycleOutcome, GenerationError>
where
    F: FnMut(&LoopEvent<'_>),
{
    let span = tracing::info_span!("story_cycle", session = %id);
    let outcome = pipeline
        .quality_loop
        .run_with(request, observe)
        .instrument(span)
        .await?;
    tracing::info!(
        session = %id,
        rounds = outcome.history.len(),
        score = outcome.final_score(),
        stop = ?outcome.stop,
        "cycle finished"
    );
    Ok(outcome)
}
