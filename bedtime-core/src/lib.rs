//! Children's story pipeline with an AI judge.
//!
//! This crate provides:
//! - Request analysis that merges a free-text idea with menu choices
//! - Category-specific drafting and a judge with first-draft strictness
//! - A bounded refine-until-good-enough cycle with retrying completion calls
//! - Reader-driven modification and an interactive choice mode
//!
//! # Quick Start
//!
//! ```ignore
//! use bedtime_core::{MenuSelection, PipelineConfig, StoryPipeline, StorySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = StoryPipeline::from_env(PipelineConfig::from_env())?;
//!     let selection = MenuSelection::new().with_category(bedtime_core::StoryCategory::Funny);
//!
//!     let session = StorySession::begin(&pipeline, "a funny story about a cat", selection).await?;
//!
//!     println!("{}\n\n{}", session.story().title, session.story().content);
//!     Ok(())
//! }
//! ```

pub mod choices;
pub mod completion;
pub mod config;
pub mod judge;
pub mod parser;
pub mod prompts;
pub mod quality_loop;
pub mod refine;
pub mod request;
pub mod session;
pub mod story;
pub mod storyteller;
pub mod testing;

// Primary public API
pub use choices::{ChoicePair, ContinuationBeat, CHOICE_MODE_STEPS};
pub use completion::{
    CompletionClient, CompletionService, GenerationError, RetryPolicy, ServiceError, StageParams,
};
pub use config::PipelineConfig;
pub use quality_loop::{CycleOutcome, LoopEvent, QualityLoop, StopReason};
pub use request::{MenuSelection, StoryCategory, StoryRequest, Tone, DEFAULT_SETTING};
pub use session::{SessionError, SessionId, SessionSnapshot, StoryPipeline, StorySession};
pub use story::{CriteriaScores, Criterion, JudgeFeedback, Story};
pub use testing::{MockCompletion, MockReply};
