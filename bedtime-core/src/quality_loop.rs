//! The draft, judge, refine cycle.
//!
//! ```text
//! Drafting -> Evaluating -> Done
//!                 ^    \
//!                 |     v
//!                 Refining
//! ```
//!
//! Each transition takes the cycle state by value and hands it to the next
//! state, so the story and its history have exactly one owner at a time.

use crate::completion::GenerationError;
use crate::judge::Judge;
use crate::refine::Refiner;
use crate::request::StoryRequest;
use crate::story::{JudgeFeedback, Story};
use crate::storyteller::Storyteller;
use serde::{Deserialize, Serialize};

/// Why a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// A round scored at or above the threshold.
    ThresholdMet,
    /// The last allowed round was judged.
    RoundCap,
}

/// The story under refinement and every judgement so far.
#[derive(Debug, Clone)]
pub struct CycleState {
    pub story: Story,
    pub history: Vec<JudgeFeedback>,
}

impl CycleState {
    pub fn new(story: Story) -> Self {
        Self {
            story,
            history: Vec::new(),
        }
    }

    /// Completed rounds.
    pub fn round(&self) -> u32 {
        self.history.len() as u32
    }
}

/// What a finished cycle yields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub story: Story,
    pub history: Vec<JudgeFeedback>,
    pub stop: StopReason,
}

impl CycleOutcome {
    /// The last round's reported score.
    pub fn final_score(&self) -> Option<u8> {
        self.history.last().map(|f| f.overall_score)
    }
}

#[derive(Debug, Clone)]
pub enum LoopState {
    Drafting,
    Evaluating(CycleState),
    Refining(CycleState),
    Done(CycleOutcome),
}

/// Progress notifications for callers that show the cycle as it runs.
#[derive(Debug, Clone, Copy)]
pub enum LoopEvent<'a> {
    Drafted(&'a Story),
    Judged(&'a JudgeFeedback),
    Refined(&'a Story),
    Finished(StopReason),
}

/// Whether the cycle stops after judging `round` with `score`.
pub fn stop_reason(score: u8, round: u32, threshold: u8, max_rounds: u32) -> Option<StopReason> {
    if score >= threshold {
        Some(StopReason::ThresholdMet)
    } else if round >= max_rounds {
        Some(StopReason::RoundCap)
    } else {
        None
    }
}

/// Drives one cycle from first draft to a final story.
#[derive(Clone)]
pub struct QualityLoop {
    storyteller: Storyteller,
    judge: Judge,
    refiner: Refiner,
    max_rounds: u32,
    score_threshold: u8,
}

impl QualityLoop {
    pub fn new(
        storyteller: Storyteller,
        judge: Judge,
        refiner: Refiner,
        max_rounds: u32,
        score_threshold: u8,
    ) -> Self {
        Self {
            storyteller,
            judge,
            refiner,
            max_rounds: max_rounds.max(1),
            score_threshold,
        }
    }

    /// Run a full cycle, reporting each transition to `observe`.
    pub async fn run_with<F>(
        &self,
        request: &StoryRequest,
        mut observe: F,
    ) -> Result<CycleOutcome, GenerationError>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let mut state = LoopState::Drafting;
        loop {
            state = match self.step(state, request, &mut observe).await? {
                LoopState::Done(outcome) => return Ok(outcome),
                next => next,
            };
        }
    }

    /// Perform one transition.
    pub async fn step<F>(
        &self,
        state: LoopState,
        request: &StoryRequest,
        observe: &mut F,
    ) -> Result<LoopState, GenerationError>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        match state {
            LoopState::Drafting => {
                let story = self.storyteller.generate(request).await?;
                observe(&LoopEvent::Drafted(&story));
                Ok(LoopState::Evaluating(CycleState::new(story)))
            }

            LoopState::Evaluating(mut cycle) => {
                let round = cycle.round() + 1;
                tracing::info!(round, max_rounds = self.max_rounds, "judging round");
                let feedback = self
                    .judge
                    .evaluate(&cycle.story, request, &cycle.history)
                    .await?;
                observe(&LoopEvent::Judged(&feedback));
                let score = feedback.overall_score;
                cycle.history.push(feedback);

                match stop_reason(score, round, self.score_threshold, self.max_rounds) {
                    Some(stop) => {
                        match stop {
                            StopReason::ThresholdMet => {
                                tracing::info!(round, score, "quality threshold met")
                            }
                            StopReason::RoundCap => {
                                tracing::info!(round, score, "round cap reached")
                            }
                        }
                        observe(&LoopEvent::Finished(stop));
                        Ok(LoopState::Done(CycleOutcome {
                            story: cycle.story,
                            history: cycle.history,
                            stop,
                        }))
                    }
                    None => Ok(LoopState::Refining(cycle)),
                }
            }

            LoopState::Refining(mut cycle) => {
                let Some(feedback) = cycle.history.last() else {
                    return Ok(LoopState::Evaluating(cycle));
                };
                let refined = self.refiner.refine(&cycle.story, request, feedback).await?;
                observe(&LoopEvent::Refined(&refined));
                cycle.story = refined;
                Ok(LoopState::Evaluating(cycle))
            }

            done @ LoopState::Done(_) => Ok(done),
        }
    }
}
