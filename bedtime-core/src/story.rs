//! Stories and judge feedback.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

/// A story draft.
///
/// The version starts at 1 and only moves forward through [`Story::revise`],
/// one step per refinement, user modification or continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub content: String,
    pub moral: String,
    version: u32,
}

impl Story {
    /// A first draft (version 1).
    pub fn draft(
        title: impl Into<String>,
        content: impl Into<String>,
        moral: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            moral: moral.into(),
            version: 1,
        }
    }

    /// The next version of this story.
    pub fn revise(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
        moral: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            moral: moral.into(),
            version: self.version + 1,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// The block every prompt uses to show a story to the model.
    pub fn to_context(&self) -> String {
        format!(
            "TITLE: {}\nSTORY:\n{}\nMORAL: {}\nVERSION: {}",
            self.title, self.content, self.moral, self.version
        )
    }
}

/// The five fixed judging criteria.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Criterion {
    AgeAppropriateness,
    Engagement,
    MoralClarity,
    Structure,
    LanguageQuality,
}

impl Criterion {
    /// Label used in judge prompts and responses.
    pub fn label(&self) -> &'static str {
        match self {
            Criterion::AgeAppropriateness => "AGE_APPROPRIATENESS",
            Criterion::Engagement => "ENGAGEMENT",
            Criterion::MoralClarity => "MORAL_CLARITY",
            Criterion::Structure => "STORY_STRUCTURE",
            Criterion::LanguageQuality => "LANGUAGE_QUALITY",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::AgeAppropriateness => "Age Appropriateness",
            Criterion::Engagement => "Engagement",
            Criterion::MoralClarity => "Moral Clarity",
            Criterion::Structure => "Story Structure",
            Criterion::LanguageQuality => "Language Quality",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One score (1-10) per [`Criterion`]; always complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaScores {
    pub age_appropriateness: u8,
    pub engagement: u8,
    pub moral_clarity: u8,
    pub structure: u8,
    pub language_quality: u8,
}

impl CriteriaScores {
    /// Every criterion at the same score.
    pub fn uniform(score: u8) -> Self {
        Self {
            age_appropriateness: score,
            engagement: score,
            moral_clarity: score,
            structure: score,
            language_quality: score,
        }
    }

    pub fn get(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::AgeAppropriateness => self.age_appropriateness,
            Criterion::Engagement => self.engagement,
            Criterion::MoralClarity => self.moral_clarity,
            Criterion::Structure => self.structure,
            Criterion::LanguageQuality => self.language_quality,
        }
    }

    pub fn set(&mut self, criterion: Criterion, score: u8) {
        let slot = match criterion {
            Criterion::AgeAppropriateness => &mut self.age_appropriateness,
            Criterion::Engagement => &mut self.engagement,
            Criterion::MoralClarity => &mut self.moral_clarity,
            Criterion::Structure => &mut self.structure,
            Criterion::LanguageQuality => &mut self.language_quality,
        };
        *slot = score;
    }

    /// `(criterion, score)` pairs in fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, u8)> + '_ {
        Criterion::iter().map(move |c| (c, self.get(c)))
    }
}

/// The judge's verdict for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeFeedback {
    /// 1-based round, equal to this entry's position in the cycle history.
    pub round: u32,
    /// Reported score after the round-one ceiling was applied.
    pub overall_score: u8,
    /// What the model actually answered, before any ceiling.
    pub raw_score: u8,
    /// The model flagged the draft as exceptional.
    pub exceptional: bool,
    pub criteria: CriteriaScores,
    pub feedback: String,
    pub suggestions: Vec<String>,
}

impl JudgeFeedback {
    /// Whether the reported score was lowered by the strictness ceiling.
    pub fn was_capped(&self) -> bool {
        self.overall_score < self.raw_score
    }

    /// Whether the feedback asks for a different title.
    pub fn targets_title(&self) -> bool {
        let mentions = |s: &str| s.to_lowercase().contains("title");
        mentions(&self.feedback) || self.suggestions.iter().any(|s| mentions(s))
    }

    /// The block used to show this round to the judge and refiner.
    pub fn to_context(&self) -> String {
        let mut out = format!(
            "ROUND {} FEEDBACK\nOVERALL_SCORE: {}\n",
            self.round, self.overall_score
        );
        for (criterion, score) in self.criteria.iter() {
            out.push_str(&format!("{}: {}\n", criterion.label(), score));
        }
        out.push_str(&format!("FEEDBACK: {}\nSUGGESTIONS:\n", self.feedback));
        if self.suggestions.is_empty() {
            out.push_str("- (no suggestions returned)\n");
        }
        for suggestion in &self.suggestions {
            out.push_str(&format!("- {suggestion}\n"));
        }
        out
    }
}
