//! The judge stage and its round-dependent strictness.

use crate::completion::{CompletionClient, GenerationError, StageParams};
use crate::parser::{bullet_items, parse_flag, parse_score, ExtractionSchema, FieldSpec};
use crate::prompts;
use crate::request::StoryRequest;
use crate::story::{CriteriaScores, Criterion, JudgeFeedback, Story};
use strum::IntoEnumIterator;

/// Score given to a criterion the judge left out.
pub const NEUTRAL_SCORE: u8 = 5;

const NO_FEEDBACK: &str = "The judge returned no written feedback.";

const JUDGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::line("overall", &["overall[_ ]?score", "overall", "score"], ""),
    FieldSpec::line("exceptional", &["exceptional"], ""),
    FieldSpec::line("age_appropriateness", &["age[_ ]?appropriateness"], ""),
    FieldSpec::line("engagement", &["engagement"], ""),
    FieldSpec::line("moral_clarity", &["moral[_ ]?clarity"], ""),
    FieldSpec::line("structure", &["story[_ ]?structure", "structure"], ""),
    FieldSpec::line("language_quality", &["language[_ ]?quality", "language"], ""),
    FieldSpec::block("feedback", &["feedback", "summary"], NO_FEEDBACK),
    FieldSpec::block("suggestions", &["suggestions?", "improvements?"], ""),
];

lazy_static::lazy_static! {
    static ref JUDGE_SCHEMA: ExtractionSchema =
        ExtractionSchema::new(JUDGE_FIELDS).expect("valid judge labels");
}

fn field_for(criterion: Criterion) -> &'static str {
    match criterion {
        Criterion::AgeAppropriateness => "age_appropriateness",
        Criterion::Engagement => "engagement",
        Criterion::MoralClarity => "moral_clarity",
        Criterion::Structure => "structure",
        Criterion::LanguageQuality => "language_quality",
    }
}

/// The score reported for a round.
///
/// A first draft is held to `ceiling` unless the judge flagged it as
/// exceptional. Later rounds report the raw score.
pub fn apply_ceiling(raw: u8, round: u32, exceptional: bool, ceiling: u8) -> u8 {
    if round <= 1 && !exceptional {
        raw.min(ceiling)
    } else {
        raw
    }
}

/// Turn a judge response into feedback for `round`.
///
/// Missing criteria take [`NEUTRAL_SCORE`]. A missing overall score is the
/// rounded mean of the criteria.
pub(crate) fn parse_judgement(text: &str, round: u32, ceiling: u8) -> JudgeFeedback {
    let fields = JUDGE_SCHEMA.extract(text);

    let mut criteria = CriteriaScores::uniform(NEUTRAL_SCORE);
    for criterion in Criterion::iter() {
        let score = parse_score(fields.get(field_for(criterion)), 1, 10, NEUTRAL_SCORE);
        criteria.set(criterion, score);
    }

    let mean = {
        let total: u32 = criteria.iter().map(|(_, s)| u32::from(s)).sum();
        ((total as f32 / 5.0).round() as u8).clamp(1, 10)
    };
    let raw_score = parse_score(fields.get("overall"), 1, 10, mean);
    let exceptional = parse_flag(fields.get("exceptional")).unwrap_or(false);
    let overall_score = apply_ceiling(raw_score, round, exceptional, ceiling);

    if overall_score < raw_score {
        tracing::warn!(
            round,
            raw_score,
            reported = overall_score,
            "first-draft score held to ceiling"
        );
    }

    JudgeFeedback {
        round,
        overall_score,
        raw_score,
        exceptional,
        criteria,
        feedback: fields.get("feedback").to_string(),
        suggestions: bullet_items(fields.get("suggestions")),
    }
}

/// Scores a story against the five criteria.
#[derive(Clone)]
pub struct Judge {
    client: CompletionClient,
    params: StageParams,
    round_one_ceiling: u8,
}

impl Judge {
    pub fn new(client: CompletionClient, params: StageParams, round_one_ceiling: u8) -> Self {
        Self {
            client,
            params,
            round_one_ceiling,
        }
    }

    /// Judge `story`. The round is `history.len() + 1`; earlier rounds are
    /// shown to the model so it can check which suggestions were addressed.
    pub async fn evaluate(
        &self,
        story: &Story,
        request: &StoryRequest,
        history: &[JudgeFeedback],
    ) -> Result<JudgeFeedback, GenerationError> {
        let round = history.len() as u32 + 1;

        let prior = if history.is_empty() {
            "(none, this is the first draft)".to_string()
        } else {
            history
                .iter()
                .map(JudgeFeedback::to_context)
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            "Evaluate this bedtime story.\n\n\
             REQUEST: \"{}\"\n\
             CATEGORY: {}\n\
             TONE: {}\n\n\
             {}\n\n\
             ROUND: {round}\n\
             PRIOR FEEDBACK:\n{prior}\n",
            request.raw_input,
            request.category,
            request.tone,
            story.to_context(),
        );

        let response = self
            .client
            .complete(&prompt, prompts::judge_system_prompt(round), self.params)
            .await?;

        let feedback = parse_judgement(&response, round, self.round_one_ceiling);
        tracing::info!(
            round,
            score = feedback.overall_score,
            suggestions = feedback.suggestions.len(),
            "story judged"
        );
        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "OVERALL_SCORE: 8\nEXCEPTIONAL: no\nAGE_APPROPRIATENESS: 9\nENGAGEMENT: 7\nMORAL_CLARITY: 8\nSTORY_STRUCTURE: 6\nLANGUAGE_QUALITY: 8\nFEEDBACK: Lovely imagery, but the middle drags.\nSUGGESTIONS:\n- Tighten the middle\n- Add a sound effect";

    #[test]
    fn test_ceiling_only_applies_to_round_one() {
        assert_eq!(apply_ceiling(9, 1, false, 6), 6);
        assert_eq!(apply_ceiling(9, 1, true, 6), 9);
        assert_eq!(apply_ceiling(4, 1, false, 6), 4);
        assert_eq!(apply_ceiling(9, 2, false, 6), 9);
    }

    #[test]
    fn test_full_response_round_two() {
        let feedback = parse_judgement(FULL, 2, 6);
        assert_eq!(feedback.round, 2);
        assert_eq!(feedback.overall_score, 8);
        assert_eq!(feedback.criteria.age_appropriateness, 9);
        assert_eq!(feedback.criteria.structure, 6);
        assert_eq!(feedback.feedback, "Lovely imagery, but the middle drags.");
        assert_eq!(feedback.suggestions, vec!["Tighten the middle", "Add a sound effect"]);
    }

    #[test]
    fn test_round_one_is_clamped() {
        let feedback = parse_judgement(FULL, 1, 6);
        assert_eq!(feedback.overall_score, 6);
        assert_eq!(feedback.raw_score, 8);
        assert!(feedback.was_capped());
    }

    #[test]
    fn test_exceptional_flag_lifts_ceiling() {
        let text = FULL.replace("EXCEPTIONAL: no", "EXCEPTIONAL: yes");
        let feedback = parse_judgement(&text, 1, 6);
        assert!(feedback.exceptional);
        assert_eq!(feedback.overall_score, 8);
    }

    #[test]
    fn test_high_number_alone_is_not_exceptional() {
        let feedback = parse_judgement("OVERALL_SCORE: 10\nFEEDBACK: Perfect!", 1, 6);
        assert!(!feedback.exceptional);
        assert_eq!(feedback.overall_score, 6);
    }

    #[test]
    fn test_missing_criteria_are_neutral() {
        let feedback = parse_judgement("Overall score: 7/10\nEngagement: 9", 2, 6);
        assert_eq!(feedback.overall_score, 7);
        assert_eq!(feedback.criteria.engagement, 9);
        assert_eq!(feedback.criteria.moral_clarity, NEUTRAL_SCORE);
        assert_eq!(feedback.feedback, NO_FEEDBACK);
        assert!(feedback.suggestions.is_empty());
    }

    #[test]
    fn test_missing_overall_uses_criteria_mean() {
        let text = "AGE_APPROPRIATENESS: 8\nENGAGEMENT: 8\nMORAL_CLARITY: 8\nSTORY_STRUCTURE: 8\nLANGUAGE_QUALITY: 8";
        let feedback = parse_judgement(text, 3, 6);
        assert_eq!(feedback.overall_score, 8);
    }

    #[test]
    fn test_markdown_decorated_response() {
        let text = "**Overall Score:** 5\n**Story Structure**: 4\n## Feedback\nNeeds a clearer ending.\n## Suggestions\n1. Resolve the lost-hat problem\n2. Shorten sentences";
        let feedback = parse_judgement(text, 2, 6);
        assert_eq!(feedback.overall_score, 5);
        assert_eq!(feedback.criteria.structure, 4);
        assert_eq!(feedback.feedback, "Needs a clearer ending.");
        assert_eq!(feedback.suggestions.len(), 2);
    }

    #[test]
    fn test_suggestions_may_start_with_criterion_names() {
        let text = format!(
            "{FULL}\n- Engagement: add a silly chase scene\n- Structure: give the climax a turn\n- Language: use more sound words"
        );
        let feedback = parse_judgement(&text, 2, 6);
        assert_eq!(
            feedback.suggestions,
            vec![
                "Tighten the middle",
                "Add a sound effect",
                "Engagement: add a silly chase scene",
                "Structure: give the climax a turn",
                "Language: use more sound words",
            ]
        );
        assert_eq!(feedback.criteria.engagement, 7);
        assert_eq!(feedback.criteria.structure, 6);
        assert_eq!(feedback.criteria.language_quality, 8);
    }

    #[test]
    fn test_mixed_suggestion_list_is_kept_whole() {
        let text = "OVERALL_SCORE: 5\nFEEDBACK: Sweet but slow.\nSUGGESTIONS:\n- Add dialogue\n- Engagement: add a chase\n- Slow the ending";
        let feedback = parse_judgement(text, 2, 6);
        assert_eq!(feedback.feedback, "Sweet but slow.");
        assert_eq!(
            feedback.suggestions,
            vec!["Add dialogue", "Engagement: add a chase", "Slow the ending"]
        );
        assert_eq!(feedback.criteria.engagement, NEUTRAL_SCORE);
    }

    #[test]
    fn test_bulleted_criteria_still_score() {
        let text = "- OVERALL_SCORE: 7\n- ENGAGEMENT: 9\n- MORAL_CLARITY: 4\nFEEDBACK: Fun.";
        let feedback = parse_judgement(text, 2, 6);
        assert_eq!(feedback.overall_score, 7);
        assert_eq!(feedback.criteria.engagement, 9);
        assert_eq!(feedback.criteria.moral_clarity, 4);
    }

    #[test]
    fn test_garbage_scores_clamp_into_range() {
        let feedback = parse_judgement("OVERALL_SCORE: 42\nENGAGEMENT: 0", 2, 6);
        assert_eq!(feedback.overall_score, 10);
        assert_eq!(feedback.criteria.engagement, 1);
    }
}
