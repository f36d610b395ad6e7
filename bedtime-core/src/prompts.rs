//! Static prompt templates.
//!
//! Selection is a pure lookup: the storyteller prompt by category, the
//! judge prompt by round. Templates are assembled once on first use.

use crate::request::StoryCategory;
use strum::IntoEnumIterator;

const ANALYZER: &str = include_str!("prompts/analyzer.txt");
const STORYTELLER: &str = include_str!("prompts/storyteller.txt");
const JUDGE: &str = include_str!("prompts/judge.txt");
const JUDGE_FIRST_DRAFT: &str = include_str!("prompts/judge_first_draft.txt");
const JUDGE_REVISION: &str = include_str!("prompts/judge_revision.txt");
const CHOICE_PROPOSER: &str = include_str!("prompts/choice_proposer.txt");

lazy_static::lazy_static! {
    static ref STORYTELLER_BY_CATEGORY: Vec<(StoryCategory, String)> = StoryCategory::iter()
        .map(|category| (category, format!("{STORYTELLER}\n{}", category_focus(category))))
        .collect();
    static ref JUDGE_ROUND_ONE: String = format!("{JUDGE}\n{JUDGE_FIRST_DRAFT}");
    static ref JUDGE_LATER_ROUNDS: String = format!("{JUDGE}\n{JUDGE_REVISION}");
}

fn category_focus(category: StoryCategory) -> &'static str {
    match category {
        StoryCategory::Adventure => "ADVENTURE FOCUS: Include exciting discoveries, brave choices, and exploration. The character should show courage but always stay safe.",
        StoryCategory::Fantasy => "FANTASY FOCUS: Include magical elements like talking animals, enchanted objects, or gentle magic. Keep magic whimsical and wonder-inducing.",
        StoryCategory::Animal => "ANIMAL FOCUS: Feature animals with relatable personalities. Show their natural behaviors mixed with child-like emotions and adventures.",
        StoryCategory::Friendship => "FRIENDSHIP FOCUS: Emphasize cooperation, sharing, understanding differences, and the joy of having friends.",
        StoryCategory::Bedtime => "BEDTIME FOCUS: Create a soothing atmosphere. Include cozy imagery like warm blankets, twinkling stars, and peaceful nights.",
        StoryCategory::Educational => "EDUCATIONAL FOCUS: Weave in a learning element naturally (counting, colors, nature facts, kindness lessons).",
        StoryCategory::Funny => "HUMOR FOCUS: Include silly situations, playful wordplay, and gentle humor that makes children giggle.",
    }
}

pub fn analyzer_system_prompt() -> &'static str {
    ANALYZER
}

/// Storyteller persona for a category. Shared by drafting, refinement,
/// user modification and continuation.
pub fn storyteller_system_prompt(category: StoryCategory) -> &'static str {
    STORYTELLER_BY_CATEGORY
        .iter()
        .find(|(c, _)| *c == category)
        .map_or(STORYTELLER, |(_, prompt)| prompt.as_str())
}

/// Judge persona for a 1-based round.
pub fn judge_system_prompt(round: u32) -> &'static str {
    if round <= 1 {
        JUDGE_ROUND_ONE.as_str()
    } else {
        JUDGE_LATER_ROUNDS.as_str()
    }
}

pub fn choice_proposer_system_prompt() -> &'static str {
    CHOICE_PROPOSER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_its_focus() {
        for category in StoryCategory::iter() {
            let prompt = storyteller_system_prompt(category);
            assert!(prompt.starts_with("You are a master children's storyteller"));
            assert!(prompt.contains(category_focus(category)));
        }
    }

    #[test]
    fn test_categories_get_distinct_prompts() {
        assert_ne!(
            storyteller_system_prompt(StoryCategory::Funny),
            storyteller_system_prompt(StoryCategory::Bedtime)
        );
    }

    #[test]
    fn test_judge_prompt_varies_by_round() {
        assert!(judge_system_prompt(1).contains("first draft"));
        assert!(judge_system_prompt(2).contains("PRIOR FEEDBACK"));
        assert_eq!(judge_system_prompt(3), judge_system_prompt(5));
        assert!(judge_system_prompt(1).contains("EXCEPTIONAL"));
    }
}
