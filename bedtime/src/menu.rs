//! Numbered menus for category, tone, setting and post-story actions.
//!
//! An answer outside a menu falls back to the default choice, so a story
//! can always be generated.

use bedtime_core::{MenuSelection, StoryCategory, Tone, DEFAULT_SETTING};
use std::fmt::Write as _;

pub const CATEGORIES: &[(StoryCategory, &str)] = &[
    (StoryCategory::Adventure, "Adventure - Exciting discoveries and brave choices"),
    (StoryCategory::Fantasy, "Fantasy - Magic, talking animals, enchanted objects"),
    (StoryCategory::Animal, "Animal - Stories about animals with relatable personalities"),
    (StoryCategory::Friendship, "Friendship - Cooperation, sharing, and kindness"),
    (StoryCategory::Bedtime, "Bedtime - Calm, soothing stories perfect for sleep"),
    (StoryCategory::Educational, "Educational - Learning woven into the story"),
    (StoryCategory::Funny, "Funny - Silly situations and gentle humor"),
];

pub const TONES: &[(Tone, &str)] = &[
    (Tone::Whimsical, "Whimsical - Light, playful, and magical"),
    (Tone::Exciting, "Exciting - Adventurous and energetic"),
    (Tone::Calming, "Calming - Peaceful and soothing"),
    (Tone::Humorous, "Humorous - Funny and silly"),
    (Tone::Heartwarming, "Heartwarming - Touching and emotional"),
    (Tone::Inspiring, "Inspiring - Uplifting and motivational"),
];

pub const SETTINGS: &[(&str, &str)] = &[
    (
        "a magical forest with enchanted trees",
        "Magical forest - Enchanted woods with talking trees",
    ),
    (
        "under the sea with colorful coral reefs",
        "Under the sea - Ocean depths with colorful sea creatures",
    ),
    ("a cozy village where everyone is friendly", "Cozy village - A friendly neighborhood"),
    (
        "outer space among twinkling stars and friendly planets",
        "Outer space - Stars, planets, and friendly aliens",
    ),
    ("a sunny farm with happy animals", "Farm - Barns, fields, and farm animals"),
    ("a grand castle in a peaceful kingdom", "Castle - Royal kingdoms and brave knights"),
    ("a lush jungle full of wonder", "Jungle - Tropical wilderness with exotic animals"),
    ("the snowy Arctic with playful polar animals", "Arctic - Snowy landscapes with polar animals"),
    (
        "a child's bedroom where toys come to life",
        "Child's bedroom - Toys and imagination come alive",
    ),
];

/// What to do with a finished story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Finish,
    ReadAloud,
    Modify,
    Regenerate,
    StartOver,
    ChoiceMode,
    ExportJson,
}

pub const ACTIONS: &[(Action, &str)] = &[
    (Action::Finish, "Finish (optionally save this story)"),
    (Action::ReadAloud, "Listen in Bedtime Reading Mode (slow narration)"),
    (Action::Modify, "Request changes to this story"),
    (Action::Regenerate, "Generate a completely new version of this story (same idea)"),
    (Action::StartOver, "Start over with a different story idea"),
    (Action::ChoiceMode, "Continue with Interactive Choice Mode (pick what happens next)"),
    (Action::ExportJson, "Export the story and judge notes as JSON"),
];

/// The entry for a 1-based menu answer.
pub fn pick<T: Copy>(options: &[(T, &str)], answer: &str) -> Option<T> {
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| options.get(index))
        .map(|(value, _)| *value)
}

/// Render a menu with `[n]` keys.
pub fn render<T>(heading: &str, options: &[(T, &str)]) -> String {
    let mut out = format!("\n{heading}\n");
    for (index, (_, label)) in options.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {label}", index + 1);
    }
    out
}

/// Turn the three menu answers into a selection. Out-of-range answers
/// take the documented defaults.
pub fn selection_from_answers(category: &str, tone: &str, setting: &str) -> MenuSelection {
    MenuSelection::new()
        .with_category(pick(CATEGORIES, category).unwrap_or_default())
        .with_tone(pick(TONES, tone).unwrap_or_default())
        .with_setting(pick(SETTINGS, setting).unwrap_or(DEFAULT_SETTING))
}
