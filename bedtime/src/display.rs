//! Text rendering for stories, requests and judge feedback.

use bedtime_core::{JudgeFeedback, LoopEvent, StopReason, Story, StoryRequest};
use std::fmt::Write as _;

pub const RULE_WIDTH: usize = 60;

pub fn heavy_rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn light_rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// Suggestions shown per round.
const MAX_SUGGESTIONS: usize = 6;

pub fn render_story(story: &Story) -> String {
    format!(
        "\n{heavy}\n{}\n{heavy}\n\n{}\n\n{}\nMoral: {}\n{heavy}\n",
        story.title,
        story.content,
        light_rule(),
        story.moral,
        heavy = heavy_rule(),
    )
}

pub fn render_request(request: &StoryRequest) -> String {
    let mut out = String::from("\nStory request details:\n");
    let _ = writeln!(out, "   Category: {}", request.category);
    let _ = writeln!(out, "   Tone: {}", request.tone);
    let _ = writeln!(out, "   Setting: {}", request.setting);
    if !request.characters.is_empty() {
        let _ = writeln!(out, "   Characters: {}", request.characters.join(", "));
    }
    if !request.themes.is_empty() {
        let _ = writeln!(out, "   Themes: {}", request.themes.join(", "));
    }
    out
}

pub fn render_feedback(feedback: &JudgeFeedback, details: bool) -> String {
    let mut out = format!(
        "\nJudge Score (round {}): {}/10",
        feedback.round, feedback.overall_score
    );
    if feedback.was_capped() {
        let _ = write!(out, " (first draft, judged {}/10)", feedback.raw_score);
    }
    out.push('\n');

    if details {
        for (criterion, score) in feedback.criteria.iter() {
            let _ = writeln!(out, "   {criterion}: {score}/10");
        }
        if !feedback.feedback.is_empty() {
            let _ = writeln!(out, "\n   {}", feedback.feedback);
        }
        if !feedback.suggestions.is_empty() {
            out.push_str("\n   Suggestions:\n");
            for suggestion in feedback.suggestions.iter().take(MAX_SUGGESTIONS) {
                let _ = writeln!(out, "    - {suggestion}");
            }
        }
    }
    out
}

/// Progress line for one cycle event.
pub fn render_event(event: &LoopEvent<'_>, details: bool, threshold: u8) -> String {
    match event {
        LoopEvent::Drafted(story) => format!("\nFirst draft ready: {}", story.title),
        LoopEvent::Judged(feedback) => render_feedback(feedback, details),
        LoopEvent::Refined(story) => {
            format!("   Refined story based on feedback (version {}).", story.version())
        }
        LoopEvent::Finished(StopReason::ThresholdMet) => {
            format!("   Reached threshold ({threshold}/10). Stopping early.")
        }
        LoopEvent::Finished(StopReason::RoundCap) => {
            "   Story refinement complete (max rounds reached).".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedtime_core::CriteriaScores;

    fn feedback(overall: u8, raw: u8) -> JudgeFeedback {
        JudgeFeedback {
            round: 1,
            overall_score: overall,
            raw_score: raw,
            exceptional: false,
            criteria: CriteriaScores::uniform(7),
            feedback: "Charming.".to_string(),
            suggestions: vec!["Add rhythm".to_string()],
        }
    }

    #[test]
    fn test_story_layout() {
        let text = render_story(&Story::draft("Moon Pie", "Once upon a time.", "Share."));
        assert!(text.contains(&format!("{}\nMoon Pie\n{}", heavy_rule(), heavy_rule())));
        assert!(text.contains("Moral: Share."));
    }

    #[test]
    fn test_feedback_details_toggle() {
        let full = render_feedback(&feedback(6, 6), true);
        assert!(full.contains("Engagement: 7/10"));
        assert!(full.contains("- Add rhythm"));

        let brief = render_feedback(&feedback(6, 6), false);
        assert!(!brief.contains("Engagement"));
    }

    #[test]
    fn test_capped_score_shows_raw() {
        let text = render_feedback(&feedback(6, 9), false);
        assert!(text.contains("6/10 (first draft, judged 9/10)"));
    }
}
