//! Interactive choice mode: the reader picks what happens next, one short
//! beat at a time.

use crate::completion::{CompletionClient, GenerationError, StageParams};
use crate::parser::{ExtractionSchema, FieldSpec};
use crate::prompts;
use crate::request::StoryRequest;
use crate::story::Story;
use regex::Regex;

/// Beats offered per choice session.
pub const CHOICE_MODE_STEPS: u32 = 3;

pub const DEFAULT_FIRST_CHOICE: &str = "Follow a trail of twinkling lights to see where it leads.";
pub const DEFAULT_SECOND_CHOICE: &str = "Ask a friendly neighbor for help and a cozy hint.";

const CHOICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::line("first", &["choice[_ ]?1", "option[_ ]?1"], ""),
    FieldSpec::line("second", &["choice[_ ]?2", "option[_ ]?2"], ""),
];

const CONTINUATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::block("continuation", &["continuation"], ""),
    FieldSpec::block("moral", &["moral"], ""),
    FieldSpec::line("version", &["version"], ""),
];

lazy_static::lazy_static! {
    static ref CHOICE_SCHEMA: ExtractionSchema =
        ExtractionSchema::new(CHOICE_FIELDS).expect("valid choice labels");
    static ref CONTINUATION_SCHEMA: ExtractionSchema =
        ExtractionSchema::new(CONTINUATION_FIELDS).expect("valid continuation labels");
    static ref NUMBERED: Regex =
        Regex::new(r"^\s*[12][.)]\s*(.+)$").expect("valid numbered pattern");
}

/// The two options offered at one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePair {
    pub first: String,
    pub second: String,
}

impl ChoicePair {
    /// The option for a 1-based pick.
    pub fn get(&self, pick: usize) -> Option<&str> {
        match pick {
            1 => Some(&self.first),
            2 => Some(&self.second),
            _ => None,
        }
    }
}

/// `CHOICE_1`/`CHOICE_2`, then `1.`/`2)` lines, then fixed defaults.
pub(crate) fn parse_choices(text: &str) -> ChoicePair {
    let fields = CHOICE_SCHEMA.extract(text);
    let mut first = fields.get("first").to_string();
    let mut second = fields.get("second").to_string();

    if first.is_empty() || second.is_empty() {
        let numbered: Vec<&str> = text
            .lines()
            .filter_map(|line| NUMBERED.captures(line))
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect();
        if let [one, two, ..] = numbered.as_slice() {
            first = one.to_string();
            second = two.to_string();
        }
    }

    if first.is_empty() {
        tracing::debug!("first choice defaulted");
        first = DEFAULT_FIRST_CHOICE.to_string();
    }
    if second.is_empty() {
        tracing::debug!("second choice defaulted");
        second = DEFAULT_SECOND_CHOICE.to_string();
    }
    ChoicePair { first, second }
}

/// Offers two child-safe options for what happens next.
#[derive(Clone)]
pub struct ChoiceProposer {
    client: CompletionClient,
    params: StageParams,
}

impl ChoiceProposer {
    pub fn new(client: CompletionClient, params: StageParams) -> Self {
        Self { client, params }
    }

    pub async fn propose(
        &self,
        story: &Story,
        request: &StoryRequest,
        step: u32,
        total: u32,
    ) -> Result<ChoicePair, GenerationError> {
        let prompt = format!(
            "Propose two next-step options.\n\n\
             CONTEXT:\n\
             - Interactive step: {step} of {total}\n\
             - Requested category: {}\n\
             - Tone: {}\n\
             - Setting: {}\n\n\
             STORY SO FAR:\n{}\n",
            request.category,
            request.tone,
            request.setting,
            story.to_context(),
        );

        let response = self
            .client
            .complete(&prompt, prompts::choice_proposer_system_prompt(), self.params)
            .await?;
        Ok(parse_choices(&response))
    }
}

/// One beat of continuation.
#[derive(Debug, Clone)]
pub struct ContinuationBeat {
    /// The story with the beat appended, one version later.
    pub story: Story,
    /// The newly written text alone.
    pub passage: String,
    /// A closing moral, when the model wrote one.
    pub moral: Option<String>,
}

impl ContinuationBeat {
    /// A moral closes the story, so choice mode stops.
    pub fn ends_story(&self) -> bool {
        self.moral.is_some()
    }
}

/// Append a beat to `story`, keeping the title.
pub(crate) fn append_beat(story: &Story, response: &str) -> ContinuationBeat {
    let fields = CONTINUATION_SCHEMA.extract(response);
    let passage = if fields.was_defaulted("continuation") {
        fields.unlabeled().to_string()
    } else {
        fields.get("continuation").to_string()
    };
    let moral = Some(fields.get("moral").to_string()).filter(|m| !m.is_empty());

    let content = format!("{}\n\n{}", story.content.trim_end(), passage.trim())
        .trim()
        .to_string();
    let next = story.revise(
        story.title.clone(),
        content,
        moral.clone().unwrap_or_else(|| story.moral.clone()),
    );

    ContinuationBeat {
        story: next,
        passage,
        moral,
    }
}

/// Writes the next beat after the reader's pick.
#[derive(Clone)]
pub struct Continuation {
    client: CompletionClient,
    params: StageParams,
}

impl Continuation {
    pub fn new(client: CompletionClient, params: StageParams) -> Self {
        Self { client, params }
    }

    /// Continue `story` with `option`. The last step asks for a moral.
    pub async fn extend(
        &self,
        story: &Story,
        request: &StoryRequest,
        option: &str,
        step: u32,
        total: u32,
    ) -> Result<ContinuationBeat, GenerationError> {
        let ending = if step >= total {
            "FINAL STEP:\n\
             - Resolve the story with a satisfying, cozy ending\n\
             - Include a short calming closing that feels bedtime-ready\n\
             - Output a MORAL in one sentence\n\n\
             OUTPUT FORMAT:\nCONTINUATION:\n[continuation text]\nMORAL: [one sentence]\n"
        } else {
            "NOT FINAL YET:\n\
             - End with a gentle, curious moment (not scary) that invites the next choice\n\
             - Do NOT include a moral yet\n\n\
             OUTPUT FORMAT:\nCONTINUATION:\n[continuation text]\n"
        };

        let prompt = format!(
            "Continue the bedtime story in an interactive way.\n\n\
             REQUEST DETAILS:\n{}\n\n\
             STORY SO FAR:\n{}\n\n\
             USER CHOSEN OPTION:\n{option}\n\n\
             CONSTRAINTS:\n\
             - Ages 5-10, safe and not scary\n\
             - Keep it consistent with the setting and tone\n\
             - Write 120-200 words\n\
             - Continue smoothly from the last sentence\n\n\
             {ending}",
            request.details(),
            story.to_context(),
        );

        let response = self
            .client
            .complete(
                &prompt,
                prompts::storyteller_system_prompt(request.category),
                self.params,
            )
            .await?;

        let beat = append_beat(story, &response);
        tracing::info!(
            step,
            total,
            version = beat.story.version(),
            ends = beat.ends_story(),
            "story continued"
        );
        Ok(beat)
    }
}
