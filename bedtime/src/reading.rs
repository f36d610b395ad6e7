//! Bedtime reading mode: the story printed at a read-aloud pace.

use crate::display::{heavy_rule, light_rule};
use bedtime_core::Story;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const TITLE_LETTER_PAUSE: Duration = Duration::from_millis(50);
const SECTION_PAUSE: Duration = Duration::from_millis(500);
const CLOSING_PAUSE: Duration = Duration::from_secs(1);

/// A piece of text and the pause after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beat {
    pub text: String,
    pub pause: Duration,
}

impl Beat {
    fn new(text: impl Into<String>, pause: Duration) -> Self {
        Self {
            text: text.into(),
            pause,
        }
    }
}

/// The narration script: the title letter by letter, then the story and
/// moral word by word. Sentence ends hold for three beats.
pub fn narration(story: &Story, pace: Duration) -> Vec<Beat> {
    let mut beats = vec![Beat::new(
        format!("\n{}\nBedtime Reading Mode Activated...\n{}\n\n", heavy_rule(), heavy_rule()),
        Duration::ZERO,
    )];

    beats.extend(
        story
            .title
            .chars()
            .map(|c| Beat::new(c.to_string(), TITLE_LETTER_PAUSE)),
    );
    beats.push(Beat::new("\n\n", SECTION_PAUSE));

    for word in story.content.split_whitespace() {
        let pause = if word.ends_with(['.', '!', '?']) {
            pace * 3
        } else {
            pace
        };
        beats.push(Beat::new(format!("{word} "), pause));
    }

    beats.push(Beat::new(format!("\n\n{}\n", light_rule()), SECTION_PAUSE));
    beats.push(Beat::new("Moral: ", Duration::ZERO));
    beats.extend(
        story
            .moral
            .split_whitespace()
            .map(|word| Beat::new(format!("{word} "), pace)),
    );
    beats.push(Beat::new(format!("\n{}\n", heavy_rule()), CLOSING_PAUSE));
    beats.push(Beat::new("\nThe End. Sweet dreams...\n", CLOSING_PAUSE));
    beats
}

/// Exit status for a Ctrl+C outside reading mode.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Default)]
struct InterruptState {
    reading: AtomicBool,
    skip: Notify,
}

/// Ctrl+C routing for the whole program.
///
/// tokio's signal handler stays installed once `ctrl_c` has been awaited,
/// so a single listener owns it: during narration Ctrl+C skips to the end,
/// anywhere else it exits as the default handler would.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    state: Arc<InterruptState>,
}

impl Interrupts {
    /// Start the program-wide listener.
    pub fn install() -> Self {
        let interrupts = Self::default();
        let listener = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !listener.interrupt() {
                    std::process::exit(INTERRUPTED_EXIT);
                }
            }
        });
        interrupts
    }

    /// Deliver one Ctrl+C. Returns false when nothing is being narrated.
    fn interrupt(&self) -> bool {
        if self.state.reading.load(Ordering::SeqCst) {
            self.state.skip.notify_waiters();
            true
        } else {
            false
        }
    }
}

async fn perform(beats: &[Beat]) -> io::Result<()> {
    let mut out = io::stdout();
    for beat in beats {
        write!(out, "{}", beat.text)?;
        out.flush()?;
        if !beat.pause.is_zero() {
            tokio::time::sleep(beat.pause).await;
        }
    }
    Ok(())
}

/// Narrate `story`. Ctrl+C skips to the end.
pub async fn read_aloud(story: &Story, pace: Duration, interrupts: &Interrupts) -> io::Result<()> {
    let beats = narration(story, pace);
    let skipped = interrupts.state.skip.notified();
    interrupts.state.reading.store(true, Ordering::SeqCst);
    let result = tokio::select! {
        result = perform(&beats) => result,
        _ = skipped => {
            println!("\n\nSkipped to the end!\n");
            Ok(())
        }
    };
    interrupts.state.reading.store(false, Ordering::SeqCst);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACE: Duration = Duration::from_millis(300);

    #[test]
    fn test_sentence_ends_hold_longer() {
        let story = Story::draft("Hi", "Owl hooted. Then slept", "Rest.");
        let beats = narration(&story, PACE);

        let hooted = beats.iter().find(|b| b.text == "hooted. ").unwrap();
        assert_eq!(hooted.pause, PACE * 3);
        let then = beats.iter().find(|b| b.text == "Then ").unwrap();
        assert_eq!(then.pause, PACE);
    }

    #[test]
    fn test_title_is_spelled_out() {
        let story = Story::draft("Owl", "Body.", "Moral.");
        let letters: Vec<_> = narration(&story, PACE)
            .into_iter()
            .filter(|b| b.pause == TITLE_LETTER_PAUSE)
            .map(|b| b.text)
            .collect();
        assert_eq!(letters, vec!["O", "w", "l"]);
    }

    #[tokio::test]
    async fn test_interrupt_skips_only_while_reading() {
        let interrupts = Interrupts::default();
        assert!(!interrupts.interrupt());

        let story = Story::draft("Owl", "A very long night.", "Rest.");
        let reading = read_aloud(&story, Duration::from_secs(3600), &interrupts);
        let skip = async {
            tokio::task::yield_now().await;
            interrupts.interrupt()
        };
        let (result, delivered) = tokio::join!(reading, skip);

        assert!(result.is_ok());
        assert!(delivered);
        assert!(!interrupts.interrupt());
    }

    #[test]
    fn test_script_ends_with_goodnight() {
        let story = Story::draft("T", "B.", "M.");
        let beats = narration(&story, PACE);
        assert!(beats.last().unwrap().text.contains("Sweet dreams"));
        let text: String = beats.iter().map(|b| b.text.as_str()).collect();
        assert!(text.contains("Moral: M. "));
    }
}
