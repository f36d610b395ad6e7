//! The interactive story loop.

use crate::console::Console;
use crate::display::{self, heavy_rule, light_rule};
use crate::menu::{self, Action};
use crate::{reading, save};
use bedtime_core::{LoopEvent, StoryPipeline, StorySession, CHOICE_MODE_STEPS};
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

type AppResult<T> = Result<T, Box<dyn Error>>;

/// Display options from the command line.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub show_details: bool,
    pub reading_pace: Duration,
    pub score_threshold: u8,
    pub interrupts: reading::Interrupts,
}

/// Where to go after the post-story menu.
enum Flow {
    NewIdea,
    Exit,
}

const QUIT_WORDS: &[&str] = &["quit", "exit", "q"];

pub async fn run(pipeline: &StoryPipeline, options: AppOptions) -> AppResult<()> {
    let mut console = Console::stdio();

    println!("\n{}", heavy_rule());
    println!("BEDTIME STORY GENERATOR");
    println!("For children ages 5-10");
    println!("{}", heavy_rule());
    println!("\nType 'quit' at any time to exit.\n");

    loop {
        let Some(idea) = console
            .ask("What is your story idea? (e.g., 'a brave dragon', 'a lost teddy bear'): ")?
        else {
            println!("\nSweet dreams! Goodnight!\n");
            return Ok(());
        };

        if QUIT_WORDS.contains(&idea.to_lowercase().as_str()) {
            println!("\nSweet dreams! Goodnight!\n");
            return Ok(());
        }
        if idea.is_empty() {
            println!("Please tell me your story idea!\n");
            continue;
        }

        let Some(selection) = ask_selection(&mut console)? else {
            return Ok(());
        };

        println!("\n{}", light_rule());
        println!("Generating your story:");
        println!("  Idea: {idea}");
        println!("{}", light_rule());
        println!("\nCrafting your story...");

        let threshold = options.score_threshold;
        let details = options.show_details;
        let started = StorySession::begin_with(pipeline, &idea, selection, |event| {
            println!("{}", display::render_event(event, details, threshold));
        })
        .await;

        let mut session = match started {
            Ok(session) => session,
            Err(e) => {
                println!("\nError generating story: {e}\n");
                continue;
            }
        };

        print!("{}", display::render_request(session.request()));
        print!("{}", display::render_story(session.story()));

        match post_story(&mut console, &mut session, &options).await? {
            Flow::NewIdea => continue,
            Flow::Exit => return Ok(()),
        }
    }
}

fn ask_selection<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
) -> AppResult<Option<bedtime_core::MenuSelection>> {
    print!("{}", menu::render("Choose a story category:", menu::CATEGORIES));
    let Some(category) = console.ask("\nCategory (1-7): ")? else {
        return Ok(None);
    };
    print!("{}", menu::render("Choose the story tone:", menu::TONES));
    let Some(tone) = console.ask("\nTone (1-6): ")? else {
        return Ok(None);
    };
    print!("{}", menu::render("Choose the story setting:", menu::SETTINGS));
    let Some(setting) = console.ask("\nSetting (1-9): ")? else {
        return Ok(None);
    };
    Ok(Some(menu::selection_from_answers(&category, &tone, &setting)))
}

async fn post_story<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    session: &mut StorySession,
    options: &AppOptions,
) -> AppResult<Flow> {
    loop {
        print!("{}", menu::render("Would you like to:", menu::ACTIONS));
        let Some(answer) = console.ask("\nYour choice (1-7): ")? else {
            return Ok(Flow::Exit);
        };

        match menu::pick(menu::ACTIONS, &answer) {
            Some(Action::Finish) => {
                if console.confirm("\nWould you like to save this story to a file? (y/n): ")? {
                    report_save(save::save_story(Path::new("."), session.story()));
                }
                println!("\nEnjoy the story! Sweet dreams!\n");
                return Ok(Flow::Exit);
            }

            Some(Action::ReadAloud) => {
                println!("\nEntering Bedtime Reading Mode...");
                println!("(Press Ctrl+C to skip ahead if needed)\n");
                tokio::time::sleep(Duration::from_secs(1)).await;
                reading::read_aloud(session.story(), options.reading_pace, &options.interrupts)
                    .await?;
                println!("\nSweet dreams!\n");
                return Ok(Flow::NewIdea);
            }

            Some(Action::Modify) => {
                let Some(change) = console.ask("\nWhat changes would you like? ")? else {
                    return Ok(Flow::Exit);
                };
                if change.is_empty() {
                    continue;
                }
                match session.modify(&change).await {
                    Ok(story) => print!("{}", display::render_story(story)),
                    Err(e) => println!("\nError applying changes: {e}\n"),
                }
            }

            Some(Action::Regenerate) => {
                println!("\nGenerating a fresh story with the same request...");
                let details = options.show_details;
                let threshold = options.score_threshold;
                let result = session
                    .regenerate_with(|event: &LoopEvent<'_>| {
                        println!("{}", display::render_event(event, details, threshold));
                    })
                    .await;
                match result {
                    Ok(story) => print!("{}", display::render_story(story)),
                    Err(e) => println!("\nError generating new version: {e}\n"),
                }
            }

            Some(Action::StartOver) => return Ok(Flow::NewIdea),

            Some(Action::ChoiceMode) => match choice_mode(console, session).await {
                Ok(()) => {
                    print!("{}", display::render_story(session.story()));
                    report_save(save::save_story(Path::new("."), session.story()));
                    println!("\nEnjoy the story! Sweet dreams!\n");
                    return Ok(Flow::Exit);
                }
                Err(e) => println!("\nError during Interactive Choice Mode: {e}\n"),
            },

            Some(Action::ExportJson) => {
                let default = format!("{}.json", save::safe_stem(&session.story().title));
                let Some(answer) = console.ask(&format!("\nExport to [{default}]: "))? else {
                    return Ok(Flow::Exit);
                };
                let path = if answer.is_empty() {
                    PathBuf::from(default)
                } else {
                    PathBuf::from(answer)
                };
                match save::export_json(&path, &session.snapshot()) {
                    Ok(()) => println!("\nStory exported to: {}\n", path.display()),
                    Err(e) => println!("\nError exporting story: {e}\n"),
                }
            }

            None => println!("Please enter a number from 1 to {}.\n", menu::ACTIONS.len()),
        }
    }
}

fn report_save(result: std::io::Result<PathBuf>) {
    match result {
        Ok(path) => println!("\nStory saved to: {}", path.display()),
        Err(e) => println!("\nError saving file: {e}"),
    }
}

async fn choice_mode<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    session: &mut StorySession,
) -> AppResult<()> {
    let total = CHOICE_MODE_STEPS;

    println!("\n{}", heavy_rule());
    println!("Interactive Choice Mode");
    println!("Pick 1 or 2 at each step. Type 'quit' to exit this mode.");
    println!("{}\n", heavy_rule());

    for step in 1..=total {
        let choices = session.propose_choices(step, total).await?;
        println!("Step {step}/{total} choices:");
        println!("  [1] {}", choices.first);
        println!("  [2] {}", choices.second);

        let pick = loop {
            let Some(answer) = console.ask("\nYour choice (1/2 or 'quit'): ")? else {
                return Ok(());
            };
            let answer = answer.to_lowercase();
            if QUIT_WORDS.contains(&answer.as_str()) {
                println!("\nExiting Interactive Choice Mode.\n");
                return Ok(());
            }
            match answer.parse::<usize>() {
                Ok(n @ (1 | 2)) => break n,
                _ => println!("Please enter 1, 2, or 'quit'."),
            }
        };

        let option = choices.get(pick).unwrap_or(&choices.first).to_string();
        let beat = session.continue_with_choice(&option, step, total).await?;

        println!("\n{}", light_rule());
        println!("Continuation:");
        println!("{}", beat.passage.trim());
        if let Some(moral) = &beat.moral {
            println!("\n{}", light_rule());
            println!("Moral: {moral}");
        }
        println!("{}\n", light_rule());

        if beat.ends_story() {
            break;
        }
    }

    println!("\nInteractive Choice Mode complete.\n");
    Ok(())
}
