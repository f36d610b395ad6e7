//! Bedtime story generator.
//!
//! A line-oriented interface: describe an idea, pick a category, tone and
//! setting, then read, change, regenerate or extend the judged story.
//!
//! ```bash
//! cargo run -p bedtime -- --max-rounds 3 --verbose
//! ```

mod app;
mod console;
mod display;
mod menu;
mod reading;
mod save;

use bedtime_core::{PipelineConfig, StoryPipeline};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Generate children's stories, judged and refined until they are good enough.
#[derive(Debug, Parser)]
#[command(name = "bedtime", version, about)]
struct Cli {
    /// Model to use (overrides BEDTIME_MODEL)
    #[arg(long, env = "BEDTIME_MODEL")]
    model: Option<String>,

    /// Maximum judge rounds per story
    #[arg(long, default_value_t = 5)]
    max_rounds: u32,

    /// Show pipeline progress logs on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Hide per-criterion judge details
    #[arg(short, long)]
    quiet: bool,

    /// Milliseconds per word in bedtime reading mode
    #[arg(long, default_value_t = 300)]
    reading_pace_ms: u64,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,bedtime=info,bedtime_core=info,claude=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Check for API key
    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let mut config = PipelineConfig::from_env().with_max_rounds(cli.max_rounds);
    if let Some(model) = &cli.model {
        config = config.with_model(model);
    }

    let pipeline = match StoryPipeline::from_env(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to set up the story pipeline: {e}");
            std::process::exit(1);
        }
    };

    let options = app::AppOptions {
        show_details: !cli.quiet,
        reading_pace: std::time::Duration::from_millis(cli.reading_pace_ms),
        score_threshold: pipeline.config().score_threshold,
        interrupts: reading::Interrupts::install(),
    };
    app::run(&pipeline, options).await?;
    Ok(())
}
