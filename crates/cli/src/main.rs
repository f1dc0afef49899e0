use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commute_core::{normalize_utterance, segment_utterance};
use commute_observability::{init_tracing, AppMetrics};
use commute_pipeline::{PipelineSettings, QueryPipeline};

#[derive(Debug, Parser)]
#[command(name = "commute")]
#[command(about = "Commute query understanding CLI")]
struct Cli {
    /// JSONL file of `{"text", "intent"}` examples for the centroid intent model.
    #[arg(long, global = true, env = "COMMUTE_INTENT_DATASET")]
    intent_dataset: Option<PathBuf>,

    /// JSON gazetteer mapping entity types to phrases.
    #[arg(long, global = true, env = "COMMUTE_GAZETTEER")]
    gazetteer: Option<PathBuf>,

    #[arg(long, global = true, env = "COMMUTE_WORDPIECE_VOCAB")]
    wordpiece_vocab: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print intents and entities for one utterance.
    Understand {
        text: String,
        /// Print per-sub-query scores, tokens and tagged pieces as well.
        #[arg(long)]
        explain: bool,
    },
    Segment {
        text: String,
    },
    Normalize {
        text: String,
    },
    Chat,
}

fn main() -> Result<()> {
    init_tracing("commute_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Segment { ref text } => {
            println!("{}", serde_json::to_string_pretty(&segment_utterance(text))?);
        }
        Command::Normalize { ref text } => {
            println!("{}", serde_json::to_string_pretty(&normalize_utterance(text))?);
        }
        Command::Understand { ref text, explain } => {
            let pipeline = build_pipeline(&cli)?;
            if explain {
                let analysis = pipeline.analyze(text)?;
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                let result = pipeline.understand(text)?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
        Command::Chat => run_chat(&build_pipeline(&cli)?)?,
    }

    Ok(())
}

fn build_pipeline(cli: &Cli) -> Result<QueryPipeline> {
    let mut settings = PipelineSettings::from_env();
    settings.ml.intent_dataset = cli.intent_dataset.clone();
    settings.ml.gazetteer = cli.gazetteer.clone();
    settings.ml.wordpiece_vocab = cli.wordpiece_vocab.clone();

    QueryPipeline::load(&settings, AppMetrics::shared()).context("failed to load models")
}

fn run_chat(pipeline: &QueryPipeline) -> Result<()> {
    println!("Commute query chat mode. type 'exit' to quit.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        match pipeline.understand(message) {
            Ok(result) => {
                println!("intents:  {}", result.intents.join(", "));
                for (kind, values) in &result.entities {
                    println!("{kind:<12}{}", values.join(" | "));
                }
                println!();
            }
            Err(err) => eprintln!("error: {err:#}\n"),
        }
    }

    Ok(())
}
