use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use handout_assistant::models::AnswerOutcome;
use handout_assistant::ranking::RankingMode;
use handout_assistant::{build_session, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "eval")]
#[command(about = "Run a question/answer evaluation set against one PDF")]
struct Cli {
    #[arg(long)]
    pdf: PathBuf,
    #[arg(long, default_value = "eval/prompts.jsonl")]
    file: String,
    #[arg(long)]
    mode: Option<RankingMode>,
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct EvalPrompt {
    id: String,
    question: String,
    #[serde(default)]
    expect_contains: Vec<String>,
    #[serde(default)]
    expect_segment: Option<u32>,
    #[serde(default)]
    expect_insufficient: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(mode) = cli.mode {
        config.retrieval.mode = mode;
    }
    let mut session = build_session(&config)?;

    let prompts = load_prompts(&cli.file)?;
    if prompts.is_empty() {
        anyhow::bail!("no prompts found in {}", cli.file);
    }

    let mut total = 0usize;
    let mut passed = 0usize;
    let mut cited = 0usize;
    let mut insufficient = 0usize;
    let mut segment_expectations = 0usize;
    let mut segment_hits = 0usize;

    for prompt in prompts {
        total += 1;
        let answer = session
            .process_pdf_and_get_answer(&cli.pdf, &prompt.question)
            .await
            .with_context(|| format!("failed eval prompt {}", prompt.id))?;

        let is_insufficient = answer.outcome == AnswerOutcome::Insufficient;
        if is_insufficient {
            insufficient += 1;
        }
        if answer.cited_segment_id.is_some() {
            cited += 1;
        }

        let answer_lower = answer.answer_text.to_lowercase();
        let mut pass = prompt
            .expect_contains
            .iter()
            .all(|needle| answer_lower.contains(&needle.to_lowercase()));

        if prompt.expect_insufficient.unwrap_or(false) != is_insufficient {
            pass = false;
        }

        if let Some(expected) = prompt.expect_segment {
            segment_expectations += 1;
            if answer.cited_segment_id == Some(expected) {
                segment_hits += 1;
            } else {
                pass = false;
            }
        }

        if pass {
            passed += 1;
        }

        if cli.verbose {
            println!("--- {} [{}] ---", prompt.id, if pass { "pass" } else { "fail" });
            println!("Q: {}", prompt.question);
            println!("A: {}", answer.answer_text);
            println!(
                "Cited: segment={:?} page={:?} candidates={:?}",
                answer.cited_segment_id, answer.cited_page_number, answer.candidate_ids
            );
            println!();
        }
    }

    println!("Eval prompts: {total}");
    println!("Pass rate: {:.1}%", ratio(passed, total) * 100.0);
    println!("Citation rate: {:.1}%", ratio(cited, total) * 100.0);
    println!("Insufficient rate: {:.1}%", ratio(insufficient, total) * 100.0);
    if segment_expectations > 0 {
        println!(
            "Expected-segment hit-rate: {:.1}% ({segment_hits}/{segment_expectations})",
            ratio(segment_hits, segment_expectations) * 100.0
        );
    }

    Ok(())
}

fn load_prompts(path: &str) -> Result<Vec<EvalPrompt>> {
    let file = File::open(path).with_context(|| format!("failed opening {path}"))?;
    let reader = BufReader::new(file);
    let mut prompts = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed: EvalPrompt = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON at {path} line {}", idx + 1))?;
        prompts.push(parsed);
    }

    Ok(prompts)
}

fn ratio(n: usize, d: usize) -> f32 {
    if d == 0 {
        return 0.0;
    }
    n as f32 / d as f32
}
