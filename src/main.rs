use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use handout_assistant::models::{AnswerOutcome, AnswerResult};
use handout_assistant::ranking::RankingMode;
use handout_assistant::services::Highlighter;
use handout_assistant::transcript::QaTranscript;
use handout_assistant::{app, build_session, AppConfig, SessionController};

#[derive(Parser, Debug)]
#[command(name = "handout-assistant")]
#[command(about = "Ask questions about a PDF handout and get a cited answer")]
struct Cli {
    #[arg(long)]
    pdf: PathBuf,
    /// Ask a single question and exit. Without it, questions are read from stdin.
    #[arg(long)]
    question: Option<String>,
    /// Write a highlight report for the cited passage here.
    #[arg(long)]
    highlight_out: Option<PathBuf>,
    /// Append every question and answer to this JSON file.
    #[arg(long)]
    transcript: Option<PathBuf>,
    #[arg(long)]
    mode: Option<RankingMode>,
    #[arg(long)]
    top_k: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(mode) = cli.mode {
        config.retrieval.mode = mode;
    }
    if let Some(top_k) = cli.top_k {
        config.retrieval.top_k = top_k;
    }

    let mut session = build_session(&config)?;
    let transcript = cli.transcript.clone().map(QaTranscript::new);

    if let Some(question) = cli.question.as_deref() {
        return ask(&mut session, &cli, transcript.as_ref(), question).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"\nUser: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if matches!(question.to_lowercase().as_str(), "quit" | "exit" | "bye") {
            println!("Goodbye!");
            break;
        }
        if question.is_empty() {
            println!("Please enter a valid question.");
            continue;
        }

        if let Err(err) = ask(&mut session, &cli, transcript.as_ref(), question).await {
            eprintln!("error: {err:#}");
        }
    }

    Ok(())
}

async fn ask(
    session: &mut SessionController,
    cli: &Cli,
    transcript: Option<&QaTranscript>,
    question: &str,
) -> Result<()> {
    let result = match session.process_pdf_and_get_answer(&cli.pdf, question).await {
        Ok(result) => result,
        Err(err) if err.is_load_failure() => {
            return Err(anyhow::Error::new(err)
                .context(format!("document {} failed to load", cli.pdf.display())));
        }
        Err(err) => return Err(err.into()),
    };
    print_answer(&result);

    if let Some(transcript) = transcript {
        let record = transcript.append(question, &result).await?;
        tracing::debug!(
            path = %transcript.path().display(),
            asked_at = %record.asked_at,
            "transcript updated"
        );
    }

    if let (Some(output), Some(passage)) = (cli.highlight_out.as_deref(), result.cited_text.as_deref())
    {
        highlight(&cli.pdf, output, passage).await?;
    } else if result.outcome == AnswerOutcome::Answered && result.cited_text.is_none() {
        println!("No relevant segment found to highlight in the PDF.");
    }

    Ok(())
}

async fn highlight(pdf: &Path, output: &Path, passage: &str) -> Result<()> {
    let report = app::build_highlighter()
        .highlight(pdf, output, passage)
        .await?;
    if report.is_empty() {
        println!(
            "Cited passage not found in the PDF; empty report saved to {}",
            output.display()
        );
        return Ok(());
    }

    let pages: Vec<String> = report
        .pages
        .iter()
        .map(|page| page.page_number.to_string())
        .collect();
    println!(
        "Highlight report saved to {} (pages: {})",
        output.display(),
        pages.join(", ")
    );
    Ok(())
}

fn print_answer(result: &AnswerResult) {
    println!("\nAnswer:\n\n{}\n", result.answer_text);

    if let Some(page) = result.cited_page_number {
        println!("Relevant page: {page}");
    }
    if let Some(id) = result.cited_segment_id {
        println!("Relevant segment id: {id}");
    }
    if let Some(text) = &result.cited_text {
        println!("Relevant text segment:\n\n{text}\n");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
