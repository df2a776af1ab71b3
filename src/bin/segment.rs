use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use handout_assistant::{build_session, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "segment")]
#[command(about = "Segment a PDF and write its page-aligned segments as JSON")]
struct Cli {
    #[arg(long)]
    pdf: PathBuf,
    #[arg(long, default_value = "segments.json")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    // Only segmentation and page alignment are needed here.
    config.retrieval.mode = handout_assistant::ranking::RankingMode::Extractive;
    let mut session = build_session(&config)?;

    session.load_document(&cli.pdf).await?;
    let store = session
        .current_document()
        .map(|doc| doc.store())
        .context("document did not load")?;

    let body = serde_json::to_vec_pretty(store.segments())?;
    tokio::fs::write(&cli.out, body)
        .await
        .with_context(|| format!("failed writing {}", cli.out.display()))?;

    let unassigned = store
        .segments()
        .iter()
        .filter(|segment| segment.page_number.is_none())
        .count();
    println!(
        "Segmented {} into {} segments ({} without a page). Saved to {}",
        cli.pdf.display(),
        store.len(),
        unassigned,
        cli.out.display()
    );

    Ok(())
}
