//! One-off capture from the command line, without the HTTP server.
//!
//! Usage: `capture <collection> <keywords> <minutes> [--yes]`
//! Keywords are comma-separated; `--yes` appends to an existing collection.

use anyhow::{bail, Context};
use stream_sentiment::{build_pipeline, log_filter};
use stream_sentiment::config::StreamConfig;
use stream_sentiment::credentials::EnvCredentials;
use stream_sentiment::ingest::session::{PipelineState, SessionRequest};

const USAGE: &str = "usage: capture <collection> <keywords> <minutes> [--yes]";

fn parse_args(args: &[String]) -> anyhow::Result<SessionRequest> {
    let confirm_existing = args.iter().any(|a| a == "--yes" || a == "-y");
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    let [collection, keywords, minutes] = positional.as_slice() else {
        bail!(USAGE);
    };
    let duration_minutes = minutes
        .parse::<u64>()
        .with_context(|| format!("minutes must be a number, got {minutes:?}"))?;
    Ok(SessionRequest {
        collection: collection.to_string(),
        keywords: keywords.to_string(),
        duration_minutes,
        confirm_existing,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let req = parse_args(&args)?;

    let cfg = StreamConfig::load_default()?;
    let pipeline = build_pipeline(&cfg)?;
    let session = req.admit(pipeline.store().as_ref()).await?;
    let credentials = EnvCredentials::new(cfg.endpoint.clone());

    let mut handle = pipeline.start(&credentials, session)?;
    let mut last_pct = None;
    while handle.status.changed().await.is_ok() {
        let s = handle.status.borrow_and_update().clone();
        if last_pct != Some(s.percent) {
            println!(
                "[{:>3}%] {:?} received={} persisted={}",
                s.percent, s.state, s.received, s.persisted
            );
            last_pct = Some(s.percent);
        }
        if s.state == PipelineState::Closed {
            break;
        }
    }

    let report = handle.wait().await.context("capture task failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.ended_early {
        eprintln!("stream ended before the requested duration");
    }
    Ok(())
}
