use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use chrono::{Local, NaiveDate, Utc};
use clap::Parser;
use dotenvy::dotenv;
use tm_common::{
    api::MatchRunResponse,
    brief::{BriefCatalog, BriefResolutionError, BriefResolver, CampaignBrief, CatalogLoadError},
    logging::{ConsoleTarget, init_tracing_subscriber_to, install_tracing_panic_hook},
    matching::{JitterMode, MatchRun, MatchingEngine, MatchingEngineConfig, RecommendedType},
    repository::{ReferenceSnapshot, SnapshotLoadError},
};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "tm-runner",
    about = "Run one campaign brief against a reference snapshot and print the ranked list"
)]
struct Cli {
    /// JSON reference snapshot (candidates, signals, fit scores, curated picks)
    #[arg(long, env = "TM_REFERENCE_SNAPSHOT")]
    snapshot: PathBuf,

    /// 業種 (e.g. 食品)
    #[arg(long)]
    industry: String,

    /// ターゲット (e.g. 女性20〜34歳)
    #[arg(long)]
    segment: String,

    /// 予算帯 (e.g. 〜3,000万円)
    #[arg(long)]
    budget: String,

    /// 起用目的（表示用）
    #[arg(long)]
    purpose: Option<String>,

    /// Evaluation date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Seed for reproducible display-score jitter
    #[arg(long, conflicts_with = "no_jitter")]
    seed: Option<u64>,

    /// Disable display-score jitter
    #[arg(long)]
    no_jitter: bool,

    /// Print the full response as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, thiserror::Error)]
enum RunnerError {
    #[error("failed to load reference snapshot: {0}")]
    Snapshot(#[from] SnapshotLoadError),
    #[error("failed to load brief catalog: {0}")]
    Catalog(#[from] CatalogLoadError),
    #[error(transparent)]
    Brief(#[from] BriefResolutionError),
    #[error("failed to render json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

fn engine_config(cli: &Cli) -> MatchingEngineConfig {
    let mut config = MatchingEngineConfig::from_env();
    if cli.no_jitter {
        config.jitter = JitterMode::Disabled;
    } else if let Some(seed) = cli.seed {
        config.jitter = JitterMode::Seeded(seed);
    }
    config
}

fn type_label(recommended_type: RecommendedType) -> &'static str {
    match recommended_type {
        RecommendedType::Curated => "推奨",
        RecommendedType::AutoSupplement => "補完",
        RecommendedType::Standard => "",
    }
}

fn write_table(out: &mut impl Write, run: &MatchRun) -> io::Result<()> {
    writeln!(
        out,
        "{:>4}  {:>5}  {:<4}  {:>7}  {:>5}  {:>7}  {:<3}  name",
        "rank", "score", "type", "base", "fit", "total", "競合"
    )?;
    for result in &run.results {
        writeln!(
            out,
            "{:>4}  {:>5.1}  {:<4}  {:>7.2}  {:>+5.1}  {:>7.2}  {:<3}  {}",
            result.rank,
            result.display_score,
            type_label(result.recommended_type),
            result.base_score,
            result.fit_adjustment,
            result.combined_score,
            if result.has_active_conflict { "!" } else { "" },
            result.name,
        )?;
    }
    for notice in &run.notices {
        writeln!(out, "notice: {notice:?}")?;
    }
    Ok(())
}

fn run(cli: Cli, out: &mut impl Write) -> Result<(), RunnerError> {
    let resolver = BriefResolver::new(BriefCatalog::from_env_or_builtin()?);
    let brief = resolver.resolve(&CampaignBrief {
        industry: cli.industry.clone(),
        segment_label: cli.segment.clone(),
        budget_label: cli.budget.clone(),
        purpose: cli.purpose.clone(),
    })?;

    let snapshot = ReferenceSnapshot::from_json_file(&cli.snapshot)?;
    let evaluation_date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let engine = MatchingEngine::new(engine_config(&cli));

    info!(
        snapshot = %cli.snapshot.display(),
        industry = %brief.industry,
        segment_id = brief.segment_id,
        %evaluation_date,
        "running brief"
    );

    let run = engine.run(&brief, &snapshot, evaluation_date);

    if cli.json {
        let response = MatchRunResponse::new(&brief, run, Utc::now());
        serde_json::to_writer_pretty(&mut *out, &response)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "run {}  {} / {} / {}  ({})",
            run.run_id, brief.industry, brief.segment_label, brief.budget_label, evaluation_date
        )?;
        write_table(out, &run)?;
    }

    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    init_tracing_subscriber_to(env!("CARGO_PKG_NAME"), ConsoleTarget::Stderr);
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    match run(Cli::parse(), &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "tm-runner failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
