mod analyzer;
mod cleaner;
mod config;
mod csv_io;
mod model;
mod parser;
mod report;
mod scraper;
mod sentiment;
mod storage;
mod utils;

use analyzer::kpi::{self, KpiInputs};
use analyzer::{Analyzer, ReviewAnalyzer};
use config::{load_config, AppConfig};
use model::{CsvError, ReportError, ScraperError, SentimentError, StorageError};
use report::ReportInput;
use scraper::{collect_all, PlayStoreScraper};
use std::path::Path;
use std::str::FromStr;
use storage::SqliteStorage;
use thiserror::Error;
use tracing::{error, info, warn};

const USAGE: &str = "usage: bank-review-etl [collect|clean|tag|load|report|all] [--config PATH]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Collect,
    Clean,
    Tag,
    Load,
    Report,
    All,
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collect" => Ok(Stage::Collect),
            "clean" => Ok(Stage::Clean),
            "tag" => Ok(Stage::Tag),
            "load" => Ok(Stage::Load),
            "report" => Ok(Stage::Report),
            "all" => Ok(Stage::All),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Cli {
    stage: Stage,
    config_path: String,
}

fn parse_args<I>(args: I) -> Result<Cli, String>
where
    I: IntoIterator<Item = String>,
{
    let mut cli = Cli {
        stage: Stage::All,
        config_path: "config.json".into(),
    };
    let mut stage_seen = false;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                cli.config_path = args.next().ok_or("--config needs a path")?;
            }
            "--help" | "-h" => return Err(USAGE.into()),
            s if !stage_seen && !s.starts_with('-') => {
                cli.stage = s.parse()?;
                stage_seen = true;
            }
            other => return Err(format!("unexpected argument '{}'", other)),
        }
    }
    Ok(cli)
}

#[derive(Debug, Error)]
enum PipelineError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Sentiment(#[from] SentimentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("{0}")]
    Stage(String),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(if msg == USAGE { 0 } else { 2 });
        }
    };

    let config = match load_config(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            std::process::exit(1);
        }
    };

    let stages: &[Stage] = match cli.stage {
        Stage::All => &[Stage::Collect, Stage::Clean, Stage::Tag, Stage::Load, Stage::Report],
        ref single => std::slice::from_ref(single),
    };

    for stage in stages {
        info!("=== Stage: {:?} ===", stage);
        if let Err(e) = run_stage(*stage, &config).await {
            error!("Stage {:?} failed: {}", stage, e);
            std::process::exit(1);
        }
    }
    info!("Pipeline finished.");
}

async fn run_stage(stage: Stage, config: &AppConfig) -> Result<(), PipelineError> {
    match stage {
        Stage::Collect => collect_stage(config).await,
        Stage::Clean => clean_stage(config),
        Stage::Tag => tag_stage(config).await,
        Stage::Load => load_stage(config),
        Stage::Report => report_stage(config),
        Stage::All => Err(PipelineError::Stage("'all' is not a single stage".into())),
    }
}

async fn collect_stage(config: &AppConfig) -> Result<(), PipelineError> {
    let scraper = PlayStoreScraper::new(&config.scraping)?;
    let (reviews, summary) =
        collect_all(&scraper, &config.banks, config.scraping.reviews_per_bank).await;

    if reviews.is_empty() {
        return Err(PipelineError::Stage("no reviews collected for any bank".into()));
    }
    for shortfall in &summary.shortfalls {
        warn!(
            "{} collected {} of {} reviews{}",
            shortfall.bank_code,
            shortfall.collected,
            shortfall.target,
            shortfall.error.as_deref().map(|e| format!(" ({})", e)).unwrap_or_default()
        );
    }

    csv_io::write_raw(Path::new(&config.paths.raw_reviews), &reviews)?;
    info!("Saved {} raw reviews to {}", reviews.len(), config.paths.raw_reviews);
    Ok(())
}

fn clean_stage(config: &AppConfig) -> Result<(), PipelineError> {
    let raw = csv_io::read_raw(Path::new(&config.paths.raw_reviews))?;
    let (cleaned, cleaning) = cleaner::clean(raw);

    let loss_pct = cleaning.total_loss_fraction() * 100.0;
    if loss_pct >= config.kpi.max_loss_pct {
        warn!(
            "Data loss {:.2}% exceeds the {:.0}% target",
            loss_pct, config.kpi.max_loss_pct
        );
    }

    csv_io::write_processed(Path::new(&config.paths.processed_reviews), &cleaned, |code| {
        config.bank_name(code)
    })?;
    cleaner::save_report(Path::new(&config.paths.cleaning_report), &cleaning)?;
    info!(
        "Saved {} cleaned reviews to {}",
        cleaned.len(),
        config.paths.processed_reviews
    );
    Ok(())
}

async fn tag_stage(config: &AppConfig) -> Result<(), PipelineError> {
    let processed = csv_io::read_processed(Path::new(&config.paths.processed_reviews), |name| {
        config.bank_code(name)
    })?;
    let (cleaned, recheck) = cleaner::reclean(processed);
    if recheck.total_removed() > 0 {
        warn!(
            "{} rows in {} no longer pass cleaning and were skipped",
            recheck.total_removed(),
            config.paths.processed_reviews
        );
    }
    let model = sentiment::build_model(&config.sentiment)?;
    let (tagged, tagging) = sentiment::tag_reviews(model.as_ref(), cleaned).await;

    if tagging.fallbacks > 0 {
        warn!("{} reviews fell back to Neutral", tagging.fallbacks);
    }
    csv_io::write_final(Path::new(&config.paths.final_results), &tagged)?;
    info!("Saved {} tagged reviews to {}", tagged.len(), config.paths.final_results);
    Ok(())
}

fn load_stage(config: &AppConfig) -> Result<(), PipelineError> {
    let tagged = csv_io::read_final(Path::new(&config.paths.final_results))?;
    let mut storage = SqliteStorage::new(&config.paths.database)?;
    let existing = storage.count_reviews()?;
    if existing > 0 {
        warn!(
            "{} already holds {} reviews; new rows are appended",
            config.paths.database, existing
        );
    }

    let summary = storage.load(&tagged, |code| config.bank_name(code));
    info!(
        "Loaded {} of {} reviews into {}",
        summary.total_inserted(),
        tagged.len(),
        config.paths.database
    );

    for bank in storage.fetch_banks()? {
        info!("  [{}] {} ({})", bank.bank_id, bank.bank_name, bank.bank_code);
    }

    if !summary.is_success() {
        for failure in &summary.failures {
            error!("{}", failure);
        }
        return Err(PipelineError::Stage(format!(
            "{} bank(s) failed to load",
            summary.failures.len()
        )));
    }
    Ok(())
}

/// Cleaned count and loss come from the saved cleaning report when it exists.
fn kpi_inputs(
    config: &AppConfig,
    db_records: usize,
) -> (KpiInputs, Option<cleaner::CleaningReport>) {
    let cleaning = match cleaner::load_report(Path::new(&config.paths.cleaning_report)) {
        Ok(r) => Some(r),
        Err(e) => {
            warn!("No cleaning report available: {}", e);
            None
        }
    };

    let cleaned_reviews = cleaning.as_ref().map(|c| c.final_count).or_else(|| {
        csv_io::read_processed(Path::new(&config.paths.processed_reviews), |name| {
            config.bank_code(name)
        })
        .ok()
        .map(|rows| rows.len())
    });

    let inputs = KpiInputs {
        cleaned_reviews,
        loss_pct: cleaning.as_ref().map(|c| c.total_loss_fraction() * 100.0),
        db_records: Some(db_records),
    };
    (inputs, cleaning)
}

fn report_stage(config: &AppConfig) -> Result<(), PipelineError> {
    let storage = SqliteStorage::new(&config.paths.database)?;
    let reviews = storage.fetch_reviews()?;
    let db_records = storage.count_reviews()?;
    if db_records == 0 {
        warn!("Database {} holds no reviews", config.paths.database);
    }
    info!("Reporting on {} reviews from {} banks", db_records, storage.count_banks()?);

    let summary = ReviewAnalyzer::new(config.report.top_keywords).summarize(&reviews);
    for bank in &summary.banks {
        info!(
            "{}: {} reviews, avg rating {:.2}",
            bank.bank_code, bank.review_count, bank.avg_rating
        );
    }

    let (inputs, cleaning) = kpi_inputs(config, db_records);
    let kpis = kpi::evaluate(&config.kpi, &inputs);
    for row in &kpis {
        info!("KPI {}: {} (target {}) {}", row.name, row.actual, row.target, row.status);
    }

    let markdown = report::render(&ReportInput {
        summary: &summary,
        kpis: &kpis,
        cleaning: cleaning.as_ref(),
        charts_dir: &config.paths.charts_dir,
        sentiment_model: config.sentiment.backend.as_str(),
        generated_on: chrono::Local::now().date_naive(),
    });
    report::write_report(Path::new(&config.paths.report), &markdown)?;
    Ok(())
}
