//! Run command implementation.

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use folio_dedup::{parse_criteria, DedupConfig, DedupCoordinator, DedupReport};
use folio_domain::traits::{EmbeddingSource, MetadataSource};
use folio_domain::ArchiveId;
use folio_store::{CorpusFile, SqliteStore};
use std::fmt::Display;
use std::path::Path;

/// Execute the run command.
pub async fn execute_run(args: RunArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let dedup_config = job_config(&args, &config.dedup)?;
    let report = run_job(&args, dedup_config).await?;
    println!("{}", formatter.format_report(&report)?);
    Ok(())
}

/// Merge command-line overrides into the configured job settings.
pub fn job_config(args: &RunArgs, base: &DedupConfig) -> Result<DedupConfig> {
    let mut config = match args.preset {
        Some(preset) => preset.into(),
        None => base.clone(),
    };

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if !args.criteria.is_empty() {
        config.criteria = parse_criteria(&args.criteria)?;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.timeout_secs.is_some() {
        config.timeout_secs = args.timeout_secs;
    }
    if args.separate_languages {
        config.separate_languages = true;
    }
    if let Some(prefilter) = args.prefilter {
        config.prefilter = prefilter.into();
    }

    config.validate()?;
    Ok(config)
}

/// Load the requested source and run one job over it.
pub async fn run_job(args: &RunArgs, config: DedupConfig) -> Result<DedupReport> {
    let requested: Vec<ArchiveId> = args.ids.iter().map(ArchiveId::new).collect();

    if let Some(path) = &args.corpus {
        let corpus = CorpusFile::from_path(path)?;
        let ids = if requested.is_empty() { corpus.archive_ids() } else { requested };
        let store = corpus.into_memory_store();
        dedup(&store, ids, config).await
    } else if let Some(path) = &args.db {
        if !Path::new(path).exists() {
            return Err(CliError::InvalidInput(format!("Database '{}' does not exist", path)));
        }
        let store = SqliteStore::new(path)?;
        let ids = if requested.is_empty() { store.archive_ids()? } else { requested };
        dedup(&store, ids, config).await
    } else {
        Err(CliError::InvalidInput("Must specify either --corpus or --db".to_string()))
    }
}

async fn dedup<S>(store: &S, ids: Vec<ArchiveId>, config: DedupConfig) -> Result<DedupReport>
where
    S: EmbeddingSource + MetadataSource,
    <S as EmbeddingSource>::Error: Display,
    <S as MetadataSource>::Error: Display,
{
    let mut coordinator = DedupCoordinator::new(store, store, config);

    // Ctrl-C stops scheduling; the report still covers finished batches
    let cancel = coordinator.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, waiting for in-flight comparisons");
            cancel.cancel();
        }
    });

    let report = coordinator.run(ids).await;
    interrupt.abort();
    tracing::debug!("{}", coordinator.metrics().summary());

    Ok(report?)
}
