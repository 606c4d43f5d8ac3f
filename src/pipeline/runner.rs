use crate::config::types::Config;
use crate::normalize::Normalizer;
use crate::pipeline::guard::{ExecutionGuard, GuardError};
use crate::source::{CheckpointStore, TailError, Tailer};
use crate::storage::staging::{StagingError, StagingWriter};
use crate::storage::traits::{Store, StoreError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Errors that abort a pipeline run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("execution guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("tail error: {0}")]
    Tail(#[from] TailError),

    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("load failed, staging file kept at {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

/// Counters of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Log lines read
    pub lines: usize,
    /// Rows staged and loaded
    pub rows: usize,
    /// Lines dropped as malformed
    pub malformed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Another process holds the pipeline lock; nothing was touched
    AlreadyRunning,
}

fn run_span(config: &Config) -> tracing::Span {
    info_span!(
        "run",
        pipeline = %config.pipeline.name,
        run_id = %Uuid::new_v4(),
    )
}

fn acquire(config: &Config) -> Result<Option<ExecutionGuard>, RunError> {
    let guard = ExecutionGuard::acquire(config.pipeline.lock_path())?;
    if guard.is_none() {
        info!(
            lock = %config.pipeline.lock_path().display(),
            "Another run holds the pipeline lock, exiting"
        );
    }
    Ok(guard)
}

fn open_tailer(config: &Config) -> Result<Tailer, RunError> {
    let pipeline = &config.pipeline;
    let checkpoints = CheckpointStore::for_log(&pipeline.state_dir, &pipeline.log_path);
    Ok(Tailer::open(
        pipeline.log_path.clone(),
        &pipeline.rotation_suffix,
        checkpoints,
    )?)
}

/// One guarded tail, normalize, stage and load cycle
pub async fn run(config: &Config, store: &dyn Store) -> Result<RunOutcome, RunError> {
    let normalizer = Normalizer::from_config(config);
    run_with(config, &normalizer, store)
        .instrument(run_span(config))
        .await
}

/// `run` with a caller supplied normalizer
pub async fn run_with(
    config: &Config,
    normalizer: &Normalizer,
    store: &dyn Store,
) -> Result<RunOutcome, RunError> {
    let _guard = match acquire(config)? {
        Some(guard) => guard,
        None => return Ok(RunOutcome::AlreadyRunning),
    };

    let staging_path = config.pipeline.staging_path();
    load_pending(&staging_path, store).await?;

    let mut tailer = open_tailer(config)?;
    let mut writer = StagingWriter::create(&staging_path, &config.pipeline.table)?;
    let mut summary = RunSummary::default();

    info!(
        log = %config.pipeline.log_path.display(),
        staging = %staging_path.display(),
        "Run started"
    );

    // The checkpoint is persisted by the tailer once this loop drains it
    while let Some(line) = tailer.next_line()? {
        summary.lines += 1;
        match normalizer.normalize(&line) {
            Ok(rows) => {
                for row in &rows {
                    writer.write_row(row)?;
                }
                debug!(rows = rows.len(), "Line normalized");
            }
            Err(e) => {
                summary.malformed += 1;
                warn!(error = %e, line = %line, "Skipping malformed record");
            }
        }
    }

    let staged = writer.finish()?;
    summary.rows = staged.rows;

    if staged.rows == 0 {
        info!(lines = summary.lines, malformed = summary.malformed, "No rows to load");
        remove_staging(&staged.path);
        return Ok(RunOutcome::Completed(summary));
    }

    store
        .import_file(&staged.path)
        .await
        .map_err(|source| RunError::Load {
            path: staged.path.clone(),
            source,
        })?;
    remove_staging(&staged.path);

    info!(
        lines = summary.lines,
        rows = summary.rows,
        malformed = summary.malformed,
        "Run completed"
    );
    Ok(RunOutcome::Completed(summary))
}

/// Load a staging file left behind by an earlier failed load.
///
/// Its lines are already behind the checkpoint, so it must reach the store
/// before a new staging file replaces it. On failure the file stays and
/// the log is not read.
async fn load_pending(path: &Path, store: &dyn Store) -> Result<(), RunError> {
    if !path.exists() {
        return Ok(());
    }

    warn!(path = %path.display(), "Loading staging file left by an earlier run");
    store
        .import_file(path)
        .await
        .map_err(|source| RunError::Load {
            path: path.to_path_buf(),
            source,
        })?;
    remove_staging(path);
    info!(path = %path.display(), "Pending staging file loaded");
    Ok(())
}

fn remove_staging(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove staging file");
    }
}

/// Under the guard, move the checkpoint to the end of the live log
pub fn skip(config: &Config) -> Result<RunOutcome, RunError> {
    let _span = run_span(config).entered();
    let _guard = match acquire(config)? {
        Some(guard) => guard,
        None => return Ok(RunOutcome::AlreadyRunning),
    };

    let mut tailer = open_tailer(config)?;
    tailer.skip_rest()?;
    Ok(RunOutcome::Completed(RunSummary::default()))
}
