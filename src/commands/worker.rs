use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::logging;
use crate::model::{Priority, TaskRecord, TaskStatus};
use crate::process;
use crate::scanner::{ScanProgress, Scanner};
use crate::store::status::StatusStore;

/// Body of a detached worker process: publish a status record, walk `path`
/// into the report file, then mark the task done.
///
/// The state field belongs to the controller while the walk runs; progress
/// updates only touch the counters.
pub fn run(config: &Config, path: &Path, priority: Priority) -> Result<()> {
    let record = TaskRecord::new(std::process::id(), path.to_string_lossy());
    let _log_guard = logging::init_worker(&config.log_path(&record.status_file))?;

    if let Err(err) = process::apply_priority(priority) {
        tracing::warn!(error = %err, %priority, "could not adjust niceness");
    }

    let store = StatusStore::open(&config.state_dir);
    let status = TaskStatus::started(record.clone(), priority);
    store.create(&status)?;
    tracing::info!(id = record.id, path = %record.path, "scan started");

    let result = scan_into_report(config, &store, status, path);
    match &result {
        Ok(progress) => tracing::info!(
            id = record.id,
            files = progress.files_seen,
            dirs = progress.dirs_seen,
            "scan finished"
        ),
        Err(err) => tracing::error!(id = record.id, error = %err, "scan failed"),
    }
    result.map(|_| ())
}

/// A worker that fails here leaves its record `in_progress` with no process
/// behind it; controllers see that as a gone worker.
fn scan_into_report(
    config: &Config,
    store: &StatusStore,
    mut status: TaskStatus,
    path: &Path,
) -> Result<ScanProgress> {
    let status_file = status.record.status_file.clone();
    let report = BufWriter::new(File::create(config.report_path(&status_file))?);

    let progress = Scanner::new(path, report)
        .with_delay(config.scan_delay)
        .on_progress(|progress| {
            store.update(&status_file, |status| {
                apply_counters(status, progress);
                status.progress = progress.percent.min(99);
            })?;
            Ok(())
        })
        .run()?;

    // A running worker is never suspended, so the final record is written whole.
    apply_counters(&mut status, &progress);
    status.finish();
    store.write(&status)?;
    Ok(progress)
}

fn apply_counters(status: &mut TaskStatus, progress: &ScanProgress) {
    status.files_seen = progress.files_seen;
    status.dirs_seen = progress.dirs_seen;
}
