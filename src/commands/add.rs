use std::path::{Path, PathBuf};
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use crate::commands::remove_if_present;
use crate::config::Config;
use crate::error::{DaError, Result};
use crate::model::{Priority, TaskRecord};
use crate::output::{self, Format};
use crate::process::{self, ControlSignal};
use crate::store::layout::MAX_PATH_LEN;
use crate::store::registry::{REGISTRY_CAPACITY, Registry};
use crate::store::status::StatusStore;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Resolve `path` to a canonical absolute directory.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let resolved = match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(DaError::PathNotFound(path.to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    if !resolved.is_dir() {
        return Err(DaError::NotADirectory(resolved.display().to_string()));
    }
    Ok(resolved)
}

/// Register `path` and start a worker analyzing it.
///
/// The registry is only locked around the admission checks and the final
/// insert, never while waiting for the worker to come up.
pub fn run(config: &Config, path: &str, priority: Priority, format: Format) -> Result<TaskRecord> {
    let resolved = resolve_path(path)?;
    let display = resolved.to_string_lossy().into_owned();
    if display.len() > MAX_PATH_LEN {
        return Err(DaError::PathTooLong(display, MAX_PATH_LEN));
    }

    config.ensure_state_dir()?;
    // Checked up front so a rejected request never starts a worker.
    admit(&mut Registry::open(&config.registry_path())?, &resolved)?;

    let mut child = process::spawn_worker(config, &resolved, priority)?;
    let record = TaskRecord::new(child.id(), display);
    wait_for_worker(config, &mut child, &record)?;

    let mut registry = Registry::open(&config.registry_path())?;
    // A concurrent add may have claimed an overlapping path in the meantime.
    if let Err(err) = admit(&mut registry, &resolved) {
        abandon_worker(config, &mut child, &record)?;
        return Err(err);
    }
    registry.add(record.clone())?;
    registry.persist()?;

    output::print_added(&record, priority, format)?;
    Ok(record)
}

fn admit(registry: &mut Registry, resolved: &Path) -> Result<()> {
    if let Some(existing) = registry.overlapping(resolved)? {
        return Err(DaError::PathConflict {
            path: resolved.to_string_lossy().into_owned(),
            id: existing.id,
        });
    }
    if registry.len()? >= REGISTRY_CAPACITY {
        return Err(DaError::RegistryFull(REGISTRY_CAPACITY));
    }
    Ok(())
}

/// Block until the worker has published a readable status record.
fn wait_for_worker(config: &Config, child: &mut Child, record: &TaskRecord) -> Result<()> {
    let store = StatusStore::open(&config.state_dir);
    let started = Instant::now();

    loop {
        // Exit is sampled before the read: a worker that published and then
        // exited has still started.
        let exited = child.try_wait()?;
        if store.read(&record.status_file).is_ok() {
            return Ok(());
        }
        if let Some(status) = exited {
            return Err(DaError::WorkerExited(record.id, status));
        }
        if started.elapsed() >= config.spawn_timeout {
            abandon_worker(config, child, record)?;
            return Err(DaError::WorkerStartTimeout(record.id, config.spawn_timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Stop a worker that will not be registered and delete whatever it wrote.
fn abandon_worker(config: &Config, child: &mut Child, record: &TaskRecord) -> Result<()> {
    process::send_best_effort(record.id, ControlSignal::Terminate)?;
    child.wait()?;
    let store = StatusStore::open(&config.state_dir);
    remove_if_present(&store.path_for(&record.status_file))?;
    remove_if_present(&config.report_path(&record.status_file))?;
    remove_if_present(&config.log_path(&record.status_file))?;
    Ok(())
}
