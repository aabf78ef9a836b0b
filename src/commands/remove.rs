use std::io::ErrorKind;

use crate::commands::remove_if_present;
use crate::config::Config;
use crate::error::{DaError, Result};
use crate::model::{TaskRecord, TaskState, Transition};
use crate::output::{self, Format};
use crate::process::{self, ControlSignal};
use crate::store::registry::Registry;
use crate::store::status::StatusStore;

fn terminate(record: &TaskRecord, state: TaskState) -> Result<()> {
    match state {
        TaskState::InProgress => {
            process::send_best_effort(record.id, ControlSignal::Terminate)?;
        }
        TaskState::Pending => {
            // A stopped process only acts on the terminate once it runs again.
            if process::send_best_effort(record.id, ControlSignal::Terminate)? {
                process::send_best_effort(record.id, ControlSignal::Continue)?;
            }
        }
        TaskState::Done => {}
    }
    Ok(())
}

/// Stop a task's worker (if still running) and forget the task.
///
/// Termination is not awaited. The status file, scan report and worker log are
/// deleted and the registry is persisted without the task.
pub fn run(config: &Config, id: u32, format: Format) -> Result<TaskRecord> {
    let mut registry = Registry::open(&config.registry_path())?;
    let record = registry.find(id)?.clone();
    let store = StatusStore::open(&config.state_dir);

    let last_state = match store.lock_for_update(&record.status_file) {
        Ok(guard) => {
            let state = guard.status().state;
            terminate(&record, state)?;
            store.delete(&record.status_file)?;
            guard.release()?;
            Some(state)
        }
        Err(DaError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            tracing::warn!(id, file = %record.status_file, "status file missing");
            process::send_best_effort(record.id, ControlSignal::Terminate)?;
            None
        }
        Err(err) => return Err(err),
    };
    remove_if_present(&config.report_path(&record.status_file))?;
    remove_if_present(&config.log_path(&record.status_file))?;

    registry.remove(id)?;
    registry.persist()?;

    output::print_transition(&record, Transition::Removed, last_state, format)?;
    Ok(record)
}
