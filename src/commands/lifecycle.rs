use nix::errno::Errno;

use crate::config::Config;
use crate::error::{DaError, Result};
use crate::model::{TaskRecord, TaskState, Transition};
use crate::output::{self, Format};
use crate::process::{self, ControlSignal};
use crate::store::registry;
use crate::store::status::StatusStore;

fn find_task(config: &Config, id: u32) -> Result<TaskRecord> {
    let records = registry::snapshot(&config.registry_path())?;
    Ok(registry::find_record(&records, id)?.clone())
}

/// A worker that died without finishing still has a live-looking record.
fn signal_worker(record: &TaskRecord, control: ControlSignal) -> Result<()> {
    match process::send(record.id, control) {
        Err(DaError::Signal {
            source: Errno::ESRCH,
            ..
        }) => Err(DaError::WorkerGone(record.id)),
        other => other,
    }
}

/// Pause a running worker and mark it pending.
///
/// The status lock is held from the read until the new state is written, so
/// the worker cannot slip a write in between.
pub fn suspend(config: &Config, id: u32, format: Format) -> Result<Transition> {
    let record = find_task(config, id)?;
    let store = StatusStore::open(&config.state_dir);
    let mut guard = store.lock_for_update(&record.status_file)?;

    let transition = match guard.status().state {
        TaskState::Pending => Transition::AlreadySuspended,
        TaskState::InProgress => {
            signal_worker(&record, ControlSignal::Pause)?;
            let mut next = guard.status().clone();
            next.state = TaskState::Pending;
            guard.write_back(next)?;
            Transition::Suspended
        }
        TaskState::Done => Transition::NothingToSuspend,
    };

    let status = guard.release()?;
    output::print_transition(&record, transition, Some(status.state), format)?;
    Ok(transition)
}

/// Mark a pending task in progress and let its worker continue.
pub fn resume(config: &Config, id: u32, format: Format) -> Result<Transition> {
    let record = find_task(config, id)?;
    let store = StatusStore::open(&config.state_dir);
    let mut guard = store.lock_for_update(&record.status_file)?;

    let transition = match guard.status().state {
        TaskState::Pending => {
            // Signal before writing: a gone worker leaves the record as it was.
            signal_worker(&record, ControlSignal::Continue)?;
            let mut next = guard.status().clone();
            next.state = TaskState::InProgress;
            guard.write_back(next)?;
            Transition::Resumed
        }
        TaskState::InProgress | TaskState::Done => Transition::NotSuspended,
    };

    let status = guard.release()?;
    output::print_transition(&record, transition, Some(status.state), format)?;
    Ok(transition)
}
