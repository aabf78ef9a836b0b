use std::fs;

use crate::config::Config;
use crate::error::{DaError, Result};
use crate::model::{TaskState, TaskStatus};
use crate::output::{self, Format};
use crate::process;
use crate::store::registry;
use crate::store::status::StatusStore;

/// Print a task's status record and whether its worker is still alive.
/// The read is informational and may trail the worker by one update.
pub fn run(config: &Config, id: u32, format: Format) -> Result<TaskStatus> {
    let records = registry::snapshot(&config.registry_path())?;
    let record = registry::find_record(&records, id)?;

    let status = StatusStore::open(&config.state_dir).read(&record.status_file)?;
    output::print_status(&status, process::is_alive(record.id), format)?;
    Ok(status)
}

/// Print the scan report of a finished task.
pub fn print(config: &Config, id: u32, format: Format) -> Result<String> {
    let records = registry::snapshot(&config.registry_path())?;
    let record = registry::find_record(&records, id)?;

    let status = StatusStore::open(&config.state_dir).read(&record.status_file)?;
    if status.state != TaskState::Done {
        return Err(DaError::ReportNotReady(id));
    }

    let report = fs::read_to_string(config.report_path(&record.status_file))?;
    output::print_report(record, &report, format)?;
    Ok(report)
}
