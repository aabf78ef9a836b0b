use clap::ValueEnum;
use colored::Colorize;
use serde_json::json;

use crate::error::Result;
use crate::model::{Priority, TaskRecord, TaskState, TaskStatus, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
}

pub fn record_line(record: &TaskRecord) -> String {
    format!("id={} path={} file={}", record.id, record.path, record.status_file)
}

pub fn print_records(records: &[TaskRecord], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(records)?),
        Format::Pretty => {
            for record in records {
                println!("{}", record_line(record));
            }
        }
    }
    Ok(())
}

pub fn print_added(record: &TaskRecord, priority: Priority, format: Format) -> Result<()> {
    match format {
        Format::Json => println!(
            "{}",
            json!({
                "id": record.id,
                "path": record.path,
                "status_file": record.status_file,
                "priority": priority,
            })
        ),
        Format::Pretty => println!(
            "Created analysis task with ID '{}' for '{}' and priority '{}'",
            record.id, record.path, priority
        ),
    }
    Ok(())
}

fn transition_message(
    record: &TaskRecord,
    transition: Transition,
    state: Option<TaskState>,
) -> String {
    let path = &record.path;
    match transition {
        Transition::Suspended => format!("Suspending task for '{path}'"),
        Transition::AlreadySuspended => format!("Task already suspended for '{path}'"),
        Transition::NothingToSuspend => format!("Task is done, no need to suspend for '{path}'"),
        Transition::Resumed => format!("Resuming task for '{path}'"),
        Transition::NotSuspended => match state {
            Some(state) => format!("Task for '{path}' is not suspended ({state})"),
            None => format!("Task for '{path}' is not suspended"),
        },
        Transition::Removed => format!(
            "Removed analysis task with ID '{}' for '{path}'",
            record.id
        ),
    }
}

/// `state` is the task's state after the operation, or its last known state
/// for a removed task (`None` when its status file was already gone).
pub fn print_transition(
    record: &TaskRecord,
    transition: Transition,
    state: Option<TaskState>,
    format: Format,
) -> Result<()> {
    match format {
        Format::Json => println!(
            "{}",
            json!({
                "id": record.id,
                "path": record.path,
                "transition": transition,
                "state": state,
            })
        ),
        Format::Pretty => println!("{}", transition_message(record, transition, state)),
    }
    Ok(())
}

fn colored_state(state: TaskState) -> colored::ColoredString {
    let label = state.to_string();
    match state {
        TaskState::Pending => label.yellow(),
        TaskState::InProgress => label.cyan(),
        TaskState::Done => label.green(),
    }
}

/// `worker_running` says whether the task's worker process still exists.
pub fn print_status(status: &TaskStatus, worker_running: bool, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let mut value = serde_json::to_value(status)?;
            value["worker_running"] = json!(worker_running);
            println!("{value}");
        }
        Format::Pretty => {
            let record = &status.record;
            println!("[{}] {} ({})", record.id, record.path, colored_state(status.state));
            println!("  priority: {} | progress: {}%", status.priority, status.progress);
            println!("  files: {} | dirs: {}", status.files_seen, status.dirs_seen);
            println!("  status file: {}", record.status_file);
            if status.state != TaskState::Done && !worker_running {
                println!("  worker: {}", "gone".red());
            }
        }
    }
    Ok(())
}

pub fn print_report(record: &TaskRecord, report: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => println!(
            "{}",
            json!({
                "id": record.id,
                "path": record.path,
                "report": report.lines().collect::<Vec<_>>(),
            })
        ),
        Format::Pretty => print!("{report}"),
    }
    Ok(())
}

pub fn print_size(path: &str, size: u64, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", json!({ "path": path, "size": size })),
        Format::Pretty => println!("The size of the folder is: {size}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_line_lists_id_path_and_file() {
        let record = TaskRecord::new(812, "/data/a");
        assert_eq!(record_line(&record), "id=812 path=/data/a file=.task812");
    }

    #[test]
    fn transition_messages_name_the_path() {
        let record = TaskRecord::new(5, "/data/a");
        assert_eq!(
            transition_message(&record, Transition::Suspended, Some(TaskState::Pending)),
            "Suspending task for '/data/a'"
        );
        assert_eq!(
            transition_message(&record, Transition::NotSuspended, Some(TaskState::Done)),
            "Task for '/data/a' is not suspended (done)"
        );
        assert_eq!(
            transition_message(&record, Transition::Removed, None),
            "Removed analysis task with ID '5' for '/data/a'"
        );
    }
}
