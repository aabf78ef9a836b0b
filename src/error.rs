use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaError {
    #[error("no task with id {0}")]
    TaskNotFound(u32),

    #[error("directory '{path}' is already included in analysis with id {id}")]
    PathConflict { path: String, id: u32 },

    #[error("path '{0}' does not exist")]
    PathNotFound(String),

    #[error("path '{0}' is not a directory")]
    NotADirectory(String),

    #[error("path '{0}' is longer than {1} bytes")]
    PathTooLong(String, usize),

    #[error("task registry is full ({0} tasks)")]
    RegistryFull(usize),

    #[error("corrupt file '{path}': {detail}")]
    Corrupt { path: String, detail: String },

    #[error("worker {0} did not create its status file within {1:?}")]
    WorkerStartTimeout(u32, Duration),

    #[error("worker {0} exited before starting: {1}")]
    WorkerExited(u32, std::process::ExitStatus),

    #[error("worker for task {0} is no longer running; remove the task")]
    WorkerGone(u32),

    #[error("task {0} has not finished; no report yet")]
    ReportNotReady(u32),

    #[error("failed to send {signal} to process {pid}: {source}")]
    Signal {
        pid: u32,
        signal: &'static str,
        source: nix::errno::Errno,
    },

    #[error("cannot determine a state directory (set DA_STATE_DIR)")]
    NoStateDir,

    #[error("invalid value for {var}: '{value}'")]
    InvalidConfig { var: &'static str, value: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DaError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TaskNotFound(_) => "task_not_found",
            Self::PathConflict { .. } => "path_conflict",
            Self::PathNotFound(_) => "path_not_found",
            Self::NotADirectory(_) => "not_a_directory",
            Self::PathTooLong(_, _) => "path_too_long",
            Self::RegistryFull(_) => "registry_full",
            Self::Corrupt { .. } => "corrupt_file",
            Self::WorkerStartTimeout(_, _) => "worker_start_timeout",
            Self::WorkerExited(_, _) => "worker_exited",
            Self::WorkerGone(_) => "worker_gone",
            Self::ReportNotReady(_) => "report_not_ready",
            Self::Signal { .. } => "signal_error",
            Self::NoStateDir => "no_state_dir",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    /// Rejected `add` requests are reported but leave the process exiting cleanly.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::PathConflict { .. } | Self::PathNotFound(_) | Self::NotADirectory(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejections_are_not_fatal() {
        let conflict = DaError::PathConflict {
            path: "/data/a".into(),
            id: 42,
        };
        assert!(!conflict.is_fatal());
        assert!(!DaError::PathNotFound("/nope".into()).is_fatal());
        assert!(!DaError::NotADirectory("/etc/hosts".into()).is_fatal());
    }

    #[test]
    fn unknown_task_aborts_invocation() {
        let err = DaError::TaskNotFound(7);
        assert!(err.is_fatal());
        assert_eq!(err.code(), "task_not_found");
        assert_eq!(err.to_string(), "no task with id 7");
    }
}
