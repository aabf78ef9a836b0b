use serde::{Deserialize, Serialize};

/// One entry of the task registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Worker process id; doubles as the task id.
    pub id: u32,
    /// Canonical absolute directory being analyzed.
    pub path: String,
    /// Name of the task's status file inside the state directory.
    pub status_file: String,
}

impl TaskRecord {
    pub fn new(id: u32, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            status_file: status_file_name(id),
        }
    }
}

/// Status-file name for a worker. Controller and worker both derive it from the pid.
pub fn status_file_name(pid: u32) -> String {
    format!(".task{pid}")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl TaskState {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::InProgress),
            2 => Some(Self::Done),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Low),
            2 => Some(Self::Normal),
            3 => Some(Self::High),
            _ => None,
        }
    }

    /// OS niceness the worker applies to itself.
    pub fn niceness(self) -> i32 {
        match self {
            Self::Low => 10,
            Self::Normal => 5,
            Self::High => 0,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::from_u32)
            .ok_or_else(|| format!("priority must be 1, 2 or 3 (got '{raw}')"))
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Outcome of a controller operation on one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Suspended,
    AlreadySuspended,
    NothingToSuspend,
    Resumed,
    NotSuspended,
    Removed,
}

/// Per-task status record shared by the worker and controller invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub record: TaskRecord,
    pub priority: Priority,
    /// Percent complete, 0..=100.
    pub progress: u32,
    pub state: TaskState,
    pub files_seen: u32,
    pub dirs_seen: u32,
    pub message_len: u32,
}

impl TaskStatus {
    /// Fresh record a worker publishes before it starts scanning.
    pub fn started(record: TaskRecord, priority: Priority) -> Self {
        Self {
            record,
            priority,
            progress: 0,
            state: TaskState::InProgress,
            files_seen: 0,
            dirs_seen: 0,
            message_len: 0,
        }
    }

    /// Mark the scan finished. Done is terminal.
    pub fn finish(&mut self) {
        self.state = TaskState::Done;
        self.progress = 100;
    }
}
