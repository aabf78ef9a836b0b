use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DaError, Result};

pub const STATE_DIR_ENV: &str = "DA_STATE_DIR";
pub const WORKER_EXE_ENV: &str = "DA_WORKER_EXE";
pub const SCAN_DELAY_ENV: &str = "DA_SCAN_DELAY_MS";
pub const SPAWN_TIMEOUT_ENV: &str = "DA_SPAWN_TIMEOUT_MS";

const REGISTRY_FILE: &str = "proc_list";
const DEFAULT_SPAWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where state lives and how workers are launched, resolved once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Holds the registry, status files, scan reports and worker logs.
    pub state_dir: PathBuf,
    /// Program spawned as `<worker_exe> worker <path> --priority <n>`.
    pub worker_exe: PathBuf,
    /// Pause after each directory the worker visits.
    pub scan_delay: Duration,
    /// How long `add` waits for a new worker to publish its status file.
    pub spawn_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let state_dir = match env_value(STATE_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir().ok_or(DaError::NoStateDir)?.join(".da"),
        };
        let worker_exe = match env_value(WORKER_EXE_ENV) {
            Some(exe) => PathBuf::from(exe),
            None => std::env::current_exe()?,
        };
        let scan_delay = env_millis(SCAN_DELAY_ENV)?.unwrap_or(Duration::ZERO);
        let spawn_timeout = env_millis(SPAWN_TIMEOUT_ENV)?.unwrap_or(DEFAULT_SPAWN_TIMEOUT);

        Ok(Self {
            state_dir,
            worker_exe,
            scan_delay,
            spawn_timeout,
        })
    }

    /// Defaults rooted at an explicit state directory.
    pub fn with_state_dir(state_dir: impl Into<PathBuf>, worker_exe: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            worker_exe: worker_exe.into(),
            scan_delay: Duration::ZERO,
            spawn_timeout: DEFAULT_SPAWN_TIMEOUT,
        }
    }

    pub fn ensure_state_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.state_dir)?;
        Ok(&self.state_dir)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir.join(REGISTRY_FILE)
    }

    pub fn report_path(&self, status_file: &str) -> PathBuf {
        self.state_dir.join(format!("{status_file}.report"))
    }

    pub fn log_path(&self, status_file: &str) -> PathBuf {
        self.state_dir.join(format!("{status_file}.log"))
    }
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty())
}

fn env_millis(var: &'static str) -> Result<Option<Duration>> {
    let Some(raw) = env_value(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|ms| Some(Duration::from_millis(ms)))
        .map_err(|_| DaError::InvalidConfig { var, value: raw })
}
