//! Worker processes: spawning, scheduling priority and control signals.
//!
//! Pause and continue are coarse: a paused worker freezes wherever it is and
//! picks up at the same instruction on continue. Terminate is forceful and the
//! worker gets no chance to flush anything.

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::config::Config;
use crate::error::{DaError, Result};
use crate::model::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Pause,
    Continue,
    Terminate,
}

impl ControlSignal {
    fn signal(self) -> Signal {
        match self {
            Self::Pause => Signal::SIGSTOP,
            Self::Continue => Signal::SIGCONT,
            Self::Terminate => Signal::SIGTERM,
        }
    }
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.signal().as_str())
    }
}

fn pid_of(pid: u32) -> Result<Pid> {
    // Pids past i32::MAX would address process groups.
    let raw = i32::try_from(pid).map_err(|_| DaError::Signal {
        pid,
        signal: "signal",
        source: Errno::EINVAL,
    })?;
    Ok(Pid::from_raw(raw))
}

/// Deliver a control signal; any failure is an error.
pub fn send(pid: u32, control: ControlSignal) -> Result<()> {
    let sig = control.signal();
    signal::kill(pid_of(pid)?, sig).map_err(|source| DaError::Signal {
        pid,
        signal: sig.as_str(),
        source,
    })?;
    tracing::info!(pid, signal = sig.as_str(), "signal sent");
    Ok(())
}

/// Like [`send`], but a process that no longer exists is not an error.
/// Returns whether the signal was delivered.
pub fn send_best_effort(pid: u32, control: ControlSignal) -> Result<bool> {
    match send(pid, control) {
        Ok(()) => Ok(true),
        Err(DaError::Signal {
            source: Errno::ESRCH,
            ..
        }) => {
            tracing::warn!(pid, signal = %control, "process already gone");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Set the calling process's niceness for `priority`.
pub fn apply_priority(priority: Priority) -> Result<()> {
    let nice = priority.niceness();
    // SAFETY: setpriority only reads its integer arguments; `who == 0` targets this process.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, nice) };
    if rc == -1 {
        return Err(std::io::Error::last_os_error().into());
    }
    tracing::debug!(nice, %priority, "scheduling priority applied");
    Ok(())
}

/// Launch a detached worker for `path`.
///
/// The worker inherits the environment (state directory, scan delay, log
/// filter) and owns its status file from then on.
pub fn spawn_worker(config: &Config, path: &Path, priority: Priority) -> Result<Child> {
    let child = Command::new(&config.worker_exe)
        .arg("worker")
        .arg(path)
        .arg("--priority")
        .arg(priority.as_u32().to_string())
        .env(crate::config::STATE_DIR_ENV, &config.state_dir)
        .env(
            crate::config::SCAN_DELAY_ENV,
            config.scan_delay.as_millis().to_string(),
        )
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        // Own process group: terminal job control aimed at the controller misses the worker.
        .process_group(0)
        .spawn()?;
    tracing::info!(pid = child.id(), path = %path.display(), %priority, "worker spawned");
    Ok(child)
}

/// True while `pid` names a live process.
pub fn is_alive(pid: u32) -> bool {
    match pid_of(pid) {
        Ok(pid) => signal::kill(pid, None).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn proc_state(pid: u32) -> Option<char> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        let after_comm = stat.rsplit_once(')')?.1;
        after_comm.trim_start().chars().next()
    }

    fn wait_for_state(pid: u32, wanted: &[char]) -> Option<char> {
        for _ in 0..100 {
            let state = proc_state(pid);
            if state.is_some_and(|s| wanted.contains(&s)) {
                return state;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        proc_state(pid)
    }

    #[test]
    fn pause_and_continue_a_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();

        send(pid, ControlSignal::Pause).unwrap();
        assert_eq!(wait_for_state(pid, &['T']), Some('T'));

        send(pid, ControlSignal::Continue).unwrap();
        assert!(matches!(wait_for_state(pid, &['S', 'R']), Some('S' | 'R')));

        send(pid, ControlSignal::Terminate).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn best_effort_tolerates_missing_process() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(!send_best_effort(pid, ControlSignal::Terminate).unwrap());
        assert!(matches!(
            send(pid, ControlSignal::Terminate),
            Err(DaError::Signal {
                source: Errno::ESRCH,
                ..
            })
        ));
    }

    #[test]
    fn liveness_follows_the_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert!(is_alive(pid));
        child.kill().unwrap();
        child.wait().unwrap();
        assert!(!is_alive(pid));
    }

    #[test]
    fn control_signal_names() {
        assert_eq!(ControlSignal::Pause.to_string(), "SIGSTOP");
        assert_eq!(ControlSignal::Continue.to_string(), "SIGCONT");
        assert_eq!(ControlSignal::Terminate.to_string(), "SIGTERM");
    }
}
