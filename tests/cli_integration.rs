use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::{TempDir, tempdir};

struct Env {
    dir: TempDir,
    scan_delay_ms: u64,
}

impl Env {
    fn new(scan_delay_ms: u64) -> Self {
        Self {
            dir: tempdir().unwrap(),
            scan_delay_ms,
        }
    }

    fn state_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("state")
    }

    /// A tree with `dirs` first-level directories, each holding one file.
    fn tree(&self, name: &str, dirs: usize) -> std::path::PathBuf {
        let root = self.dir.path().join(name);
        for i in 0..dirs {
            let sub = root.join(format!("d{i:02}"));
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join("f.txt"), b"payload").unwrap();
        }
        std::fs::create_dir_all(&root).unwrap();
        root.canonicalize().unwrap()
    }

    fn command(&self, args: &[&str]) -> Command {
        let binary = assert_cmd::cargo::cargo_bin!("da");
        let mut cmd = Command::new(binary);
        cmd.env("DA_STATE_DIR", self.state_dir());
        cmd.env("DA_SCAN_DELAY_MS", self.scan_delay_ms.to_string());
        cmd.env_remove("DA_LOG");
        cmd.arg("--format").arg("json");
        cmd.args(args);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("da command executes")
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "da {:?} failed:\nstdout:\n{}\nstderr:\n{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("valid json stdout")
    }

    fn add(&self, path: &Path, priority: &str) -> u32 {
        let added = self.run_json(&["add", path.to_str().unwrap(), priority]);
        added["id"].as_u64().expect("task id") as u32
    }

    fn state_of(&self, id: u32) -> String {
        let info = self.run_json(&["info", &id.to_string()]);
        info["state"].as_str().expect("state").to_string()
    }

    fn wait_until_done(&self, id: u32) {
        for _ in 0..250 {
            if self.state_of(id) == "done" {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("task {id} did not finish");
    }
}

fn error_line(output: &Output) -> Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    serde_json::from_str(line).expect("valid json error line in stderr")
}

#[test]
fn add_scans_in_the_background_and_print_shows_the_report() {
    let env = Env::new(0);
    let root = env.tree("data", 3);

    let id = env.add(&root, "3");
    env.wait_until_done(id);

    let info = env.run_json(&["info", &id.to_string()]);
    assert_eq!(info["progress"], 100);
    assert_eq!(info["priority"], "high");
    assert_eq!(info["dirs_seen"], 3);
    assert_eq!(info["files_seen"], 3);

    let printed = env.run_json(&["print", &id.to_string()]);
    let lines: Vec<&str> = printed["report"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| line.as_str().unwrap())
        .collect();
    assert_eq!(lines[0], "Path    Usage   Size");
    assert!(lines[1].starts_with(&format!("{} 100% ", root.display())));
    assert_eq!(lines[2], "|");
    assert!(lines[3].starts_with("|-/d00 "));
    assert_eq!(lines.len(), 6);

    env.run_json(&["remove", &id.to_string()]);
}

#[test]
fn list_shows_tasks_in_creation_order() {
    let env = Env::new(0);
    let first = env.tree("one", 1);
    let second = env.tree("two", 1);

    let a = env.add(&first, "1");
    let b = env.add(&second, "2");

    let listed = env.run_json(&["list"]);
    let ids: Vec<u64> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![u64::from(a), u64::from(b)]);
    assert_eq!(listed[0]["path"], first.to_str().unwrap());
    assert_eq!(listed[0]["status_file"], format!(".task{a}"));

    env.run_json(&["remove", &a.to_string()]);
    env.run_json(&["remove", &b.to_string()]);
    assert_eq!(env.run_json(&["list"]), serde_json::json!([]));
}

#[test]
fn suspend_resume_and_remove_a_slow_scan() {
    let env = Env::new(200);
    let root = env.tree("slow", 20);
    let id = env.add(&root, "2");
    let id_arg = id.to_string();

    let suspended = env.run_json(&["suspend", &id_arg]);
    assert_eq!(suspended["transition"], "suspended");
    assert_eq!(env.state_of(id), "pending");

    let again = env.run_json(&["suspend", &id_arg]);
    assert_eq!(again["transition"], "already_suspended");

    let resumed = env.run_json(&["resume", &id_arg]);
    assert_eq!(resumed["transition"], "resumed");
    assert_eq!(env.state_of(id), "in_progress");

    let not_ready = env.run(&["print", &id_arg]);
    assert_eq!(not_ready.status.code(), Some(1));
    assert_eq!(error_line(&not_ready)["error"], "report_not_ready");

    let removed = env.run_json(&["remove", &id_arg]);
    assert_eq!(removed["transition"], "removed");
    assert!(!env.state_dir().join(format!(".task{id}")).exists());

    let gone = env.run(&["info", &id_arg]);
    assert_eq!(gone.status.code(), Some(1));
    assert_eq!(error_line(&gone)["error"], "task_not_found");
}

#[test]
fn list_answers_while_an_add_waits_for_its_worker() {
    let env = Env::new(0);
    let root = env.tree("waiting", 1);
    let worker = env.dir.path().join("silent-worker.sh");
    std::fs::write(&worker, "#!/bin/sh\nsleep 3\n").unwrap();
    std::fs::set_permissions(&worker, std::fs::Permissions::from_mode(0o755)).unwrap();

    let add = env
        .command(&["add", root.to_str().unwrap()])
        .env("DA_WORKER_EXE", &worker)
        .env("DA_SPAWN_TIMEOUT_MS", "1500")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    thread::sleep(Duration::from_millis(300));

    let start = Instant::now();
    let listed = env.run_json(&["list"]);
    assert!(start.elapsed() < Duration::from_secs(1), "list waited {:?}", start.elapsed());
    assert_eq!(listed, serde_json::json!([]));

    let output = add.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(error_line(&output)["error"], "worker_start_timeout");
    assert_eq!(env.run_json(&["list"]), serde_json::json!([]));
}

#[test]
fn overlapping_path_is_rejected_without_failing() {
    let env = Env::new(200);
    let root = env.tree("busy", 10);
    let id = env.add(&root, "2");

    let nested = root.join("d01");
    let output = env.run(&["add", nested.to_str().unwrap(), "2"]);

    assert_eq!(output.status.code(), Some(0));
    let err = error_line(&output);
    assert_eq!(err["error"], "path_conflict");
    assert!(
        err["message"]
            .as_str()
            .unwrap()
            .contains(&format!("with id {id}"))
    );
    assert_eq!(env.run_json(&["list"]).as_array().unwrap().len(), 1);

    env.run_json(&["remove", &id.to_string()]);
}

#[test]
fn missing_directory_is_rejected_without_failing() {
    let env = Env::new(0);
    let missing = env.dir.path().join("nowhere");

    let output = env.run(&["add", missing.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(error_line(&output)["error"], "path_not_found");
}

#[test]
fn unknown_task_fails_the_invocation() {
    let env = Env::new(0);
    for command in ["suspend", "resume", "remove", "info", "print"] {
        let output = env.run(&[command, "424242"]);
        assert_eq!(output.status.code(), Some(1), "{command}");
        assert_eq!(error_line(&output)["error"], "task_not_found");
    }
}

#[test]
fn invalid_priority_is_a_usage_error() {
    let env = Env::new(0);
    let root = env.tree("prio", 1);

    let output = env.run(&["add", root.to_str().unwrap(), "7"]);

    assert!(!output.status.success());
    assert!(env.run_json(&["list"]).as_array().unwrap().is_empty());
}

#[test]
fn check_reports_the_entry_size() {
    let env = Env::new(0);
    let file = env.dir.path().join("blob.bin");
    std::fs::write(&file, vec![0u8; 1234]).unwrap();

    let checked = env.run_json(&["check", file.to_str().unwrap()]);

    assert_eq!(checked["size"], 1234);
}

#[test]
fn pretty_output_uses_the_classic_messages() {
    let env = Env::new(0);
    let file = env.dir.path().join("blob.bin");
    std::fs::write(&file, vec![0u8; 10]).unwrap();

    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("da"))
        .env("DA_STATE_DIR", env.state_dir())
        .args(["check", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicates::str::diff("The size of the folder is: 10\n"));
}
