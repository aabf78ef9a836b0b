use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::error::{DaError, Result};
use crate::model::TaskStatus;
use crate::store::layout::{self, STATUS_SIZE};
use crate::store::lock;

/// Status files of all tasks, one fixed-size record per file, inside the state directory.
///
/// Every write holds an exclusive lock for its duration. Reads that feed a
/// state transition go through [`StatusStore::lock_for_update`] so the lock is
/// held across the whole read-modify-write.
pub struct StatusStore {
    dir: PathBuf,
}

/// A status record read under a shared lock. The lock is held until
/// [`SharedStatus::release`] or drop.
#[derive(Debug)]
pub struct SharedStatus {
    file: File,
    status: TaskStatus,
}

impl SharedStatus {
    pub fn release(self) -> Result<TaskStatus> {
        lock::release_lock(self.file)?;
        Ok(self.status)
    }
}

/// A status record held under an exclusive lock for read-modify-write.
#[derive(Debug)]
pub struct StatusLock {
    file: File,
    status: TaskStatus,
}

impl StatusLock {
    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    /// Overwrite the record while still holding the lock.
    pub fn write_back(&mut self, status: TaskStatus) -> Result<()> {
        write_record(&mut self.file, &status)?;
        self.status = status;
        Ok(())
    }

    pub fn release(self) -> Result<TaskStatus> {
        lock::release_lock(self.file)?;
        Ok(self.status)
    }
}

fn write_record(file: &mut File, status: &TaskStatus) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    layout::write_status(file, status)?;
    file.set_len(STATUS_SIZE as u64)?;
    file.flush()?;
    Ok(())
}

fn read_record(file: &mut File, path: &Path) -> Result<TaskStatus> {
    file.seek(SeekFrom::Start(0))?;
    let mut data = Vec::with_capacity(STATUS_SIZE);
    file.read_to_end(&mut data)?;
    layout::decode_status(&data).map_err(|err| DaError::Corrupt {
        path: path.display().to_string(),
        detail: err.to_string(),
    })
}

impl StatusStore {
    pub fn open(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.to_path_buf(),
        }
    }

    pub fn path_for(&self, status_file: &str) -> PathBuf {
        self.dir.join(status_file)
    }

    /// Create (or reset) the status file named by the record and publish `status` into it.
    pub fn create(&self, status: &TaskStatus) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(self.path_for(&status.record.status_file))?;
        self.write(status)
    }

    /// Read under a shared lock and keep the lock until the returned guard is released.
    pub fn read_locked(&self, status_file: &str) -> Result<SharedStatus> {
        let path = self.path_for(status_file);
        let mut file = File::open(&path)?;
        lock::lock_shared(&file)?;
        let status = read_record(&mut file, &path)?;
        Ok(SharedStatus { file, status })
    }

    /// Informational read: shared lock for the read only.
    pub fn read(&self, status_file: &str) -> Result<TaskStatus> {
        self.read_locked(status_file)?.release()
    }

    /// Read under an exclusive lock held until the guard is released.
    pub fn lock_for_update(&self, status_file: &str) -> Result<StatusLock> {
        let path = self.path_for(status_file);
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        lock::lock_exclusive(&file)?;
        let status = read_record(&mut file, &path)?;
        Ok(StatusLock { file, status })
    }

    /// Write the full record under an exclusive lock.
    pub fn write(&self, status: &TaskStatus) -> Result<()> {
        let path = self.path_for(&status.record.status_file);
        let mut file = OpenOptions::new().write(true).open(&path)?;
        lock::lock_exclusive(&file)?;
        write_record(&mut file, status)?;
        lock::release_lock(file)
    }

    /// Exclusive read-modify-write; returns the record as written.
    pub fn update<F>(&self, status_file: &str, apply: F) -> Result<TaskStatus>
    where
        F: FnOnce(&mut TaskStatus),
    {
        let mut guard = self.lock_for_update(status_file)?;
        let mut status = guard.status().clone();
        apply(&mut status);
        guard.write_back(status)?;
        guard.release()
    }

    pub fn delete(&self, status_file: &str) -> Result<()> {
        fs::remove_file(self.path_for(status_file))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TaskRecord, TaskState};
    use fs2::FileExt;
    use tempfile::tempdir;

    fn started(id: u32) -> TaskStatus {
        TaskStatus::started(TaskRecord::new(id, "/data/a"), Priority::Normal)
    }

    #[test]
    fn create_then_read() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());
        let status = started(11);

        store.create(&status).unwrap();

        assert!(store.path_for(".task11").is_file());
        assert_eq!(store.read(".task11").unwrap(), status);
        let len = fs::metadata(store.path_for(".task11")).unwrap().len();
        assert_eq!(len, STATUS_SIZE as u64);
    }

    #[test]
    fn update_touches_only_what_the_closure_changes() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());
        let mut status = started(12);
        status.state = TaskState::Pending;
        store.create(&status).unwrap();

        let written = store
            .update(".task12", |s| {
                s.progress = 50;
                s.files_seen = 3;
            })
            .unwrap();

        assert_eq!(written.state, TaskState::Pending);
        assert_eq!(store.read(".task12").unwrap().progress, 50);
    }

    #[test]
    fn write_replaces_the_whole_record() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());
        store.create(&started(17)).unwrap();

        let mut done = started(17);
        done.files_seen = 9;
        done.dirs_seen = 4;
        done.finish();
        store.write(&done).unwrap();

        let read = store.read(".task17").unwrap();
        assert_eq!(read, done);
        assert_eq!(read.state, TaskState::Done);
        let len = fs::metadata(store.path_for(".task17")).unwrap().len();
        assert_eq!(len, STATUS_SIZE as u64);
    }

    #[test]
    fn write_needs_an_existing_file() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());

        assert!(matches!(store.write(&started(18)), Err(DaError::Io(_))));
        assert!(!store.path_for(".task18").exists());
    }

    #[test]
    fn exclusive_guard_blocks_other_writers_until_released() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());
        store.create(&started(13)).unwrap();

        let mut guard = store.lock_for_update(".task13").unwrap();
        let other = File::open(store.path_for(".task13")).unwrap();
        assert!(other.try_lock_shared().is_err());

        let mut next = guard.status().clone();
        next.state = TaskState::Pending;
        guard.write_back(next).unwrap();
        guard.release().unwrap();

        assert!(other.try_lock_shared().is_ok());
        assert_eq!(store.read(".task13").unwrap().state, TaskState::Pending);
    }

    #[test]
    fn shared_guard_holds_until_release() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());
        store.create(&started(14)).unwrap();

        let shared = store.read_locked(".task14").unwrap();
        let other = OpenOptions::new()
            .write(true)
            .open(store.path_for(".task14"))
            .unwrap();
        assert!(other.try_lock_exclusive().is_err());

        let status = shared.release().unwrap();
        assert_eq!(status.record.id, 14);
        assert!(other.try_lock_exclusive().is_ok());
    }

    #[test]
    fn short_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());
        fs::write(store.path_for(".task15"), [0u8; 10]).unwrap();

        let err = store.read(".task15").unwrap_err();
        assert!(matches!(err, DaError::Corrupt { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let store = StatusStore::open(dir.path());
        assert!(matches!(store.read(".task16"), Err(DaError::Io(_))));
    }
}
