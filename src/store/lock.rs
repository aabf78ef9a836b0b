use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::Result;

fn open_rw(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// Open (creating if needed) and exclusively lock a file, waiting for any
/// other holder. The lock is released when the File is dropped.
pub fn open_exclusive(path: &Path) -> Result<File> {
    let file = open_rw(path)?;
    lock_exclusive(&file)?;
    Ok(file)
}

/// Like [`open_exclusive`] but shared: readers coexist, writers wait.
pub fn open_shared(path: &Path) -> Result<File> {
    let file = open_rw(path)?;
    lock_shared(&file)?;
    Ok(file)
}

/// Block until a shared lock is held on `file`.
pub fn lock_shared(file: &File) -> Result<()> {
    file.lock_shared()?;
    Ok(())
}

/// Block until an exclusive lock is held on `file`.
pub fn lock_exclusive(file: &File) -> Result<()> {
    file.lock_exclusive()?;
    Ok(())
}

/// Release the lock and close the handle.
pub fn release_lock(file: File) -> Result<()> {
    file.unlock()?;
    drop(file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn exclusive_open_waits_for_the_holder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proc_list");
        let held = open_exclusive(&path).unwrap();

        let waiter = {
            let path = path.clone();
            std::thread::spawn(move || {
                let start = std::time::Instant::now();
                let file = open_exclusive(&path).unwrap();
                release_lock(file).unwrap();
                start.elapsed()
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(200));
        release_lock(held).unwrap();

        let waited = waiter.join().unwrap();
        assert!(waited >= std::time::Duration::from_millis(150), "waited {waited:?}");
    }

    #[test]
    fn shared_opens_create_the_file_and_coexist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh");

        let a = open_shared(&path).unwrap();
        let b = open_shared(&path).unwrap();
        assert!(path.is_file());
        let writer = File::open(&path).unwrap();
        assert!(writer.try_lock_exclusive().is_err());

        release_lock(a).unwrap();
        release_lock(b).unwrap();
    }

    #[test]
    fn shared_locks_coexist_but_exclude_writers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status");
        std::fs::write(&path, b"x").unwrap();

        let a = File::open(&path).unwrap();
        let b = File::open(&path).unwrap();
        lock_shared(&a).unwrap();
        lock_shared(&b).unwrap();

        let writer = OpenOptions::new().write(true).open(&path).unwrap();
        assert!(writer.try_lock_exclusive().is_err());

        release_lock(a).unwrap();
        release_lock(b).unwrap();
        lock_exclusive(&writer).unwrap();
    }
}
