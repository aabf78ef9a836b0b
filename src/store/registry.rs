use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{DaError, Result};
use crate::model::TaskRecord;
use crate::store::layout;
use crate::store::lock;

/// Most tasks the registry tracks at once.
pub const REGISTRY_CAPACITY: usize = 100;

/// Persistent list of known tasks, backed by a single file.
///
/// The backing file stays exclusively locked for as long as the `Registry`
/// is alive, so one controller invocation owns it from load to persist.
/// Commands that only read use [`snapshot`] instead.
/// Records are loaded lazily on first access and written back in full.
pub struct Registry {
    path: PathBuf,
    file: File,
    records: Vec<TaskRecord>,
    loaded: bool,
    /// Number of records the backing file currently describes.
    on_disk: usize,
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn read_records(file: &mut File, path: &Path) -> Result<Vec<TaskRecord>> {
    let corrupt = |detail: String| DaError::Corrupt {
        path: path.display().to_string(),
        detail,
    };
    file.seek(SeekFrom::Start(0))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let records = layout::decode_registry(&data).map_err(|err| corrupt(err.to_string()))?;
    if records.len() > REGISTRY_CAPACITY {
        return Err(corrupt(format!(
            "{} records exceed capacity {REGISTRY_CAPACITY}",
            records.len()
        )));
    }
    Ok(records)
}

/// Read the registry under a shared lock, released before returning.
///
/// Waits while a controller holds the registry for writing; never fails
/// just because it is busy.
pub fn snapshot(path: &Path) -> Result<Vec<TaskRecord>> {
    ensure_parent(path)?;
    let mut file = lock::open_shared(path)?;
    let records = read_records(&mut file, path)?;
    lock::release_lock(file)?;
    Ok(records)
}

/// Look a task up by id; an unknown id is an error.
pub fn find_record(records: &[TaskRecord], id: u32) -> Result<&TaskRecord> {
    records
        .iter()
        .find(|record| record.id == id)
        .ok_or(DaError::TaskNotFound(id))
}

impl Registry {
    /// Open and lock the backing file, creating it (and its directory) if needed.
    /// Waits for any other controller holding it.
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent(path)?;
        let file = lock::open_exclusive(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            records: Vec::new(),
            loaded: false,
            on_disk: 0,
        })
    }

    /// Read every record from the backing file. A no-op once loaded.
    pub fn load(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        let records = read_records(&mut self.file, &self.path)?;
        self.on_disk = records.len();
        self.records = records;
        self.loaded = true;
        Ok(())
    }

    /// Rewrite the whole backing file from the in-memory records.
    ///
    /// Not atomic: a crash between truncation and the final write can leave a
    /// damaged file behind.
    pub fn persist(&mut self) -> Result<()> {
        if self.records.is_empty() && self.on_disk == 0 {
            return Ok(());
        }
        let data = layout::encode_registry(&self.records);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&data)?;
        self.file.set_len(data.len() as u64)?;
        self.file.flush()?;
        self.on_disk = self.records.len();
        tracing::debug!(
            path = %self.path.display(),
            tasks = self.records.len(),
            "registry persisted"
        );
        Ok(())
    }

    pub fn len(&mut self) -> Result<usize> {
        self.load()?;
        Ok(self.records.len())
    }

    /// Look a task up by id; an unknown id is an error.
    pub fn find(&mut self, id: u32) -> Result<&TaskRecord> {
        self.load()?;
        find_record(&self.records, id)
    }

    /// First record whose directory overlaps `path`: equal, an ancestor, or a descendant.
    pub fn overlapping(&mut self, path: &Path) -> Result<Option<&TaskRecord>> {
        self.load()?;
        Ok(self.records.iter().find(|record| {
            let tracked = Path::new(&record.path);
            path.starts_with(tracked) || tracked.starts_with(path)
        }))
    }

    pub fn add(&mut self, record: TaskRecord) -> Result<()> {
        self.load()?;
        if self.records.len() >= REGISTRY_CAPACITY {
            return Err(DaError::RegistryFull(REGISTRY_CAPACITY));
        }
        self.records.push(record);
        Ok(())
    }

    /// Remove a task, keeping the relative order of the rest.
    pub fn remove(&mut self, id: u32) -> Result<TaskRecord> {
        self.load()?;
        let index = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or(DaError::TaskNotFound(id))?;
        Ok(self.records.remove(index))
    }
}
