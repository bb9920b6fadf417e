//! JSON-file storage implementation
//!
//! One `<job_id>.json` file per job inside a state directory. Saves go to a
//! temporary file in the same directory which is then renamed over the
//! canonical file; a crash mid-write leaves only an orphaned temp file.

use crate::jobs::JobId;
use crate::storage::traits::{StateStore, StoreError, StoreResult};
use crate::storage::JobRecord;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Directory of per-job JSON records
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and creates if needed) the state directory
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, job_id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }

    fn read(path: &Path) -> StoreResult<JobRecord> {
        let bytes = fs::read(path)?;
        let mut record: JobRecord = serde_json::from_slice(&bytes)?;
        record.state = record.state.restore();
        Ok(record)
    }
}

impl StateStore for JsonFileStore {
    fn save(&self, record: &JobRecord) -> StoreResult<()> {
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, record)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        tmp.persist(self.path_for(record.job_id))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn load(&self, job_id: JobId) -> StoreResult<JobRecord> {
        match Self::read(&self.path_for(job_id)) {
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(job_id))
            }
            other => other,
        }
    }

    fn exists(&self, job_id: JobId) -> StoreResult<bool> {
        Ok(self.path_for(job_id).is_file())
    }

    fn list(&self) -> StoreResult<Vec<JobRecord>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .is_some_and(|stem| stem.parse::<JobId>().is_ok());
            if is_record {
                records.push(Self::read(&path)?);
            }
        }
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        Ok(records)
    }

    fn delete(&self, job_id: JobId) -> StoreResult<()> {
        match fs::remove_file(self.path_for(job_id)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
