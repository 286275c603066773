//! Filesystem-backed [crate::Storage].
//!
//! # Format
//!
//! Each partition is a directory below [Config::storage_directory]. Each blob is a regular
//! file inside its partition directory, named by the hex encoding of the blob name:
//!
//! ```text
//! <storage_directory>/
//!     <partition>/
//!         <hex(name)>
//! ```

use crate::Error;
use geoseis_utils::{from_hex, hex};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::debug;

#[cfg(not(unix))]
mod fallback;
#[cfg(unix)]
mod unix;

#[cfg(not(unix))]
pub use fallback::Blob;
#[cfg(unix)]
pub use unix::Blob;

/// Configuration for [Storage].
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory that holds every partition.
    pub storage_directory: PathBuf,
}

impl Config {
    pub fn new(storage_directory: impl Into<PathBuf>) -> Self {
        Self {
            storage_directory: storage_directory.into(),
        }
    }
}

/// Storage rooted at a directory on the local filesystem.
#[derive(Clone)]
pub struct Storage {
    lock: Arc<Mutex<()>>,
    cfg: Config,
}

impl Storage {
    pub fn new(cfg: Config) -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            cfg,
        }
    }

    /// Directory backing the given partition.
    pub fn partition_path(&self, partition: &str) -> PathBuf {
        self.cfg.storage_directory.join(partition)
    }
}

/// Syncs a directory so entry creation and deletion are durable.
#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<(), Error> {
    let dir = fs::File::open(path).map_err(|e| {
        Error::BlobOpenFailed(
            path.to_string_lossy().to_string(),
            "directory".to_string(),
            e,
        )
    })?;
    dir.sync_all().map_err(|e| {
        Error::BlobSyncFailed(
            path.to_string_lossy().to_string(),
            "directory".to_string(),
            e,
        )
    })
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<(), Error> {
    Ok(())
}

impl crate::Storage for Storage {
    type Blob = Blob;

    fn open(&self, partition: &str, name: &[u8]) -> Result<(Self::Blob, u64), Error> {
        super::validate_partition_name(partition)?;

        // Acquire the filesystem lock
        let _guard = self.lock.lock().map_err(|_| Error::ReadFailed)?;

        // Create the partition directory, if it does not exist
        let parent = self.partition_path(partition);
        let parent_existed = parent.exists();
        fs::create_dir_all(&parent)
            .map_err(|_| Error::PartitionCreationFailed(partition.into()))?;

        // Open the file, creating it if it doesn't exist
        let path = parent.join(hex(name));
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::BlobOpenFailed(partition.into(), hex(name), e))?;
        let len = file.metadata().map_err(|_| Error::ReadFailed)?.len();

        // Make newly created files durable
        if len == 0 {
            file.sync_all()
                .map_err(|e| Error::BlobSyncFailed(partition.into(), hex(name), e))?;
            sync_dir(&parent)?;
            if !parent_existed {
                sync_dir(&self.cfg.storage_directory)?;
            }
        }
        debug!(partition, name = hex(name), len, "opened blob");
        Ok((Blob::new(partition.into(), name, file), len))
    }

    fn remove(&self, partition: &str, name: Option<&[u8]>) -> Result<(), Error> {
        super::validate_partition_name(partition)?;

        // Acquire the filesystem lock
        let _guard = self.lock.lock().map_err(|_| Error::WriteFailed)?;

        let path = self.partition_path(partition);
        if !path.exists() {
            return Err(Error::PartitionMissing(partition.into()));
        }
        match name {
            Some(name) => {
                let blob_path = path.join(hex(name));
                fs::remove_file(&blob_path)
                    .map_err(|_| Error::BlobMissing(partition.into(), hex(name)))?;
                sync_dir(&path)?;
            }
            None => {
                fs::remove_dir_all(&path)
                    .map_err(|_| Error::PartitionMissing(partition.into()))?;
                sync_dir(&self.cfg.storage_directory)?;
            }
        }
        debug!(partition, "removed");
        Ok(())
    }

    fn scan(&self, partition: &str) -> Result<Vec<Vec<u8>>, Error> {
        super::validate_partition_name(partition)?;

        // Acquire the filesystem lock
        let _guard = self.lock.lock().map_err(|_| Error::ReadFailed)?;

        let path = self.partition_path(partition);
        let entries =
            fs::read_dir(&path).map_err(|_| Error::PartitionMissing(partition.into()))?;
        let mut blobs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| Error::ReadFailed)?;
            let file_type = entry.file_type().map_err(|_| Error::ReadFailed)?;
            if !file_type.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                let name = from_hex(name).ok_or(Error::PartitionMissing(partition.into()))?;
                blobs.push(name);
            }
        }
        blobs.sort();
        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::tests::run_storage_tests, Blob as _, Storage as _};
    use geoseis_macros::test_traced;

    #[test_traced]
    fn test_fs_storage() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        run_storage_tests(Storage::new(Config::new(dir.path())));
    }

    #[test_traced]
    fn test_blob_survives_new_storage() {
        // Initialize the storage
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let storage = Storage::new(Config::new(dir.path()));
        let (blob, _) = storage.open("traces", b"matrix").expect("failed to open");
        blob.write_at(&[1, 2, 3, 4], 0).expect("failed to write");
        blob.sync().expect("failed to sync");
        drop(storage);

        // Open a second storage over the same directory
        let storage = Storage::new(Config::new(dir.path()));
        let (blob, len) = storage.open("traces", b"matrix").expect("failed to open");
        assert_eq!(len, 4);
        let mut buf = [0u8; 4];
        blob.read_at(&mut buf, 0).expect("failed to read");
        assert_eq!(buf, [1, 2, 3, 4]);

        // The blob is stored under its hex name
        assert!(dir.path().join("traces").join(hex(b"matrix")).exists());
    }
}
