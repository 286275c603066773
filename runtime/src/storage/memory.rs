//! In-memory [crate::Storage] used by tests and throwaway datasets.
//!
//! Unsynced writes are only visible through the [Blob] that made them (and its clones). Calling
//! [crate::Blob::sync] publishes the contents so later calls to [crate::Storage::open] observe them.

use crate::Error;
use geoseis_utils::hex;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, RwLock},
};

type Partition = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory storage implementation.
#[derive(Clone, Default)]
pub struct Storage {
    partitions: Arc<Mutex<BTreeMap<String, Partition>>>,
}

impl crate::Storage for Storage {
    type Blob = Blob;

    fn open(&self, partition: &str, name: &[u8]) -> Result<(Self::Blob, u64), Error> {
        super::validate_partition_name(partition)?;

        let mut partitions = self.partitions.lock().map_err(|_| Error::ReadFailed)?;
        let partition_entry = partitions.entry(partition.into()).or_default();
        let content = partition_entry.entry(name.into()).or_default();
        Ok((
            Blob::new(
                self.partitions.clone(),
                partition.into(),
                name,
                content.clone(),
            ),
            content.len() as u64,
        ))
    }

    fn remove(&self, partition: &str, name: Option<&[u8]>) -> Result<(), Error> {
        super::validate_partition_name(partition)?;

        let mut partitions = self.partitions.lock().map_err(|_| Error::WriteFailed)?;
        match name {
            Some(name) => {
                partitions
                    .get_mut(partition)
                    .ok_or(Error::PartitionMissing(partition.into()))?
                    .remove(name)
                    .ok_or(Error::BlobMissing(partition.into(), hex(name)))?;
            }
            None => {
                partitions
                    .remove(partition)
                    .ok_or(Error::PartitionMissing(partition.into()))?;
            }
        }
        Ok(())
    }

    fn scan(&self, partition: &str) -> Result<Vec<Vec<u8>>, Error> {
        super::validate_partition_name(partition)?;

        let partitions = self.partitions.lock().map_err(|_| Error::ReadFailed)?;
        let partition = partitions
            .get(partition)
            .ok_or(Error::PartitionMissing(partition.into()))?;
        Ok(partition.keys().cloned().collect())
    }
}

/// A blob held in memory.
#[derive(Clone)]
pub struct Blob {
    partitions: Arc<Mutex<BTreeMap<String, Partition>>>,
    partition: String,
    name: Vec<u8>,
    content: Arc<RwLock<Vec<u8>>>,
}

impl Blob {
    fn new(
        partitions: Arc<Mutex<BTreeMap<String, Partition>>>,
        partition: String,
        name: &[u8],
        content: Vec<u8>,
    ) -> Self {
        Self {
            partitions,
            partition,
            name: name.into(),
            content: Arc::new(RwLock::new(content)),
        }
    }
}

impl crate::Blob for Blob {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        let offset: usize = offset.try_into().map_err(|_| Error::OffsetOverflow)?;
        let end = offset
            .checked_add(buf.len())
            .ok_or(Error::OffsetOverflow)?;
        let content = self.content.read().map_err(|_| Error::ReadFailed)?;
        if end > content.len() {
            return Err(Error::BlobInsufficientLength);
        }
        buf.copy_from_slice(&content[offset..end]);
        Ok(())
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let offset: usize = offset.try_into().map_err(|_| Error::OffsetOverflow)?;
        let end = offset
            .checked_add(buf.len())
            .ok_or(Error::OffsetOverflow)?;
        let mut content = self.content.write().map_err(|_| Error::WriteFailed)?;
        if end > content.len() {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn resize(&self, len: u64) -> Result<(), Error> {
        let len: usize = len.try_into().map_err(|_| Error::OffsetOverflow)?;
        let mut content = self.content.write().map_err(|_| Error::WriteFailed)?;
        content.resize(len, 0);
        Ok(())
    }

    fn sync(&self) -> Result<(), Error> {
        // Snapshot the content for the partition
        let new_content = self
            .content
            .read()
            .map_err(|_| Error::ReadFailed)?
            .clone();

        // Publish the snapshot
        let mut partitions = self.partitions.lock().map_err(|_| Error::WriteFailed)?;
        let partition = partitions
            .get_mut(&self.partition)
            .ok_or(Error::PartitionMissing(self.partition.clone()))?;
        let content = partition
            .get_mut(&self.name)
            .ok_or(Error::BlobMissing(self.partition.clone(), hex(&self.name)))?;
        *content = new_content;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::tests::run_storage_tests, Blob as _, Storage as _};
    use geoseis_macros::test_traced;

    #[test_traced]
    fn test_memory_storage() {
        run_storage_tests(Storage::default());
    }

    #[test_traced]
    fn test_unsynced_writes_not_published() {
        // Initialize the storage
        let storage = Storage::default();
        let (blob, _) = storage.open("partition", b"blob").expect("failed to open");

        // Write without syncing
        blob.write_at(b"data", 0).expect("failed to write");

        // A fresh handle does not observe the write
        let (_, len) = storage.open("partition", b"blob").expect("failed to open");
        assert_eq!(len, 0);

        // Once synced, it does
        blob.sync().expect("failed to sync");
        let (_, len) = storage.open("partition", b"blob").expect("failed to open");
        assert_eq!(len, 4);
    }
}
