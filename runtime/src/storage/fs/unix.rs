use crate::Error;
use geoseis_utils::hex;
use std::{fs::File, os::unix::fs::FileExt, sync::Arc};

/// A file-backed blob using positional I/O.
///
/// `pread`/`pwrite` do not move a shared cursor, so clones may read and write
/// disjoint ranges concurrently without a lock.
#[derive(Clone)]
pub struct Blob {
    partition: String,
    name: Vec<u8>,
    file: Arc<File>,
}

impl Blob {
    pub(super) fn new(partition: String, name: &[u8], file: File) -> Self {
        Self {
            partition,
            name: name.into(),
            file: Arc::new(file),
        }
    }
}

impl crate::Blob for Blob {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        offset
            .checked_add(buf.len() as u64)
            .ok_or(Error::OffsetOverflow)?;
        self.file.read_exact_at(buf, offset).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::BlobInsufficientLength,
            _ => Error::ReadFailed,
        })
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error> {
        offset
            .checked_add(buf.len() as u64)
            .ok_or(Error::OffsetOverflow)?;
        self.file
            .write_all_at(buf, offset)
            .map_err(|_| Error::WriteFailed)
    }

    fn resize(&self, len: u64) -> Result<(), Error> {
        self.file
            .set_len(len)
            .map_err(|e| Error::BlobResizeFailed(self.partition.clone(), hex(&self.name), e))
    }

    fn sync(&self) -> Result<(), Error> {
        self.file
            .sync_all()
            .map_err(|e| Error::BlobSyncFailed(self.partition.clone(), hex(&self.name), e))
    }
}
