use crate::Error;
use geoseis_utils::hex;
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom, Write},
    sync::{Arc, Mutex},
};

#[derive(Clone)]
pub struct Blob {
    partition: String,
    name: Vec<u8>,
    // Files must be seeked prior to any read or write operation and are thus
    // not safe to concurrently interact with.
    file: Arc<Mutex<File>>,
}

impl Blob {
    pub(super) fn new(partition: String, name: &[u8], file: File) -> Self {
        Self {
            partition,
            name: name.into(),
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl crate::Blob for Blob {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        let mut file = self.file.lock().map_err(|_| Error::ReadFailed)?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|_| Error::ReadFailed)?;
        file.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::BlobInsufficientLength,
            _ => Error::ReadFailed,
        })
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let mut file = self.file.lock().map_err(|_| Error::WriteFailed)?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|_| Error::WriteFailed)?;
        file.write_all(buf).map_err(|_| Error::WriteFailed)
    }

    fn resize(&self, len: u64) -> Result<(), Error> {
        let file = self.file.lock().map_err(|_| Error::WriteFailed)?;
        file.set_len(len)
            .map_err(|e| Error::BlobResizeFailed(self.partition.clone(), hex(&self.name), e))
    }

    fn sync(&self) -> Result<(), Error> {
        let file = self.file.lock().map_err(|_| Error::WriteFailed)?;
        file.sync_all()
            .map_err(|e| Error::BlobSyncFailed(self.partition.clone(), hex(&self.name), e))
    }
}
