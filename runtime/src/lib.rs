//! Persist seismic blobs and fan work out onto a bounded worker pool.
//!
//! # Overview
//!
//! The runtime exposes two narrow capabilities to the rest of the workspace:
//!
//! * [Storage]: partitioned, named [Blob]s that support positional reads and writes. Two
//!   implementations are provided: [storage::fs] (durable, backed by the local filesystem) and
//!   [storage::memory] (ephemeral, used by tests).
//! * [create_pool]: a bounded [rayon] thread pool used by bulk import and export.
//!
//! All operations are synchronous and return on the caller's thread.

use rayon::{ThreadPool as RThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::{io::Error as IoError, sync::Arc};
use thiserror::Error;

pub mod storage;

/// Errors that can occur when interacting with the runtime.
#[derive(Error, Debug)]
pub enum Error {
    #[error("write failed")]
    WriteFailed,
    #[error("read failed")]
    ReadFailed,
    #[error("partition name invalid, must only contain alphanumeric, dash ('-'), or underscore ('_') characters: {0}")]
    PartitionNameInvalid(String),
    #[error("partition creation failed: {0}")]
    PartitionCreationFailed(String),
    #[error("partition missing: {0}")]
    PartitionMissing(String),
    #[error("blob open failed: {0}/{1} error: {2}")]
    BlobOpenFailed(String, String, IoError),
    #[error("blob missing: {0}/{1}")]
    BlobMissing(String, String),
    #[error("blob resize failed: {0}/{1} error: {2}")]
    BlobResizeFailed(String, String, IoError),
    #[error("blob sync failed: {0}/{1} error: {2}")]
    BlobSyncFailed(String, String, IoError),
    #[error("blob insufficient length")]
    BlobInsufficientLength,
    #[error("offset overflow")]
    OffsetOverflow,
    #[error("io error: {0}")]
    Io(#[from] IoError),
}

/// Interface to interact with storage.
///
/// To support storage implementations that enable concurrent reads and
/// writes, blobs are responsible for maintaining synchronization.
///
/// Storage can be backed by a local filesystem, cloud storage, etc.
pub trait Storage: Clone + Send + Sync + 'static {
    /// The readable/writeable storage buffer that can be opened by this Storage.
    type Blob: Blob;

    /// Open an existing blob in a given partition or create a new one, returning
    /// the blob and its length.
    ///
    /// Multiple instances of the same blob can be opened concurrently, however,
    /// writing to the same range of the same blob concurrently may lead to undefined behavior.
    fn open(&self, partition: &str, name: &[u8]) -> Result<(Self::Blob, u64), Error>;

    /// Remove a blob from a given partition.
    ///
    /// If no `name` is provided, the entire partition is removed.
    fn remove(&self, partition: &str, name: Option<&[u8]>) -> Result<(), Error>;

    /// Return all blobs in a given partition (sorted by name).
    fn scan(&self, partition: &str) -> Result<Vec<Vec<u8>>, Error>;
}

/// Interface to read and write to a blob.
///
/// Cloning a blob is similar to wrapping a single file descriptor in
/// a lock whereas opening a new blob (of the same name) is similar to
/// opening a new file descriptor. Writes to disjoint ranges of the same
/// blob may be issued concurrently from different threads.
///
/// When a blob is dropped, any unsynced changes may be discarded. Implementations
/// may attempt to sync during drop but errors will go unhandled. Call `sync`
/// before dropping to ensure all changes are durably persisted.
pub trait Blob: Clone + Send + Sync + 'static {
    /// Fill `buf` with the bytes stored at `offset`.
    ///
    /// `read_at` only returns once the entire buffer has been filled.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error>;

    /// Write `buf` to the blob at the given offset, extending the blob if needed.
    fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), Error>;

    /// Resize the blob to the given length.
    ///
    /// If the length is greater than the current length, the blob is extended with zeros.
    /// If the length is less than the current length, the blob is truncated.
    fn resize(&self, len: u64) -> Result<(), Error>;

    /// Ensure all pending data is durably persisted.
    fn sync(&self) -> Result<(), Error>;
}

/// A clone-able wrapper around a [rayon]-compatible thread pool.
pub type ThreadPool = Arc<RThreadPool>;

/// Creates a clone-able [rayon] thread pool.
///
/// # Arguments
/// - `concurrency`: The number of worker threads. Zero lets [rayon] pick one thread
///   per available core.
///
/// # Returns
/// A `Result` containing the configured [rayon::ThreadPool] or a [rayon::ThreadPoolBuildError] if the pool cannot be built.
pub fn create_pool(concurrency: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .thread_name(|i| format!("geoseis-worker-{i}"))
        .build()?;
    Ok(Arc::new(pool))
}

/// Resolve a caller-supplied thread count, where anything below one means
/// "one per available core".
pub fn resolve_concurrency(threads: i32) -> usize {
    if threads > 0 {
        return threads as usize;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;
    use rayon::prelude::*;

    #[test_traced]
    fn test_create_pool() {
        // Initialize a pool with a fixed number of threads
        let pool = create_pool(4).expect("failed to create pool");
        assert_eq!(pool.current_num_threads(), 4);

        // Run a parallel computation on it
        let sum: u64 = pool.install(|| (0..1_000u64).into_par_iter().sum());
        assert_eq!(sum, 499_500);
    }

    #[test_traced]
    fn test_resolve_concurrency() {
        assert_eq!(resolve_concurrency(3), 3);
        assert!(resolve_concurrency(0) >= 1);
        assert!(resolve_concurrency(-2) >= 1);
    }
}
