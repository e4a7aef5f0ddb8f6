use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while sorting, from CLI misuse to a
/// mid-merge disk failure.
#[derive(Debug, Error)]
pub enum ExtSortError {
    #[error("usage: extsort <input-file>")]
    InvalidInvocation,

    #[error("failed to open input file {}: {source}", path.display())]
    InputOpenFailure { path: PathBuf, source: io::Error },

    #[error("temp file I/O failed for {}: {source}", path.display())]
    TempFileIo { path: PathBuf, source: io::Error },

    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    FinalizeFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("a worker thread panicked before completing its reduce role")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, ExtSortError>;
