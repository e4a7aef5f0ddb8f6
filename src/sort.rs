//! Sort workers: pop a filled slab, sort it in place, and persist it as a
//! fresh run file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{ExtSortError, Result};
use crate::pool::BufferPool;
use crate::queue::DoublePopQueue;

pub fn mint_run_name(work_dir: &Path, files_enumerator: &AtomicU64) -> PathBuf {
    let index = files_enumerator.fetch_add(1, Ordering::Relaxed);
    work_dir.join(format!("tmp{index}"))
}

fn write_sorted_run(path: &Path, mut lines: Vec<String>) -> Result<()> {
    lines.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    let file = File::create(path).map_err(|source| ExtSortError::TempFileIo {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    for line in &lines {
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|source| ExtSortError::TempFileIo {
                path: path.to_path_buf(),
                source,
            })?;
    }
    writer.flush().map_err(|source| ExtSortError::TempFileIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Repeatedly pops filled slabs, sorts and persists each as a run file,
/// and returns the slab to the pool. Returns once the filled queue
/// finishes and drains, handing control to the reduce role.
pub fn run(
    pool: &BufferPool,
    work_dir: &Path,
    files_enumerator: &AtomicU64,
    files: &DoublePopQueue<String>,
) -> Result<()> {
    while let Some(mut slab) = pool.filled.wait_and_pop() {
        let name = mint_run_name(work_dir, files_enumerator);
        let lines = slab.take_lines();
        pool.release(slab);
        write_sorted_run(&name, lines)?;
        debug!(path = %name.display(), "wrote sorted run");
        files
            .push_force(name.to_string_lossy().into_owned())
            .map_err(|source| ExtSortError::TempFileIo {
                path: work_dir.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}
