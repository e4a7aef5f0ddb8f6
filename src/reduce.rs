//! The pair-popping reduce coordinator: every worker and the main thread
//! run this loop after their sort role is done, merging run files two at
//! a time until exactly one remains.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{debug, info};

use crate::error::{ExtSortError, Result};
use crate::merge::merge_sorted;
use crate::queue::DoublePopQueue;
use crate::sort::mint_run_name;

/// Identifies which role a thread plays in the reduce loop. The main
/// thread is responsible for the final rename; workers simply return once
/// there is no more useful work for them.
pub enum Role {
    Main,
    Worker { index: usize },
}

fn temp_path(work_dir: &Path, name: &str) -> PathBuf {
    work_dir.join(name)
}

fn merge_files(
    work_dir: &Path,
    files_enumerator: &AtomicU64,
    f1: &str,
    f2: &str,
) -> Result<String> {
    let out_path = mint_run_name(work_dir, files_enumerator);
    let p1 = temp_path(work_dir, f1);
    let p2 = temp_path(work_dir, f2);
    {
        let in1 = File::open(&p1).map_err(|source| ExtSortError::TempFileIo {
            path: p1.clone(),
            source,
        })?;
        let in2 = File::open(&p2).map_err(|source| ExtSortError::TempFileIo {
            path: p2.clone(),
            source,
        })?;
        let mut out = File::create(&out_path).map_err(|source| ExtSortError::TempFileIo {
            path: out_path.clone(),
            source,
        })?;
        merge_sorted(BufReader::new(in1), BufReader::new(in2), &mut out).map_err(|source| {
            ExtSortError::TempFileIo {
                path: out_path.clone(),
                source,
            }
        })?;
    }
    fs::remove_file(&p1).map_err(|source| ExtSortError::TempFileIo { path: p1, source })?;
    fs::remove_file(&p2).map_err(|source| ExtSortError::TempFileIo { path: p2, source })?;
    debug!(out = %out_path.display(), "merged run pair");
    Ok(out_path.to_string_lossy().into_owned())
}

/// Runs the reduce loop for the given `role`. Workers return `Ok(())`
/// once they have nothing useful left to do; the main thread additionally
/// performs the final rename to `output_path` before returning.
pub fn run(
    role: Role,
    work_dir: &Path,
    output_path: &Path,
    files: &DoublePopQueue<String>,
    files_enumerator: &AtomicU64,
    remaining_files: &AtomicUsize,
) -> Result<()> {
    loop {
        let remaining = remaining_files.load(Ordering::Relaxed);
        if remaining == 1 {
            files.finish();
        }
        if remaining == 0 {
            if let Role::Main = role {
                // Nothing was ever produced (empty input): write an
                // empty result directly instead of waiting for a pair
                // that will never arrive.
                File::create(output_path).map_err(|source| ExtSortError::TempFileIo {
                    path: output_path.to_path_buf(),
                    source,
                })?;
                info!(output = %output_path.display(), "wrote empty result");
                return Ok(());
            }
        }

        if let Role::Worker { index } = role {
            // Safe, non-underflowing form of `remaining/2 - 1 < index`:
            // a worker is redundant once the number of pairs still worth
            // forming can no longer outnumber the workers ahead of it.
            if remaining < 2 * (index + 1) {
                return Ok(());
            }
        }

        let popped = files
            .wait_and_pop()
            .map_err(|source| ExtSortError::TempFileIo {
                path: work_dir.to_path_buf(),
                source,
            })?;

        let (f1, f2) = match popped {
            Some(pair) => pair,
            None => {
                if let Role::Main = role {
                    let last = files.wait_and_pop_force().map_err(|source| {
                        ExtSortError::TempFileIo {
                            path: work_dir.to_path_buf(),
                            source,
                        }
                    })?;
                    let final_src = temp_path(work_dir, &last);
                    fs::rename(&final_src, output_path).map_err(|source| {
                        ExtSortError::FinalizeFailure {
                            from: final_src,
                            to: output_path.to_path_buf(),
                            source,
                        }
                    })?;
                    info!(output = %output_path.display(), "finalized result");
                }
                return Ok(());
            }
        };

        remaining_files.fetch_sub(1, Ordering::Relaxed);
        let merged = merge_files(work_dir, files_enumerator, &f1, &f2)?;
        files
            .push_force(merged)
            .map_err(|source| ExtSortError::TempFileIo {
                path: work_dir.to_path_buf(),
                source,
            })?;
    }
}
