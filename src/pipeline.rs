//! Wires the map, sort and reduce stages together: spawns the worker
//! threads, runs the map phase and the main thread's own sort/reduce
//! role, and joins everyone back up before the process exits.

use std::io::{BufReader, Read};
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::{ExtSortError, Result};
use crate::pool::BufferPool;
use crate::queue::DoublePopQueue;
use crate::reduce::{self, Role};
use crate::{map, sort as sort_phase};

struct Shared {
    pool: BufferPool,
    files: DoublePopQueue<String>,
    files_enumerator: AtomicU64,
    remaining_files: AtomicUsize,
}

/// Runs the whole external sort pipeline: reads `input` line by line,
/// writes the fully sorted multiset of lines to `config.output_path()`,
/// and leaves no `tmp*`/`tmp_queue*` file behind on success.
pub fn sort<R: Read>(input: R, config: &Config) -> Result<()> {
    let num_threads = config.resolved_num_threads();
    let num_worker_threads = num_threads.saturating_sub(1);
    let strings_per_slab = config.strings_per_slab(num_threads);

    info!(
        num_threads,
        strings_per_slab,
        max_line_len = config.max_line_len,
        "starting external sort"
    );

    let shared = Arc::new(Shared {
        pool: BufferPool::new(num_threads, strings_per_slab),
        files: DoublePopQueue::new(
            config.files_queue_capacity,
            &config.work_dir,
            "tmp_queue",
        ),
        files_enumerator: AtomicU64::new(0),
        remaining_files: AtomicUsize::new(0),
    });

    let mut handles = Vec::with_capacity(num_worker_threads);
    for worker_index in 0..num_worker_threads {
        let shared = Arc::clone(&shared);
        let work_dir = config.work_dir.clone();
        let output_path = config.output_path();
        handles.push(std::thread::spawn(move || -> Result<()> {
            sort_phase::run(
                &shared.pool,
                &work_dir,
                &shared.files_enumerator,
                &shared.files,
            )?;
            reduce::run(
                Role::Worker {
                    index: worker_index + 1,
                },
                &work_dir,
                &output_path,
                &shared.files,
                &shared.files_enumerator,
                &shared.remaining_files,
            )
        }));
    }

    let reader = BufReader::new(input);
    map::run(
        reader,
        config.max_line_len,
        &shared.pool,
        &shared.remaining_files,
    )
    .map_err(|source| ExtSortError::TempFileIo {
        path: config.work_dir.clone(),
        source,
    })?;

    reduce::run(
        Role::Main,
        &config.work_dir,
        &config.output_path(),
        &shared.files,
        &shared.files_enumerator,
        &shared.remaining_files,
    )?;

    for handle in handles {
        handle
            .join()
            .map_err(|_| ExtSortError::WorkerPanicked)??;
    }

    info!("external sort complete");
    Ok(())
}
