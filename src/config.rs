use std::path::PathBuf;

/// Tunables for a single sort run.
///
/// `Default` reproduces the literal constants from the original engine:
/// a 1000-byte line cap, a 120 000-string in-memory budget shared across
/// worker threads, and a million-entry spill threshold on the files queue.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum byte length of a line, including the implicit trailing
    /// newline slot. Lines longer than `max_line_len - 1` are truncated.
    pub max_line_len: usize,
    /// Total number of strings the pipeline is willing to hold in memory
    /// at once, divided evenly across worker threads to size each slab.
    pub max_strings_in_memory: usize,
    /// Resident capacity of the files queue before it starts spilling
    /// filenames to `tmp_queue*` files.
    pub files_queue_capacity: usize,
    /// Override for the number of threads (including the main thread).
    /// `None` means `max(available_parallelism, 4)`.
    pub num_threads: Option<usize>,
    /// Directory in which `tmp*`, `tmp_queue*` and the final output are
    /// created. Defaults to the current working directory.
    pub work_dir: PathBuf,
    /// Name of the final sorted file, relative to `work_dir`.
    pub output_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_line_len: 1000,
            max_strings_in_memory: 120_000,
            files_queue_capacity: 1024 * 1024,
            num_threads: None,
            work_dir: PathBuf::from("."),
            output_name: "result".to_string(),
        }
    }
}

impl Config {
    pub fn resolved_num_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| std::cmp::max(num_cpus::get(), 4))
    }

    /// Number of lines a single slab holds, i.e. `K` in the spec.
    pub fn strings_per_slab(&self, num_threads: usize) -> usize {
        std::cmp::max(1, self.max_strings_in_memory / num_threads)
    }

    pub fn path_in_work_dir(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    pub fn output_path(&self) -> PathBuf {
        self.path_in_work_dir(&self.output_name)
    }
}
