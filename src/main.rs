use std::fs::File;
use std::process::ExitCode;

use extsort::{Config, ExtSortError};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn run() -> Result<(), ExtSortError> {
    let input_path = std::env::args().nth(1).ok_or(ExtSortError::InvalidInvocation)?;

    let file = File::open(&input_path).map_err(|source| ExtSortError::InputOpenFailure {
        path: input_path.into(),
        source,
    })?;

    extsort::sort(file, &Config::default())
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(ExtSortError::InvalidInvocation) => {
            eprintln!("usage: extsort <input-file>");
            error!("usage: extsort <input-file>");
            ExitCode::from(255) // -1
        }
        Err(err @ ExtSortError::InputOpenFailure { .. }) => {
            eprintln!("{err}");
            error!("{err}");
            ExitCode::from(254) // -2
        }
        Err(err) => {
            eprintln!("{err}");
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
