//! Shared environment setup for the tasksets binaries.
//!
//! Reads `TASKSETS_BASE_PATH`, `RAYON_NUM_THREADS` and `RUST_LOG`.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Read `TASKSETS_BASE_PATH` (default `"."`), chdir, print path.
pub fn init_base_path() -> Result<PathBuf> {
    let base_path = std::env::var("TASKSETS_BASE_PATH").unwrap_or_else(|_| ".".to_string());
    println!("TASKSETS_BASE_PATH={}", base_path);
    let path = PathBuf::from(&base_path);
    std::env::set_current_dir(&path)?;
    if let Ok(cwd) = std::env::current_dir() {
        println!("Working directory: {}", cwd.display());
    }
    Ok(path)
}

/// Thread count from `RAYON_NUM_THREADS` (fallback `OMP_NUM_THREADS`, default 8).
pub fn rayon_threads() -> usize {
    std::env::var("RAYON_NUM_THREADS")
        .or_else(|_| std::env::var("OMP_NUM_THREADS"))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8)
}

/// Build the global rayon pool; tolerates an already-initialized pool.
/// Returns thread count.
pub fn init_rayon_threads() -> usize {
    let num_threads = rayon_threads();
    if rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .is_err()
    {
        tracing::warn!("rayon pool already initialized");
    }
    println!("Rayon threads: {}", num_threads);
    num_threads
}

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
