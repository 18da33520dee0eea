// Retrieval constants (No magic values)
use std::time::Duration;

/// Grace period between SIGTERM and SIGKILL when a stream is closed early (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum stderr bytes kept for error reports (64 KiB)
/// The remainder is still drained so the tool never blocks on a full pipe
pub const STDERR_CAPTURE_LIMIT: usize = 64 * 1024;

/// Size of the first stdout read performed before a stream is handed out (8 KiB)
pub const PRIME_CHUNK_SIZE: usize = 8 * 1024;

/// Attempts at creating a uniquely named scratch directory before giving up
pub const SCRATCH_CREATE_ATTEMPTS: usize = 3;

/// Directory name under the system temp dir used when no scratch root is configured
pub const DEFAULT_SCRATCH_DIR_NAME: &str = "revget";
