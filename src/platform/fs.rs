// PerfSleuth - platform/fs.rs
//
// Log file reading and output file creation.
//
//   - Transient I/O errors are retried with capped exponential backoff.
//   - Large files are memory-mapped instead of copied onto the heap.
//   - Invalid UTF-8 is replaced, never fatal.

use crate::util::constants::{MAX_READ_RETRIES, READ_RETRY_DELAYS_MS};
use std::io::{self, BufWriter};
use std::path::Path;
use std::time::Duration;

/// Read the full content of a file as a string.
///
/// `is_large` selects the memory-mapped path.
pub fn read_file_content(path: &Path, is_large: bool) -> io::Result<String> {
    if is_large {
        read_large_file(path)
    } else {
        read_small_file_with_retry(path)
    }
}

/// Read using `memmap2` for large files (avoids allocating a read buffer).
fn read_large_file(path: &Path) -> io::Result<String> {
    let file = std::fs::File::open(path)?;
    // SAFETY: the map is read-only and dropped before returning. External
    // modification of the file while mapped is undefined behaviour; benchmark
    // logs are complete before extraction starts.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    Ok(String::from_utf8_lossy(&mmap).into_owned())
}

/// Read a small file with transient-error retries.
fn read_small_file_with_retry(path: &Path) -> io::Result<String> {
    let mut last_err: Option<io::Error> = None;

    for attempt in 0..MAX_READ_RETRIES {
        match std::fs::read(path) {
            Ok(bytes) => return Ok(decode_lossy(bytes)),
            Err(e) if is_transient_error(&e) => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error, retrying"
                );
                std::thread::sleep(Duration::from_millis(
                    READ_RETRY_DELAYS_MS[attempt as usize],
                ));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("Unknown read error")))
}

/// Decode without copying when the bytes are already valid UTF-8.
fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Returns true for transient I/O errors that are worth retrying.
fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// Create (or truncate) `path` for buffered writing, creating parent
/// directories as needed.
pub fn create_output_file(path: &Path) -> io::Result<BufWriter<std::fs::File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(std::fs::File::create(path)?))
}
