// src/checksum/mod.rs

//! Content fingerprints used to tell a real edit from a duplicate
//! notification.
//!
//! Editors frequently fire a "created" or "modified" event while the file is
//! still being written (temp-file-then-rename, truncate-then-write). There is
//! no portable "write finished" signal, so [`ChecksumOracle::fingerprint`]
//! keeps retrying with a fixed delay for as long as the failure looks
//! transient. Anything else (missing file, permission denied) is returned to
//! the caller.

use std::fmt;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{Result, StylewatchError};
use crate::fs::FileSystem;
use crate::types::ChecksumAlgorithm;

/// Retries between two "still waiting" warnings.
const WARN_EVERY: u64 = 50;

/// Fixed-size fingerprint of a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Crc32(u32),
    Blake3([u8; 32]),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Crc32(value) => write!(f, "{value:08x}"),
            Fingerprint::Blake3(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Fingerprint an in-memory buffer.
pub fn fingerprint_bytes(algorithm: ChecksumAlgorithm, data: &[u8]) -> Fingerprint {
    match algorithm {
        ChecksumAlgorithm::Crc32 => Fingerprint::Crc32(crc32fast::hash(data)),
        ChecksumAlgorithm::Blake3 => Fingerprint::Blake3(*blake3::hash(data).as_bytes()),
    }
}

/// Whether an I/O error means "try again shortly" rather than "give up".
pub fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
            | ErrorKind::ResourceBusy
    ) {
        return true;
    }

    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION: another process still
    // has the file open for writing.
    #[cfg(windows)]
    if matches!(err.raw_os_error(), Some(32) | Some(33)) {
        return true;
    }

    false
}

/// Computes fingerprints, waiting out partially written files.
#[derive(Debug, Clone)]
pub struct ChecksumOracle {
    fs: Arc<dyn FileSystem>,
    algorithm: ChecksumAlgorithm,
    retry_delay: Duration,
    abort: Arc<AtomicBool>,
}

impl ChecksumOracle {
    pub fn new(fs: Arc<dyn FileSystem>, algorithm: ChecksumAlgorithm, retry_delay: Duration) -> Self {
        Self {
            fs,
            algorithm,
            retry_delay,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an abort flag with the owner; setting it ends any retry loop
    /// with [`StylewatchError::FingerprintAborted`].
    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Fingerprint the current contents of `path`.
    ///
    /// Blocks the calling thread while the file is not yet readable.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let mut attempts: u64 = 0;
        loop {
            if self.abort.load(Ordering::SeqCst) {
                return Err(StylewatchError::FingerprintAborted(path.to_path_buf()));
            }

            match self.read_all(path) {
                Ok(data) => {
                    let fp = fingerprint_bytes(self.algorithm, &data);
                    debug!(?path, fingerprint = %fp, attempts, "computed fingerprint");
                    return Ok(fp);
                }
                Err(err) if is_transient(&err) => {
                    attempts += 1;
                    if attempts % WARN_EVERY == 0 {
                        warn!(?path, attempts, error = %err, "file still not readable; waiting");
                    } else {
                        debug!(?path, attempts, error = %err, "file busy; retrying");
                    }
                    thread::sleep(self.retry_delay);
                }
                Err(err) => return Err(StylewatchError::IoError(err)),
            }
        }
    }

    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut reader = self.fs.open_read(path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(data)
    }
}
