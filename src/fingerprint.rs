//! Content checksums and modification times used to tell whether a file
//! changed since a previous run.

use crate::error::{IoContext, ReannotateError, ReannotateResult};
use reannotate_protocol::is_comment_bytes;
use sha1::{Digest, Sha1};
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

pub trait Fingerprinter {
    /// Hex digest over the file's non-comment lines.
    fn checksum(&self, path: &Path) -> ReannotateResult<String>;

    /// Modification time in whole seconds since the Unix epoch.
    fn modified_at(&self, path: &Path) -> ReannotateResult<u64>;

    fn fingerprint(&self, path: &Path) -> ReannotateResult<FileFingerprint> {
        Ok(FileFingerprint {
            checksum: self.checksum(path)?,
            modified_at: self.modified_at(path)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    pub checksum: String,
    pub modified_at: u64,
}

impl FileFingerprint {
    /// Either half agreeing is enough; filesystems may truncate timestamps.
    pub fn matches(&self, checksum: &str, modified_at: u64) -> bool {
        self.checksum == checksum || self.modified_at == modified_at
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Fingerprinter;

impl Fingerprinter for Sha1Fingerprinter {
    fn checksum(&self, path: &Path) -> ReannotateResult<String> {
        let file = File::open(path).with_path("open", path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha1::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            let bytes_read = reader.read_until(b'\n', &mut line).with_path("read", path)?;
            if bytes_read == 0 {
                break;
            }
            if is_comment_bytes(&line) {
                continue;
            }
            hasher.update(&line);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn modified_at(&self, path: &Path) -> ReannotateResult<u64> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .with_path("read modification time of", path)?;
        epoch_seconds(modified, path)
    }
}

/// Whole seconds since the Unix epoch; earlier timestamps are an error.
fn epoch_seconds(time: SystemTime, path: &Path) -> ReannotateResult<u64> {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| {
            ReannotateError::io(
                format!("Modification time of '{}' predates the Unix epoch", path.display()),
                io::Error::new(io::ErrorKind::InvalidData, e),
            )
        })
}

/// True when the path names an existing, non-empty regular file.
pub fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
