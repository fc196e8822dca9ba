// src/detect/stamp.rs

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::trace;

/// Modification time of a file, or `None` if it does not exist or the
/// platform does not report one.
pub fn mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Compute a blake3 hash over a single file's contents.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let hash = hasher.finalize().to_hex().to_string();
    trace!(path = ?path, hash = %hash, "computed file hash");
    Ok(hash)
}

/// What the incremental cache remembers about a processed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub mtime: SystemTime,
    pub len: u64,
    pub hash: String,
}

impl FileStamp {
    pub fn read(path: &Path) -> Result<Self> {
        let meta = path
            .metadata()
            .with_context(|| format!("reading metadata of {:?}", path))?;
        let mtime = meta
            .modified()
            .with_context(|| format!("reading mtime of {:?}", path))?;
        Ok(Self {
            mtime,
            len: meta.len(),
            hash: compute_file_hash(path)?,
        })
    }

    /// Whether `path` still has the content this stamp was taken from.
    ///
    /// Matching mtime and length are trusted without re-hashing; otherwise
    /// the content hash decides, so a `touch` alone is not a change.
    pub fn matches(&self, path: &Path) -> Result<bool> {
        let meta = path
            .metadata()
            .with_context(|| format!("reading metadata of {:?}", path))?;
        if meta.len() != self.len {
            return Ok(false);
        }
        if meta.modified().ok() == Some(self.mtime) {
            return Ok(true);
        }
        Ok(compute_file_hash(path)? == self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn hash_tracks_content_changes() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a.txt");

        fs::write(&f, "hello").unwrap();
        let h1 = compute_file_hash(&f).unwrap();
        fs::write(&f, "HELLO").unwrap();
        let h2 = compute_file_hash(&f).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn touching_without_content_change_still_matches() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a.js");
        fs::write(&f, "var a = 1;").unwrap();

        let stamp = FileStamp::read(&f).unwrap();
        let later = stamp.mtime + Duration::from_secs(10);
        fs::File::options()
            .write(true)
            .open(&f)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(stamp.matches(&f).unwrap());

        fs::write(&f, "var a = 2;").unwrap();
        assert!(!stamp.matches(&f).unwrap());
    }
}
