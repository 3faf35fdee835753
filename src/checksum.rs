//! Content fingerprinting for map directories.
//!
//! The fingerprint decides whether an import needs an upload at all, so it
//! must be a pure function of the canonical file set: same files, same
//! bytes → same digest, regardless of traversal order or timestamps.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::snapshot::is_canonical_file;

/// Compute the content fingerprint of a map directory.
///
/// Enumerates regular files recursively, drops derived files, sorts the
/// remaining relative paths lexicographically, and streams each file's
/// bytes in that order into one incremental BLAKE3 hash. Returns the
/// digest as lowercase hex.
pub fn compute_fingerprint(dir: &Path) -> Result<String, Error> {
    let mut files = Vec::new();
    collect_canonical(dir, PathBuf::new(), &mut files)?;
    files.sort();

    let mut hasher = blake3::Hasher::new();
    for rel in &files {
        let path = dir.join(rel);
        let file = std::fs::File::open(&path)
            .map_err(|e| Error::Io(format!("cannot open {}: {}", path.display(), e)))?;
        let mut reader = io::BufReader::new(file);
        io::copy(&mut reader, &mut hasher)
            .map_err(|e| Error::Io(format!("cannot read {}: {}", path.display(), e)))?;
    }

    Ok(hasher.finalize().to_hex().to_string())
}

fn collect_canonical(base: &Path, rel: PathBuf, out: &mut Vec<String>) -> Result<(), Error> {
    let dir = base.join(&rel);
    let entries = std::fs::read_dir(&dir)
        .map_err(|e| Error::Io(format!("cannot read directory {}: {}", dir.display(), e)))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::Io(e.to_string()))?;
        let file_type = entry.file_type().map_err(|e| Error::Io(e.to_string()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let child = rel.join(name);
        if file_type.is_dir() {
            collect_canonical(base, child, out)?;
        } else if file_type.is_file() && is_canonical_file(name) {
            // Normalized separators keep the sort order platform-independent.
            out.push(child.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}
