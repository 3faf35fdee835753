//! Directory snapshot codec.
//!
//! A map lives on disk as a flat directory of files. Only canonical files
//! are part of the exchanged snapshot; derived artifacts appended by later
//! analysis runs (add-plot segments, add-plot coordinates, appended raw
//! data, logs) stay local. The same filter is applied when reading,
//! writing, and fingerprinting a directory — otherwise checksums drift
//! between operations.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::Error;

/// Relative filename → base64-encoded content, ordered by filename.
pub type MapSnapshot = BTreeMap<String, String>;

/// Per-file outcome of a best-effort snapshot write.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Files written and synced to storage
    pub written: Vec<String>,
    /// (filename, reason) for each file that could not be written
    pub failed: Vec<(String, String)>,
}

/// True if `name` belongs in the canonical snapshot.
pub fn is_canonical_file(name: &str) -> bool {
    !(name.starts_with("segments-add-")
        || name.starts_with("xy-add-")
        || name.starts_with("rawdata_add_")
        || name.ends_with(".log"))
}

/// Read the canonical files of a map directory into a snapshot.
///
/// Top-level regular files only; sub-directories are not descended.
/// Derived files are skipped with a warning so the caller knows local
/// artifacts exist that will not be synchronized.
pub fn read_snapshot(dir: &Path) -> Result<MapSnapshot, Error> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Io(format!("cannot read directory {}: {}", dir.display(), e)))?;

    let mut snapshot = MapSnapshot::new();
    let mut skipped = 0usize;

    for entry in entries {
        let entry = entry.map_err(|e| Error::Io(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_canonical_file(name) {
            skipped += 1;
            continue;
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::Io(format!("cannot read {}: {}", path.display(), e)))?;
        snapshot.insert(name.to_string(), BASE64.encode(&bytes));
    }

    if skipped > 0 {
        log::warn!(
            "{}: {} derived file(s) excluded from the snapshot",
            dir.display(),
            skipped,
        );
    }

    Ok(snapshot)
}

/// Materialize a snapshot under `dir`, creating it and any missing parents.
///
/// Best-effort: a failure on one file is logged and recorded in the report,
/// and the remaining files are still written. Every written file is synced
/// to storage before this returns. Files already written are not rolled
/// back on later failures.
pub fn write_snapshot(dir: &Path, snapshot: &MapSnapshot) -> Result<WriteReport, Error> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Io(format!("cannot create directory {}: {}", dir.display(), e)))?;

    let mut report = WriteReport::default();
    for (name, content_b64) in snapshot {
        if !is_canonical_file(name) {
            log::warn!("skipping derived file in snapshot: {}", name);
            continue;
        }
        match write_one(dir, name, content_b64) {
            Ok(()) => report.written.push(name.clone()),
            Err(reason) => {
                log::warn!("failed to write {}: {}", name, reason);
                report.failed.push((name.clone(), reason));
            }
        }
    }
    Ok(report)
}

fn write_one(dir: &Path, name: &str, content_b64: &str) -> Result<(), String> {
    // Snapshot entries are flat filenames; anything with a separator did
    // not come from a map directory.
    if name.contains('/') || name.contains('\\') {
        return Err("filename contains a path separator".into());
    }
    let bytes = BASE64
        .decode(content_b64)
        .map_err(|e| format!("invalid base64: {}", e))?;
    let path = dir.join(name);
    let mut file = File::create(&path).map_err(|e| e.to_string())?;
    file.write_all(&bytes).map_err(|e| e.to_string())?;
    file.sync_all().map_err(|e| e.to_string())?;
    Ok(())
}
