//! Archive extraction (`.gz`, `.zip`)
//!
//! Extraction is blocking and runs on the blocking pool. Archives are
//! unpacked next to themselves: `ride.json.gz` becomes `ride.json`, zip
//! entries keep their relative paths under the archive's directory.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArchiveKind {
    Gzip,
    Zip,
}

impl ArchiveKind {
    /// Detect an archive from its extension
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gz" => Some(Self::Gzip),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }
}

/// Extract an archive, returning the files written
pub(crate) fn extract(path: &Path, kind: ArchiveKind) -> io::Result<Vec<PathBuf>> {
    let written = match kind {
        ArchiveKind::Gzip => extract_gzip(path)?,
        ArchiveKind::Zip => extract_zip(path)?,
    };
    debug!(archive = %path.display(), files = written.len(), "archive extracted");
    Ok(written)
}

fn extract_gzip(path: &Path) -> io::Result<Vec<PathBuf>> {
    let target = path.with_extension("");
    let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));

    let result = File::create(&target).and_then(|mut out| io::copy(&mut decoder, &mut out));
    if let Err(e) = result {
        let _ = fs::remove_file(&target);
        return Err(e);
    }

    Ok(vec![target])
}

fn extract_zip(path: &Path) -> io::Result<Vec<PathBuf>> {
    let dest = path.parent().unwrap_or(Path::new("."));
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?)).map_err(io::Error::other)?;
    let mut written = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(io::Error::other)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(
                archive = %path.display(),
                entry = entry.name(),
                "skipping zip entry escaping the archive directory"
            );
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        written.push(out_path);
    }

    Ok(written)
}
