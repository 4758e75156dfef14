//! File-system connector
//!
//! Scans a source directory (optionally recursively) for JSON activity
//! documents, extracting `.gz` / `.zip` archives first when configured.
//! Files are emitted oldest first by modification time. A batch is every
//! file sharing one modification time, so a watermark is only reported once
//! no unprocessed file can still carry it.

mod archive;
mod document;


use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use stride_protocol::{ConnectorType, ErrorCode, FileSystemConnectorInfo, SyncErrorInfo};

use crate::error::{ConnectorError, Result};
use crate::traits::{Connector, EventSink, StopSignal, SyncOutcome, SyncRequest};

use archive::ArchiveKind;

/// Extension of activity documents
const DOCUMENT_EXTENSION: &str = "json";

/// Connector for a local directory of activity files
pub struct FileSystemConnector {
    info: FileSystemConnectorInfo,
    stop: StopSignal,
}

/// A document found by the scan
#[derive(Debug, Clone)]
struct DiscoveredFile {
    path: PathBuf,
    /// Path relative to the source directory, forward slashes
    relative: String,
    modified: DateTime<Utc>,
}

/// Result of a blocking directory scan
#[derive(Debug)]
struct Scan<T> {
    found: Vec<T>,
    /// `(relative path, error)` for entries that could not be inspected
    failures: Vec<(String, String)>,
}

impl FileSystemConnector {
    pub fn new(info: FileSystemConnectorInfo) -> Self {
        Self {
            info: info.normalized(),
            stop: StopSignal::new(),
        }
    }

    pub fn info(&self) -> &FileSystemConnectorInfo {
        &self.info
    }

    /// Extract every archive under `root`
    ///
    /// Returns true when a stop request interrupted extraction.
    async fn extract_archives(&self, root: &Path, events: &EventSink) -> Result<bool> {
        let scan = {
            let dir = root.to_path_buf();
            let recursive = self.info.scan_sub_directories;
            blocking(root, move || scan_archives(&dir, recursive)).await?
        };
        report_failures(&scan.failures, events).await?;

        let mut extracted = 0usize;
        for (path, kind) in scan.found {
            if self.stop.is_stopped() {
                return Ok(true);
            }

            let relative = relative_id(root, &path);
            let job_path = path.clone();
            let result = tokio::task::spawn_blocking(move || archive::extract(&job_path, kind))
                .await
                .map_err(|e| io::Error::other(e.to_string()))
                .and_then(|r| r);

            match result {
                Ok(written) => {
                    extracted += 1;
                    debug!(archive = %relative, files = written.len(), "archive extracted");

                    if self.info.delete_archives_after_extract
                        && let Err(e) = tokio::fs::remove_file(&path).await
                    {
                        warn!(archive = %relative, error = %e, "failed to delete extracted archive");
                    }
                }
                Err(e) => {
                    warn!(archive = %relative, error = %e, "archive extraction failed");
                    events
                        .item_error(SyncErrorInfo::for_item(
                            ErrorCode::ExtractFailed,
                            relative,
                            e.to_string(),
                        ))
                        .await?;
                }
            }
        }

        if extracted > 0 {
            events
                .info(format!("{} archives extracted", extracted))
                .await?;
        }
        Ok(false)
    }
}

/// Run a directory scan on the blocking pool
async fn blocking<T, F>(root: &Path, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| io::Error::other(e.to_string()))
        .and_then(|r| r)
        .map_err(|e| ConnectorError::io(root, e))
}

async fn report_failures(failures: &[(String, String)], events: &EventSink) -> Result<()> {
    for (relative, error) in failures {
        warn!(file = %relative, error = %error, "cannot inspect file");
        events
            .item_error(SyncErrorInfo::for_item(
                ErrorCode::Io,
                relative.clone(),
                error.clone(),
            ))
            .await?;
    }
    Ok(())
}

/// Source id for a path: relative to the root, forward slashes
fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Visit every regular file under `root`
///
/// An unreadable root is an error; unreadable sub directories are skipped.
fn walk(root: &Path, recursive: bool, visit: &mut dyn FnMut(&Path)) -> io::Result<()> {
    let mut pending = vec![root.to_path_buf()];
    let mut first = true;

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if first => return Err(e),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        first = false;

        for entry in entries.flatten() {
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if recursive {
                    pending.push(path);
                }
            } else if path.is_file() {
                visit(&path);
            }
        }
    }
    Ok(())
}

fn scan_archives(root: &Path, recursive: bool) -> io::Result<Scan<(PathBuf, ArchiveKind)>> {
    let mut found = BTreeMap::new();
    walk(root, recursive, &mut |path| {
        if let Some(kind) = ArchiveKind::detect(path) {
            found.insert(path.to_path_buf(), kind);
        }
    })?;

    Ok(Scan {
        found: found.into_iter().collect(),
        failures: Vec::new(),
    })
}

fn scan_documents(root: &Path, recursive: bool) -> io::Result<Scan<DiscoveredFile>> {
    let mut found = BTreeMap::new();
    let mut failures = Vec::new();

    walk(root, recursive, &mut |path| {
        if !has_extension(path, DOCUMENT_EXTENSION) {
            return;
        }
        let relative = relative_id(root, path);
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => {
                found.insert(
                    path.to_path_buf(),
                    DiscoveredFile {
                        path: path.to_path_buf(),
                        relative,
                        modified: DateTime::<Utc>::from(modified),
                    },
                );
            }
            Err(e) => failures.push((relative, e.to_string())),
        }
    })?;

    Ok(Scan {
        found: found.into_values().collect(),
        failures,
    })
}

#[async_trait]
impl Connector for FileSystemConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::File
    }

    async fn sync(&self, request: SyncRequest, events: EventSink) -> Result<SyncOutcome> {
        let root = self
            .info
            .source_directory
            .clone()
            .ok_or(ConnectorError::NotConfigured(ConnectorType::File))?;

        let is_dir = tokio::fs::metadata(&root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(ConnectorError::SourceUnreachable(format!(
                "source directory '{}' does not exist",
                root.display()
            )));
        }

        info!(
            connector = "file",
            root = %root.display(),
            recursive = self.info.scan_sub_directories,
            extract = self.info.extract_archive_files,
            fast_sync = request.fast_sync,
            force_sync = request.force_sync,
            "starting file sync"
        );
        events
            .progress(format!("Scanning {}", root.display()))
            .await?;

        if self.info.extract_archive_files && self.extract_archives(&root, &events).await? {
            return Ok(SyncOutcome::Stopped);
        }

        let scan = {
            let dir = root.clone();
            let recursive = self.info.scan_sub_directories;
            blocking(&root, move || scan_documents(&dir, recursive)).await?
        };
        report_failures(&scan.failures, &events).await?;

        let mut files = scan.found;
        if let Some(since) = request.since() {
            files.retain(|f| f.modified > since);
        }
        files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

        events
            .progress(format!("Found {} activity files", files.len()))
            .await?;

        let mut emitted = 0usize;
        for (i, file) in files.iter().enumerate() {
            if self.stop.is_stopped() {
                info!(connector = "file", emitted, "stop requested");
                return Ok(SyncOutcome::Stopped);
            }

            match tokio::fs::read(&file.path).await {
                Ok(bytes) => {
                    let stem = file
                        .path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();

                    match document::parse(&bytes, &file.relative, &stem, Utc::now()) {
                        Ok((activity, streams)) => {
                            emitted += 1;
                            events.candidate(activity, streams).await?;
                        }
                        Err(e) => {
                            warn!(file = %file.relative, error = %e, "skipping invalid activity file");
                            events
                                .item_error(SyncErrorInfo::for_item(
                                    ErrorCode::ParseFailed,
                                    file.relative.clone(),
                                    e.to_string(),
                                ))
                                .await?;
                        }
                    }
                }
                Err(e) => {
                    warn!(file = %file.relative, error = %e, "cannot read activity file");
                    events
                        .item_error(SyncErrorInfo::for_item(
                            ErrorCode::Io,
                            file.relative.clone(),
                            e.to_string(),
                        ))
                        .await?;
                }
            }

            // fast sync filters on `modified > since`, so a tie must not be split
            let group_done = files.get(i + 1).is_none_or(|next| next.modified != file.modified);
            if group_done {
                events.batch_completed(file.modified).await?;
            }
        }

        info!(connector = "file", files = files.len(), emitted, "file sync complete");
        Ok(SyncOutcome::Completed)
    }

    fn stop(&self) {
        self.stop.stop();
    }
}
