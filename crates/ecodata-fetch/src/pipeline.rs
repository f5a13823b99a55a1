//! The acquisition pipeline
//!
//! Runs each source descriptor as an isolated unit of work: ensure the data
//! root exists, fetch the archive to a private temp directory, verify the
//! checksum when one is declared, extract into place, apply the encoding
//! rule, and remove transient files. Sources are mutually independent
//! (distinct destinations, no shared state), so up to `jobs` of them run
//! concurrently. A failure is confined to its source unless it signals a
//! global resource problem (disk full), which aborts the rest of the run.

use crate::download::{DownloadConfig, Downloader};
use crate::encoding;
use crate::extract::{self, ExtractSummary};
use crate::report::{OutcomeStatus, RunReport, SourceOutcome};
use crate::source::SourceDescriptor;
use ecodata_common::{
    checksum::{verify_file_checksum, ChecksumAlgorithm},
    EcodataError, Result,
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, Instrument};

/// Pipeline configuration
///
/// Always passed explicitly; no operation depends on the process working
/// directory.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory that receives one subdirectory per source
    pub data_root: PathBuf,

    /// Maximum number of sources processed concurrently
    pub jobs: usize,

    /// Per-request network timeout
    pub timeout: Duration,

    /// Download attempts per source
    pub max_retries: u32,
}

impl PipelineConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            jobs: 2,
            timeout: Duration::from_secs(600),
            max_retries: 3,
        }
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Outcome of one unit of work plus whether it poisons the whole run
struct AcquireResult {
    outcome: SourceOutcome,
    fatal: bool,
}

/// Multi-source dataset acquisition pipeline
pub struct Pipeline {
    config: PipelineConfig,
    downloader: Arc<Downloader>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        if config.jobs == 0 {
            return Err(EcodataError::Config("jobs must be at least 1".to_string()));
        }

        let downloader = Downloader::new(DownloadConfig {
            timeout: config.timeout,
            max_retries: config.max_retries,
            ..Default::default()
        })?;

        Ok(Self {
            config,
            downloader: Arc::new(downloader),
        })
    }

    /// Process all descriptors, attempting every source even when some fail
    ///
    /// Returns a report with exactly one outcome per descriptor.
    pub async fn run(&self, sources: Vec<SourceDescriptor>) -> RunReport {
        let mut report = RunReport::new();

        if let Err(e) = std::fs::create_dir_all(&self.config.data_root) {
            let err = EcodataError::filesystem(&self.config.data_root, e);
            error!("Cannot create data root: {}", err);
            for source in sources {
                report.record(SourceOutcome::failed(source.name, &err, Duration::ZERO));
            }
            return report;
        }

        // Configuration problems are reported before any network activity
        let mut runnable = Vec::new();
        for source in sources {
            match source.validate() {
                Ok(()) => runnable.push(source),
                Err(e) => report.record(SourceOutcome::failed(source.name, e, Duration::ZERO)),
            }
        }

        let scheduled: Vec<String> = runnable.iter().map(|s| s.name.clone()).collect();
        info!(
            sources = scheduled.len(),
            jobs = self.config.jobs,
            data_root = %self.config.data_root.display(),
            "Starting acquisition run"
        );

        let mut stream = futures::stream::iter(runnable.into_iter().map(|descriptor| {
            let downloader = Arc::clone(&self.downloader);
            let data_root = self.config.data_root.clone();
            let span = info_span!("acquire", source = descriptor.name.as_str());
            acquire(downloader, data_root, descriptor).instrument(span)
        }))
        .buffer_unordered(self.config.jobs);

        let mut abort_reason = None;
        while let Some(result) = stream.next().await {
            let fatal = result.fatal;
            if fatal {
                let cause = match &result.outcome.status {
                    OutcomeStatus::Failed { error } => error.clone(),
                    _ => "fatal resource failure".to_string(),
                };
                abort_reason = Some(format!("run aborted: {}", cause));
                error!(
                    source = result.outcome.name.as_str(),
                    "Fatal resource failure, aborting remaining sources"
                );
            }
            report.record(result.outcome);
            if fatal {
                break;
            }
        }
        drop(stream);

        // Any source never attempted because of a fatal abort still gets an
        // outcome, so the report covers every descriptor.
        if let Some(reason) = abort_reason {
            for name in scheduled {
                if !report.outcomes().iter().any(|o| o.name == name) {
                    report.record(SourceOutcome::skipped(name, reason.clone()));
                }
            }
        }

        report
    }
}

/// Fetch, verify, extract, re-encode, and clean up one source
async fn acquire(
    downloader: Arc<Downloader>,
    data_root: PathBuf,
    descriptor: SourceDescriptor,
) -> AcquireResult {
    let started = Instant::now();
    let name = descriptor.name.clone();

    match acquire_inner(downloader, &data_root, &descriptor).await {
        Ok((summary, converted)) => AcquireResult {
            outcome: SourceOutcome::succeeded(
                name,
                summary.files,
                summary.bytes,
                converted,
                started.elapsed(),
            ),
            fatal: false,
        },
        Err(e) => AcquireResult {
            fatal: e.is_fatal(),
            outcome: SourceOutcome::failed(name, e, started.elapsed()),
        },
    }
}

async fn acquire_inner(
    downloader: Arc<Downloader>,
    data_root: &Path,
    descriptor: &SourceDescriptor,
) -> Result<(ExtractSummary, usize)> {
    // Private temp directory per source; removed on success by cleanup()
    // and on failure when the handle drops.
    let download_dir = tempfile::Builder::new()
        .prefix(".download-")
        .tempdir_in(data_root)
        .map_err(|e| EcodataError::filesystem(data_root, e))?;

    let file_name = descriptor
        .url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("archive")
        .to_string();
    let archive_path = download_dir.path().join(file_name);

    downloader.fetch(&descriptor.url, &archive_path).await?;

    if let Some(expected) = descriptor.sha256.clone() {
        let path = archive_path.clone();
        tokio::task::spawn_blocking(move || {
            verify_file_checksum(&path, &expected, ChecksumAlgorithm::Sha256)
        })
        .await
        .map_err(|e| EcodataError::Config(format!("Checksum task panicked: {}", e)))??;
        debug!("Archive checksum verified");
    }

    let dest = data_root.join(&descriptor.dest);
    let summary = {
        let archive_path = archive_path.clone();
        let dest = dest.clone();
        let kind = descriptor.archive;
        tokio::task::spawn_blocking(move || extract::extract(&archive_path, kind, &dest))
            .await
            .map_err(|e| EcodataError::Archive(format!("Extraction task panicked: {}", e)))??
    };

    let converted = match descriptor.encoding.clone() {
        Some(rule) => {
            let dest = dest.clone();
            tokio::task::spawn_blocking(move || encoding::apply_rule(&dest, &rule))
                .await
                .map_err(|e| EcodataError::Encoding(format!("Encoding task panicked: {}", e)))??
        },
        None => 0,
    };

    cleanup(&[archive_path])?;
    download_dir
        .close()
        .map_err(|e| EcodataError::filesystem(data_root, e))?;

    info!(
        files = summary.files,
        bytes = summary.bytes,
        converted,
        "Source acquired"
    );
    Ok((summary, converted))
}

/// Remove transient files left over from an acquisition
///
/// Only ever called with the downloaded archive and staging paths; final
/// artifacts are never passed here. Missing paths are not an error.
pub fn cleanup(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                std::fs::remove_dir_all(path).map_err(|e| EcodataError::filesystem(path, e))?;
            },
            Ok(_) => {
                std::fs::remove_file(path).map_err(|e| EcodataError::filesystem(path, e))?;
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(EcodataError::filesystem(path, e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_jobs_rejected() {
        let config = PipelineConfig::new("./data").jobs(0);
        assert!(matches!(Pipeline::new(config), Err(EcodataError::Config(_))));
    }

    #[test]
    fn test_cleanup_removes_files_and_dirs() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("archive.zip");
        let dir = root.path().join(".download-x");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("inner"), b"y").unwrap();

        cleanup(&[file.clone(), dir.clone()]).unwrap();
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_cleanup_ignores_missing_paths() {
        let root = tempfile::tempdir().unwrap();
        cleanup(&[root.path().join("never-existed")]).unwrap();
    }

    #[tokio::test]
    async fn test_invalid_descriptor_fails_without_network() {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(root.path()).max_retries(1);
        let pipeline = Pipeline::new(config).unwrap();

        let bad = SourceDescriptor::new(
            "bad",
            "gopher://example.com/x.zip",
            crate::source::ArchiveKind::Zip,
            "bad",
        );
        let report = pipeline.run(vec![bad]).await;

        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed_names(), vec!["bad"]);
    }
}
