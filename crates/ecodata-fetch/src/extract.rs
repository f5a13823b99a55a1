//! Archive extraction into per-source destination directories
//!
//! All formats extract into a staging directory next to the destination and
//! atomically rename into place once the whole archive has been unpacked. A
//! corrupt archive therefore never leaves partially-extracted files in the
//! destination, and an interrupted run never corrupts a previously completed
//! source.

use crate::source::ArchiveKind;
use ecodata_common::{EcodataError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// What an extraction produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Number of regular files written
    pub files: u64,

    /// Total uncompressed bytes written
    pub bytes: u64,
}

/// Extract an archive into `dest`, replacing any previous contents
///
/// `dest` must have an existing parent directory; the staging directory is
/// created there so the final rename stays on one filesystem.
pub fn extract(archive: &Path, kind: ArchiveKind, dest: &Path) -> Result<ExtractSummary> {
    let parent = dest.parent().ok_or_else(|| {
        EcodataError::Config(format!("Destination has no parent directory: {}", dest.display()))
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .map_err(|e| EcodataError::filesystem(parent, e))?;

    let summary = match kind {
        // A self-extracting archive is a zip with an executable stub in
        // front; the reader locates the central directory from the end of
        // the file, so both kinds take the same path.
        ArchiveKind::Zip | ArchiveKind::SelfExtractingZip => {
            extract_zip(archive, staging.path())?
        },
        ArchiveKind::Gzip => extract_gzip(archive, staging.path())?,
        ArchiveKind::TarGz => extract_tar_gz(archive, staging.path())?,
    };

    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(|e| EcodataError::filesystem(dest, e))?;
    }
    std::fs::rename(staging.into_path(), dest).map_err(|e| EcodataError::filesystem(dest, e))?;

    debug!(
        dest = %dest.display(),
        files = summary.files,
        bytes = summary.bytes,
        "Extraction complete"
    );
    Ok(summary)
}

/// Extract all entries of a zip archive
fn extract_zip(archive_path: &Path, out_dir: &Path) -> Result<ExtractSummary> {
    let file =
        File::open(archive_path).map_err(|e| EcodataError::filesystem(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| EcodataError::Archive(format!("Failed to read zip archive: {}", e)))?;

    let mut summary = ExtractSummary::default();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| EcodataError::Archive(format!("Failed to read zip entry {}: {}", i, e)))?;

        // Reject entries that would escape the output directory
        let rel = entry.enclosed_name().map(|p| p.to_path_buf()).ok_or_else(|| {
            EcodataError::Archive(format!("Unsafe path in zip archive: {}", entry.name()))
        })?;
        let out_path = out_dir.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| EcodataError::filesystem(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EcodataError::filesystem(parent, e))?;
        }

        let mut out_file =
            File::create(&out_path).map_err(|e| EcodataError::filesystem(&out_path, e))?;
        let written = std::io::copy(&mut entry, &mut out_file)
            .map_err(|e| copy_error(&out_path, e))?;

        summary.files += 1;
        summary.bytes += written;
    }

    Ok(summary)
}

/// Decompress a single gzip-compressed file
///
/// The output file name is the archive name without its `.gz` suffix.
fn extract_gzip(archive_path: &Path, out_dir: &Path) -> Result<ExtractSummary> {
    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "decompressed".to_string());
    let out_name = name.strip_suffix(".gz").unwrap_or(&name).to_string();
    let out_path = out_dir.join(out_name);

    let file =
        File::open(archive_path).map_err(|e| EcodataError::filesystem(archive_path, e))?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut out_file =
        File::create(&out_path).map_err(|e| EcodataError::filesystem(&out_path, e))?;

    let written =
        std::io::copy(&mut decoder, &mut out_file).map_err(|e| copy_error(&out_path, e))?;

    Ok(ExtractSummary {
        files: 1,
        bytes: written,
    })
}

/// Extract a gzip-compressed tar archive
fn extract_tar_gz(archive_path: &Path, out_dir: &Path) -> Result<ExtractSummary> {
    let file =
        File::open(archive_path).map_err(|e| EcodataError::filesystem(archive_path, e))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);

    let mut summary = ExtractSummary::default();

    let entries = archive
        .entries()
        .map_err(|e| EcodataError::Archive(format!("Failed to read tar entries: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| EcodataError::Archive(format!("Failed to read tar entry: {}", e)))?;
        let is_file = entry.header().entry_type().is_file();
        let size = entry.size();

        // unpack_in sanitizes entry paths against directory escape
        let unpacked = entry.unpack_in(out_dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::StorageFull {
                EcodataError::filesystem(out_dir, e)
            } else {
                EcodataError::Archive(format!("Failed to unpack tar entry: {}", e))
            }
        })?;

        if unpacked && is_file {
            summary.files += 1;
            summary.bytes += size;
        }
    }

    Ok(summary)
}

/// Classify an `io::copy` failure: decoder errors mean a corrupt archive,
/// a full disk is a filesystem failure that must abort the whole run.
fn copy_error(path: &Path, e: std::io::Error) -> EcodataError {
    if e.kind() == std::io::ErrorKind::StorageFull {
        EcodataError::filesystem(path, e)
    } else {
        EcodataError::Archive(format!("Failed to decompress {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn gzip_bytes(content: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, *name, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn no_staging_leftovers(dir: &Path) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with(".staging-"), "staging leftover: {}", name);
        }
    }

    #[test]
    fn test_extract_zip_with_subdirectory() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("ecotox.zip");
        std::fs::write(
            &archive,
            zip_bytes(&[
                ("tests.txt", b"a|b|c".as_slice()),
                ("validation/species.txt", b"1|Daphnia magna".as_slice()),
            ]),
        )
        .unwrap();

        let dest = root.path().join("ecotox_data");
        let summary = extract(&archive, ArchiveKind::Zip, &dest).unwrap();

        assert_eq!(summary.files, 2);
        assert!(dest.join("tests.txt").is_file());
        assert!(dest.join("validation/species.txt").is_file());
        no_staging_leftovers(root.path());
    }

    #[test]
    fn test_extract_self_extracting_zip_skips_stub() {
        let root = tempfile::tempdir().unwrap();
        let mut data = b"MZ\x90\x00 fake executable stub".to_vec();
        data.extend(zip_bytes(&[("results.txt", b"result rows".as_slice())]));

        let archive = root.path().join("ecotox.exe");
        std::fs::write(&archive, data).unwrap();

        let dest = root.path().join("ecotox_data");
        let summary = extract(&archive, ArchiveKind::SelfExtractingZip, &dest).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(std::fs::read(dest.join("results.txt")).unwrap(), b"result rows");
    }

    #[test]
    fn test_extract_corrupt_zip_leaves_no_destination() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("broken.zip");
        std::fs::write(&archive, b"this is not a zip archive").unwrap();

        let dest = root.path().join("out");
        let result = extract(&archive, ArchiveKind::Zip, &dest);

        assert!(matches!(result, Err(EcodataError::Archive(_))));
        assert!(!dest.exists());
        no_staging_leftovers(root.path());
    }

    #[test]
    fn test_extract_gzip_strips_suffix() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("mesh.nt.gz");
        std::fs::write(&archive, gzip_bytes(b"<s> <p> <o> .")).unwrap();

        let dest = root.path().join("mesh");
        let summary = extract(&archive, ArchiveKind::Gzip, &dest).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(std::fs::read(dest.join("mesh.nt")).unwrap(), b"<s> <p> <o> .");
    }

    #[test]
    fn test_extract_corrupt_gzip_is_archive_error() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("broken.nt.gz");
        std::fs::write(&archive, b"not gzip data").unwrap();

        let dest = root.path().join("mesh");
        let result = extract(&archive, ArchiveKind::Gzip, &dest);

        assert!(matches!(result, Err(EcodataError::Archive(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_extract_tar_gz() {
        let root = tempfile::tempdir().unwrap();
        let archive = root.path().join("taxdump.tar.gz");
        std::fs::write(
            &archive,
            tar_gz_bytes(&[
                ("nodes.dmp", b"1|1|no rank|".as_slice()),
                ("names.dmp", b"1|root||scientific name|".as_slice()),
            ]),
        )
        .unwrap();

        let dest = root.path().join("taxdump");
        let summary = extract(&archive, ArchiveKind::TarGz, &dest).unwrap();

        assert_eq!(summary.files, 2);
        assert!(dest.join("nodes.dmp").is_file());
        assert!(dest.join("names.dmp").is_file());
    }

    #[test]
    fn test_reextraction_replaces_previous_contents() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("data");

        let archive = root.path().join("v1.zip");
        std::fs::write(&archive, zip_bytes(&[("old.txt", b"old".as_slice())])).unwrap();
        extract(&archive, ArchiveKind::Zip, &dest).unwrap();

        let archive = root.path().join("v2.zip");
        std::fs::write(&archive, zip_bytes(&[("new.txt", b"new".as_slice())])).unwrap();
        extract(&archive, ArchiveKind::Zip, &dest).unwrap();

        assert!(dest.join("new.txt").is_file());
        assert!(!dest.join("old.txt").exists(), "stale file survived re-extraction");
    }
}
