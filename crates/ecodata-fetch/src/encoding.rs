//! Text re-encoding of extracted files
//!
//! The ECOTOX ASCII dump ships as Windows-1252; downstream parsing expects
//! UTF-8. Conversion is strict: a byte sequence that is not valid in the
//! declared source encoding fails with [`EcodataError::Encoding`] and leaves
//! the original file untouched (the rewrite goes through a temp file in the
//! same directory and renames over the original only on success).

use crate::source::EncodingRule;
use ecodata_common::{EcodataError, Result};
use encoding_rs::Encoding;
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Re-encode a single file in place
///
/// Returns `true` if the file was rewritten, `false` if its bytes were
/// already identical under the target encoding (no-op).
pub fn convert_file(path: &Path, from: &'static Encoding, to: &'static Encoding) -> Result<bool> {
    let bytes = std::fs::read(path).map_err(|e| EcodataError::filesystem(path, e))?;

    let text = from
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .ok_or_else(|| {
            EcodataError::Encoding(format!(
                "{} contains byte sequences invalid in {}",
                path.display(),
                from.name()
            ))
        })?;

    let (encoded, _, had_errors) = to.encode(&text);
    if had_errors {
        return Err(EcodataError::Encoding(format!(
            "{} contains characters unmappable to {}",
            path.display(),
            to.name()
        )));
    }

    if encoded.as_ref() == bytes.as_slice() {
        trace!(path = %path.display(), "Already in target encoding");
        return Ok(false);
    }

    let parent = path.parent().ok_or_else(|| {
        EcodataError::Config(format!("File has no parent directory: {}", path.display()))
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| EcodataError::filesystem(parent, e))?;
    std::io::Write::write_all(&mut tmp, &encoded)
        .map_err(|e| EcodataError::filesystem(path, e))?;
    tmp.persist(path)
        .map_err(|e| EcodataError::filesystem(path, e.error))?;

    Ok(true)
}

/// Apply an encoding rule to every matching file under `root`
///
/// Returns the number of files rewritten. Matching is by file extension,
/// case-insensitive; with `rule.recursive` unset only files directly under
/// `root` are considered.
pub fn apply_rule(root: &Path, rule: &EncodingRule) -> Result<usize> {
    let from = rule.source_encoding()?;
    let to = rule.target_encoding()?;

    let mut walker = WalkDir::new(root);
    if !rule.recursive {
        walker = walker.max_depth(1);
    }

    let mut converted = 0;
    for entry in walker {
        let entry = entry.map_err(|e| {
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            EcodataError::filesystem(root, io)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(rule.extension.as_str()))
            .unwrap_or(false);
        if !matches {
            continue;
        }

        if convert_file(entry.path(), from, to)? {
            converted += 1;
        }
    }

    debug!(
        root = %root.display(),
        from = rule.from.as_str(),
        to = rule.to.as_str(),
        converted,
        "Encoding pass complete"
    );
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    #[test]
    fn test_convert_windows_1252_to_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("species.txt");
        // "Daphnia \xE9" - e-acute in Windows-1252
        std::fs::write(&path, b"Daphnia \xE9").unwrap();

        assert!(convert_file(&path, WINDOWS_1252, UTF_8).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), "Daphnia é".as_bytes());
    }

    #[test]
    fn test_convert_is_noop_for_target_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ascii.txt");
        let content = b"plain ascii is valid in both encodings";
        std::fs::write(&path, content).unwrap();

        assert!(!convert_file(&path, WINDOWS_1252, UTF_8).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), content);
    }

    #[test]
    fn test_utf8_round_trip_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utf8.txt");
        let content = "already UTF-8: é ü ß".as_bytes();
        std::fs::write(&path, content).unwrap();

        assert!(!convert_file(&path, UTF_8, UTF_8).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), content);
    }

    #[test]
    fn test_invalid_bytes_leave_original_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        // 0x81 is unassigned in Windows-1252
        let content = b"broken \x81 byte";
        std::fs::write(&path, content).unwrap();

        let result = convert_file(&path, WINDOWS_1252, UTF_8);
        assert!(matches!(result, Err(EcodataError::Encoding(_))));
        assert_eq!(std::fs::read(&path).unwrap(), content);
    }

    #[test]
    fn test_apply_rule_recurses_into_validation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("validation")).unwrap();
        std::fs::write(dir.path().join("tests.txt"), b"caf\xE9").unwrap();
        std::fs::write(dir.path().join("validation/species.txt"), b"\xE9cology").unwrap();
        std::fs::write(dir.path().join("readme.md"), b"not matched \xE9").unwrap();

        let rule = EncodingRule::windows_1252_to_utf8();
        assert_eq!(apply_rule(dir.path(), &rule).unwrap(), 2);

        assert_eq!(std::fs::read(dir.path().join("tests.txt")).unwrap(), "café".as_bytes());
        assert_eq!(
            std::fs::read(dir.path().join("validation/species.txt")).unwrap(),
            "écology".as_bytes()
        );
        // Non-matching extension untouched
        assert_eq!(std::fs::read(dir.path().join("readme.md")).unwrap(), b"not matched \xE9");
    }

    #[test]
    fn test_apply_rule_non_recursive_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("top.txt"), b"\xE9").unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), b"\xE9").unwrap();

        let rule = EncodingRule {
            recursive: false,
            ..EncodingRule::windows_1252_to_utf8()
        };
        assert_eq!(apply_rule(dir.path(), &rule).unwrap(), 1);

        // Nested file still Windows-1252
        assert_eq!(std::fs::read(dir.path().join("sub/nested.txt")).unwrap(), b"\xE9");
    }
}
