//! Source descriptors and the built-in dataset catalog

use ecodata_common::{EcodataError, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Compression/container format of a downloaded archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveKind {
    /// Plain zip archive
    Zip,
    /// Windows self-extracting executable wrapping a zip payload. The zip
    /// central directory sits at the end of the file, so the executable stub
    /// is skipped by the zip reader.
    SelfExtractingZip,
    /// Single gzip-compressed file (e.g. `mesh.nt.gz`)
    Gzip,
    /// Gzip-compressed tar archive (e.g. `taxdump.tar.gz`)
    TarGz,
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::SelfExtractingZip => "self-extracting-zip",
            ArchiveKind::Gzip => "gzip",
            ArchiveKind::TarGz => "tar.gz",
        };
        write!(f, "{}", s)
    }
}

/// Text re-encoding rule applied to extracted files
///
/// Matches files by extension under the destination directory. When
/// `recursive` is set, subdirectories (e.g. the ECOTOX `validation/` tree)
/// are processed with the same rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingRule {
    /// Source encoding label (e.g. "windows-1252")
    pub from: String,

    /// Target encoding label (e.g. "utf-8")
    pub to: String,

    /// File extension to match, without the dot (e.g. "txt")
    pub extension: String,

    /// Whether to recurse into subdirectories
    pub recursive: bool,
}

impl EncodingRule {
    /// Windows-1252 to UTF-8 on `.txt` files, recursive
    pub fn windows_1252_to_utf8() -> Self {
        Self {
            from: "windows-1252".to_string(),
            to: "utf-8".to_string(),
            extension: "txt".to_string(),
            recursive: true,
        }
    }

    /// Resolve the source encoding label
    pub fn source_encoding(&self) -> Result<&'static Encoding> {
        resolve_encoding(&self.from)
    }

    /// Resolve the target encoding label
    pub fn target_encoding(&self) -> Result<&'static Encoding> {
        resolve_encoding(&self.to)
    }
}

/// Look up an encoding by WHATWG label
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| EcodataError::Config(format!("Unknown encoding label: {}", label)))
}

/// Configuration unit describing one remote dataset: where to fetch it and
/// how to process it locally. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Short unique name (used for `--sources` filtering and reporting)
    pub name: String,

    /// Remote archive URL (https:// or ftp://)
    pub url: String,

    /// Archive format of the remote file
    pub archive: ArchiveKind,

    /// Destination directory, relative to the data root
    pub dest: String,

    /// Optional text re-encoding applied after extraction
    pub encoding: Option<EncodingRule>,

    /// Optional expected SHA-256 digest of the downloaded archive
    pub sha256: Option<String>,
}

impl SourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        archive: ArchiveKind,
        dest: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            archive,
            dest: dest.into(),
            encoding: None,
            sha256: None,
        }
    }

    pub fn with_encoding(mut self, rule: EncodingRule) -> Self {
        self.encoding = Some(rule);
        self
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Validate the descriptor before any network activity
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EcodataError::Config("Source name cannot be empty".to_string()));
        }

        if !self.url.starts_with("http://")
            && !self.url.starts_with("https://")
            && !self.url.starts_with("ftp://")
        {
            return Err(EcodataError::Config(format!(
                "Source '{}' has unsupported URL scheme: {}",
                self.name, self.url
            )));
        }

        let dest = Path::new(&self.dest);
        let plain = dest
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if self.dest.is_empty() || !plain {
            return Err(EcodataError::Config(format!(
                "Source '{}' has invalid destination directory: {:?}",
                self.name, self.dest
            )));
        }

        if let Some(rule) = &self.encoding {
            rule.source_encoding()?;
            rule.target_encoding()?;
        }

        Ok(())
    }
}

/// Built-in catalog of the knowledge-graph input datasets
pub fn catalog() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new(
            "ecotox",
            "https://gaftp.epa.gov/ecotox/ecotox_ascii_09_15_2020.exe",
            ArchiveKind::SelfExtractingZip,
            "ecotox_data",
        )
        .with_encoding(EncodingRule::windows_1252_to_utf8()),
        SourceDescriptor::new(
            "ncbi-taxonomy",
            "https://ftp.ncbi.nlm.nih.gov/pub/taxonomy/taxdump.tar.gz",
            ArchiveKind::TarGz,
            "taxdump",
        ),
        SourceDescriptor::new(
            "pubchem-hierarchy",
            "ftp://ftp.ncbi.nlm.nih.gov/pubchem/RDF/compound/general/pc_compound2parent.ttl.gz",
            ArchiveKind::Gzip,
            "pubchem",
        ),
        SourceDescriptor::new(
            "chembl",
            "ftp://ftp.ebi.ac.uk/pub/databases/chembl/ChEMBL-RDF/latest/chembl_molecule.ttl.gz",
            ArchiveKind::Gzip,
            "chembl",
        ),
        SourceDescriptor::new(
            "mesh",
            "ftp://ftp.nlm.nih.gov/online/mesh/rdf/mesh.nt.gz",
            ArchiveKind::Gzip,
            "mesh",
        ),
        SourceDescriptor::new(
            "eol",
            "https://editors.eol.org/other_files/SDR/traits_all.zip",
            ArchiveKind::Zip,
            "eol",
        ),
    ]
}

/// Select catalog entries by name, preserving catalog order
///
/// An empty filter selects the whole catalog. Unknown names are a
/// configuration error reported before any network activity.
pub fn select(names: &[String]) -> Result<Vec<SourceDescriptor>> {
    let all = catalog();

    if names.is_empty() {
        return Ok(all);
    }

    for name in names {
        if !all.iter().any(|s| &s.name == name) {
            let known: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
            return Err(EcodataError::Config(format!(
                "Unknown source '{}'. Known sources: {}",
                name,
                known.join(", ")
            )));
        }
    }

    Ok(all
        .into_iter()
        .filter(|s| names.iter().any(|n| n == &s.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_valid() {
        for descriptor in catalog() {
            descriptor.validate().unwrap();
        }
    }

    #[test]
    fn test_catalog_names_and_dests_are_unique() {
        let all = catalog();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.dest, b.dest, "sources must not share a destination");
            }
        }
    }

    #[test]
    fn test_ecotox_converts_windows_1252_recursively() {
        let all = catalog();
        let ecotox = all.iter().find(|s| s.name == "ecotox").unwrap();
        let rule = ecotox.encoding.as_ref().unwrap();
        assert_eq!(rule.from, "windows-1252");
        assert_eq!(rule.to, "utf-8");
        assert!(rule.recursive);
    }

    #[test]
    fn test_select_empty_returns_all() {
        assert_eq!(select(&[]).unwrap().len(), catalog().len());
    }

    #[test]
    fn test_select_filters_by_name() {
        let names = vec!["mesh".to_string(), "eol".to_string()];
        let selected = select(&names).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "mesh");
        assert_eq!(selected[1].name, "eol");
    }

    #[test]
    fn test_select_unknown_name_is_config_error() {
        let names = vec!["uniprot".to_string()];
        let result = select(&names);
        assert!(matches!(result, Err(EcodataError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_traversal_dest() {
        let descriptor = SourceDescriptor::new(
            "bad",
            "https://example.com/a.zip",
            ArchiveKind::Zip,
            "../outside",
        );
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_scheme() {
        let descriptor =
            SourceDescriptor::new("bad", "gopher://example.com/a.zip", ArchiveKind::Zip, "a");
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_resolve_encoding_unknown_label() {
        assert!(matches!(resolve_encoding("ebcdic-37-ish"), Err(EcodataError::Config(_))));
    }
}
