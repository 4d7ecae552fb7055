//! Manifest discovery and decoding.
//!
//! # Design
//! - Candidates are files directly inside the batch directory carrying the
//!   manifest extension and the configured prefix. Temporary copies written by
//!   the authoring tool (a hyphenated 8-4-4-4-12 hex identifier right before
//!   the extension) are never candidates.
//! - One candidate is used as-is. Several candidates resolve to the newest one
//!   only when it lists the triggering file; anything else is a hard failure.
//! - Decoding goes through [`ScratchCopy`] and a pluggable [`ManifestDecoder`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use seqtrack_config::ManifestSettings;
use tracing::{debug, info, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::scratch::ScratchCopy;

const TRANSIENT_ID_PATTERN: &str =
    r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";
const HEADER_FIELDS: &[&str] = &["sample", "identifier", "file name"];

/// One sample listed by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    /// Sample identifier, usually a file name or a path ending in one.
    pub identifier: String,
    /// Storage path recorded by the instrument, when present.
    ///
    /// Informational only: expected names come from `identifier`, since
    /// payloads land in the batch directory wherever the instrument claims
    /// to have stored them.
    pub storage_path: Option<String>,
}

impl SampleEntry {
    /// Expected raw file name for this sample.
    #[must_use]
    pub fn expected_file_name(&self, payload_extension: &str) -> Option<String> {
        expected_file_name(&self.identifier, payload_extension)
    }
}

/// Normalise an identifier into the lowercase file name the instrument writes.
///
/// The last path component is kept (either separator style) and the payload
/// extension is appended when missing. Blank identifiers yield `None`.
#[must_use]
pub fn expected_file_name(identifier: &str, payload_extension: &str) -> Option<String> {
    let name = identifier.trim().rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() {
        return None;
    }
    let mut name = name.to_lowercase();
    let suffix = format!(".{}", payload_extension.to_lowercase());
    if !name.ends_with(&suffix) {
        name.push_str(&suffix);
    }
    Some(name)
}

/// Decodes a manifest file into its sample list.
pub trait ManifestDecoder {
    /// Decode the manifest stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::ManifestDecode`] when the content is not a valid
    /// manifest, or an IO error when it cannot be read.
    fn decode(&self, path: &Path) -> FsOpsResult<Vec<SampleEntry>>;
}

/// Decoder for exported sequence tables in delimited text form.
///
/// One sample per line. The delimiter is taken from the first content line:
/// tab when it holds one, otherwise semicolon, otherwise comma. Only that
/// delimiter splits fields, so identifiers may contain the other two. The
/// first field is the identifier and the optional second field the storage
/// path. Lines starting with `#` and a leading header row are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedManifestDecoder;

impl ManifestDecoder for DelimitedManifestDecoder {
    fn decode(&self, path: &Path) -> FsOpsResult<Vec<SampleEntry>> {
        let bytes = fs::read(path).map_err(|err| FsOpsError::io("manifest.read", path, err))?;
        let text = String::from_utf8(bytes).map_err(|_| FsOpsError::ManifestDecode {
            path: path.to_path_buf(),
            reason: "not valid UTF-8 text",
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let mut entries = Vec::new();
        let mut delimiter = None;
        let mut seen_data = false;
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let delimiter = *delimiter.get_or_insert_with(|| detect_delimiter(trimmed));
            let mut fields = trimmed.split(delimiter).map(str::trim);
            let identifier = fields.next().unwrap_or_default();
            if !seen_data
                && HEADER_FIELDS
                    .iter()
                    .any(|header| identifier.eq_ignore_ascii_case(header))
            {
                seen_data = true;
                continue;
            }
            seen_data = true;
            if identifier.is_empty() {
                continue;
            }
            let storage_path = fields
                .next()
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            entries.push(SampleEntry {
                identifier: identifier.to_string(),
                storage_path,
            });
        }
        Ok(entries)
    }
}

fn detect_delimiter(line: &str) -> char {
    ['\t', ';', ',']
        .into_iter()
        .find(|candidate| line.contains(*candidate))
        .unwrap_or('\t')
}

/// Where the expected-name list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// A manifest file in the batch directory.
    File(PathBuf),
    /// A synthetic list injected through configuration.
    Synthetic,
}

/// Outcome of manifest resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    /// Origin of the sample list.
    pub source: ManifestSource,
    /// Lowercase expected file names in manifest order.
    pub expected_names: Vec<String>,
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    modified: SystemTime,
}

/// Locates and decodes the manifest governing a batch directory.
pub struct ManifestResolver<'a> {
    settings: &'a ManifestSettings,
    payload_extension: &'a str,
    decoder: &'a dyn ManifestDecoder,
    transient: Regex,
}

impl<'a> ManifestResolver<'a> {
    /// Build a resolver for the configured manifest settings.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Regex`] if the transient-name pattern cannot be
    /// compiled for the configured extension.
    pub fn new(
        settings: &'a ManifestSettings,
        payload_extension: &'a str,
        decoder: &'a dyn ManifestDecoder,
    ) -> FsOpsResult<Self> {
        let pattern = format!(
            r"(?i){TRANSIENT_ID_PATTERN}\.{}$",
            regex::escape(&settings.extension)
        );
        let transient = Regex::new(&pattern).map_err(|source| FsOpsError::Regex {
            operation: "manifest.compile",
            pattern,
            source,
        })?;
        Ok(Self {
            settings,
            payload_extension,
            decoder,
            transient,
        })
    }

    /// Resolve the expected-name list for `batch_dir`.
    ///
    /// `trigger_name` is the expected name of the triggering file and only
    /// matters when several manifests compete.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::ManifestNotFound`], [`FsOpsError::ManifestAmbiguous`],
    /// decode failures, or IO errors from listing the directory.
    pub fn resolve(&self, batch_dir: &Path, trigger_name: &str) -> FsOpsResult<ResolvedManifest> {
        if let Some(mock) = self.settings.mock_samples.as_deref() {
            let expected_names = self.mock_names(mock);
            info!(
                samples = expected_names.len(),
                "using synthetic sample list instead of a manifest"
            );
            return Ok(ResolvedManifest {
                source: ManifestSource::Synthetic,
                expected_names,
            });
        }

        let mut candidates = self.candidates(batch_dir)?;
        match candidates.len() {
            0 => Err(FsOpsError::ManifestNotFound {
                batch_dir: batch_dir.to_path_buf(),
                extension: self.settings.extension.clone(),
            }),
            1 => {
                let chosen = candidates.remove(0);
                let expected_names = self.expected_names(&chosen.path)?;
                info!(manifest = %chosen.path.display(), "resolved manifest");
                Ok(ResolvedManifest {
                    source: ManifestSource::File(chosen.path),
                    expected_names,
                })
            }
            count => {
                candidates.sort_by(|left, right| {
                    left.modified
                        .cmp(&right.modified)
                        .then_with(|| left.path.cmp(&right.path))
                });
                let Some(newest) = candidates.pop() else {
                    return Err(FsOpsError::ManifestNotFound {
                        batch_dir: batch_dir.to_path_buf(),
                        extension: self.settings.extension.clone(),
                    });
                };
                let expected_names = self.expected_names(&newest.path)?;
                if expected_names.iter().any(|name| name == trigger_name) {
                    warn!(
                        candidates = count,
                        manifest = %newest.path.display(),
                        "multiple manifests present; using the newest, which lists the triggering file"
                    );
                    Ok(ResolvedManifest {
                        source: ManifestSource::File(newest.path),
                        expected_names,
                    })
                } else {
                    Err(FsOpsError::ManifestAmbiguous {
                        batch_dir: batch_dir.to_path_buf(),
                        candidates: count,
                        newest: newest.path,
                        file_name: trigger_name.to_string(),
                    })
                }
            }
        }
    }

    fn mock_names(&self, mock: &str) -> Vec<String> {
        mock.split(';')
            .filter_map(|entry| expected_file_name(entry, self.payload_extension))
            .collect()
    }

    fn expected_names(&self, manifest: &Path) -> FsOpsResult<Vec<String>> {
        let copy = ScratchCopy::create(&self.settings.scratch_dir, manifest)?;
        let entries = self.decoder.decode(copy.path())?;
        debug!(
            manifest = %manifest.display(),
            entries = entries.len(),
            "decoded manifest"
        );
        let mut names = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(name) = entry.expected_file_name(self.payload_extension) else {
                continue;
            };
            debug!(
                expected = %name,
                storage_path = entry.storage_path.as_deref().unwrap_or_default(),
                "manifest sample"
            );
            names.push(name);
        }
        Ok(names)
    }

    fn candidates(&self, batch_dir: &Path) -> FsOpsResult<Vec<Candidate>> {
        let suffix = format!(".{}", self.settings.extension.to_lowercase());
        let prefix = self.settings.prefix.to_lowercase();
        let listing = fs::read_dir(batch_dir)
            .map_err(|err| FsOpsError::io("manifest.list", batch_dir, err))?;

        let mut candidates = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|err| FsOpsError::io("manifest.list", batch_dir, err))?;
            let path = entry.path();
            let metadata = entry
                .metadata()
                .map_err(|err| FsOpsError::io("manifest.stat", &path, err))?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let lowered = name.to_lowercase();
            if !lowered.ends_with(&suffix) || !lowered.starts_with(&prefix) {
                continue;
            }
            if self.transient.is_match(name) {
                debug!(path = %path.display(), "skipping transient manifest copy");
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|err| FsOpsError::io("manifest.stat", &path, err))?;
            candidates.push(Candidate { path, modified });
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use seqtrack_test_support::{BatchFixture, set_modified_ago};
    use std::time::Duration;

    fn settings(fixture: &BatchFixture) -> ManifestSettings {
        ManifestSettings {
            prefix: String::new(),
            extension: "sld".into(),
            mock_samples: None,
            scratch_dir: fixture.scratch_dir().to_path_buf(),
        }
    }

    #[test]
    fn expected_file_name_normalises_identifiers() {
        assert_eq!(expected_file_name("QC_01", "raw").as_deref(), Some("qc_01.raw"));
        assert_eq!(
            expected_file_name(r"D:\Data\Run1\Sample_A.RAW", "raw").as_deref(),
            Some("sample_a.raw")
        );
        assert_eq!(
            expected_file_name("runs/2024/S2", "raw").as_deref(),
            Some("s2.raw")
        );
        assert_eq!(expected_file_name("   ", "raw"), None);
        assert_eq!(expected_file_name("trailing/", "raw"), None);
    }

    #[test]
    fn tab_delimited_identifiers_keep_commas_and_semicolons() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        let path = fixture.write_file(
            "run.sld",
            b"Sample\tPath\nSmith, J 01\tC:\\Runs, 2024\nQC;blank\t\n",
        )?;
        let entries = DelimitedManifestDecoder.decode(&path)?;
        assert_eq!(
            entries,
            vec![
                SampleEntry {
                    identifier: "Smith, J 01".into(),
                    storage_path: Some(r"C:\Runs, 2024".into()),
                },
                SampleEntry {
                    identifier: "QC;blank".into(),
                    storage_path: None,
                },
            ]
        );
        assert_eq!(
            entries[0].expected_file_name("raw").as_deref(),
            Some("smith, j 01.raw")
        );
        Ok(())
    }

    #[test]
    fn delimited_decoder_skips_headers_comments_and_blanks() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        let path = fixture.write_file(
            "run.sld",
            b"# exported sequence\nFile Name,Path\nA1,C:\\Data\n\n ,ignored\nB2,D:\\Data\nC3\n",
        )?;
        let entries = DelimitedManifestDecoder.decode(&path)?;
        assert_eq!(
            entries,
            vec![
                SampleEntry {
                    identifier: "A1".into(),
                    storage_path: Some(r"C:\Data".into()),
                },
                SampleEntry {
                    identifier: "B2".into(),
                    storage_path: Some(r"D:\Data".into()),
                },
                SampleEntry {
                    identifier: "C3".into(),
                    storage_path: None,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn delimited_decoder_rejects_binary_content() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        let path = fixture.write_file("run.sld", &[0xff, 0xfe, 0x00, 0x81])?;
        let err = DelimitedManifestDecoder.decode(&path).unwrap_err();
        assert!(matches!(err, FsOpsError::ManifestDecode { .. }));
        Ok(())
    }

    #[test]
    fn zero_candidates_is_not_found() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        fixture.write_payload("a.raw", 10)?;
        let settings = settings(&fixture);
        let resolver = ManifestResolver::new(&settings, "raw", &DelimitedManifestDecoder)?;
        let err = resolver.resolve(fixture.batch_dir(), "a.raw").unwrap_err();
        assert!(matches!(err, FsOpsError::ManifestNotFound { .. }));
        Ok(())
    }

    #[test]
    fn single_candidate_is_used_and_scratch_cleared() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        let manifest = fixture.write_manifest("Run1.SLD", &["A1", "B2.raw"])?;
        let settings = settings(&fixture);
        let resolver = ManifestResolver::new(&settings, "raw", &DelimitedManifestDecoder)?;

        let resolved = resolver.resolve(fixture.batch_dir(), "a1.raw")?;
        assert_eq!(resolved.source, ManifestSource::File(manifest));
        assert_eq!(resolved.expected_names, vec!["a1.raw", "b2.raw"]);
        assert_eq!(fs::read_dir(fixture.scratch_dir())?.count(), 0);
        Ok(())
    }

    #[test]
    fn transient_copies_and_foreign_prefixes_are_ignored() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        let manifest = fixture.write_manifest("SEQ_run.sld", &["A1"])?;
        fixture.write_manifest("SEQ_run_0f8fad5b-d9cb-469f-a165-70867728950e.sld", &["Z9"])?;
        fixture.write_manifest("other.sld", &["Y8"])?;
        let mut settings = settings(&fixture);
        settings.prefix = "seq".into();
        let resolver = ManifestResolver::new(&settings, "raw", &DelimitedManifestDecoder)?;

        let resolved = resolver.resolve(fixture.batch_dir(), "a1.raw")?;
        assert_eq!(resolved.source, ManifestSource::File(manifest));
        Ok(())
    }

    #[test]
    fn newest_candidate_wins_only_when_it_lists_trigger() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        let old = fixture.write_manifest("old.sld", &["A1", "B2"])?;
        set_modified_ago(&old, Duration::from_secs(600))?;
        let newest = fixture.write_manifest("new.sld", &["A1", "C3"])?;
        let settings = settings(&fixture);
        let resolver = ManifestResolver::new(&settings, "raw", &DelimitedManifestDecoder)?;

        let resolved = resolver.resolve(fixture.batch_dir(), "c3.raw")?;
        assert_eq!(resolved.source, ManifestSource::File(newest));

        let err = resolver.resolve(fixture.batch_dir(), "b2.raw").unwrap_err();
        assert!(matches!(
            err,
            FsOpsError::ManifestAmbiguous { candidates: 2, ref file_name, .. } if file_name == "b2.raw"
        ));
        Ok(())
    }

    #[test]
    fn mock_samples_bypass_manifest_lookup() -> Result<()> {
        let fixture = BatchFixture::new("Run1")?;
        let mut settings = settings(&fixture);
        settings.mock_samples = Some(" a.raw ; ;B ;".into());
        let resolver = ManifestResolver::new(&settings, "raw", &DelimitedManifestDecoder)?;

        let resolved = resolver.resolve(fixture.batch_dir(), "a.raw")?;
        assert_eq!(resolved.source, ManifestSource::Synthetic);
        assert_eq!(resolved.expected_names, vec!["a.raw", "b.raw"]);
        Ok(())
    }
}
