//! Manifest of completed runs, used to skip reprocessing an input whose
//! output is still current.

use crate::{
    error::{IoContext, ReannotateResult},
    fingerprint::{FileFingerprint, Fingerprinter, Sha1Fingerprinter, is_non_empty_file},
    table_io::{replace_with, sibling_temp_file},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_MANIFEST_FILE: &str = "reannotate_manifest.tsv";

/// One completed run: input and output paths with their fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub input_path: String,
    pub input_checksum: String,
    pub input_modified_at: u64,
    pub output_path: String,
    pub output_checksum: String,
    pub output_modified_at: u64,
}

impl RunFingerprint {
    fn input(&self) -> FileFingerprint {
        FileFingerprint {
            checksum: self.input_checksum.clone(),
            modified_at: self.input_modified_at,
        }
    }

    fn output(&self) -> FileFingerprint {
        FileFingerprint {
            checksum: self.output_checksum.clone(),
            modified_at: self.output_modified_at,
        }
    }
}

/// In-memory copy of the manifest file, keyed by input path.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<RunFingerprint>,
}

impl Manifest {
    /// Loads every well-formed line. Malformed lines are dropped.
    pub fn load(path: &Path) -> ReannotateResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_path(path)?;
        let mut entries = Vec::new();
        for (line_no, row) in reader.deserialize::<RunFingerprint>().enumerate() {
            match row {
                Ok(entry) => entries.push(entry),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    tracing::debug!(
                        manifest = %path.display(),
                        line = line_no + 1,
                        "Ignoring malformed manifest line: {e}"
                    );
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, input_path: &str) -> Option<&RunFingerprint> {
        self.entries.iter().find(|e| e.input_path == input_path)
    }

    /// Replaces the entry for the same input path in place, or appends.
    pub fn upsert(&mut self, entry: RunFingerprint) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.input_path == entry.input_path)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn entries(&self) -> &[RunFingerprint] {
        &self.entries
    }

    /// Writes all entries through a temporary file renamed over `path`.
    pub fn write(&self, path: &Path) -> ReannotateResult<()> {
        let tmp = sibling_temp_file(path)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .quote_style(csv::QuoteStyle::Never)
                .from_writer(tmp.as_file());
            for entry in &self.entries {
                writer.serialize(entry)?;
            }
            writer.flush().with_path("write manifest", path)?;
        }
        replace_with(tmp, path)
    }
}

/// Skip-or-rerun decisions backed by one manifest file.
pub struct StalenessCache<F: Fingerprinter = Sha1Fingerprinter> {
    manifest_path: PathBuf,
    fingerprinter: F,
}

impl StalenessCache<Sha1Fingerprinter> {
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self::with_fingerprinter(manifest_path, Sha1Fingerprinter)
    }
}

impl<F: Fingerprinter> StalenessCache<F> {
    pub fn with_fingerprinter(manifest_path: impl Into<PathBuf>, fingerprinter: F) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            fingerprinter,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// True only if the manifest holds this exact input/output pair and both
    /// files still match their recorded checksum or timestamp.
    pub fn should_skip(&self, input: &Path, output: &Path) -> ReannotateResult<bool> {
        if !self.manifest_path.exists() || !is_non_empty_file(input) || !is_non_empty_file(output)
        {
            return Ok(false);
        }
        let manifest = Manifest::load(&self.manifest_path)?;
        let Some(entry) = manifest.get(&canonical_or_display(input)) else {
            return Ok(false);
        };
        if entry.output_path != canonical_or_display(output) {
            return Ok(false);
        }

        let current_input = self.fingerprinter.fingerprint(input)?;
        let current_output = self.fingerprinter.fingerprint(output)?;
        let input_matches = entry
            .input()
            .matches(&current_input.checksum, current_input.modified_at);
        let output_matches = entry
            .output()
            .matches(&current_output.checksum, current_output.modified_at);
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            input_matches,
            output_matches,
            "Compared against manifest"
        );
        Ok(input_matches && output_matches)
    }

    /// Fingerprints both files as they are now and upserts the manifest.
    pub fn record(&self, input: &Path, output: &Path) -> ReannotateResult<RunFingerprint> {
        let input_fp = self.fingerprinter.fingerprint(input)?;
        let output_fp = self.fingerprinter.fingerprint(output)?;
        let entry = RunFingerprint {
            input_path: canonical_or_display(input),
            input_checksum: input_fp.checksum,
            input_modified_at: input_fp.modified_at,
            output_path: canonical_or_display(output),
            output_checksum: output_fp.checksum,
            output_modified_at: output_fp.modified_at,
        };
        let mut manifest = Manifest::load(&self.manifest_path)?;
        manifest.upsert(entry.clone());
        manifest.write(&self.manifest_path)?;
        Ok(entry)
    }
}

pub(crate) fn canonical_or_display(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
