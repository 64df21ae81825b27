//! Run configuration for the reannotation pipeline.

use crate::staleness_cache::DEFAULT_MANIFEST_FILE;
use reannotate_protocol::DEFAULT_RETAIN_COLUMNS;
use std::path::{Path, PathBuf};

/// Input column names the splitter reads read depths and allele counts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthColumns {
    pub tumor_depth: String,
    pub tumor_ref_count: String,
    pub tumor_alt_count: String,
    pub normal_depth: String,
    pub normal_ref_count: String,
    pub normal_alt_count: String,
}

impl Default for DepthColumns {
    fn default() -> Self {
        Self {
            tumor_depth: "t_depth".to_string(),
            tumor_ref_count: "t_ref_count".to_string(),
            tumor_alt_count: "t_alt_count".to_string(),
            normal_depth: "n_depth".to_string(),
            normal_ref_count: "n_ref_count".to_string(),
            normal_alt_count: "n_alt_count".to_string(),
        }
    }
}

/// Settings forwarded to the annotator for every pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatorOptions {
    pub vep_path: Option<PathBuf>,
    pub vep_data: Option<PathBuf>,
    /// Worker processes the annotator may fork.
    pub vep_forks: usize,
    pub ref_fasta: Option<PathBuf>,
    pub filter_vcf: Option<PathBuf>,
    pub species: String,
    pub ncbi_build: String,
    pub cache_version: Option<String>,
    pub buffer_size: usize,
    pub any_allele: bool,
    pub maf_center: Option<String>,
}

impl Default for AnnotatorOptions {
    fn default() -> Self {
        Self {
            vep_path: None,
            vep_data: None,
            vep_forks: 4,
            ref_fasta: None,
            filter_vcf: None,
            species: "homo_sapiens".to_string(),
            ncbi_build: "GRCh37".to_string(),
            cache_version: None,
            buffer_size: 5000,
            any_allele: false,
            maf_center: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReannotateConfig {
    pub input: PathBuf,
    /// `None` writes the combined table to stdout and skips the manifest.
    pub output: Option<PathBuf>,
    pub working_dir: PathBuf,
    pub manifest: PathBuf,
    pub force: bool,
    pub retain_columns: Vec<String>,
    pub depth_columns: DepthColumns,
    pub annotator: AnnotatorOptions,
}

impl ReannotateConfig {
    /// Working directory defaults to `<temp>/reannotate_<input stem>` so
    /// repeated runs over one input share a manifest.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        let input = input.into();
        let working_dir = default_working_dir(&input);
        Self {
            manifest: working_dir.join(DEFAULT_MANIFEST_FILE),
            working_dir,
            input,
            output: None,
            force: false,
            retain_columns: DEFAULT_RETAIN_COLUMNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            depth_columns: DepthColumns::default(),
            annotator: AnnotatorOptions::default(),
        }
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Also moves the manifest into the new directory.
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self.manifest = self.working_dir.join(DEFAULT_MANIFEST_FILE);
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = manifest.into();
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_retain_columns(mut self, retain_columns: Vec<String>) -> Self {
        self.retain_columns = retain_columns;
        self
    }

    pub fn with_depth_columns(mut self, depth_columns: DepthColumns) -> Self {
        self.depth_columns = depth_columns;
        self
    }

    pub fn with_annotator(mut self, annotator: AnnotatorOptions) -> Self {
        self.annotator = annotator;
        self
    }

    /// File-name prefix shared by every per-pair intermediate of this input.
    pub fn input_stem(&self) -> String {
        input_stem(&self.input)
    }
}

pub fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "input".to_string())
}

fn default_working_dir(input: &Path) -> PathBuf {
    std::env::temp_dir().join(format!("reannotate_{}", input_stem(input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReannotateConfig::new("/data/cohort.maf");
        assert_eq!(config.input_stem(), "cohort");
        assert!(config.working_dir.ends_with("reannotate_cohort"));
        assert_eq!(config.manifest, config.working_dir.join(DEFAULT_MANIFEST_FILE));
        assert_eq!(config.retain_columns.len(), DEFAULT_RETAIN_COLUMNS.len());
        assert!(config.output.is_none());
        assert!(!config.force);
    }

    #[test]
    fn test_working_dir_moves_manifest_unless_overridden() {
        let config = ReannotateConfig::new("in.maf").with_working_dir("/w");
        assert_eq!(config.manifest, PathBuf::from("/w").join(DEFAULT_MANIFEST_FILE));
        let config = config.with_manifest("/m/runs.tsv");
        assert_eq!(config.manifest, PathBuf::from("/m/runs.tsv"));
    }
}
