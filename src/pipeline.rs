//! Sequences split, per-pair annotation, retention merge, assembly and the
//! manifest update for one input table.

use crate::{
    collaborator::{AnnotateRequest, Collaborator, SplitRequest},
    column_merge::{apply_retention, build_retention_table},
    config::ReannotateConfig,
    error::{IoContext, ReannotateError, ReannotateResult},
    fingerprint::is_non_empty_file,
    output_assembler::assemble,
    staleness_cache::{StalenessCache, canonical_or_display},
    table_io::{remove_file, replace_with, sibling_temp_file},
};
use reannotate_protocol::ColumnRegistry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub const INTERCHANGE_EXTENSION: &str = "vcf";
/// Marker the annotator puts before the extension of files it produced.
pub const ANNOTATED_MARKER: &str = "vep";
pub const TABLE_EXTENSION: &str = "maf";

/// One tumor/normal pair found in the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePair {
    pub tumor_id: String,
    pub normal_id: String,
    pub interchange: PathBuf,
    pub annotated: PathBuf,
}

impl SamplePair {
    pub fn name(&self) -> String {
        format!("{}_vs_{}", self.tumor_id, self.normal_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub input: String,
    pub output: Option<String>,
    pub skipped: bool,
    pub pairs: Vec<String>,
    pub retention_keys: usize,
    pub rows_written: usize,
    pub retained_rows: usize,
    pub unknown_key_rows: usize,
    pub manifest_updated: bool,
}

/// Lists the interchange files the splitter left for `stem`, in file-name
/// order. Files already carrying the annotated marker are ignored.
pub fn discover_pairs(working_dir: &Path, stem: &str) -> ReannotateResult<Vec<SamplePair>> {
    let pattern = format!(
        r"^{}\.(.+)_vs_(.+)\.{INTERCHANGE_EXTENSION}$",
        regex::escape(stem)
    );
    let re = Regex::new(&pattern)
        .map_err(|e| ReannotateError::Config(format!("Bad pair file pattern '{pattern}': {e}")))?;
    let annotated_suffix = format!(".{ANNOTATED_MARKER}.{INTERCHANGE_EXTENSION}");

    let mut names = Vec::new();
    for entry in fs::read_dir(working_dir).with_path("list working directory", working_dir)? {
        let entry = entry.with_path("list working directory", working_dir)?;
        let file_type = entry
            .file_type()
            .with_path("read file type of", &entry.path())?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if file_type.is_file() && !name.ends_with(&annotated_suffix) {
            names.push(name);
        }
    }
    names.sort_unstable();

    let mut pairs = Vec::new();
    for name in names {
        let Some(caps) = re.captures(&name) else {
            continue;
        };
        let tumor_id = caps[1].to_string();
        let normal_id = caps[2].to_string();
        let annotated = working_dir.join(format!(
            "{stem}.{tumor_id}_vs_{normal_id}.{ANNOTATED_MARKER}.{TABLE_EXTENSION}"
        ));
        pairs.push(SamplePair {
            interchange: working_dir.join(&name),
            annotated,
            tumor_id,
            normal_id,
        });
    }
    Ok(pairs)
}

pub struct Pipeline<C: Collaborator> {
    config: ReannotateConfig,
    collaborator: C,
}

impl<C: Collaborator> Pipeline<C> {
    pub fn new(config: ReannotateConfig, collaborator: C) -> Self {
        Self {
            config,
            collaborator,
        }
    }

    pub fn config(&self) -> &ReannotateConfig {
        &self.config
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    /// Runs the pipeline, writing to stdout when no output path is configured.
    pub fn run(&self) -> ReannotateResult<RunReport> {
        let stdout = std::io::stdout();
        let mut sink = BufWriter::new(stdout.lock());
        self.run_to(&mut sink)
    }

    /// Runs the pipeline; `fallback` receives the table when no output path is configured.
    pub fn run_to<W: Write>(&self, fallback: &mut W) -> ReannotateResult<RunReport> {
        let config = &self.config;
        self.check_config()?;
        let mut report = RunReport {
            input: canonical_or_display(&config.input),
            output: config.output.as_deref().map(canonical_or_display),
            ..Default::default()
        };

        let cache = StalenessCache::new(&config.manifest);
        if let Some(output) = &config.output {
            if !config.force && cache.should_skip(&config.input, output)? {
                tracing::warn!(
                    input = %config.input.display(),
                    output = %output.display(),
                    "Output is already current for this input; skipping. Use --force to reannotate"
                );
                report.skipped = true;
                return Ok(report);
            }
        }

        self.collaborator.split(&SplitRequest {
            input: &config.input,
            working_dir: &config.working_dir,
            ref_fasta: config.annotator.ref_fasta.as_deref(),
            columns: &config.depth_columns,
        })?;

        let stem = config.input_stem();
        let pairs = discover_pairs(&config.working_dir, &stem)?;
        tracing::info!(pairs = pairs.len(), "Splitter produced tumor/normal pairs");
        let whole_table = config
            .working_dir
            .join(format!("{stem}.{INTERCHANGE_EXTENSION}"));
        if whole_table.is_file() {
            remove_file(&whole_table)?;
        }
        for pair in &pairs {
            self.annotate_pair(pair)?;
            report.pairs.push(pair.name());
        }

        let registry = ColumnRegistry::new(&config.retain_columns);
        let retention = build_retention_table(&config.input, &registry)?;
        let tables: Vec<PathBuf> = pairs.iter().map(|p| p.annotated.clone()).collect();
        let merge = apply_retention(&tables, &retention, &registry)?;
        report.retention_keys = retention.len();
        report.retained_rows = merge.retained_rows;
        report.unknown_key_rows = merge.unknown_key_rows;
        let header = merge.unified_header.unwrap_or_else(|| {
            retention
                .source_header()
                .with_appended(retention.columns())
        });

        report.rows_written = match &config.output {
            Some(output) => {
                let tmp = sibling_temp_file(output)?;
                let rows = {
                    let mut sink = BufWriter::new(tmp.as_file());
                    assemble(&tables, &header, &mut sink, output)?
                };
                replace_with(tmp, output)?;
                rows
            }
            None => assemble(&tables, &header, fallback, Path::new("<stdout>"))?,
        };
        tracing::info!(rows = report.rows_written, "Assembled reannotated table");

        if let Some(output) = &config.output {
            if is_non_empty_file(output) {
                cache.record(&config.input, output)?;
                report.manifest_updated = true;
            }
        }
        Ok(report)
    }

    fn check_config(&self) -> ReannotateResult<()> {
        let config = &self.config;
        if !is_non_empty_file(&config.input) {
            return Err(ReannotateError::Config(format!(
                "Input table '{}' does not exist or is empty",
                config.input.display()
            )));
        }
        if let Some(output) = &config.output {
            if canonical_or_display(output) == canonical_or_display(&config.input) {
                return Err(ReannotateError::Config(
                    "Output table must differ from the input table".to_string(),
                ));
            }
        }
        if config.working_dir.exists() && !config.working_dir.is_dir() {
            return Err(ReannotateError::Config(format!(
                "Working directory '{}' exists and is not a directory",
                config.working_dir.display()
            )));
        }
        fs::create_dir_all(&config.working_dir)
            .with_path("create working directory", &config.working_dir)?;
        self.collaborator.validate()
    }

    fn annotate_pair(&self, pair: &SamplePair) -> ReannotateResult<()> {
        tracing::info!(tumor = %pair.tumor_id, normal = %pair.normal_id, "Annotating pair");
        self.collaborator.annotate(&AnnotateRequest {
            interchange: &pair.interchange,
            output: &pair.annotated,
            tumor_id: &pair.tumor_id,
            normal_id: &pair.normal_id,
            options: &self.config.annotator,
        })?;
        if !pair.annotated.is_file() {
            return Err(ReannotateError::invalid_table(
                &pair.annotated,
                "annotator reported success but did not write the table",
            ));
        }
        remove_file(&pair.interchange)?;
        // the annotator leaves its own annotated interchange file next to the input
        let by_product = pair.interchange.with_extension(format!(
            "{ANNOTATED_MARKER}.{INTERCHANGE_EXTENSION}"
        ));
        if by_product.is_file() {
            remove_file(&by_product)?;
        }
        Ok(())
    }
}
