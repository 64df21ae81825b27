use anyhow::Context;
use clap::Parser;
use reannotate::{
    AnnotatorOptions, DepthColumns, Pipeline, ProcessCollaborator, ReannotateConfig,
    collaborator::DEFAULT_INTERPRETER, protocol::parse_column_list,
};
use std::{fs, path::PathBuf};
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

/// Reannotates a MAF: splits it into tumor/normal VCFs, re-runs effect
/// annotation per pair, and carries selected input columns into the result.
#[derive(Parser, Debug)]
#[command(name = "reannotate", version)]
struct Args {
    /// Input MAF to reannotate
    #[arg(long)]
    input_maf: PathBuf,

    /// Output MAF (default: stdout)
    #[arg(long)]
    output_maf: Option<PathBuf>,

    /// Working directory for intermediates (default: <temp>/reannotate_<input stem>)
    #[arg(long)]
    tmp_dir: Option<PathBuf>,

    /// Manifest of completed runs (default: <tmp-dir>/reannotate_manifest.tsv)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Reannotate even if the output is current
    #[arg(long)]
    force: bool,

    /// Comma-separated input columns to carry into the output
    #[arg(long)]
    retain_cols: Option<String>,

    #[arg(long, default_value = "t_depth")]
    tum_depth_col: String,

    #[arg(long, default_value = "t_ref_count")]
    tum_rad_col: String,

    #[arg(long, default_value = "t_alt_count")]
    tum_vad_col: String,

    #[arg(long, default_value = "n_depth")]
    nrm_depth_col: String,

    #[arg(long, default_value = "n_ref_count")]
    nrm_rad_col: String,

    #[arg(long, default_value = "n_alt_count")]
    nrm_vad_col: String,

    /// Splitter script (default: $REANNOTATE_SPLITTER, else maf2vcf.pl next to this binary)
    #[arg(long)]
    splitter: Option<PathBuf>,

    /// Annotator script (default: $REANNOTATE_ANNOTATOR, else vcf2maf.pl next to this binary)
    #[arg(long)]
    annotator: Option<PathBuf>,

    /// Interpreter for both scripts; pass "" to execute them directly
    #[arg(long, default_value = DEFAULT_INTERPRETER)]
    interpreter: String,

    #[arg(long)]
    vep_path: Option<PathBuf>,

    #[arg(long)]
    vep_data: Option<PathBuf>,

    /// Worker processes the annotator may fork
    #[arg(long, default_value_t = 4)]
    vep_forks: usize,

    #[arg(long)]
    ref_fasta: Option<PathBuf>,

    #[arg(long)]
    filter_vcf: Option<PathBuf>,

    #[arg(long, default_value = "homo_sapiens")]
    species: String,

    #[arg(long, default_value = "GRCh37")]
    ncbi_build: String,

    #[arg(long)]
    cache_version: Option<String>,

    #[arg(long, default_value_t = 5000)]
    buffer_size: usize,

    #[arg(long)]
    any_allele: bool,

    #[arg(long)]
    maf_center: Option<String>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> ReannotateConfig {
        let mut config = ReannotateConfig::new(&self.input_maf)
            .with_output(self.output_maf.clone())
            .with_force(self.force)
            .with_depth_columns(DepthColumns {
                tumor_depth: self.tum_depth_col.clone(),
                tumor_ref_count: self.tum_rad_col.clone(),
                tumor_alt_count: self.tum_vad_col.clone(),
                normal_depth: self.nrm_depth_col.clone(),
                normal_ref_count: self.nrm_rad_col.clone(),
                normal_alt_count: self.nrm_vad_col.clone(),
            })
            .with_annotator(AnnotatorOptions {
                vep_path: self.vep_path.clone(),
                vep_data: self.vep_data.clone(),
                vep_forks: self.vep_forks,
                ref_fasta: self.ref_fasta.clone(),
                filter_vcf: self.filter_vcf.clone(),
                species: self.species.clone(),
                ncbi_build: self.ncbi_build.clone(),
                cache_version: self.cache_version.clone(),
                buffer_size: self.buffer_size,
                any_allele: self.any_allele,
                maf_center: self.maf_center.clone(),
            });
        if let Some(tmp_dir) = &self.tmp_dir {
            config = config.with_working_dir(tmp_dir);
        }
        if let Some(manifest) = &self.manifest {
            config = config.with_manifest(manifest);
        }
        if let Some(raw) = &self.retain_cols {
            config = config.with_retain_columns(parse_column_list(raw));
        }
        config
    }
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {e}");
    }

    if let Err(e) = run(&args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let collaborator = ProcessCollaborator::resolve(
        Some(args.interpreter.as_str()),
        args.splitter.as_deref(),
        args.annotator.as_deref(),
    );
    let pipeline = Pipeline::new(args.to_config(), collaborator);
    let report = pipeline.run()?;

    if let Some(path) = &args.report {
        let text = serde_json::to_string_pretty(&report)?;
        fs::write(path, text)
            .with_context(|| format!("Could not write run report '{}'", path.display()))?;
    }
    Ok(())
}
