//! External splitter and annotator stages, invoked as child processes.

use crate::{
    config::{AnnotatorOptions, DepthColumns},
    error::{ReannotateError, ReannotateResult},
};
use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Command, Output},
};

pub const DEFAULT_SPLITTER_SCRIPT: &str = "maf2vcf.pl";
pub const DEFAULT_ANNOTATOR_SCRIPT: &str = "vcf2maf.pl";
pub const SPLITTER_ENV_VAR: &str = "REANNOTATE_SPLITTER";
pub const ANNOTATOR_ENV_VAR: &str = "REANNOTATE_ANNOTATOR";
pub const DEFAULT_INTERPRETER: &str = "perl";

#[derive(Debug, Clone)]
pub struct SplitRequest<'a> {
    pub input: &'a Path,
    pub working_dir: &'a Path,
    pub ref_fasta: Option<&'a Path>,
    pub columns: &'a DepthColumns,
}

#[derive(Debug, Clone)]
pub struct AnnotateRequest<'a> {
    pub interchange: &'a Path,
    pub output: &'a Path,
    pub tumor_id: &'a str,
    pub normal_id: &'a str,
    pub options: &'a AnnotatorOptions,
}

/// The two transformation stages the pipeline delegates to.
pub trait Collaborator {
    /// Writes per-pair interchange files for `input` into the working directory.
    fn split(&self, request: &SplitRequest<'_>) -> ReannotateResult<()>;

    /// Writes one annotated table for one interchange file.
    fn annotate(&self, request: &AnnotateRequest<'_>) -> ReannotateResult<()>;

    /// Checked once before any processing starts.
    fn validate(&self) -> ReannotateResult<()> {
        Ok(())
    }
}

/// Runs the stages as scripts, optionally through an interpreter.
#[derive(Debug, Clone)]
pub struct ProcessCollaborator {
    pub interpreter: Option<String>,
    pub splitter: PathBuf,
    pub annotator: PathBuf,
}

impl ProcessCollaborator {
    /// Uses explicit script paths if given, else the environment, else the
    /// default script names next to the running executable.
    pub fn resolve(
        interpreter: Option<&str>,
        splitter: Option<&Path>,
        annotator: Option<&Path>,
    ) -> Self {
        Self {
            interpreter: interpreter
                .and_then(normalized_non_empty)
                .map(ToString::to_string),
            splitter: resolve_script(splitter, SPLITTER_ENV_VAR, DEFAULT_SPLITTER_SCRIPT),
            annotator: resolve_script(annotator, ANNOTATOR_ENV_VAR, DEFAULT_ANNOTATOR_SCRIPT),
        }
    }

    fn command_for(&self, script: &Path, args: &[OsString]) -> (String, Vec<OsString>) {
        let mut full_args = Vec::with_capacity(args.len() + 1);
        let program = match &self.interpreter {
            Some(interpreter) => {
                full_args.push(script.as_os_str().to_os_string());
                interpreter.clone()
            }
            None => script.to_string_lossy().into_owned(),
        };
        full_args.extend(args.iter().cloned());
        (program, full_args)
    }

    fn run(&self, stage: &'static str, script: &Path, args: &[OsString]) -> ReannotateResult<()> {
        let (program, full_args) = self.command_for(script, args);
        let rendered = render_command(&program, &full_args);
        tracing::info!(stage, command = %rendered, "Running collaborator");
        let output: Output = Command::new(&program)
            .args(&full_args)
            .output()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    ReannotateError::Config(format!(
                        "Could not run {stage}: '{program}' was not found"
                    ))
                } else {
                    ReannotateError::io(format!("Could not run {stage} command: {rendered}"), e)
                }
            })?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(ReannotateError::CollaboratorFailed {
                stage,
                command: rendered,
                status: output.status.code(),
                stderr,
            });
        }
        if let Some(stdout) = captured_text(&output.stdout) {
            tracing::debug!(stage, stdout = %stdout, "Collaborator output");
        }
        if let Some(stderr) = captured_text(stderr.as_bytes()) {
            tracing::debug!(stage, stderr = %stderr, "Collaborator diagnostics");
        }
        Ok(())
    }
}

impl Collaborator for ProcessCollaborator {
    /// Both scripts must exist.
    fn validate(&self) -> ReannotateResult<()> {
        for (stage, path, env_var) in [
            ("splitter", &self.splitter, SPLITTER_ENV_VAR),
            ("annotator", &self.annotator, ANNOTATOR_ENV_VAR),
        ] {
            if !path.is_file() {
                return Err(ReannotateError::ToolNotFound {
                    stage,
                    path: path.clone(),
                    env_var,
                });
            }
        }
        Ok(())
    }

    fn split(&self, request: &SplitRequest<'_>) -> ReannotateResult<()> {
        self.run("splitter", &self.splitter, &split_args(request))
    }

    fn annotate(&self, request: &AnnotateRequest<'_>) -> ReannotateResult<()> {
        self.run("annotator", &self.annotator, &annotate_args(request))
    }
}

fn push_flag(args: &mut Vec<OsString>, flag: &str, value: impl Into<OsString>) {
    args.push(OsString::from(flag));
    args.push(value.into());
}

pub fn split_args(request: &SplitRequest<'_>) -> Vec<OsString> {
    let mut args = Vec::new();
    push_flag(&mut args, "--input-maf", request.input);
    push_flag(&mut args, "--output-dir", request.working_dir);
    if let Some(ref_fasta) = request.ref_fasta {
        push_flag(&mut args, "--ref-fasta", ref_fasta);
    }
    args.push(OsString::from("--per-tn-vcfs"));
    let columns = request.columns;
    push_flag(&mut args, "--tum-depth-col", &columns.tumor_depth);
    push_flag(&mut args, "--tum-rad-col", &columns.tumor_ref_count);
    push_flag(&mut args, "--tum-vad-col", &columns.tumor_alt_count);
    push_flag(&mut args, "--nrm-depth-col", &columns.normal_depth);
    push_flag(&mut args, "--nrm-rad-col", &columns.normal_ref_count);
    push_flag(&mut args, "--nrm-vad-col", &columns.normal_alt_count);
    args
}

pub fn annotate_args(request: &AnnotateRequest<'_>) -> Vec<OsString> {
    let options = request.options;
    let mut args = Vec::new();
    push_flag(&mut args, "--input-vcf", request.interchange);
    push_flag(&mut args, "--output-maf", request.output);
    push_flag(&mut args, "--tumor-id", request.tumor_id);
    push_flag(&mut args, "--normal-id", request.normal_id);
    push_flag(&mut args, "--vcf-tumor-id", request.tumor_id);
    push_flag(&mut args, "--vcf-normal-id", request.normal_id);
    if let Some(vep_path) = &options.vep_path {
        push_flag(&mut args, "--vep-path", vep_path);
    }
    if let Some(vep_data) = &options.vep_data {
        push_flag(&mut args, "--vep-data", vep_data);
    }
    push_flag(&mut args, "--vep-forks", options.vep_forks.to_string());
    if let Some(ref_fasta) = &options.ref_fasta {
        push_flag(&mut args, "--ref-fasta", ref_fasta);
    }
    if let Some(filter_vcf) = &options.filter_vcf {
        push_flag(&mut args, "--filter-vcf", filter_vcf);
    }
    push_flag(&mut args, "--species", &options.species);
    push_flag(&mut args, "--ncbi-build", &options.ncbi_build);
    if let Some(cache_version) = &options.cache_version {
        push_flag(&mut args, "--cache-version", cache_version);
    }
    push_flag(&mut args, "--buffer-size", options.buffer_size.to_string());
    if options.any_allele {
        args.push(OsString::from("--any-allele"));
    }
    if let Some(center) = &options.maf_center {
        push_flag(&mut args, "--maf-center", center);
    }
    args
}

fn normalized_non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn resolve_script(explicit: Option<&Path>, env_var: &str, default_name: &str) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var(env_var)
        .ok()
        .as_deref()
        .and_then(normalized_non_empty)
    {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(default_name)))
        .unwrap_or_else(|| PathBuf::from(default_name))
}

/// Trimmed text of a captured stream, or `None` when it holds only whitespace.
fn captured_text(stream: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stream);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Shell-like rendering of a command line, for logs and error messages.
pub fn render_command(program: &str, args: &[OsString]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|arg| arg.to_string_lossy().into_owned()))
        .map(|part| {
            if part.is_empty() || part.contains(char::is_whitespace) {
                format!("'{part}'")
            } else {
                part
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_split_args_carry_depth_columns() {
        let columns = DepthColumns::default();
        let request = SplitRequest {
            input: Path::new("/data/in.maf"),
            working_dir: Path::new("/tmp/work"),
            ref_fasta: Some(Path::new("/ref/hg19.fa")),
            columns: &columns,
        };
        let rendered = render_command("perl", &split_args(&request));
        assert_eq!(
            rendered,
            "perl --input-maf /data/in.maf --output-dir /tmp/work --ref-fasta /ref/hg19.fa \
             --per-tn-vcfs --tum-depth-col t_depth --tum-rad-col t_ref_count \
             --tum-vad-col t_alt_count --nrm-depth-col n_depth --nrm-rad-col n_ref_count \
             --nrm-vad-col n_alt_count"
        );
    }

    #[test]
    fn test_annotate_args_include_pair_ids() {
        let options = AnnotatorOptions {
            vep_path: Some(PathBuf::from("/opt/vep")),
            any_allele: true,
            ..Default::default()
        };
        let request = AnnotateRequest {
            interchange: Path::new("/w/in.T1_vs_N1.vcf"),
            output: Path::new("/w/in.T1_vs_N1.vep.maf"),
            tumor_id: "T1",
            normal_id: "N1",
            options: &options,
        };
        let args: Vec<String> = annotate_args(&request)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let pos = args.iter().position(|a| a == "--tumor-id").unwrap();
        assert_eq!(args[pos + 1], "T1");
        let pos = args.iter().position(|a| a == "--normal-id").unwrap();
        assert_eq!(args[pos + 1], "N1");
        assert!(args.contains(&"--any-allele".to_string()));
        assert!(args.contains(&"/opt/vep".to_string()));
        assert!(!args.contains(&"--vep-data".to_string()));
    }

    #[test]
    fn test_captured_text_trims_and_skips_blank() {
        assert_eq!(captured_text(b"  wrote 3 VCFs\n"), Some("wrote 3 VCFs".to_string()));
        assert_eq!(captured_text(b"\n \t\n"), None);
        assert_eq!(captured_text(b""), None);
    }

    #[test]
    fn test_render_command_quotes_spaces() {
        let args = vec![OsString::from("a b"), OsString::from("")];
        assert_eq!(render_command("run", &args), "run 'a b' ''");
    }

    #[test]
    fn test_validate_reports_missing_script() {
        let td = tempdir().unwrap();
        let splitter = td.path().join("maf2vcf.pl");
        fs::write(&splitter, "#!/usr/bin/env perl\n").unwrap();
        let collaborator = ProcessCollaborator::resolve(
            Some("perl"),
            Some(&splitter),
            Some(&td.path().join("missing.pl")),
        );
        let err = collaborator.validate().unwrap_err();
        assert!(matches!(err, ReannotateError::ToolNotFound { stage: "annotator", .. }));
        assert!(err.to_string().contains(ANNOTATOR_ENV_VAR));
    }

    #[test]
    fn test_blank_interpreter_runs_script_directly() {
        let collaborator = ProcessCollaborator::resolve(
            Some("  "),
            Some(Path::new("/x/split.sh")),
            Some(Path::new("/x/annotate.sh")),
        );
        assert!(collaborator.interpreter.is_none());
        let (program, args) = collaborator.command_for(Path::new("/x/split.sh"), &[]);
        assert_eq!(program, "/x/split.sh");
        assert!(args.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_script_reports_exact_command() {
        let td = tempdir().unwrap();
        let script = td.path().join("split.sh");
        fs::write(&script, "echo boom >&2\nexit 3\n").unwrap();
        let collaborator = ProcessCollaborator {
            interpreter: Some("sh".to_string()),
            splitter: script.clone(),
            annotator: script.clone(),
        };
        let columns = DepthColumns::default();
        let request = SplitRequest {
            input: Path::new("in.maf"),
            working_dir: td.path(),
            ref_fasta: None,
            columns: &columns,
        };
        let err = collaborator.split(&request).unwrap_err();
        match err {
            ReannotateError::CollaboratorFailed {
                stage,
                command,
                status,
                stderr,
            } => {
                assert_eq!(stage, "splitter");
                assert!(command.starts_with(&format!("sh {} --input-maf in.maf", script.display())));
                assert_eq!(status, Some(3));
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
