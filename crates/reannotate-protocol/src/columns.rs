//! Column classification for reannotated variant tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Columns the annotator always produces fresh. Retained values never land here.
pub const FORCE_NEW_COLUMNS: &[&str] = &[
    "Hugo_Symbol",
    "Entrez_Gene_Id",
    "NCBI_Build",
    "Chromosome",
    "Start_Position",
    "End_Position",
    "Strand",
    "Variant_Classification",
    "Variant_Type",
    "Reference_Allele",
    "Tumor_Seq_Allele1",
    "Tumor_Seq_Allele2",
    "dbSNP_RS",
    "dbSNP_Val_Status",
    "Tumor_Sample_Barcode",
    "Matched_Norm_Sample_Barcode",
    "Match_Norm_Seq_Allele1",
    "Match_Norm_Seq_Allele2",
    "Tumor_Sample_UUID",
    "Matched_Norm_Sample_UUID",
    "HGVSc",
    "HGVSp",
    "HGVSp_Short",
    "Transcript_ID",
    "Exon_Number",
    "t_depth",
    "t_ref_count",
    "t_alt_count",
    "n_depth",
    "n_ref_count",
    "n_alt_count",
    "all_effects",
    "Allele",
    "Gene",
    "Feature",
    "Feature_type",
    "Consequence",
    "cDNA_position",
    "CDS_position",
    "Protein_position",
    "Amino_acids",
    "Codons",
    "Existing_variation",
    "ALLELE_NUM",
    "DISTANCE",
    "STRAND_VEP",
    "SYMBOL",
    "SYMBOL_SOURCE",
    "HGNC_ID",
    "BIOTYPE",
    "CANONICAL",
    "CCDS",
    "ENSP",
    "SWISSPROT",
    "TREMBL",
    "UNIPARC",
    "RefSeq",
    "SIFT",
    "PolyPhen",
    "EXON",
    "INTRON",
    "DOMAINS",
    "AF",
    "AFR_AF",
    "AMR_AF",
    "ASN_AF",
    "EAS_AF",
    "EUR_AF",
    "SAS_AF",
    "AA_AF",
    "EA_AF",
    "CLIN_SIG",
    "SOMATIC",
    "PUBMED",
    "MOTIF_NAME",
    "MOTIF_POS",
    "HIGH_INF_POS",
    "MOTIF_SCORE_CHANGE",
    "IMPACT",
    "PICK",
    "VARIANT_CLASS",
    "TSL",
    "HGVS_OFFSET",
    "PHENO",
    "MINIMISED",
    "ExAC_AF",
    "ExAC_AF_Adj",
    "ExAC_AF_AFR",
    "ExAC_AF_AMR",
    "ExAC_AF_EAS",
    "ExAC_AF_FIN",
    "ExAC_AF_NFE",
    "ExAC_AF_OTH",
    "ExAC_AF_SAS",
    "GENE_PHENO",
    "FILTER",
    "flanking_bps",
    "vcf_id",
    "vcf_qual",
    "gnomAD_AF",
    "gnomAD_AFR_AF",
    "gnomAD_AMR_AF",
    "gnomAD_ASJ_AF",
    "gnomAD_EAS_AF",
    "gnomAD_FIN_AF",
    "gnomAD_NFE_AF",
    "gnomAD_OTH_AF",
    "gnomAD_SAS_AF",
    "vcf_pos",
];

/// Provenance and validation metadata carried over from the input by default.
pub const DEFAULT_RETAIN_COLUMNS: &[&str] = &[
    "Center",
    "Verification_Status",
    "Validation_Status",
    "Mutation_Status",
    "Sequencing_Phase",
    "Sequence_Source",
    "Validation_Method",
    "Score",
    "BAM_File",
    "Sequencer",
];

/// Leading field names that mark a line as the table header.
pub const HEADER_LEADERS: &[&str] = &["Hugo_Symbol", "Chromosome"];

pub const COMMENT_PREFIX: char = '#';

pub fn is_comment_line(line: &str) -> bool {
    line.starts_with(COMMENT_PREFIX)
}

pub fn is_header_line(line: &str) -> bool {
    let leading = line.split('\t').next().unwrap_or_default().trim();
    HEADER_LEADERS
        .iter()
        .any(|leader| leading.eq_ignore_ascii_case(leader))
}

/// Byte-level [`is_comment_line`], for lines that may not be valid UTF-8.
pub fn is_comment_bytes(line: &[u8]) -> bool {
    line.first() == Some(&(COMMENT_PREFIX as u8))
}

pub fn is_header_bytes(line: &[u8]) -> bool {
    is_header_line(&String::from_utf8_lossy(line))
}

/// Splits a comma-separated column list, dropping blanks.
pub fn parse_column_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnClass {
    ForceNew,
    Retainable,
    Unclassified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredColumn {
    pub name: String,
    pub class: ColumnClass,
}

/// Ordered registry of known column names and how the merge treats them.
///
/// Force-new entries come first in their fixed order, followed by the
/// requested retain columns in the order given. A requested name that is
/// already force-new keeps its force-new tag and is reported by
/// [`ColumnRegistry::rejected_retain_columns`].
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    entries: Vec<RegisteredColumn>,
    lookup: HashMap<String, usize>,
    rejected: Vec<String>,
}

impl ColumnRegistry {
    pub fn new<S: AsRef<str>>(retain_columns: &[S]) -> Self {
        let mut registry = Self::default();
        for name in FORCE_NEW_COLUMNS {
            registry.push(name, ColumnClass::ForceNew);
        }
        for name in retain_columns {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            match registry.classify(name) {
                ColumnClass::ForceNew => registry.rejected.push(name.to_string()),
                ColumnClass::Retainable => {}
                ColumnClass::Unclassified => registry.push(name, ColumnClass::Retainable),
            }
        }
        registry
    }

    pub fn with_default_retain_columns() -> Self {
        Self::new(DEFAULT_RETAIN_COLUMNS)
    }

    fn push(&mut self, name: &str, class: ColumnClass) {
        let key = name.to_ascii_lowercase();
        if self.lookup.contains_key(&key) {
            return;
        }
        self.lookup.insert(key, self.entries.len());
        self.entries.push(RegisteredColumn {
            name: name.to_string(),
            class,
        });
    }

    pub fn classify(&self, name: &str) -> ColumnClass {
        self.lookup
            .get(&name.to_ascii_lowercase())
            .map(|idx| self.entries[*idx].class)
            .unwrap_or(ColumnClass::Unclassified)
    }

    pub fn is_force_new(&self, name: &str) -> bool {
        self.classify(name) == ColumnClass::ForceNew
    }

    /// Retainable columns, in the order they were requested.
    pub fn retain_columns(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.class == ColumnClass::Retainable)
            .map(|entry| entry.name.as_str())
    }

    /// Requested retain columns that collide with a force-new column.
    pub fn rejected_retain_columns(&self) -> &[String] {
        &self.rejected
    }

    pub fn entries(&self) -> &[RegisteredColumn] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_new_wins_over_retain_request() {
        let registry = ColumnRegistry::new(&["Center", "hugo_symbol", "Score"]);
        assert_eq!(registry.classify("Hugo_Symbol"), ColumnClass::ForceNew);
        assert_eq!(registry.classify("CENTER"), ColumnClass::Retainable);
        assert_eq!(registry.classify("My_Notes"), ColumnClass::Unclassified);
        assert_eq!(registry.rejected_retain_columns(), &["hugo_symbol".to_string()]);
        let retained: Vec<&str> = registry.retain_columns().collect();
        assert_eq!(retained, vec!["Center", "Score"]);
    }

    #[test]
    fn test_duplicate_retain_requests_collapse() {
        let registry = ColumnRegistry::new(&["Center", "center", " ", "Score"]);
        let retained: Vec<&str> = registry.retain_columns().collect();
        assert_eq!(retained, vec!["Center", "Score"]);
    }

    #[test]
    fn test_default_retain_columns_are_not_force_new() {
        let registry = ColumnRegistry::with_default_retain_columns();
        assert!(registry.rejected_retain_columns().is_empty());
        assert_eq!(registry.retain_columns().count(), DEFAULT_RETAIN_COLUMNS.len());
    }

    #[test]
    fn test_header_and_comment_detection() {
        assert!(is_header_line("Hugo_Symbol\tEntrez_Gene_Id"));
        assert!(is_header_line("chromosome\tStart_Position"));
        assert!(!is_header_line("TP53\t7157"));
        assert!(is_comment_line("#version 2.4"));
        assert!(!is_comment_line("Hugo_Symbol"));
        assert!(is_comment_bytes(b"#source: Universit\xe4t"));
        assert!(is_header_bytes(b"Hugo_Symbol\tCenter\xff"));
        assert!(!is_header_bytes(b"\xffHugo_Symbol"));
    }

    #[test]
    fn test_parse_column_list() {
        assert_eq!(
            parse_column_list("Center, Score,,Sequencer "),
            vec!["Center", "Score", "Sequencer"]
        );
        assert!(parse_column_list("").is_empty());
    }
}
