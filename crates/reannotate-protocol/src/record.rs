use crate::header::HeaderIndex;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt};

pub const CHROMOSOME_COLUMN: &str = "Chromosome";
pub const START_POSITION_COLUMN: &str = "Start_Position";
pub const TUMOR_SAMPLE_COLUMN: &str = "Tumor_Sample_Barcode";
pub const REFERENCE_ALLELE_COLUMN: &str = "Reference_Allele";
pub const TUMOR_ALLELE1_COLUMN: &str = "Tumor_Seq_Allele1";
pub const TUMOR_ALLELE2_COLUMN: &str = "Tumor_Seq_Allele2";

/// Columns a header must carry for rows to be keyed.
pub const KEY_COLUMNS: &[&str] = &[
    CHROMOSOME_COLUMN,
    START_POSITION_COLUMN,
    TUMOR_SAMPLE_COLUMN,
    REFERENCE_ALLELE_COLUMN,
    TUMOR_ALLELE1_COLUMN,
    TUMOR_ALLELE2_COLUMN,
];

/// Identity of one variant call, used to correlate rows across tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    pub chromosome: String,
    pub start_position: String,
    pub tumor_sample: String,
    pub reference_allele: String,
    pub variant_allele: String,
}

impl VariantKey {
    /// The variant allele is the first tumor allele differing from the
    /// reference; with neither differing, the second tumor allele is used.
    pub fn new(
        chromosome: &str,
        start_position: &str,
        tumor_sample: &str,
        reference_allele: &str,
        tumor_allele1: &str,
        tumor_allele2: &str,
    ) -> Self {
        let variant_allele = if tumor_allele1 != reference_allele {
            tumor_allele1
        } else {
            tumor_allele2
        };
        Self {
            chromosome: chromosome.to_string(),
            start_position: start_position.to_string(),
            tumor_sample: tumor_sample.to_string(),
            reference_allele: reference_allele.to_string(),
            variant_allele: variant_allele.to_string(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.chromosome,
            self.start_position,
            self.tumor_sample,
            self.reference_allele,
            self.variant_allele
        )
    }
}

/// Returns the key columns a header lacks.
pub fn missing_key_columns(header: &HeaderIndex) -> Vec<&'static str> {
    KEY_COLUMNS
        .iter()
        .copied()
        .filter(|name| !header.contains(name))
        .collect()
}

/// One table row bound to the header it was read under.
///
/// Fields are kept as raw bytes so values in any encoding are written back
/// unchanged; text views decode lossily.
#[derive(Debug, Clone)]
pub struct VariantRecord<'h> {
    header: &'h HeaderIndex,
    values: Vec<Vec<u8>>,
}

impl<'h> VariantRecord<'h> {
    pub fn from_line(header: &'h HeaderIndex, line: &str) -> Self {
        Self::from_bytes(header, line.as_bytes())
    }

    pub fn from_bytes(header: &'h HeaderIndex, line: &[u8]) -> Self {
        let values = trim_line_end(line)
            .split(|b| *b == b'\t')
            .map(<[u8]>::to_vec)
            .collect();
        Self { header, values }
    }

    pub fn header(&self) -> &HeaderIndex {
        self.header
    }

    /// Raw field by column name; absent columns and short rows read as empty.
    pub fn get_bytes(&self, name: &str) -> &[u8] {
        self.header
            .position(name)
            .and_then(|idx| self.values.get(idx))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Field value by column name, decoded lossily.
    pub fn get(&self, name: &str) -> Cow<'_, str> {
        String::from_utf8_lossy(self.get_bytes(name))
    }

    pub fn variant_key(&self) -> VariantKey {
        VariantKey::new(
            &self.get(CHROMOSOME_COLUMN),
            &self.get(START_POSITION_COLUMN),
            &self.get(TUMOR_SAMPLE_COLUMN),
            &self.get(REFERENCE_ALLELE_COLUMN),
            &self.get(TUMOR_ALLELE1_COLUMN),
            &self.get(TUMOR_ALLELE2_COLUMN),
        )
    }

    /// Re-lays the row out under `target`, filling columns this row lacks with "".
    pub fn project<'t>(&self, target: &'t HeaderIndex) -> VariantRecord<'t> {
        let values = target
            .columns()
            .iter()
            .map(|name| self.get_bytes(name).to_vec())
            .collect();
        VariantRecord {
            header: target,
            values,
        }
    }

    /// Sets a field by column name. Returns false if the header lacks the column.
    pub fn set(&mut self, name: &str, value: &[u8]) -> bool {
        let Some(idx) = self.header.position(name) else {
            return false;
        };
        if self.values.len() <= idx {
            self.values.resize(idx + 1, Vec::new());
        }
        self.values[idx] = value.to_vec();
        true
    }

    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }

    /// The row as tab-joined bytes, without a line terminator.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.values.join(&b'\t')
    }

    pub fn to_line(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}
