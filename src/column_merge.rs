//! Carries retained columns from the original input onto freshly annotated
//! per-pair tables, matching rows by variant key.

use crate::{
    error::{IoContext, ReannotateError, ReannotateResult},
    table_io::{is_blank, read_lines, replace_with, sibling_temp_file, write_line},
};
use reannotate_protocol::{
    ColumnRegistry, HeaderIndex, VariantKey, VariantRecord, is_comment_bytes, is_header_bytes,
    missing_key_columns,
};
use std::{
    collections::HashMap,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Original-input values of the retainable columns, per variant key.
#[derive(Debug, Clone, Default)]
pub struct RetentionTable {
    columns: Vec<String>,
    source_header: HeaderIndex,
    rows: HashMap<VariantKey, HashMap<String, Vec<u8>>>,
}

impl RetentionTable {
    /// Recorded raw value; `Some(b"")` means the input had this key with a
    /// blank field.
    pub fn get(&self, key: &VariantKey, column: &str) -> Option<&[u8]> {
        self.rows
            .get(key)
            .and_then(|values| values.get(&column.to_ascii_lowercase()))
            .map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &VariantKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Retainable columns, in requested order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Header of the original input table.
    pub fn source_header(&self) -> &HeaderIndex {
        &self.source_header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn insert(&mut self, key: VariantKey, values: HashMap<String, Vec<u8>>) {
        self.rows.insert(key, values);
    }
}

/// Reads the original input once and records every retainable column per key.
///
/// Requested columns that are force-new, or missing from the input header,
/// are reported as warnings. Missing columns are still recorded as blank.
pub fn build_retention_table(
    input: &Path,
    registry: &ColumnRegistry,
) -> ReannotateResult<RetentionTable> {
    for rejected in registry.rejected_retain_columns() {
        tracing::warn!(
            column = %rejected,
            "Requested retain column is always annotated fresh and will not be retained"
        );
    }

    let mut table = RetentionTable {
        columns: registry.retain_columns().map(ToString::to_string).collect(),
        ..Default::default()
    };
    let mut header: Option<HeaderIndex> = None;

    for line in read_lines(input)? {
        let line = line?;
        if is_comment_bytes(&line) || is_blank(&line) {
            continue;
        }
        let Some(current) = header.as_ref() else {
            if is_header_bytes(&line) {
                let found = HeaderIndex::from_bytes(&line);
                check_key_columns(input, &found)?;
                for column in &table.columns {
                    if !found.contains(column) {
                        tracing::warn!(
                            column = %column,
                            input = %input.display(),
                            "Requested retain column is missing from the input and will be left blank"
                        );
                    }
                }
                header = Some(found);
            } else {
                tracing::debug!(input = %input.display(), "Skipping line before header");
            }
            continue;
        };

        let record = VariantRecord::from_bytes(current, &line);
        let values = table
            .columns
            .iter()
            .map(|column| (column.to_ascii_lowercase(), record.get_bytes(column).to_vec()))
            .collect();
        table.insert(record.variant_key(), values);
    }

    table.source_header =
        header.ok_or_else(|| ReannotateError::invalid_table(input, "no header line found"))?;
    tracing::info!(
        input = %input.display(),
        keys = table.len(),
        columns = table.columns.len(),
        "Built retention table"
    );
    Ok(table)
}

#[derive(Debug, Clone, Default)]
pub struct MergeSummary {
    /// Header every reconciled table now carries; `None` without tables.
    pub unified_header: Option<HeaderIndex>,
    pub rows: usize,
    pub retained_rows: usize,
    pub unknown_key_rows: usize,
}

/// Rewrites each annotated table in place under one unified header, copying
/// recorded values into every column that is not force-new.
pub fn apply_retention(
    tables: &[PathBuf],
    retention: &RetentionTable,
    registry: &ColumnRegistry,
) -> ReannotateResult<MergeSummary> {
    let Some(first) = tables.first() else {
        return Ok(MergeSummary::default());
    };
    let unified = read_header(first)?.with_appended(retention.columns());
    let overridable: Vec<&str> = unified
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|column| !registry.is_force_new(column))
        .collect();

    let mut summary = MergeSummary::default();
    for path in tables {
        rewrite_table(path, &unified, &overridable, retention, &mut summary)?;
    }
    if summary.unknown_key_rows > 0 {
        tracing::warn!(
            rows = summary.unknown_key_rows,
            "Annotated rows without a matching input variant kept their annotated values"
        );
    }
    summary.unified_header = Some(unified);
    Ok(summary)
}

fn check_key_columns(path: &Path, header: &HeaderIndex) -> ReannotateResult<()> {
    let missing = missing_key_columns(header);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReannotateError::invalid_table(
            path,
            format!("header lacks key columns: {}", missing.join(", ")),
        ))
    }
}

fn read_header(path: &Path) -> ReannotateResult<HeaderIndex> {
    for line in read_lines(path)? {
        let line = line?;
        if !is_comment_bytes(&line) && is_header_bytes(&line) {
            return Ok(HeaderIndex::from_bytes(&line));
        }
    }
    Err(ReannotateError::invalid_table(path, "no header line found"))
}

fn rewrite_table(
    path: &Path,
    unified: &HeaderIndex,
    overridable: &[&str],
    retention: &RetentionTable,
    summary: &mut MergeSummary,
) -> ReannotateResult<()> {
    let tmp = sibling_temp_file(path)?;
    let mut rows = 0;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        let mut header: Option<HeaderIndex> = None;
        for line in read_lines(path)? {
            let line = line?;
            if is_comment_bytes(&line) {
                write_line(&mut writer, &line, path)?;
                continue;
            }
            if is_blank(&line) {
                continue;
            }
            let Some(current) = header.as_ref() else {
                if !is_header_bytes(&line) {
                    return Err(ReannotateError::invalid_table(path, "data line before header"));
                }
                let found = HeaderIndex::from_bytes(&line);
                check_key_columns(path, &found)?;
                header = Some(found);
                writeln!(writer, "{}", unified.to_line()).with_path("write", path)?;
                continue;
            };

            let record = VariantRecord::from_bytes(current, &line);
            let key = record.variant_key();
            let mut merged = record.project(unified);
            if retention.contains_key(&key) {
                for column in overridable {
                    if let Some(value) = retention.get(&key, column) {
                        merged.set(column, value);
                    }
                }
                summary.retained_rows += 1;
            } else {
                tracing::debug!(key = %key, table = %path.display(), "No input row for variant");
                summary.unknown_key_rows += 1;
            }
            write_line(&mut writer, &merged.to_bytes(), path)?;
            rows += 1;
        }
        if header.is_none() {
            return Err(ReannotateError::invalid_table(path, "no header line found"));
        }
        writer.flush().with_path("write", path)?;
    }
    replace_with(tmp, path)?;
    summary.rows += rows;
    tracing::debug!(table = %path.display(), rows, "Reconciled per-pair table");
    Ok(())
}
