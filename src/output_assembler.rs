use crate::{
    error::{IoContext, ReannotateResult},
    table_io::{is_blank, read_lines, remove_file, write_line},
};
use reannotate_protocol::{HeaderIndex, VERSION_MARKER, is_comment_bytes, is_header_bytes};
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Writes the version marker, `header`, and the data lines of every table in
/// the given order. Each table is deleted once copied. Returns the number of
/// data lines written. Data lines are copied byte for byte.
pub fn assemble<W: Write>(
    tables: &[PathBuf],
    header: &HeaderIndex,
    sink: &mut W,
    sink_label: &Path,
) -> ReannotateResult<usize> {
    writeln!(sink, "{VERSION_MARKER}").with_path("write", sink_label)?;
    writeln!(sink, "{}", header.to_line()).with_path("write", sink_label)?;

    let mut rows = 0;
    for table in tables {
        let mut seen_header = false;
        for line in read_lines(table)? {
            let line = line?;
            if is_comment_bytes(&line) || is_blank(&line) {
                continue;
            }
            if !seen_header && is_header_bytes(&line) {
                seen_header = true;
                continue;
            }
            write_line(sink, &line, sink_label)?;
            rows += 1;
        }
        remove_file(table)?;
        tracing::debug!(table = %table.display(), "Folded per-pair table into output");
    }
    sink.flush().with_path("flush", sink_label)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_assemble_keeps_pair_and_row_order() {
        let td = tempdir().unwrap();
        let first = td.path().join("in.B_vs_N.vep.maf");
        let second = td.path().join("in.A_vs_N.vep.maf");
        fs::write(&first, "#version 2.4\nHugo_Symbol\tCenter\nTP53\tMSK\nKRAS\tMSK\n").unwrap();
        fs::write(&second, "#comment\nHugo_Symbol\tCenter\n\nEGFR\tBI\n").unwrap();

        let header = HeaderIndex::from_line("Hugo_Symbol\tCenter");
        let mut sink = Vec::new();
        let rows = assemble(
            &[first.clone(), second.clone()],
            &header,
            &mut sink,
            Path::new("<memory>"),
        )
        .unwrap();

        assert_eq!(rows, 3);
        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "#version 2.4\nHugo_Symbol\tCenter\nTP53\tMSK\nKRAS\tMSK\nEGFR\tBI\n"
        );
        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[test]
    fn test_assemble_copies_non_utf8_rows_verbatim() {
        let td = tempdir().unwrap();
        let table = td.path().join("in.T_vs_N.vep.maf");
        fs::write(
            &table,
            b"#source: Universit\xe4t\nHugo_Symbol\tCenter\nTP53\tM\xfcnchen\n",
        )
        .unwrap();
        let header = HeaderIndex::from_line("Hugo_Symbol\tCenter");
        let mut sink = Vec::new();
        let rows = assemble(&[table], &header, &mut sink, Path::new("<memory>")).unwrap();
        assert_eq!(rows, 1);
        assert_eq!(sink, b"#version 2.4\nHugo_Symbol\tCenter\nTP53\tM\xfcnchen\n");
    }

    #[test]
    fn test_assemble_without_tables_writes_header_only() {
        let header = HeaderIndex::from_line("Hugo_Symbol\tCenter");
        let mut sink = Vec::new();
        let rows = assemble(&[], &header, &mut sink, Path::new("<memory>")).unwrap();
        assert_eq!(rows, 0);
        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "#version 2.4\nHugo_Symbol\tCenter\n"
        );
    }
}
