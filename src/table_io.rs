use crate::error::{IoContext, ReannotateError, ReannotateResult};
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// Iterates the raw lines of a table without their `\n` / `\r\n`
/// terminators, with I/O errors tagged by path. Lines need not be UTF-8.
pub(crate) fn read_lines(
    path: &Path,
) -> ReannotateResult<impl Iterator<Item = ReannotateResult<Vec<u8>>>> {
    let file = File::open(path).with_path("open", path)?;
    let owned = path.to_path_buf();
    Ok(BufReader::new(file).split(b'\n').map(move |line| {
        let mut line = line.with_path("read", &owned)?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(line)
    }))
}

/// Writes `line` followed by `\n`.
pub(crate) fn write_line<W: Write>(
    sink: &mut W,
    line: &[u8],
    path: &Path,
) -> ReannotateResult<()> {
    sink.write_all(line)
        .and_then(|()| sink.write_all(b"\n"))
        .with_path("write", path)
}

pub(crate) fn is_blank(line: &[u8]) -> bool {
    line.trim_ascii().is_empty()
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Temporary file next to `path`, so the final rename stays on one filesystem.
pub(crate) fn sibling_temp_file(path: &Path) -> ReannotateResult<NamedTempFile> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).with_path("create directory", &dir)?;
    NamedTempFile::new_in(&dir).with_path("create temporary file in", &dir)
}

/// Moves a finished temporary file over `path`.
pub(crate) fn replace_with(tmp: NamedTempFile, path: &Path) -> ReannotateResult<()> {
    tmp.persist(path).map_err(|e| {
        ReannotateError::io(format!("Could not replace '{}'", path.display()), e.error)
    })?;
    Ok(())
}

pub(crate) fn remove_file(path: &Path) -> ReannotateResult<()> {
    fs::remove_file(path).with_path("remove", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replace_with_swaps_content() {
        let td = tempdir().unwrap();
        let target = td.path().join("table.maf");
        fs::write(&target, "old\n").unwrap();
        let mut tmp = sibling_temp_file(&target).unwrap();
        tmp.write_all(b"new\n").unwrap();
        replace_with(tmp, &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new\n");
        assert_eq!(fs::read_dir(td.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_read_lines_reports_path() {
        let td = tempdir().unwrap();
        let err = read_lines(&td.path().join("missing.maf")).err().unwrap();
        assert!(err.to_string().contains("missing.maf"));
    }

    #[test]
    fn test_read_lines_passes_bytes_through() {
        let td = tempdir().unwrap();
        let path = td.path().join("latin1.maf");
        fs::write(&path, b"#source: Universit\xe4t\r\nTP53\tM\xfcnchen\n\nlast").unwrap();
        let lines: Vec<Vec<u8>> = read_lines(&path).unwrap().map(Result::unwrap).collect();
        assert_eq!(
            lines,
            vec![
                b"#source: Universit\xe4t".to_vec(),
                b"TP53\tM\xfcnchen".to_vec(),
                Vec::new(),
                b"last".to_vec(),
            ]
        );
        assert!(is_blank(&lines[2]));

        let mut sink = Vec::new();
        write_line(&mut sink, &lines[1], &path).unwrap();
        assert_eq!(sink, b"TP53\tM\xfcnchen\n");
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("out.maf")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/tmp/out.maf")), PathBuf::from("/tmp"));
    }
}
