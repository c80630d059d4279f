//! Newline-delimited JSON files
//!
//! Every artifact the sync exchanges with the platform (staged payloads, bulk
//! results, the inventory snapshot) and every audit file it leaves behind is
//! NDJSON: one JSON document per line. Readers skip blank lines because the
//! platform terminates its result files with a trailing newline.

use crate::error::{CommonError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Write `items` to `path`, one JSON document per line.
///
/// Parent directories are created as needed and an existing file is replaced.
/// Returns the number of lines written.
pub fn write_lines<P, I, T>(path: P, items: I) -> Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = T>,
    T: Serialize,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut count = 0usize;
    serde_jsonlines::write_json_lines(path, items.into_iter().inspect(|_| count += 1))?;

    debug!(path = %path.display(), lines = count, "Wrote NDJSON file");
    Ok(count)
}

/// Read every non-blank line of `path` as a `T`.
pub fn read_lines<T, P>(path: P) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let mut out = Vec::new();
    for_each_line(path, |item: T| {
        out.push(item);
        Ok(())
    })?;
    Ok(out)
}

/// Stream `path` line by line, handing each decoded document to `f`.
///
/// Decoding stops at the first malformed line; the error names the 1-based
/// line number.
pub fn for_each_line<T, P, F>(path: P, mut f: F) -> Result<usize>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
    F: FnMut(T) -> Result<()>,
{
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let item = serde_json::from_str(trimmed).map_err(|source| CommonError::MalformedLine {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        f(item)?;
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        sku: String,
        quantity: i64,
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/rows.jsonl");

        let rows = vec![
            Row { sku: "A1".into(), quantity: 5 },
            Row { sku: "B2".into(), quantity: 0 },
        ];
        let written = write_lines(&path, &rows).unwrap();
        assert_eq!(written, 2);

        let read: Vec<Row> = read_lines(&path).unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        std::fs::write(
            &path,
            "{\"sku\":\"A1\",\"quantity\":1}\n\n{\"sku\":\"A2\",\"quantity\":2}\n",
        )
        .unwrap();

        let read: Vec<Row> = read_lines(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].sku, "A2");
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        std::fs::write(&path, "{\"sku\":\"A1\",\"quantity\":1}\nnot json\n").unwrap();

        let err = read_lines::<Row, _>(&path).unwrap_err();
        match err {
            CommonError::MalformedLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_lines::<Row, _>("/definitely/not/here.jsonl").unwrap_err();
        assert!(matches!(err, CommonError::Io(_)));
    }
}
