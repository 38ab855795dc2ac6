//! Bounded previews of delimited text uploads.
//!
//! A preview keeps the header row, a limited sample of data rows and the
//! total number of data rows. It is what the user sees while composing a
//! pipeline; the full payload travels to the processing service untouched
//! inside a [`Dataset`].

use crate::config::DEFAULT_PREVIEW_ROWS;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Raw dataset payload as uploaded by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// File name sent along with the payload (e.g. "sales.csv").
    pub file_name: String,
    /// Full text content.
    pub contents: String,
}

impl Dataset {
    /// Create a dataset from in-memory text.
    ///
    /// Returns [`PipelineError::UnsupportedFile`] unless the name ends in `.csv`.
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        if !is_csv_name(&file_name) {
            return Err(PipelineError::UnsupportedFile(file_name));
        }

        Ok(Self {
            file_name,
            contents: contents.into(),
        })
    }

    /// Read a dataset from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        if !is_csv_name(&file_name) {
            return Err(PipelineError::UnsupportedFile(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        Ok(Self {
            file_name,
            contents,
        })
    }

    /// Parse a preview of this dataset with the default sample size.
    pub fn preview(&self) -> Result<DatasetPreview> {
        DatasetPreview::parse(&self.contents)
    }
}

fn is_csv_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Header row, sample rows and total row count of an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetPreview {
    /// Column names in file order. Duplicates are kept as distinct positions.
    pub headers: Vec<String>,
    /// Sample rows, aligned positionally to `headers`. Rows may be ragged.
    pub rows: Vec<Vec<String>>,
    /// Number of data rows in the whole payload, not just the sample.
    pub total_rows: usize,
}

impl DatasetPreview {
    /// Parse a preview keeping up to 20 sample rows.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with_limit(text, DEFAULT_PREVIEW_ROWS)
    }

    /// Parse a preview keeping up to `limit` sample rows.
    ///
    /// Lines are split on `\n`, `\r\n` or a lone `\r`, and lines that are
    /// blank after trimming are ignored everywhere, including in
    /// `total_rows`. The first remaining line is the header.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] when no non-blank line exists.
    pub fn parse_with_limit(text: &str, limit: usize) -> Result<Self> {
        let mut lines = text
            .split(['\n', '\r'])
            .filter(|line| !line.trim().is_empty());

        let headers = match lines.next() {
            Some(line) => split_row(line),
            None => return Err(PipelineError::EmptyInput),
        };

        let mut rows = Vec::with_capacity(limit.min(64));
        let mut total_rows = 0;
        for line in lines {
            if total_rows < limit {
                rows.push(split_row(line));
            }
            total_rows += 1;
        }

        debug!(
            "Parsed preview: {} columns, {} sample rows, {} total rows",
            headers.len(),
            rows.len(),
            total_rows
        );

        Ok(Self {
            headers,
            rows,
            total_rows,
        })
    }

    /// Cell at (`row`, `column`), or `""` when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

/// Split one line on commas that are outside double quotes.
///
/// Every `"` flips the in-quotes state and is dropped from the output; there
/// is no `""` escape, so `"say ""hi"""` comes out as `say hi`. Each field is
/// trimmed after extraction.
pub fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_row_quoted_delimiter() {
        assert_eq!(split_row(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn test_split_row_trims_fields() {
        assert_eq!(split_row("a, b ,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_row_empty_fields() {
        assert_eq!(split_row("B,"), vec!["B", ""]);
        assert_eq!(split_row(",,"), vec!["", "", ""]);
    }

    #[test]
    fn test_split_row_doubled_quotes_are_not_unescaped() {
        assert_eq!(split_row(r#"x,"say ""hi""",y"#), vec!["x", "say hi", "y"]);
    }

    #[test]
    fn test_parse_basic() {
        let preview = DatasetPreview::parse("name,age\nA,30\nB,\n").unwrap();
        assert_eq!(preview.headers, vec!["name", "age"]);
        assert_eq!(preview.rows, vec![vec!["A", "30"], vec!["B", ""]]);
        assert_eq!(preview.total_rows, 2);
    }

    #[test]
    fn test_parse_mixed_line_endings_and_blank_lines() {
        let text = "a,b\r\n1,2\r\n\r\n   \n3,4\r5,6";
        let preview = DatasetPreview::parse(text).unwrap();
        assert_eq!(preview.headers, vec!["a", "b"]);
        assert_eq!(preview.total_rows, 3);
        assert_eq!(preview.rows[2], vec!["5", "6"]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(
            DatasetPreview::parse(""),
            Err(PipelineError::EmptyInput)
        ));
        assert!(matches!(
            DatasetPreview::parse("  \n\r\n \t \n"),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn test_parse_header_only() {
        let preview = DatasetPreview::parse("x,y,z").unwrap();
        assert_eq!(preview.column_count(), 3);
        assert!(preview.rows.is_empty());
        assert_eq!(preview.total_rows, 0);
    }

    #[test]
    fn test_parse_sample_is_bounded_but_total_is_not() {
        let mut text = String::from("id\n");
        for i in 0..50 {
            text.push_str(&format!("{}\n", i));
        }

        let preview = DatasetPreview::parse(&text).unwrap();
        assert_eq!(preview.rows.len(), 20);
        assert_eq!(preview.total_rows, 50);
        assert_eq!(preview.rows[19], vec!["19"]);

        let preview = DatasetPreview::parse_with_limit(&text, 3).unwrap();
        assert_eq!(preview.rows.len(), 3);
        assert_eq!(preview.total_rows, 50);
    }

    #[test]
    fn test_total_rows_matches_non_blank_lines() {
        let inputs = ["a\n", "a\nb\n\nc", "\n\nh1,h2\n1,2\n  \n3,4\n"];
        for text in inputs {
            let non_blank = text.split(['\n', '\r']).filter(|l| !l.trim().is_empty()).count();
            let preview = DatasetPreview::parse(text).unwrap();
            assert!(!preview.headers.is_empty());
            assert_eq!(preview.total_rows, non_blank - 1, "input: {:?}", text);
        }
    }

    #[test]
    fn test_ragged_rows_and_duplicate_headers_pass_through() {
        let preview = DatasetPreview::parse("a,a,b\n1\n1,2,3,4").unwrap();
        assert_eq!(preview.headers, vec!["a", "a", "b"]);
        assert_eq!(preview.rows[0], vec!["1"]);
        assert_eq!(preview.rows[1].len(), 4);
        assert_eq!(preview.cell(0, 2), "");
        assert_eq!(preview.cell(1, 2), "3");
        assert_eq!(preview.cell(9, 0), "");
    }

    #[test]
    fn test_dataset_rejects_non_csv() {
        assert!(matches!(
            Dataset::new("report.xlsx", "a,b"),
            Err(PipelineError::UnsupportedFile(_))
        ));
        assert!(Dataset::new("DATA.CSV", "a,b").is_ok());
    }

    #[test]
    fn test_dataset_preview() {
        let dataset = Dataset::new("people.csv", "name,age\nA,30\n").unwrap();
        let preview = dataset.preview().unwrap();
        assert_eq!(preview.headers, vec!["name", "age"]);
        assert_eq!(preview.total_rows, 1);
    }
}
