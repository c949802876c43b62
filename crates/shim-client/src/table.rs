//! Delimited-text table over a response body.
//!
//! Splitting happens lazily on first access. Blank rows are skipped, an
//! optional header row is consumed and discarded, and the column count
//! is fixed by the first data row: later mismatches are logged as
//! warnings, not failures. String cells from the shim keep their quote
//! characters; callers strip them with [`strip_quotes`].

use once_cell::unsync::OnceCell;
use scidb_common::{ShimError, ShimResult};
use std::any::type_name;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug)]
struct Parsed {
    rows: Vec<Vec<String>>,
    ncol: usize,
}

/// Lazily parsed rows/columns of string cells.
#[derive(Debug)]
pub struct TextTable {
    raw: String,
    col_sep: String,
    row_sep: String,
    header: bool,
    parsed: OnceCell<Parsed>,
}

impl TextTable {
    /// Comma/newline separated table.
    pub fn new(raw: impl Into<String>, header: bool) -> Self {
        Self::with_separators(raw, ",", "\n", header)
    }

    /// Table with explicit separators. Reference-metadata queries use
    /// the 3-character `','` column separator so commas inside quoted
    /// WKT text do not split cells.
    pub fn with_separators(
        raw: impl Into<String>,
        col_sep: impl Into<String>,
        row_sep: impl Into<String>,
        header: bool,
    ) -> Self {
        Self {
            raw: raw.into(),
            col_sep: col_sep.into(),
            row_sep: row_sep.into(),
            header,
            parsed: OnceCell::new(),
        }
    }

    fn parsed(&self) -> &Parsed {
        self.parsed.get_or_init(|| {
            let mut rows: Vec<Vec<String>> = Vec::new();
            let mut ncol = 0usize;

            let mut lines = self
                .raw
                .split(self.row_sep.as_str())
                .filter(|l| !l.trim().is_empty());
            if self.header {
                let _ = lines.next();
            }

            for (line_no, line) in lines.enumerate() {
                let cols: Vec<String> = line
                    .split(self.col_sep.as_str())
                    .map(str::to_string)
                    .collect();
                if ncol == 0 {
                    ncol = cols.len();
                } else if cols.len() != ncol {
                    warn!(
                        line = line_no + 1,
                        expected = ncol,
                        got = cols.len(),
                        "Unexpected number of columns in table row"
                    );
                }
                rows.push(cols);
            }

            Parsed { rows, ncol }
        })
    }

    /// Number of data rows (header excluded).
    pub fn nrow(&self) -> usize {
        self.parsed().rows.len()
    }

    /// Number of columns, as declared by the first data row.
    pub fn ncol(&self) -> usize {
        self.parsed().ncol
    }

    /// Raw string cell at (row, col).
    pub fn cell(&self, row: usize, col: usize) -> ShimResult<&str> {
        let parsed = self.parsed();
        let r = parsed.rows.get(row).ok_or(ShimError::CellOutOfRange {
            row,
            col,
            rows: parsed.rows.len(),
            cols: parsed.ncol,
        })?;
        r.get(col)
            .map(String::as_str)
            .ok_or(ShimError::CellOutOfRange {
                row,
                col,
                rows: parsed.rows.len(),
                cols: parsed.ncol,
            })
    }

    /// Cell at (row, col) cast to a scalar type.
    pub fn get<T: FromStr>(&self, row: usize, col: usize) -> ShimResult<T> {
        let raw = self.cell(row, col)?;
        raw.trim().parse().map_err(|_| ShimError::CellCast {
            row,
            col,
            value: raw.to_string(),
            target: type_name::<T>(),
        })
    }
}

/// Strip exactly one leading and one trailing quote character.
///
/// The shim renders string cells quoted; every call site works on the
/// stripped text.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix('\'').unwrap_or(s);
    s.strip_suffix('\'').unwrap_or(s)
}
