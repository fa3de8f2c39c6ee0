use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid number '{value}' in column '{column}' at row {row}")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// How a CSV file is turned into a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Whether the first record names the columns. Header-less files get columns `0..n`.
    pub has_headers: bool,
    /// Number of data rows dropped from the top (the header is never counted).
    pub skip_rows: usize,
    /// Maximum number of data rows kept after skipping.
    pub max_rows: Option<usize>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            has_headers: true,
            skip_rows: 0,
            max_rows: None,
        }
    }
}

impl ReadOptions {
    pub fn headerless() -> Self {
        Self {
            has_headers: false,
            ..Self::default()
        }
    }

    pub fn rows(mut self, skip_rows: Option<usize>, max_rows: Option<usize>) -> Self {
        self.skip_rows = skip_rows.unwrap_or(0);
        self.max_rows = max_rows;
        self
    }
}

/// A column-major table of `f64` values with named columns.
///
/// Missing cells are stored as `NaN`. All columns always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

fn parse_cell(raw: &str) -> Option<f64> {
    let cell = raw.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("<na>") {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

fn nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.total_cmp(&b),
    }
}

impl Table {
    pub fn new(headers: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, TableError> {
        let mut seen = HashSet::new();
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(TableError::DuplicateColumn(header.clone()));
            }
        }
        if headers.len() != columns.len() {
            return Err(TableError::RaggedColumn {
                column: "<header>".to_string(),
                expected: headers.len(),
                found: columns.len(),
            });
        }
        if let Some(first) = columns.first() {
            let expected = first.len();
            for (header, column) in headers.iter().zip(&columns) {
                if column.len() != expected {
                    return Err(TableError::RaggedColumn {
                        column: header.clone(),
                        expected,
                        found: column.len(),
                    });
                }
            }
        }
        Ok(Self { headers, columns })
    }

    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Vec<f64>)>,
    ) -> Result<Self, TableError> {
        let (headers, columns): (Vec<String>, Vec<Vec<f64>>) = columns
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .unzip();
        Self::new(headers, columns)
    }

    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        Self::read_csv_with(path, ReadOptions::default())
    }

    pub fn read_csv_with(path: &Path, options: ReadOptions) -> Result<Self, TableError> {
        let origin = path.to_string_lossy().to_string();
        let file = File::open(path).map_err(|e| TableError::Io {
            path: origin.clone(),
            source: e,
        })?;
        Self::from_reader(BufReader::new(file), options, &origin)
    }

    /// Parses CSV text. `origin` only labels errors.
    pub fn from_reader(
        reader: impl Read,
        options: ReadOptions,
        origin: &str,
    ) -> Result<Self, TableError> {
        let csv_err = |e: csv::Error| TableError::Csv {
            path: origin.to_string(),
            source: e,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(options.has_headers)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut headers: Vec<String> = if options.has_headers {
            reader
                .headers()
                .map_err(csv_err)?
                .iter()
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

        let rows = reader
            .records()
            .skip(options.skip_rows)
            .take(options.max_rows.unwrap_or(usize::MAX));
        for (row, record) in rows.enumerate() {
            let record = record.map_err(csv_err)?;
            if headers.is_empty() && !options.has_headers {
                headers = (0..record.len()).map(|i| i.to_string()).collect();
                columns = vec![Vec::new(); headers.len()];
            }
            for (col, field) in record.iter().enumerate() {
                let value = parse_cell(field).ok_or_else(|| TableError::InvalidNumber {
                    column: headers.get(col).cloned().unwrap_or_else(|| col.to_string()),
                    row,
                    value: field.to_string(),
                })?;
                if let Some(column) = columns.get_mut(col) {
                    column.push(value);
                }
            }
        }

        Self::new(headers, columns)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index_of(name).map(|i| self.columns[i].as_slice())
    }

    pub fn try_column(&self, name: &str) -> Result<&[f64], TableError> {
        self.column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.n_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| c[index]).collect())
    }

    pub fn last_row(&self) -> Option<Vec<f64>> {
        self.n_rows().checked_sub(1).and_then(|i| self.row(i))
    }

    /// Replaces the column if it exists, otherwise appends it.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), TableError> {
        if !self.headers.is_empty() && values.len() != self.n_rows() {
            return Err(TableError::RaggedColumn {
                column: name.to_string(),
                expected: self.n_rows(),
                found: values.len(),
            });
        }
        match self.index_of(name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.headers.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Sets every cell of `name` to `value`, creating the column when needed.
    pub fn fill_column(&mut self, name: &str, value: f64) -> Result<(), TableError> {
        let n = self.n_rows();
        self.set_column(name, vec![value; n])
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), TableError> {
        let i = self
            .index_of(from)
            .ok_or_else(|| TableError::MissingColumn(from.to_string()))?;
        if from != to && self.index_of(to).is_some() {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        self.headers[i] = to.to_string();
        Ok(())
    }

    pub fn rename_with(mut self, rename: impl Fn(&str) -> String) -> Result<Self, TableError> {
        let headers = self.headers.iter().map(|h| rename(h)).collect();
        let columns = std::mem::take(&mut self.columns);
        Self::new(headers, columns)
    }

    /// Side-by-side concatenation aligned on row index. The shorter table is padded with `NaN`.
    pub fn join(&self, other: &Table) -> Result<Table, TableError> {
        let n = self.n_rows().max(other.n_rows());
        let pad = |column: &Vec<f64>| {
            let mut padded = column.clone();
            padded.resize(n, f64::NAN);
            padded
        };
        let headers = self.headers.iter().chain(&other.headers).cloned().collect();
        let columns = self.columns.iter().chain(&other.columns).map(pad).collect();
        Table::new(headers, columns)
    }

    /// Fills the `NaN` cells of every shared column with the non-`NaN` value found at the same
    /// row of `other`. Existing values are never overwritten.
    pub fn fill_missing_from(&mut self, other: &Table) {
        for (header, column) in self.headers.iter().zip(self.columns.iter_mut()) {
            let Some(source) = other.column(header) else {
                continue;
            };
            for (cell, &candidate) in column.iter_mut().zip(source) {
                if cell.is_nan() && !candidate.is_nan() {
                    *cell = candidate;
                }
            }
        }
    }

    pub fn slice(&self, rows: Range<usize>) -> Table {
        let end = rows.end.min(self.n_rows());
        let start = rows.start.min(end);
        Table {
            headers: self.headers.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| c[start..end].to_vec())
                .collect(),
        }
    }

    pub fn head(&self, n: usize) -> Table {
        self.slice(0..n)
    }

    pub fn tail(&self, n: usize) -> Table {
        let rows = self.n_rows();
        self.slice(rows.saturating_sub(n)..rows)
    }

    pub fn skip(&self, n: usize) -> Table {
        self.slice(n..self.n_rows())
    }

    /// Rows sorted by ascending `name`, `NaN` last. The sort is stable.
    pub fn sort_by(&self, name: &str) -> Result<Table, TableError> {
        let key = self.try_column(name)?;
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by(|&a, &b| nan_last(key[a], key[b]));
        Ok(Table {
            headers: self.headers.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| order.iter().map(|&i| c[i]).collect())
                .collect(),
        })
    }

    pub fn select(&self, names: &[&str]) -> Result<Table, TableError> {
        let mut headers = Vec::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            columns.push(self.try_column(name)?.to_vec());
            headers.push(name.to_string());
        }
        Table::new(headers, columns)
    }

    pub fn without(&self, name: &str) -> Result<Table, TableError> {
        let i = self
            .index_of(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        let mut table = self.clone();
        table.headers.remove(i);
        table.columns.remove(i);
        Ok(table)
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        let origin = path.to_string_lossy().to_string();
        let file = File::create(path).map_err(|e| TableError::Io {
            path: origin.clone(),
            source: e,
        })?;
        self.to_writer(BufWriter::new(file), &origin)
    }

    pub fn to_writer(&self, writer: impl Write, origin: &str) -> Result<(), TableError> {
        let csv_err = |e: csv::Error| TableError::Csv {
            path: origin.to_string(),
            source: e,
        };
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers).map_err(csv_err)?;
        for i in 0..self.n_rows() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| {
                    if c[i].is_nan() {
                        String::new()
                    } else {
                        c[i].to_string()
                    }
                })
                .collect();
            writer.write_record(&record).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| TableError::Io {
            path: origin.to_string(),
            source: e,
        })
    }
}
