use nalgebra::DMatrix;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Line prefixes treated as comments (plain `#` plus the `@` directives of `.xvg` files).
const COMMENT_PREFIXES: [char; 2] = ['#', '@'];

/// Digits after the decimal point in written values.
const PRECISION: usize = 10;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid number on line {line}, column {column} (value: '{value}')")]
    InvalidNumber {
        line: usize,
        column: usize,
        value: String,
    },
    #[error("Non-finite value on line {line}, column {column} (value: '{value}')")]
    NonFinite {
        line: usize,
        column: usize,
        value: String,
    },
    #[error("Row on line {line} has {found} columns, expected {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Table contains no data rows")]
    Empty,
}

/// Whitespace-delimited numeric text tables.
///
/// This is the exchange format for every array the labeling step consumes or
/// produces: CV time series, restraint centers, per-frame coordinates and forces,
/// and the mean-force row itself.
pub struct TextTable;

impl TextTable {
    /// Reads a rectangular numeric table from a buffered reader.
    ///
    /// Blank lines and lines starting with `#` or `@` are skipped.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// Returns the table as a row-per-line matrix.
    ///
    /// # Errors
    ///
    /// Returns an error on non-numeric or non-finite (`nan`, `inf`) tokens, rows
    /// of differing width, a table with no data rows, or an underlying I/O failure.
    pub fn read_from(reader: &mut impl BufRead) -> Result<DMatrix<f64>, TableError> {
        let mut data = Vec::new();
        let mut ncols = None;
        let mut nrows = 0;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIXES) {
                continue;
            }

            let start = data.len();
            for (column, token) in trimmed.split_whitespace().enumerate() {
                let value = token
                    .parse::<f64>()
                    .map_err(|_| TableError::InvalidNumber {
                        line: line_num + 1,
                        column: column + 1,
                        value: token.to_string(),
                    })?;
                if !value.is_finite() {
                    return Err(TableError::NonFinite {
                        line: line_num + 1,
                        column: column + 1,
                        value: token.to_string(),
                    });
                }
                data.push(value);
            }

            let found = data.len() - start;
            match ncols {
                None => ncols = Some(found),
                Some(expected) if expected != found => {
                    return Err(TableError::RaggedRow {
                        line: line_num + 1,
                        expected,
                        found,
                    });
                }
                Some(_) => {}
            }
            nrows += 1;
        }

        let ncols = ncols.ok_or(TableError::Empty)?;
        Ok(DMatrix::from_row_slice(nrows, ncols, &data))
    }

    /// Reads a table from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<DMatrix<f64>, TableError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes every row of `table`, values separated by single spaces.
    pub fn write_to(table: &DMatrix<f64>, writer: &mut impl Write) -> io::Result<()> {
        for row in table.row_iter() {
            Self::write_row_to(row.iter().copied(), writer)?;
        }
        writer.flush()
    }

    /// Writes a single row of values.
    pub fn write_row_to(
        values: impl IntoIterator<Item = f64>,
        writer: &mut impl Write,
    ) -> io::Result<()> {
        let line = values
            .into_iter()
            .map(format_scientific)
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line)
    }

    pub fn write_to_path<P: AsRef<Path>>(table: &DMatrix<f64>, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(table, &mut writer)
    }

    pub fn write_row_to_path<P: AsRef<Path>>(values: &[f64], path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_row_to(values.iter().copied(), &mut writer)?;
        writer.flush()
    }
}

/// Formats a value like C's `%.10e`: signed exponent with at least two digits.
pub fn format_scientific(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    let raw = format!("{:.*e}", PRECISION, value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw,
    }
}
