// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// CSV record source
//
// Yields full rows as typed records, in file order, lazily. Column selection
// is left to the caller so the timestamp column stays available for pacing.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PlaybackError;
use crate::record::Record;

/// How column names are resolved
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnNames {
    /// First non-blank line of the file
    HeaderRow,
    /// Supplied externally; every line is data
    Explicit(Vec<String>),
}

/// Factory for fresh passes over one recording
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    path: PathBuf,
    columns: ColumnNames,
    delimiter: char,
}

impl CsvRecordSource {
    /// Open the recording once to make sure it is readable
    pub fn open(path: impl AsRef<Path>, columns: ColumnNames) -> Result<Self, PlaybackError> {
        let path = path.as_ref().to_path_buf();
        File::open(&path).map_err(|source| PlaybackError::SourceOpen {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            columns,
            delimiter: ',',
        })
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a new pass from the first data row, skipping the header if present
    pub fn records(&self) -> Result<Records, PlaybackError> {
        let file = File::open(&self.path).map_err(|source| PlaybackError::SourceOpen {
            path: self.path.clone(),
            source,
        })?;
        let mut lines = BufReader::new(file).lines();
        let mut row = 0u64;

        let columns = match &self.columns {
            ColumnNames::Explicit(names) => names.clone(),
            ColumnNames::HeaderRow => loop {
                row += 1;
                match lines.next() {
                    Some(Ok(line)) if line.trim().is_empty() => continue,
                    Some(Ok(line)) => {
                        let line = line.trim_start_matches('\u{feff}');
                        let header = split_row(line, self.delimiter)
                            .map_err(|message| PlaybackError::MalformedRow { row, message })?;
                        break header.into_iter().map(|c| c.trim().to_string()).collect();
                    }
                    Some(Err(source)) => {
                        return Err(PlaybackError::Read {
                            path: self.path.clone(),
                            row,
                            source,
                        })
                    }
                    None => {
                        return Err(PlaybackError::MissingHeader {
                            path: self.path.clone(),
                        })
                    }
                }
            },
        };

        debug!(
            "Opened pass over '{}' with columns {:?}",
            self.path.display(),
            columns
        );

        Ok(Records {
            path: self.path.clone(),
            lines,
            columns,
            delimiter: self.delimiter,
            row,
        })
    }
}

/// One lazy pass over the recording
pub struct Records {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    columns: Vec<String>,
    delimiter: char,
    row: u64,
}

impl Records {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 1-based line number of the last row read
    pub fn row(&self) -> u64 {
        self.row
    }

    /// Split a row, pulling in further lines while a quoted cell is still open
    fn complete_row(&mut self, mut line: String) -> Result<Vec<String>, PlaybackError> {
        let row = self.row;
        loop {
            let message = match split_row(&line, self.delimiter) {
                Ok(cells) => return Ok(cells),
                Err(message) => message,
            };
            match self.lines.next() {
                Some(Ok(next)) => {
                    self.row += 1;
                    line.push('\n');
                    line.push_str(&next);
                }
                Some(Err(source)) => {
                    return Err(PlaybackError::Read {
                        path: self.path.clone(),
                        row: self.row + 1,
                        source,
                    })
                }
                None => return Err(PlaybackError::MalformedRow { row, message }),
            }
        }
    }
}

impl Iterator for Records {
    type Item = Result<Record, PlaybackError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.row += 1;
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(PlaybackError::Read {
                        path: self.path.clone(),
                        row: self.row,
                        source,
                    }))
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let row = self.row;
            let cells = match self.complete_row(line) {
                Ok(cells) => cells,
                Err(e) => return Some(Err(e)),
            };
            if cells.len() != self.columns.len() {
                return Some(Err(PlaybackError::MalformedRow {
                    row,
                    message: format!(
                        "expected {} fields, found {}",
                        self.columns.len(),
                        cells.len()
                    ),
                }));
            }

            return Some(Ok(Record::from_row(
                &self.columns,
                cells.iter().map(String::as_str),
            )));
        }
    }
}

/// Split one delimited line, honouring double-quoted cells with `""` escapes
pub fn split_row(line: &str, delimiter: char) -> Result<Vec<String>, String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    cell.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                cell.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            cells.push(std::mem::take(&mut cell));
        } else {
            cell.push(c);
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    cells.push(cell);
    Ok(cells)
}
