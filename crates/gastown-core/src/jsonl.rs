//! JSONL (JSON Lines) read/write support.
//!
//! Each line is a complete JSON object. Used for `routes.jsonl` and the
//! fake store's export format; comment lines (`#`) and blank lines are
//! skipped on read.

use std::io::{self, BufRead, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
}

/// Result alias for JSONL operations.
pub type Result<T> = std::result::Result<T, JsonlError>;

/// Writes records as JSONL to the given writer, one object per line.
pub fn write_jsonl<W: Write, T: Serialize>(writer: &mut W, records: &[T]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut *writer, record)
            .map_err(|e| JsonlError::Json { line: 0, source: e })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Returns an iterator that reads records from a JSONL reader.
pub fn read_jsonl<R: BufRead, T: DeserializeOwned>(reader: R) -> JsonlIter<R, T> {
    JsonlIter {
        reader,
        line_number: 0,
        _marker: std::marker::PhantomData,
    }
}

/// Iterator over JSONL-encoded records.
pub struct JsonlIter<R, T> {
    reader: R,
    line_number: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<R: BufRead, T: DeserializeOwned> Iterator for JsonlIter<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None, // EOF
                Ok(_) => {
                    self.line_number += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue; // skip blanks and comments
                    }
                    match serde_json::from_str::<T>(trimmed) {
                        Ok(record) => return Some(Ok(record)),
                        Err(e) => {
                            return Some(Err(JsonlError::Json {
                                line: self.line_number,
                                source: e,
                            }));
                        }
                    }
                }
                Err(e) => return Some(Err(JsonlError::Io(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bead::BeadBuilder;
    use crate::bead::Bead;
    use std::io::BufReader;

    #[test]
    fn write_and_read_roundtrip() {
        let beads = vec![
            BeadBuilder::new("Bead 1").id("gt-001").priority(1).build(),
            BeadBuilder::new("Bead 2").id("gt-002").priority(2).build(),
        ];

        let mut buf = Vec::new();
        write_jsonl(&mut buf, &beads).unwrap();

        let reader = BufReader::new(buf.as_slice());
        let read_back: Vec<Bead> = read_jsonl(reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].title, "Bead 1");
        assert_eq!(read_back[1].title, "Bead 2");
    }

    #[test]
    fn read_skips_blanks_and_comments() {
        let data = b"# routes\n{\"title\":\"A\"}\n\n{\"title\":\"B\"}\n";
        let reader = BufReader::new(data.as_slice());
        let results: Vec<Bead> = read_jsonl(reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn read_reports_line_number_on_error() {
        let data = b"{\"title\":\"A\"}\nnot-json\n";
        let reader = BufReader::new(data.as_slice());
        let results: Vec<Result<Bead>> = read_jsonl(reader).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(JsonlError::Json { line, .. }) => assert_eq!(*line, 2),
            other => panic!("expected JSON error, got {:?}", other),
        }
    }
}
