//! Machine-readable reports: JSON or JSON Lines.
//!
//! A JSON report is one array written on `finish`; a JSONL report streams
//! one record per line as items complete.

use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::save::SaveResult;

/// Report encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// One JSON array
    Json,
    /// One JSON object per line
    JsonLines,
}

impl ReportFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    /// Pick the format from a report file's extension (`.jsonl` / `.ndjson`
    /// stream, anything else is an array).
    pub fn for_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::parse)
            .unwrap_or(Self::Json)
    }
}

/// One line of a batch report.
#[derive(Debug, Clone, Serialize)]
pub struct SaveRecord {
    pub source: PathBuf,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_status: Option<String>,
    #[serde(flatten)]
    pub result: SaveResult,
}

/// Writes serializable records as a JSON array or as JSON Lines.
pub struct ReportWriter<W: Write, T: Serialize> {
    writer: W,
    format: ReportFormat,
    pretty: bool,
    pending: Vec<T>,
    items_written: usize,
}

impl<W: Write, T: Serialize> ReportWriter<W, T> {
    /// `pretty` only affects the JSON array form.
    pub fn new(writer: W, format: ReportFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            pending: Vec::new(),
            items_written: 0,
        }
    }

    /// Add one record. JSONL writes it immediately; JSON buffers it until
    /// `finish`.
    pub fn push(&mut self, item: T) -> io::Result<()> {
        match self.format {
            ReportFormat::Json => self.pending.push(item),
            ReportFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, &item).map_err(io::Error::other)?;
                writeln!(self.writer)?;
                self.items_written += 1;
            }
        }
        Ok(())
    }

    /// Number of records accepted so far.
    pub fn len(&self) -> usize {
        self.items_written + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write any buffered records, flush and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == ReportFormat::Json {
            if self.pretty {
                serde_json::to_writer_pretty(&mut self.writer, &self.pending)
                    .map_err(io::Error::other)?;
            } else {
                serde_json::to_writer(&mut self.writer, &self.pending)
                    .map_err(io::Error::other)?;
            }
            writeln!(self.writer)?;
            self.items_written += self.pending.len();
            self.pending.clear();
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Serialize one item to a JSON string.
pub fn to_json<T: Serialize>(item: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(item)
    } else {
        serde_json::to_string(item)
    }
}
