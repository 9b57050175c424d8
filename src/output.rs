use std::io::{self, Write};

use serde::Serialize;

use crate::app::{FetchFailure, ProgressEvent, ProgressSink};
use crate::domain::{PageSize, Row, RowField, SortDirection};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowsReport {
    pub subject: String,
    pub fetched_at: String,
    pub sort_key: RowField,
    pub sort_direction: SortDirection,
    pub search_text: String,
    pub page: usize,
    pub page_count: usize,
    pub page_size: PageSize,
    pub total_rows: usize,
    pub visible_rows: usize,
    pub rows: Vec<Row>,
    pub failures: Vec<FetchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub subject: String,
    pub path: String,
    pub mime: &'static str,
    pub rows: usize,
    pub failures: usize,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_rows(report: &RowsReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_export(report: &ExportReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("{}", event.message),
        }
    }
}
