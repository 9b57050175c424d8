use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Row;
use crate::error::DashError;

pub const EXPORT_FILENAME: &str = "books.csv";
pub const EXPORT_MIME: &str = "text/csv";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Quoting {
    None,
    #[default]
    Minimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub delimiter: char,
    pub quoting: Quoting,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quoting: Quoting::Minimal,
        }
    }
}

// Lines are joined with `\n` and there is no trailing newline, so an empty
// row list renders as an empty string.
pub fn render_csv(rows: &[Row], options: &ExportOptions) -> String {
    let delimiter = options.delimiter.to_string();
    rows.iter()
        .map(|row| {
            row.values()
                .iter()
                .map(|value| escape_field(value, options))
                .collect::<Vec<_>>()
                .join(&delimiter)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_field(value: &str, options: &ExportOptions) -> String {
    match options.quoting {
        Quoting::None => value.to_string(),
        Quoting::Minimal => {
            let needs_quotes = value.contains(options.delimiter)
                || value.contains('"')
                || value.contains('\n')
                || value.contains('\r');
            if needs_quotes {
                format!("\"{}\"", value.replace('"', "\"\""))
            } else {
                value.to_string()
            }
        }
    }
}

pub fn write_csv(
    rows: &[Row],
    directory: &Utf8Path,
    options: &ExportOptions,
) -> Result<Utf8PathBuf, DashError> {
    fs::create_dir_all(directory.as_std_path())
        .map_err(|err| DashError::Filesystem(err.to_string()))?;
    let dest = directory.join(EXPORT_FILENAME);

    let mut temp = tempfile::Builder::new()
        .prefix("bookdash-export")
        .tempfile_in(directory.as_std_path())
        .map_err(|err| DashError::Filesystem(err.to_string()))?;
    temp.write_all(render_csv(rows, options).as_bytes())
        .map_err(|err| DashError::Export(err.to_string()))?;
    temp.flush()
        .map_err(|err| DashError::Export(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| DashError::Filesystem(err.to_string()))?;

    tracing::info!(path = %dest, rows = rows.len(), mime = EXPORT_MIME, "exported rows");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkKey;

    fn row(title: &str, author: &str) -> Row {
        let mut row = Row::placeholder("OL7W".parse::<WorkKey>().unwrap(), title);
        row.author_name = author.to_string();
        row
    }

    #[test]
    fn minimal_quoting_keeps_field_count() {
        let rows = vec![row("Cosmos", "Carl Sagan, Ann Druyan")];
        let csv = render_csv(&rows, &ExportOptions::default());
        assert_eq!(
            csv,
            "Cosmos,\"Carl Sagan, Ann Druyan\",N/A,N/A,N/A,N/A,N/A"
        );
    }

    #[test]
    fn raw_join_matches_plain_concatenation() {
        let rows = vec![row("A \"quoted\" title", "One, Two")];
        let options = ExportOptions {
            quoting: Quoting::None,
            ..ExportOptions::default()
        };
        assert_eq!(
            render_csv(&rows, &options),
            "A \"quoted\" title,One, Two,N/A,N/A,N/A,N/A,N/A"
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let rows = vec![row("A \"quoted\" title", "Someone")];
        let csv = render_csv(&rows, &ExportOptions::default());
        assert!(csv.starts_with("\"A \"\"quoted\"\" title\",Someone,"));
    }

    #[test]
    fn empty_rows_render_empty() {
        assert_eq!(render_csv(&[], &ExportOptions::default()), "");
    }
}
