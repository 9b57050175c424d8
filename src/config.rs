use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::UserDirs;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_BASE_URL;
use crate::domain::PageSize;
use crate::error::DashError;
use crate::export::{ExportOptions, Quoting};
use crate::query::Collation;

pub const CONFIG_FILE_NAME: &str = "bookdash.json";
pub const DEFAULT_SUBJECT: &str = "science";
pub const DEFAULT_LIMIT: usize = 200;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub export: ExportSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CatalogSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FetchSection {
    #[serde(default)]
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ViewSection {
    #[serde(default)]
    pub rows_per_page: Option<usize>,
    #[serde(default)]
    pub collation: Option<Collation>,
    #[serde(default)]
    pub refetch_on_page_change: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ExportSection {
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub quoting: Option<Quoting>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub subject: Option<String>,
    pub limit: Option<usize>,
    pub export_directory: Option<Utf8PathBuf>,
    pub quoting: Option<Quoting>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub base_url: String,
    pub subject: String,
    pub limit: usize,
    pub timeout: Option<Duration>,
    pub max_in_flight: usize,
    pub rows_per_page: PageSize,
    pub collation: Collation,
    pub refetch_on_page_change: bool,
    pub export_directory: Utf8PathBuf,
    pub export: ExportOptions,
}

impl ResolvedConfig {
    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<(), DashError> {
        if let Some(subject) = overrides.subject {
            self.subject = validate_subject(&subject)?;
        }
        if let Some(limit) = overrides.limit {
            self.limit = validate_positive("catalog.limit", limit)?;
        }
        if let Some(directory) = overrides.export_directory {
            self.export_directory = directory;
        }
        if let Some(quoting) = overrides.quoting {
            self.export.quoting = quoting;
        }
        Ok(())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DashError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DashError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DashError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DashError> {
        let schema_version = config.schema_version.unwrap_or(SCHEMA_VERSION);
        if schema_version != SCHEMA_VERSION {
            return Err(DashError::InvalidConfig(format!(
                "unsupported schema_version {schema_version} (expected {SCHEMA_VERSION})"
            )));
        }

        let base_url = config
            .catalog
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(DashError::InvalidConfig(format!(
                "catalog.base_url must be an http(s) URL, got {base_url}"
            )));
        }

        let subject = match config.catalog.subject {
            Some(subject) => validate_subject(&subject)?,
            None => DEFAULT_SUBJECT.to_string(),
        };
        let limit = validate_positive(
            "catalog.limit",
            config.catalog.limit.unwrap_or(DEFAULT_LIMIT),
        )?;
        let max_in_flight = validate_positive(
            "fetch.max_in_flight",
            config.fetch.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT),
        )?;

        let rows_per_page = match config.view.rows_per_page {
            Some(value) => PageSize::try_from(value)?,
            None => PageSize::default(),
        };

        let delimiter = match config.export.delimiter.as_deref() {
            None => ExportOptions::default().delimiter,
            Some(value) => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) if ch != '\n' && ch != '"' => ch,
                    _ => {
                        return Err(DashError::InvalidConfig(format!(
                            "export.delimiter must be a single character, got {value:?}"
                        )));
                    }
                }
            }
        };

        let export_directory = match config.export.directory {
            Some(directory) => Utf8PathBuf::from(directory),
            None => default_export_directory(),
        };

        Ok(ResolvedConfig {
            schema_version,
            base_url,
            subject,
            limit,
            timeout: config.catalog.timeout_secs.map(Duration::from_secs),
            max_in_flight,
            rows_per_page,
            collation: config.view.collation.unwrap_or_default(),
            refetch_on_page_change: config.view.refetch_on_page_change.unwrap_or(false),
            export_directory,
            export: ExportOptions {
                delimiter,
                quoting: config.export.quoting.unwrap_or_default(),
            },
        })
    }
}

pub fn default_export_directory() -> Utf8PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|dir| dir.to_path_buf()))
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}

fn validate_subject(subject: &str) -> Result<String, DashError> {
    let trimmed = subject.trim();
    let is_valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !is_valid {
        return Err(DashError::InvalidConfig(format!(
            "catalog.subject must be a catalog subject slug, got {subject:?}"
        )));
    }
    Ok(trimmed.to_lowercase())
}

fn validate_positive(name: &str, value: usize) -> Result<usize, DashError> {
    if value == 0 {
        return Err(DashError::InvalidConfig(format!("{name} must be > 0")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_catalog_boundary() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.subject, "science");
        assert_eq!(resolved.limit, 200);
        assert_eq!(resolved.rows_per_page.get(), 10);
        assert_eq!(resolved.export.delimiter, ',');
        assert!(resolved.timeout.is_none());
    }
}
