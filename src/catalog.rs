use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::{AuthorDetail, AuthorKey, AuthorRef, WorkDetail, WorkKey, WorkSummary};
use crate::error::DashError;

pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";

pub trait CatalogClient: Send + Sync {
    fn fetch_works(&self, subject: &str, limit: usize) -> Result<Vec<WorkSummary>, DashError>;
    fn fetch_work_detail(&self, key: &WorkKey) -> Result<WorkDetail, DashError>;
    fn fetch_author_detail(&self, key: &AuthorKey) -> Result<AuthorDetail, DashError>;
}

#[derive(Clone)]
pub struct OpenLibraryHttpClient {
    client: Client,
    base_url: String,
}

impl OpenLibraryHttpClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, DashError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("bookdash/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DashError::CatalogHttp(err.to_string()))?,
        );
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| DashError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn works_url(&self, subject: &str) -> String {
        format!("{}/subjects/{}.json", self.base_url, subject.trim())
    }

    pub fn record_url(&self, key: &str) -> String {
        format!("{}{}.json", self.base_url, key)
    }

    fn get_json(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value, DashError> {
        let response = request
            .send()
            .map_err(|err| DashError::CatalogHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        response
            .json()
            .map_err(|err| DashError::CatalogPayload(err.to_string()))
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, DashError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(DashError::CatalogStatus { status, message })
    }
}

impl CatalogClient for OpenLibraryHttpClient {
    fn fetch_works(&self, subject: &str, limit: usize) -> Result<Vec<WorkSummary>, DashError> {
        let url = self.works_url(subject);
        tracing::debug!(%url, limit, "requesting works list");
        let raw = self.get_json(self.client.get(&url).query(&[("limit", limit)]))?;
        parse_works(&raw)
    }

    fn fetch_work_detail(&self, key: &WorkKey) -> Result<WorkDetail, DashError> {
        let url = self.record_url(key.as_str());
        tracing::debug!(%url, "requesting work detail");
        let raw = self.get_json(self.client.get(&url))?;
        Ok(parse_work_detail(&raw))
    }

    fn fetch_author_detail(&self, key: &AuthorKey) -> Result<AuthorDetail, DashError> {
        let url = self.record_url(key.as_str());
        tracing::debug!(%url, "requesting author detail");
        let raw = self.get_json(self.client.get(&url))?;
        Ok(parse_author_detail(&raw))
    }
}

pub fn parse_works(raw: &Value) -> Result<Vec<WorkSummary>, DashError> {
    let works = raw
        .get("works")
        .and_then(|value| value.as_array())
        .ok_or_else(|| DashError::CatalogPayload("missing `works` array".to_string()))?;

    let mut summaries = Vec::with_capacity(works.len());
    for (position, work) in works.iter().enumerate() {
        let key = match work
            .get("key")
            .and_then(|value| value.as_str())
            .and_then(|value| value.parse::<WorkKey>().ok())
        {
            Some(key) => key,
            None => {
                tracing::warn!(entry = %work, "work listed without a valid key");
                WorkKey::unlisted(position)
            }
        };
        let title = string_field(work, "title").unwrap_or_default();
        let authors = work
            .get("authors")
            .and_then(|value| value.as_array())
            .map(|authors| authors.iter().map(parse_author_ref).collect())
            .unwrap_or_default();
        summaries.push(WorkSummary {
            key,
            title,
            authors,
        });
    }
    Ok(summaries)
}

fn parse_author_ref(raw: &Value) -> AuthorRef {
    let key = raw
        .get("key")
        .and_then(|value| value.as_str())
        .and_then(|value| value.parse::<AuthorKey>().ok());
    if key.is_none() {
        tracing::warn!(entry = %raw, "author listed without a valid key");
    }
    AuthorRef {
        key,
        name: string_field(raw, "name").unwrap_or_default(),
    }
}

pub fn parse_work_detail(raw: &Value) -> WorkDetail {
    let first_publish_year = raw.get("first_publish_year").and_then(|value| {
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
    });
    let subjects = raw
        .get("subjects")
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|item| item.to_string())
                .collect()
        });
    let ratings_average = raw.get("ratings_average").and_then(|value| value.as_f64());

    WorkDetail {
        first_publish_year,
        subjects,
        ratings_average,
    }
}

pub fn parse_author_detail(raw: &Value) -> AuthorDetail {
    AuthorDetail {
        name: string_field(raw, "name"),
        birth_date: string_field(raw, "birth_date"),
        top_work: string_field(raw, "top_work"),
    }
}

fn string_field(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn urls_follow_catalog_layout() {
        let client = OpenLibraryHttpClient::new("https://openlibrary.org/", None).unwrap();
        assert_eq!(
            client.works_url("science"),
            "https://openlibrary.org/subjects/science.json"
        );
        assert_eq!(
            client.record_url("/works/OL45804W"),
            "https://openlibrary.org/works/OL45804W.json"
        );
    }

    #[test]
    fn work_detail_accepts_string_year() {
        let detail = parse_work_detail(&json!({
            "first_publish_year": "1959",
            "ratings_average": 4
        }));
        assert_eq!(detail.first_publish_year, Some(1959));
        assert_eq!(detail.ratings_average, Some(4.0));
        assert_eq!(detail.subjects, None);
    }
}
