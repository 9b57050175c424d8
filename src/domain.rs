use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DashError;

pub const NOT_AVAILABLE: &str = "N/A";

pub const JOIN_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkKey(String);

const UNLISTED_WORK_PREFIX: &str = "/works/unlisted-";

impl WorkKey {
    // The dash never passes `normalize_key`, so these cannot collide with catalog keys.
    pub fn unlisted(position: usize) -> Self {
        Self(format!("{UNLISTED_WORK_PREFIX}{position}"))
    }

    pub fn is_listed(&self) -> bool {
        !self.0.starts_with(UNLISTED_WORK_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkKey {
    type Err = DashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        normalize_key(value, "/works/")
            .map(Self)
            .ok_or_else(|| DashError::InvalidWorkKey(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorKey(String);

impl AuthorKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuthorKey {
    type Err = DashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        normalize_key(value, "/authors/")
            .map(Self)
            .ok_or_else(|| DashError::InvalidAuthorKey(value.to_string()))
    }
}

// Accepts both `/works/OL45804W` and the bare `OL45804W` form.
fn normalize_key(value: &str, prefix: &str) -> Option<String> {
    let trimmed = value.trim();
    let id = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
    let is_valid = !id.is_empty() && id.chars().all(|ch| ch.is_ascii_alphanumeric());
    is_valid.then(|| format!("{prefix}{id}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRef {
    pub key: Option<AuthorKey>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSummary {
    pub key: WorkKey,
    pub title: String,
    pub authors: Vec<AuthorRef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkDetail {
    pub first_publish_year: Option<i64>,
    pub subjects: Option<Vec<String>>,
    pub ratings_average: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorDetail {
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub top_work: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub key: WorkKey,
    pub title: String,
    pub author_name: String,
    pub ratings_average: String,
    pub first_publish_year: String,
    pub subject: String,
    pub author_birth_date: String,
    pub author_top_work: String,
}

impl Row {
    pub fn placeholder(key: WorkKey, title: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            author_name: NOT_AVAILABLE.to_string(),
            ratings_average: NOT_AVAILABLE.to_string(),
            first_publish_year: NOT_AVAILABLE.to_string(),
            subject: NOT_AVAILABLE.to_string(),
            author_birth_date: NOT_AVAILABLE.to_string(),
            author_top_work: NOT_AVAILABLE.to_string(),
        }
    }

    pub fn get(&self, field: RowField) -> &str {
        match field {
            RowField::Title => &self.title,
            RowField::AuthorName => &self.author_name,
            RowField::RatingsAverage => &self.ratings_average,
            RowField::FirstPublishYear => &self.first_publish_year,
            RowField::Subject => &self.subject,
            RowField::AuthorBirthDate => &self.author_birth_date,
            RowField::AuthorTopWork => &self.author_top_work,
        }
    }

    pub fn set(&mut self, field: RowField, value: impl Into<String>) {
        let slot = match field {
            RowField::Title => &mut self.title,
            RowField::AuthorName => &mut self.author_name,
            RowField::RatingsAverage => &mut self.ratings_average,
            RowField::FirstPublishYear => &mut self.first_publish_year,
            RowField::Subject => &mut self.subject,
            RowField::AuthorBirthDate => &mut self.author_birth_date,
            RowField::AuthorTopWork => &mut self.author_top_work,
        };
        *slot = value.into();
    }

    pub fn values(&self) -> [&str; 7] {
        RowField::ALL.map(|field| self.get(field))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum RowField {
    Title,
    AuthorName,
    RatingsAverage,
    FirstPublishYear,
    Subject,
    AuthorBirthDate,
    AuthorTopWork,
}

impl RowField {
    pub const ALL: [RowField; 7] = [
        RowField::Title,
        RowField::AuthorName,
        RowField::RatingsAverage,
        RowField::FirstPublishYear,
        RowField::Subject,
        RowField::AuthorBirthDate,
        RowField::AuthorTopWork,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RowField::Title => "title",
            RowField::AuthorName => "author_name",
            RowField::RatingsAverage => "ratings_average",
            RowField::FirstPublishYear => "first_publish_year",
            RowField::Subject => "subject",
            RowField::AuthorBirthDate => "author_birth_date",
            RowField::AuthorTopWork => "author_top_work",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RowField::Title => "Title",
            RowField::AuthorName => "Author Name",
            RowField::RatingsAverage => "Ratings Average",
            RowField::FirstPublishYear => "First Publish Year",
            RowField::Subject => "Subject",
            RowField::AuthorBirthDate => "Author Birth Date",
            RowField::AuthorTopWork => "Author Top Work",
        }
    }

    pub fn index(self) -> usize {
        match self {
            RowField::Title => 0,
            RowField::AuthorName => 1,
            RowField::RatingsAverage => 2,
            RowField::FirstPublishYear => 3,
            RowField::Subject => 4,
            RowField::AuthorBirthDate => 5,
            RowField::AuthorTopWork => 6,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RowField {
    type Err = DashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace([' ', '-'], "_");
        RowField::ALL
            .into_iter()
            .find(|field| field.name() == normalized)
            .ok_or_else(|| DashError::InvalidField(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSize(usize);

impl PageSize {
    pub const OPTIONS: [usize; 4] = [10, 25, 50, 100];

    pub fn get(self) -> usize {
        self.0
    }

    pub fn cycled(self) -> Self {
        let position = Self::OPTIONS
            .iter()
            .position(|option| *option == self.0)
            .unwrap_or(0);
        Self(Self::OPTIONS[(position + 1) % Self::OPTIONS.len()])
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(Self::OPTIONS[0])
    }
}

impl TryFrom<usize> for PageSize {
    type Error = DashError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if Self::OPTIONS.contains(&value) {
            Ok(Self(value))
        } else {
            Err(DashError::InvalidPageSize(value))
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
