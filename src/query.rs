use std::cmp::Ordering;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{Row, RowField, SortDirection};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Collation {
    #[default]
    Lexical,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewQuery {
    pub sort_key: RowField,
    pub sort_direction: SortDirection,
    pub search_text: String,
    pub collation: Collation,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            sort_key: RowField::Title,
            sort_direction: SortDirection::Ascending,
            search_text: String::new(),
            collation: Collation::Lexical,
        }
    }
}

impl ViewQuery {
    pub fn matches(&self, row: &Row) -> bool {
        let needle = self.search_text.to_lowercase();
        needle.is_empty() || row.author_name.to_lowercase().contains(&needle)
    }

    pub fn compare(&self, left: &Row, right: &Row) -> Ordering {
        let ordering = compare_values(
            left.get(self.sort_key),
            right.get(self.sort_key),
            self.collation,
        );
        match self.sort_direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_values(left: &str, right: &str, collation: Collation) -> Ordering {
    if collation == Collation::Lexical {
        return left.cmp(right);
    }
    // Numbers first in numeric order, then everything else lexically, which
    // keeps the comparison a total order.
    match (parse_number(left), parse_number(right)) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

pub fn derive_indices(rows: &[Row], query: &ViewQuery) -> Vec<usize> {
    let mut indices: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| query.matches(row))
        .map(|(index, _)| index)
        .collect();
    indices.sort_by(|a, b| query.compare(&rows[*a], &rows[*b]));
    indices
}

pub fn derive<'a>(rows: &'a [Row], query: &ViewQuery) -> Vec<&'a Row> {
    derive_indices(rows, query)
        .into_iter()
        .map(|index| &rows[index])
        .collect()
}

pub fn paginate<T>(ordered: &[T], page_index: usize, page_size: usize) -> &[T] {
    if page_size == 0 {
        return &[];
    }
    let start = page_index.saturating_mul(page_size).min(ordered.len());
    let end = start.saturating_add(page_size).min(ordered.len());
    &ordered[start..end]
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

pub fn clamp_page(page_index: usize, len: usize, page_size: usize) -> usize {
    page_index.min(page_count(len, page_size).saturating_sub(1))
}
