use std::borrow::Cow;
use std::collections::HashSet;

use crate::domain::{PageSize, Row, RowField, SortDirection, WorkKey};
use crate::query::{self, Collation, ViewQuery};

pub const SUBJECT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: PageSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub target_index: usize,
    pub key: WorkKey,
    pub scratch: Row,
    pub focus: RowField,
}

#[derive(Debug, Clone, Default)]
pub struct ViewStore {
    rows: Vec<Row>,
    query: ViewQuery,
    pagination: Pagination,
    expanded: HashSet<WorkKey>,
    edit: Option<EditSession>,
    visible: Vec<usize>,
    load_state: LoadState,
}

impl ViewStore {
    pub fn new(page_size: PageSize, collation: Collation) -> Self {
        Self {
            query: ViewQuery {
                collation,
                ..ViewQuery::default()
            },
            pagination: Pagination {
                page_index: 0,
                page_size,
            },
            ..Self::default()
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    pub fn mark_loading(&mut self) {
        self.load_state = LoadState::Loading;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.rows.clear();
        self.edit = None;
        self.expanded.clear();
        self.load_state = LoadState::Failed(message.into());
        self.recompute();
    }

    // Expand flags and an open edit follow their work key; an edit whose
    // work disappeared is dropped.
    pub fn replace_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        let keys: HashSet<&WorkKey> = self.rows.iter().map(|row| &row.key).collect();
        self.expanded.retain(|key| keys.contains(key));

        if let Some(mut session) = self.edit.take() {
            if let Some(index) = self.rows.iter().position(|row| row.key == session.key) {
                session.target_index = index;
                self.edit = Some(session);
            } else {
                tracing::debug!(key = %session.key, "edited row no longer present, dropping edit");
            }
        }

        self.load_state = LoadState::Ready;
        self.recompute();
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.query.search_text = text.into();
        self.pagination.page_index = 0;
        self.recompute();
    }

    pub fn request_sort(&mut self, field: RowField) {
        if self.query.sort_key == field {
            self.query.sort_direction = self.query.sort_direction.flipped();
        } else {
            self.query.sort_key = field;
            self.query.sort_direction = SortDirection::Ascending;
        }
        self.recompute();
    }

    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.pagination.page_size = page_size;
        self.clamp_page();
    }

    pub fn cycle_page_size(&mut self) -> PageSize {
        self.set_page_size(self.pagination.page_size.cycled());
        self.pagination.page_size
    }

    pub fn goto_page(&mut self, page_index: usize) {
        self.pagination.page_index = page_index;
        self.clamp_page();
    }

    pub fn next_page(&mut self) {
        self.goto_page(self.pagination.page_index.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        self.goto_page(self.pagination.page_index.saturating_sub(1));
    }

    pub fn page_count(&self) -> usize {
        query::page_count(self.visible.len(), self.pagination.page_size.get())
    }

    pub fn visible_rows(&self) -> Vec<&Row> {
        self.visible.iter().map(|index| &self.rows[*index]).collect()
    }

    pub fn page_rows(&self) -> Vec<(usize, &Row)> {
        query::paginate(
            &self.visible,
            self.pagination.page_index,
            self.pagination.page_size.get(),
        )
        .iter()
        .map(|index| (*index, &self.rows[*index]))
        .collect()
    }

    pub fn toggle_expand(&mut self, row_index: usize) -> bool {
        let Some(row) = self.rows.get(row_index) else {
            return false;
        };
        if !self.expanded.remove(&row.key) {
            self.expanded.insert(row.key.clone());
        }
        true
    }

    pub fn is_expanded(&self, row_index: usize) -> bool {
        self.rows
            .get(row_index)
            .is_some_and(|row| self.expanded.contains(&row.key))
    }

    pub fn is_subject_truncated(&self, row_index: usize) -> bool {
        self.rows.get(row_index).is_some_and(|row| {
            row.subject.chars().count() > SUBJECT_PREVIEW_CHARS && !self.is_expanded(row_index)
        })
    }

    pub fn subject_display(&self, row_index: usize) -> Cow<'_, str> {
        let Some(row) = self.rows.get(row_index) else {
            return Cow::Borrowed("");
        };
        if self.is_subject_truncated(row_index) {
            let preview: String = row.subject.chars().take(SUBJECT_PREVIEW_CHARS).collect();
            Cow::Owned(format!("{preview}..."))
        } else {
            Cow::Borrowed(&row.subject)
        }
    }

    pub fn begin_edit(&mut self, row_index: usize) -> bool {
        let Some(row) = self.rows.get(row_index) else {
            return false;
        };
        self.edit = Some(EditSession {
            target_index: row_index,
            key: row.key.clone(),
            scratch: row.clone(),
            focus: RowField::Title,
        });
        true
    }

    pub fn edit_field(&mut self, field: RowField, value: impl Into<String>) -> bool {
        match self.edit.as_mut() {
            Some(session) => {
                session.scratch.set(field, value);
                true
            }
            None => false,
        }
    }

    pub fn focus_field(&mut self, field: RowField) -> bool {
        match self.edit.as_mut() {
            Some(session) => {
                session.focus = field;
                true
            }
            None => false,
        }
    }

    pub fn commit_edit(&mut self) -> Option<usize> {
        let session = self.edit.take()?;
        let slot = self.rows.get_mut(session.target_index)?;
        *slot = session.scratch;
        self.recompute();
        Some(session.target_index)
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.edit.take().is_some()
    }

    fn recompute(&mut self) {
        self.visible = query::derive_indices(&self.rows, &self.query);
        self.clamp_page();
    }

    fn clamp_page(&mut self) {
        self.pagination.page_index = query::clamp_page(
            self.pagination.page_index,
            self.visible.len(),
            self.pagination.page_size.get(),
        );
    }
}
