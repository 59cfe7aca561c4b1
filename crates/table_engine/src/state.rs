use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::RowId;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column_id: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page_index: usize, page_size: usize) -> Self {
        Self {
            page_index,
            page_size: page_size.max(1),
        }
    }

    /// Page size with the zero case clamped to one.
    pub fn effective_size(&self) -> usize {
        self.page_size.max(1)
    }

    pub fn first_row_index(&self) -> usize {
        self.page_index.saturating_mul(self.effective_size())
    }

    /// Changes the page size while keeping the first visible row on screen.
    pub fn resized(self, new_size: usize) -> Self {
        let new_size = new_size.max(1);
        Self {
            page_index: self.first_row_index() / new_size,
            page_size: new_size,
        }
    }
}

pub fn set_page_size(pagination: Pagination, new_size: usize) -> Pagination {
    pagination.resized(new_size)
}

/// A user interaction with a table, folded into [`ViewState`] by
/// [`ViewState::reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum TableIntent {
    /// Cycles the column through ascending, descending and unsorted. With
    /// `multi` the other sort keys are kept.
    SortToggled { column_id: String, multi: bool },
    SortCleared,
    GlobalFilterChanged(String),
    /// `None` removes the filter.
    ColumnFilterChanged {
        column_id: String,
        value: Option<Value>,
    },
    PageChanged(usize),
    NextPage,
    PreviousPage,
    PageSizeChanged(usize),
    RowSelectionToggled(RowId),
    SelectionCleared,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub sorting: Vec<SortKey>,
    pub global_filter: String,
    pub column_filters: BTreeMap<String, Value>,
    pub pagination: Pagination,
    pub selection: BTreeSet<RowId>,
}

impl ViewState {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            pagination: Pagination::new(0, page_size),
            ..Self::default()
        }
    }

    pub fn reduce(mut self, intent: TableIntent) -> Self {
        self.apply(intent);
        self
    }

    pub fn apply(&mut self, intent: TableIntent) {
        match intent {
            TableIntent::SortToggled { column_id, multi } => self.toggle_sort(column_id, multi),
            TableIntent::SortCleared => self.sorting.clear(),
            TableIntent::GlobalFilterChanged(text) => {
                if self.global_filter != text {
                    self.global_filter = text;
                    self.pagination.page_index = 0;
                }
            }
            TableIntent::ColumnFilterChanged { column_id, value } => {
                let changed = match value {
                    Some(value) => {
                        self.column_filters.insert(column_id, value.clone()) != Some(value)
                    }
                    None => self.column_filters.remove(&column_id).is_some(),
                };
                if changed {
                    self.pagination.page_index = 0;
                }
            }
            TableIntent::PageChanged(index) => self.pagination.page_index = index,
            TableIntent::NextPage => {
                self.pagination.page_index = self.pagination.page_index.saturating_add(1)
            }
            TableIntent::PreviousPage => {
                self.pagination.page_index = self.pagination.page_index.saturating_sub(1)
            }
            TableIntent::PageSizeChanged(size) => {
                self.pagination = set_page_size(self.pagination, size);
            }
            TableIntent::RowSelectionToggled(row_id) => {
                if !self.selection.remove(&row_id) {
                    self.selection.insert(row_id);
                }
            }
            TableIntent::SelectionCleared => self.selection.clear(),
        }
    }

    pub fn sort_direction(&self, column_id: &str) -> Option<SortDirection> {
        self.sorting
            .iter()
            .find(|key| key.column_id == column_id)
            .map(|key| key.direction)
    }

    pub fn sort_priority(&self, column_id: &str) -> Option<usize> {
        self.sorting.iter().position(|key| key.column_id == column_id)
    }

    fn toggle_sort(&mut self, column_id: String, multi: bool) {
        let position = self.sort_priority(&column_id);
        let next = match position.map(|pos| self.sorting[pos].direction) {
            None => Some(SortDirection::Asc),
            Some(SortDirection::Asc) => Some(SortDirection::Desc),
            Some(SortDirection::Desc) => None,
        };

        if !multi {
            self.sorting = next
                .map(|direction| vec![SortKey { column_id, direction }])
                .unwrap_or_default();
            return;
        }

        match (position, next) {
            (Some(pos), Some(direction)) => self.sorting[pos].direction = direction,
            (Some(pos), None) => {
                self.sorting.remove(pos);
            }
            (None, Some(direction)) => self.sorting.push(SortKey { column_id, direction }),
            (None, None) => {}
        }
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
