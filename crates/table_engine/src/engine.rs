use std::{cmp::Ordering, collections::BTreeMap};

use serde_json::Value;

use crate::{
    column::ColumnDescriptor,
    state::{SortDirection, SortKey, ViewState},
    value::{compare_values, row_id, stringify, Row, RowId},
};

/// Anything that can be viewed as a row. Lets the stages work on owned rows,
/// borrowed rows, or rows tagged with their original position.
pub trait RowLike {
    fn row(&self) -> &Row;
}

impl RowLike for Row {
    fn row(&self) -> &Row {
        self
    }
}

impl<T: RowLike + ?Sized> RowLike for &T {
    fn row(&self) -> &Row {
        (**self).row()
    }
}

#[derive(Clone, Copy)]
struct Indexed<'a> {
    index: usize,
    row: &'a Row,
}

impl RowLike for Indexed<'_> {
    fn row(&self) -> &Row {
        self.row
    }
}

/// Keeps rows where at least one filterable column contains `filter_text`,
/// ignoring case. An empty filter keeps everything.
pub fn apply_global_filter<R: RowLike + Clone>(
    rows: &[R],
    filter_text: &str,
    columns: &[ColumnDescriptor],
) -> Vec<R> {
    if filter_text.is_empty() {
        return rows.to_vec();
    }

    let needle = filter_text.to_lowercase();
    rows.iter()
        .filter(|row| {
            columns
                .iter()
                .filter(|column| column.filterable)
                .any(|column| contains_ignore_case(&column.value(row.row()), &needle))
        })
        .cloned()
        .collect()
}

/// Applies every column filter (logical AND). String filters match by
/// case-insensitive substring, other values by equality. Filters on unknown
/// columns are ignored.
pub fn apply_column_filters<R: RowLike + Clone>(
    rows: &[R],
    filters: &BTreeMap<String, Value>,
    columns: &[ColumnDescriptor],
) -> Vec<R> {
    let active: Vec<(&ColumnDescriptor, &Value)> = filters
        .iter()
        .filter_map(|(column_id, expected)| {
            columns
                .iter()
                .find(|column| &column.id == column_id)
                .map(|column| (column, expected))
        })
        .collect();

    if active.is_empty() {
        return rows.to_vec();
    }

    rows.iter()
        .filter(|row| {
            active.iter().all(|(column, expected)| {
                let actual = column.value(row.row());
                match expected {
                    Value::String(text) => contains_ignore_case(&actual, &text.to_lowercase()),
                    other => &actual == *other,
                }
            })
        })
        .cloned()
        .collect()
}

/// Stable multi-key sort; the first key is primary. `null` values sort last
/// in both directions. Keys naming unknown or unsortable columns are skipped.
pub fn apply_sort<R: RowLike + Clone>(
    rows: &[R],
    sorting: &[SortKey],
    columns: &[ColumnDescriptor],
) -> Vec<R> {
    let keys: Vec<(&ColumnDescriptor, SortDirection)> = sorting
        .iter()
        .filter_map(|key| {
            columns
                .iter()
                .find(|column| column.id == key.column_id && column.sortable)
                .map(|column| (column, key.direction))
        })
        .collect();

    if keys.is_empty() {
        return rows.to_vec();
    }

    let mut decorated: Vec<(Vec<Value>, &R)> = rows
        .iter()
        .map(|row| {
            let values = keys
                .iter()
                .map(|(column, _)| column.value(row.row()))
                .collect();
            (values, row)
        })
        .collect();

    decorated.sort_by(|(left, _), (right, _)| {
        for (position, (_, direction)) in keys.iter().enumerate() {
            let ordering = compare_with_nulls_last(&left[position], &right[position], *direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    decorated.into_iter().map(|(_, row)| row.clone()).collect()
}

/// Slice `[page_index * page_size, +page_size)`, clamped. Out-of-range pages
/// are empty; a zero page size counts as one.
pub fn paginate<T: Clone>(rows: &[T], page_index: usize, page_size: usize) -> Vec<T> {
    let page_size = page_size.max(1);
    let Some(start) = page_index.checked_mul(page_size) else {
        return Vec::new();
    };
    if start >= rows.len() {
        return Vec::new();
    }
    let end = start.saturating_add(page_size).min(rows.len());
    rows[start..end].to_vec()
}

/// Number of pages for `filtered_rows`; never less than one.
pub fn page_count(filtered_rows: usize, page_size: usize) -> usize {
    filtered_rows.div_ceil(page_size.max(1)).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMeta {
    pub id: String,
    pub label: String,
    pub sortable: bool,
    pub filterable: bool,
    pub sort: Option<SortDirection>,
    pub sort_priority: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: RowId,
    /// Position in the unfiltered collection.
    pub index: usize,
    pub cells: Vec<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total_rows: usize,
    pub filtered_rows: usize,
    /// Zero-based bounds of the visible slice within the filtered rows;
    /// `None` when the page is empty.
    pub first_row: Option<usize>,
    pub last_row: Option<usize>,
    pub can_previous: bool,
    pub can_next: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub headers: Vec<HeaderMeta>,
    pub rows: Vec<VisibleRow>,
    pub pagination: PaginationMeta,
    /// Selected rows on the current page.
    pub selected_visible: usize,
}

/// Runs column filters, the global filter, sorting and pagination in that
/// order. The page index is clamped to the last page, so a non-empty
/// filtered set never yields an empty page.
pub fn derive(rows: &[Row], columns: &[ColumnDescriptor], state: &ViewState) -> TableView {
    let indexed: Vec<Indexed<'_>> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| Indexed { index, row })
        .collect();

    let filtered = apply_column_filters(&indexed, &state.column_filters, columns);
    let filtered = apply_global_filter(&filtered, &state.global_filter, columns);
    let sorted = apply_sort(&filtered, &state.sorting, columns);

    let page_size = state.pagination.effective_size();
    let pages = page_count(sorted.len(), page_size);
    let page_index = state.pagination.page_index.min(pages - 1);
    let visible = paginate(&sorted, page_index, page_size);

    let first_row = (!visible.is_empty()).then(|| page_index * page_size);
    let last_row = first_row.map(|first| first + visible.len() - 1);

    let rows: Vec<VisibleRow> = visible
        .into_iter()
        .map(|entry| {
            let id = row_id(entry.row, entry.index);
            VisibleRow {
                selected: state.selection.contains(&id),
                id,
                index: entry.index,
                cells: columns.iter().map(|column| column.render(entry.row)).collect(),
            }
        })
        .collect();

    let headers = columns
        .iter()
        .map(|column| HeaderMeta {
            id: column.id.clone(),
            label: column.header.clone(),
            sortable: column.sortable,
            filterable: column.filterable,
            sort: state.sort_direction(&column.id),
            sort_priority: state.sort_priority(&column.id),
        })
        .collect();

    TableView {
        selected_visible: rows.iter().filter(|row| row.selected).count(),
        headers,
        rows,
        pagination: PaginationMeta {
            page_index,
            page_size,
            page_count: pages,
            total_rows: indexed.len(),
            filtered_rows: sorted.len(),
            first_row,
            last_row,
            can_previous: page_index > 0,
            can_next: page_index + 1 < pages,
        },
    }
}

fn contains_ignore_case(value: &Value, lowercase_needle: &str) -> bool {
    stringify(value).to_lowercase().contains(lowercase_needle)
}

fn compare_with_nulls_last(left: &Value, right: &Value, direction: SortDirection) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = compare_values(left, right);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
