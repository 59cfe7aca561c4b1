use serde_json::json;

use super::*;

fn toggle(column_id: &str, multi: bool) -> TableIntent {
    TableIntent::SortToggled {
        column_id: column_id.to_string(),
        multi,
    }
}

#[test]
fn single_sort_cycles_asc_desc_none() {
    let state = ViewState::default().reduce(toggle("name", false));
    assert_eq!(state.sorting, vec![SortKey::asc("name")]);

    let state = state.reduce(toggle("name", false));
    assert_eq!(state.sorting, vec![SortKey::desc("name")]);

    let state = state.reduce(toggle("name", false));
    assert!(state.sorting.is_empty());
}

#[test]
fn single_sort_replaces_other_keys() {
    let state = ViewState::default()
        .reduce(toggle("name", false))
        .reduce(toggle("duration", false));
    assert_eq!(state.sorting, vec![SortKey::asc("duration")]);
}

#[test]
fn multi_sort_appends_and_keeps_priority() {
    let state = ViewState::default()
        .reduce(toggle("name", false))
        .reduce(toggle("duration", true))
        .reduce(toggle("name", true));
    assert_eq!(
        state.sorting,
        vec![SortKey::desc("name"), SortKey::asc("duration")]
    );
    assert_eq!(state.sort_priority("duration"), Some(1));

    let state = state.reduce(toggle("name", true));
    assert_eq!(state.sorting, vec![SortKey::asc("duration")]);
}

#[test]
fn global_filter_change_resets_page_index() {
    let state = ViewState::default()
        .reduce(TableIntent::PageChanged(4))
        .reduce(TableIntent::GlobalFilterChanged("react".into()));
    assert_eq!(state.pagination.page_index, 0);
    assert_eq!(state.global_filter, "react");
}

#[test]
fn unchanged_filter_keeps_page_index() {
    let state = ViewState::default()
        .reduce(TableIntent::GlobalFilterChanged("react".into()))
        .reduce(TableIntent::PageChanged(2))
        .reduce(TableIntent::GlobalFilterChanged("react".into()));
    assert_eq!(state.pagination.page_index, 2);
}

#[test]
fn column_filter_set_and_clear_reset_page_index() {
    let state = ViewState::default()
        .reduce(TableIntent::PageChanged(3))
        .reduce(TableIntent::ColumnFilterChanged {
            column_id: "is_published".into(),
            value: Some(json!(true)),
        });
    assert_eq!(state.pagination.page_index, 0);
    assert_eq!(state.column_filters.get("is_published"), Some(&json!(true)));

    let state = state
        .reduce(TableIntent::PageChanged(1))
        .reduce(TableIntent::ColumnFilterChanged {
            column_id: "is_published".into(),
            value: Some(json!(true)),
        });
    assert_eq!(state.pagination.page_index, 1, "same value is not a change");

    let state = state.reduce(TableIntent::ColumnFilterChanged {
        column_id: "is_published".into(),
        value: None,
    });
    assert!(state.column_filters.is_empty());
    assert_eq!(state.pagination.page_index, 0);
}

#[test]
fn page_size_change_keeps_first_visible_row() {
    let state = ViewState::with_page_size(10)
        .reduce(TableIntent::PageChanged(2))
        .reduce(TableIntent::PageSizeChanged(25));
    assert_eq!(state.pagination, Pagination::new(0, 25));

    let state = ViewState::with_page_size(5)
        .reduce(TableIntent::PageChanged(3))
        .reduce(TableIntent::PageSizeChanged(10));
    assert_eq!(state.pagination.page_index, 1);
}

#[test]
fn zero_page_size_is_clamped() {
    let state = ViewState::default().reduce(TableIntent::PageSizeChanged(0));
    assert_eq!(state.pagination.page_size, 1);
}

#[test]
fn previous_page_saturates_at_zero() {
    let state = ViewState::default()
        .reduce(TableIntent::NextPage)
        .reduce(TableIntent::PreviousPage)
        .reduce(TableIntent::PreviousPage);
    assert_eq!(state.pagination.page_index, 0);
}

#[test]
fn selection_toggles_and_clears() {
    let state = ViewState::default()
        .reduce(TableIntent::RowSelectionToggled("1".into()))
        .reduce(TableIntent::RowSelectionToggled("2".into()))
        .reduce(TableIntent::RowSelectionToggled("1".into()));
    assert_eq!(state.selection.len(), 1);
    assert!(state.selection.contains(&RowId::from("2")));

    let state = state.reduce(TableIntent::SelectionCleared);
    assert!(state.selection.is_empty());
}
