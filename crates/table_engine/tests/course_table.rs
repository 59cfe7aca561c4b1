use serde_json::{json, Value};
use shared::domain::{Course, CourseId, LearningMode};
use table_engine::{
    apply_global_filter, derive, page_count, paginate, stringify, to_rows, ColumnDescriptor,
    TableIntent, TableModel, ViewState,
};

fn course(id: i64, name: &str, duration: u32, mode: LearningMode, published: bool) -> Course {
    Course {
        id: Some(CourseId(id)),
        name: name.to_string(),
        code: None,
        description: None,
        duration: Some(duration),
        commitment_time: None,
        mode_of_learning: Some(mode),
        requirements: None,
        start_date: None,
        end_date: None,
        is_published: published,
        frequently_asked_questions: Vec::new(),
        created_at: None,
        updated_at: None,
    }
}

fn catalogue() -> Vec<Course> {
    vec![
        course(1, "Advanced React Development", 8, LearningMode::Online, true),
        course(2, "Python for Data Science", 12, LearningMode::Hybrid, true),
        course(3, "UI/UX Design Fundamentals", 6, LearningMode::Offline, false),
        course(4, "Digital Marketing Strategy", 10, LearningMode::Online, true),
    ]
}

fn course_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::key("name", "Course"),
        ColumnDescriptor::key("duration", "Weeks"),
        ColumnDescriptor::key("mode_of_learning", "Mode"),
        ColumnDescriptor::key("is_published", "Status").with_cell(|value, _| {
            if value.as_bool() == Some(true) {
                "Published".to_string()
            } else {
                "Draft".to_string()
            }
        }),
    ]
}

#[test]
fn react_filter_matches_one_course() {
    let rows = to_rows(&catalogue()).expect("rows");
    let filtered = apply_global_filter(&rows, "react", &course_columns());
    assert_eq!(filtered.len(), 1);
    assert_eq!(
        filtered[0].get("name"),
        Some(&json!("Advanced React Development"))
    );
}

#[test]
fn twenty_three_rows_make_three_pages_of_ten() {
    let rows: Vec<_> = (0..23)
        .map(|n| match json!({ "id": n, "name": format!("course {n}") }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        })
        .collect();

    assert_eq!(page_count(rows.len(), 10), 3);
    assert_eq!(paginate(&rows, 2, 10).len(), 3);

    let view = derive(
        &rows,
        &[ColumnDescriptor::key("name", "Name")],
        &ViewState::default().reduce(TableIntent::PageChanged(2)),
    );
    assert_eq!(view.pagination.page_count, 3);
    assert_eq!(view.rows.len(), 3);
}

#[test]
fn model_filters_sorts_and_keeps_selection_across_refresh() {
    let mut table = TableModel::new(course_columns(), to_rows(&catalogue()).expect("rows"));

    table.dispatch(TableIntent::ColumnFilterChanged {
        column_id: "is_published".into(),
        value: Some(json!(true)),
    });
    table.dispatch(TableIntent::SortToggled {
        column_id: "duration".into(),
        multi: false,
    });
    table.dispatch(TableIntent::SortToggled {
        column_id: "duration".into(),
        multi: false,
    });

    let view = table.view();
    let first_column: Vec<&str> = view.rows.iter().map(|row| row.cells[0].as_str()).collect();
    assert_eq!(
        first_column,
        vec![
            "Python for Data Science",
            "Digital Marketing Strategy",
            "Advanced React Development"
        ]
    );
    assert_eq!(view.rows[0].cells[3], "Published");
    assert_eq!(view.pagination.filtered_rows, 3);
    assert_eq!(view.pagination.total_rows, 4);

    table.dispatch(TableIntent::RowSelectionToggled("2".into()));
    table.dispatch(TableIntent::RowSelectionToggled("4".into()));
    assert_eq!(table.selected_rows().len(), 2);

    let remaining: Vec<Course> = catalogue().into_iter().filter(|c| c.id != Some(CourseId(4))).collect();
    table.set_rows(to_rows(&remaining).expect("rows"));
    let selected: Vec<String> = table
        .selected_rows()
        .iter()
        .map(|row| stringify(&row["name"]))
        .collect();
    assert_eq!(selected, vec!["Python for Data Science"]);
}
