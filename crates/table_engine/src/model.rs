use crate::{
    column::ColumnDescriptor,
    engine::{derive, TableView},
    state::{TableIntent, ViewState},
    value::{row_id, Row, RowId},
};

/// Rows, columns and view state held together so callers can feed intents
/// and read the derived view without threading three values around.
#[derive(Debug, Clone)]
pub struct TableModel {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    state: ViewState,
}

impl TableModel {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            state: ViewState::default(),
        }
    }

    pub fn with_state(mut self, state: ViewState) -> Self {
        self.state = state;
        self
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Replaces the row collection, e.g. after a resource refresh. Selections
    /// pointing at rows that no longer exist are dropped.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
        let live: Vec<RowId> = self.row_ids();
        self.state.selection.retain(|id| live.contains(id));
    }

    pub fn dispatch(&mut self, intent: TableIntent) {
        self.state.apply(intent);
    }

    pub fn view(&self) -> TableView {
        derive(&self.rows, &self.columns, &self.state)
    }

    /// Selected rows in collection order, whether or not they are visible.
    pub fn selected_rows(&self) -> Vec<&Row> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(index, row)| self.state.selection.contains(&row_id(row, *index)))
            .map(|(_, row)| row)
            .collect()
    }

    fn row_ids(&self) -> Vec<RowId> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| row_id(row, index))
            .collect()
    }
}
