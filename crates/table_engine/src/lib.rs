//! In-memory table engine: filtering, multi-key sorting and pagination over
//! an opaque row collection, plus the intent reducer that owns view state.
//!
//! The engine never mutates its input and never fails; every entry point is
//! a pure function of `(rows, columns, view state)`.

mod column;
mod engine;
mod model;
mod state;
mod value;

pub use column::{Accessor, AccessorFn, CellRenderer, ColumnDescriptor};
pub use engine::{
    apply_column_filters, apply_global_filter, apply_sort, derive, page_count, paginate,
    HeaderMeta, PaginationMeta, RowLike, TableView, VisibleRow,
};
pub use model::TableModel;
pub use state::{
    set_page_size, Pagination, SortDirection, SortKey, TableIntent, ViewState, DEFAULT_PAGE_SIZE,
};
pub use value::{compare_values, row_id, stringify, to_rows, Row, RowId};
