use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::value::{stringify, Row};

pub type AccessorFn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;
pub type CellRenderer = Arc<dyn Fn(&Value, &Row) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Accessor {
    Key(String),
    Fn(AccessorFn),
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

/// How one field of a row is extracted, rendered, sorted and searched.
///
/// Sorting and global filtering are enabled by default. A missing field
/// resolves to `null`, which renders empty.
#[derive(Clone)]
pub struct ColumnDescriptor {
    pub id: String,
    pub header: String,
    pub accessor: Accessor,
    pub cell: Option<CellRenderer>,
    pub sortable: bool,
    pub filterable: bool,
}

impl ColumnDescriptor {
    pub fn key(key: impl Into<String>, header: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            id: key.clone(),
            header: header.into(),
            accessor: Accessor::Key(key),
            cell: None,
            sortable: true,
            filterable: true,
        }
    }

    pub fn computed<F>(id: impl Into<String>, header: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            header: header.into(),
            accessor: Accessor::Fn(Arc::new(accessor)),
            cell: None,
            sortable: true,
            filterable: true,
        }
    }

    pub fn with_cell<F>(mut self, render: F) -> Self
    where
        F: Fn(&Value, &Row) -> String + Send + Sync + 'static,
    {
        self.cell = Some(Arc::new(render));
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn value(&self, row: &Row) -> Value {
        match &self.accessor {
            Accessor::Key(key) => row.get(key).cloned().unwrap_or(Value::Null),
            Accessor::Fn(accessor) => accessor(row),
        }
    }

    pub fn render(&self, row: &Row) -> String {
        let value = self.value(row);
        match &self.cell {
            Some(render) => render(&value, row),
            None => stringify(&value),
        }
    }
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("accessor", &self.accessor)
            .field("cell", &self.cell.as_ref().map(|_| ".."))
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .finish()
    }
}
