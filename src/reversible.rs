//! Index-remapping view that presents a table with its columns and/or rows
//! reversed. The underlying table is never copied or modified.

use crate::error::{ReportError, Result};

/// Read access shared by every table that can sit behind a [`ReversibleView`].
pub trait TableSource {
    fn row_count(&self) -> usize;
    fn column_count(&self) -> usize;
    fn number(&self, row: usize, column: usize) -> Result<Option<f64>>;
    fn row_label(&self, row: usize) -> Result<String>;
    fn column_name(&self, column: usize) -> Result<String>;
}

#[derive(Debug)]
pub struct ReversibleView<'a, S: TableSource + ?Sized> {
    source: &'a S,
    reversed_horizontally: bool,
    reversed_vertically: bool,
}

impl<'a, S: TableSource + ?Sized> ReversibleView<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            reversed_horizontally: false,
            reversed_vertically: false,
        }
    }

    pub fn source(&self) -> &'a S {
        self.source
    }

    pub fn set_reversed_horizontally(&mut self, reversed: bool) {
        self.reversed_horizontally = reversed;
    }

    pub fn set_reversed_vertically(&mut self, reversed: bool) {
        self.reversed_vertically = reversed;
    }

    pub fn is_reversed_horizontally(&self) -> bool {
        self.reversed_horizontally
    }

    pub fn is_reversed_vertically(&self) -> bool {
        self.reversed_vertically
    }

    pub fn row_count(&self) -> usize {
        self.source.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.source.column_count()
    }

    /// Maps a view row to the source row.
    pub fn source_row(&self, row: usize) -> Result<usize> {
        let count = self.source.row_count();
        if row >= count {
            return Err(ReportError::RowOutOfRange { row, count });
        }
        Ok(if self.reversed_vertically {
            count - row - 1
        } else {
            row
        })
    }

    /// Maps a view column to the source column.
    pub fn source_column(&self, column: usize) -> Result<usize> {
        let count = self.source.column_count();
        if column >= count {
            return Err(ReportError::ColumnOutOfRange { column, count });
        }
        Ok(if self.reversed_horizontally {
            count - column - 1
        } else {
            column
        })
    }

    pub fn number(&self, row: usize, column: usize) -> Result<Option<f64>> {
        self.source
            .number(self.source_row(row)?, self.source_column(column)?)
    }

    pub fn row_label(&self, row: usize) -> Result<String> {
        self.source.row_label(self.source_row(row)?)
    }

    pub fn column_name(&self, column: usize) -> Result<String> {
        self.source.column_name(self.source_column(column)?)
    }
}

impl<S: TableSource + ?Sized> TableSource for ReversibleView<'_, S> {
    fn row_count(&self) -> usize {
        ReversibleView::row_count(self)
    }

    fn column_count(&self) -> usize {
        ReversibleView::column_count(self)
    }

    fn number(&self, row: usize, column: usize) -> Result<Option<f64>> {
        ReversibleView::number(self, row, column)
    }

    fn row_label(&self, row: usize) -> Result<String> {
        ReversibleView::row_label(self, row)
    }

    fn column_name(&self, column: usize) -> Result<String> {
        ReversibleView::column_name(self, column)
    }
}
