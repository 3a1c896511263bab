//! Paginated review of a staged batch.
//!
//! All mutations take absolute row indices. The `*_on_page` helpers
//! translate a page-relative index first and, for moves, keep the moved row
//! on the visible page.

use std::ops::Range;

use serde_json::Value;

use crate::error::ReviewError;
use crate::models::{Direction, Row};

pub const PAGE_SIZE: usize = 10;

/// Absolute index of row `relative` on 1-based `page`.
pub fn absolute_index(page: usize, relative: usize) -> usize {
    (page.max(1) - 1) * PAGE_SIZE + relative
}

/// 1-based page showing absolute row `index`.
pub fn page_for_index(index: usize) -> usize {
    index / PAGE_SIZE + 1
}

#[derive(Debug, Clone, Default)]
pub struct ReviewEditor {
    rows: Vec<Row>,
    page: usize,
}

impl ReviewEditor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, page: 1 }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column headings, taken from the first row.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn total_pages(&self) -> usize {
        self.rows.len().div_ceil(PAGE_SIZE)
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    /// Jump to `page`, clamped to the available pages.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    /// Absolute index range shown on the current page.
    pub fn page_range(&self) -> Range<usize> {
        let start = absolute_index(self.page, 0).min(self.rows.len());
        let end = (start + PAGE_SIZE).min(self.rows.len());
        start..end
    }

    pub fn page_rows(&self) -> &[Row] {
        &self.rows[self.page_range()]
    }

    pub fn edit(&mut self, index: usize, row: Row) -> Result<(), ReviewError> {
        self.check(index)?;
        self.rows[index] = row;
        Ok(())
    }

    /// Change one cell of a row.
    pub fn update_field(
        &mut self,
        index: usize,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<(), ReviewError> {
        self.check(index)?;
        self.rows[index].insert(column.to_string(), value.into());
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<Row, ReviewError> {
        self.check(index)?;
        let removed = self.rows.remove(index);
        self.set_page(self.page);
        Ok(removed)
    }

    /// Swap a row with its neighbour and return its new index.
    ///
    /// Moving the first row up or the last row down leaves the batch alone.
    pub fn move_row(&mut self, index: usize, direction: Direction) -> Result<usize, ReviewError> {
        self.check(index)?;
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.rows.len() => index + 1,
            _ => return Ok(index),
        };
        self.rows.swap(index, target);
        Ok(target)
    }

    pub fn edit_on_page(&mut self, relative: usize, row: Row) -> Result<(), ReviewError> {
        self.edit(absolute_index(self.page, relative), row)
    }

    pub fn delete_on_page(&mut self, relative: usize) -> Result<Row, ReviewError> {
        self.delete(absolute_index(self.page, relative))
    }

    /// Move a row on the current page, following it across a page boundary.
    pub fn move_row_on_page(
        &mut self,
        relative: usize,
        direction: Direction,
    ) -> Result<usize, ReviewError> {
        let moved = self.move_row(absolute_index(self.page, relative), direction)?;
        self.set_page(page_for_index(moved));
        Ok(moved)
    }

    fn check(&self, index: usize) -> Result<(), ReviewError> {
        if index >= self.rows.len() {
            return Err(ReviewError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(())
    }
}
