//! Assembly of cached slices into a renderable row/column/cell model.

use serde_json::Value;

use crate::block::{BlockMapper, BlockWindow};
use crate::cache::SliceCache;
use crate::model::ColumnInfo;

/// A column of the assembled view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: String,
    /// Position within the table's column list
    pub index: usize,
}

/// A row of the assembled view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    /// Position within the whole table
    pub index: usize,
}

/// One value at the crossing of a row and a column.
///
/// `row` and `column` are positions in [`Assembly::rows`] and
/// [`Assembly::columns`]; the cell owns neither.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: usize,
    pub column: usize,
    pub value: Value,
}

/// The renderable model for one window: every available row crossed with
/// every known column. Rows of blocks that have not arrived are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub window: BlockWindow,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Row-major: the cells of row `r` are `cells[r * columns.len()..][..columns.len()]`
    pub cells: Vec<Cell>,
}

impl Assembly {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of the row at position `row`
    pub fn row_cells(&self, row: usize) -> &[Cell] {
        let width = self.columns.len();
        let start = row * width;
        self.cells.get(start..start + width).unwrap_or(&[])
    }

    /// Cells of the column at position `column`, top to bottom
    pub fn column_cells(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        let width = self.columns.len().max(1);
        self.cells.iter().skip(column).step_by(width).take(if column < self.columns.len() {
            self.rows.len()
        } else {
            0
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        if column >= self.columns.len() {
            return None;
        }
        self.cells.get(row * self.columns.len() + column)
    }

    pub fn row_of(&self, cell: &Cell) -> &Row {
        &self.rows[cell.row]
    }

    pub fn column_of(&self, cell: &Cell) -> &Column {
        &self.columns[cell.column]
    }

    /// First and last table row covered, if any
    pub fn row_span(&self) -> Option<(usize, usize)> {
        Some((self.rows.first()?.index, self.rows.last()?.index))
    }
}

/// What an assembly was built from; equal signatures mean equal output
#[derive(Debug, Clone, PartialEq, Eq)]
struct Signature {
    blocks: Vec<(usize, u64)>,
    columns_generation: u64,
}

/// Builds [`Assembly`] values and suppresses rebuilds when nothing in the
/// window changed since the last one.
#[derive(Debug)]
pub struct Assembler {
    mapper: BlockMapper,
    last: Option<Signature>,
}

impl Assembler {
    pub fn new(mapper: BlockMapper) -> Self {
        Self { mapper, last: None }
    }

    /// Forget the last assembly so the next call always builds
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Assemble `window`, or `None` when the slices in it and the column
    /// list are the same as last time.
    pub fn assemble(
        &mut self,
        cache: &SliceCache,
        window: BlockWindow,
        columns: &[ColumnInfo],
        columns_generation: u64,
    ) -> Option<Assembly> {
        let signature = Signature {
            blocks: cache
                .in_window(window)
                .map(|(block, entry)| (block, entry.generation))
                .collect(),
            columns_generation,
        };

        if self.last.as_ref() == Some(&signature) {
            tracing::trace!(first = window.first, last = window.last, "Window unchanged, skipping assembly");
            return None;
        }

        let assembly = build(&self.mapper, cache, window, columns);
        self.last = Some(signature);
        Some(assembly)
    }
}

/// Cross every row of the cached slices in `window` with `columns`
pub fn build(
    mapper: &BlockMapper,
    cache: &SliceCache,
    window: BlockWindow,
    columns: &[ColumnInfo],
) -> Assembly {
    let columns: Vec<Column> = columns
        .iter()
        .enumerate()
        .map(|(index, c)| Column {
            id: c.id.clone(),
            index,
        })
        .collect();

    let mut rows = Vec::new();
    let mut cells = Vec::new();

    for (block, entry) in cache.in_window(window) {
        let begin = mapper.row_range_of(block).start;
        let slice = &entry.slice;

        for (offset, (row, values)) in slice.rows.iter().zip(&slice.values).enumerate() {
            let position = rows.len();
            rows.push(Row {
                id: row.id.clone(),
                index: begin + offset,
            });

            for column in 0..columns.len() {
                cells.push(Cell {
                    row: position,
                    column,
                    value: values.get(column).cloned().unwrap_or(Value::Null),
                });
            }
        }
    }

    Assembly {
        window,
        columns,
        rows,
        cells,
    }
}
