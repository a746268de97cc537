//! Render-measured sizes fed back into the viewport calculation.

use serde::{Deserialize, Serialize};

/// A width/height pair in the host's coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both sides finite and strictly positive
    pub fn is_positive(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Current row and column size estimates.
///
/// Starts from configured estimates and is corrected each time the render
/// callback reports what it actually drew. A correction changes the virtual
/// canvas size and can move the center block; the resulting jump on the first
/// measurement is expected.
#[derive(Debug, Clone)]
pub struct DimensionFeedback {
    row_width: f64,
    row_height: f64,
    column_width: f64,
}

impl DimensionFeedback {
    pub fn new(cell_width: f64, cell_height: f64, column_count: usize) -> Self {
        Self {
            row_width: cell_width * column_count as f64,
            row_height: cell_height,
            column_width: cell_width,
        }
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn row_width(&self) -> f64 {
        self.row_width
    }

    pub fn column_width(&self) -> f64 {
        self.column_width
    }

    /// Take a measurement of `rows` × `columns` rendered cells. The measured
    /// height is spread over the rows (rounded up, as variable-height rows
    /// are averaged). Returns `true` if any estimate changed.
    pub fn observe(&mut self, measured: Dimensions, rows: usize, columns: usize) -> bool {
        if !measured.is_positive() || rows == 0 {
            return false;
        }

        let row_height = (measured.height / rows as f64).ceil();
        let column_width = if columns > 0 {
            measured.width / columns as f64
        } else {
            self.column_width
        };

        let changed = row_height != self.row_height || measured.width != self.row_width;
        self.row_height = row_height;
        self.row_width = measured.width;
        self.column_width = column_width;
        changed
    }

    /// Size of the virtual canvas holding `row_count` rows
    pub fn canvas(&self, row_count: usize) -> Dimensions {
        Dimensions::new(self.row_width, row_count as f64 * self.row_height)
    }
}
