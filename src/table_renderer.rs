//! Table sizing for PDF layout
//!
//! Column widths follow the automatic table layout: every column has a
//! minimum width (its longest unbreakable content) and a maximum width (its
//! content on one line), and the table width is shared out between them.
//! The strategy sits behind a trait so layout does not depend on one
//! particular algorithm.

/// Measured content of one column, as cell border-box widths in points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnContent {
    pub min: f32,
    pub max: f32,
}

impl ColumnContent {
    /// Widen the column for one more cell.
    pub fn include(&mut self, min: f32, max: f32) {
        self.min = self.min.max(min);
        self.max = self.max.max(max).max(self.min);
    }
}

/// Measured table dimensions for layout
#[derive(Debug, Clone, PartialEq)]
pub struct TableDimensions {
    pub column_widths: Vec<f32>,
    /// Columns plus the spacing around and between them.
    pub total_width: f32,
    pub num_cols: usize,
}

/// Trait for table sizing strategies
pub trait TableRenderer {
    /// Distribute the table width among columns.
    ///
    /// `specified` is the used table width when CSS gives one, `spacing` the
    /// horizontal `border-spacing`.
    fn calculate_dimensions(
        &self,
        columns: &[ColumnContent],
        available: f32,
        specified: Option<f32>,
        spacing: f32,
    ) -> TableDimensions;

    /// Vertical offset of a cell's content inside its row.
    fn cell_offset(&self, row_height: f32, content_height: f32) -> f32;
}

/// Default implementation: auto layout, contents centered vertically.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTableRenderer;

impl TableRenderer for DefaultTableRenderer {
    fn calculate_dimensions(
        &self,
        columns: &[ColumnContent],
        available: f32,
        specified: Option<f32>,
        spacing: f32,
    ) -> TableDimensions {
        let num_cols = columns.len();
        if num_cols == 0 {
            return TableDimensions {
                column_widths: vec![],
                total_width: specified.unwrap_or(0.0),
                num_cols: 0,
            };
        }

        let gaps = spacing * (num_cols + 1) as f32;
        let room = (available - gaps).max(0.0);
        let sum_min: f32 = columns.iter().map(|c| c.min).sum();
        let sum_max: f32 = columns.iter().map(|c| c.max).sum();

        // Never wider than the containing block.
        let target = match specified {
            Some(width) => (width - gaps).max(0.0),
            None => sum_max,
        }
        .min(room);

        let column_widths: Vec<f32> = if target < sum_min {
            // Even the narrowest layout overflows: shrink proportionally and
            // let cell text break between characters.
            let scale = if sum_min > 0.0 { target / sum_min } else { 0.0 };
            columns.iter().map(|c| c.min * scale).collect()
        } else if target >= sum_max {
            let extra = target - sum_max;
            if sum_max > 0.0 {
                columns.iter().map(|c| c.max + extra * c.max / sum_max).collect()
            } else {
                vec![target / num_cols as f32; num_cols]
            }
        } else {
            let t = (target - sum_min) / (sum_max - sum_min);
            columns.iter().map(|c| c.min + (c.max - c.min) * t).collect()
        };

        let total_width = column_widths.iter().sum::<f32>() + gaps;
        TableDimensions {
            column_widths,
            total_width,
            num_cols,
        }
    }

    fn cell_offset(&self, row_height: f32, content_height: f32) -> f32 {
        ((row_height - content_height) / 2.0).max(0.0)
    }
}
