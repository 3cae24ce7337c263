use crate::surface::Rect;

/// Configuration for the size-aware collage grid.
///
/// Tiles are square. The initial tile side approximates sqrt(area / count),
/// column/row counts are derived from it, and the tile is then shrunk so the
/// full grid fits both axes. The grid is centered with leftover space split
/// evenly as a margin.
#[derive(Debug, Clone)]
pub struct GridSpec {
    /// Gap between tiles in logical pixels (default: 0)
    pub gap: f32,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self { gap: 0.0 }
    }
}

/// One cell of a computed grid: position plus the index of the image it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub col: u32,
    pub row: u32,
    pub index: usize,
}

/// A computed collage layout.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    /// Side length of each (square) tile in logical pixels.
    pub tile: f32,
    /// Top-left corner of the grid within the surface.
    pub origin_x: f32,
    pub origin_y: f32,
    count: usize,
    gap: f32,
}

impl GridSpec {
    /// Compute a grid for `count` images on a `width` x `height` surface.
    ///
    /// Returns `None` for an empty set or a degenerate surface. For any
    /// `count >= 1` the result satisfies `cols * rows >= count` and the grid
    /// is centered on both axes.
    pub fn compute(&self, count: usize, width: f32, height: f32) -> Option<GridLayout> {
        if count == 0 || width <= 0.0 || height <= 0.0 {
            return None;
        }

        let n = count as f32;
        // Ideal square tile if the images tiled the full area perfectly.
        let ideal = (width * height / n).sqrt().max(1.0);

        let min_cols = (n.sqrt().ceil() as u32).max(1);
        let cols = ((width / ideal).ceil() as u32)
            .max(min_cols)
            .min(count as u32);
        let rows = (count as u32).div_ceil(cols);

        // Shrink the tile so the grid (gaps included) fits both axes.
        let gap = self.gap.max(0.0);
        let fit_w = (width - gap * (cols.saturating_sub(1)) as f32) / cols as f32;
        let fit_h = (height - gap * (rows.saturating_sub(1)) as f32) / rows as f32;
        let tile = fit_w.min(fit_h).max(1.0);

        let grid_w = cols as f32 * tile + gap * (cols.saturating_sub(1)) as f32;
        let grid_h = rows as f32 * tile + gap * (rows.saturating_sub(1)) as f32;

        Some(GridLayout {
            cols,
            rows,
            tile,
            origin_x: (width - grid_w) / 2.0,
            origin_y: (height - grid_h) / 2.0,
            count,
            gap,
        })
    }
}

impl GridLayout {
    /// Cells in row-major order, one per image index.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.count).map(move |index| GridCell {
            col: (index as u32) % self.cols,
            row: (index as u32) / self.cols,
            index,
        })
    }

    /// The logical rectangle a cell occupies.
    pub fn cell_rect(&self, cell: GridCell) -> Rect {
        Rect::new(
            self.origin_x + cell.col as f32 * (self.tile + self.gap),
            self.origin_y + cell.row as f32 * (self.tile + self.gap),
            self.tile,
            self.tile,
        )
    }
}
