use std::ops::RangeInclusive;

use birdseye_camera::WorldPoint;

// tolerance for the last sample landing on the range end
const STEP_TOLERANCE: f64 = 1e-9;

/// A rectangular grid of ground-plane points, both ends included.
///
/// Iterates row by row: `y` in the outer loop, `x` in the inner loop.
///
/// # Example
///
/// ```
/// use birdseye::WorldGrid;
///
/// let grid = WorldGrid::new(-300.0..=300.0, 0.0..=1000.0, 50.0).unwrap();
/// assert_eq!(grid.len(), 13 * 21);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WorldGrid {
    x_start: f64,
    y_start: f64,
    step: f64,
    columns: usize,
    rows: usize,
}

impl WorldGrid {
    /// Create a grid.
    ///
    /// # Arguments
    ///
    /// * `x_range` - The lateral extent.
    /// * `y_range` - The longitudinal extent.
    /// * `step` - The spacing between samples, strictly positive.
    ///
    /// # Returns
    ///
    /// `None` if the step is not positive, a range is empty or not finite, or the grid has
    /// more points than `usize` can count.
    pub fn new(
        x_range: RangeInclusive<f64>,
        y_range: RangeInclusive<f64>,
        step: f64,
    ) -> Option<Self> {
        if !(step.is_finite() && step > 0.0) {
            return None;
        }
        let columns = samples(&x_range, step)?;
        let rows = samples(&y_range, step)?;
        columns.checked_mul(rows)?;
        Some(Self {
            x_start: *x_range.start(),
            y_start: *y_range.start(),
            step,
            columns,
            rows,
        })
    }

    /// Number of points in the grid.
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    /// Whether the grid has no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The point at a row-major index.
    pub fn get(&self, index: usize) -> Option<WorldPoint> {
        if index >= self.len() {
            return None;
        }
        let (row, column) = (index / self.columns, index % self.columns);
        Some(WorldPoint::new(
            self.x_start + column as f64 * self.step,
            self.y_start + row as f64 * self.step,
        ))
    }

    /// Iterate over the points.
    pub fn iter(&self) -> WorldGridIter<'_> {
        WorldGridIter {
            grid: self,
            index: 0,
        }
    }
}

fn samples(range: &RangeInclusive<f64>, step: f64) -> Option<usize> {
    let (start, end) = (*range.start(), *range.end());
    if !(start.is_finite() && end.is_finite()) || end < start {
        return None;
    }
    let intervals = ((end - start) / step + STEP_TOLERANCE).floor();
    // `as` saturates, so reject counts that do not fit before converting
    if !intervals.is_finite() || intervals >= usize::MAX as f64 {
        return None;
    }
    (intervals as usize).checked_add(1)
}

/// Iterator over the points of a [`WorldGrid`].
#[derive(Debug, Clone)]
pub struct WorldGridIter<'a> {
    grid: &'a WorldGrid,
    index: usize,
}

impl Iterator for WorldGridIter<'_> {
    type Item = WorldPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let point = self.grid.get(self.index)?;
        self.index += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WorldGridIter<'_> {}

impl<'a> IntoIterator for &'a WorldGrid {
    type Item = WorldPoint;
    type IntoIter = WorldGridIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
