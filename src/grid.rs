//! Grid snapping for card coordinates and measures.
//!
//! Coordinates land on multiples of [`GRID_SIZE`]. Measures (width, height)
//! are one unit larger so that the borders of adjacent cards overlap by a
//! single unit instead of doubling up.
//!
//! Board geometry stays within a few thousand units. Near the ends of the
//! `i32` range the arithmetic saturates instead of overflowing, so results
//! there are clamped to `i32::MIN`/`i32::MAX` rather than landing on the grid.

#[cfg(test)]
#[path = "grid_test.rs"]
mod tests;

use crate::consts::GRID_SIZE;

/// Round `n` to the nearest multiple of the grid. An exact half rounds up.
#[must_use]
pub fn snap_to_grid(n: i32) -> i32 {
    let rem = n.rem_euclid(GRID_SIZE);
    let down = n.saturating_sub(rem);
    if rem * 2 >= GRID_SIZE { down.saturating_add(GRID_SIZE) } else { down }
}

/// Snap an x or y coordinate.
#[must_use]
pub fn snap_coordinate(n: i32) -> i32 {
    snap_to_grid(n)
}

/// Snap a width or height.
#[must_use]
pub fn snap_measure(n: i32) -> i32 {
    snap_to_grid(n).saturating_add(1)
}

/// Snap a measure without ever shrinking it below `n`.
///
/// Used when the measure comes from rendered content that must not be clipped.
#[must_use]
pub fn snap_measure_outward(n: i32) -> i32 {
    let snapped = snap_measure(n);
    if snapped < n { snapped.saturating_add(GRID_SIZE) } else { snapped }
}

/// Convert a size expressed in grid units to a snapped measure.
#[must_use]
pub fn grid_units(units: i32) -> i32 {
    snap_measure(units.saturating_mul(GRID_SIZE))
}

/// Snap a coordinate and keep `[n, n + span]` inside `[0, limit]`.
///
/// When snapping would push the far edge past `limit`, the coordinate steps
/// down to the largest grid multiple that still fits. Never returns a
/// negative value, even when `span` exceeds `limit`.
#[must_use]
pub fn fit_coordinate(n: i32, span: i32, limit: i32) -> i32 {
    let max = limit.saturating_sub(span).max(0);
    let snapped = snap_coordinate(n);
    let fitted = if snapped > max { max - max.rem_euclid(GRID_SIZE) } else { snapped };
    fitted.max(0)
}

/// Snap a measure and keep `origin + measure` at or below `limit`.
///
/// When the snapped measure would cross `limit`, it steps down to the largest
/// grid measure that still fits. Never returns less than one unit.
#[must_use]
pub fn fit_measure(n: i32, origin: i32, limit: i32) -> i32 {
    let max = limit.saturating_sub(origin);
    let snapped = snap_measure(n);
    if snapped <= max {
        return snapped;
    }
    (max - (max - 1).rem_euclid(GRID_SIZE)).max(1)
}
