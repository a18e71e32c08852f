//! Rectangle collision resolution
//!
//! Best-effort relaxation: overlapping pairs are pushed apart until a full
//! pass moves nothing or the iteration cap is hit. Residual overlap at the
//! cap is accepted.

use super::Position;

/// Fixed node rectangle; positions are top-left corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub width: f64,
    pub height: f64,
    /// Extra clearance added to the target separation.
    pub padding: f64,
}

/// How a resolution run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionOutcome {
    /// Passes executed, including the final quiet one when converged.
    pub iterations: usize,
    /// A full pass produced no movement.
    pub converged: bool,
}

/// Bounding boxes intersect; touching edges count as overlap.
pub fn overlaps(a: Position, b: Position, footprint: &Footprint) -> bool {
    let (a_left, a_right) = (a.x, a.x + footprint.width);
    let (a_top, a_bottom) = (a.y, a.y + footprint.height);
    let (b_left, b_right) = (b.x, b.x + footprint.width);
    let (b_top, b_bottom) = (b.y, b.y + footprint.height);
    !(a_right < b_left || a_left > b_right || a_bottom < b_top || a_top > b_bottom)
}

/// Half of the remaining separation along one axis, signed away from the
/// other node. Zero once the pair is a full footprint apart on that axis.
fn push(delta: f64, span: f64) -> f64 {
    if delta.abs() >= span {
        return 0.0;
    }
    let direction = if delta > 0.0 { 1.0 } else { -1.0 };
    (span - delta.abs()) / 2.0 * direction
}

/// One pass over every unordered pair, in index order. Returns the new
/// positions and whether anything moved; the input is left untouched.
pub fn separation_pass(positions: &[Position], footprint: &Footprint) -> (Vec<Position>, bool) {
    let mut next = positions.to_vec();
    let mut moved = false;
    let span_x = footprint.width + footprint.padding;
    let span_y = footprint.height + footprint.padding;

    for i in 0..next.len() {
        for j in (i + 1)..next.len() {
            let (a, b) = (next[i], next[j]);
            if !overlaps(a, b, footprint) {
                continue;
            }
            let mut dx = b.x - a.x;
            let dy = b.y - a.y;
            if dx == 0.0 && dy == 0.0 {
                dx = 1.0;
            }
            let px = push(dx, span_x);
            let py = push(dy, span_y);
            if px == 0.0 && py == 0.0 {
                continue;
            }
            next[i] = Position::new(a.x - px, a.y - py);
            next[j] = Position::new(b.x + px, b.y + py);
            moved = true;
        }
    }

    (next, moved)
}

/// Repeat `separation_pass` until quiet or `max_iterations` passes ran.
pub fn resolve_collisions(
    positions: Vec<Position>,
    footprint: &Footprint,
    max_iterations: usize,
) -> (Vec<Position>, CollisionOutcome) {
    let mut current = positions;
    for iteration in 1..=max_iterations {
        let (next, moved) = separation_pass(&current, footprint);
        current = next;
        if !moved {
            return (
                current,
                CollisionOutcome {
                    iterations: iteration,
                    converged: true,
                },
            );
        }
    }

    tracing::debug!(
        "[LAYOUT] Collision resolution stopped at the {}-pass cap with residual movement",
        max_iterations
    );
    (
        current,
        CollisionOutcome {
            iterations: max_iterations,
            converged: false,
        },
    )
}

/// Number of overlapping pairs, for diagnostics.
pub fn count_overlaps(positions: &[Position], footprint: &Footprint) -> usize {
    let mut count = 0;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if overlaps(positions[i], positions[j], footprint) {
                count += 1;
            }
        }
    }
    count
}
