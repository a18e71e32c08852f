//! Seeded force-directed (Fruchterman-Reingold) placement

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Position;

const MIN_DISTANCE: f64 = 0.01;
const CONVERGENCE_THRESHOLD: f64 = 1e-4;

/// Spring layout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    /// Optimal distance between nodes.
    pub k: f64,
    pub iterations: usize,
    pub seed: u64,
}

/// Place `node_count` nodes with `edges` as springs and all pairs repelling.
///
/// Coordinates come back centred on the origin with the largest absolute
/// coordinate scaled to 1. Identical inputs give identical output.
pub fn spring_layout(node_count: usize, edges: &[(usize, usize)], params: &SpringParams) -> Vec<Position> {
    match node_count {
        0 => return Vec::new(),
        1 => return vec![Position::ORIGIN],
        _ => {}
    }

    let mut adjacent = vec![vec![false; node_count]; node_count];
    for &(a, b) in edges {
        if a < node_count && b < node_count && a != b {
            adjacent[a][b] = true;
            adjacent[b][a] = true;
        }
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut pos: Vec<Position> = (0..node_count)
        .map(|_| Position::new(rng.gen::<f64>(), rng.gen::<f64>()))
        .collect();

    let (width, height) = extent(&pos);
    let mut temperature = width.max(height) * 0.1;
    let cooling = temperature / (params.iterations as f64 + 1.0);
    let k2 = params.k * params.k;

    for _ in 0..params.iterations {
        let mut displacement = vec![Position::ORIGIN; node_count];
        for i in 0..node_count {
            for j in 0..node_count {
                if i == j {
                    continue;
                }
                let dx = pos[i].x - pos[j].x;
                let dy = pos[i].y - pos[j].y;
                let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let attraction = if adjacent[i][j] { dist / params.k } else { 0.0 };
                let force = k2 / (dist * dist) - attraction;
                displacement[i].x += dx * force;
                displacement[i].y += dy * force;
            }
        }

        let mut total_step = 0.0;
        for (p, d) in pos.iter_mut().zip(&displacement) {
            let length = (d.x * d.x + d.y * d.y).sqrt().max(MIN_DISTANCE);
            let step_x = d.x * temperature / length;
            let step_y = d.y * temperature / length;
            p.x += step_x;
            p.y += step_y;
            total_step += (step_x * step_x + step_y * step_y).sqrt();
        }
        temperature -= cooling;

        if total_step / (node_count as f64) < CONVERGENCE_THRESHOLD {
            break;
        }
    }

    rescale(&mut pos);
    pos
}

fn extent(pos: &[Position]) -> (f64, f64) {
    let (min, max) = bounds(pos);
    (max.x - min.x, max.y - min.y)
}

fn bounds(pos: &[Position]) -> (Position, Position) {
    pos.iter().fold(
        (
            Position::new(f64::INFINITY, f64::INFINITY),
            Position::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(min, max), p| {
            (
                Position::new(min.x.min(p.x), min.y.min(p.y)),
                Position::new(max.x.max(p.x), max.y.max(p.y)),
            )
        },
    )
}

/// Centre on the mean and scale so the largest absolute coordinate is 1.
fn rescale(pos: &mut [Position]) {
    let n = pos.len() as f64;
    let mean_x = pos.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = pos.iter().map(|p| p.y).sum::<f64>() / n;
    for p in pos.iter_mut() {
        p.x -= mean_x;
        p.y -= mean_y;
    }
    let limit = pos
        .iter()
        .map(|p| p.x.abs().max(p.y.abs()))
        .fold(0.0_f64, f64::max);
    if limit > 0.0 {
        for p in pos.iter_mut() {
            p.x /= limit;
            p.y /= limit;
        }
    }
}

/// Translate the minimum corner to `margin` and scale by `scale`.
pub fn to_canvas(pos: &[Position], scale: f64, margin: f64) -> Vec<Position> {
    if pos.is_empty() {
        return Vec::new();
    }
    let (min, _) = bounds(pos);
    pos.iter()
        .map(|p| Position::new((p.x - min.x) * scale + margin, (p.y - min.y) * scale + margin))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SpringParams {
        SpringParams {
            k: 3.0,
            iterations: 200,
            seed: 42,
        }
    }

    #[test]
    fn test_trivial_sizes() {
        assert!(spring_layout(0, &[], &params()).is_empty());
        assert_eq!(spring_layout(1, &[], &params()), vec![Position::ORIGIN]);
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let edges = [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)];
        let a = spring_layout(4, &edges, &params());
        let b = spring_layout(4, &edges, &params());
        assert_eq!(a, b);
    }

    #[test]
    fn test_output_is_normalised() {
        let edges = [(0, 1), (0, 2), (0, 3), (0, 4)];
        let pos = spring_layout(5, &edges, &params());
        let limit = pos.iter().map(|p| p.x.abs().max(p.y.abs())).fold(0.0, f64::max);
        assert!((limit - 1.0).abs() < 1e-9);
        assert!(pos.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn test_to_canvas_moves_minimum_to_margin() {
        let pos = vec![Position::new(-1.0, 0.5), Position::new(1.0, -0.5)];
        let canvas = to_canvas(&pos, 800.0, 50.0);
        assert_eq!(canvas[0], Position::new(50.0, 850.0));
        assert_eq!(canvas[1], Position::new(1650.0, 50.0));
    }
}
