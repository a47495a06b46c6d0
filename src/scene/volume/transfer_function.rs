//! Transfer-function discretization.
//!
//! Color and opacity are independent piecewise-linear functions of the
//! normalized field value, each defined by its own control points. The
//! lookup table samples both at `p = i / (N - 1)` and stores the pair as one
//! RGBA entry.

use crate::util::Box1;

/// `n` positions evenly spaced over `[0, 1]`.
pub fn evenly_spaced(n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n).map(|i| i as f32 / (n - 1) as f32).collect(),
    }
}

/// Map value-space positions into `[0, 1]` over `range`.
pub fn normalize_positions(positions: &[f32], range: Box1) -> Vec<f32> {
    positions.iter().map(|&p| range.normalize(p)).collect()
}

/// Piecewise-linear interpolation over control points sorted by position.
/// Values outside the first/last position clamp to the end points.
fn interpolate<const N: usize>(points: &[(f32, [f32; N])], p: f32) -> [f32; N] {
    let Some(&(first_pos, first)) = points.first() else {
        return [0.0; N];
    };
    if p <= first_pos {
        return first;
    }
    for w in points.windows(2) {
        let (p0, v0) = w[0];
        let (p1, v1) = w[1];
        if p <= p1 {
            let span = p1 - p0;
            let t = if span > 0.0 { (p - p0) / span } else { 1.0 };
            let mut out = [0.0; N];
            for c in 0..N {
                out[c] = v0[c] + t * (v1[c] - v0[c]);
            }
            return out;
        }
    }
    points[points.len() - 1].1
}

fn control_points<const N: usize>(values: &[[f32; N]], positions: &[f32]) -> Vec<(f32, [f32; N])> {
    let mut points: Vec<_> = positions.iter().copied().zip(values.iter().copied()).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

/// Build an RGBA lookup table of `samples` entries.
///
/// Positions are normalized to `[0, 1]` and must match their value arrays in
/// length; callers validate that before discretizing.
#[tracing::instrument(skip_all, fields(samples = samples))]
pub fn discretize(
    colors: &[[f32; 3]],
    color_positions: &[f32],
    opacities: &[f32],
    opacity_positions: &[f32],
    samples: usize,
) -> Vec<[f32; 4]> {
    let color_points = control_points(colors, color_positions);
    let opacity_values: Vec<[f32; 1]> = opacities.iter().map(|&o| [o]).collect();
    let opacity_points = control_points(&opacity_values, opacity_positions);

    evenly_spaced(samples)
        .into_iter()
        .map(|p| {
            let [r, g, b] = interpolate(&color_points, p);
            let [a] = interpolate(&opacity_points, p);
            [r, g, b, a]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[[f32; 4]], b: &[[f32; 4]]) -> bool {
        a.len() == b.len() && a.iter().flatten().zip(b.iter().flatten()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_linear_ramp() {
        let table = discretize(
            &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            &[0.0, 1.0],
            &[0.0, 1.0],
            &[0.0, 1.0],
            5,
        );
        assert_eq!(table.len(), 5);
        assert_eq!(table[2], [0.5, 0.5, 0.5, 0.5]);
        assert_eq!(table[4], [1.0; 4]);
    }

    #[test]
    fn test_independent_control_points() {
        // color: red -> blue, opacity: single step at 0.75
        let table = discretize(
            &[[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            &[0.0, 1.0],
            &[0.0, 0.0, 1.0],
            &[0.0, 0.75, 1.0],
            3,
        );
        assert_eq!(table[1][..3], [0.5, 0.0, 0.5]);
        assert_eq!(table[1][3], 0.0);
        assert_eq!(table[2][3], 1.0);
    }

    #[test]
    fn test_resampling_is_idempotent() {
        let first = discretize(
            &[[0.1, 0.2, 0.3], [0.9, 0.5, 0.0], [0.3, 0.3, 1.0], [1.0, 1.0, 1.0]],
            &evenly_spaced(4),
            &[0.0, 0.8, 0.1],
            &[0.0, 0.3, 1.0],
            64,
        );
        let colors: Vec<[f32; 3]> = first.iter().map(|s| [s[0], s[1], s[2]]).collect();
        let opacities: Vec<f32> = first.iter().map(|s| s[3]).collect();
        let positions = evenly_spaced(first.len());
        let second = discretize(&colors, &positions, &opacities, &positions, 64);
        assert!(close(&first, &second));
    }

    #[test]
    fn test_clamps_outside_control_points() {
        let table = discretize(&[[0.5; 3]], &[0.5], &[0.2, 0.4], &[0.25, 0.75], 3);
        assert_eq!(table[0], [0.5, 0.5, 0.5, 0.2]);
        assert_eq!(table[2], [0.5, 0.5, 0.5, 0.4]);
    }

    #[test]
    fn test_normalize_positions() {
        let range = Box1::new(10.0, 20.0);
        assert_eq!(normalize_positions(&[10.0, 15.0, 30.0], range), vec![0.0, 0.5, 1.0]);
    }
}
