//! Pareto dominance and hypervolume utilities. Objectives are in
//! minimization form.
use ndarray::{Array2, ArrayBase, ArrayView1, Axis, Data, Ix1, Ix2, concatenate};

/// Whether `a` dominates `b`: no worse on every objective and strictly
/// better on at least one
pub fn dominates(
    a: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    b: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b.iter()) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Mask of the rows of `y` (n, n_obj) dominated by no other row.
/// Rows containing NaN are always dominated.
pub fn non_dominated_mask(y: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Vec<bool> {
    let rows: Vec<ArrayView1<f64>> = y.outer_iter().collect();
    rows.iter()
        .map(|a| {
            !a.iter().any(|v| v.is_nan())
                && !rows.iter().any(|b| dominates(b, a))
        })
        .collect()
}

/// Non dominated rows of `y`
pub fn pareto_front(y: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
    let indices: Vec<usize> = non_dominated_mask(y)
        .into_iter()
        .enumerate()
        .filter_map(|(i, keep)| keep.then_some(i))
        .collect();
    y.select(Axis(0), &indices)
}

/// Hypervolume dominated by `front` and bounded by `reference`.
///
/// Points not strictly better than the reference on every objective do not
/// contribute. The computation is exact: slices along the last objective are
/// accumulated recursively down to a 2D sweep.
pub fn hypervolume(
    front: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    reference: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> f64 {
    let reference = reference.to_vec();
    let points: Vec<Vec<f64>> = front
        .outer_iter()
        .filter(|p| p.iter().zip(reference.iter()).all(|(v, r)| v < r))
        .map(|p| p.to_vec())
        .collect();
    slice_volume(points, &reference)
}

/// Hypervolume gained when adding `new_points` to `front`
pub fn hypervolume_improvement(
    front: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    new_points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    reference: &ArrayBase<impl Data<Elem = f64>, Ix1>,
) -> f64 {
    if front.nrows() == 0 {
        return hypervolume(new_points, reference);
    }
    let before = hypervolume(front, reference);
    concatenate(Axis(0), &[front.view(), new_points.view()])
        .map_or(0., |all| (hypervolume(&all, reference) - before).max(0.))
}

fn slice_volume(mut points: Vec<Vec<f64>>, reference: &[f64]) -> f64 {
    if points.is_empty() {
        return 0.;
    }
    let d = reference.len();
    match d {
        0 => 0.,
        1 => {
            let best = points.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
            reference[0] - best
        }
        2 => {
            points.sort_by(|a, b| a[0].total_cmp(&b[0]));
            let mut volume = 0.;
            let mut y_min = reference[1];
            for p in points.iter() {
                if p[1] < y_min {
                    volume += (reference[0] - p[0]) * (y_min - p[1]);
                    y_min = p[1];
                }
            }
            volume
        }
        _ => {
            points.sort_by(|a, b| a[d - 1].total_cmp(&b[d - 1]));
            let mut volume = 0.;
            for i in 0..points.len() {
                let upper = points
                    .get(i + 1)
                    .map_or(reference[d - 1], |next| next[d - 1]);
                let depth = upper - points[i][d - 1];
                if depth > 0. {
                    let projected: Vec<Vec<f64>> =
                        points[..=i].iter().map(|p| p[..d - 1].to_vec()).collect();
                    volume += depth * slice_volume(projected, &reference[..d - 1]);
                }
            }
            volume
        }
    }
}
