//! Constrained non dominated sorting and crowding distance used to rank
//! individuals. Objectives are in minimization form, `violation` is the total
//! constraint violation of an individual (0 when feasible).
use ndarray::{ArrayBase, Data, Ix2};
use std::cmp::Ordering;

/// Constrained domination of Deb et al.: a feasible individual dominates an
/// infeasible one, two infeasible individuals compare by violation and two
/// feasible ones by Pareto dominance.
pub fn constrained_dominates(
    y: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    violation: &[f64],
    a: usize,
    b: usize,
) -> bool {
    let (va, vb) = (violation[a], violation[b]);
    match (va > 0., vb > 0.) {
        (false, true) => true,
        (true, false) => false,
        (true, true) => va < vb,
        (false, false) => xopt_core::pareto::dominates(&y.row(a), &y.row(b)),
    }
}

/// Fast non dominated sort: indices of individuals grouped by front, best
/// front first.
pub fn fast_non_dominated_sort(
    y: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    violation: &[f64],
) -> Vec<Vec<usize>> {
    let n = y.nrows();
    let mut dominated: Vec<Vec<usize>> = vec![vec![]; n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = vec![vec![]];

    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if constrained_dominates(y, violation, p, q) {
                dominated[p].push(q);
            } else if constrained_dominates(y, violation, q, p) {
                domination_count[p] += 1;
            }
        }
        if domination_count[p] == 0 {
            fronts[0].push(p);
        }
    }

    let mut i = 0;
    while !fronts[i].is_empty() {
        let mut next = vec![];
        for &p in &fronts[i] {
            for &q in &dominated[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        i += 1;
        fronts.push(next);
    }
    fronts.pop();
    fronts
}

/// Crowding distance of the individuals of a front, in the order of `front`.
/// Boundary individuals get an infinite distance.
pub fn crowding_distance(y: &ArrayBase<impl Data<Elem = f64>, Ix2>, front: &[usize]) -> Vec<f64> {
    let n = front.len();
    let mut distance = vec![0.; n];
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }
    for j in 0..y.ncols() {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| y[[front[a], j]].total_cmp(&y[[front[b], j]]));
        let min = y[[front[order[0]], j]];
        let max = y[[front[order[n - 1]], j]];
        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;
        let span = max - min;
        if !span.is_finite() || span <= 0. {
            continue;
        }
        for k in 1..n - 1 {
            let gap = y[[front[order[k + 1]], j]] - y[[front[order[k - 1]], j]];
            distance[order[k]] += gap / span;
        }
    }
    distance
}

/// Rank (front index) and crowding distance of every individual
pub fn rank_and_crowding(
    y: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    violation: &[f64],
) -> (Vec<usize>, Vec<f64>) {
    let n = y.nrows();
    let mut rank = vec![0; n];
    let mut crowding = vec![0.; n];
    for (r, front) in fast_non_dominated_sort(y, violation).iter().enumerate() {
        for (&i, d) in front.iter().zip(crowding_distance(y, front)) {
            rank[i] = r;
            crowding[i] = d;
        }
    }
    (rank, crowding)
}

/// Crowded comparison: lower rank first, then larger crowding distance
pub fn crowded_cmp(rank: &[usize], crowding: &[f64], a: usize, b: usize) -> Ordering {
    rank[a]
        .cmp(&rank[b])
        .then_with(|| crowding[b].total_cmp(&crowding[a]))
}

/// Indices of the `n` best individuals: whole fronts are taken while they
/// fit, the last front is truncated by decreasing crowding distance.
pub fn select_best(
    y: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    violation: &[f64],
    n: usize,
) -> Vec<usize> {
    let mut selected = Vec::with_capacity(n);
    for front in fast_non_dominated_sort(y, violation) {
        if selected.len() + front.len() <= n {
            selected.extend(front);
        } else {
            let distance = crowding_distance(y, &front);
            let mut order: Vec<usize> = (0..front.len()).collect();
            order.sort_by(|&a, &b| distance[b].total_cmp(&distance[a]));
            let remaining = n - selected.len();
            selected.extend(order.into_iter().take(remaining).map(|k| front[k]));
        }
        if selected.len() >= n {
            break;
        }
    }
    selected
}
