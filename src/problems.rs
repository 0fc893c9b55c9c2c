//! Benchmark problems used by the `xopt` command line and the tests.
//!
//! Each problem is a problem definition ([Vocs]) along with the function to
//! evaluate.
use crate::{ConstraintKind, ObjectiveKind, Point, Vocs};
use argmin_testfunctions::{ackley, rosenbrock, sphere};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xopt_core::data::point;

/// Available benchmark problems
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Problem {
    /// Rosenbrock function of 2 variables in [-2, 2]
    Rosenbrock,
    /// Ackley function of 2 variables in [-5, 5]
    Ackley,
    /// Sphere function of 3 variables in [-5, 5]
    Sphere,
    /// Two objectives, two constraints problem of Tanaka
    Tnk,
    /// ZDT1 two objectives problem of 5 variables
    Zdt1,
}

/// Number of variables of the ZDT1 problem
pub const ZDT1_DIM: usize = 5;

impl Problem {
    /// Problem definition
    pub fn vocs(&self) -> Vocs {
        match self {
            Problem::Rosenbrock => Vocs::new()
                .variable("x0", -2., 2.)
                .variable("x1", -2., 2.)
                .objective("f", ObjectiveKind::Minimize),
            Problem::Ackley => Vocs::new()
                .variable("x0", -5., 5.)
                .variable("x1", -5., 5.)
                .objective("f", ObjectiveKind::Minimize),
            Problem::Sphere => Vocs::new()
                .variable("x0", -5., 5.)
                .variable("x1", -5., 5.)
                .variable("x2", -5., 5.)
                .objective("f", ObjectiveKind::Minimize),
            Problem::Tnk => Vocs::new()
                .variable("x1", 0., std::f64::consts::PI)
                .variable("x2", 0., std::f64::consts::PI)
                .objective("y1", ObjectiveKind::Minimize)
                .objective("y2", ObjectiveKind::Minimize)
                .constraint("c1", ConstraintKind::GreaterThan, 0.)
                .constraint("c2", ConstraintKind::LessThan, 0.5),
            Problem::Zdt1 => (0..ZDT1_DIM)
                .fold(Vocs::new(), |vocs, i| vocs.variable(format!("x{i}"), 0., 1.))
                .objective("f1", ObjectiveKind::Minimize)
                .objective("f2", ObjectiveKind::Minimize),
        }
    }

    /// Hypervolume reference point, a bound of the interesting values of
    /// each objective
    pub fn reference_point(&self) -> BTreeMap<String, f64> {
        let reference: &[(&str, f64)] = match self {
            Problem::Rosenbrock => &[("f", 3000.)],
            Problem::Ackley => &[("f", 15.)],
            Problem::Sphere => &[("f", 75.)],
            Problem::Tnk => &[("y1", 1.5), ("y2", 1.5)],
            Problem::Zdt1 => &[("f1", 1.1), ("f2", 11.)],
        };
        reference.iter().map(|(name, v)| (name.to_string(), *v)).collect()
    }

    /// Evaluates the problem outputs at the given inputs
    pub fn evaluate(&self, p: &Point) -> anyhow::Result<Point> {
        let vocs = self.vocs();
        let x = vocs.point_to_array(p)?.to_vec();
        let outputs = match self {
            Problem::Rosenbrock => point([("f", rosenbrock(&x))]),
            Problem::Ackley => point([("f", ackley(&x))]),
            Problem::Sphere => point([("f", sphere(&x))]),
            Problem::Tnk => tnk(x[0], x[1]),
            Problem::Zdt1 => zdt1(&x),
        };
        Ok(outputs)
    }
}

/// Tanaka problem: objectives are the inputs, the feasible region is the
/// ring `c1 >= 0`, `c2 <= 0.5` with a wavy inner border
pub fn tnk(x1: f64, x2: f64) -> Point {
    let angle = if x1 == 0. && x2 == 0. { 0. } else { x2.atan2(x1) };
    let c1 = x1 * x1 + x2 * x2 - 1. - 0.1 * (16. * angle).cos();
    let c2 = (x1 - 0.5).powi(2) + (x2 - 0.5).powi(2);
    point([("y1", x1), ("y2", x2), ("c1", c1), ("c2", c2)])
}

/// ZDT1 problem, the Pareto front is `f2 = 1 - sqrt(f1)` reached when
/// every variable but the first one is zero
pub fn zdt1(x: &[f64]) -> Point {
    let f1 = x[0];
    let g = 1. + 9. * x[1..].iter().sum::<f64>() / (x.len() - 1) as f64;
    let f2 = g * (1. - (f1 / g).sqrt());
    point([("f1", f1), ("f2", f2)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_problems_evaluate() {
        let p = point([("x0", 1.), ("x1", 1.)]);
        let f = Problem::Rosenbrock.evaluate(&p).unwrap();
        assert_abs_diff_eq!(f["f"], 0.);
        let p = point([("x0", 0.), ("x1", 0.)]);
        assert_abs_diff_eq!(Problem::Ackley.evaluate(&p).unwrap()["f"], 0., epsilon = 1e-12);
        let p = point([("x0", 1.), ("x1", 2.), ("x2", 0.)]);
        assert_abs_diff_eq!(Problem::Sphere.evaluate(&p).unwrap()["f"], 5.);
        // missing variable
        assert!(Problem::Sphere.evaluate(&point([("x0", 1.)])).is_err());
    }

    #[test]
    fn test_tnk() {
        let y = tnk(1., 0.5);
        assert_abs_diff_eq!(y["y1"], 1.);
        assert_abs_diff_eq!(y["c2"], 0.25);
        let vocs = Problem::Tnk.vocs();
        assert!(vocs.validate().is_ok());
        assert_eq!(vocs.n_constraints(), 2);
        let reference = Problem::Tnk.reference_point();
        assert!(vocs.objective_names().iter().all(|n| reference.contains_key(n)));
    }

    #[test]
    fn test_zdt1_front() {
        let mut x = vec![0.; ZDT1_DIM];
        x[0] = 0.25;
        let y = zdt1(&x);
        assert_abs_diff_eq!(y["f2"], 0.5);
        assert_eq!(Problem::Zdt1.vocs().n_variables(), ZDT1_DIM);
    }
}
