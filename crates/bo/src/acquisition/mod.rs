//! Acquisition functions: scores of candidate points computed from surrogate
//! predictions, the next candidates being the maximizers of the score.
//! All functions work on variables normalized to the unit hypercube.
mod bax;
mod ehvi;
mod ei;
mod ucb;

pub use bax::*;
pub use ehvi::*;
pub use ei::*;
pub use ucb::*;

use crate::errors::Result;
use crate::models::Surrogate;
use libm::erfc;
use ndarray::{Array1, ArrayView2};

const SQRT_2PI: f64 = 2.5066282746310007;

/// Variance below which a prediction is considered exact
pub(crate) const VAR_EPS: f64 = 1e-12;

/// A score of candidate points to be maximized
pub trait AcquisitionFunction: Sync {
    /// Scores of the rows of `x` (normalized variables)
    fn values(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>>;
}

/// Opposite of the posterior mean of a minimized objective, its maximizer
/// is the predicted optimum
pub struct PosteriorMean<'a> {
    objective: &'a dyn Surrogate,
}

impl<'a> PosteriorMean<'a> {
    /// Posterior mean of the given objective model
    pub fn new(objective: &'a dyn Surrogate) -> Self {
        PosteriorMean { objective }
    }
}

impl AcquisitionFunction for PosteriorMean<'_> {
    fn values(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let (mean, _) = self.objective.predict_valvar(x)?;
        Ok(-mean)
    }
}

/// Cumulative distribution function of Standard Normal at x
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Probability density function of Standard Normal at x
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

/// Probability that every constraint model (in `<= 0` form) is satisfied
/// at the rows of `x`, constraints being considered independent
pub fn probability_of_feasibility(
    constraints: &[&dyn Surrogate],
    x: &ArrayView2<f64>,
) -> Result<Array1<f64>> {
    let mut pof = Array1::ones(x.nrows());
    for cstr in constraints {
        let (mean, var) = cstr.predict_valvar(x)?;
        for ((p, m), v) in pof.iter_mut().zip(mean.iter()).zip(var.iter()) {
            *p *= if *v < VAR_EPS {
                if *m <= 0. { 1. } else { 0. }
            } else {
                norm_cdf(-m / v.sqrt())
            };
        }
    }
    Ok(pof)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::Result;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    /// Surrogate with closed form predictions used to check acquisitions
    pub(crate) struct Analytic {
        pub mean: fn(f64) -> f64,
        pub std: f64,
    }

    impl Surrogate for Analytic {
        fn predict_valvar(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
            let mean = x.column(0).mapv(self.mean);
            let var = Array1::from_elem(x.nrows(), self.std * self.std);
            Ok((mean, var))
        }

        fn sample(&self, x: &ArrayView2<f64>, n_samples: usize) -> Array2<f64> {
            let mean = x.column(0).mapv(self.mean);
            Array2::from_shape_fn((x.nrows(), n_samples), |(i, _)| mean[i])
        }
    }

    #[test]
    fn test_norm() {
        assert_abs_diff_eq!(norm_cdf(0.), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_cdf(1.96), 0.975, epsilon = 1e-3);
        assert_abs_diff_eq!(norm_pdf(0.), 1. / SQRT_2PI, epsilon = 1e-12);
    }

    #[test]
    fn test_probability_of_feasibility() {
        let c1 = Analytic {
            mean: |x| x - 0.5,
            std: 0.1,
        };
        let exact = Analytic {
            mean: |x| x - 0.8,
            std: 0.,
        };
        let x = array![[0.5], [0.9], [0.]];
        let constraints: [&dyn Surrogate; 2] = [&c1, &exact];
        let pof = probability_of_feasibility(&constraints, &x.view()).unwrap();
        assert_abs_diff_eq!(pof[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(pof[1], 0.);
        assert!(pof[2] > 0.999);
    }
}
