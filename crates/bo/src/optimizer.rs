//! Maximization of acquisition functions by multi-start latin hypercube
//! search.
use crate::acquisition::AcquisitionFunction;
use crate::errors::{BoError, Result};
use egobox_doe::{Lhs, LhsKind, SamplingMethod};
use log::debug;
use ndarray::{Array1, Array2};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Acquisition optimizer options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionOptimizer {
    /// Number of independent searches
    pub n_restarts: usize,
    /// Number of points per variable of each search
    pub n_points: usize,
}

impl Default for AcquisitionOptimizer {
    fn default() -> Self {
        AcquisitionOptimizer {
            n_restarts: 20,
            n_points: 100,
        }
    }
}

impl AcquisitionOptimizer {
    /// Sets the number of independent searches
    pub fn n_restarts(mut self, n_restarts: usize) -> Self {
        self.n_restarts = n_restarts.max(1);
        self
    }

    /// Sets the number of points per variable of each search
    pub fn n_points(mut self, n_points: usize) -> Self {
        self.n_points = n_points.max(1);
        self
    }

    fn find_lhs_max(
        &self,
        acquisition: &dyn AcquisitionFunction,
        lhs: Lhs<f64, Xoshiro256Plus>,
    ) -> Result<(Array1<f64>, f64)> {
        let n = self.n_points * lhs.sampling_space().nrows();
        let doe = lhs.sample(n);
        let values = acquisition.values(&doe.view())?;
        let best = values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1));
        match best {
            Some((i, v)) => Ok((doe.row(i).to_owned(), *v)),
            None => Err(BoError::InvalidValue(
                "acquisition function is NaN everywhere".to_string(),
            )),
        }
    }

    /// Maximizer of `acquisition` and its value within `bounds`, a (nx, 2)
    /// matrix of [lower, upper] normalized bounds
    pub fn maximize(
        &self,
        acquisition: &dyn AcquisitionFunction,
        bounds: &Array2<f64>,
        rng: Xoshiro256Plus,
    ) -> Result<(Array1<f64>, f64)> {
        let lhs = Lhs::new(bounds).kind(LhsKind::Classic).with_rng(rng);

        // Make n_restarts searches
        let optima = (0..self.n_restarts)
            .into_par_iter()
            .map(|_| self.find_lhs_max(acquisition, lhs.clone()))
            .collect::<Result<Vec<_>>>()?;

        // Pick best
        let (x, value) = optima
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| BoError::InvalidConfigError("no search done".to_string()))?;
        debug!("Acquisition maximum {value} at {x}");
        Ok((x, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{ArrayView2, array};
    use ndarray_rand::rand::SeedableRng;

    struct Peak;

    impl AcquisitionFunction for Peak {
        fn values(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
            Ok(x.rows()
                .into_iter()
                .map(|r| -(r[0] - 0.3).powi(2) - (r[1] - 0.8).powi(2))
                .collect())
        }
    }

    #[test]
    fn test_maximize() {
        let bounds = array![[0., 1.], [0., 1.]];
        let (x, value) = AcquisitionOptimizer::default()
            .maximize(&Peak, &bounds, Xoshiro256Plus::seed_from_u64(42))
            .unwrap();
        assert_abs_diff_eq!(x, array![0.3, 0.8], epsilon = 5e-2);
        assert!(value <= 0.);
    }

    #[test]
    fn test_maximize_within_bounds() {
        // fixed second variable, first one restricted
        let bounds = array![[0.5, 0.7], [0.2, 0.2]];
        let (x, _) = AcquisitionOptimizer::default()
            .n_restarts(4)
            .maximize(&Peak, &bounds, Xoshiro256Plus::seed_from_u64(0))
            .unwrap();
        assert_abs_diff_eq!(x[1], 0.2, epsilon = 1e-12);
        assert!(x[0] >= 0.5 && x[0] <= 0.52);
    }
}
