use crate::acquisition::{AcquisitionFunction, probability_of_feasibility};
use crate::errors::Result;
use crate::models::Surrogate;
use ndarray::{Array1, Array2, ArrayView2, Axis, concatenate};
use ndarray_rand::RandomExt;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::StandardNormal;
use xopt_core::pareto::{dominates, hypervolume};

/// How an objective (minimization form) is predicted
pub enum ObjectivePredictor<'a> {
    /// By a surrogate model
    Model(&'a dyn Surrogate),
    /// Exactly, as the opposite of the normalized variable of the given index
    NegatedVariable(usize),
}

/// Monte-Carlo estimate of the expected hypervolume improvement of the
/// observed Pareto front.
///
/// Posterior samples of the objectives are drawn from fixed standard normal
/// base samples so that the estimate is a deterministic function of `x`.
/// The improvement can be weighted by the probability of feasibility and
/// divided by an evaluation cost `fixed_cost + x[fidelity]`.
pub struct ExpectedHypervolumeImprovement<'a> {
    objectives: Vec<ObjectivePredictor<'a>>,
    constraints: Vec<&'a dyn Surrogate>,
    front: Array2<f64>,
    reference: Array1<f64>,
    base_samples: Array2<f64>,
    cost: Option<(usize, f64)>,
}

impl<'a> ExpectedHypervolumeImprovement<'a> {
    /// Improvement of `front` (n, n_obj) bounded by `reference`, estimated
    /// with `n_samples` posterior samples
    pub fn new<R: Rng>(
        objectives: Vec<ObjectivePredictor<'a>>,
        front: Array2<f64>,
        reference: Array1<f64>,
        n_samples: usize,
        rng: &mut R,
    ) -> Self {
        let base_samples =
            Array2::random_using((n_samples.max(1), objectives.len()), StandardNormal, rng);
        ExpectedHypervolumeImprovement {
            objectives,
            constraints: vec![],
            front,
            reference,
            base_samples,
            cost: None,
        }
    }

    /// Sets constraint models
    pub fn constraints(mut self, constraints: Vec<&'a dyn Surrogate>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Divides the improvement by `fixed_cost + x[fidelity]`
    pub fn cost(mut self, fidelity: usize, fixed_cost: f64) -> Self {
        self.cost = Some((fidelity, fixed_cost));
        self
    }

    fn improvement(&self, y: &Array1<f64>, front_volume: f64) -> f64 {
        let better = y.iter().zip(self.reference.iter()).all(|(v, r)| v < r);
        if !better || self.front.outer_iter().any(|p| dominates(&p, y)) {
            return 0.;
        }
        let y = y.view().insert_axis(Axis(0));
        concatenate(Axis(0), &[self.front.view(), y])
            .map_or(0., |all| (hypervolume(&all, &self.reference) - front_volume).max(0.))
    }
}

impl AcquisitionFunction for ExpectedHypervolumeImprovement<'_> {
    fn values(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let n_obj = self.objectives.len();
        let mut mean = Array2::zeros((x.nrows(), n_obj));
        let mut std = Array2::zeros((x.nrows(), n_obj));
        for (j, objective) in self.objectives.iter().enumerate() {
            match objective {
                ObjectivePredictor::Model(model) => {
                    let (m, v) = model.predict_valvar(x)?;
                    mean.column_mut(j).assign(&m);
                    std.column_mut(j).assign(&v.mapv(f64::sqrt));
                }
                ObjectivePredictor::NegatedVariable(i) => {
                    mean.column_mut(j).assign(&x.column(*i).mapv(|v| -v));
                }
            }
        }
        let front_volume = hypervolume(&self.front, &self.reference);
        let pof = probability_of_feasibility(&self.constraints, x)?;

        let values = (0..x.nrows())
            .map(|i| {
                let (m, s) = (mean.row(i), std.row(i));
                let total: f64 = self
                    .base_samples
                    .outer_iter()
                    .map(|z| self.improvement(&(&m + &(&s * &z)), front_volume))
                    .sum();
                let ehvi = total / self.base_samples.nrows() as f64 * pof[i];
                match self.cost {
                    Some((fidelity, fixed_cost)) => ehvi / (fixed_cost + x[[i, fidelity]]),
                    None => ehvi,
                }
            })
            .collect();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::tests::Analytic;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_exact_improvement() {
        let f1 = Analytic {
            mean: |x| x,
            std: 0.,
        };
        let f2 = Analytic {
            mean: |x| 1. - x,
            std: 0.,
        };
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let ehvi = ExpectedHypervolumeImprovement::new(
            vec![ObjectivePredictor::Model(&f1), ObjectivePredictor::Model(&f2)],
            array![[0., 1.], [1., 0.]],
            array![2., 2.],
            8,
            &mut rng,
        );
        // (0.5, 0.5) adds the 0.5 x 0.5 square to the front volume
        let values = ehvi.values(&array![[0.5], [0.]].view()).unwrap();
        assert_abs_diff_eq!(values, array![0.25, 0.], epsilon = 1e-12);
    }

    #[test]
    fn test_uncertainty_and_cost() {
        let f1 = Analytic {
            mean: |x| x,
            std: 0.2,
        };
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let ehvi = ExpectedHypervolumeImprovement::new(
            vec![
                ObjectivePredictor::Model(&f1),
                ObjectivePredictor::NegatedVariable(1),
            ],
            array![[0.5, -0.5]],
            array![1., 0.],
            256,
            &mut rng,
        )
        .cost(1, 1.);
        let values = ehvi.values(&array![[0.5, 0.5], [0.5, 1.]].view()).unwrap();
        // a dominating sample is possible in both cases, more at full fidelity
        assert!(values[0] > 0.);
        assert!(values[1] > values[0]);
    }
}
