use crate::acquisition::{AcquisitionFunction, probability_of_feasibility};
use crate::errors::Result;
use crate::models::Surrogate;
use ndarray::{Array1, ArrayView2, Zip};

/// Upper confidence bound of the improvement of a minimized objective:
/// `-mean + sqrt(beta) * std`.
///
/// With constraints, the bound is shifted by the worst observed objective
/// to be non negative and weighted by the probability of feasibility.
pub struct UpperConfidenceBound<'a> {
    objective: &'a dyn Surrogate,
    constraints: Vec<&'a dyn Surrogate>,
    beta: f64,
    worst_objective: f64,
}

impl<'a> UpperConfidenceBound<'a> {
    /// Bound of the given objective model with exploration weight `beta`
    pub fn new(objective: &'a dyn Surrogate, beta: f64) -> Self {
        UpperConfidenceBound {
            objective,
            constraints: vec![],
            beta,
            worst_objective: 0.,
        }
    }

    /// Constraint models and the worst objective value observed so far
    pub fn constraints(mut self, constraints: Vec<&'a dyn Surrogate>, worst_objective: f64) -> Self {
        self.constraints = constraints;
        self.worst_objective = worst_objective;
        self
    }
}

impl AcquisitionFunction for UpperConfidenceBound<'_> {
    fn values(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let (mean, var) = self.objective.predict_valvar(x)?;
        let sqrt_beta = self.beta.sqrt();
        let ucb = Zip::from(&mean)
            .and(&var)
            .map_collect(|m, v| -m + sqrt_beta * v.sqrt());
        if self.constraints.is_empty() {
            return Ok(ucb);
        }
        let pof = probability_of_feasibility(&self.constraints, x)?;
        Ok(Zip::from(&ucb)
            .and(&pof)
            .map_collect(|u, p| (self.worst_objective + u).max(0.) * p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::tests::Analytic;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_ucb() {
        let obj = Analytic {
            mean: |x| (x - 0.3) * (x - 0.3),
            std: 0.1,
        };
        let ucb = UpperConfidenceBound::new(&obj, 4.);
        let values = ucb.values(&array![[0.3], [0.]].view()).unwrap();
        assert_abs_diff_eq!(values, array![0.2, -0.09 + 0.2], epsilon = 1e-12);
    }

    #[test]
    fn test_constrained_ucb() {
        let obj = Analytic {
            mean: |x| x,
            std: 0.,
        };
        let cstr = Analytic {
            mean: |x| 0.5 - x,
            std: 0.,
        };
        // best objective at x=0 is infeasible
        let constraints: Vec<&dyn Surrogate> = vec![&cstr];
        let ucb = UpperConfidenceBound::new(&obj, 2.).constraints(constraints, 1.);
        let values = ucb.values(&array![[0.], [0.6], [1.]].view()).unwrap();
        assert_abs_diff_eq!(values, array![0., 0.4, 0.], epsilon = 1e-12);
    }
}
