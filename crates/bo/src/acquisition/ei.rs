use crate::acquisition::{
    AcquisitionFunction, VAR_EPS, norm_cdf, norm_pdf, probability_of_feasibility,
};
use crate::errors::Result;
use crate::models::Surrogate;
use ndarray::{Array1, ArrayView2, Zip};

/// Expected improvement over `f_min` of a minimized objective predicted
/// with the given mean and variance
pub fn expected_improvement(mean: f64, var: f64, f_min: f64) -> f64 {
    if var < VAR_EPS {
        0.
    } else {
        let sigma = var.sqrt();
        let args0 = (f_min - mean) / sigma;
        let args1 = args0 * norm_cdf(args0);
        let args2 = norm_pdf(args0);
        sigma * (args1 + args2)
    }
}

/// Expected improvement weighted by the probability of feasibility.
///
/// When no feasible point is known yet (`f_min` is None) the probability
/// of feasibility alone is maximized.
pub struct ExpectedImprovement<'a> {
    objective: &'a dyn Surrogate,
    constraints: Vec<&'a dyn Surrogate>,
    f_min: Option<f64>,
}

impl<'a> ExpectedImprovement<'a> {
    /// Improvement of the given objective model over the best value `f_min`
    pub fn new(objective: &'a dyn Surrogate, f_min: Option<f64>) -> Self {
        ExpectedImprovement {
            objective,
            constraints: vec![],
            f_min,
        }
    }

    /// Sets constraint models
    pub fn constraints(mut self, constraints: Vec<&'a dyn Surrogate>) -> Self {
        self.constraints = constraints;
        self
    }
}

impl AcquisitionFunction for ExpectedImprovement<'_> {
    fn values(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let pof = probability_of_feasibility(&self.constraints, x)?;
        let Some(f_min) = self.f_min else {
            return Ok(pof);
        };
        let (mean, var) = self.objective.predict_valvar(x)?;
        Ok(Zip::from(&mean)
            .and(&var)
            .and(&pof)
            .map_collect(|m, v, p| expected_improvement(*m, *v, f_min) * p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::tests::Analytic;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_expected_improvement() {
        // at the current minimum: sigma * pdf(0)
        assert_abs_diff_eq!(
            expected_improvement(1., 0.04, 1.),
            0.2 * norm_pdf(0.),
            epsilon = 1e-12
        );
        // nothing to expect where the prediction is certain
        assert_abs_diff_eq!(expected_improvement(0.5, 0., 1.), 0.);
        assert_abs_diff_eq!(expected_improvement(2., 0., 1.), 0.);
        assert!(expected_improvement(0.5, 0.01, 1.) > expected_improvement(0.9, 0.01, 1.));
    }

    #[test]
    fn test_ei_acquisition() {
        let obj = Analytic {
            mean: |x| (x - 0.3) * (x - 0.3),
            std: 0.05,
        };
        let ei = ExpectedImprovement::new(&obj, Some(0.04));
        let values = ei.values(&array![[0.3], [0.5], [0.9]].view()).unwrap();
        assert!(values[0] > values[1] && values[1] > values[2]);

        let cstr = Analytic {
            mean: |x| x - 0.4,
            std: 0.,
        };
        let constraints: Vec<&dyn Surrogate> = vec![&cstr];
        let ei = ExpectedImprovement::new(&obj, None).constraints(constraints);
        let values = ei.values(&array![[0.3], [0.5]].view()).unwrap();
        assert_abs_diff_eq!(values, array![1., 0.]);
    }
}
