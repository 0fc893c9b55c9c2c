use crate::acquisition::{AcquisitionFunction, VAR_EPS};
use crate::errors::Result;
use crate::models::Surrogate;
use ndarray::{Array1, ArrayView2};

/// Expected information gain about the execution path of an algorithm run
/// on the model.
///
/// The entropy of the predictive distribution is compared with its mean
/// entropy once the model is conditioned on each sampled execution path:
/// `0.5 ln var(x) - mean_k 0.5 ln var_k(x)`.
pub struct ExpectedInformationGain<'a> {
    model: &'a dyn Surrogate,
    path_models: Vec<Box<dyn Surrogate>>,
}

impl<'a> ExpectedInformationGain<'a> {
    /// Information gain of `model` given models conditioned on sampled paths
    pub fn new(model: &'a dyn Surrogate, path_models: Vec<Box<dyn Surrogate>>) -> Self {
        ExpectedInformationGain { model, path_models }
    }
}

fn entropy(var: &Array1<f64>) -> Array1<f64> {
    var.mapv(|v| 0.5 * v.max(VAR_EPS).ln())
}

impl AcquisitionFunction for ExpectedInformationGain<'_> {
    fn values(&self, x: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let (_, var) = self.model.predict_valvar(x)?;
        let mut eig = entropy(&var);
        if self.path_models.is_empty() {
            return Ok(eig);
        }
        let weight = 1. / self.path_models.len() as f64;
        for path_model in &self.path_models {
            let (_, var_k) = path_model.predict_valvar(x)?;
            eig.scaled_add(-weight, &entropy(&var_k));
        }
        Ok(eig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::tests::Analytic;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_information_gain() {
        let model = Analytic {
            mean: |x| x,
            std: 1.,
        };
        let path1 = Analytic {
            mean: |x| x,
            std: 0.5,
        };
        let path2 = Analytic {
            mean: |x| x,
            std: 1.,
        };
        let paths: Vec<Box<dyn Surrogate>> = vec![Box::new(path1), Box::new(path2)];
        let eig = ExpectedInformationGain::new(&model, paths);
        let values = eig.values(&array![[0.], [1.]].view()).unwrap();
        // 0 - 0.5 * (ln 0.25 / 2 + 0)
        let expected = Array1::from_elem(2, 0.25f64.ln().abs() / 4.);
        assert_abs_diff_eq!(values, expected, epsilon = 1e-12);
    }
}
