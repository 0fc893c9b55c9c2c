//! Gaussian process surrogates of the problem outputs.
//!
//! One Kriging model (constant mean, squared exponential correlation) is
//! trained per modeled output on variables normalized to the unit hypercube.
//! Objectives are modeled in minimization form and constraints in their
//! `<= 0` satisfied form, so that acquisition functions never deal with
//! directions or thresholds.
use crate::errors::{BoError, Result};
use egobox_gp::correlation_models::SquaredExponentialCorr;
use egobox_gp::mean_models::ConstantMean;
use egobox_gp::{GaussianProcess, Kriging, ThetaTuning};
use linfa::prelude::*;
use log::debug;
use ndarray::{Array1, Array2, ArrayView2, Axis, concatenate};
use serde::{Deserialize, Serialize};
use xopt_core::{ConstraintKind, Data, ObjectiveKind, Vocs, XoptError};

/// A probabilistic model of a scalar output
pub trait Surrogate: Send + Sync {
    /// Posterior mean and variance at the rows of `x`
    fn predict_valvar(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)>;

    /// `n_samples` posterior sample functions evaluated at the rows of `x`,
    /// returned as a (n_points, n_samples) matrix
    fn sample(&self, x: &ArrayView2<f64>, n_samples: usize) -> Array2<f64>;
}

type Gp = GaussianProcess<f64, ConstantMean, SquaredExponentialCorr>;

/// Kriging model keeping its training data so that it can be conditioned
/// on additional (fantasized) observations
pub struct KrigingModel {
    gp: Gp,
    xt: Array2<f64>,
    yt: Array1<f64>,
}

impl KrigingModel {
    /// Trains a model, hyperparameters are optimized by maximum likelihood
    /// using `n_start` starting points
    pub fn train(xt: Array2<f64>, yt: Array1<f64>, n_start: usize) -> Result<Self> {
        let gp = Kriging::params()
            .n_start(n_start)
            .fit(&Dataset::new(xt.clone(), yt.clone()))?;
        Ok(KrigingModel { gp, xt, yt })
    }

    /// Trains a model with the given correlation hyperparameters
    pub fn with_theta(xt: Array2<f64>, yt: Array1<f64>, theta: &Array1<f64>) -> Result<Self> {
        let gp = Kriging::params()
            .theta_tuning(ThetaTuning::Fixed(theta.to_owned()))
            .fit(&Dataset::new(xt.clone(), yt.clone()))?;
        Ok(KrigingModel { gp, xt, yt })
    }

    /// Correlation hyperparameters
    pub fn theta(&self) -> &Array1<f64> {
        self.gp.theta()
    }

    /// Process variance
    pub fn variance(&self) -> f64 {
        self.gp.variance()
    }

    /// Training inputs (normalized) and outputs
    pub fn training_data(&self) -> (&Array2<f64>, &Array1<f64>) {
        (&self.xt, &self.yt)
    }

    /// Model conditioned on the additional observations `(x, y)`,
    /// hyperparameters are kept
    pub fn condition(&self, x: &ArrayView2<f64>, y: &Array1<f64>) -> Result<Self> {
        let xt = concatenate(Axis(0), &[self.xt.view(), x.view()])
            .map_err(|e| BoError::InvalidValue(e.to_string()))?;
        let yt = concatenate(Axis(0), &[self.yt.view(), y.view()])
            .map_err(|e| BoError::InvalidValue(e.to_string()))?;
        Self::with_theta(xt, yt, self.theta())
    }

    /// Model conditioned on its own posterior mean at `x` (Kriging believer)
    pub fn fantasize(&self, x: &ArrayView2<f64>) -> Result<Self> {
        let (mean, _) = self.predict_valvar(x)?;
        self.condition(x, &mean)
    }
}

impl Surrogate for KrigingModel {
    fn predict_valvar(&self, x: &ArrayView2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let (mean, var) = self.gp.predict_valvar(x)?;
        Ok((mean, var.mapv(|v| v.max(0.))))
    }

    fn sample(&self, x: &ArrayView2<f64>, n_samples: usize) -> Array2<f64> {
        self.gp.sample(x, n_samples)
    }
}

/// Models of several outputs, indexed by output name
pub struct ModelList {
    names: Vec<String>,
    models: Vec<KrigingModel>,
}

impl ModelList {
    /// Names of the modeled outputs
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no output is modeled
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model of the given output
    pub fn get(&self, name: &str) -> Result<&KrigingModel> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.models[i])
            .ok_or_else(|| BoError::InvalidValue(format!("no model of output {name}")))
    }

    /// Every model conditioned on its posterior mean at `x`
    pub fn fantasize(&self, x: &ArrayView2<f64>) -> Result<ModelList> {
        let models = self
            .models
            .iter()
            .map(|m| m.fantasize(x))
            .collect::<Result<Vec<_>>>()?;
        Ok(ModelList {
            names: self.names.clone(),
            models,
        })
    }
}

/// Builds the models of the outputs of a problem from evaluated data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConstructor {
    /// Number of likelihood optimization starts of each gaussian process
    pub n_start: usize,
}

impl Default for ModelConstructor {
    fn default() -> Self {
        ModelConstructor { n_start: 10 }
    }
}

impl ModelConstructor {
    /// Sets the number of likelihood optimization starts
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.n_start = n_start.max(1);
        self
    }

    /// Trains one model per output in `outputs`. Rows of failed evaluations
    /// or with non finite values are dropped for each model.
    pub fn build(&self, vocs: &Vocs, data: &Data, outputs: &[String]) -> Result<ModelList> {
        let x = vocs.normalize_inputs(&vocs.variable_data(data));
        let mut models = Vec::with_capacity(outputs.len());
        for name in outputs {
            let y = training_targets(vocs, data, name);
            let rows: Vec<usize> = (0..data.len())
                .filter(|&i| y[i].is_finite() && x.row(i).iter().all(|v| v.is_finite()))
                .collect();
            match rows.len() {
                0 => return Err(XoptError::NoValidResults.into()),
                1 => {
                    return Err(BoError::InvalidValue(format!(
                        "output {name}: at least 2 valid evaluations are needed to train a model"
                    )));
                }
                n => debug!("Train model of {name} on {n} points"),
            }
            let model = KrigingModel::train(
                x.select(Axis(0), &rows),
                y.select(Axis(0), &rows),
                self.n_start,
            )?;
            models.push(model);
        }
        Ok(ModelList {
            names: outputs.to_vec(),
            models,
        })
    }
}

/// Values of an output as modeled: minimization form for objectives,
/// `<= 0` form for constraints, raw values otherwise. Failed evaluations
/// give non finite values.
pub fn training_targets(vocs: &Vocs, data: &Data, name: &str) -> Array1<f64> {
    if let Some(j) = vocs.objectives.keys().position(|n| n == name) {
        vocs.objective_data(data).column(j).to_owned()
    } else if let Some(j) = vocs.constraints.keys().position(|n| n == name) {
        vocs.constraint_data(data).column(j).to_owned()
    } else {
        data.iter()
            .map(|r| if r.is_error() { f64::NAN } else { r.get(name) })
            .collect()
    }
}

/// Output value whose modeled form is `target`, inverse of [training_targets]
pub fn output_value(vocs: &Vocs, name: &str, target: f64) -> f64 {
    if let Some(kind) = vocs.objectives.get(name) {
        match kind {
            ObjectiveKind::Minimize => target,
            ObjectiveKind::Maximize => -target,
        }
    } else if let Some(cstr) = vocs.constraints.get(name) {
        match cstr.kind {
            ConstraintKind::LessThan => target + cstr.value,
            ConstraintKind::GreaterThan => cstr.value - target,
        }
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use xopt_core::data::point;
    use xopt_core::{ConstraintKind, ObjectiveKind, Record};

    fn vocs() -> Vocs {
        Vocs::new()
            .variable("x", 0., 10.)
            .objective("f", ObjectiveKind::Maximize)
            .constraint("c", ConstraintKind::GreaterThan, 1.)
    }

    fn data() -> Data {
        let mut data = Data::from_points(
            [0., 2.5, 5., 7.5, 10.]
                .iter()
                .map(|&x| point([("x", x), ("f", x * (10. - x)), ("c", x)]))
                .collect(),
        );
        data.push(Record::failed(point([("x", 3.)]), "boom"));
        data
    }

    #[test]
    fn test_training_targets() {
        let (vocs, data) = (vocs(), data());
        let f = training_targets(&vocs, &data, "f");
        assert_abs_diff_eq!(f[1], -18.75);
        assert!(f[5].is_infinite());
        let c = training_targets(&vocs, &data, "c");
        assert_abs_diff_eq!(c[1], -1.5);
        assert_abs_diff_eq!(output_value(&vocs, "f", f[1]), 18.75);
        assert_abs_diff_eq!(output_value(&vocs, "c", c[1]), 2.5);
        assert_abs_diff_eq!(output_value(&vocs, "x", 0.3), 0.3);
    }

    #[test]
    fn test_build_interpolates() {
        let (vocs, data) = (vocs(), data());
        let outputs = vec!["f".to_string(), "c".to_string()];
        let models = ModelConstructor::default().build(&vocs, &data, &outputs).unwrap();
        assert_eq!(models.len(), 2);
        let f = models.get("f").unwrap();
        // failed row dropped
        assert_eq!(f.training_data().0.nrows(), 5);
        let xt = array![[0.25], [0.75]];
        let (mean, var) = f.predict_valvar(&xt.view()).unwrap();
        assert_abs_diff_eq!(mean, array![-18.75, -18.75], epsilon = 1e-3);
        assert!(var.iter().all(|v| *v < 1e-3));
        assert!(models.get("g").is_err());
    }

    #[test]
    fn test_no_valid_results() {
        let vocs = vocs();
        let data = Data::from_records(vec![Record::failed(point([("x", 1.)]), "boom")]);
        let res = ModelConstructor::default().build(&vocs, &data, &["f".to_string()]);
        assert!(matches!(
            res,
            Err(BoError::XoptError(XoptError::NoValidResults))
        ));
    }

    #[test]
    fn test_fantasize_keeps_theta() {
        let (vocs, data) = (vocs(), data());
        let models = ModelConstructor::default()
            .build(&vocs, &data, &["f".to_string()])
            .unwrap();
        let x = array![[0.4]];
        let fantasy = models.fantasize(&x.view()).unwrap();
        let (m0, f0) = (models.get("f").unwrap(), fantasy.get("f").unwrap());
        assert_abs_diff_eq!(m0.theta(), f0.theta());
        assert_eq!(f0.training_data().0.nrows(), 6);
        let (_, var) = f0.predict_valvar(&x.view()).unwrap();
        assert!(var[0] < 1e-4);
    }
}
