//! Machinery shared by the Bayesian optimization generators.
//!
//! A [BayesianGenerator] trains one surrogate model per output on the
//! evaluated data, builds the acquisition function of its
//! [BayesianAlgorithm] and maximizes it within the allowed region of the
//! normalized design space. Batches are generated with the Kriging believer
//! strategy: once a candidate is chosen, models are conditioned on their own
//! prediction at that candidate and the predicted outputs are appended to the
//! data the next acquisition function is built from.
use crate::acquisition::{AcquisitionFunction, PosteriorMean};
use crate::errors::{BoError, Result};
use crate::models::{KrigingModel, ModelConstructor, ModelList, Surrogate, output_value};
use crate::optimizer::AcquisitionOptimizer;
use log::debug;
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use web_time::Instant;
use xopt_core::{Data, Generator, Point, Record, Vocs, check_batch, seeded_rng, validate_vocs};

/// Options shared by Bayesian optimization generators
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianConfig {
    /// Surrogate models options
    pub model: ModelConstructor,
    /// Acquisition function optimizer options
    pub numerical_optimizer: AcquisitionOptimizer,
    /// Maximum move of each listed variable from the last evaluated point,
    /// as a fraction of the variable range
    pub max_travel_distances: Option<BTreeMap<String, f64>>,
    /// Variables held at a given value
    pub fixed_features: BTreeMap<String, f64>,
    /// Number of samples of Monte-Carlo acquisition functions
    pub n_monte_carlo_samples: usize,
    /// A random generator seed used to get reproducible candidates
    pub seed: Option<u64>,
}

impl Default for BayesianConfig {
    fn default() -> Self {
        BayesianConfig {
            model: ModelConstructor::default(),
            numerical_optimizer: AcquisitionOptimizer::default(),
            max_travel_distances: None,
            fixed_features: BTreeMap::new(),
            n_monte_carlo_samples: 128,
            seed: None,
        }
    }
}

impl BayesianConfig {
    /// Sets surrogate models options
    pub fn model(mut self, model: ModelConstructor) -> Self {
        self.model = model;
        self
    }

    /// Sets the acquisition optimizer
    pub fn numerical_optimizer(mut self, optimizer: AcquisitionOptimizer) -> Self {
        self.numerical_optimizer = optimizer;
        self
    }

    /// Restricts the move of the given variable, `distance` is a fraction
    /// of the variable range
    pub fn max_travel_distance(mut self, name: impl Into<String>, distance: f64) -> Self {
        self.max_travel_distances
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), distance);
        self
    }

    /// Holds the given variable at `value`
    pub fn fixed_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fixed_features.insert(name.into(), value);
        self
    }

    /// Sets the number of Monte-Carlo samples
    pub fn n_monte_carlo_samples(mut self, n_samples: usize) -> Self {
        self.n_monte_carlo_samples = n_samples.max(1);
        self
    }

    /// Sets the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self, vocs: &Vocs) -> Result<()> {
        for (name, distance) in self.max_travel_distances.iter().flatten() {
            if !vocs.variables.contains_key(name) {
                return Err(BoError::InvalidConfigError(format!(
                    "max travel distance of unknown variable {name}"
                )));
            }
            if !(*distance > 0.) {
                return Err(BoError::InvalidConfigError(format!(
                    "max travel distance of {name} must be positive, got {distance}"
                )));
            }
        }
        for (name, value) in &self.fixed_features {
            match vocs.variables.get(name) {
                None => {
                    return Err(BoError::InvalidConfigError(format!(
                        "fixed feature {name} is not a variable"
                    )));
                }
                Some([lower, upper]) if value < lower || value > upper => {
                    return Err(BoError::InvalidConfigError(format!(
                        "fixed feature {name}={value} out of bounds [{lower}, {upper}]"
                    )));
                }
                _ => (),
            }
        }
        Ok(())
    }
}

/// Timings of a candidates generation, in seconds
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputationTime {
    /// Surrogate models training
    pub training: f64,
    /// Acquisition function maximization
    pub acquisition_optimization: f64,
}

/// What an acquisition function can be built from
#[derive(Clone, Copy)]
pub struct AcquisitionContext<'a> {
    /// Problem definition
    pub vocs: &'a Vocs,
    /// Evaluated data
    pub data: &'a Data,
    /// Models of the outputs listed by [BayesianAlgorithm::model_outputs]
    pub models: &'a ModelList,
    /// Number of Monte-Carlo samples
    pub n_monte_carlo_samples: usize,
}

impl<'a> AcquisitionContext<'a> {
    /// Model of the first objective
    pub fn objective_model(&self) -> Result<&'a KrigingModel> {
        let name = self
            .vocs
            .objectives
            .keys()
            .next()
            .ok_or_else(|| BoError::InvalidValue("no objective defined".to_string()))?;
        self.models.get(name)
    }

    /// Models of the constraints
    pub fn constraint_models(&self) -> Result<Vec<&'a dyn Surrogate>> {
        let models = self.models;
        self.vocs
            .constraints
            .keys()
            .map(|name| models.get(name).map(|m| m as &dyn Surrogate))
            .collect()
    }

    /// Objectives (minimization form) of the successful feasible evaluations
    pub fn feasible_objectives(&self) -> Array2<f64> {
        feasible_objectives(self.vocs, self.data)
    }
}

/// Objectives (minimization form) of the successful feasible evaluations
pub fn feasible_objectives(vocs: &Vocs, data: &Data) -> Array2<f64> {
    let y = vocs.objective_data(data);
    let rows: Vec<usize> = vocs
        .feasibility_data(data)
        .iter()
        .enumerate()
        .filter(|(i, feasible)| **feasible && y.row(*i).iter().all(|v| v.is_finite()))
        .map(|(i, _)| i)
        .collect();
    y.select(Axis(0), &rows)
}

/// The acquisition strategy of a Bayesian optimization generator
pub trait BayesianAlgorithm: Send {
    /// Name of the generator
    fn name(&self) -> &'static str;

    /// Whether several objectives can be handled
    fn supports_multi_objective(&self) -> bool {
        false
    }

    /// Whether constraints can be handled
    fn supports_constraints(&self) -> bool {
        true
    }

    /// Checks the problem can be handled
    fn validate(&self, vocs: &Vocs) -> Result<()> {
        validate_vocs(
            self.name(),
            vocs,
            self.supports_multi_objective(),
            self.supports_constraints(),
        )?;
        Ok(())
    }

    /// Outputs to be modeled, objectives and constraints by default
    fn model_outputs(&self, vocs: &Vocs) -> Vec<String> {
        let mut outputs = vocs.objective_names();
        outputs.extend(vocs.constraint_names());
        outputs
    }

    /// Acquisition function to be maximized
    fn acquisition<'a>(
        &'a self,
        context: AcquisitionContext<'a>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<Box<dyn AcquisitionFunction + 'a>>;

    /// Called with the whole history each time data is added
    fn observe(&mut self, _vocs: &Vocs, _data: &Data) -> Result<()> {
        Ok(())
    }

    /// Resets algorithm state
    fn reset(&mut self) {}

    /// Algorithm options as a json object
    fn options(&self) -> Result<serde_json::Value>;
}

/// Bayesian optimization generator driven by the acquisition strategy `A`
pub struct BayesianGenerator<A: BayesianAlgorithm> {
    vocs: Vocs,
    config: BayesianConfig,
    algorithm: A,
    data: Data,
    rng: Xoshiro256Plus,
    computation_time: Vec<ComputationTime>,
}

impl<A: BayesianAlgorithm> BayesianGenerator<A> {
    /// Generator of the given problem
    pub fn new(vocs: &Vocs, config: BayesianConfig, algorithm: A) -> Result<Self> {
        algorithm.validate(vocs)?;
        config.validate(vocs)?;
        let rng = seeded_rng(config.seed);
        Ok(BayesianGenerator {
            vocs: vocs.clone(),
            config,
            algorithm,
            data: Data::new(),
            rng,
            computation_time: vec![],
        })
    }

    /// Shared options
    pub fn config(&self) -> &BayesianConfig {
        &self.config
    }

    /// Acquisition strategy
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Timings of every candidates generation
    pub fn computation_time(&self) -> &[ComputationTime] {
        &self.computation_time
    }

    /// Models of the outputs needed by the acquisition strategy
    pub fn train_models(&self) -> Result<ModelList> {
        self.config
            .model
            .build(&self.vocs, &self.data, &self.algorithm.model_outputs(&self.vocs))
    }

    /// Region of the normalized design space where candidates are searched:
    /// the unit hypercube restricted by travel distances and fixed features
    pub fn optimization_bounds(&self) -> Array2<f64> {
        let nx = self.vocs.n_variables();
        let mut bounds = Array2::from_shape_fn((nx, 2), |(_, j)| j as f64);
        let last = self
            .data
            .last()
            .and_then(|r| self.vocs.point_to_array(&r.values).ok())
            .map(|x| self.vocs.normalize_inputs(&x.insert_axis(Axis(0))));
        if let (Some(distances), Some(last)) = (&self.config.max_travel_distances, last) {
            for (i, name) in self.vocs.variables.keys().enumerate() {
                if let Some(d) = distances.get(name) {
                    let x = last[[0, i]].clamp(0., 1.);
                    bounds[[i, 0]] = (x - d).max(0.);
                    bounds[[i, 1]] = (x + d).min(1.);
                }
            }
        }
        for (i, (name, [lower, upper])) in self.vocs.variables.iter().enumerate() {
            if let Some(value) = self.config.fixed_features.get(name) {
                let x = (value - lower) / (upper - lower);
                bounds[[i, 0]] = x;
                bounds[[i, 1]] = x;
            }
        }
        bounds
    }

    /// Point of the design space from normalized variables
    fn to_point(&self, x: &Array1<f64>) -> Point {
        let mut p: Point = self
            .vocs
            .variables
            .iter()
            .zip(x.iter())
            .map(|((name, [lower, upper]), v)| {
                let value = match self.config.fixed_features.get(name) {
                    Some(fixed) => *fixed,
                    None => (lower + v * (upper - lower)).clamp(*lower, *upper),
                };
                (name.clone(), value)
            })
            .collect();
        self.vocs.add_constants(&mut p);
        p
    }

    /// Minimizer of the posterior mean of the objective
    pub fn get_optimum(&mut self) -> Result<Point> {
        if self.vocs.n_objectives() != 1 {
            return Err(BoError::InvalidValue(format!(
                "optimum is defined for one objective, got {}",
                self.vocs.n_objectives()
            )));
        }
        let objective = self.vocs.objective_names();
        let models = self.config.model.build(&self.vocs, &self.data, &objective)?;
        let acquisition = PosteriorMean::new(models.get(&objective[0])?);
        let rng = Xoshiro256Plus::seed_from_u64(self.rng.r#gen());
        let (x, _) = self.config.numerical_optimizer.maximize(
            &acquisition,
            &self.optimization_bounds(),
            rng,
        )?;
        Ok(self.to_point(&x))
    }

    /// Candidate `x` valued with the predictions of the models
    fn believed_record(&self, models: &ModelList, x: &Array1<f64>) -> Result<Record> {
        let mut values = self.to_point(x);
        let x = x.view().insert_axis(Axis(0));
        for name in models.names() {
            let (mean, _) = models.get(name)?.predict_valvar(&x)?;
            values.insert(name.clone(), output_value(&self.vocs, name, mean[0]));
        }
        Ok(Record::new(values))
    }

    fn propose(&mut self, n_candidates: usize) -> Result<Vec<Point>> {
        let start = Instant::now();
        let mut models = self.train_models()?;
        let training = start.elapsed().as_secs_f64();

        let start = Instant::now();
        let bounds = self.optimization_bounds();
        let mut pending = self.data.clone();
        let mut candidates = Vec::with_capacity(n_candidates);
        for i in 0..n_candidates {
            let x = {
                let context = AcquisitionContext {
                    vocs: &self.vocs,
                    data: &pending,
                    models: &models,
                    n_monte_carlo_samples: self.config.n_monte_carlo_samples,
                };
                let acquisition = self.algorithm.acquisition(context, &mut self.rng)?;
                let rng = Xoshiro256Plus::seed_from_u64(self.rng.r#gen());
                let (x, value) =
                    self.config
                        .numerical_optimizer
                        .maximize(&*acquisition, &bounds, rng)?;
                debug!("{} acquisition {value} at {x}", self.algorithm.name());
                x
            };
            if i + 1 < n_candidates {
                pending.push(self.believed_record(&models, &x)?);
                models = models.fantasize(&x.view().insert_axis(Axis(0)))?;
            }
            candidates.push(self.to_point(&x));
        }
        let acquisition_optimization = start.elapsed().as_secs_f64();
        debug!(
            "{} candidate(s) in {training:.3}s (training) + {acquisition_optimization:.3}s (optimization)",
            candidates.len()
        );
        self.computation_time.push(ComputationTime {
            training,
            acquisition_optimization,
        });
        Ok(candidates)
    }
}

fn merge_options(
    config: &BayesianConfig,
    options: serde_json::Value,
) -> xopt_core::Result<serde_json::Value> {
    let mut value = serde_json::to_value(config)?;
    if let (Some(map), serde_json::Value::Object(options)) = (value.as_object_mut(), options) {
        map.extend(options);
    }
    Ok(value)
}

impl<A: BayesianAlgorithm> Generator for BayesianGenerator<A> {
    fn name(&self) -> &'static str {
        self.algorithm.name()
    }

    fn vocs(&self) -> &Vocs {
        &self.vocs
    }

    fn data(&self) -> &Data {
        &self.data
    }

    fn generate(&mut self, n_candidates: usize) -> xopt_core::Result<Vec<Point>> {
        check_batch(&*self, n_candidates)?;
        Ok(self.propose(n_candidates)?)
    }

    fn add_data(&mut self, new_data: &Data) -> xopt_core::Result<()> {
        self.data.extend(new_data);
        self.algorithm.observe(&self.vocs, &self.data)?;
        Ok(())
    }

    fn set_data(&mut self, data: &Data) -> xopt_core::Result<()> {
        self.data = data.clone();
        self.algorithm.reset();
        self.algorithm.observe(&self.vocs, &self.data)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.algorithm.reset();
    }

    fn supports_batch_generation(&self) -> bool {
        true
    }

    fn supports_multi_objective(&self) -> bool {
        self.algorithm.supports_multi_objective()
    }

    fn supports_constraints(&self) -> bool {
        self.algorithm.supports_constraints()
    }

    fn config_json(&self) -> xopt_core::Result<serde_json::Value> {
        merge_options(&self.config, self.algorithm.options()?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use xopt_core::data::point;
    use xopt_core::{ConstraintKind, ObjectiveKind};

    /// Smallest distance between two candidates, in normalized units
    pub(crate) fn min_gap(vocs: &Vocs, candidates: &[Point]) -> f64 {
        let x = vocs.normalize_inputs(&vocs.variable_data(&Data::from_points(candidates.to_vec())));
        let mut gap = f64::INFINITY;
        for i in 0..x.nrows() {
            for j in i + 1..x.nrows() {
                let d = (&x.row(i) - &x.row(j)).mapv(|v| v * v).sum().sqrt();
                gap = gap.min(d);
            }
        }
        gap
    }

    #[test]
    fn test_believed_record() {
        let vocs = Vocs::new()
            .variable("x", 0., 4.)
            .objective("f", ObjectiveKind::Maximize)
            .constraint("c", ConstraintKind::GreaterThan, 1.)
            .constant("k", 7.);
        let mut generator =
            BayesianGenerator::new(&vocs, BayesianConfig::default(), TestAlgorithm).unwrap();
        let data = Data::from_points(
            [0., 1., 2., 3., 4.]
                .iter()
                .map(|&x| point([("x", x), ("f", 2. * x), ("c", x - 1.)]))
                .collect(),
        );
        generator.add_data(&data).unwrap();
        let models = generator.train_models().unwrap();
        let record = generator
            .believed_record(&models, &ndarray::array![0.5])
            .unwrap();
        // outputs come back in their raw form
        assert_abs_diff_eq!(record.get("x"), 2.);
        assert_abs_diff_eq!(record.get("f"), 4., epsilon = 1e-3);
        assert_abs_diff_eq!(record.get("c"), 1., epsilon = 1e-3);
        assert_eq!(record.get("k"), 7.);
        assert!(!record.is_error());
    }

    #[test]
    fn test_min_gap() {
        let vocs = Vocs::new().variable("x", 0., 10.);
        let candidates = [point([("x", 1.)]), point([("x", 6.)]), point([("x", 1.5)])];
        assert_abs_diff_eq!(min_gap(&vocs, &candidates), 0.05, epsilon = 1e-12);
    }

    struct TestAlgorithm;

    impl BayesianAlgorithm for TestAlgorithm {
        fn name(&self) -> &'static str {
            "test"
        }

        fn acquisition<'a>(
            &'a self,
            context: AcquisitionContext<'a>,
            _rng: &mut Xoshiro256Plus,
        ) -> Result<Box<dyn AcquisitionFunction + 'a>> {
            Ok(Box::new(PosteriorMean::new(context.objective_model()?)))
        }

        fn options(&self) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }
}
