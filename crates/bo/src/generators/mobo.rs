use crate::acquisition::{AcquisitionFunction, ExpectedHypervolumeImprovement, ObjectivePredictor};
use crate::bayesian::{
    AcquisitionContext, BayesianAlgorithm, BayesianConfig, BayesianGenerator, feasible_objectives,
};
use crate::errors::{BoError, Result};
use log::info;
use ndarray::Array1;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xopt_core::pareto::{hypervolume, pareto_front};
use xopt_core::{Data, ObjectiveKind, Vocs, validate_vocs};

/// Reference point of the objectives in minimization form, in the order of
/// the objectives of `vocs`
pub(crate) fn min_form_reference(
    vocs: &Vocs,
    reference_point: &BTreeMap<String, f64>,
) -> Result<Array1<f64>> {
    vocs.objectives
        .iter()
        .map(|(name, kind)| match (reference_point.get(name), kind) {
            (Some(r), ObjectiveKind::Minimize) => Ok(*r),
            (Some(r), ObjectiveKind::Maximize) => Ok(-r),
            (None, _) => Err(BoError::InvalidConfigError(format!(
                "reference point of objective {name} is missing"
            ))),
        })
        .collect()
}

/// Hypervolume of the feasible observed front bounded by `reference`
pub(crate) fn front_hypervolume(vocs: &Vocs, data: &Data, reference: &Array1<f64>) -> f64 {
    hypervolume(&pareto_front(&feasible_objectives(vocs, data)), reference)
}

/// Multi-objective Bayesian optimization options
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoboOptions {
    /// Reference point of the hypervolume: the worst acceptable value of
    /// each objective
    pub reference_point: BTreeMap<String, f64>,
}

impl MoboOptions {
    /// Sets the reference value of the given objective
    pub fn reference(mut self, name: impl Into<String>, value: f64) -> Self {
        self.reference_point.insert(name.into(), value);
        self
    }
}

/// Multi-objective strategy: maximization of the expected hypervolume
/// improvement of the feasible Pareto front
#[derive(Clone, Debug, Default)]
pub struct Mobo {
    options: MoboOptions,
    hypervolume_history: Vec<f64>,
}

impl From<MoboOptions> for Mobo {
    fn from(options: MoboOptions) -> Self {
        Mobo {
            options,
            hypervolume_history: vec![],
        }
    }
}

impl Mobo {
    /// Options
    pub fn options(&self) -> &MoboOptions {
        &self.options
    }

    /// Hypervolume of the feasible front after each data update
    pub fn hypervolume_history(&self) -> &[f64] {
        &self.hypervolume_history
    }
}

/// Multi-objective Bayesian optimization generator
///
/// ```no_run
/// use xopt_bo::{BayesianConfig, MoboGenerator, MoboOptions};
/// use xopt_core::{Evaluator, ObjectiveKind, Point, Vocs, Xopt};
/// use xopt_core::data::point;
///
/// fn f(p: &Point) -> anyhow::Result<Point> {
///     Ok(point([("y1", p["x1"]), ("y2", 1. - p["x1"].sqrt() + p["x2"])]))
/// }
///
/// let vocs = Vocs::new()
///     .variable("x1", 0., 1.)
///     .variable("x2", 0., 1.)
///     .objective("y1", ObjectiveKind::Minimize)
///     .objective("y2", ObjectiveKind::Minimize);
/// let options = MoboOptions::default().reference("y1", 1.1).reference("y2", 1.1);
/// let generator = MoboGenerator::mobo(&vocs, BayesianConfig::default(), options)
///     .expect("problem handled");
/// let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(f))
///     .expect("driver configured")
///     .max_evaluations(30);
/// xopt.random_evaluate(5, None).expect("initial data");
/// xopt.run().expect("front improved");
/// ```
pub type MoboGenerator = BayesianGenerator<Mobo>;

impl MoboGenerator {
    /// Generator of the given problem
    pub fn mobo(vocs: &Vocs, config: BayesianConfig, options: MoboOptions) -> Result<Self> {
        Self::new(vocs, config, Mobo::from(options))
    }
}

impl BayesianAlgorithm for Mobo {
    fn name(&self) -> &'static str {
        "mobo"
    }

    fn supports_multi_objective(&self) -> bool {
        true
    }

    fn validate(&self, vocs: &Vocs) -> Result<()> {
        validate_vocs(self.name(), vocs, true, true)?;
        min_form_reference(vocs, &self.options.reference_point)?;
        Ok(())
    }

    fn acquisition<'a>(
        &'a self,
        context: AcquisitionContext<'a>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<Box<dyn AcquisitionFunction + 'a>> {
        let reference = min_form_reference(context.vocs, &self.options.reference_point)?;
        let objectives = context
            .vocs
            .objectives
            .keys()
            .map(|name| Ok(ObjectivePredictor::Model(context.models.get(name)?)))
            .collect::<Result<Vec<_>>>()?;
        let front = pareto_front(&context.feasible_objectives());
        Ok(Box::new(
            ExpectedHypervolumeImprovement::new(
                objectives,
                front,
                reference,
                context.n_monte_carlo_samples,
                rng,
            )
            .constraints(context.constraint_models()?),
        ))
    }

    fn observe(&mut self, vocs: &Vocs, data: &Data) -> Result<()> {
        let reference = min_form_reference(vocs, &self.options.reference_point)?;
        let hv = front_hypervolume(vocs, data, &reference);
        info!("Hypervolume {hv}");
        self.hypervolume_history.push(hv);
        Ok(())
    }

    fn reset(&mut self) {
        self.hypervolume_history.clear();
    }

    fn options(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.options)?)
    }
}
