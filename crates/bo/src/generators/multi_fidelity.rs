use crate::acquisition::{AcquisitionFunction, ExpectedHypervolumeImprovement, ObjectivePredictor};
use crate::bayesian::{AcquisitionContext, BayesianAlgorithm, BayesianConfig, BayesianGenerator};
use crate::errors::{BoError, Result};
use crate::generators::mobo::{front_hypervolume, min_form_reference};
use log::info;
use ndarray::Array1;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xopt_core::pareto::pareto_front;
use xopt_core::{Data, ObjectiveKind, Vocs, validate_vocs};

/// Multi-fidelity Bayesian optimization options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiFidelityOptions {
    /// Name of the fidelity variable, in [0, 1], 1 being the highest fidelity
    pub fidelity_parameter: String,
    /// Cost of an evaluation at zero fidelity, the cost at fidelity `s` is
    /// `fixed_cost + s`
    pub fixed_cost: f64,
    /// Reference point of the objectives other than the fidelity
    pub reference_point: BTreeMap<String, f64>,
}

impl Default for MultiFidelityOptions {
    fn default() -> Self {
        MultiFidelityOptions {
            fidelity_parameter: "s".to_string(),
            fixed_cost: 1.0,
            reference_point: BTreeMap::new(),
        }
    }
}

impl MultiFidelityOptions {
    /// Sets the fixed cost of evaluations
    pub fn fixed_cost(mut self, fixed_cost: f64) -> Self {
        self.fixed_cost = fixed_cost;
        self
    }

    /// Sets the reference value of the given objective
    pub fn reference(mut self, name: impl Into<String>, value: f64) -> Self {
        self.reference_point.insert(name.into(), value);
        self
    }

    /// Problem definition where the fidelity is both a variable in [0, 1]
    /// and an objective to maximize
    pub fn extend_vocs(&self, vocs: &Vocs) -> Vocs {
        vocs.clone()
            .variable(&self.fidelity_parameter, 0., 1.)
            .objective(&self.fidelity_parameter, ObjectiveKind::Maximize)
    }

    fn reference_with_fidelity(&self) -> BTreeMap<String, f64> {
        let mut reference = self.reference_point.clone();
        reference.insert(self.fidelity_parameter.clone(), 0.);
        reference
    }
}

/// Multi-fidelity strategy: the fidelity of the evaluation is chosen along
/// with the variables by maximizing the expected hypervolume improvement of
/// (objectives, fidelity) per unit cost
#[derive(Clone, Debug, Default)]
pub struct MultiFidelity {
    options: MultiFidelityOptions,
    hypervolume_history: Vec<f64>,
}

impl From<MultiFidelityOptions> for MultiFidelity {
    fn from(options: MultiFidelityOptions) -> Self {
        MultiFidelity {
            options,
            hypervolume_history: vec![],
        }
    }
}

impl MultiFidelity {
    /// Options
    pub fn options(&self) -> &MultiFidelityOptions {
        &self.options
    }

    /// Hypervolume of the feasible (objectives, fidelity) front after each
    /// data update
    pub fn hypervolume_history(&self) -> &[f64] {
        &self.hypervolume_history
    }
}

/// Multi-fidelity Bayesian optimization generator.
///
/// Its problem definition is the user one extended with the fidelity (see
/// [MultiFidelityOptions::extend_vocs]), it is the one to hand to the
/// driver:
///
/// ```no_run
/// use xopt_bo::{BayesianConfig, MultiFidelityGenerator, MultiFidelityOptions};
/// use xopt_core::{Evaluator, Generator, ObjectiveKind, Point, Vocs, Xopt};
/// use xopt_core::data::point;
///
/// fn f(p: &Point) -> anyhow::Result<Point> {
///     // low fidelity evaluations are biased
///     Ok(point([("f", (p["x"] - 0.5).powi(2) + 0.2 * (1. - p["s"]) * p["x"])]))
/// }
///
/// let vocs = Vocs::new()
///     .variable("x", 0., 1.)
///     .objective("f", ObjectiveKind::Minimize);
/// let options = MultiFidelityOptions::default().reference("f", 1.);
/// let generator = MultiFidelityGenerator::multi_fidelity(&vocs, BayesianConfig::default(), options)
///     .expect("problem handled");
/// let vocs = generator.vocs().clone();
/// let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(f))
///     .expect("driver configured")
///     .max_evaluations(20);
/// xopt.random_evaluate(4, None).expect("initial data");
/// xopt.run().expect("optimized");
/// ```
pub type MultiFidelityGenerator = BayesianGenerator<MultiFidelity>;

impl MultiFidelityGenerator {
    /// Generator of the given problem extended with the fidelity
    pub fn multi_fidelity(
        vocs: &Vocs,
        config: BayesianConfig,
        options: MultiFidelityOptions,
    ) -> Result<Self> {
        let vocs = options.extend_vocs(vocs);
        Self::new(&vocs, config, MultiFidelity::from(options))
    }
}

impl BayesianAlgorithm for MultiFidelity {
    fn name(&self) -> &'static str {
        "multi_fidelity"
    }

    fn supports_multi_objective(&self) -> bool {
        true
    }

    fn validate(&self, vocs: &Vocs) -> Result<()> {
        validate_vocs(self.name(), vocs, true, true)?;
        let s = &self.options.fidelity_parameter;
        let is_variable = vocs.variables.get(s) == Some(&[0., 1.]);
        let is_objective = vocs.objectives.get(s) == Some(&ObjectiveKind::Maximize);
        if !(is_variable && is_objective) {
            return Err(BoError::InvalidConfigError(format!(
                "fidelity {s} must be a variable in [0, 1] and a maximized objective"
            )));
        }
        if vocs.n_objectives() < 2 {
            return Err(BoError::InvalidConfigError(
                "multi fidelity needs at least one objective besides the fidelity".to_string(),
            ));
        }
        if !(self.options.fixed_cost > 0.) {
            return Err(BoError::InvalidConfigError(format!(
                "fixed cost must be positive, got {}",
                self.options.fixed_cost
            )));
        }
        min_form_reference(vocs, &self.options.reference_with_fidelity())?;
        Ok(())
    }

    fn model_outputs(&self, vocs: &Vocs) -> Vec<String> {
        let mut outputs: Vec<String> = vocs
            .objective_names()
            .into_iter()
            .filter(|name| *name != self.options.fidelity_parameter)
            .collect();
        outputs.extend(vocs.constraint_names());
        outputs
    }

    fn acquisition<'a>(
        &'a self,
        context: AcquisitionContext<'a>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<Box<dyn AcquisitionFunction + 'a>> {
        let s = &self.options.fidelity_parameter;
        let fidelity = context
            .vocs
            .variables
            .keys()
            .position(|name| name == s)
            .ok_or_else(|| BoError::InvalidConfigError(format!("no fidelity variable {s}")))?;
        let reference = min_form_reference(context.vocs, &self.options.reference_with_fidelity())?;
        let objectives = context
            .vocs
            .objectives
            .keys()
            .map(|name| {
                if name == s {
                    Ok(ObjectivePredictor::NegatedVariable(fidelity))
                } else {
                    Ok(ObjectivePredictor::Model(context.models.get(name)?))
                }
            })
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
            .constraints(context.constraint_models()?)
            .cost(fidelity, self.options.fixed_cost),
        ))
    }

    fn observe(&mut self, vocs: &Vocs, data: &Data) -> Result<()> {
        let reference: Array1<f64> = min_form_reference(vocs, &self.options.reference_with_fidelity())?;
        let hv = front_hypervolume(vocs, data, &reference);
        info!("Hypervolume {hv} (fidelity included)");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayesian::tests::min_gap;
    use crate::optimizer::AcquisitionOptimizer;
    use xopt_core::data::point;
    use xopt_core::{Evaluator, Generator, Point, Xopt};

    fn biased(p: &Point) -> anyhow::Result<Point> {
        let (x, s) = (p["x"], p["s"]);
        Ok(point([("f", (x - 0.5).powi(2) + 0.2 * (1. - s) * x)]))
    }

    fn base_vocs() -> Vocs {
        Vocs::new()
            .variable("x", 0., 1.)
            .objective("f", ObjectiveKind::Minimize)
    }

    #[test]
    fn test_extended_vocs() {
        let options = MultiFidelityOptions::default().reference("f", 1.);
        let vocs = options.extend_vocs(&base_vocs());
        assert!(vocs.validate().is_ok());
        assert_eq!(options.extend_vocs(&vocs), vocs);
        let generator =
            MultiFidelityGenerator::multi_fidelity(&base_vocs(), BayesianConfig::default(), options)
                .unwrap();
        assert_eq!(generator.vocs(), &vocs);
        assert_eq!(generator.algorithm().model_outputs(&vocs), vec!["f".to_string()]);
        // the plain problem lacks the fidelity
        assert!(
            MultiFidelityGenerator::new(
                &base_vocs(),
                BayesianConfig::default(),
                MultiFidelity::default()
            )
            .is_err()
        );
        // reference of f is missing
        assert!(
            MultiFidelityGenerator::multi_fidelity(
                &base_vocs(),
                BayesianConfig::default(),
                MultiFidelityOptions::default()
            )
            .is_err()
        );
    }

    #[test]
    fn test_multi_fidelity_steps() {
        let options = MultiFidelityOptions::default().reference("f", 1.);
        let config = BayesianConfig::default()
            .seed(1)
            .n_monte_carlo_samples(32)
            .numerical_optimizer(AcquisitionOptimizer::default().n_restarts(4).n_points(50));
        let generator =
            MultiFidelityGenerator::multi_fidelity(&base_vocs(), config, options).unwrap();
        let vocs = generator.vocs().clone();
        let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(biased))
            .unwrap()
            .max_evaluations(8);
        xopt.random_evaluate(4, Some(3)).unwrap();
        xopt.run().unwrap();
        assert_eq!(xopt.n_evaluations(), 8);
        for record in xopt.data().iter() {
            let s = record.get("s");
            assert!((0. ..=1.).contains(&s));
            assert!(record.get("f").is_finite());
        }
        assert_eq!(xopt.generator().name(), "multi_fidelity");
    }

    #[test]
    fn test_multi_fidelity_batch_candidates_are_distinct() {
        let options = MultiFidelityOptions::default().reference("f", 1.);
        let config = BayesianConfig::default()
            .seed(5)
            .n_monte_carlo_samples(32)
            .numerical_optimizer(AcquisitionOptimizer::default().n_restarts(4).n_points(50));
        let mut generator =
            MultiFidelityGenerator::multi_fidelity(&base_vocs(), config, options).unwrap();
        let vocs = generator.vocs().clone();
        let initial = [(0.1, 0.2), (0.4, 0.9), (0.7, 0.5), (0.9, 0.1)]
            .iter()
            .map(|&(x, s)| point([("x", x), ("s", s)]))
            .collect::<Vec<_>>();
        let data = Evaluator::new(biased).evaluate_data(&initial).unwrap();
        generator.add_data(&data).unwrap();
        let candidates = generator.generate(3).unwrap();
        assert_eq!(candidates.len(), 3);
        for c in &candidates {
            assert!(vocs.validate_input(c).is_ok());
        }
        let gap = min_gap(&vocs, &candidates);
        assert!(gap > 1e-3, "candidates too close: {gap}");
    }
}
