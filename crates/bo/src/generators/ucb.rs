use crate::acquisition::{AcquisitionFunction, UpperConfidenceBound};
use crate::bayesian::{AcquisitionContext, BayesianAlgorithm, BayesianGenerator};
use crate::errors::Result;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// Upper confidence bound strategy options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpperConfidenceBoundOptions {
    /// Exploration weight, larger values favour uncertain regions
    pub beta: f64,
}

impl Default for UpperConfidenceBoundOptions {
    fn default() -> Self {
        UpperConfidenceBoundOptions { beta: 2.0 }
    }
}

impl UpperConfidenceBoundOptions {
    /// Sets the exploration weight
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }
}

/// Single objective Bayesian optimization maximizing the upper confidence
/// bound of the improvement.
///
/// ```no_run
/// use xopt_bo::{BayesianConfig, UpperConfidenceBoundGenerator, UpperConfidenceBoundOptions};
/// use xopt_core::{Evaluator, ObjectiveKind, Point, Vocs, Xopt};
/// use xopt_core::data::point;
///
/// fn f(p: &Point) -> anyhow::Result<Point> {
///     Ok(point([("f", (p["x"] - 1.).powi(2))]))
/// }
///
/// let vocs = Vocs::new()
///     .variable("x", -2., 2.)
///     .objective("f", ObjectiveKind::Minimize);
/// let generator = UpperConfidenceBoundGenerator::new(
///     &vocs,
///     BayesianConfig::default().seed(42),
///     UpperConfidenceBoundOptions::default().beta(0.5),
/// )
/// .expect("problem handled");
/// let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(f))
///     .expect("driver configured")
///     .max_evaluations(15);
/// xopt.random_evaluate(3, Some(42)).expect("initial data");
/// xopt.run().expect("optimized");
/// ```
pub type UpperConfidenceBoundGenerator = BayesianGenerator<UpperConfidenceBoundOptions>;

impl BayesianAlgorithm for UpperConfidenceBoundOptions {
    fn name(&self) -> &'static str {
        "upper_confidence_bound"
    }

    fn acquisition<'a>(
        &'a self,
        context: AcquisitionContext<'a>,
        _rng: &mut Xoshiro256Plus,
    ) -> Result<Box<dyn AcquisitionFunction + 'a>> {
        let ucb = UpperConfidenceBound::new(context.objective_model()?, self.beta);
        if context.vocs.n_constraints() == 0 {
            return Ok(Box::new(ucb));
        }
        let y = context.vocs.objective_data(context.data);
        let worst = y
            .column(0)
            .iter()
            .filter(|v| v.is_finite())
            .fold(f64::NAN, |acc, v| acc.max(*v));
        let worst = if worst.is_nan() { 0. } else { worst };
        Ok(Box::new(ucb.constraints(context.constraint_models()?, worst)))
    }

    fn options(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
