//! Evaluation of candidate points with the user function.
//!
//! Failures never abort a batch: an `Err` returned by the function or a panic
//! raised while evaluating is captured in the [Record] error field and the
//! remaining points are still evaluated.
use crate::data::{Data, Point, Record};
use crate::errors::{Result, XoptError};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use web_time::Instant;

/// An interface for the function under optimization
///
/// The function takes the named inputs of a point (variables and constants)
/// and returns named outputs (objectives, constraints, observables).
pub trait EvalFunc: Send + Sync + Fn(&Point) -> anyhow::Result<Point> {}
impl<T> EvalFunc for T where T: Send + Sync + Fn(&Point) -> anyhow::Result<Point> {}

/// Serializable evaluator settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Number of evaluations run concurrently
    pub max_workers: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig { max_workers: 1 }
    }
}

/// Wrapper around the user function
#[derive(Clone)]
pub struct Evaluator {
    function: Arc<dyn EvalFunc>,
    config: EvaluatorConfig,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("max_workers", &self.config.max_workers)
            .finish()
    }
}

impl Evaluator {
    /// Evaluator of the given function running one evaluation at a time
    pub fn new<F: EvalFunc + 'static>(function: F) -> Self {
        Evaluator {
            function: Arc::new(function),
            config: EvaluatorConfig::default(),
        }
    }

    /// Sets the number of concurrent evaluations (at least one)
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers.max(1);
        self
    }

    /// Sets all settings at once
    pub fn configure(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self.config.max_workers = self.config.max_workers.max(1);
        self
    }

    /// Evaluator settings
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluates a single point, inputs are kept in the resulting record
    pub fn evaluate(&self, inputs: &Point) -> Record {
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*self.function)(inputs)));
        let runtime = start.elapsed().as_secs_f64();
        let mut values = inputs.clone();
        match outcome {
            Ok(Ok(outputs)) => {
                values.extend(outputs);
                Record::new(values).runtime(runtime)
            }
            Ok(Err(err)) => {
                warn!("Evaluation failed: {:#}", err);
                Record::failed(values, format!("{:#}", err)).runtime(runtime)
            }
            Err(cause) => {
                let msg = if let Some(s) = cause.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = cause.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "evaluation panicked".to_string()
                };
                warn!("Evaluation panicked: {}", msg);
                Record::failed(values, msg).runtime(runtime)
            }
        }
    }

    /// Evaluates a batch of points using up to `max_workers` threads.
    /// Records are returned in the order of the given points.
    pub fn evaluate_data(&self, inputs: &[Point]) -> Result<Data> {
        let n_workers = self.config.max_workers.min(inputs.len());
        debug!("Evaluate {} points with {} workers", inputs.len(), n_workers);
        if n_workers <= 1 {
            return Ok(inputs.iter().map(|p| self.evaluate(p)).collect());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .build()
            .map_err(|err| XoptError::EvaluationError(err.to_string()))?;
        let records: Vec<Record> =
            pool.install(|| inputs.par_iter().map(|p| self.evaluate(p)).collect());
        Ok(Data::from_records(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point;
    use anyhow::bail;

    fn quadratic(p: &Point) -> anyhow::Result<Point> {
        let x = p["x"];
        if x < 0. {
            bail!("negative input");
        }
        if x > 10. {
            panic!("too large");
        }
        Ok(point([("f", x * x)]))
    }

    #[test]
    fn test_evaluate_success() {
        let evaluator = Evaluator::new(quadratic);
        let record = evaluator.evaluate(&point([("x", 2.)]));
        assert!(!record.is_error());
        assert_eq!(record.get("f"), 4.);
        assert_eq!(record.get("x"), 2.);
        assert!(record.runtime >= 0.);
    }

    #[test]
    fn test_evaluate_errors_are_captured() {
        let evaluator = Evaluator::new(quadratic);
        let record = evaluator.evaluate(&point([("x", -1.)]));
        assert_eq!(record.error.as_deref(), Some("negative input"));
        assert!(record.get("f").is_nan());
        let record = evaluator.evaluate(&point([("x", 11.)]));
        assert_eq!(record.error.as_deref(), Some("too large"));
    }

    #[test]
    fn test_evaluate_data_keeps_order() {
        let evaluator = Evaluator::new(quadratic).max_workers(4);
        let inputs: Vec<Point> = (0..16).map(|i| point([("x", i as f64 * 0.5)])).collect();
        let data = evaluator.evaluate_data(&inputs).unwrap();
        assert_eq!(data.len(), 16);
        for (i, r) in data.iter().enumerate() {
            assert_eq!(r.get("f"), (i as f64 * 0.5).powi(2));
        }
    }

    #[test]
    fn test_max_workers_at_least_one() {
        let evaluator = Evaluator::new(quadratic).max_workers(0);
        assert_eq!(evaluator.config().max_workers, 1);
    }
}
