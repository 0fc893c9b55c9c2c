//! Sequential generators: algorithms like extremum seeking, Nelder-Mead or RCDS
//! which keep an internal state and propose one point at a time, each proposal
//! depending on the evaluation of the previous one.
//!
//! While such a generator is active, it only accepts the evaluation of its last
//! candidate. Calling [Generator::reset] releases the lock and lets the
//! algorithm restart from the last point of the history. The history can be
//! replaced once with [Generator::set_data] between two resets.
use crate::data::{Data, Point};
use crate::errors::{Result, XoptError};
use crate::generator::Generator;
use crate::vocs::Vocs;
use log::debug;
use ndarray::{Array1, Axis};

/// Relative tolerance used to recognize the last candidate in new data
const CANDIDATE_RTOL: f64 = 1e-6;

/// A stateful algorithm proposing one point at a time
pub trait SequentialAlgorithm: Send {
    /// Name of the algorithm
    fn name(&self) -> &'static str;

    /// Problem definition
    fn vocs(&self) -> &Vocs;

    /// Next candidate. `first_gen` is true when the algorithm (re)starts from
    /// the last point of `data`.
    fn generate_step(&mut self, first_gen: bool, data: &Data) -> Result<Point>;

    /// Updates the internal state with the evaluation of the last candidate
    fn update(&mut self, new_data: &Data) -> Result<()>;

    /// Rebuilds the internal state from a full history
    fn restore(&mut self, data: &Data) -> Result<()>;

    /// Clears the internal state
    fn reset_state(&mut self);

    /// Algorithm options as a json object
    fn config_json(&self) -> Result<serde_json::Value>;

    /// Whether the algorithm has converged
    fn is_done(&self) -> bool {
        false
    }
}

/// [Generator] wrapper enforcing the sequential protocol on an algorithm
#[derive(Debug)]
pub struct Sequential<A: SequentialAlgorithm> {
    algorithm: A,
    data: Data,
    is_active: bool,
    last_candidate: Option<Point>,
    data_set: bool,
}

impl<A: SequentialAlgorithm> Sequential<A> {
    /// Wraps the given algorithm
    pub fn new(algorithm: A) -> Self {
        Sequential {
            algorithm,
            data: Data::new(),
            is_active: false,
            last_candidate: None,
            data_set: false,
        }
    }

    /// Wrapped algorithm
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Whether a candidate was proposed since start or last reset
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Last proposed candidate
    pub fn last_candidate(&self) -> Option<&Point> {
        self.last_candidate.as_ref()
    }

    /// Checks the given point is the last candidate proposed by the generator
    pub fn validate_point(&self, point: &Point) -> Result<()> {
        let candidate = self.last_candidate.as_ref().ok_or_else(|| {
            XoptError::SequentialError("no candidate was generated".to_string())
        })?;
        let vocs = self.algorithm.vocs();
        let expected = vocs.point_to_array(candidate)?;
        let actual = vocs.point_to_array(point)?;
        let close = expected
            .iter()
            .zip(actual.iter())
            .all(|(e, a)| (a - e).abs() <= CANDIDATE_RTOL * e.abs());
        if !close {
            return Err(XoptError::SequentialError(
                "cannot add data that was not generated by the generator when it is active, \
                 call reset() first in order to add data via other methods"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl<A: SequentialAlgorithm> Generator for Sequential<A> {
    fn name(&self) -> &'static str {
        self.algorithm.name()
    }

    fn vocs(&self) -> &Vocs {
        self.algorithm.vocs()
    }

    fn data(&self) -> &Data {
        &self.data
    }

    fn generate(&mut self, n_candidates: usize) -> Result<Vec<Point>> {
        if n_candidates > 1 {
            return Err(XoptError::SequentialError(
                "sequential generators can only generate one candidate at a time".to_string(),
            ));
        }
        let first_gen = !self.is_active;
        let candidate = self.algorithm.generate_step(first_gen, &self.data)?;
        self.is_active = true;
        debug!("{} candidate: {:?}", self.algorithm.name(), candidate);
        self.last_candidate = Some(candidate.clone());
        Ok(vec![candidate])
    }

    fn add_data(&mut self, new_data: &Data) -> Result<()> {
        if self.is_active {
            if self.last_candidate.is_none() {
                return Err(XoptError::SequentialError(
                    "generator is active, but no candidate was generated".to_string(),
                ));
            }
            if new_data.len() > 1 {
                return Err(XoptError::SequentialError(
                    "cannot add more than one data point when generator is active".to_string(),
                ));
            }
            if let Some(record) = new_data.last() {
                self.validate_point(&record.values)?;
            }
        }
        self.data.extend(new_data);
        self.algorithm.update(new_data)
    }

    fn set_data(&mut self, data: &Data) -> Result<()> {
        if self.data_set {
            return Err(XoptError::SequentialError(
                "data has already been initialized for this generator".to_string(),
            ));
        }
        self.algorithm.restore(data)?;
        self.data = data.clone();
        self.data_set = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.is_active = false;
        self.last_candidate = None;
        self.data_set = false;
        self.algorithm.reset_state();
    }

    fn is_done(&self) -> bool {
        self.algorithm.is_done()
    }

    fn config_json(&self) -> Result<serde_json::Value> {
        self.algorithm.config_json()
    }
}

/// Variables and objectives of the last record, the starting point of
/// sequential algorithms
pub fn initial_point(name: &str, vocs: &Vocs, data: &Data) -> Result<(Array1<f64>, Array1<f64>)> {
    if data.is_empty() {
        return Err(XoptError::GeneratorError(format!(
            "at least one point is required to start {name}, add data manually \
             or via Xopt::random_evaluate() or Xopt::evaluate_data()"
        )));
    }
    let last = data.tail(1);
    let x0 = vocs.variable_data(&last).index_axis_move(Axis(0), 0);
    let f0 = vocs.objective_data(&last).index_axis_move(Axis(0), 0);
    Ok((x0, f0))
}
