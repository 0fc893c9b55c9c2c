//! Variables, Objectives, Constraints and Statics (VOCS) definition of an
//! optimization problem.
//!
//! Names are kept in sorted maps so that the order of variables, objectives and
//! constraints is deterministic and is the column order used everywhere
//! (matrices handed to surrogate models, csv files).
//!
//! ```
//! use xopt_core::{ConstraintKind, ObjectiveKind, Vocs};
//!
//! let vocs = Vocs::new()
//!     .variable("x1", 0., 3.14159)
//!     .variable("x2", 0., 3.14159)
//!     .objective("y1", ObjectiveKind::Minimize)
//!     .objective("y2", ObjectiveKind::Minimize)
//!     .constraint("c1", ConstraintKind::GreaterThan, 0.)
//!     .constraint("c2", ConstraintKind::LessThan, 0.5);
//! assert!(vocs.validate().is_ok());
//! assert_eq!(vocs.n_variables(), 2);
//! ```
use crate::data::{Data, Point};
use crate::errors::{Result, XoptError};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data as NdData, Ix2};
use ndarray_rand::{RandomExt, rand::Rng, rand_distr::Uniform};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Direction of an objective
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveKind {
    /// Objective to be minimized
    Minimize,
    /// Objective to be maximized
    Maximize,
}

/// Kind of an inequality constraint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    /// Output must be greater than the constraint value
    GreaterThan,
    /// Output must be less than the constraint value
    LessThan,
}

/// An inequality constraint, serialized as a `[kind, value]` pair
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(ConstraintKind, f64)", into = "(ConstraintKind, f64)")]
pub struct Constraint {
    /// Kind of inequality
    pub kind: ConstraintKind,
    /// Threshold value
    pub value: f64,
}

impl From<(ConstraintKind, f64)> for Constraint {
    fn from((kind, value): (ConstraintKind, f64)) -> Self {
        Constraint { kind, value }
    }
}

impl From<Constraint> for (ConstraintKind, f64) {
    fn from(c: Constraint) -> Self {
        (c.kind, c.value)
    }
}

impl Constraint {
    /// Constraint value in the `<= 0` satisfied form
    pub fn violation(&self, v: f64) -> f64 {
        match self.kind {
            ConstraintKind::LessThan => v - self.value,
            ConstraintKind::GreaterThan => self.value - v,
        }
    }
}

/// Optimization problem definition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocs {
    /// Input variables with their [lower, upper] bounds
    pub variables: BTreeMap<String, [f64; 2]>,
    /// Objectives with their direction
    pub objectives: BTreeMap<String, ObjectiveKind>,
    /// Inequality constraints
    pub constraints: BTreeMap<String, Constraint>,
    /// Constant inputs passed along to every evaluation
    pub constants: BTreeMap<String, f64>,
    /// Outputs recorded without being optimized
    pub observables: Vec<String>,
}

impl Vocs {
    /// Empty problem definition
    pub fn new() -> Self {
        Vocs::default()
    }

    /// Adds a variable within [lower, upper]
    pub fn variable(mut self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.variables.insert(name.into(), [lower, upper]);
        self
    }

    /// Adds an objective
    pub fn objective(mut self, name: impl Into<String>, kind: ObjectiveKind) -> Self {
        self.objectives.insert(name.into(), kind);
        self
    }

    /// Adds an inequality constraint
    pub fn constraint(mut self, name: impl Into<String>, kind: ConstraintKind, value: f64) -> Self {
        self.constraints
            .insert(name.into(), Constraint { kind, value });
        self
    }

    /// Adds a constant input
    pub fn constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }

    /// Adds an observable output
    pub fn observable(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.observables.contains(&name) {
            self.observables.push(name);
        }
        self
    }

    /// Checks bounds and names consistency
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(XoptError::VocsError("no variable defined".to_string()));
        }
        for (name, [lower, upper]) in &self.variables {
            if !(lower.is_finite() && upper.is_finite()) || lower >= upper {
                return Err(XoptError::VocsError(format!(
                    "variable {name}: invalid bounds [{lower}, {upper}]"
                )));
            }
        }
        // a variable may also be an objective (fidelity like inputs)
        let mut inputs = BTreeSet::new();
        let mut outputs = BTreeSet::new();
        let input_names = self.variables.keys().chain(self.constants.keys());
        let output_names = self
            .objectives
            .keys()
            .chain(self.constraints.keys())
            .chain(self.observables.iter());
        for name in input_names {
            if !inputs.insert(name) {
                return Err(XoptError::VocsError(format!("duplicated name {name}")));
            }
        }
        for name in output_names {
            let shared = inputs.contains(name)
                && !(self.variables.contains_key(name) && self.objectives.contains_key(name));
            if !outputs.insert(name) || shared {
                return Err(XoptError::VocsError(format!("duplicated name {name}")));
            }
        }
        Ok(())
    }

    /// Sorted variable names
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    /// Sorted objective names
    pub fn objective_names(&self) -> Vec<String> {
        self.objectives.keys().cloned().collect()
    }

    /// Sorted constraint names
    pub fn constraint_names(&self) -> Vec<String> {
        self.constraints.keys().cloned().collect()
    }

    /// Sorted constant names
    pub fn constant_names(&self) -> Vec<String> {
        self.constants.keys().cloned().collect()
    }

    /// Objectives, constraints and observables names
    pub fn output_names(&self) -> Vec<String> {
        let mut names = self.objective_names();
        names.extend(self.constraint_names());
        names.extend(self.observables.iter().cloned());
        names
    }

    /// Variables, constants and outputs names
    pub fn all_names(&self) -> Vec<String> {
        let mut names = self.variable_names();
        names.extend(self.constant_names());
        names.extend(
            self.output_names()
                .into_iter()
                .filter(|n| !self.variables.contains_key(n)),
        );
        names
    }

    /// Number of variables
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of objectives
    pub fn n_objectives(&self) -> usize {
        self.objectives.len()
    }

    /// Number of constraints
    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Design space as a (nx, 2) matrix [[lower, upper], ...]
    pub fn bounds(&self) -> Array2<f64> {
        let mut bounds = Array2::zeros((self.n_variables(), 2));
        for (i, [lower, upper]) in self.variables.values().enumerate() {
            bounds[[i, 0]] = *lower;
            bounds[[i, 1]] = *upper;
        }
        bounds
    }

    /// Draws `n` uniform random points within bounds, constants included
    pub fn random_inputs<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<Point> {
        let x = Array2::random_using((n, self.n_variables()), Uniform::new(0., 1.), rng);
        self.points_from_array(&self.denormalize_inputs(&x))
    }

    /// Converts rows of a (n, nx) matrix of variables into points, constants included
    pub fn points_from_array(&self, x: &ArrayBase<impl NdData<Elem = f64>, Ix2>) -> Vec<Point> {
        let names = self.variable_names();
        x.outer_iter()
            .map(|row| {
                let mut p: Point = names.iter().cloned().zip(row.iter().copied()).collect();
                self.add_constants(&mut p);
                p
            })
            .collect()
    }

    /// Variable values of a point as a vector, error when one is missing
    pub fn point_to_array(&self, p: &Point) -> Result<Array1<f64>> {
        self.variables
            .keys()
            .map(|name| {
                p.get(name)
                    .copied()
                    .ok_or_else(|| XoptError::InvalidValue(format!("missing variable {name}")))
            })
            .collect()
    }

    /// Inserts constant values in the given point
    pub fn add_constants(&self, p: &mut Point) {
        for (name, value) in &self.constants {
            p.insert(name.clone(), *value);
        }
    }

    /// Checks every variable is present and within bounds
    pub fn validate_input(&self, p: &Point) -> Result<()> {
        for (name, [lower, upper]) in &self.variables {
            match p.get(name) {
                None => return Err(XoptError::InvalidValue(format!("missing variable {name}"))),
                Some(v) if v.is_nan() || *v < *lower || *v > *upper => {
                    return Err(XoptError::InvalidValue(format!(
                        "variable {name}={v} out of bounds [{lower}, {upper}]"
                    )))
                }
                _ => (),
            }
        }
        Ok(())
    }

    /// Maps variables values to the unit hypercube
    pub fn normalize_inputs(&self, x: &ArrayBase<impl NdData<Elem = f64>, Ix2>) -> Array2<f64> {
        let bounds = self.bounds();
        let lower = bounds.column(0);
        let scale = &bounds.column(1) - &lower;
        (x - &lower) / &scale
    }

    /// Maps unit hypercube values back to variables bounds
    pub fn denormalize_inputs(&self, x: &ArrayBase<impl NdData<Elem = f64>, Ix2>) -> Array2<f64> {
        let bounds = self.bounds();
        let lower = bounds.column(0);
        let scale = &bounds.column(1) - &lower;
        x * &scale + &lower
    }

    /// (n, nx) matrix of variables values
    pub fn variable_data(&self, data: &Data) -> Array2<f64> {
        data.to_array(&self.variable_names())
    }

    /// (n, ny) matrix of objectives in minimization form: maximized objectives
    /// are negated, failed or missing values are +inf.
    pub fn objective_data(&self, data: &Data) -> Array2<f64> {
        let mut y = Array2::from_elem((data.len(), self.n_objectives()), f64::INFINITY);
        for (i, record) in data.iter().enumerate() {
            if record.is_error() {
                continue;
            }
            for (j, (name, kind)) in self.objectives.iter().enumerate() {
                let v = record.get(name);
                if v.is_finite() {
                    y[[i, j]] = match kind {
                        ObjectiveKind::Minimize => v,
                        ObjectiveKind::Maximize => -v,
                    };
                }
            }
        }
        y
    }

    /// (n, nc) matrix of constraints in the `<= 0` satisfied form, failed or
    /// missing values are +inf.
    pub fn constraint_data(&self, data: &Data) -> Array2<f64> {
        let mut c = Array2::from_elem((data.len(), self.n_constraints()), f64::INFINITY);
        for (i, record) in data.iter().enumerate() {
            if record.is_error() {
                continue;
            }
            for (j, (name, cstr)) in self.constraints.iter().enumerate() {
                let v = record.get(name);
                if v.is_finite() {
                    c[[i, j]] = cstr.violation(v);
                }
            }
        }
        c
    }

    /// Whether each record is a successful evaluation satisfying all constraints
    pub fn feasibility_data(&self, data: &Data) -> Vec<bool> {
        let c = self.constraint_data(data);
        data.iter()
            .zip(c.axis_iter(Axis(0)))
            .map(|(r, ci)| !r.is_error() && ci.iter().all(|v| *v <= 0.))
            .collect()
    }

    /// Index and value of the best feasible record of a single objective problem
    pub fn select_best(&self, data: &Data) -> Result<(usize, f64)> {
        if self.n_objectives() != 1 {
            return Err(XoptError::VocsError(format!(
                "best point is defined for one objective, got {}",
                self.n_objectives()
            )));
        }
        let y = self.objective_data(data);
        let feasible = self.feasibility_data(data);
        let best = feasible
            .iter()
            .enumerate()
            .filter(|(i, f)| **f && y[[*i, 0]].is_finite())
            .map(|(i, _)| (i, y[[i, 0]]))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((i, _)) => {
                let name = &self.objective_names()[0];
                Ok((i, data.records()[i].get(name)))
            }
            None => Err(XoptError::NoValidResults),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Record, point};
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn tnk_vocs() -> Vocs {
        Vocs::new()
            .variable("x1", 0., 3.14159)
            .variable("x2", 0., 3.14159)
            .objective("y1", ObjectiveKind::Minimize)
            .objective("y2", ObjectiveKind::Maximize)
            .constraint("c1", ConstraintKind::GreaterThan, 0.)
            .constraint("c2", ConstraintKind::LessThan, 0.5)
            .constant("a", 1.0)
    }

    #[test]
    fn test_validate() {
        assert!(tnk_vocs().validate().is_ok());
        assert!(Vocs::new().validate().is_err());
        assert!(Vocs::new().variable("x", 1., 0.).validate().is_err());
        let dup = tnk_vocs().observable("x1");
        assert!(dup.validate().is_err());
        let dup = tnk_vocs().constraint("a", ConstraintKind::LessThan, 0.);
        assert!(dup.validate().is_err());
        let fidelity = tnk_vocs()
            .variable("s", 0., 1.)
            .objective("s", ObjectiveKind::Maximize);
        assert!(fidelity.validate().is_ok());
        assert_eq!(fidelity.all_names().iter().filter(|n| *n == "s").count(), 1);
    }

    #[test]
    fn test_serde_format() {
        let vocs = tnk_vocs();
        let json = serde_json::to_value(&vocs).unwrap();
        assert_eq!(json["objectives"]["y1"], "MINIMIZE");
        assert_eq!(json["constraints"]["c1"][0], "GREATER_THAN");
        let back: Vocs = serde_json::from_value(json).unwrap();
        assert_eq!(back, vocs);
    }

    #[test]
    fn test_random_inputs() {
        let vocs = tnk_vocs();
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let inputs = vocs.random_inputs(20, &mut rng);
        assert_eq!(inputs.len(), 20);
        for p in &inputs {
            assert!(vocs.validate_input(p).is_ok());
            assert_eq!(p["a"], 1.0);
        }
    }

    #[test]
    fn test_normalize() {
        let vocs = Vocs::new().variable("x", -1., 1.).variable("z", 0., 10.);
        let x = array![[0., 5.], [1., 10.]];
        let xn = vocs.normalize_inputs(&x);
        assert_abs_diff_eq!(xn, array![[0.5, 0.5], [1., 1.]]);
        assert_abs_diff_eq!(vocs.denormalize_inputs(&xn), x);
    }

    #[test]
    fn test_objective_and_constraint_data() {
        let vocs = tnk_vocs();
        let data = Data::from_records(vec![
            Record::new(point([("y1", 1.), ("y2", 2.), ("c1", 1.), ("c2", 0.)])),
            Record::new(point([("y1", 0.5), ("y2", 1.), ("c1", -1.), ("c2", 0.)])),
            Record::failed(point([("x1", 0.)]), "failed"),
        ]);
        let y = vocs.objective_data(&data);
        assert_abs_diff_eq!(y.row(0).to_owned(), array![1., -2.]);
        assert!(y[[2, 0]].is_infinite());
        let c = vocs.constraint_data(&data);
        assert_abs_diff_eq!(c.row(0).to_owned(), array![-1., -0.5]);
        assert_eq!(vocs.feasibility_data(&data), vec![true, false, false]);
    }

    #[test]
    fn test_select_best() {
        let vocs = Vocs::new()
            .variable("x", 0., 1.)
            .objective("f", ObjectiveKind::Maximize);
        let data = Data::from_points(vec![
            point([("x", 0.1), ("f", 1.)]),
            point([("x", 0.2), ("f", 3.)]),
            point([("x", 0.3), ("f", 2.)]),
        ]);
        assert_eq!(vocs.select_best(&data).unwrap(), (1, 3.));
        assert!(vocs.select_best(&Data::new()).is_err());
    }
}
