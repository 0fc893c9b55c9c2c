//! Core of the Xopt experiment optimization toolbox.
//!
//! An optimization problem is described by a [Vocs] (Variables, Objectives,
//! Constraints, Statics): bounded input variables, objectives to minimize or
//! maximize, inequality constraints, constant inputs and observed outputs.
//!
//! A [Generator] proposes candidate inputs given the history of evaluations,
//! an [Evaluator] runs the user function on them and the [Xopt] driver ties
//! everything together: each call to [Xopt::step] generates candidates,
//! evaluates them (possibly concurrently) and feeds the results back to the
//! generator.
//!
//! This crate provides generators which do not need a surrogate model:
//! * [RandomGenerator]: uniform random sampling,
//! * [LatinHypercubeGenerator]: space filling designs,
//! * [ExtremumSeekingGenerator]: bounded extremum seeking, a sequential
//!   algorithm proposing one point at a time (see [Sequential]).
//!
//! # Example
//!
//! ```
//! use xopt_core::{ConstraintKind, Evaluator, ObjectiveKind, Vocs, Xopt};
//! use xopt_core::{LatinHypercubeConfig, LatinHypercubeGenerator, Point};
//! use xopt_core::data::point;
//!
//! let vocs = Vocs::new()
//!     .variable("x1", 0., 1.)
//!     .variable("x2", 0., 1.)
//!     .objective("f", ObjectiveKind::Minimize)
//!     .constraint("c", ConstraintKind::GreaterThan, 0.5);
//!
//! fn func(p: &Point) -> anyhow::Result<Point> {
//!     Ok(point([("f", p["x1"] + p["x2"]), ("c", p["x1"])]))
//! }
//!
//! let generator = LatinHypercubeGenerator::new(&vocs, LatinHypercubeConfig::default().seed(42))
//!     .expect("problem handled");
//! let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(func).max_workers(4))
//!     .expect("driver configured")
//!     .max_evaluations(12);
//! xopt.run().expect("sampling done");
//! let (best, f_best) = vocs.select_best(xopt.data()).expect("feasible point");
//! println!("Best f={f_best} at evaluation {best}");
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod data;
pub mod pareto;

mod errors;
mod evaluator;
mod generator;
mod generators;
mod sequential;
mod vocs;
mod xopt;

pub use crate::data::{Data, Point, Record};
pub use crate::errors::*;
pub use crate::evaluator::*;
pub use crate::generator::*;
pub use crate::generators::*;
pub use crate::sequential::*;
pub use crate::vocs::*;
pub use crate::xopt::*;

/// Env variable to set the log level, defaults to `info`
pub const XOPT_LOG: &str = "XOPT_LOG";
