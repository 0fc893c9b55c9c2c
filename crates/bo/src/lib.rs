//! Bayesian optimization generators of the Xopt toolbox.
//!
//! Every generator of this crate is a [BayesianGenerator]: Gaussian process
//! models of the problem outputs (see [models]) are trained on the evaluated
//! data, then candidates are the maximizers (see [optimizer]) of an
//! acquisition function (see [acquisition]) chosen by the strategy:
//!
//! * [UpperConfidenceBoundGenerator]: single objective, upper confidence bound,
//! * [ExpectedImprovementGenerator]: single objective, expected improvement,
//! * [MoboGenerator]: multi-objective, expected hypervolume improvement,
//! * [MultiFidelityGenerator]: multi-objective with a fidelity input, cost
//!   weighted hypervolume improvement,
//! * [BaxGenerator]: information gain about the execution of an algorithm
//!   (e.g. a grid search of the minimum of an observable) on the model.
//!
//! Constraints are handled by weighting the acquisition function with the
//! probability of feasibility. Batches of candidates are built with the
//! Kriging believer strategy.
//!
//! ```no_run
//! use xopt_bo::{BayesianConfig, ExpectedImprovementGenerator, ExpectedImprovementOptions};
//! use xopt_core::{ConstraintKind, Evaluator, ObjectiveKind, Point, Vocs, Xopt};
//! use xopt_core::data::point;
//!
//! fn f(p: &Point) -> anyhow::Result<Point> {
//!     let (x1, x2) = (p["x1"], p["x2"]);
//!     Ok(point([("f", x1 * x1 + x2 * x2), ("c", x1 + x2)]))
//! }
//!
//! let vocs = Vocs::new()
//!     .variable("x1", -1., 1.)
//!     .variable("x2", -1., 1.)
//!     .objective("f", ObjectiveKind::Minimize)
//!     .constraint("c", ConstraintKind::GreaterThan, 0.5);
//! let generator = ExpectedImprovementGenerator::new(
//!     &vocs,
//!     BayesianConfig::default().seed(42),
//!     ExpectedImprovementOptions::default(),
//! )
//! .expect("problem handled");
//! let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(f).max_workers(2))
//!     .expect("driver configured")
//!     .max_evaluations(20);
//! xopt.random_evaluate(5, Some(42)).expect("initial data");
//! xopt.run().expect("optimized");
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod acquisition;
pub mod models;
pub mod optimizer;

mod bayesian;
mod errors;
mod generators;

pub use crate::bayesian::*;
pub use crate::errors::*;
pub use crate::generators::*;
pub use crate::models::ModelConstructor;
pub use crate::optimizer::AcquisitionOptimizer;
