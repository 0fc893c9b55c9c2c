//! Genetic algorithm generators of the Xopt toolbox.
//!
//! [Nsga2Generator] implements the NSGA-II multi-objective genetic algorithm
//! as a batch [xopt_core::Generator]: candidates are offspring of the current
//! population, and a new population is selected each time a population worth
//! of offspring has been evaluated. Failed evaluations are kept as infeasible
//! individuals.
//!
//! When an output directory is given, every evaluation, every population and
//! periodic checkpoints of the generator are written there (see [output]).
//!
//! ```no_run
//! use xopt_core::{Evaluator, ObjectiveKind, Point, Vocs, Xopt};
//! use xopt_core::data::point;
//! use xopt_ga::{Nsga2Config, Nsga2Generator};
//!
//! fn zdt1(p: &Point) -> anyhow::Result<Point> {
//!     let (x1, x2) = (p["x1"], p["x2"]);
//!     let g = 1. + 9. * x2;
//!     Ok(point([("f1", x1), ("f2", g * (1. - (x1 / g).sqrt()))]))
//! }
//!
//! let vocs = Vocs::new()
//!     .variable("x1", 0., 1.)
//!     .variable("x2", 0., 1.)
//!     .objective("f1", ObjectiveKind::Minimize)
//!     .objective("f2", ObjectiveKind::Minimize);
//! let config = Nsga2Config::default()
//!     .population_size(20)
//!     .output_path("target/nsga2_zdt1");
//! let generator = Nsga2Generator::new(&vocs, config).expect("nsga2 configured");
//! let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(zdt1).max_workers(20))
//!     .expect("driver configured")
//!     .max_evaluations(400);
//! xopt.run().expect("zdt1 optimized");
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod operators;
pub mod output;
pub mod sorting;

mod nsga2;

pub use crate::nsga2::*;
pub use crate::operators::{PolynomialMutation, Sbx};
