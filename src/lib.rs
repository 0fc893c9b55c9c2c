//! `xopt`, a Rust toolbox for the optimization of experiments and simulations.
//!
//! This crate gathers the generators of the Xopt toolbox behind a single
//! facade:
//! * [xopt_core]: problem definition ([Vocs]), data, evaluator, driver
//!   ([Xopt]) and the model free generators (random, latin hypercube,
//!   extremum seeking),
//! * [xopt_ga]: the NSGA-II genetic algorithm,
//! * [xopt_bo]: Bayesian optimization generators (upper confidence bound,
//!   expected improvement, multi-objective, multi-fidelity, Bayesian
//!   algorithm execution).
//!
//! A whole optimization can be described as json (see [XoptConfig]), the
//! format written by [Xopt::dump], so that an optimization can be resumed
//! from its last dump:
//!
//! ```no_run
//! use xopt::XoptConfig;
//! use xopt::problems::Problem;
//!
//! let config = XoptConfig::from_json(
//!     r#"{
//!         "vocs": {
//!             "variables": {"x0": [-2, 2], "x1": [-2, 2]},
//!             "objectives": {"f": "MINIMIZE"}
//!         },
//!         "generator": {"name": "upper_confidence_bound", "beta": 0.5, "seed": 42},
//!         "max_evaluations": 20
//!     }"#,
//! )
//! .expect("valid configuration");
//! let mut xopt = config
//!     .build(|p: &xopt::Point| Problem::Rosenbrock.evaluate(p))
//!     .expect("driver configured");
//! xopt.random_evaluate(5, Some(42)).expect("initial data");
//! xopt.run().expect("optimized");
//! xopt.dump("target/rosenbrock.json").expect("state dumped");
//! ```
//!
//! The `xopt` binary runs the generators on the benchmark [problems].
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod problems;

mod config;

pub use crate::config::*;

pub use xopt_core::*;

pub use xopt_ga::{Nsga2Config, Nsga2Generator, PolynomialMutation, Sbx};

pub use xopt_bo::{
    AcquisitionOptimizer, BaxAlgorithm, BaxGenerator, BaxOptions, BayesianAlgorithm,
    BayesianConfig, BayesianGenerator, BoError, ExpectedImprovementGenerator,
    ExpectedImprovementOptions, GridMinimize, MoboGenerator, MoboOptions, ModelConstructor,
    MultiFidelityGenerator, MultiFidelityOptions, UpperConfidenceBoundGenerator,
    UpperConfidenceBoundOptions,
};
