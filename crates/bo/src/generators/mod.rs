//! Bayesian optimization generators, each one a [crate::BayesianGenerator]
//! driven by its own acquisition strategy
mod bax;
mod ei;
mod mobo;
mod multi_fidelity;
mod ucb;

pub use bax::*;
pub use ei::*;
pub use mobo::*;
pub use multi_fidelity::*;
pub use ucb::*;
