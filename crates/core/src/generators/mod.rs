//! Generators which do not rely on a surrogate model
mod extremum_seeking;
mod latin_hypercube;
pub(crate) mod random;

pub use extremum_seeking::*;
pub use latin_hypercube::*;
pub use random::*;
