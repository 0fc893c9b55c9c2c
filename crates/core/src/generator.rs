//! Generator interface: an algorithm proposing candidate points given the
//! history of evaluations.
use crate::data::{Data, Point};
use crate::errors::{Result, XoptError};
use crate::vocs::Vocs;

/// An optimization algorithm proposing candidates to evaluate
pub trait Generator: Send {
    /// Name of the generator, used as tag in dumped configurations
    fn name(&self) -> &'static str;

    /// Problem definition handled by the generator
    fn vocs(&self) -> &Vocs;

    /// Data known by the generator
    fn data(&self) -> &Data;

    /// Proposes `n_candidates` points to evaluate
    fn generate(&mut self, n_candidates: usize) -> Result<Vec<Point>>;

    /// Tells the generator about newly evaluated points
    fn add_data(&mut self, new_data: &Data) -> Result<()>;

    /// Replaces the whole history, typically when restoring from a dump
    fn set_data(&mut self, data: &Data) -> Result<()>;

    /// Resets the internal state of the algorithm
    fn reset(&mut self) {}

    /// Whether several candidates can be proposed at once
    fn supports_batch_generation(&self) -> bool {
        false
    }

    /// Whether several objectives can be handled
    fn supports_multi_objective(&self) -> bool {
        false
    }

    /// Whether constraints can be handled
    fn supports_constraints(&self) -> bool {
        true
    }

    /// Whether the algorithm has nothing more to propose
    fn is_done(&self) -> bool {
        false
    }

    /// Generator options as a json object (without the name tag)
    fn config_json(&self) -> Result<serde_json::Value>;
}

impl std::fmt::Debug for dyn Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Checks the given problem can be handled by a generator named `name`
pub fn validate_vocs(
    name: &str,
    vocs: &Vocs,
    multi_objective: bool,
    constraints: bool,
) -> Result<()> {
    vocs.validate()?;
    if vocs.n_objectives() == 0 {
        return Err(XoptError::VocsError(format!(
            "{name} generator requires at least one objective"
        )));
    }
    if !multi_objective && vocs.n_objectives() > 1 {
        return Err(XoptError::VocsError(format!(
            "{name} generator does not support multiple objectives"
        )));
    }
    if !constraints && vocs.n_constraints() > 0 {
        return Err(XoptError::VocsError(format!(
            "{name} generator does not support constraints"
        )));
    }
    Ok(())
}

/// Checks a batch request against generator capabilities
pub fn check_batch(generator: &dyn Generator, n_candidates: usize) -> Result<()> {
    if n_candidates == 0 {
        return Err(XoptError::GeneratorError(
            "number of candidates must be positive".to_string(),
        ));
    }
    if n_candidates > 1 && !generator.supports_batch_generation() {
        return Err(XoptError::GeneratorError(format!(
            "{} generator does not support batch generation",
            generator.name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocs::{ConstraintKind, ObjectiveKind};

    #[test]
    fn test_validate_vocs() {
        let vocs = Vocs::new()
            .variable("x", 0., 1.)
            .objective("f", ObjectiveKind::Minimize)
            .objective("g", ObjectiveKind::Minimize);
        assert!(validate_vocs("test", &vocs, true, true).is_ok());
        assert!(validate_vocs("test", &vocs, false, true).is_err());
        let vocs = Vocs::new()
            .variable("x", 0., 1.)
            .objective("f", ObjectiveKind::Minimize)
            .constraint("c", ConstraintKind::LessThan, 0.);
        assert!(validate_vocs("test", &vocs, false, false).is_err());
        let vocs = Vocs::new().variable("x", 0., 1.);
        assert!(validate_vocs("test", &vocs, true, true).is_err());
    }
}
