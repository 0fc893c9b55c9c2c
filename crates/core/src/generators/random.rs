use crate::data::{Data, Point};
use crate::errors::Result;
use crate::generator::{Generator, check_batch};
use crate::vocs::Vocs;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// Random generator options
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomConfig {
    /// A random generator seed used to get reproducible candidates
    pub seed: Option<u64>,
}

impl RandomConfig {
    /// Sets the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Uniform sampling of the design space
pub struct RandomGenerator {
    vocs: Vocs,
    config: RandomConfig,
    data: Data,
    rng: Xoshiro256Plus,
}

impl RandomGenerator {
    /// Random generator of the given problem
    pub fn new(vocs: &Vocs, config: RandomConfig) -> Result<Self> {
        vocs.validate()?;
        let rng = seeded_rng(config.seed);
        Ok(RandomGenerator {
            vocs: vocs.clone(),
            config,
            data: Data::new(),
            rng,
        })
    }
}

/// Random generator from an optional seed
pub fn seeded_rng(seed: Option<u64>) -> Xoshiro256Plus {
    match seed {
        Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
        None => Xoshiro256Plus::from_entropy(),
    }
}

impl Generator for RandomGenerator {
    fn name(&self) -> &'static str {
        "random"
    }

    fn vocs(&self) -> &Vocs {
        &self.vocs
    }

    fn data(&self) -> &Data {
        &self.data
    }

    fn generate(&mut self, n_candidates: usize) -> Result<Vec<Point>> {
        check_batch(&*self, n_candidates)?;
        Ok(self.vocs.random_inputs(n_candidates, &mut self.rng))
    }

    fn add_data(&mut self, new_data: &Data) -> Result<()> {
        self.data.extend(new_data);
        Ok(())
    }

    fn set_data(&mut self, data: &Data) -> Result<()> {
        self.data = data.clone();
        Ok(())
    }

    fn supports_batch_generation(&self) -> bool {
        true
    }

    fn supports_multi_objective(&self) -> bool {
        true
    }

    fn config_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocs::ObjectiveKind;

    #[test]
    fn test_random_generate() {
        let vocs = Vocs::new()
            .variable("x1", -1., 1.)
            .variable("x2", 10., 20.)
            .objective("f", ObjectiveKind::Minimize);
        let mut generator = RandomGenerator::new(&vocs, RandomConfig::default().seed(42)).unwrap();
        let candidates = generator.generate(5).unwrap();
        assert_eq!(candidates.len(), 5);
        for c in &candidates {
            assert!(vocs.validate_input(c).is_ok());
        }
        let mut other = RandomGenerator::new(&vocs, RandomConfig::default().seed(42)).unwrap();
        assert_eq!(other.generate(5).unwrap(), candidates);
        assert!(generator.generate(0).is_err());
    }
}
