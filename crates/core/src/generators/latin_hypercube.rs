use crate::data::{Data, Point};
use crate::errors::Result;
use crate::generator::{Generator, check_batch};
use crate::generators::random::seeded_rng;
use crate::vocs::Vocs;
use egobox_doe::{Lhs, LhsKind, SamplingMethod};
use log::debug;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Latin hypercube generator options
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LatinHypercubeConfig {
    /// Number of points of each latin hypercube design
    pub batch_size: usize,
    /// The kind of design drawn
    pub kind: LhsKind,
    /// A random generator seed used to get reproducible designs
    pub seed: Option<u64>,
}

impl Default for LatinHypercubeConfig {
    fn default() -> Self {
        LatinHypercubeConfig {
            batch_size: 1000,
            kind: LhsKind::Classic,
            seed: None,
        }
    }
}

impl LatinHypercubeConfig {
    /// Sets the size of the designs
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets the kind of latin hypercube design
    pub fn kind(mut self, kind: LhsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Space filling sampling of the design space.
///
/// Designs of `batch_size` points are drawn at once and served in order,
/// so that any prefix of length `batch_size` of the candidates is a latin
/// hypercube design. A new design is drawn when the current one is exhausted.
pub struct LatinHypercubeGenerator {
    vocs: Vocs,
    config: LatinHypercubeConfig,
    data: Data,
    doe: Lhs<f64, Xoshiro256Plus>,
    pending: VecDeque<Point>,
}

impl LatinHypercubeGenerator {
    /// Latin hypercube generator of the given problem
    pub fn new(vocs: &Vocs, config: LatinHypercubeConfig) -> Result<Self> {
        vocs.validate()?;
        let doe = Lhs::new_with_rng(&vocs.bounds(), seeded_rng(config.seed)).kind(config.kind);
        Ok(LatinHypercubeGenerator {
            vocs: vocs.clone(),
            config,
            data: Data::new(),
            doe,
            pending: VecDeque::new(),
        })
    }

    fn draw_design(&mut self) {
        let n = self.config.batch_size.max(1);
        debug!("Draw latin hypercube design of {} points", n);
        let x = self.doe.sample(n);
        self.pending.extend(self.vocs.points_from_array(&x));
    }
}

impl Generator for LatinHypercubeGenerator {
    fn name(&self) -> &'static str {
        "latin_hypercube"
    }

    fn vocs(&self) -> &Vocs {
        &self.vocs
    }

    fn data(&self) -> &Data {
        &self.data
    }

    fn generate(&mut self, n_candidates: usize) -> Result<Vec<Point>> {
        check_batch(&*self, n_candidates)?;
        let mut candidates = Vec::with_capacity(n_candidates);
        while candidates.len() < n_candidates {
            if self.pending.is_empty() {
                self.draw_design();
            }
            if let Some(p) = self.pending.pop_front() {
                candidates.push(p);
            }
        }
        Ok(candidates)
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
    fn test_lhs_stratification() {
        let vocs = Vocs::new()
            .variable("a", 0., 1.)
            .variable("b", -5., 5.)
            .objective("f", ObjectiveKind::Minimize);
        let config = LatinHypercubeConfig::default().batch_size(10).seed(42);
        let mut generator = LatinHypercubeGenerator::new(&vocs, config).unwrap();

        let first = generator.generate(4).unwrap();
        let second = generator.generate(6).unwrap();
        let design: Vec<Point> = first.into_iter().chain(second).collect();
        // one point per interval in each dimension
        for (name, lower, width) in [("a", 0., 0.1), ("b", -5., 1.)] {
            let mut bins: Vec<usize> = design
                .iter()
                .map(|p| (((p[name] - lower) / width).floor() as usize).min(9))
                .collect();
            bins.sort();
            assert_eq!(bins, (0..10).collect::<Vec<_>>());
        }

        // next design is drawn on demand
        let more = generator.generate(3).unwrap();
        assert_eq!(more.len(), 3);
        assert!(generator.pending.len() == 7);
    }
}
