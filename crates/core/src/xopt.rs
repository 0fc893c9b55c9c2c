//! The optimization driver: ties a problem definition, a generator and an
//! evaluator together and keeps the history of evaluations.
use crate::data::{Data, Point};
use crate::errors::{Result, XoptError};
use crate::evaluator::Evaluator;
use crate::generator::Generator;
use crate::generators::random::seeded_rng;
use crate::vocs::Vocs;
use crate::XOPT_LOG;
use env_logger::{Builder, Env};
use log::{debug, info};
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Optimization driver
///
/// ```no_run
/// use xopt_core::{Evaluator, ObjectiveKind, Point, RandomConfig, RandomGenerator, Vocs, Xopt};
/// use xopt_core::data::point;
///
/// fn square(p: &Point) -> anyhow::Result<Point> {
///     Ok(point([("f", p["x"] * p["x"])]))
/// }
///
/// let vocs = Vocs::new()
///     .variable("x", -5., 5.)
///     .objective("f", ObjectiveKind::Minimize);
/// let generator = RandomGenerator::new(&vocs, RandomConfig::default()).unwrap();
/// let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(square))
///     .unwrap()
///     .max_evaluations(20);
/// xopt.run().unwrap();
/// assert_eq!(xopt.n_evaluations(), 20);
/// ```
#[derive(Debug)]
pub struct Xopt {
    vocs: Vocs,
    generator: Box<dyn Generator>,
    evaluator: Evaluator,
    strict: bool,
    max_evaluations: Option<usize>,
    dump_file: Option<PathBuf>,
    data: Data,
}

impl Xopt {
    /// Driver of the given generator. The generator has to handle the given problem.
    pub fn new(vocs: &Vocs, generator: Box<dyn Generator>, evaluator: Evaluator) -> Result<Self> {
        let env = Env::new().filter_or(XOPT_LOG, "info");
        let mut builder = Builder::from_env(env);
        let builder = builder.target(env_logger::Target::Stdout);
        builder.try_init().ok();

        vocs.validate()?;
        if generator.vocs() != vocs {
            return Err(XoptError::VocsError(format!(
                "{} generator was built for a different problem",
                generator.name()
            )));
        }
        Ok(Xopt {
            vocs: vocs.clone(),
            generator,
            evaluator,
            strict: false,
            max_evaluations: None,
            dump_file: None,
            data: Data::new(),
        })
    }

    /// When true, a failed evaluation is reported as an error
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the evaluation budget used by [Xopt::run]
    pub fn max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    /// Sets a file where the driver state is dumped after each new data
    pub fn dump_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dump_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Problem definition
    pub fn vocs(&self) -> &Vocs {
        &self.vocs
    }

    /// The generator
    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// The generator, mutable
    pub fn generator_mut(&mut self) -> &mut dyn Generator {
        self.generator.as_mut()
    }

    /// The evaluator
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// History of evaluations
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Number of evaluations in the history
    pub fn n_evaluations(&self) -> usize {
        self.data.len()
    }

    /// Whether the evaluation budget is spent or the generator is done
    pub fn is_done(&self) -> bool {
        self.budget_spent() || self.generator.is_done()
    }

    fn budget_spent(&self) -> bool {
        self.max_evaluations
            .is_some_and(|max| self.n_evaluations() >= max)
    }

    /// Generates candidates, evaluates them and feeds the results back to
    /// the generator. Batches are sized by the evaluator workers when the
    /// generator supports it.
    pub fn step(&mut self) -> Result<()> {
        if let Some(max) = self.max_evaluations {
            if self.n_evaluations() >= max {
                return Err(XoptError::MaxEvaluations(max));
            }
        }
        if self.generator.is_done() {
            info!("{} generator is done", self.generator.name());
            return Ok(());
        }
        let mut n_candidates = if self.generator.supports_batch_generation() {
            self.evaluator.config().max_workers
        } else {
            1
        };
        if let Some(max) = self.max_evaluations {
            n_candidates = n_candidates.min(max - self.n_evaluations());
        }
        let candidates = self.generator.generate(n_candidates)?;
        let new_data = self.evaluate_points(candidates)?;
        info!(
            "Step {}: +{} evaluation(s), {} error(s)",
            self.n_evaluations(),
            new_data.len(),
            new_data.iter().filter(|r| r.is_error()).count()
        );
        Ok(())
    }

    /// Runs steps until the evaluation budget is spent or the generator is done
    pub fn run(&mut self) -> Result<()> {
        if self.max_evaluations.is_none() {
            return Err(XoptError::InvalidValue(
                "max_evaluations must be set to run".to_string(),
            ));
        }
        while !self.is_done() {
            self.step()?;
        }
        if let Ok((i, best)) = self.vocs.select_best(&self.data) {
            info!("Best objective {} at evaluation {}", best, i);
        }
        Ok(())
    }

    /// Evaluates the given points and adds the results to the history
    pub fn evaluate_data(&mut self, points: &[Point]) -> Result<Data> {
        self.evaluate_points(points.to_vec())
    }

    /// Evaluates `n` random points and adds the results to the history
    pub fn random_evaluate(&mut self, n: usize, seed: Option<u64>) -> Result<Data> {
        let mut rng = seeded_rng(seed);
        let points = self.vocs.random_inputs(n, &mut rng);
        self.evaluate_points(points)
    }

    fn evaluate_points(&mut self, mut points: Vec<Point>) -> Result<Data> {
        for p in points.iter_mut() {
            self.vocs.add_constants(p);
            self.vocs.validate_input(p)?;
        }
        let new_data = self.evaluator.evaluate_data(&points)?;
        self.add_data(new_data.clone())?;
        Ok(new_data)
    }

    /// Adds evaluated data to the history and to the generator
    pub fn add_data(&mut self, new_data: Data) -> Result<()> {
        if self.strict {
            if let Some(failed) = new_data.iter().find(|r| r.is_error()) {
                return Err(XoptError::EvaluationError(
                    failed.error.clone().unwrap_or_default(),
                ));
            }
        }
        self.generator.add_data(&new_data)?;
        self.data.extend(&new_data);
        if let Some(path) = self.dump_file.clone() {
            self.dump(path)?;
        }
        Ok(())
    }

    /// Replaces the history, the generator is reset with it
    pub fn set_data(&mut self, data: Data) -> Result<()> {
        self.generator.reset();
        self.generator.set_data(&data)?;
        self.data = data;
        Ok(())
    }

    /// Removes rows of the history
    pub fn remove_data(&mut self, indices: &[usize]) -> Result<()> {
        let mut data = self.data.clone();
        data.remove(indices)?;
        self.set_data(data)
    }

    /// Clears the history
    pub fn reset_data(&mut self) -> Result<()> {
        self.set_data(Data::new())
    }

    /// Driver state as a json object
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut generator = match self.generator.config_json()? {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("options".to_string(), other);
                map
            }
        };
        generator.insert("name".to_string(), json!(self.generator.name()));
        Ok(json!({
            "vocs": self.vocs,
            "generator": generator,
            "evaluator": self.evaluator.config(),
            "strict": self.strict,
            "max_evaluations": self.max_evaluations,
            "dump_file": self.dump_file,
            "data": self.data,
        }))
    }

    /// Writes the driver state as json in the given file
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.to_json()?)?;
        debug!("Xopt state dumped in {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point;
    use crate::generators::{RandomConfig, RandomGenerator};
    use crate::vocs::{ConstraintKind, ObjectiveKind};
    use anyhow::bail;
    use serial_test::serial;

    fn vocs() -> Vocs {
        Vocs::new()
            .variable("x1", 0., 1.)
            .variable("x2", 0., 10.)
            .objective("f", ObjectiveKind::Minimize)
            .constraint("c", ConstraintKind::LessThan, 5.)
            .constant("a", 2.)
    }

    fn func(p: &Point) -> anyhow::Result<Point> {
        if p["x1"] > 0.9 {
            bail!("x1 too large");
        }
        Ok(point([
            ("f", p["a"] * p["x1"] + p["x2"]),
            ("c", p["x2"]),
        ]))
    }

    fn xopt(max_workers: usize) -> Xopt {
        let vocs = vocs();
        let generator = RandomGenerator::new(&vocs, RandomConfig::default().seed(0)).unwrap();
        Xopt::new(&vocs, Box::new(generator), Evaluator::new(func).max_workers(max_workers))
            .unwrap()
    }

    #[test]
    fn test_step_batch_size() {
        let mut xopt = xopt(3);
        xopt.step().unwrap();
        assert_eq!(xopt.n_evaluations(), 3);
        assert_eq!(xopt.generator().data().len(), 3);
        for r in xopt.data().iter() {
            assert_eq!(r.get("a"), 2.);
            assert!(r.get("x2") >= 0. && r.get("x2") <= 10.);
        }
    }

    #[test]
    fn test_run_until_max_evaluations() {
        let mut xopt = xopt(4).max_evaluations(10);
        xopt.run().unwrap();
        assert_eq!(xopt.n_evaluations(), 10);
        assert!(xopt.is_done());
        assert!(matches!(xopt.step(), Err(XoptError::MaxEvaluations(10))));
    }

    #[test]
    fn test_run_requires_budget() {
        assert!(xopt(1).run().is_err());
    }

    #[test]
    fn test_strict_mode() {
        let bad = vec![point([("x1", 0.95), ("x2", 1.)])];
        let mut lenient = xopt(1);
        let data = lenient.evaluate_data(&bad).unwrap();
        assert!(data.records()[0].is_error());
        assert_eq!(lenient.n_evaluations(), 1);

        let mut strict = xopt(1).strict(true);
        assert!(matches!(
            strict.evaluate_data(&bad),
            Err(XoptError::EvaluationError(_))
        ));
        assert_eq!(strict.n_evaluations(), 0);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut xopt = xopt(1);
        assert!(xopt.evaluate_data(&[point([("x1", 2.), ("x2", 1.)])]).is_err());
    }

    #[test]
    fn test_remove_and_reset_data() {
        let mut xopt = xopt(1);
        xopt.random_evaluate(5, Some(42)).unwrap();
        xopt.remove_data(&[0, 2]).unwrap();
        assert_eq!(xopt.n_evaluations(), 3);
        assert_eq!(xopt.generator().data().len(), 3);
        assert!(xopt.remove_data(&[7]).is_err());
        xopt.reset_data().unwrap();
        assert_eq!(xopt.n_evaluations(), 0);
        assert!(xopt.generator().data().is_empty());
    }

    #[test]
    fn test_vocs_mismatch() {
        let other = Vocs::new()
            .variable("y", 0., 1.)
            .objective("f", ObjectiveKind::Minimize);
        let generator = RandomGenerator::new(&other, RandomConfig::default()).unwrap();
        assert!(Xopt::new(&vocs(), Box::new(generator), Evaluator::new(func)).is_err());
    }

    #[test]
    #[serial]
    fn test_dump_file() {
        let outfile = "target/test_xopt_dump/xopt.json";
        let _ = std::fs::remove_file(outfile);
        let mut xopt = xopt(2).dump_file(outfile).max_evaluations(4);
        xopt.run().unwrap();
        let content = std::fs::read_to_string(outfile).unwrap();
        let dumped: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(dumped["generator"]["name"], "random");
        assert_eq!(dumped["generator"]["seed"], 0);
        assert_eq!(dumped["evaluator"]["max_workers"], 2);
        assert_eq!(dumped["max_evaluations"], 4);
        let data: Data = serde_json::from_value(dumped["data"].clone()).unwrap();
        assert_eq!(&data, xopt.data());
        let vocs: Vocs = serde_json::from_value(dumped["vocs"].clone()).unwrap();
        assert_eq!(&vocs, xopt.vocs());
    }
}
