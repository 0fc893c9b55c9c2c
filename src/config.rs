//! Serializable configuration of a whole optimization: the problem, the
//! generator and its options, the evaluator settings and possibly the
//! history of evaluations. It is the format written by [Xopt::dump].
use crate::{
    BaxGenerator, BaxOptions, BayesianConfig, Data, EvalFunc, Evaluator, EvaluatorConfig,
    ExpectedImprovementGenerator, ExpectedImprovementOptions, ExtremumSeekingConfig,
    ExtremumSeekingGenerator, Generator, LatinHypercubeConfig, LatinHypercubeGenerator,
    MoboGenerator, MoboOptions, MultiFidelityGenerator, MultiFidelityOptions, Nsga2Config,
    Nsga2Generator, RandomConfig, RandomGenerator, Result, UpperConfidenceBoundGenerator,
    UpperConfidenceBoundOptions, Vocs, Xopt, XoptError,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Options of a Bayesian generator: shared options and strategy options
/// side by side
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BayesianOptions<O> {
    /// Options shared by Bayesian generators
    #[serde(flatten)]
    pub config: BayesianConfig,
    /// Strategy options
    #[serde(flatten)]
    pub options: O,
}

/// A generator and its options, tagged by the generator name
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// Uniform random sampling
    Random(RandomConfig),
    /// Latin hypercube designs
    LatinHypercube(LatinHypercubeConfig),
    /// Bounded extremum seeking
    ExtremumSeeking(ExtremumSeekingConfig),
    /// NSGA-II
    Nsga2(Nsga2Config),
    /// Bayesian optimization, upper confidence bound
    UpperConfidenceBound(BayesianOptions<UpperConfidenceBoundOptions>),
    /// Bayesian optimization, expected improvement
    ExpectedImprovement(BayesianOptions<ExpectedImprovementOptions>),
    /// Multi-objective Bayesian optimization
    Mobo(BayesianOptions<MoboOptions>),
    /// Multi-fidelity Bayesian optimization
    MultiFidelity(BayesianOptions<MultiFidelityOptions>),
    /// Bayesian algorithm execution
    Bax(BayesianOptions<BaxOptions>),
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::Random(RandomConfig::default())
    }
}

impl GeneratorConfig {
    /// Builds the generator for the given problem.
    ///
    /// The problem handled by the returned generator may differ from `vocs`
    /// (multi-fidelity adds the fidelity), use [Generator::vocs] to get it.
    pub fn build(&self, vocs: &Vocs) -> Result<Box<dyn Generator>> {
        let generator: Box<dyn Generator> = match self.clone() {
            GeneratorConfig::Random(config) => Box::new(RandomGenerator::new(vocs, config)?),
            GeneratorConfig::LatinHypercube(config) => {
                Box::new(LatinHypercubeGenerator::new(vocs, config)?)
            }
            GeneratorConfig::ExtremumSeeking(config) => {
                Box::new(ExtremumSeekingGenerator::extremum_seeking(vocs, config)?)
            }
            GeneratorConfig::Nsga2(config) => Box::new(Nsga2Generator::new(vocs, config)?),
            GeneratorConfig::UpperConfidenceBound(BayesianOptions { config, options }) => {
                Box::new(UpperConfidenceBoundGenerator::new(vocs, config, options)?)
            }
            GeneratorConfig::ExpectedImprovement(BayesianOptions { config, options }) => {
                Box::new(ExpectedImprovementGenerator::new(vocs, config, options)?)
            }
            GeneratorConfig::Mobo(BayesianOptions { config, options }) => {
                Box::new(MoboGenerator::mobo(vocs, config, options)?)
            }
            GeneratorConfig::MultiFidelity(BayesianOptions { config, options }) => {
                Box::new(MultiFidelityGenerator::multi_fidelity(vocs, config, options)?)
            }
            GeneratorConfig::Bax(BayesianOptions { config, options }) => {
                Box::new(BaxGenerator::new(vocs, config, options)?)
            }
        };
        Ok(generator)
    }
}

/// Driver configuration, as dumped by [Xopt::dump]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XoptConfig {
    /// Problem definition
    pub vocs: Vocs,
    /// Generator and its options
    pub generator: GeneratorConfig,
    /// Evaluator settings
    pub evaluator: EvaluatorConfig,
    /// Whether failed evaluations are errors
    pub strict: bool,
    /// Evaluation budget
    pub max_evaluations: Option<usize>,
    /// File where the driver state is dumped after each new data
    pub dump_file: Option<PathBuf>,
    /// History of evaluations
    pub data: Data,
}

impl XoptConfig {
    /// Configuration read from a json file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let config: XoptConfig = serde_json::from_reader(reader)?;
        info!(
            "Configuration loaded from {} ({} evaluations)",
            path.as_ref().display(),
            config.data.len()
        );
        Ok(config)
    }

    /// Configuration from a json string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Driver evaluating `function`, the history is restored in the
    /// driver and its generator
    pub fn build<F: EvalFunc + 'static>(&self, function: F) -> Result<Xopt> {
        let generator = self.generator.build(&self.vocs)?;
        let vocs = generator.vocs().clone();
        if !self.vocs.variables.keys().all(|name| vocs.variables.contains_key(name)) {
            return Err(XoptError::VocsError(format!(
                "{} generator dropped variables of the problem",
                generator.name()
            )));
        }
        let evaluator = Evaluator::new(function).configure(self.evaluator);
        let mut xopt = Xopt::new(&vocs, generator, evaluator)?.strict(self.strict);
        if let Some(max_evaluations) = self.max_evaluations {
            xopt = xopt.max_evaluations(max_evaluations);
        }
        if let Some(dump_file) = &self.dump_file {
            xopt = xopt.dump_file(dump_file);
        }
        if !self.data.is_empty() {
            xopt.set_data(self.data.clone())?;
        }
        Ok(xopt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::Problem;
    use crate::{ObjectiveKind, Point};
    use approx::assert_abs_diff_eq;
    use serial_test::serial;
    use xopt_core::data::point;

    #[test]
    fn test_generator_config_tags() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{"name": "upper_confidence_bound", "beta": 0.1, "seed": 3}"#)
                .unwrap();
        match &config {
            GeneratorConfig::UpperConfidenceBound(BayesianOptions { config, options }) => {
                assert_eq!(options.beta, 0.1);
                assert_eq!(config.seed, Some(3));
                assert_eq!(config.n_monte_carlo_samples, 128);
            }
            other => panic!("unexpected generator {other:?}"),
        }
        let config: GeneratorConfig = serde_json::from_str(
            r#"{"name": "bax", "algorithm": {"name": "grid_minimize", "observable": "y"}}"#,
        )
        .unwrap();
        assert!(matches!(config, GeneratorConfig::Bax(_)));
        assert!(serde_json::from_str::<GeneratorConfig>(r#"{"name": "unknown"}"#).is_err());
    }

    #[test]
    fn test_build_every_generator() {
        let vocs = Problem::Tnk.vocs();
        let mobo = MoboOptions::default().reference("y1", 1.5).reference("y2", 1.5);
        let configs = vec![
            GeneratorConfig::Random(RandomConfig::default()),
            GeneratorConfig::LatinHypercube(LatinHypercubeConfig::default()),
            GeneratorConfig::Nsga2(Nsga2Config::default()),
            GeneratorConfig::Mobo(BayesianOptions {
                config: BayesianConfig::default(),
                options: mobo,
            }),
        ];
        for config in configs {
            let generator = config.build(&vocs).unwrap();
            let json = serde_json::to_value(&config).unwrap();
            assert_eq!(json["name"], generator.name());
        }
        // single objective generators
        let config = GeneratorConfig::ExpectedImprovement(BayesianOptions::default());
        assert!(config.build(&vocs).is_err());
        let vocs = Problem::Sphere.vocs();
        for name in ["expected_improvement", "upper_confidence_bound", "extremum_seeking"] {
            let config: GeneratorConfig =
                serde_json::from_value(serde_json::json!({ "name": name })).unwrap();
            assert_eq!(config.build(&vocs).unwrap().name(), name);
        }
    }

    #[test]
    #[serial]
    fn test_dump_and_load() {
        let problem = Problem::Sphere;
        let vocs = problem.vocs();
        let file = "target/test_xopt/dump.json";
        let config = XoptConfig {
            vocs: vocs.clone(),
            generator: GeneratorConfig::LatinHypercube(LatinHypercubeConfig::default().seed(1)),
            evaluator: EvaluatorConfig { max_workers: 2 },
            max_evaluations: Some(6),
            dump_file: Some(PathBuf::from(file)),
            ..XoptConfig::default()
        };
        let mut xopt = config.build(move |p: &Point| problem.evaluate(p)).unwrap();
        xopt.run().unwrap();
        assert_eq!(xopt.n_evaluations(), 6);

        let loaded = XoptConfig::from_file(file).unwrap();
        assert_eq!(loaded.vocs, vocs);
        assert_eq!(loaded.data.len(), 6);
        assert!(matches!(loaded.generator, GeneratorConfig::LatinHypercube(_)));
        assert_eq!(loaded.evaluator.max_workers, 2);

        let restored = loaded
            .build(move |p: &Point| problem.evaluate(p))
            .unwrap();
        assert_eq!(restored.n_evaluations(), 6);
        for (r, e) in restored.data().iter().zip(xopt.data().iter()) {
            assert_abs_diff_eq!(r.get("f"), e.get("f"), epsilon = 1e-12);
        }
        assert_eq!(restored.generator().data().len(), 6);
        assert_eq!(restored.generator().name(), "latin_hypercube");
        assert!(restored.is_done());
    }

    #[test]
    #[serial]
    fn test_multi_fidelity_dump_reloads() {
        let vocs = Vocs::new()
            .variable("x", 0., 1.)
            .objective("f", ObjectiveKind::Minimize);
        let options = MultiFidelityOptions::default().reference("f", 2.);
        let config = XoptConfig {
            vocs,
            generator: GeneratorConfig::MultiFidelity(BayesianOptions {
                config: BayesianConfig::default(),
                options,
            }),
            ..XoptConfig::default()
        };
        let func = |p: &Point| -> anyhow::Result<Point> { Ok(point([("f", p["x"] * p["s"])])) };
        let xopt = config.build(func).unwrap();
        assert!(xopt.vocs().variables.contains_key("s"));
        let file = "target/test_xopt/multi_fidelity.json";
        xopt.dump(file).unwrap();
        let loaded = XoptConfig::from_file(file).unwrap();
        // extending the vocs again is a no-op
        let reloaded = loaded.build(func).unwrap();
        assert_eq!(reloaded.vocs(), xopt.vocs());
        assert_eq!(reloaded.generator().name(), "multi_fidelity");
    }
}
