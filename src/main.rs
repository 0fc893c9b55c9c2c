use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::{Builder, Env, Target};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use xopt::problems::Problem;
use xopt::{
    BaxAlgorithm, BaxOptions, BayesianConfig, BayesianOptions, EvaluatorConfig,
    ExtremumSeekingConfig, GeneratorConfig, GridMinimize, LatinHypercubeConfig, MoboOptions,
    MultiFidelityOptions, Nsga2Config, RandomConfig, Vocs, XOPT_LOG, Xopt, XoptConfig,
};
use xopt_bo::feasible_objectives;
use xopt_core::pareto::pareto_front;

/// Generators selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
enum GeneratorName {
    Random,
    Lhs,
    ExtremumSeeking,
    Nsga2,
    Ucb,
    Ei,
    Mobo,
    MultiFidelity,
    Bax,
}

#[derive(Parser)]
#[command(name = "xopt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs Xopt generators on benchmark problems", long_about = None)]
struct Cli {
    /// Benchmark problem to optimize
    #[arg(short, long, value_enum, default_value = "rosenbrock")]
    problem: Problem,

    /// Generator to run
    #[arg(short, long, value_enum, default_value = "random")]
    generator: GeneratorName,

    /// Json configuration (as dumped) overriding the generator options,
    /// its data is used to resume the optimization
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of optimization steps
    #[arg(short, long, default_value_t = 10)]
    n_steps: usize,

    /// Number of concurrent evaluations
    #[arg(short, long, default_value_t = 1)]
    max_workers: usize,

    /// Number of random evaluations made before the first step when no
    /// data is available
    #[arg(long, default_value_t = 5)]
    n_initial: usize,

    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Directory where evaluations are written as csv
    #[arg(short, long)]
    outdir: Option<PathBuf>,

    /// File where the optimization state is dumped
    #[arg(short, long)]
    dump: Option<PathBuf>,
}

fn generator_config(cli: &Cli) -> GeneratorConfig {
    let mut bayesian = BayesianConfig::default();
    if let Some(seed) = cli.seed {
        bayesian = bayesian.seed(seed);
    }
    let reference = cli.problem.reference_point();
    match cli.generator {
        GeneratorName::Random => GeneratorConfig::Random(RandomConfig { seed: cli.seed }),
        GeneratorName::Lhs => GeneratorConfig::LatinHypercube(LatinHypercubeConfig {
            seed: cli.seed,
            ..LatinHypercubeConfig::default()
        }),
        GeneratorName::ExtremumSeeking => {
            GeneratorConfig::ExtremumSeeking(ExtremumSeekingConfig::default())
        }
        GeneratorName::Nsga2 => GeneratorConfig::Nsga2(Nsga2Config {
            seed: cli.seed,
            output_path: cli.outdir.as_ref().map(|dir| dir.join("nsga2")),
            ..Nsga2Config::default()
        }),
        GeneratorName::Ucb => GeneratorConfig::UpperConfidenceBound(BayesianOptions {
            config: bayesian,
            options: Default::default(),
        }),
        GeneratorName::Ei => GeneratorConfig::ExpectedImprovement(BayesianOptions {
            config: bayesian,
            options: Default::default(),
        }),
        GeneratorName::Mobo => GeneratorConfig::Mobo(BayesianOptions {
            config: bayesian,
            options: MoboOptions {
                reference_point: reference,
            },
        }),
        GeneratorName::MultiFidelity => GeneratorConfig::MultiFidelity(BayesianOptions {
            config: bayesian,
            options: MultiFidelityOptions {
                reference_point: reference,
                ..MultiFidelityOptions::default()
            },
        }),
        GeneratorName::Bax => {
            let observable = cli.problem.vocs().objective_names()[0].clone();
            GeneratorConfig::Bax(BayesianOptions {
                config: bayesian,
                options: BaxOptions::default().algorithm(BaxAlgorithm::GridMinimize(
                    GridMinimize::default().observable(observable),
                )),
            })
        }
    }
}

/// The problem as seen by the generator: BAX learns the minimizer of the
/// first objective recorded as an observable
fn problem_vocs(cli: &Cli) -> Vocs {
    let vocs = cli.problem.vocs();
    match cli.generator {
        GeneratorName::Bax => Vocs {
            objectives: Default::default(),
            constraints: Default::default(),
            observables: vocs.objective_names(),
            ..vocs
        },
        _ => vocs,
    }
}

fn build_xopt(cli: &Cli) -> Result<Xopt> {
    let problem = cli.problem;
    let evaluate = move |p: &xopt::Point| problem.evaluate(p);
    let xopt = match &cli.config {
        Some(path) => {
            let mut config = XoptConfig::from_file(path)
                .with_context(|| format!("cannot load configuration {}", path.display()))?;
            config.evaluator = EvaluatorConfig {
                max_workers: cli.max_workers,
            };
            config.build(evaluate)?
        }
        None => XoptConfig {
            vocs: problem_vocs(cli),
            generator: generator_config(cli),
            evaluator: EvaluatorConfig {
                max_workers: cli.max_workers,
            },
            ..XoptConfig::default()
        }
        .build(evaluate)?,
    };
    Ok(match &cli.dump {
        Some(dump) => xopt.dump_file(dump),
        None => xopt,
    })
}

fn report(xopt: &Xopt) {
    let vocs = xopt.vocs();
    if vocs.n_objectives() == 1 {
        if let Ok((i, best)) = vocs.select_best(xopt.data()) {
            info!("Best objective {best} at evaluation {i}");
        }
    } else if vocs.n_objectives() > 1 {
        let front = pareto_front(&feasible_objectives(vocs, xopt.data()));
        info!("{} non dominated feasible evaluation(s)", front.nrows());
    }
}

fn main() -> Result<()> {
    let env = Env::new().filter_or(XOPT_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(Target::Stdout);
    builder.try_init().ok();

    let cli = Cli::parse();
    let mut xopt = build_xopt(&cli)?;
    info!(
        "Run {} generator on {:?} problem",
        xopt.generator().name(),
        cli.problem
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Ctrl-C handler not installed: {err}");
    }

    if xopt.data().is_empty() && cli.n_initial > 0 {
        xopt.random_evaluate(cli.n_initial, cli.seed)?;
    }
    for _ in 0..cli.n_steps {
        if interrupted.load(Ordering::SeqCst) {
            warn!("Interrupted, stop after {} evaluations", xopt.n_evaluations());
            break;
        }
        if xopt.is_done() {
            break;
        }
        xopt.step()?;
    }
    report(&xopt);

    if let Some(outdir) = &cli.outdir {
        let file = outdir.join("data.csv");
        std::fs::create_dir_all(outdir)?;
        xopt.data().write_csv(&file, &xopt.data().columns())?;
        info!("Evaluations written in {}", file.display());
    }
    if let Some(dump) = &cli.dump {
        xopt.dump(dump)?;
        info!("State dumped in {}", dump.display());
    }
    Ok(())
}
