use crate::operators::{PolynomialMutation, Sbx};
use crate::output::OutputDir;
use crate::sorting::{crowded_cmp, rank_and_crowding, select_best};
use log::{debug, info};
use ndarray::{Array2, Axis, stack};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use xopt_core::{Data, Generator, Point, Result, Vocs, XoptError, check_batch, validate_vocs};

/// Column holding the generation of the parents of a candidate
pub const PARENT_GENERATION_COLUMN: &str = "xopt_parent_generation";
/// Column holding the candidate counter
pub const CANDIDATE_IDX_COLUMN: &str = "xopt_candidate_idx";

/// NSGA-II options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nsga2Config {
    /// Number of individuals kept at each generation
    pub population_size: usize,
    /// Crossover operator
    pub crossover: Sbx,
    /// Mutation operator
    pub mutation: PolynomialMutation,
    /// Directory where data, populations and checkpoints are written
    pub output_path: Option<PathBuf>,
    /// A checkpoint is written every `checkpoint_freq` generations (0 to disable)
    pub checkpoint_freq: usize,
    /// Whether identical individuals are removed before selection
    pub deduplicate_output: bool,
    /// A random generator seed used to get reproducible runs
    pub seed: Option<u64>,
}

impl Default for Nsga2Config {
    fn default() -> Self {
        Nsga2Config {
            population_size: 50,
            crossover: Sbx::default(),
            mutation: PolynomialMutation::default(),
            output_path: None,
            checkpoint_freq: 1,
            deduplicate_output: true,
            seed: None,
        }
    }
}

impl Nsga2Config {
    /// Sets the population size
    pub fn population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    /// Sets the crossover operator
    pub fn crossover(mut self, crossover: Sbx) -> Self {
        self.crossover = crossover;
        self
    }

    /// Sets the mutation operator
    pub fn mutation(mut self, mutation: PolynomialMutation) -> Self {
        self.mutation = mutation;
        self
    }

    /// Sets the output directory
    pub fn output_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the checkpoint frequency in generations
    pub fn checkpoint_freq(mut self, checkpoint_freq: usize) -> Self {
        self.checkpoint_freq = checkpoint_freq;
        self
    }

    /// Enables or disables removal of duplicated individuals
    pub fn deduplicate_output(mut self, deduplicate_output: bool) -> Self {
        self.deduplicate_output = deduplicate_output;
        self
    }

    /// Sets the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Generator state saved in checkpoints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Nsga2Checkpoint {
    /// Problem definition
    pub vocs: Vocs,
    /// Options
    pub config: Nsga2Config,
    /// All evaluated individuals
    pub data: Data,
    /// Current population
    pub pop: Data,
    /// Offspring evaluated since the last selection
    pub child: Data,
    /// Number of evaluations
    pub fevals: usize,
    /// Number of generations
    pub n_generations: usize,
    /// Number of generated candidates
    pub n_candidates: usize,
}

/// Non dominated sorting genetic algorithm, see
/// Deb K. et al. (2002) "A fast and elitist multiobjective genetic algorithm:
/// NSGA-II", IEEE Transactions on Evolutionary Computation, 6(2), 182-197.
///
/// Candidates are generated from the current population by crowded binary
/// tournament, simulated binary crossover and polynomial mutation. Evaluated
/// offspring are accumulated until a full population is available, then the
/// next population is selected among parents and offspring.
pub struct Nsga2Generator {
    vocs: Vocs,
    config: Nsga2Config,
    data: Data,
    pop: Data,
    child: Data,
    fevals: usize,
    n_generations: usize,
    n_candidates: usize,
    rank: Vec<usize>,
    crowding: Vec<f64>,
    rng: Xoshiro256Plus,
    output: Option<OutputDir>,
}

impl Nsga2Generator {
    /// NSGA-II generator of the given problem
    pub fn new(vocs: &Vocs, config: Nsga2Config) -> Result<Self> {
        validate_vocs("nsga2", vocs, true, true)?;
        if config.population_size < 2 {
            return Err(XoptError::InvalidValue(
                "population size should be at least 2".to_string(),
            ));
        }
        let rng = match config.seed {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let output = config
            .output_path
            .as_ref()
            .map(|path| {
                OutputDir::create(
                    path,
                    vocs,
                    &[PARENT_GENERATION_COLUMN, CANDIDATE_IDX_COLUMN],
                )
            })
            .transpose()?;
        Ok(Nsga2Generator {
            vocs: vocs.clone(),
            config,
            data: Data::new(),
            pop: Data::new(),
            child: Data::new(),
            fevals: 0,
            n_generations: 0,
            n_candidates: 0,
            rank: vec![],
            crowding: vec![],
            rng,
            output,
        })
    }

    /// Restores a generator from a checkpoint file
    pub fn from_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let state: Nsga2Checkpoint = serde_json::from_reader(reader)?;
        let mut generator = Nsga2Generator::new(&state.vocs, state.config)?;
        generator.data = state.data;
        generator.pop = state.pop;
        generator.child = state.child;
        generator.fevals = state.fevals;
        generator.n_generations = state.n_generations;
        generator.n_candidates = state.n_candidates;
        generator.update_ranking();
        info!(
            "NSGA-II restored at generation {} ({} evaluations)",
            generator.n_generations, generator.fevals
        );
        Ok(generator)
    }

    /// Current state
    pub fn checkpoint_state(&self) -> Nsga2Checkpoint {
        Nsga2Checkpoint {
            vocs: self.vocs.clone(),
            config: self.config.clone(),
            data: self.data.clone(),
            pop: self.pop.clone(),
            child: self.child.clone(),
            fevals: self.fevals,
            n_generations: self.n_generations,
            n_candidates: self.n_candidates,
        }
    }

    /// Options of the generator
    pub fn config(&self) -> &Nsga2Config {
        &self.config
    }

    /// Current population
    pub fn population(&self) -> &Data {
        &self.pop
    }

    /// Offspring evaluated since the last selection
    pub fn child(&self) -> &Data {
        &self.child
    }

    /// Number of evaluations received
    pub fn fevals(&self) -> usize {
        self.fevals
    }

    /// Number of selected generations
    pub fn n_generations(&self) -> usize {
        self.n_generations
    }

    /// Number of generated candidates
    pub fn n_candidates(&self) -> usize {
        self.n_candidates
    }

    /// Total constraint violation of each record, infinite for failed evaluations
    fn violation(&self, data: &Data) -> Vec<f64> {
        let c = self.vocs.constraint_data(data);
        data.iter()
            .zip(c.axis_iter(Axis(0)))
            .map(|(r, ci)| {
                if r.is_error() {
                    f64::INFINITY
                } else {
                    ci.iter().map(|v| v.max(0.)).sum()
                }
            })
            .collect()
    }

    fn update_ranking(&mut self) {
        let y = self.vocs.objective_data(&self.pop);
        let violation = self.violation(&self.pop);
        let (rank, crowding) = rank_and_crowding(&y, &violation);
        self.rank = rank;
        self.crowding = crowding;
    }

    fn tournament(&mut self) -> usize {
        let n = self.pop.len();
        let a = self.rng.gen_range(0..n);
        let b = self.rng.gen_range(0..n);
        match crowded_cmp(&self.rank, &self.crowding, a, b) {
            Ordering::Less => a,
            Ordering::Greater => b,
            Ordering::Equal => {
                if self.rng.r#gen::<bool>() {
                    a
                } else {
                    b
                }
            }
        }
    }

    fn offspring(&mut self, n: usize) -> Array2<f64> {
        let x = self.vocs.variable_data(&self.pop);
        let xlimits = self.vocs.bounds();
        let mut children = Vec::with_capacity(n + 1);
        while children.len() < n {
            let p1 = self.tournament();
            let p2 = self.tournament();
            let (mut c1, mut c2) =
                self.config
                    .crossover
                    .crossover(&x.row(p1), &x.row(p2), &xlimits, &mut self.rng);
            self.config.mutation.mutate(&mut c1, &xlimits, &mut self.rng);
            self.config.mutation.mutate(&mut c2, &xlimits, &mut self.rng);
            children.push(c1);
            children.push(c2);
        }
        children.truncate(n);
        let views: Vec<_> = children.iter().map(|c| c.view()).collect();
        stack(Axis(0), &views).unwrap_or_else(|_| Array2::zeros((0, xlimits.nrows())))
    }

    /// Removes records whose variables equal the ones of a previous record
    fn deduplicate(&self, data: Data) -> Data {
        let names = self.vocs.variable_names();
        let mut seen = HashSet::new();
        data.iter()
            .filter(|r| {
                let key: Vec<u64> = names.iter().map(|n| r.get(n).to_bits()).collect();
                seen.insert(key)
            })
            .cloned()
            .collect()
    }

    /// Selects the next population among current population and offspring.
    /// When duplicates leave fewer than `population_size` distinct
    /// individuals, offspring keep accumulating until enough are available.
    fn select_population(&mut self, write_output: bool) -> Result<()> {
        let mut combined = self.pop.clone();
        combined.extend(&self.child);
        if self.config.deduplicate_output {
            combined = self.deduplicate(combined);
            if combined.len() < self.config.population_size {
                debug!(
                    "{} distinct individuals, wait for more offspring to select a population of {}",
                    combined.len(),
                    self.config.population_size
                );
                return Ok(());
            }
        }
        let y = self.vocs.objective_data(&combined);
        let violation = self.violation(&combined);
        let selected = select_best(&y, &violation, self.config.population_size);
        self.pop = selected
            .iter()
            .map(|&i| combined.records()[i].clone())
            .collect();
        self.child = Data::new();
        self.n_generations += 1;
        self.update_ranking();

        let n_feasible = self
            .violation(&self.pop)
            .iter()
            .filter(|v| **v <= 0.)
            .count();
        info!(
            "NSGA-II generation {}: {} individuals in first front, {} feasible ({} evaluations)",
            self.n_generations,
            self.rank.iter().filter(|r| **r == 0).count(),
            n_feasible,
            self.fevals
        );

        if write_output {
            if let Some(output) = &self.output {
                output.append_population(&self.pop, self.n_generations)?;
                let freq = self.config.checkpoint_freq;
                if freq > 0 && self.n_generations % freq == 0 {
                    output.checkpoint(&self.checkpoint_state(), self.n_generations)?;
                }
            }
        }
        Ok(())
    }
}

impl Generator for Nsga2Generator {
    fn name(&self) -> &'static str {
        "nsga2"
    }

    fn vocs(&self) -> &Vocs {
        &self.vocs
    }

    fn data(&self) -> &Data {
        &self.data
    }

    fn generate(&mut self, n_candidates: usize) -> Result<Vec<Point>> {
        check_batch(&*self, n_candidates)?;
        let mut candidates = if self.pop.is_empty() {
            debug!("No population yet: random candidates");
            self.vocs.random_inputs(n_candidates, &mut self.rng)
        } else {
            let x = self.offspring(n_candidates);
            self.vocs.points_from_array(&x)
        };
        for c in candidates.iter_mut() {
            c.insert(
                PARENT_GENERATION_COLUMN.to_string(),
                self.n_generations as f64,
            );
            c.insert(CANDIDATE_IDX_COLUMN.to_string(), self.n_candidates as f64);
            self.n_candidates += 1;
        }
        Ok(candidates)
    }

    fn add_data(&mut self, new_data: &Data) -> Result<()> {
        self.fevals += new_data.len();
        self.data.extend(new_data);
        self.child.extend(new_data);
        if let Some(output) = &self.output {
            output.append_data(new_data)?;
        }
        if self.child.len() >= self.config.population_size {
            self.select_population(true)?;
        }
        Ok(())
    }

    fn set_data(&mut self, data: &Data) -> Result<()> {
        self.reset();
        self.data = data.clone();
        self.child = data.clone();
        self.fevals = data.len();
        if self.child.len() >= self.config.population_size {
            self.select_population(false)?;
        }
        Ok(())
    }

    /// Forgets evaluated data, populations and counters
    fn reset(&mut self) {
        self.data = Data::new();
        self.n_candidates = 0;
        self.pop = Data::new();
        self.child = Data::new();
        self.fevals = 0;
        self.n_generations = 0;
        self.rank.clear();
        self.crowding.clear();
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
