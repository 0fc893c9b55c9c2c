use crate::acquisition::{AcquisitionFunction, ExpectedInformationGain};
use crate::bayesian::{AcquisitionContext, BayesianAlgorithm, BayesianGenerator};
use crate::errors::{BoError, Result};
use crate::models::Surrogate;
use egobox_doe::{FullFactorial, Lhs, LhsKind, SamplingMethod};
use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use xopt_core::Vocs;

/// Minimization of an observable over a regular grid of the design space
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridMinimize {
    /// Number of grid levels per variable
    pub n_mesh_points: usize,
    /// Number of sampled execution paths
    pub n_samples: usize,
    /// Observable to minimize
    pub observable: String,
    /// Maximum number of points the paths are sampled at. Larger grids are
    /// replaced by a latin hypercube design of that size.
    pub max_mesh_size: usize,
}

impl Default for GridMinimize {
    fn default() -> Self {
        GridMinimize {
            n_mesh_points: 10,
            n_samples: 20,
            observable: "y1".to_string(),
            max_mesh_size: 2000,
        }
    }
}

impl GridMinimize {
    /// Sets the number of grid levels per variable
    pub fn n_mesh_points(mut self, n_mesh_points: usize) -> Self {
        self.n_mesh_points = n_mesh_points.max(2);
        self
    }

    /// Sets the number of sampled execution paths
    pub fn n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples.max(1);
        self
    }

    /// Sets the minimized observable
    pub fn observable(mut self, observable: impl Into<String>) -> Self {
        self.observable = observable.into();
        self
    }

    /// Sets the maximum number of points of the mesh
    pub fn max_mesh_size(mut self, max_mesh_size: usize) -> Self {
        self.max_mesh_size = max_mesh_size.max(1);
        self
    }

    /// Number of points of the full grid in dimension `nx`, None when it
    /// does not fit in `usize`
    pub fn grid_size(&self, nx: usize) -> Option<usize> {
        u32::try_from(nx)
            .ok()
            .and_then(|nx| self.n_mesh_points.checked_pow(nx))
    }

    /// Whether the full grid in dimension `nx` is sampled
    pub fn is_full_grid(&self, nx: usize) -> bool {
        self.grid_size(nx)
            .is_some_and(|size| size <= self.max_mesh_size)
    }

    /// Points of the unit hypercube of dimension `nx` the paths are sampled at
    fn mesh(&self, nx: usize, rng: &mut Xoshiro256Plus) -> Array2<f64> {
        let unit = Array2::from_shape_fn((nx, 2), |(_, j)| j as f64);
        match self.grid_size(nx) {
            Some(size) if size <= self.max_mesh_size => FullFactorial::new(&unit).sample(size),
            _ => {
                debug!(
                    "Grid of {}^{nx} points replaced by {} lhs points",
                    self.n_mesh_points, self.max_mesh_size
                );
                Lhs::new(&unit)
                    .kind(LhsKind::Classic)
                    .with_rng(Xoshiro256Plus::seed_from_u64(rng.r#gen()))
                    .sample(self.max_mesh_size)
            }
        }
    }

    /// Execution paths of the algorithm run on posterior samples of `model`:
    /// the mesh minimizer of each sample and the sampled minimum
    pub fn execution_paths(
        &self,
        model: &dyn Surrogate,
        nx: usize,
        rng: &mut Xoshiro256Plus,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let mesh = self.mesh(nx, rng);
        let samples = model.sample(&mesh.view(), self.n_samples);
        let mut x_star = Array2::zeros((self.n_samples, nx));
        let mut y_star = Array1::zeros(self.n_samples);
        for (k, path) in samples.axis_iter(Axis(1)).enumerate() {
            let i = path
                .argmin_skipnan()
                .map_err(|e| BoError::InvalidValue(format!("sampled path {k}: {e}")))?;
            x_star.row_mut(k).assign(&mesh.row(i));
            y_star[k] = path[i];
        }
        Ok((x_star, y_star))
    }
}

/// Algorithms whose execution path is learned
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum BaxAlgorithm {
    /// Grid search of the minimum of an observable
    GridMinimize(GridMinimize),
}

impl Default for BaxAlgorithm {
    fn default() -> Self {
        BaxAlgorithm::GridMinimize(GridMinimize::default())
    }
}

impl BaxAlgorithm {
    fn observable(&self) -> &str {
        match self {
            BaxAlgorithm::GridMinimize(grid) => &grid.observable,
        }
    }
}

/// Bayesian algorithm execution options
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaxOptions {
    /// The algorithm run on the model of the observable
    pub algorithm: BaxAlgorithm,
}

impl BaxOptions {
    /// Options learning the given algorithm
    pub fn algorithm(mut self, algorithm: BaxAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// Bayesian algorithm execution: candidates are the points the most
/// informative about the output of an algorithm (e.g. the location of the
/// minimum of an observable) run on the model of the observable.
///
/// ```no_run
/// use xopt_bo::{BaxAlgorithm, BaxGenerator, BaxOptions, BayesianConfig, GridMinimize};
/// use xopt_core::{Evaluator, Point, Vocs, Xopt};
/// use xopt_core::data::point;
///
/// fn f(p: &Point) -> anyhow::Result<Point> {
///     Ok(point([("y1", (p["x"] - 0.3).powi(2))]))
/// }
///
/// let vocs = Vocs::new().variable("x", 0., 1.).observable("y1");
/// let options = BaxOptions::default().algorithm(BaxAlgorithm::GridMinimize(
///     GridMinimize::default().n_mesh_points(50),
/// ));
/// let generator = BaxGenerator::new(&vocs, BayesianConfig::default(), options)
///     .expect("problem handled");
/// let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(f))
///     .expect("driver configured")
///     .max_evaluations(10);
/// xopt.random_evaluate(3, None).expect("initial data");
/// xopt.run().expect("paths learned");
/// ```
pub type BaxGenerator = BayesianGenerator<BaxOptions>;

impl BayesianAlgorithm for BaxOptions {
    fn name(&self) -> &'static str {
        "bax"
    }

    fn supports_multi_objective(&self) -> bool {
        true
    }

    fn supports_constraints(&self) -> bool {
        false
    }

    fn validate(&self, vocs: &Vocs) -> Result<()> {
        vocs.validate()?;
        let observable = self.algorithm.observable();
        if !vocs.observables.iter().any(|o| o == observable) {
            return Err(BoError::InvalidConfigError(format!(
                "{observable} is not an observable of the problem"
            )));
        }
        if vocs.n_constraints() > 0 {
            return Err(BoError::InvalidConfigError(
                "bax generator does not support constraints".to_string(),
            ));
        }
        match &self.algorithm {
            BaxAlgorithm::GridMinimize(grid) if !grid.is_full_grid(vocs.n_variables()) => {
                warn!(
                    "Grid of {}^{} points exceeds {} points, paths are sampled on a latin hypercube design",
                    grid.n_mesh_points,
                    vocs.n_variables(),
                    grid.max_mesh_size
                );
            }
            _ => (),
        }
        Ok(())
    }

    fn model_outputs(&self, _vocs: &Vocs) -> Vec<String> {
        vec![self.algorithm.observable().to_string()]
    }

    fn acquisition<'a>(
        &'a self,
        context: AcquisitionContext<'a>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<Box<dyn AcquisitionFunction + 'a>> {
        let model = context.models.get(self.algorithm.observable())?;
        let (x_star, y_star) = match &self.algorithm {
            BaxAlgorithm::GridMinimize(grid) => {
                grid.execution_paths(model, context.vocs.n_variables(), rng)?
            }
        };
        let mut path_models: Vec<Box<dyn Surrogate>> = Vec::with_capacity(y_star.len());
        for (x, y) in x_star.outer_iter().zip(y_star.iter()) {
            match model.condition(&x.insert_axis(Axis(0)), &Array1::from_elem(1, *y)) {
                Ok(path_model) => path_models.push(Box::new(path_model)),
                Err(err) => warn!("Execution path at {x} skipped: {err}"),
            }
        }
        debug!("{} execution paths sampled", path_models.len());
        Ok(Box::new(ExpectedInformationGain::new(model, path_models)))
    }

    fn options(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
