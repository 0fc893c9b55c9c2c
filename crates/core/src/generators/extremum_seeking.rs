//! Bounded extremum seeking.
//!
//! Each variable is dithered at its own frequency, the cost modulates the
//! phase of the dithering so that the parameters drift toward the minimum of
//! the cost on average. The algorithm works in normalized space `[-1, 1]^nx`
//! and never leaves the variable bounds.
//!
//! See Scheinker A. (2024) "100 years of extremum seeking: A survey",
//! Automatica, 161, 111481.
use crate::data::{Data, Point};
use crate::errors::{Result, XoptError};
use crate::generator::validate_vocs;
use crate::sequential::{Sequential, SequentialAlgorithm, initial_point};
use crate::vocs::Vocs;
use log::{debug, warn};
use ndarray::{Array1, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Extremum seeking options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremumSeekingConfig {
    /// Feedback gain
    pub k: f64,
    /// Dithering amplitude in normalized space
    pub oscillation_size: f64,
    /// Amplitude decay factor applied after each step
    pub decay_rate: f64,
}

impl Default for ExtremumSeekingConfig {
    fn default() -> Self {
        ExtremumSeekingConfig {
            k: 2.0,
            oscillation_size: 0.1,
            decay_rate: 1.0,
        }
    }
}

impl ExtremumSeekingConfig {
    /// Sets the feedback gain
    pub fn k(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    /// Sets the dithering amplitude
    pub fn oscillation_size(mut self, oscillation_size: f64) -> Self {
        self.oscillation_size = oscillation_size;
        self
    }

    /// Sets the amplitude decay factor
    pub fn decay_rate(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }
}

/// Extremum seeking algorithm state
#[derive(Debug)]
pub struct ExtremumSeeking {
    vocs: Vocs,
    config: ExtremumSeekingConfig,
    /// dithering frequencies
    w: Array1<f64>,
    /// dithering amplitudes
    a: Array1<f64>,
    dt: f64,
    /// center of the bounds
    p_ave: Array1<f64>,
    /// width of the bounds
    p_diff: Array1<f64>,
    /// current normalized parameters
    p_n: Option<Array1<f64>>,
    amplitude: f64,
    step: usize,
    last_cost: f64,
}

/// Extremum seeking as a [crate::Generator]
pub type ExtremumSeekingGenerator = Sequential<ExtremumSeeking>;

impl ExtremumSeekingGenerator {
    /// Extremum seeking generator of a single objective unconstrained problem
    pub fn extremum_seeking(vocs: &Vocs, config: ExtremumSeekingConfig) -> Result<Self> {
        Ok(Sequential::new(ExtremumSeeking::new(vocs, config)?))
    }
}

impl ExtremumSeeking {
    /// Algorithm for the given problem
    pub fn new(vocs: &Vocs, config: ExtremumSeekingConfig) -> Result<Self> {
        validate_vocs("extremum_seeking", vocs, false, false)?;
        let nx = vocs.n_variables();
        let w = Array1::linspace(1.0, 1.75, nx);
        let w_max = w.fold(f64::MIN, |m, &v| m.max(v));
        let dt = 2.0 * PI / (10.0 * w_max);
        let a = &w * config.oscillation_size.powi(2);
        let bounds = vocs.bounds();
        let p_ave = bounds.mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(nx));
        let p_diff = bounds.column(1).to_owned() - bounds.column(0);
        Ok(ExtremumSeeking {
            vocs: vocs.clone(),
            config,
            w,
            a,
            dt,
            p_ave,
            p_diff,
            p_n: None,
            amplitude: 1.0,
            step: 0,
            last_cost: 0.0,
        })
    }

    /// Options of the algorithm
    pub fn config(&self) -> &ExtremumSeekingConfig {
        &self.config
    }

    /// Maps variables from bounds to `[-1, 1]`
    pub fn normalize(&self, x: &Array1<f64>) -> Array1<f64> {
        2.0 * (x - &self.p_ave) / &self.p_diff
    }

    /// Maps normalized parameters back to bounds
    pub fn denormalize(&self, p: &Array1<f64>) -> Array1<f64> {
        p * &self.p_diff / 2.0 + &self.p_ave
    }

    /// One extremum seeking update of the normalized parameters `p_n`
    /// given the current `cost`
    pub fn es_step(&self, p_n: &Array1<f64>, cost: f64) -> Array1<f64> {
        let mut p_next = p_n.to_owned();
        let t = self.step as f64;
        Zip::from(&mut p_next)
            .and(&self.w)
            .and(&self.a)
            .for_each(|p, &w, &a| {
                let dither = (w * t * self.dt + self.config.k * cost).cos();
                *p = (*p + self.amplitude * self.dt * (a * w).sqrt() * dither).clamp(-1.0, 1.0);
            });
        p_next
    }

    fn current_cost(&mut self, data: &Data) -> f64 {
        let cost = data
            .last()
            .map(|_| self.vocs.objective_data(&data.tail(1))[[0, 0]])
            .unwrap_or(f64::INFINITY);
        if cost.is_finite() {
            self.last_cost = cost;
        } else {
            warn!(
                "Extremum seeking: invalid cost for the last point, reuse {}",
                self.last_cost
            );
        }
        self.last_cost
    }
}

impl SequentialAlgorithm for ExtremumSeeking {
    fn name(&self) -> &'static str {
        "extremum_seeking"
    }

    fn vocs(&self) -> &Vocs {
        &self.vocs
    }

    fn generate_step(&mut self, first_gen: bool, data: &Data) -> Result<Point> {
        let p_n = match self.p_n.clone() {
            Some(p_n) if !first_gen => p_n,
            _ => {
                let (x0, f0) = initial_point(self.name(), &self.vocs, data)?;
                self.last_cost = f0[0];
                self.normalize(&x0).mapv(|v| v.clamp(-1.0, 1.0))
            }
        };
        let cost = self.current_cost(data);
        let p_next = self.es_step(&p_n, cost);
        self.step += 1;
        self.amplitude *= self.config.decay_rate;
        debug!(
            "ES step {}: cost={} amplitude={}",
            self.step, cost, self.amplitude
        );
        let x_next = self.denormalize(&p_next);
        self.p_n = Some(p_next);
        self.vocs
            .points_from_array(&x_next.insert_axis(Axis(0)))
            .pop()
            .ok_or_else(|| XoptError::GeneratorError("no candidate".to_string()))
    }

    fn update(&mut self, _new_data: &Data) -> Result<()> {
        Ok(())
    }

    fn restore(&mut self, data: &Data) -> Result<()> {
        if let Some(record) = data.last() {
            let x = self.vocs.point_to_array(&record.values)?;
            self.p_n = Some(self.normalize(&x).mapv(|v| v.clamp(-1.0, 1.0)));
            self.step = data.len();
            self.amplitude = self.config.decay_rate.powi(data.len() as i32);
        }
        Ok(())
    }

    fn reset_state(&mut self) {
        self.p_n = None;
        self.step = 0;
        self.amplitude = 1.0;
    }

    fn config_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::point;
    use crate::generator::Generator;
    use crate::vocs::{ConstraintKind, ObjectiveKind};
    use approx::assert_abs_diff_eq;

    fn vocs() -> Vocs {
        Vocs::new()
            .variable("x1", -1., 3.)
            .variable("x2", 0., 10.)
            .objective("f", ObjectiveKind::Minimize)
    }

    fn sphere(x1: f64, x2: f64) -> Data {
        let f = (x1 - 1.).powi(2) + (x2 - 5.).powi(2);
        Data::from_points(vec![point([("x1", x1), ("x2", x2), ("f", f)])])
    }

    #[test]
    fn test_es_requires_single_unconstrained_objective() {
        let multi = vocs().objective("g", ObjectiveKind::Maximize);
        assert!(ExtremumSeeking::new(&multi, ExtremumSeekingConfig::default()).is_err());
        let constrained = vocs().constraint("c", ConstraintKind::LessThan, 0.);
        assert!(ExtremumSeeking::new(&constrained, ExtremumSeekingConfig::default()).is_err());
    }

    #[test]
    fn test_es_first_step() {
        let vocs = vocs();
        let mut generator =
            ExtremumSeekingGenerator::extremum_seeking(&vocs, ExtremumSeekingConfig::default())
                .unwrap();
        generator.add_data(&sphere(1., 5.)).unwrap();
        let candidate = generator.generate(1).unwrap().remove(0);

        // at the first step the cost is 0 and time is 0: cos() == 1
        let es = generator.algorithm();
        assert_abs_diff_eq!(es.w[0], 1.0);
        assert_abs_diff_eq!(es.w[1], 1.75);
        let dt = 2. * PI / 17.5;
        let dp1 = dt * (1.0f64 * 0.01).sqrt();
        let dp2 = dt * (1.75f64 * 1.75 * 0.01).sqrt();
        assert_abs_diff_eq!(candidate["x1"], 1. + dp1 * 2., epsilon = 1e-10);
        assert_abs_diff_eq!(candidate["x2"], 5. + dp2 * 5., epsilon = 1e-10);
    }

    #[test]
    fn test_es_stays_in_bounds() {
        let vocs = vocs();
        let config = ExtremumSeekingConfig::default()
            .oscillation_size(2.0)
            .decay_rate(0.99);
        let mut generator = ExtremumSeekingGenerator::extremum_seeking(&vocs, config).unwrap();
        generator.add_data(&sphere(3., 0.)).unwrap();
        for _ in 0..200 {
            let c = generator.generate(1).unwrap().remove(0);
            assert!(vocs.validate_input(&c).is_ok());
            generator.add_data(&sphere(c["x1"], c["x2"])).unwrap();
        }
        assert_abs_diff_eq!(
            generator.algorithm().amplitude,
            0.99f64.powi(200),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_es_reset_restarts_from_last_point() {
        let vocs = vocs();
        let mut generator =
            ExtremumSeekingGenerator::extremum_seeking(&vocs, ExtremumSeekingConfig::default())
                .unwrap();
        generator.add_data(&sphere(1., 5.)).unwrap();
        let first = generator.generate(1).unwrap().remove(0);
        generator.add_data(&sphere(first["x1"], first["x2"])).unwrap();
        generator.reset();
        generator.add_data(&sphere(1., 5.)).unwrap();
        let again = generator.generate(1).unwrap().remove(0);
        assert_abs_diff_eq!(again["x1"], first["x1"], epsilon = 1e-12);
        assert_abs_diff_eq!(again["x2"], first["x2"], epsilon = 1e-12);
    }
}
