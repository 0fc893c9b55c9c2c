//! Variation operators working on bounded real variables
use ndarray::{Array1, ArrayBase, Data, Ix1, Ix2, Zip};
use ndarray_rand::rand::Rng;
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-14;

/// Simulated binary crossover (SBX) in its bounded version, see
/// Deb K. and Agrawal R. B. (1995) "Simulated binary crossover for continuous
/// search space", Complex Systems, 9(2), 115-148.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sbx {
    /// Distribution index, large values produce children close to parents
    pub eta: f64,
    /// Probability to apply the crossover to a pair of parents
    pub probability: f64,
}

impl Default for Sbx {
    fn default() -> Self {
        Sbx {
            eta: 15.,
            probability: 1.0,
        }
    }
}

impl Sbx {
    /// Two children of the given parents, `xlimits` is the (nx, 2) bounds matrix
    pub fn crossover<R: Rng>(
        &self,
        parent1: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        parent2: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        rng: &mut R,
    ) -> (Array1<f64>, Array1<f64>) {
        let mut child1 = parent1.to_owned();
        let mut child2 = parent2.to_owned();
        if rng.r#gen::<f64>() > self.probability {
            return (child1, child2);
        }
        for i in 0..child1.len() {
            let (lb, ub) = (xlimits[[i, 0]], xlimits[[i, 1]]);
            let (x1, x2) = (parent1[i], parent2[i]);
            if rng.r#gen::<f64>() > 0.5 || (x1 - x2).abs() <= EPS {
                continue;
            }
            let (y1, y2) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
            let u: f64 = rng.r#gen();

            let beta = 1. + 2. * (y1 - lb) / (y2 - y1);
            let c1 = 0.5 * ((y1 + y2) - self.spread(beta, u) * (y2 - y1));
            let beta = 1. + 2. * (ub - y2) / (y2 - y1);
            let c2 = 0.5 * ((y1 + y2) + self.spread(beta, u) * (y2 - y1));

            let (c1, c2) = (c1.clamp(lb, ub), c2.clamp(lb, ub));
            if rng.r#gen::<bool>() {
                child1[i] = c2;
                child2[i] = c1;
            } else {
                child1[i] = c1;
                child2[i] = c2;
            }
        }
        (child1, child2)
    }

    fn spread(&self, beta: f64, u: f64) -> f64 {
        let alpha = 2. - beta.powf(-(self.eta + 1.));
        if u <= 1. / alpha {
            (u * alpha).powf(1. / (self.eta + 1.))
        } else {
            (1. / (2. - u * alpha)).powf(1. / (self.eta + 1.))
        }
    }
}

/// Polynomial mutation in its bounded version, see Deb K. and Goyal M. (1996)
/// "A combined genetic adaptive search (GeneAS) for engineering design",
/// Computer Science and Informatics, 26, 30-45.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolynomialMutation {
    /// Distribution index, large values produce small perturbations
    pub eta: f64,
    /// Probability to mutate each variable, `1 / nx` when not set
    pub probability: Option<f64>,
}

impl Default for PolynomialMutation {
    fn default() -> Self {
        PolynomialMutation {
            eta: 20.,
            probability: None,
        }
    }
}

impl PolynomialMutation {
    /// Mutates `x` in place within `xlimits` bounds
    pub fn mutate<R: Rng>(
        &self,
        x: &mut Array1<f64>,
        xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        rng: &mut R,
    ) {
        let pm = self.probability.unwrap_or(1. / x.len().max(1) as f64);
        let mut_pow = 1. / (self.eta + 1.);
        Zip::from(x)
            .and(xlimits.rows())
            .for_each(|xi, bounds| {
                if rng.r#gen::<f64>() >= pm {
                    return;
                }
                let (lb, ub) = (bounds[0], bounds[1]);
                let width = ub - lb;
                let delta1 = (*xi - lb) / width;
                let delta2 = (ub - *xi) / width;
                let r: f64 = rng.r#gen();
                let deltaq = if r < 0.5 {
                    let xy = 1. - delta1;
                    let val = 2. * r + (1. - 2. * r) * xy.powf(self.eta + 1.);
                    val.powf(mut_pow) - 1.
                } else {
                    let xy = 1. - delta2;
                    let val = 2. * (1. - r) + 2. * (r - 0.5) * xy.powf(self.eta + 1.);
                    1. - val.powf(mut_pow)
                };
                *xi = (*xi + deltaq * width).clamp(lb, ub);
            });
    }
}
