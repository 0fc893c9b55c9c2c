use crate::acquisition::{AcquisitionFunction, ExpectedImprovement};
use crate::bayesian::{AcquisitionContext, BayesianAlgorithm, BayesianGenerator};
use crate::errors::Result;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// Expected improvement strategy, it has no option
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedImprovementOptions {}

/// Single objective Bayesian optimization maximizing the expected
/// improvement over the best feasible evaluation
pub type ExpectedImprovementGenerator = BayesianGenerator<ExpectedImprovementOptions>;

impl BayesianAlgorithm for ExpectedImprovementOptions {
    fn name(&self) -> &'static str {
        "expected_improvement"
    }

    fn acquisition<'a>(
        &'a self,
        context: AcquisitionContext<'a>,
        _rng: &mut Xoshiro256Plus,
    ) -> Result<Box<dyn AcquisitionFunction + 'a>> {
        let f_min = context
            .feasible_objectives()
            .column(0)
            .iter()
            .copied()
            .reduce(f64::min);
        Ok(Box::new(
            ExpectedImprovement::new(context.objective_model()?, f_min)
                .constraints(context.constraint_models()?),
        ))
    }

    fn options(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayesian::BayesianConfig;
    use crate::bayesian::tests::min_gap;
    use crate::optimizer::AcquisitionOptimizer;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;
    use xopt_core::data::point;
    use xopt_core::{Data, Evaluator, Generator, ObjectiveKind, Point, Vocs, Xopt, XoptError};

    fn quadratic(p: &Point) -> anyhow::Result<Point> {
        Ok(point([("f", -(p["x"] + 0.4).powi(2))]))
    }

    #[test]
    fn test_ei_improves_quadratic() {
        let vocs = Vocs::new()
            .variable("x", -2., 2.)
            .objective("f", ObjectiveKind::Maximize);
        let config = BayesianConfig::default()
            .seed(0)
            .numerical_optimizer(AcquisitionOptimizer::default().n_restarts(5));
        let generator = ExpectedImprovementGenerator::new(&vocs, config, Default::default()).unwrap();
        let mut xopt = Xopt::new(&vocs, Box::new(generator), Evaluator::new(quadratic))
            .unwrap()
            .max_evaluations(12);
        xopt.random_evaluate(3, Some(42)).unwrap();
        let (_, initial_best) = vocs.select_best(xopt.data()).unwrap();
        xopt.run().unwrap();
        let (i, best) = vocs.select_best(xopt.data()).unwrap();
        assert!(best >= initial_best);
        assert_abs_diff_eq!(xopt.data().records()[i].get("x"), -0.4, epsilon = 0.1);
    }

    fn xsinx(p: &Point) -> anyhow::Result<Point> {
        let x = p["x"];
        Ok(point([("f", (x - 3.5) * ((x - 3.5) / PI).sin())]))
    }

    #[test]
    fn test_ei_batch_candidates_are_distinct() {
        let vocs = Vocs::new()
            .variable("x", 0., 25.)
            .objective("f", ObjectiveKind::Minimize);
        let config = BayesianConfig::default()
            .seed(42)
            .numerical_optimizer(AcquisitionOptimizer::default().n_restarts(5));
        let mut generator =
            ExpectedImprovementGenerator::new(&vocs, config, Default::default()).unwrap();
        let evaluator = Evaluator::new(xsinx);
        let initial: Vec<Point> = [0., 7., 15., 20., 25.]
            .iter()
            .map(|&x| point([("x", x)]))
            .collect();
        let data: Data = evaluator.evaluate_data(&initial).unwrap();
        generator.add_data(&data).unwrap();

        let candidates = generator.generate(4).unwrap();
        assert_eq!(candidates.len(), 4);
        for c in &candidates {
            assert!(vocs.validate_input(c).is_ok());
        }
        let gap = min_gap(&vocs, &candidates);
        assert!(gap > 1e-3, "candidates too close: {gap}");
        // pending candidates do not change the evaluated data
        assert_eq!(generator.data().len(), 5);
    }

    #[test]
    fn test_ei_needs_data() {
        let vocs = Vocs::new()
            .variable("x", -2., 2.)
            .objective("f", ObjectiveKind::Maximize);
        let mut generator =
            ExpectedImprovementGenerator::new(&vocs, BayesianConfig::default(), Default::default())
                .unwrap();
        assert!(matches!(
            generator.generate(1),
            Err(XoptError::NoValidResults)
        ));
    }
}
