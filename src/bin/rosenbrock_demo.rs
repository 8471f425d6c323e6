//! Minimal CLI demo: drives [`mads_core::MadsSolver`] against the 2D
//! Rosenbrock function from `x0 = (-1.2, 1)` with no bounds, using Ortho-2N
//! poll directions (scenario 1, §8: "Rosenbrock n=2 ... expect final f <=
//! 1e-6 within 200 evaluations"). The source scenario also names a
//! speculative search step; this crate has no Search step (Non-goals), so
//! the demo runs poll alone and simply reports whatever it reaches.

#![forbid(unsafe_code)]

use mads_core::evaluator::{ClosureEvaluator, Evaluator};
use mads_core::{BbOutputType, DirectionType, Double, EvalType, MadsSolver, Parameters, Point};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn rosenbrock(x: &[Double]) -> Vec<Double> {
    let a = x[0].to_f64().unwrap_or(0.0);
    let b = x[1].to_f64().unwrap_or(0.0);
    let f = 100.0 * (b - a * a).powi(2) + (1.0 - a).powi(2);
    vec![Double::Finite(f)]
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params = Parameters::builder(2)
        .bb_output_type(vec![BbOutputType::Obj])
        .initial_frame_size(vec![1.0, 1.0])
        .direction_type(DirectionType::Ortho2N)
        .max_bb_eval(200)
        .build()
        .expect("valid run parameters");

    let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(vec![BbOutputType::Obj], rosenbrock));
    let x0 = Point::from_f64(&[-1.2, 1.0]);

    let mut solver = MadsSolver::new(params, evaluator, x0, 1).expect("solver setup");
    let outcome = solver.optimize().expect("optimize");

    match outcome.best_feasible {
        Some(best) => {
            let coords: Vec<String> = best.point().as_slice().iter().map(|d| d.to_string()).collect();
            println!(
                "best x = ({}), f = {}, iterations = {}, bb_eval = {}, stop = {:?}",
                coords.join(", "),
                best.f(EvalType::Blackbox),
                outcome.iterations,
                outcome.bb_eval,
                outcome.stop_reason,
            );
        }
        None => println!("no feasible incumbent found"),
    }
}
