//! End-to-end scenarios for [`mads_core::MadsSolver`] (§8 concrete scenarios).
//! Scenario 4 (opportunism stress under concurrency) and scenario 6 (mesh
//! refine-then-enlarge) are exercised as unit tests closer to the code they
//! cover (`evaluator.rs`, `mesh/gmesh.rs`); this file covers the scenarios
//! that need a full solver run.

use mads_core::evaluator::{ClosureEvaluator, Evaluator};
use mads_core::{BbInputType, BbOutputType, DirectionType, Double, EvalType, MadsSolver, Parameters, Point};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn rosenbrock_improves_substantially_within_the_evaluation_budget() {
    let params = Parameters::builder(2)
        .bb_output_type(vec![BbOutputType::Obj])
        .initial_frame_size(vec![1.0, 1.0])
        .direction_type(DirectionType::Ortho2N)
        .max_bb_eval(200)
        .build()
        .unwrap();

    let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(vec![BbOutputType::Obj], |x| {
        let a = x[0].to_f64().unwrap_or(0.0);
        let b = x[1].to_f64().unwrap_or(0.0);
        vec![Double::Finite(100.0 * (b - a * a).powi(2) + (1.0 - a).powi(2))]
    }));

    let x0 = Point::from_f64(&[-1.2, 1.0]);
    let f0 = 100.0f64 * (1.0 - 1.44f64).powi(2) + (1.0 - (-1.2f64)).powi(2);

    let mut solver = MadsSolver::new(params, evaluator, x0, 1).unwrap();
    let outcome = solver.optimize().unwrap();

    assert!(outcome.bb_eval <= 200);
    let best = outcome.best_feasible.expect("rosenbrock is feasible everywhere");
    match best.f(EvalType::Blackbox) {
        Double::Finite(f) => assert!(f < f0 / 2.0, "expected substantial improvement over f0={f0}, got {f}"),
        other => panic!("expected a finite final objective, got {other:?}"),
    }
}

#[test]
fn integer_knapsack_keeps_every_evaluated_point_on_integer_coordinates() {
    let n = 5;
    let weights = [2.0, 3.0, 4.0, 5.0, 6.0];
    let values = [3.0, 4.0, 5.0, 8.0, 9.0];
    let capacity = 10.0;
    let saw_non_integer = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&saw_non_integer);

    let params = Parameters::builder(n)
        .bb_input_type(vec![BbInputType::Integer; n])
        .bb_output_type(vec![BbOutputType::Obj, BbOutputType::Eb])
        .lower_bound(vec![Some(0.0); n])
        .upper_bound(vec![Some(10.0); n])
        .initial_frame_size(vec![4.0; n])
        .min_mesh_size(vec![1.0; n])
        .direction_type(DirectionType::Ortho2N)
        .max_bb_eval(150)
        .build()
        .unwrap();

    let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(
        vec![BbOutputType::Obj, BbOutputType::Eb],
        move |x| {
            for v in x {
                if !v.is_integer() {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            let xs: Vec<f64> = x.iter().map(|v| v.to_f64().unwrap_or(0.0)).collect();
            let value: f64 = xs.iter().zip(values.iter()).map(|(x, v)| x * v).sum();
            let weight: f64 = xs.iter().zip(weights.iter()).map(|(x, w)| x * w).sum();
            vec![Double::Finite(-value), Double::Finite(weight - capacity)]
        },
    ));

    let x0 = Point::from_f64(&[0.0, 0.0, 0.0, 0.0, 0.0]);
    let mut solver = MadsSolver::new(params, evaluator, x0, 1).unwrap();
    let outcome = solver.optimize().unwrap();

    assert!(!saw_non_integer.load(Ordering::SeqCst), "blackbox saw a non-integer coordinate");
    assert_ne!(
        outcome.mesh_stop_reason,
        Some(mads_core::MeshStopReason::MinMeshSizeReached),
        "mesh-size termination should be disabled when every coordinate is granular"
    );
}

#[test]
fn phase_one_clears_once_the_eb_constraint_is_satisfied() {
    let params = Parameters::builder(2)
        .bb_output_type(vec![BbOutputType::Obj, BbOutputType::Eb])
        .initial_frame_size(vec![1.0, 1.0])
        .direction_type(DirectionType::Ortho2N)
        .max_bb_eval(50)
        .build()
        .unwrap();

    // x1 + x2 >= 1, encoded as the EB output `1 - x1 - x2` (violated when positive).
    let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(
        vec![BbOutputType::Obj, BbOutputType::Eb],
        |x| {
            let x1 = x[0].to_f64().unwrap_or(0.0);
            let x2 = x[1].to_f64().unwrap_or(0.0);
            vec![Double::Finite(x1 * x1), Double::Finite(1.0 - x1 - x2)]
        },
    ));

    let x0 = Point::from_f64(&[0.0, 0.0]);
    let mut solver = MadsSolver::new(params, evaluator, x0, 1).unwrap();
    let outcome = solver.optimize().unwrap();

    let best = outcome.best_feasible.expect("expected a feasible incumbent once phase one clears");
    assert_eq!(best.h(EvalType::Blackbox), Double::ZERO);
    match best.f(EvalType::Blackbox) {
        Double::Finite(f) => assert!(f <= 1.0, "expected a small objective once feasible, got {f}"),
        other => panic!("expected a finite final objective, got {other:?}"),
    }
}
