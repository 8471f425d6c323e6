//! The MADS iteration driver (§4.7) and the top-level [`MadsSolver`] that
//! runs it to a stop condition. Per §9 "Coroutine/async-like iteration",
//! `start`/`run`/`end` are a template-method pattern with hooks, not
//! cooperative multitasking: [`Step`] names the three hooks, [`Iteration`]
//! is its only implementor, and `MadsSolver` walks a flat sequence of them
//! rather than a recursive tree, since this crate has no sub-solver nesting.

use crate::arrays::{Direction, Point};
use crate::barrier::{Incumbent, ProgressiveBarrier};
use crate::direction::{generate_unit_poll_directions, second_pass_negative_sum};
use crate::double::Double;
use crate::error::{CoreError, EvaluatorError, ParamError};
use crate::eval::{Eval, EvalPoint, EvalType};
use crate::evaluator::{Evaluator, EvaluatorControl, EvcMainThreadInfo, StopReason};
use crate::mesh::{CsMesh, GMesh, MeshGeometry};
use crate::params::Parameters;
use crate::poll::build_trial_points;
use crate::queue::{EvalQueuePoint, EvaluationQueue, PriorityComparator, StepType};
use crate::types::{DirectionType, MeshStopReason, SuccessType};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tracing::{debug, info_span, warn};

/// The fixed anisotropy growth factor used by `enlargeDeltaFrameSize`
/// (§4.1); not currently exposed as a run parameter.
const ANISOTROPY_FACTOR: Double = Double::Finite(4.0);

/// Template-method hooks for one MADS step (§9). `Iteration` is the only
/// implementor; the trait exists so the driver walks steps uniformly rather
/// than calling concrete methods, matching the source's `Step` base class
/// without its ownership cycles.
pub trait Step {
    fn start(&mut self, barrier: &Mutex<ProgressiveBarrier>, params: &Parameters);
    fn run(
        &mut self,
        control: &EvaluatorControl,
        main: &EvcMainThreadInfo,
        barrier: &Mutex<ProgressiveBarrier>,
        params: &Parameters,
    ) -> Result<SuccessType, CoreError>;
    fn end(&mut self, success: SuccessType, barrier: &Mutex<ProgressiveBarrier>, params: &Parameters) -> Option<MeshStopReason>;
}

/// One MADS iteration: owns its mesh (cloned from the previous iteration's
/// when a sub-solver needs an independent copy, per §5 "Mesh objects ... are
/// cloned when passed to a sub-solver"), and talks to a shared barrier and
/// evaluator control.
pub struct Iteration {
    pub k: u64,
    mesh: Box<dyn MeshGeometry + Send>,
    rng: StdRng,
    frame_centers: Vec<Incumbent>,
    /// This run's generated trial points, kept so `end` can recover which
    /// direction produced the new incumbent (needed by anisotropic mesh
    /// enlargement; §9 Open Questions — an undefined direction here falls
    /// through to the no-anisotropy enlargement path).
    generated: Vec<(Point, Direction)>,
}

impl Iteration {
    pub fn new(mesh: Box<dyn MeshGeometry + Send>, seed: u64) -> Self {
        Iteration { k: 0, mesh, rng: StdRng::seed_from_u64(seed), frame_centers: Vec::new(), generated: Vec::new() }
    }

    pub fn mesh(&self) -> &dyn MeshGeometry {
        self.mesh.as_ref()
    }

    fn frame_centers_is_empty(&self) -> bool {
        self.frame_centers.is_empty()
    }

    fn poll_trial_points(&mut self, direction_type: DirectionType, params: &Parameters) -> Vec<EvalQueuePoint> {
        let mut out = Vec::new();
        let centers = self.frame_centers.clone();
        for center in &centers {
            let center_point = center.point().clone();
            for group in &params.variable_groups {
                let unit_dirs = generate_unit_poll_directions(direction_type, group.indices.len(), &mut self.rng);
                let trials = build_trial_points(
                    self.mesh.as_ref(),
                    &center_point,
                    group,
                    &unit_dirs,
                    &params.lower_bound,
                    &params.upper_bound,
                );
                for t in trials {
                    self.generated.push((t.point.clone(), t.direction.clone()));
                    out.push(EvalQueuePoint::new(t.point, StepType::Poll, Some(t.frame_center), self.mesh.as_ref()));
                }
            }
        }
        out
    }

    /// §4.3 "N+1 neg/quad" second pass: reduce the first-pass Ortho-2N basis
    /// to its first `n` directions and add the negative-sum direction. Only
    /// the `NEG` variant is implemented (§4.3, direction module doc).
    fn second_pass_trial_points(&mut self, params: &Parameters) -> Vec<EvalQueuePoint> {
        let mut out = Vec::new();
        let centers = self.frame_centers.clone();
        for center in &centers {
            let center_point = center.point().clone();
            for group in &params.variable_groups {
                let n_sub = group.indices.len();
                let first_pass = generate_unit_poll_directions(DirectionType::Ortho2N, n_sub, &mut self.rng);
                let reduced: Vec<_> = first_pass.into_iter().take(n_sub).collect();
                let neg_dir = second_pass_negative_sum(&reduced);
                let trials = build_trial_points(
                    self.mesh.as_ref(),
                    &center_point,
                    group,
                    std::slice::from_ref(&neg_dir),
                    &params.lower_bound,
                    &params.upper_bound,
                );
                for t in trials {
                    self.generated.push((t.point.clone(), t.direction.clone()));
                    out.push(EvalQueuePoint::new(t.point, StepType::Poll, Some(t.frame_center), self.mesh.as_ref()));
                }
            }
        }
        out
    }
}

impl Step for Iteration {
    /// Pick up to two frame centers (primary + secondary) from the barrier
    /// (§4.7 step 1).
    fn start(&mut self, barrier: &Mutex<ProgressiveBarrier>, params: &Parameters) {
        let b = barrier.lock().unwrap();
        let rho = Double::Finite(params.rho);
        self.frame_centers.clear();
        self.generated.clear();
        if let Some(primary) = b.primary_frame_center(rho) {
            self.frame_centers.push(Arc::clone(primary));
        }
        if let Some(secondary) = b.secondary_frame_center(rho) {
            self.frame_centers.push(Arc::clone(secondary));
        }
    }

    /// Generate and submit trial points (§4.4), then invoke
    /// `EvaluatorControl::run` (§4.7 steps 2-3), with the second-pass
    /// direction for `N+1 neg/quad` added if the first pass is unsuccessful.
    fn run(
        &mut self,
        control: &EvaluatorControl,
        main: &EvcMainThreadInfo,
        barrier: &Mutex<ProgressiveBarrier>,
        params: &Parameters,
    ) -> Result<SuccessType, CoreError> {
        let _span = info_span!("iteration_run", k = self.k).entered();
        if self.frame_centers.is_empty() {
            return Ok(SuccessType::Unsuccessful);
        }

        let first_pass = self.poll_trial_points(params.direction_type, params);
        submit(control.queue(), first_pass, params.opportunistic_eval)?;
        let mut success = control.run(main, barrier);

        if params.direction_type == DirectionType::NPlus1NegQuad && success == SuccessType::Unsuccessful {
            debug!("N+1 neg/quad: first pass unsuccessful; generating second-pass direction");
            let second_pass = self.second_pass_trial_points(params);
            if !second_pass.is_empty() {
                submit(control.queue(), second_pass, params.opportunistic_eval)?;
                let second_success = control.run(main, barrier);
                if second_success > success {
                    success = second_success;
                }
            }
        }
        Ok(success)
    }

    /// Update the mesh per the result (§4.7 step 4): refine on
    /// `Unsuccessful`, otherwise enlarge (anisotropically, if the succeeding
    /// direction can be recovered). Advance `k` and report any mesh stopping
    /// condition.
    fn end(&mut self, success: SuccessType, barrier: &Mutex<ProgressiveBarrier>, params: &Parameters) -> Option<MeshStopReason> {
        match success {
            SuccessType::Unsuccessful => {
                self.mesh.refine_delta_frame_size();
            }
            SuccessType::PartialSuccess | SuccessType::FullSuccess => {
                let rho = Double::Finite(params.rho);
                let new_primary = barrier.lock().unwrap().primary_frame_center(rho).map(|p| p.point().clone());
                let direction = new_primary.and_then(|np| {
                    self.generated.iter().find(|(p, _)| *p == np).map(|(_, d)| d.clone())
                });
                self.mesh.enlarge_delta_frame_size(direction.as_ref(), ANISOTROPY_FACTOR, true);
            }
        }
        self.k += 1;
        self.generated.clear();
        self.mesh.check_mesh_for_stopping()
    }
}

/// Lock, submit, and unlock a burst of trial points (§4.6 Submission).
fn submit(queue: &EvaluationQueue, points: Vec<EvalQueuePoint>, opportunistic: bool) -> Result<(), CoreError> {
    if points.is_empty() {
        return Ok(());
    }
    queue.lock_queue()?;
    for p in points {
        if let Err(e) = queue.add_to_queue(p) {
            warn!(error = %e, "failed to submit trial point");
        }
    }
    queue.unlock_queue(opportunistic)?;
    Ok(())
}

/// Outcome of running a [`MadsSolver`] to completion.
#[derive(Debug)]
pub struct SolveOutcome {
    pub best_feasible: Option<Incumbent>,
    pub best_infeasible: Option<Incumbent>,
    pub iterations: u64,
    pub bb_eval: u64,
    pub stop_reason: StopReason,
    /// Which mesh-stopping condition, if any, ended the run (§4.1 "Stopping").
    /// `None` means the run instead stopped on an evaluator-control condition
    /// (`stop_reason`) such as `MAX_BB_EVAL`.
    pub mesh_stop_reason: Option<MeshStopReason>,
}

/// The top-level driver (§9 glossary "Algorithm"): owns the process-wide
/// cache and evaluator control, seeds the barrier with `x0`, and walks a
/// sequence of [`Iteration`]s until a mesh or evaluator stop condition fires.
pub struct MadsSolver {
    params: Arc<Parameters>,
    control: Arc<EvaluatorControl>,
    main: EvcMainThreadInfo,
    barrier: Mutex<ProgressiveBarrier>,
    iteration: Iteration,
}

impl MadsSolver {
    pub fn new(params: Arc<Parameters>, evaluator: Arc<dyn Evaluator>, x0: Point, num_threads: usize) -> Result<Self, CoreError> {
        if x0.len() != params.dimension {
            return Err(CoreError::Param(ParamError::WrongLength {
                name: "x0",
                expected: params.dimension,
                got: x0.len(),
            }));
        }

        let queue = Arc::new(EvaluationQueue::new(PriorityComparator::Fifo, params.opportunistic_eval));
        let cache_size = 1_000_000;
        let cache = Arc::new(crate::cache::Cache::new(cache_size));
        let control = Arc::new(EvaluatorControl::new(
            Arc::clone(&queue),
            Arc::clone(&cache),
            Arc::clone(&evaluator),
            params.bb_max_block_size,
            num_threads,
        ));

        let mut main = EvcMainThreadInfo::new(params.opportunistic_eval);
        main.max_bb_eval = params.max_bb_eval;
        main.max_eval = params.max_eval;
        main.max_block_eval = params.max_block_eval;
        main.clear_eval_queue_on_opportunistic = params.clear_eval_queue;

        let mesh: Box<dyn MeshGeometry + Send> = match params.direction_type {
            DirectionType::Coordinate => Box::new(CsMesh::new(
                params.dimension,
                params.initial_frame_size.iter().cloned().fold(0.0, f64::max).max(1e-12),
                params.min_mesh_size.iter().cloned().fold(f64::INFINITY, f64::min),
                &params.granularity,
            )?),
            _ => Box::new(GMesh::new(
                &params.initial_frame_size,
                &params.min_mesh_size,
                &params.min_frame_size,
                &params.granularity,
            )?),
        };

        let x0_outcome = evaluator.eval_block(&[EvalQueuePoint::new(x0.clone(), StepType::Poll, None, mesh.as_ref())]);
        let outcome = x0_outcome
            .into_iter()
            .next()
            .ok_or(CoreError::Evaluator(EvaluatorError::TruncatedOutput { expected: 1, got: 0 }))?;

        // Probe under ordinary (non-phase-one) semantics first so
        // `enter_phase_one_if_needed` sees the real h; only then build the
        // point the barrier actually ingests, under whichever semantics it
        // decided on (mirrors `EvaluatorControl::eval_block`'s ordering).
        let mut probe = Eval::not_started(evaluator.output_types());
        probe.set_bb_outputs(outcome.bb_outputs.clone(), false);
        let mut probe_ep = EvalPoint::new(x0.clone());
        probe_ep.set_eval(EvalType::Blackbox, probe);

        let mut barrier = ProgressiveBarrier::new(EvalType::Blackbox);
        barrier.enter_phase_one_if_needed(&probe_ep);

        let mut eval = Eval::not_started(evaluator.output_types());
        eval.set_bb_outputs(outcome.bb_outputs, barrier.is_phase_one());
        eval.set_status(crate::types::EvalStatus::Ok);
        let mut ep = EvalPoint::new(x0);
        ep.set_eval(EvalType::Blackbox, eval);
        cache.insert(ep.clone())?;
        let ep = Arc::new(ep);

        barrier.update_with_points(&[ep])?;

        Ok(MadsSolver {
            params,
            control,
            main,
            barrier: Mutex::new(barrier),
            iteration: Iteration::new(mesh, 0),
        })
    }

    /// Run iterations to completion: stop when the mesh reports a stopping
    /// condition, or the evaluator control's stop reason is anything other
    /// than opportunistic success or an empty queue between iterations.
    pub fn optimize(&mut self) -> Result<SolveOutcome, CoreError> {
        let mut mesh_stop_reason = None;
        loop {
            self.iteration.start(&self.barrier, &self.params);
            if self.iteration.frame_centers_is_empty() {
                break;
            }
            let success = self.iteration.run(&self.control, &self.main, &self.barrier, &self.params)?;
            let mesh_stop = self.iteration.end(success, &self.barrier, &self.params);

            if mesh_stop.is_some() {
                debug!(?mesh_stop, "mesh reached a stopping condition");
                mesh_stop_reason = mesh_stop;
                break;
            }
            match self.main.stop_reason() {
                StopReason::None | StopReason::OpportunisticSuccess | StopReason::QueueEmpty => {
                    self.main.reset_lap();
                }
                other => {
                    debug!(?other, "evaluator control reached a terminal stop reason");
                    break;
                }
            }
        }

        let barrier = self.barrier.lock().unwrap();
        Ok(SolveOutcome {
            best_feasible: barrier.current_incumbent_feas().cloned(),
            best_infeasible: barrier.current_incumbent_inf().cloned(),
            iterations: self.iteration.k,
            bb_eval: self.main.bb_eval.load(std::sync::atomic::Ordering::SeqCst),
            stop_reason: self.main.stop_reason(),
            mesh_stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ClosureEvaluator;
    use crate::types::BbOutputType;

    fn sphere_params(n: usize) -> Arc<Parameters> {
        Parameters::builder(n)
            .bb_output_type(vec![BbOutputType::Obj])
            .initial_frame_size(vec![1.0; n])
            .direction_type(DirectionType::Ortho2N)
            .max_bb_eval(200)
            .build()
            .unwrap()
    }

    #[test]
    fn solver_reduces_f_on_a_simple_sphere() {
        let params = sphere_params(2);
        let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(vec![BbOutputType::Obj], |x| {
            vec![Double::Finite(x.iter().map(|v| v.to_f64().unwrap_or(0.0).powi(2)).sum())]
        }));
        let x0 = Point::from_f64(&[3.0, -2.0]);
        let mut solver = MadsSolver::new(params, evaluator, x0, 1).unwrap();
        let outcome = solver.optimize().unwrap();
        let best = outcome.best_feasible.expect("sphere is feasible everywhere");
        let f0 = 3.0f64.powi(2) + (-2.0f64).powi(2);
        if let Double::Finite(f) = best.f(EvalType::Blackbox) {
            assert!(f < f0);
        } else {
            panic!("expected a finite f for the final incumbent");
        }
    }

    #[test]
    fn solver_respects_max_bb_eval() {
        let params = sphere_params(2);
        let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(vec![BbOutputType::Obj], |x| {
            vec![Double::Finite(x.iter().map(|v| v.to_f64().unwrap_or(0.0).powi(2)).sum())]
        }));
        let x0 = Point::from_f64(&[3.0, -2.0]);
        let mut solver = MadsSolver::new(params, evaluator, x0, 1).unwrap();
        let outcome = solver.optimize().unwrap();
        assert!(outcome.bb_eval <= 200);
    }
}
