//! `EvaluatorControl`: the work-stealing driver that pops blocks off the
//! evaluation queue, calls an [`Evaluator`], writes results back into the
//! cache, and aggregates success under a critical section. Grounded on
//! `Eval/EvaluatorControl.cpp` and `Eval/EvcMainThreadInfo.cpp`, restated
//! over a `rayon` thread pool instead of the reference's OpenMP section.

use crate::barrier::ProgressiveBarrier;
use crate::cache::Cache;
use crate::double::Double;
use crate::error::EvaluatorError;
use crate::eval::{Eval, EvalPoint, EvalType};
use crate::queue::{EvalQueuePoint, EvaluationQueue};
use crate::types::{BbOutputTypeList, EvalStatus, SuccessType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info_span, trace, warn};

/// One evaluation outcome the [`Evaluator`] reports per point: the raw
/// blackbox output vector, whether it should count toward the eval budget,
/// and whether the underlying process/model reported success.
pub struct EvalOutcome {
    pub bb_outputs: Vec<Double>,
    pub count_eval: bool,
    pub eval_ok: bool,
}

/// The thing that actually runs a blackbox, surrogate, or model on a block of
/// points. An external-process blackbox and an in-process closure (used by
/// the demo binary and tests) both implement this.
pub trait Evaluator: Send + Sync {
    fn eval_type(&self) -> EvalType;
    fn output_types(&self) -> BbOutputTypeList;
    fn eval_block(&self, points: &[EvalQueuePoint]) -> Vec<EvalOutcome>;
}

/// An in-process closure evaluator (§4.6; this crate's analogue of the
/// reference's `Evaluator` subclass hierarchy, without process spawning).
pub struct ClosureEvaluator<F: Fn(&[Double]) -> Vec<Double> + Send + Sync> {
    output_types: BbOutputTypeList,
    f: F,
}

impl<F: Fn(&[Double]) -> Vec<Double> + Send + Sync> ClosureEvaluator<F> {
    pub fn new(output_types: BbOutputTypeList, f: F) -> Self {
        ClosureEvaluator { output_types, f }
    }
}

impl<F: Fn(&[Double]) -> Vec<Double> + Send + Sync> Evaluator for ClosureEvaluator<F> {
    fn eval_type(&self) -> EvalType {
        EvalType::Blackbox
    }

    fn output_types(&self) -> BbOutputTypeList {
        self.output_types.clone()
    }

    fn eval_block(&self, points: &[EvalQueuePoint]) -> Vec<EvalOutcome> {
        points
            .iter()
            .map(|p| {
                let outputs = (self.f)(p.point.as_slice());
                EvalOutcome { bb_outputs: outputs, count_eval: true, eval_ok: true }
            })
            .collect()
    }
}

/// Stop conditions an `EvcMainThreadInfo` may have reached (§4.6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    None,
    QueueEmpty,
    MaxBbEvalReached,
    MaxEvalReached,
    MaxBlockEvalReached,
    OpportunisticSuccess,
    UserInterrupt,
}

/// Counters and toggles for one top-level driver's main thread (§4.6).
pub struct EvcMainThreadInfo {
    pub bb_eval: AtomicU64,
    pub lap_bb_eval: AtomicU64,
    pub sgte_eval: AtomicU64,
    pub model_eval: AtomicU64,
    pub block_eval: AtomicU64,
    pub nb_eval: AtomicU64,
    pub max_bb_eval: Option<u64>,
    pub max_eval: Option<u64>,
    pub max_block_eval: Option<u64>,
    pub opportunistic: bool,
    pub clear_eval_queue_on_opportunistic: bool,
    stop_reason: Mutex<StopReason>,
    aggregated_success: Mutex<SuccessType>,
}

impl EvcMainThreadInfo {
    pub fn new(opportunistic: bool) -> Self {
        EvcMainThreadInfo {
            bb_eval: AtomicU64::new(0),
            lap_bb_eval: AtomicU64::new(0),
            sgte_eval: AtomicU64::new(0),
            model_eval: AtomicU64::new(0),
            block_eval: AtomicU64::new(0),
            nb_eval: AtomicU64::new(0),
            max_bb_eval: None,
            max_eval: None,
            max_block_eval: None,
            opportunistic,
            clear_eval_queue_on_opportunistic: true,
            stop_reason: Mutex::new(StopReason::None),
            aggregated_success: Mutex::new(SuccessType::Unsuccessful),
        }
    }

    pub fn stop_reason(&self) -> StopReason {
        *self.stop_reason.lock().unwrap()
    }

    fn set_stop_reason_if_unset(&self, reason: StopReason) {
        let mut sr = self.stop_reason.lock().unwrap();
        if *sr == StopReason::None {
            *sr = reason;
        }
    }

    pub fn reset_lap(&self) {
        self.lap_bb_eval.store(0, Ordering::SeqCst);
        *self.stop_reason.lock().unwrap() = StopReason::None;
        *self.aggregated_success.lock().unwrap() = SuccessType::Unsuccessful;
    }

    pub fn aggregated_success(&self) -> SuccessType {
        *self.aggregated_success.lock().unwrap()
    }

    /// Record a per-point success under the critical section (§4.6 step 4),
    /// and trip opportunistic stop if enabled.
    fn record_success(&self, success: SuccessType) {
        let mut agg = self.aggregated_success.lock().unwrap();
        if success > *agg {
            *agg = success;
        }
        if self.opportunistic && *agg >= SuccessType::PartialSuccess {
            drop(agg);
            self.set_stop_reason_if_unset(StopReason::OpportunisticSuccess);
        }
    }

    /// Any stop condition reached, checked before popping the next block
    /// (§4.6 Stop conditions).
    fn check_stop(&self, queue: &EvaluationQueue) -> StopReason {
        if self.stop_reason() != StopReason::None {
            return self.stop_reason();
        }
        if queue.is_empty() {
            return StopReason::QueueEmpty;
        }
        if let Some(max) = self.max_bb_eval {
            if self.bb_eval.load(Ordering::SeqCst) >= max {
                return StopReason::MaxBbEvalReached;
            }
        }
        if let Some(max) = self.max_eval {
            if self.nb_eval.load(Ordering::SeqCst) >= max {
                return StopReason::MaxEvalReached;
            }
        }
        if let Some(max) = self.max_block_eval {
            if self.block_eval.load(Ordering::SeqCst) >= max {
                return StopReason::MaxBlockEvalReached;
            }
        }
        StopReason::None
    }
}

/// A single process-wide evaluator control, shared across all drivers.
/// Holds the shared queue and cache; per-driver state lives in
/// [`EvcMainThreadInfo`] (one per top-level driver, per §4.6).
pub struct EvaluatorControl {
    queue: Arc<EvaluationQueue>,
    cache: Arc<Cache>,
    evaluator: Arc<dyn Evaluator>,
    max_block_size: usize,
    pool: rayon::ThreadPool,
}

impl EvaluatorControl {
    pub fn new(
        queue: Arc<EvaluationQueue>,
        cache: Arc<Cache>,
        evaluator: Arc<dyn Evaluator>,
        max_block_size: usize,
        num_threads: usize,
    ) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .build()
            .expect("evaluator thread pool construction should not fail");
        EvaluatorControl { queue, cache, evaluator, max_block_size, pool }
    }

    /// Run the main loop against one driver's [`EvcMainThreadInfo`] and
    /// [`ProgressiveBarrier`], popping blocks until a stop condition fires
    /// (§4.6 `run()`). Returns the aggregated success type for this lap.
    pub fn run(&self, main: &EvcMainThreadInfo, barrier: &Mutex<ProgressiveBarrier>) -> SuccessType {
        let _span = info_span!("evaluator_control_run").entered();
        loop {
            let reason = main.check_stop(&self.queue);
            if reason != StopReason::None {
                main.set_stop_reason_if_unset(reason);
                break;
            }
            let block = self.queue.pop_block(self.max_block_size);
            if block.is_empty() {
                main.set_stop_reason_if_unset(StopReason::QueueEmpty);
                break;
            }
            self.eval_block(&block, main, barrier);

            if main.opportunistic && main.aggregated_success() >= SuccessType::PartialSuccess {
                main.set_stop_reason_if_unset(StopReason::OpportunisticSuccess);
                if main.clear_eval_queue_on_opportunistic {
                    self.queue.clear();
                }
                break;
            }
        }
        main.aggregated_success()
    }

    fn eval_block(&self, block: &[EvalQueuePoint], main: &EvcMainThreadInfo, barrier: &Mutex<ProgressiveBarrier>) {
        let _span = info_span!("block", size = block.len()).entered();
        let tier = self.evaluator.eval_type();

        // Pre: find-or-insert, transition to IN_PROGRESS (§4.6 step 1).
        // `smartInsert`'s "should evaluate" result decides, per point,
        // whether it is a genuine cache hit (§4.5) — only the subset that
        // comes back `true` is forwarded to the evaluator below.
        let mut should_evaluate = Vec::with_capacity(block.len());
        let mut to_evaluate = Vec::with_capacity(block.len());
        for p in block {
            let ep = EvalPoint::new(p.point.clone());
            let eval_needed = match self.cache.smart_insert(ep, tier) {
                Ok(should) => should,
                Err(e) => {
                    warn!(error = %e, "smartInsert failed; evaluating point anyway");
                    true
                }
            };
            if eval_needed {
                to_evaluate.push(p.clone());
            }
            should_evaluate.push(eval_needed);
        }

        // Call the Evaluator only on the points that are not cache hits.
        // This may legitimately run on the calling worker thread for a long
        // time (external process, model fit).
        let outcomes = if to_evaluate.is_empty() {
            Vec::new()
        } else {
            self.pool.install(|| self.evaluator.eval_block(&to_evaluate))
        };
        let mut outcomes = outcomes.into_iter();

        let output_types = self.evaluator.output_types();
        let h_max = barrier.lock().unwrap().h_max();

        let mut batch = Vec::with_capacity(block.len());
        for (p, eval_needed) in block.iter().zip(should_evaluate.into_iter()) {
            let ep: Arc<EvalPoint> = if eval_needed {
                let outcome = outcomes.next().expect("one outcome per point forwarded to the evaluator");
                let mut eval = Eval::not_started(output_types.clone());
                eval.set_bb_outputs(outcome.bb_outputs, barrier.lock().unwrap().is_phase_one());

                let status = if !outcome.eval_ok {
                    EvalStatus::Error
                } else if eval.h().is_defined() && eval.h() > h_max {
                    EvalStatus::ConsHOver
                } else {
                    EvalStatus::Ok
                };
                eval.set_status(status);

                if let Err(e) = self.cache.update(&p.point, tier, eval.clone()) {
                    warn!(error = %e, "failed to write evaluation back into cache");
                }

                if outcome.count_eval && tier == EvalType::Blackbox {
                    main.bb_eval.fetch_add(1, Ordering::SeqCst);
                    main.lap_bb_eval.fetch_add(1, Ordering::SeqCst);
                }
                match tier {
                    EvalType::Surrogate => {
                        main.sgte_eval.fetch_add(1, Ordering::SeqCst);
                    }
                    EvalType::Model => {
                        main.model_eval.fetch_add(1, Ordering::SeqCst);
                    }
                    EvalType::Blackbox => {}
                }

                let mut ep = EvalPoint::new(p.point.clone());
                ep.set_eval(tier, eval);
                Arc::new(ep)
            } else {
                // Cache hit: reuse the cache's own entry instead of
                // re-invoking the evaluator (§4.5 smartInsert contract, §8
                // Invariants 6/7).
                self.cache
                    .find(&p.point)
                    .unwrap_or_else(|| Arc::new(EvalPoint::new(p.point.clone())))
            };

            let reference = barrier.lock().unwrap().current_incumbent_feas().cloned()
                .or_else(|| barrier.lock().unwrap().current_incumbent_inf().cloned());
            let success = barrier.lock().unwrap().compute_success_type(&ep, reference.as_deref());
            main.record_success(success);

            // Total evaluations include cache hits (§8 Invariant 7:
            // `nbEval == nbEvalSentToEvaluator + nbCacheHits`).
            main.nb_eval.fetch_add(1, Ordering::SeqCst);

            trace!(f = %ep.f(tier), h = %ep.h(tier), cache_hit = !eval_needed, "evaluated point");
            batch.push(ep);
        }
        main.block_eval.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = barrier.lock().unwrap().update_with_points(&batch) {
            warn!(error = %e, "barrier update failed");
        }
    }

    pub fn queue(&self) -> &Arc<EvaluationQueue> {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::Point;
    use crate::mesh::CsMesh;
    use crate::queue::{PriorityComparator, StepType};
    use crate::types::BbOutputType;

    fn mesh() -> CsMesh {
        CsMesh::new(1, 4.0, 1e-9, &[0.0]).unwrap()
    }

    #[test]
    fn run_evaluates_queued_block_and_stops_on_empty_queue() {
        let queue = Arc::new(EvaluationQueue::new(PriorityComparator::Fifo, false));
        let cache = Arc::new(Cache::new(1000));
        let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(vec![BbOutputType::Obj], |x| {
            vec![Double::Finite(x[0] * x[0])]
        }));
        let control = EvaluatorControl::new(Arc::clone(&queue), Arc::clone(&cache), evaluator, 8, 2);

        queue.lock_queue().unwrap();
        for i in 0..3 {
            queue
                .add_to_queue(EvalQueuePoint::new(Point::from_f64(&[i as f64]), StepType::Poll, None, &mesh()))
                .unwrap();
        }
        queue.unlock_queue(false).unwrap();

        let main = EvcMainThreadInfo::new(false);
        let barrier = Mutex::new(ProgressiveBarrier::new(EvalType::Blackbox));
        control.run(&main, &barrier);

        assert_eq!(main.bb_eval.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());
    }

    /// §8 Concrete Scenario 5: submitting the same point across separate
    /// blocks evaluates the blackbox once and counts the rest as cache hits.
    #[test]
    fn resubmitting_the_same_point_is_deduped_by_the_cache() {
        use std::sync::atomic::AtomicUsize;

        let queue = Arc::new(EvaluationQueue::new(PriorityComparator::Fifo, false));
        let cache = Arc::new(Cache::new(1000));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_inner = Arc::clone(&calls);
        let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(vec![BbOutputType::Obj], move |x| {
            calls_inner.fetch_add(1, Ordering::SeqCst);
            vec![Double::Finite(x[0] * x[0])]
        }));
        // Block size 1 forces three separate blocks, one per submission.
        let control = EvaluatorControl::new(Arc::clone(&queue), Arc::clone(&cache), evaluator, 1, 1);

        let main = EvcMainThreadInfo::new(false);
        let barrier = Mutex::new(ProgressiveBarrier::new(EvalType::Blackbox));

        for _ in 0..3 {
            queue.lock_queue().unwrap();
            queue
                .add_to_queue(EvalQueuePoint::new(Point::from_f64(&[2.0]), StepType::Poll, None, &mesh()))
                .unwrap();
            queue.unlock_queue(false).unwrap();
            control.run(&main, &barrier);
            main.reset_lap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "the blackbox should only run once for a repeated point");
        assert_eq!(cache.nb_cache_hits(), 2);
        assert_eq!(main.nb_eval.load(Ordering::SeqCst), 3, "nbEval counts cache hits too");
        assert_eq!(main.bb_eval.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn opportunistic_success_stops_the_loop_early() {
        let queue = Arc::new(EvaluationQueue::new(PriorityComparator::Fifo, true));
        let cache = Arc::new(Cache::new(1000));
        let evaluator: Arc<dyn Evaluator> = Arc::new(ClosureEvaluator::new(vec![BbOutputType::Obj], |x| {
            vec![Double::Finite(x[0])]
        }));
        let control = EvaluatorControl::new(Arc::clone(&queue), Arc::clone(&cache), evaluator, 1, 1);

        queue.lock_queue().unwrap();
        for i in 0..5 {
            queue
                .add_to_queue(EvalQueuePoint::new(Point::from_f64(&[-(i as f64)]), StepType::Poll, None, &mesh()))
                .unwrap();
        }
        queue.unlock_queue(true).unwrap();

        let main = EvcMainThreadInfo::new(true);
        let barrier = Mutex::new(ProgressiveBarrier::new(EvalType::Blackbox));
        control.run(&main, &barrier);

        assert_eq!(main.stop_reason(), StopReason::OpportunisticSuccess);
    }
}
