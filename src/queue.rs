//! The evaluation queue: a lock/unlock-bracketed submission protocol over a
//! sortable vector of [`EvalQueuePoint`]s, popped in blocks by worker
//! threads. Grounded on `Eval/EvaluatorControl.cpp`'s `lockQueue`/
//! `addToQueue`/`popBlock` (the non-`USE_PRIORITY_QUEUE` vector path, since
//! this crate's priority comparator is swappable at runtime rather than
//! fixed by a `std::priority_queue`'s comparator type parameter).

use crate::arrays::Point;
use crate::double::Double;
use crate::error::EvaluatorError;
use crate::eval::EvalType;
use crate::mesh::MeshGeometry;
use std::sync::{Arc, Mutex};

/// Which MADS step generated a queued point; used as an ordering hint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepType {
    Poll,
    Search,
    Model,
}

/// One point awaiting evaluation, plus the generation metadata the priority
/// comparator and the evaluator's bookkeeping need.
#[derive(Clone)]
pub struct EvalQueuePoint {
    pub point: Point,
    pub step_type: StepType,
    pub frame_center: Option<Point>,
    /// Frame size at generation time, one component per coordinate; used by
    /// surrogate-based priority comparators. Not snapshotting the whole mesh
    /// object, only what ordering needs.
    pub frame_size_snapshot: Vec<Double>,
    pub eval_type: EvalType,
    /// Priority key precomputed at submission time (e.g. a surrogate `f`, or
    /// a random tag); lower sorts first.
    pub priority: f64,
}

impl EvalQueuePoint {
    pub fn new(point: Point, step_type: StepType, frame_center: Option<Point>, mesh: &dyn MeshGeometry) -> Self {
        let frame_size_snapshot = (0..mesh.n()).map(|i| mesh.delta_frame_size(i)).collect();
        EvalQueuePoint {
            point,
            step_type,
            frame_center,
            frame_size_snapshot,
            eval_type: EvalType::Blackbox,
            priority: 0.0,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }
}

/// A priority comparator over queued points; lower-priority-value pops first.
/// `Random` and `SurrogateF` are provided; `UserDefined` carries a boxed
/// closure for driver-supplied orderings (§4.5 "Pop order... may be overridden").
pub enum PriorityComparator {
    Fifo,
    SurrogateF,
    UserDefined(Box<dyn Fn(&EvalQueuePoint, &EvalQueuePoint) -> std::cmp::Ordering + Send + Sync>),
}

impl PriorityComparator {
    fn cmp(&self, a: &EvalQueuePoint, b: &EvalQueuePoint) -> std::cmp::Ordering {
        match self {
            PriorityComparator::Fifo => std::cmp::Ordering::Equal,
            PriorityComparator::SurrogateF => {
                a.priority.partial_cmp(&b.priority).unwrap_or(std::cmp::Ordering::Equal)
            }
            PriorityComparator::UserDefined(f) => f(a, b),
        }
    }
}

struct Inner {
    points: Vec<EvalQueuePoint>,
    locked: bool,
    opportunistic: bool,
}

/// The evaluation queue. `lock_queue`/`add_to_queue`/`unlock_queue` bracket a
/// producer burst; `pop_block` is called by workers.
pub struct EvaluationQueue {
    inner: Mutex<Inner>,
    comparator: PriorityComparator,
}

impl EvaluationQueue {
    pub fn new(comparator: PriorityComparator, opportunistic: bool) -> Self {
        EvaluationQueue {
            inner: Mutex::new(Inner { points: Vec::new(), locked: false, opportunistic }),
            comparator,
        }
    }

    pub fn lock_queue(&self) -> Result<(), EvaluatorError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.locked {
            return Err(EvaluatorError::QueueAlreadyLocked);
        }
        inner.locked = true;
        Ok(())
    }

    /// Add a point to the queue. Requires the queue to be locked by the
    /// calling producer (§4.6 Submission).
    pub fn add_to_queue(&self, p: EvalQueuePoint) -> Result<(), EvaluatorError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.locked {
            return Err(EvaluatorError::QueueNotLocked);
        }
        if !p.point.is_complete() {
            tracing::warn!("addToQueue: point has undefined coordinates; skipping");
            return Ok(());
        }
        inner.points.push(p);
        Ok(())
    }

    /// Release the lock. If `do_sort` and opportunism is enabled, re-sort by
    /// the current priority comparator.
    pub fn unlock_queue(&self, do_sort: bool) -> Result<(), EvaluatorError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.locked {
            return Err(EvaluatorError::QueueNotLocked);
        }
        if do_sort && inner.opportunistic {
            inner.points.sort_by(|a, b| self.comparator.cmp(a, b));
        }
        inner.locked = false;
        Ok(())
    }

    /// Pop a single point from the front, if any.
    pub fn pop_eval_point(&self) -> Option<EvalQueuePoint> {
        let mut inner = self.inner.lock().unwrap();
        if inner.points.is_empty() {
            None
        } else {
            Some(inner.points.remove(0))
        }
    }

    /// Pop up to `max_block_size` points (§4.6 Block popping). A block may
    /// legally be size 1; returns an empty vector only if the queue was empty.
    pub fn pop_block(&self, max_block_size: usize) -> Vec<EvalQueuePoint> {
        let mut inner = self.inner.lock().unwrap();
        let n = max_block_size.min(inner.points.len());
        inner.points.drain(0..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().points.len()
    }

    /// Discard all remaining points (opportunistic stop, §4.6).
    pub fn clear(&self) {
        self.inner.lock().unwrap().points.clear();
    }
}

pub type SharedQueue = Arc<EvaluationQueue>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CsMesh;

    fn mesh() -> CsMesh {
        CsMesh::new(1, 4.0, 1e-9, &[0.0]).unwrap()
    }

    #[test]
    fn add_without_lock_is_rejected() {
        let q = EvaluationQueue::new(PriorityComparator::Fifo, false);
        let p = EvalQueuePoint::new(Point::from_f64(&[1.0]), StepType::Poll, None, &mesh());
        assert!(matches!(q.add_to_queue(p), Err(EvaluatorError::QueueNotLocked)));
    }

    #[test]
    fn pop_block_respects_max_size() {
        let q = EvaluationQueue::new(PriorityComparator::Fifo, false);
        q.lock_queue().unwrap();
        for i in 0..5 {
            q.add_to_queue(EvalQueuePoint::new(Point::from_f64(&[i as f64]), StepType::Poll, None, &mesh())).unwrap();
        }
        q.unlock_queue(true).unwrap();
        let block = q.pop_block(3);
        assert_eq!(block.len(), 3);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn double_lock_is_rejected() {
        let q = EvaluationQueue::new(PriorityComparator::Fifo, false);
        q.lock_queue().unwrap();
        assert!(matches!(q.lock_queue(), Err(EvaluatorError::QueueAlreadyLocked)));
    }

    #[test]
    fn opportunistic_unlock_sorts_by_priority() {
        let q = EvaluationQueue::new(PriorityComparator::SurrogateF, true);
        q.lock_queue().unwrap();
        q.add_to_queue(EvalQueuePoint::new(Point::from_f64(&[0.0]), StepType::Poll, None, &mesh()).with_priority(5.0))
            .unwrap();
        q.add_to_queue(EvalQueuePoint::new(Point::from_f64(&[1.0]), StepType::Poll, None, &mesh()).with_priority(1.0))
            .unwrap();
        q.unlock_queue(true).unwrap();
        let first = q.pop_eval_point().unwrap();
        assert_eq!(first.priority, 1.0);
    }
}
