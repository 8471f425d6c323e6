//! `Cache`: a process-wide, hash-keyed set of [`EvalPoint`]s, with per-tier
//! `Eval`s. Grounded on `Cache/CacheSet.cpp`.

use crate::arrays::{NormType, Point};
use crate::double::Double;
use crate::error::CacheError;
use crate::eval::{Eval, EvalPoint, EvalType};
use crate::types::BbOutputTypeList;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{info, warn};

/// Hash key: a point's coordinates, requiring every coordinate to be defined
/// (`verifyPointComplete` in the reference).
fn point_key(p: &Point) -> Option<Vec<u64>> {
    if !p.is_complete() {
        return None;
    }
    Some(p.as_slice().iter().map(|d| d.to_f64().unwrap_or(0.0).to_bits()).collect())
}

struct Inner {
    n: usize,
    entries: HashMap<Vec<u64>, Arc<EvalPoint>>,
    nb_cache_hits: u64,
    output_types: BbOutputTypeList,
    max_size: usize,
}

/// A process-wide cache. Construct one with [`Cache::new`] and share it
/// behind an `Arc`, or install it as the single process instance via
/// [`Cache::install_global`] / [`Cache::global`] (§3 "single process-wide instance").
pub struct Cache {
    inner: Mutex<Inner>,
}

static GLOBAL: OnceLock<Arc<Cache>> = OnceLock::new();

impl Cache {
    pub fn new(max_size: usize) -> Self {
        Cache {
            inner: Mutex::new(Inner {
                n: 0,
                entries: HashMap::new(),
                nb_cache_hits: 0,
                output_types: Vec::new(),
                max_size,
            }),
        }
    }

    /// Install this cache as the single process-wide instance. Returns `Err`
    /// (with the `Arc` handed back) if one was already installed.
    pub fn install_global(cache: Arc<Cache>) -> Result<(), Arc<Cache>> {
        GLOBAL.set(cache)
    }

    pub fn global() -> Option<&'static Arc<Cache>> {
        GLOBAL.get()
    }

    pub fn nb_cache_hits(&self) -> u64 {
        self.inner.lock().unwrap().nb_cache_hits
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plain insert: `true` if this was a fresh point.
    pub fn insert(&self, ep: EvalPoint) -> Result<bool, CacheError> {
        let Some(key) = point_key(ep.point()) else {
            warn!("cache insert skipped: point has an undefined coordinate");
            return Ok(false);
        };
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.is_empty() {
            inner.n = ep.point().len();
        }
        if key.len() != inner.n {
            warn!(expected = inner.n, got = key.len(), "cache insert skipped: dimension mismatch");
            return Ok(false);
        }
        let fresh = !inner.entries.contains_key(&key);
        if fresh {
            inner.entries.insert(key, Arc::new(ep));
        }
        Ok(fresh)
    }

    /// `smartInsert`: returns "should evaluate" (§4.5).
    ///
    /// `true` on fresh insertion or on an existing point not yet evaluated
    /// under `tier`; `false` on a genuine cache hit. `nb_cache_hits` is
    /// incremented only for the blackbox tier, matching the reference's
    /// explicit `EvalType::BB` guard.
    pub fn smart_insert(&self, ep: EvalPoint, tier: EvalType) -> Result<bool, CacheError> {
        let Some(key) = point_key(ep.point()) else {
            warn!("smartInsert skipped: point has an undefined coordinate");
            return Ok(false);
        };
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.is_empty() {
            inner.n = ep.point().len();
        }
        if key.len() != inner.n {
            return Err(CacheError::UpdateOfMissingEntry);
        }

        if let Some(existing) = inner.entries.get(&key) {
            let already_evaluated = existing.eval(tier).map(|e| e.status().is_ok()).unwrap_or(false);
            if !already_evaluated {
                info!("point already in cache but not evaluated under this tier");
                return Ok(true);
            }
            if tier == EvalType::Blackbox {
                inner.nb_cache_hits += 1;
                info!(hits = inner.nb_cache_hits, "cache hit");
            }
            return Ok(false);
        }

        inner.entries.insert(key, Arc::new(ep));
        Ok(true)
    }

    /// Exact lookup by point coordinates.
    pub fn find(&self, p: &Point) -> Option<Arc<EvalPoint>> {
        let key = point_key(p)?;
        self.inner.lock().unwrap().entries.get(&key).cloned()
    }

    /// Collect every entry within `radius` of `center` under the given norm.
    pub fn find_by_distance(&self, center: &Point, radius: f64, norm_type: NormType) -> Vec<Arc<EvalPoint>> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .values()
            .filter(|ep| {
                if ep.point().len() != center.len() {
                    return false;
                }
                let diff = ep.point().diff(center);
                match diff.norm(norm_type) {
                    Double::Finite(d) => d <= radius,
                    _ => false,
                }
            })
            .cloned()
            .collect()
    }

    /// Entries satisfying an arbitrary predicate.
    pub fn find_by_predicate(&self, pred: impl Fn(&EvalPoint) -> bool) -> Vec<Arc<EvalPoint>> {
        let inner = self.inner.lock().unwrap();
        inner.entries.values().filter(|ep| pred(ep)).cloned().collect()
    }

    /// The entry minimizing `key` under `tier`, restricted to entries whose
    /// coordinates at `fixed_indices` equal `fixed_values` (a "fixed
    /// variable" sub-space constraint, §4.5).
    pub fn find_best_in_subspace(
        &self,
        tier: EvalType,
        fixed_indices: &[usize],
        fixed_values: &[Double],
        key: impl Fn(&Eval) -> Double,
    ) -> Option<Arc<EvalPoint>> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .values()
            .filter(|ep| {
                fixed_indices
                    .iter()
                    .zip(fixed_values.iter())
                    .all(|(&i, &v)| ep.point().as_slice().get(i).map(|c| *c == v).unwrap_or(false))
            })
            .filter_map(|ep| ep.eval(tier).map(|e| (ep, key(e))))
            .filter(|(_, k)| k.is_defined())
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(ep, _)| Arc::clone(ep))
    }

    /// Replace only the `Eval` part of an existing entry (point coordinates
    /// are immutable post-insertion).
    pub fn update(&self, p: &Point, tier: EvalType, eval: Eval) -> Result<(), CacheError> {
        let Some(key) = point_key(p) else {
            return Err(CacheError::UpdateOfMissingEntry);
        };
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.get_mut(&key) {
            Some(arc) => {
                let ep = Arc::make_mut(arc);
                ep.set_eval(tier, eval);
                Ok(())
            }
            None => Err(CacheError::UpdateOfMissingEntry),
        }
    }

    /// Mean `f` (blackbox tier) over entries with a defined `f`, and the
    /// count contributing to it.
    fn mean_f(&self) -> (Double, usize) {
        let inner = self.inner.lock().unwrap();
        let mut total = Double::ZERO;
        let mut n = 0usize;
        for ep in inner.entries.values() {
            let f = ep.f(EvalType::Blackbox);
            if f.is_defined() {
                total = total + f;
                n += 1;
            }
        }
        if n > 0 {
            (total / Double::Finite(n as f64), n)
        } else {
            (Double::Undefined, 0)
        }
    }

    /// When `size >= maxSize`, retain points whose `f` is below the mean;
    /// if that retains too few, arbitrarily keep the first half (§4.5).
    /// Never drops the entries `always_keep` accepts.
    pub fn purge(&self, always_keep: impl Fn(&EvalPoint) -> bool) {
        let max_size = self.inner.lock().unwrap().max_size;
        if max_size == 0 || self.len() < max_size {
            return;
        }
        warn!(size = self.len(), max_size, "cache purge: removing points");

        let (mean, n_with_f) = self.mean_f();
        let mut inner = self.inner.lock().unwrap();

        let retained: HashMap<Vec<u64>, Arc<EvalPoint>> = if n_with_f > 0 {
            inner
                .entries
                .iter()
                .filter(|(_, ep)| always_keep(ep) || (ep.f(EvalType::Blackbox).is_defined() && ep.f(EvalType::Blackbox) < mean))
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect()
        } else {
            let half = inner.entries.len() / 2;
            inner
                .entries
                .iter()
                .take(half.max(1))
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect()
        };
        inner.entries = retained;
    }

    /// Write the cache as a line-based text stream: `nbCacheHits`, the
    /// output-type list, then one line per entry with a usable blackbox
    /// `Eval` (§4.5 Persistence).
    pub fn write_to(&self, w: &mut impl Write) -> Result<(), CacheError> {
        let inner = self.inner.lock().unwrap();
        writeln!(w, "# NB_CACHE_HITS {}", inner.nb_cache_hits)?;
        writeln!(w, "# BB_OUTPUT_TYPE {}", inner.output_types.len())?;
        for ep in inner.entries.values() {
            if ep.eval(EvalType::Blackbox).map(|e| !e.bb_outputs().is_empty()).unwrap_or(false) {
                writeln!(w, "{}", ep.display_line())?;
            }
        }
        Ok(())
    }

    /// Read a cache file written by [`Cache::write_to`]. After ingestion,
    /// `f`/`h` are recomputed for every point under the *current*
    /// `output_types` (which may differ from what was on disk).
    pub fn read_from(&self, r: impl std::io::Read, output_types: BbOutputTypeList) -> Result<usize, CacheError> {
        let reader = BufReader::new(r);
        let mut count = 0;
        let mut inner = self.inner.lock().unwrap();
        inner.output_types = output_types.clone();
        for line in reader.lines() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let (coords, outputs) = parse_cache_line(&line)
                .ok_or_else(|| CacheError::MalformedLine(line.clone()))?;
            let point = Point::new(coords);
            let key = match point_key(&point) {
                Some(k) => k,
                None => continue,
            };
            let mut ep = EvalPoint::new(point);
            let mut eval = Eval::not_started(output_types.clone());
            eval.set_bb_outputs(outputs, false);
            ep.set_eval(EvalType::Blackbox, eval);
            inner.entries.insert(key, Arc::new(ep));
            count += 1;
        }
        Ok(count)
    }
}

fn parse_cache_line(line: &str) -> Option<(Vec<Double>, Vec<Double>)> {
    let open = line.find('(')?;
    let close = line.find(')')?;
    let coords: Vec<Double> = line[open + 1..close]
        .split_whitespace()
        .map(parse_double)
        .collect();
    let outputs: Vec<Double> = line[close + 1..].split_whitespace().map(parse_double).collect();
    Some((coords, outputs))
}

fn parse_double(tok: &str) -> Double {
    match tok {
        "-" => Double::Undefined,
        "+INF" => Double::PosInf,
        "-INF" => Double::NegInf,
        s => s.parse::<f64>().map(Double::Finite).unwrap_or(Double::Undefined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BbOutputType;

    fn ep(coords: &[f64]) -> EvalPoint {
        EvalPoint::new(Point::from_f64(coords))
    }

    #[test]
    fn smart_insert_then_cache_hit_increments_counter() {
        let cache = Cache::new(1000);
        assert!(cache.smart_insert(ep(&[1.0, 2.0]), EvalType::Blackbox).unwrap());

        let key_pt = Point::from_f64(&[1.0, 2.0]);
        let mut existing = EvalPoint::new(key_pt.clone());
        let mut eval = Eval::not_started(vec![BbOutputType::Obj]);
        eval.set_bb_outputs(vec![Double::Finite(3.0)], false);
        eval.set_status(crate::types::EvalStatus::Ok);
        existing.set_eval(EvalType::Blackbox, eval);
        cache.update(&key_pt, EvalType::Blackbox, existing.eval(EvalType::Blackbox).unwrap().clone()).unwrap();

        let should_eval = cache.smart_insert(ep(&[1.0, 2.0]), EvalType::Blackbox).unwrap();
        assert!(!should_eval);
        assert_eq!(cache.nb_cache_hits(), 1);
    }

    #[test]
    fn find_by_distance_respects_radius() {
        let cache = Cache::new(1000);
        cache.insert(ep(&[0.0, 0.0])).unwrap();
        cache.insert(ep(&[10.0, 10.0])).unwrap();
        let center = Point::from_f64(&[0.0, 0.0]);
        let found = cache.find_by_distance(&center, 1.0, NormType::L2);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn purge_below_max_size_is_a_no_op() {
        let cache = Cache::new(1000);
        cache.insert(ep(&[0.0])).unwrap();
        cache.purge(|_| false);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn write_then_read_round_trips_coordinates() {
        let cache = Cache::new(1000);
        let mut point = ep(&[1.5, -2.0]);
        let mut eval = Eval::not_started(vec![BbOutputType::Obj]);
        eval.set_bb_outputs(vec![Double::Finite(9.0)], false);
        point.set_eval(EvalType::Blackbox, eval);
        cache.insert(point).unwrap();

        let mut buf = Vec::new();
        cache.write_to(&mut buf).unwrap();

        let cache2 = Cache::new(1000);
        let n = cache2.read_from(&buf[..], vec![BbOutputType::Obj]).unwrap();
        assert_eq!(n, 1);
        let found = cache2.find(&Point::from_f64(&[1.5, -2.0]));
        assert!(found.is_some());
    }
}
