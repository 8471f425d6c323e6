//! Run parameters: the mandatory dimension, per-coordinate bounds/granularity,
//! direction family, stop conditions, and the evaluation-control knobs, built
//! via [`ParametersBuilder`] and frozen by a single [`Parameters::check_and_comply`]
//! validation pass (§6 "Parameters (core-relevant subset)"). There is
//! deliberately no file-format reader here: loading `NAME value...` parameter
//! files is a driver concern, outside what this crate owns.

use crate::error::ParamError;
use crate::poll::VariableGroup;
use crate::types::{BbInputType, BbOutputType, BbOutputTypeList, DirectionType};
use std::sync::Arc;

/// A frozen, validated run configuration. Only reachable through
/// [`ParametersBuilder::build`], which runs `check_and_comply` once and hands
/// back an `Arc` so every thread in the driver shares one read-only snapshot
/// (§5 "Parameters are read-only after checkAndComply").
#[derive(Clone, Debug)]
pub struct Parameters {
    pub dimension: usize,
    pub bb_input_type: Vec<BbInputType>,
    pub bb_output_type: BbOutputTypeList,
    pub lower_bound: Vec<Option<f64>>,
    pub upper_bound: Vec<Option<f64>>,
    pub granularity: Vec<f64>,
    pub initial_mesh_size: Vec<f64>,
    pub initial_frame_size: Vec<f64>,
    pub min_mesh_size: Vec<f64>,
    pub min_frame_size: Vec<Option<f64>>,
    pub direction_type: DirectionType,
    pub max_bb_eval: Option<u64>,
    pub max_eval: Option<u64>,
    pub max_block_eval: Option<u64>,
    pub bb_max_block_size: usize,
    pub sgtelib_model_eval_nb: Option<u64>,
    pub opportunistic_eval: bool,
    pub eval_use_cache: bool,
    pub clear_eval_queue: bool,
    pub rho: f64,
    pub h_max_0: f64,
    pub variable_groups: Vec<VariableGroup>,
}

impl Parameters {
    pub fn builder(dimension: usize) -> ParametersBuilder {
        ParametersBuilder::new(dimension)
    }
}

/// Accumulates parameter values with MADS's usual defaults, then validates
/// everything in one pass at `build()` time (the source's `checkAndComply`).
/// Unset per-coordinate vectors are broadcast from a scalar default rather
/// than left empty, matching the `*R`/`*I`/`*B` "all coordinates" convention.
pub struct ParametersBuilder {
    dimension: usize,
    bb_input_type: Option<Vec<BbInputType>>,
    bb_output_type: Option<BbOutputTypeList>,
    lower_bound: Option<Vec<Option<f64>>>,
    upper_bound: Option<Vec<Option<f64>>>,
    granularity: Option<Vec<f64>>,
    initial_mesh_size: Option<Vec<f64>>,
    initial_frame_size: Option<Vec<f64>>,
    min_mesh_size: Option<Vec<f64>>,
    min_frame_size: Option<Vec<Option<f64>>>,
    direction_type: DirectionType,
    max_bb_eval: Option<u64>,
    max_eval: Option<u64>,
    max_block_eval: Option<u64>,
    bb_max_block_size: usize,
    sgtelib_model_eval_nb: Option<u64>,
    opportunistic_eval: bool,
    eval_use_cache: bool,
    clear_eval_queue: bool,
    rho: f64,
    h_max_0: f64,
    variable_groups: Option<Vec<VariableGroup>>,
}

impl ParametersBuilder {
    pub fn new(dimension: usize) -> Self {
        ParametersBuilder {
            dimension,
            bb_input_type: None,
            bb_output_type: None,
            lower_bound: None,
            upper_bound: None,
            granularity: None,
            initial_mesh_size: None,
            initial_frame_size: None,
            min_mesh_size: None,
            min_frame_size: None,
            direction_type: DirectionType::Ortho2N,
            max_bb_eval: None,
            max_eval: None,
            max_block_eval: None,
            bb_max_block_size: 1,
            sgtelib_model_eval_nb: None,
            opportunistic_eval: true,
            eval_use_cache: true,
            clear_eval_queue: true,
            rho: 0.1,
            h_max_0: f64::INFINITY,
            variable_groups: None,
        }
    }

    pub fn bb_input_type(mut self, v: Vec<BbInputType>) -> Self {
        self.bb_input_type = Some(v);
        self
    }

    pub fn bb_output_type(mut self, v: BbOutputTypeList) -> Self {
        self.bb_output_type = Some(v);
        self
    }

    pub fn lower_bound(mut self, v: Vec<Option<f64>>) -> Self {
        self.lower_bound = Some(v);
        self
    }

    pub fn upper_bound(mut self, v: Vec<Option<f64>>) -> Self {
        self.upper_bound = Some(v);
        self
    }

    pub fn granularity(mut self, v: Vec<f64>) -> Self {
        self.granularity = Some(v);
        self
    }

    pub fn initial_mesh_size(mut self, v: Vec<f64>) -> Self {
        self.initial_mesh_size = Some(v);
        self
    }

    pub fn initial_frame_size(mut self, v: Vec<f64>) -> Self {
        self.initial_frame_size = Some(v);
        self
    }

    pub fn min_mesh_size(mut self, v: Vec<f64>) -> Self {
        self.min_mesh_size = Some(v);
        self
    }

    pub fn min_frame_size(mut self, v: Vec<Option<f64>>) -> Self {
        self.min_frame_size = Some(v);
        self
    }

    pub fn direction_type(mut self, d: DirectionType) -> Self {
        self.direction_type = d;
        self
    }

    pub fn max_bb_eval(mut self, n: u64) -> Self {
        self.max_bb_eval = Some(n);
        self
    }

    pub fn max_eval(mut self, n: u64) -> Self {
        self.max_eval = Some(n);
        self
    }

    pub fn max_block_eval(mut self, n: u64) -> Self {
        self.max_block_eval = Some(n);
        self
    }

    pub fn bb_max_block_size(mut self, n: usize) -> Self {
        self.bb_max_block_size = n.max(1);
        self
    }

    pub fn sgtelib_model_eval_nb(mut self, n: u64) -> Self {
        self.sgtelib_model_eval_nb = Some(n);
        self
    }

    pub fn opportunistic_eval(mut self, b: bool) -> Self {
        self.opportunistic_eval = b;
        self
    }

    pub fn eval_use_cache(mut self, b: bool) -> Self {
        self.eval_use_cache = b;
        self
    }

    pub fn clear_eval_queue(mut self, b: bool) -> Self {
        self.clear_eval_queue = b;
        self
    }

    pub fn rho(mut self, r: f64) -> Self {
        self.rho = r;
        self
    }

    pub fn h_max_0(mut self, h: f64) -> Self {
        self.h_max_0 = h;
        self
    }

    pub fn variable_groups(mut self, groups: Vec<VariableGroup>) -> Self {
        self.variable_groups = Some(groups);
        self
    }

    /// Run `check_and_comply` once and freeze the result behind an `Arc`.
    pub fn build(self) -> Result<Arc<Parameters>, ParamError> {
        let n = self.dimension;
        if n == 0 {
            return Err(ParamError::Missing("DIMENSION"));
        }

        let bb_input_type = self.bb_input_type.unwrap_or_else(|| vec![BbInputType::Continuous; n]);
        require_len("BB_INPUT_TYPE", &bb_input_type, n)?;

        let bb_output_type = self
            .bb_output_type
            .ok_or(ParamError::Missing("BB_OUTPUT_TYPE"))?;
        if bb_output_type.is_empty() {
            return Err(ParamError::Invalid {
                name: "BB_OUTPUT_TYPE",
                reason: "must list at least one output".to_string(),
            });
        }
        if !bb_output_type.iter().any(|t| *t == BbOutputType::Obj) {
            return Err(ParamError::Invalid {
                name: "BB_OUTPUT_TYPE",
                reason: "must contain at least one OBJ entry".to_string(),
            });
        }

        let lower_bound = self.lower_bound.unwrap_or_else(|| vec![None; n]);
        require_len("LOWER_BOUND", &lower_bound, n)?;
        let upper_bound = self.upper_bound.unwrap_or_else(|| vec![None; n]);
        require_len("UPPER_BOUND", &upper_bound, n)?;
        for i in 0..n {
            if let (Some(lo), Some(hi)) = (lower_bound[i], upper_bound[i]) {
                if lo > hi {
                    return Err(ParamError::Invalid {
                        name: "LOWER_BOUND/UPPER_BOUND",
                        reason: format!("coordinate {i}: lower bound {lo} exceeds upper bound {hi}"),
                    });
                }
            }
        }

        let mut granularity = self.granularity.unwrap_or_else(|| vec![0.0; n]);
        require_len("GRANULARITY", &granularity, n)?;
        for i in 0..n {
            if let Some(forced) = bb_input_type[i].forced_granularity() {
                granularity[i] = forced;
            }
            if granularity[i] < 0.0 {
                return Err(ParamError::Invalid {
                    name: "GRANULARITY",
                    reason: format!("coordinate {i}: negative granularity {}", granularity[i]),
                });
            }
        }

        let initial_frame_size = self
            .initial_frame_size
            .ok_or(ParamError::Missing("INITIAL_FRAME_SIZE"))?;
        require_len("INITIAL_FRAME_SIZE", &initial_frame_size, n)?;
        for (i, &v) in initial_frame_size.iter().enumerate() {
            if !(v > 0.0) {
                return Err(ParamError::Invalid {
                    name: "INITIAL_FRAME_SIZE",
                    reason: format!("coordinate {i}: must be strictly positive, got {v}"),
                });
            }
        }

        let initial_mesh_size = self
            .initial_mesh_size
            .unwrap_or_else(|| initial_frame_size.clone());
        require_len("INITIAL_MESH_SIZE", &initial_mesh_size, n)?;

        let min_mesh_size = self.min_mesh_size.unwrap_or_else(|| vec![1e-9; n]);
        require_len("MIN_MESH_SIZE", &min_mesh_size, n)?;

        let min_frame_size = self.min_frame_size.unwrap_or_else(|| vec![None; n]);
        require_len("MIN_FRAME_SIZE", &min_frame_size, n)?;

        if self.rho <= 0.0 {
            return Err(ParamError::Invalid {
                name: "RHO",
                reason: format!("must be strictly positive, got {}", self.rho),
            });
        }

        let variable_groups = self.variable_groups.unwrap_or_else(|| vec![VariableGroup::all(n)]);
        let mut covered = vec![false; n];
        for group in &variable_groups {
            for &idx in &group.indices {
                if idx >= n {
                    return Err(ParamError::Invalid {
                        name: "VARIABLE_GROUP",
                        reason: format!("index {idx} out of range for dimension {n}"),
                    });
                }
                covered[idx] = true;
            }
        }
        if covered.iter().any(|&c| !c) {
            return Err(ParamError::Invalid {
                name: "VARIABLE_GROUP",
                reason: "every coordinate must belong to at least one group".to_string(),
            });
        }

        Ok(Arc::new(Parameters {
            dimension: n,
            bb_input_type,
            bb_output_type,
            lower_bound,
            upper_bound,
            granularity,
            initial_mesh_size,
            initial_frame_size,
            min_mesh_size,
            min_frame_size,
            direction_type: self.direction_type,
            max_bb_eval: self.max_bb_eval,
            max_eval: self.max_eval,
            max_block_eval: self.max_block_eval,
            bb_max_block_size: self.bb_max_block_size,
            sgtelib_model_eval_nb: self.sgtelib_model_eval_nb,
            opportunistic_eval: self.opportunistic_eval,
            eval_use_cache: self.eval_use_cache,
            clear_eval_queue: self.clear_eval_queue,
            rho: self.rho,
            h_max_0: self.h_max_0,
            variable_groups,
        }))
    }
}

fn require_len<T>(name: &'static str, v: &[T], expected: usize) -> Result<(), ParamError> {
    if v.len() != expected {
        Err(ParamError::WrongLength { name, expected, got: v.len() })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(n: usize) -> ParametersBuilder {
        Parameters::builder(n)
            .bb_output_type(vec![BbOutputType::Obj])
            .initial_frame_size(vec![1.0; n])
    }

    #[test]
    fn missing_output_type_is_rejected() {
        let result = Parameters::builder(2).initial_frame_size(vec![1.0, 1.0]).build();
        assert!(matches!(result, Err(ParamError::Missing("BB_OUTPUT_TYPE"))));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let result = Parameters::builder(0).build();
        assert!(matches!(result, Err(ParamError::Missing("DIMENSION"))));
    }

    #[test]
    fn integer_input_type_forces_unit_granularity() {
        let params = minimal(2)
            .bb_input_type(vec![BbInputType::Continuous, BbInputType::Integer])
            .build()
            .unwrap();
        assert_eq!(params.granularity[1], 1.0);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let result = minimal(1)
            .lower_bound(vec![Some(5.0)])
            .upper_bound(vec![Some(1.0)])
            .build();
        assert!(matches!(result, Err(ParamError::Invalid { name: "LOWER_BOUND/UPPER_BOUND", .. })));
    }

    #[test]
    fn variable_group_missing_a_coordinate_is_rejected() {
        let result = minimal(3)
            .variable_groups(vec![VariableGroup { indices: vec![0, 1] }])
            .build();
        assert!(matches!(result, Err(ParamError::Invalid { name: "VARIABLE_GROUP", .. })));
    }

    #[test]
    fn defaults_build_a_usable_snapshot() {
        let params = minimal(3).build().unwrap();
        assert_eq!(params.dimension, 3);
        assert_eq!(params.variable_groups.len(), 1);
        assert_eq!(params.min_mesh_size.len(), 3);
    }
}
