//! Poll: turns unit directions from a [`crate::direction`] generator into
//! mesh-snapped trial points around a frame center (§4.4).

use crate::arrays::{Direction, Point};
use crate::double::Double;
use crate::mesh::MeshGeometry;
use tracing::trace;

/// A group of coordinate indices polled together; directions for other
/// groups are zero on this group's indices and vice versa (§4.4 step 2).
/// The default is one group containing every coordinate.
#[derive(Clone, Debug)]
pub struct VariableGroup {
    pub indices: Vec<usize>,
}

impl VariableGroup {
    pub fn all(n: usize) -> Self {
        VariableGroup { indices: (0..n).collect() }
    }
}

/// A trial point plus the direction and frame center it was generated from
/// (the `pointFrom` back-reference used by the evaluator as an ordering hint).
#[derive(Clone, Debug)]
pub struct TrialPoint {
    pub point: Point,
    pub direction: Direction,
    pub frame_center: Point,
}

/// Build trial points for one variable group's unit directions around
/// `center`, per §4.4 steps 2-5:
/// embed subspace directions into full space, scale/project onto the mesh,
/// form `x = c + d`, snap out-of-bound coordinates to the nearest bound and
/// re-project, then drop any point that collapsed back onto the center.
pub fn build_trial_points(
    mesh: &dyn MeshGeometry,
    center: &Point,
    group: &VariableGroup,
    unit_directions: &[Direction],
    lower_bounds: &[Option<f64>],
    upper_bounds: &[Option<f64>],
) -> Vec<TrialPoint> {
    let n = mesh.n();
    let mut out = Vec::with_capacity(unit_directions.len());

    for sub_dir in unit_directions {
        let full_dir_scaled = scale_and_embed(mesh, sub_dir, group, n);

        let mut x = center.plus_direction(&full_dir_scaled);
        x = snap_to_bounds(&x, lower_bounds, upper_bounds);
        x = mesh.project_on_mesh(&x, center);

        if points_equal(&x, center) {
            trace!("poll: trial point collapsed onto frame center; rejecting");
            continue;
        }

        out.push(TrialPoint { point: x, direction: full_dir_scaled, frame_center: center.clone() });
    }
    out
}

fn scale_and_embed(mesh: &dyn MeshGeometry, sub_dir: &Direction, group: &VariableGroup, n: usize) -> Direction {
    let scaled: Vec<Double> = (0..sub_dir.len())
        .map(|k| mesh.scale_and_project_on_mesh(group.indices[k], sub_dir[k]))
        .collect();
    let scaled_dir = Direction::new(scaled);
    Direction::embed(&scaled_dir, &group.indices, n)
}

fn snap_to_bounds(x: &Point, lower: &[Option<f64>], upper: &[Option<f64>]) -> Point {
    let values: Vec<Double> = (0..x.len())
        .map(|i| {
            let v = x[i];
            let Double::Finite(mut f) = v else { return v };
            if let Some(Some(lo)) = lower.get(i) {
                if f < *lo {
                    f = *lo;
                }
            }
            if let Some(Some(hi)) = upper.get(i) {
                if f > *hi {
                    f = *hi;
                }
            }
            Double::Finite(f)
        })
        .collect();
    Point::new(values)
}

fn points_equal(a: &Point, b: &Point) -> bool {
    a.len() == b.len() && (0..a.len()).all(|i| a[i] == b[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CsMesh;

    #[test]
    fn trial_points_land_on_the_mesh_and_skip_the_center() {
        let mesh = CsMesh::new(2, 4.0, 1e-9, &[0.0, 0.0]).unwrap();
        let center = Point::from_f64(&[0.0, 0.0]);
        let group = VariableGroup::all(2);
        let dirs = vec![
            Direction::new(vec![Double::Finite(1.0), Double::Finite(0.0)]),
            Direction::new(vec![Double::Finite(0.0), Double::Finite(0.0)]),
        ];
        let trials = build_trial_points(&mesh, &center, &group, &dirs, &[None, None], &[None, None]);
        // second direction is all-zero -> scaled is zero -> equals center -> rejected
        assert_eq!(trials.len(), 1);
        assert_ne!(trials[0].point, center);
    }

    #[test]
    fn bounds_clamp_before_reprojection() {
        let mesh = CsMesh::new(1, 2.0, 1e-9, &[0.0]).unwrap();
        let center = Point::from_f64(&[0.0]);
        let group = VariableGroup::all(1);
        let dirs = vec![Direction::new(vec![Double::Finite(100.0)])];
        let trials = build_trial_points(&mesh, &center, &group, &dirs, &[Some(1.0)], &[Some(5.0)]);
        assert_eq!(trials.len(), 1);
        if let Double::Finite(v) = trials[0].point[0] {
            assert!(v <= 5.0);
        }
    }
}
