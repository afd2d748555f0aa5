//! Spatial indices over primitive aggregates.
//!
//! Four interchangeable implementations: the bounding interval hierarchy,
//! a SAH kd-tree, a uniform grid, and a linear-scan fallback. All of them
//! build over a [`PrimitiveList`] and answer nearest-hit queries by
//! narrowing the ray's valid interval.

mod bih;
mod grid;
mod kdtree;
mod null;

pub use bih::BoundingIntervalHierarchy;
pub use grid::UniformGrid;
pub use kdtree::KdTree;
pub use null::NullAccelerator;

use std::sync::Arc;

use candela_math::Ray;

use crate::isect::IntersectionState;
use crate::primitive::PrimitiveList;

/// A spatial index supporting nearest-hit ray queries.
///
/// `intersect` narrows the ray's valid interval and records the nearest
/// hit into the state, or leaves both untouched when nothing is hit within
/// `[t_min, t_max]`.
pub trait AccelerationStructure: Send + Sync {
    fn build(&mut self, primitives: Arc<dyn PrimitiveList>);
    fn intersect(&self, r: &mut Ray, state: &mut IntersectionState);
}

/// Which index to build over a primitive aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelType {
    #[default]
    Auto,
    Bih,
    KdTree,
    UniformGrid,
    Null,
}

impl AccelType {
    /// Parse an accelerator name. Unrecognized names fall back to `Auto`
    /// with a warning, so a typo degrades instead of failing the render.
    pub fn parse(name: &str) -> AccelType {
        match name {
            "auto" => AccelType::Auto,
            "bih" => AccelType::Bih,
            "kdtree" => AccelType::KdTree,
            "uniformgrid" => AccelType::UniformGrid,
            "null" => AccelType::Null,
            other => {
                log::warn!("unrecognized intersection accelerator \"{other}\" - using auto");
                AccelType::Auto
            }
        }
    }

    /// Resolve `Auto` by primitive count. Leaf primitive aggregates and
    /// instance lists use different thresholds; the cutoffs are empirical.
    fn resolve(self, n: usize, leaf_primitives: bool) -> AccelType {
        if self != AccelType::Auto {
            return self;
        }
        if leaf_primitives {
            if n > 20_000_000 {
                AccelType::UniformGrid
            } else if n > 2_000_000 {
                AccelType::Bih
            } else if n > 2 {
                AccelType::KdTree
            } else {
                AccelType::Null
            }
        } else if n > 2 {
            AccelType::Bih
        } else {
            AccelType::Null
        }
    }

    /// Create an (unbuilt) accelerator for an aggregate of `n` primitives.
    /// `leaf_primitives` distinguishes geometry-local aggregates from the
    /// top-level instance list.
    pub fn create(self, n: usize, leaf_primitives: bool) -> Box<dyn AccelerationStructure> {
        match self.resolve(n, leaf_primitives) {
            AccelType::Bih => Box::new(BoundingIntervalHierarchy::new()),
            AccelType::KdTree => Box::new(KdTree::new()),
            AccelType::UniformGrid => Box::new(UniformGrid::new()),
            _ => Box::new(NullAccelerator::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::ShadingState;
    use candela_math::{Aabb, Mat4, Vec3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// A soup of equal-radius spheres, enough of a primitive aggregate to
    /// exercise every accelerator.
    struct SphereList {
        centers: Vec<Vec3>,
        radius: f32,
    }

    impl PrimitiveList for SphereList {
        fn world_bounds(&self, _o2w: Option<&Mat4>) -> Aabb {
            let mut bounds = Aabb::empty();
            for &c in &self.centers {
                bounds.include(&Aabb::from_points(
                    c - Vec3::splat(self.radius),
                    c + Vec3::splat(self.radius),
                ));
            }
            bounds
        }

        fn num_primitives(&self) -> usize {
            self.centers.len()
        }

        fn primitive_bound(&self, prim_id: usize, side: usize) -> f32 {
            let c = self.centers[prim_id][side >> 1];
            if side & 1 == 0 {
                c - self.radius
            } else {
                c + self.radius
            }
        }

        fn intersect_primitive(&self, r: &mut Ray, prim_id: usize, state: &mut IntersectionState) {
            let o = r.origin - self.centers[prim_id];
            let a = r.dir.length_squared();
            let b = 2.0 * r.dir.dot(o);
            let c = o.length_squared() - self.radius * self.radius;
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return;
            }
            let root = disc.sqrt();
            let t_near = (-b - root) / (2.0 * a);
            let t_far = (-b + root) / (2.0 * a);
            for t in [t_near, t_far] {
                if r.is_inside(t) {
                    r.set_max(t);
                    state.set_intersection(prim_id);
                    return;
                }
            }
        }

        fn prepare_shading_state(&self, _state: &mut ShadingState<'_, '_>) {}
    }

    fn all_accels() -> Vec<(&'static str, Box<dyn AccelerationStructure>)> {
        vec![
            ("null", Box::new(NullAccelerator::new())),
            ("bih", Box::new(BoundingIntervalHierarchy::new())),
            ("kdtree", Box::new(KdTree::new())),
            ("uniformgrid", Box::new(UniformGrid::new())),
        ]
    }

    fn nearest_hit(accel: &dyn AccelerationStructure, origin: Vec3, dir: Vec3) -> Option<f32> {
        let mut r = Ray::new(origin, dir);
        let mut state = IntersectionState::new();
        accel.intersect(&mut r, &mut state);
        r.max().is_finite().then_some(r.max())
    }

    #[test]
    fn test_unit_sphere_entry_hit_on_every_accel() {
        let list: Arc<dyn PrimitiveList> = Arc::new(SphereList {
            centers: vec![Vec3::ZERO],
            radius: 1.0,
        });
        for (name, mut accel) in all_accels() {
            accel.build(list.clone());
            let t = nearest_hit(&*accel, Vec3::new(0.0, 0.0, -5.0), Vec3::Z)
                .unwrap_or_else(|| panic!("{name}: expected a hit"));
            assert!((t - 4.0).abs() < 1e-4, "{name}: hit at t = {t}");
        }
    }

    #[test]
    fn test_empty_list_never_hits() {
        let list: Arc<dyn PrimitiveList> = Arc::new(SphereList {
            centers: vec![],
            radius: 1.0,
        });
        let mut rng = StdRng::seed_from_u64(7);
        for (name, mut accel) in all_accels() {
            accel.build(list.clone());
            for _ in 0..50 {
                let origin = Vec3::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0), -20.0);
                let dir = Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(0.1..1.0),
                );
                assert!(
                    nearest_hit(&*accel, origin, dir).is_none(),
                    "{name}: phantom hit in an empty aggregate"
                );
            }
        }
    }

    #[test]
    fn test_nearest_hit_matches_across_accels() {
        let mut rng = StdRng::seed_from_u64(42);
        let centers = (0..120)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                )
            })
            .collect::<Vec<_>>();
        let list: Arc<dyn PrimitiveList> = Arc::new(SphereList {
            centers,
            radius: 0.6,
        });
        let mut accels = all_accels();
        for (_, accel) in accels.iter_mut() {
            accel.build(list.clone());
        }
        for _ in 0..300 {
            let origin = Vec3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if dir.length_squared() < 1e-3 {
                continue;
            }
            let reference = nearest_hit(&*accels[0].1, origin, dir);
            for (name, accel) in &accels[1..] {
                let t = nearest_hit(&**accel, origin, dir);
                match (reference, t) {
                    (None, None) => {}
                    (Some(a), Some(b)) => {
                        assert!((a - b).abs() < 1e-3, "{name}: t {b} vs reference {a}")
                    }
                    _ => panic!("{name}: hit disagreement ({reference:?} vs {t:?})"),
                }
            }
        }
    }

    #[test]
    fn test_build_completeness() {
        let mut rng = StdRng::seed_from_u64(1234);
        let n = 200;
        let centers = (0..n)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                )
            })
            .collect::<Vec<_>>();
        let list: Arc<dyn PrimitiveList> = Arc::new(SphereList {
            centers,
            radius: 0.5,
        });

        let mut bih = BoundingIntervalHierarchy::new();
        bih.build(list.clone());
        let mut reachable = bih.collect_primitives();
        reachable.sort_unstable();
        // the interval hierarchy partitions: every primitive exactly once
        assert_eq!(reachable, (0..n).collect::<Vec<_>>());

        let mut kd = KdTree::new();
        kd.build(list.clone());
        let mut reachable = kd.collect_primitives();
        reachable.sort_unstable();
        reachable.dedup();
        // the kd-tree may reference a primitive from several leaves, but
        // none may be dropped
        assert_eq!(reachable, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_narrowed_interval_is_respected() {
        let list: Arc<dyn PrimitiveList> = Arc::new(SphereList {
            centers: vec![Vec3::ZERO],
            radius: 1.0,
        });
        for (name, mut accel) in all_accels() {
            accel.build(list.clone());
            let mut r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
            r.set_max(3.5);
            let mut state = IntersectionState::new();
            accel.intersect(&mut r, &mut state);
            assert_eq!(r.max(), 3.5, "{name}: hit outside the valid interval");
        }
    }

    #[test]
    fn test_clustered_scene_forces_empty_space_clipping() {
        // two tight clusters far apart: the interval hierarchy has to cut
        // away the empty middle through its clip nodes
        let mut rng = StdRng::seed_from_u64(99);
        let mut centers = Vec::new();
        for _ in 0..60 {
            centers.push(
                Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ) - Vec3::splat(100.0),
            );
        }
        for _ in 0..60 {
            centers.push(
                Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ) + Vec3::splat(100.0),
            );
        }
        let list: Arc<dyn PrimitiveList> = Arc::new(SphereList {
            centers,
            radius: 0.3,
        });
        let mut null = NullAccelerator::new();
        null.build(list.clone());
        let mut bih = BoundingIntervalHierarchy::new();
        bih.build(list.clone());
        let mut rng = StdRng::seed_from_u64(100);
        for _ in 0..200 {
            let target = if rng.gen_bool(0.5) {
                Vec3::splat(-100.0)
            } else {
                Vec3::splat(100.0)
            };
            let origin = Vec3::new(
                rng.gen_range(-120.0..120.0),
                rng.gen_range(-120.0..120.0),
                rng.gen_range(-120.0..120.0),
            );
            let dir = (target + Vec3::new(rng.gen_range(-2.0..2.0), 0.0, 0.0) - origin)
                .normalize();
            let a = nearest_hit(&null, origin, dir);
            let b = nearest_hit(&bih, origin, dir);
            match (a, b) {
                (None, None) => {}
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-3, "t {b} vs reference {a}"),
                _ => panic!("hit disagreement ({a:?} vs {b:?})"),
            }
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(AccelType::parse("bih"), AccelType::Bih);
        assert_eq!(AccelType::parse("kdtree"), AccelType::KdTree);
        assert_eq!(AccelType::parse("uniformgrid"), AccelType::UniformGrid);
        assert_eq!(AccelType::parse("null"), AccelType::Null);
        assert_eq!(AccelType::parse("octree"), AccelType::Auto);
    }

    #[test]
    fn test_auto_thresholds_for_primitives() {
        assert_eq!(AccelType::Auto.resolve(1, true), AccelType::Null);
        assert_eq!(AccelType::Auto.resolve(2, true), AccelType::Null);
        assert_eq!(AccelType::Auto.resolve(3, true), AccelType::KdTree);
        assert_eq!(AccelType::Auto.resolve(2_000_001, true), AccelType::Bih);
        assert_eq!(AccelType::Auto.resolve(20_000_001, true), AccelType::UniformGrid);
    }

    #[test]
    fn test_auto_thresholds_for_instances() {
        assert_eq!(AccelType::Auto.resolve(0, false), AccelType::Null);
        assert_eq!(AccelType::Auto.resolve(3, false), AccelType::Bih);
        assert_eq!(AccelType::Auto.resolve(5_000_000, false), AccelType::Bih);
    }

    #[test]
    fn test_explicit_choice_wins() {
        assert_eq!(AccelType::KdTree.resolve(50_000_000, true), AccelType::KdTree);
    }
}
