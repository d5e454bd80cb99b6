use octolife_geom::{Aabb, IVec3, Vec3};
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = i32> {
    -1_000_000i32..=1_000_000
}

fn arb_ivec3() -> impl Strategy<Value = IVec3> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| IVec3::new(x, y, z))
}

fn arb_point() -> impl Strategy<Value = Vec3> {
    (-2_000.0f32..2_000.0, -2_000.0f32..2_000.0, -2_000.0f32..2_000.0)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn arb_cube() -> impl Strategy<Value = Aabb> {
    (-1_000i32..1_000, -1_000i32..1_000, -1_000i32..1_000, 0u32..10)
        .prop_map(|(x, y, z, level)| Aabb::from_cube(IVec3::new(x, y, z), 1i64 << level))
}

proptest! {
    // Subtraction undoes addition on integer coordinates
    #[test]
    fn ivec3_add_sub_roundtrip(a in arb_ivec3(), b in arb_ivec3()) {
        prop_assert_eq!((a + b) - b, a);
    }

    // Distance is never negative and is zero for the center
    #[test]
    fn cube_distance_non_negative(b in arb_cube(), p in arb_point()) {
        prop_assert!(b.distance_to(p) >= 0.0);
        prop_assert!(b.distance_to(b.center()) <= 1e-3);
    }

    // Distance to a box never exceeds distance to its center
    #[test]
    fn cube_distance_bounded_by_center(b in arb_cube(), p in arb_point()) {
        let to_center = (p - b.center()).length();
        prop_assert!(b.distance_to(p) <= to_center + 1e-2);
    }

    // A sphere around any contained point intersects
    #[test]
    fn contained_point_sphere_intersects(b in arb_cube(), r in 0.0f32..10.0) {
        prop_assert!(b.intersects_sphere(b.center(), r));
    }
}
