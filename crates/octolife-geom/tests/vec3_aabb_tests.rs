use octolife_geom::{Aabb, IVec3, Vec3};

fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn vec3_approx_eq(a: Vec3, b: Vec3, eps: f32) -> bool {
    approx_eq(a.x, b.x, eps) && approx_eq(a.y, b.y, eps) && approx_eq(a.z, b.z, eps)
}

#[test]
fn vec3_add_sub() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(-4.0, 5.0, -6.0);
    let c = a + b;
    assert!(vec3_approx_eq(c, Vec3::new(-3.0, 7.0, -3.0), 1e-6));

    let d = c - a;
    assert!(vec3_approx_eq(d, b, 1e-6));
}

#[test]
fn vec3_dot_length() {
    let v = Vec3::new(3.0, 4.0, 0.0);
    assert!(approx_eq(v.dot(v), 25.0, 1e-6));
    assert!(approx_eq(v.length(), 5.0, 1e-6));
}

#[test]
fn ivec3_arithmetic_and_volume() {
    let a = IVec3::new(1, -2, 3);
    let b = IVec3::new(4, 5, -6);
    assert_eq!(a + b, IVec3::new(5, 3, -3));
    assert_eq!(a - b, IVec3::new(-3, -7, 9));
    assert_eq!(-a, IVec3::new(-1, 2, -3));
    assert_eq!(a * 2, IVec3::new(2, -4, 6));
    assert_eq!(IVec3::new(2, 3, 4).volume(), 24);
    assert_eq!(IVec3::new(2, 0, 4).volume(), 0);
    assert_eq!(IVec3::new(2, -1, 4).volume(), 0);
}

#[test]
fn ivec3_componentwise_comparisons() {
    let lo = IVec3::new(0, 0, 0);
    let hi = IVec3::new(4, 4, 4);
    assert!(IVec3::new(0, 3, 1).all_ge(lo));
    assert!(IVec3::new(0, 3, 1).all_lt(hi));
    assert!(!IVec3::new(0, 4, 1).all_lt(hi));
    assert!(!IVec3::new(-1, 0, 0).all_ge(lo));
    assert_eq!(lo.max(IVec3::new(-1, 2, 0)), IVec3::new(0, 2, 0));
    assert_eq!(hi.min(IVec3::new(5, 2, 4)), IVec3::new(4, 2, 4));
}

#[test]
fn aabb_from_cube_and_center() {
    let b = Aabb::from_cube(IVec3::new(-8, 0, 8), 16);
    assert!(vec3_approx_eq(b.min, Vec3::new(-8.0, 0.0, 8.0), 1e-6));
    assert!(vec3_approx_eq(b.max, Vec3::new(8.0, 16.0, 24.0), 1e-6));
    assert!(vec3_approx_eq(b.center(), Vec3::new(0.0, 8.0, 16.0), 1e-6));
}

#[test]
fn aabb_distance_inside_is_zero() {
    let b = Aabb::from_cube(IVec3::ZERO, 4);
    assert!(approx_eq(b.distance_to(Vec3::new(1.0, 2.0, 3.0)), 0.0, 1e-6));
    assert!(b.contains(Vec3::new(4.0, 4.0, 4.0)));
}

#[test]
fn aabb_distance_outside() {
    let b = Aabb::from_cube(IVec3::ZERO, 4);
    // Straight out along +X.
    assert!(approx_eq(b.distance_to(Vec3::new(7.0, 2.0, 2.0)), 3.0, 1e-6));
    // Out past a corner.
    let d = b.distance_to(Vec3::new(7.0, 8.0, 2.0));
    assert!(approx_eq(d, 5.0, 1e-5));
    assert!(b.intersects_sphere(Vec3::new(7.0, 8.0, 2.0), 5.0));
    assert!(!b.intersects_sphere(Vec3::new(7.0, 8.0, 2.0), 4.9));
}
