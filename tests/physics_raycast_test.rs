//! World raycast entry points across the three modes

use glam::Vec3;
use rigid3d::prelude::*;

fn world_with_sphere_at_origin() -> World {
    let mut world = World::default();
    let mut b = Body::new(BodyOptions::default());
    b.add_shape_centered(Shape::sphere(1.0).unwrap());
    world.add_body(b);
    world
}

#[test]
fn test_closest_hits_sphere_surface() {
    let mut world = world_with_sphere_at_origin();
    let mut result = RaycastResult::new();
    let hit = world.raycast_closest(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions::default(),
        &mut result,
    );
    assert!(hit);
    assert!(result.has_hit);
    assert!((result.hit_point_world - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-4);
    assert!((result.distance - 9.0).abs() < 1e-4);
    assert!((result.hit_normal_world - Vec3::Z).length() < 1e-4);
}

#[test]
fn test_any_mode_reports_some_hit() {
    let mut world = world_with_sphere_at_origin();
    let mut result = RaycastResult::new();
    let hit = world.raycast_any(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions::default(),
        &mut result,
    );
    assert!(hit);
    assert!(result.has_hit);
}

#[test]
fn test_all_mode_visits_every_hit() {
    let mut world = world_with_sphere_at_origin();
    let mut distances = Vec::new();
    let mut callback = |r: &mut RaycastResult| distances.push(r.distance);
    let hit = world.raycast_all(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions::default(),
        &mut callback,
    );
    assert!(hit);
    // Entry and exit points
    assert_eq!(distances.len(), 2);
    assert!((distances[0] - 9.0).abs() < 1e-4);
    assert!((distances[1] - 11.0).abs() < 1e-4);
}

#[test]
fn test_all_mode_callback_can_abort() {
    let mut world = world_with_sphere_at_origin();
    let mut count = 0;
    let mut callback = |r: &mut RaycastResult| {
        count += 1;
        r.abort();
    };
    world.raycast_all(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions::default(),
        &mut callback,
    );
    // The abort stopped the traversal after the first hit
    assert_eq!(count, 1);
}

#[test]
fn test_filter_group_excludes_body() {
    let mut world = World::default();
    let mut b = Body::new(BodyOptions {
        collision_filter_group: 2,
        collision_filter_mask: 2,
        ..Default::default()
    });
    b.add_shape_centered(Shape::sphere(1.0).unwrap());
    world.add_body(b);

    let mut result = RaycastResult::new();
    let hit = world.raycast_closest(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions {
            collision_filter_group: 1,
            collision_filter_mask: 1,
            ..Default::default()
        },
        &mut result,
    );
    assert!(!hit);
}

#[test]
fn test_closest_picks_nearer_of_two() {
    let mut world = World::default();
    for z in [0.0, -5.0] {
        let mut b = Body::new(BodyOptions {
            position: Vec3::new(0.0, 0.0, z),
            ..Default::default()
        });
        b.add_shape_centered(Shape::sphere(1.0).unwrap());
        world.add_body(b);
    }
    let mut result = RaycastResult::new();
    world.raycast_closest(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions::default(),
        &mut result,
    );
    assert!((result.hit_point_world.z - 1.0).abs() < 1e-4);
}

#[test]
fn test_no_response_shape_skipped_when_checked() {
    let mut world = World::default();
    let mut b = Body::new(BodyOptions::default());
    let mut shape = Shape::sphere(1.0).unwrap();
    shape.collision_response = false;
    b.add_shape_centered(shape);
    world.add_body(b);

    let mut result = RaycastResult::new();
    let hit = world.raycast_closest(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions::default(),
        &mut result,
    );
    assert!(!hit);

    // Opting out of the response check makes it visible again
    let hit = world.raycast_closest(
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, -10.0),
        &RayOptions {
            check_collision_response: false,
            ..Default::default()
        },
        &mut result,
    );
    assert!(hit);
}
