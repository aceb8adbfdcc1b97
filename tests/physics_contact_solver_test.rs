//! Solver invariants observed through full world steps

use glam::Vec3;
use rigid3d::prelude::*;

fn sphere(mass: f32, position: Vec3, velocity: Vec3) -> Body {
    let mut b = Body::new(BodyOptions {
        mass,
        position,
        velocity,
        linear_damping: 0.0,
        angular_damping: 0.0,
        ..Default::default()
    });
    b.add_shape_centered(Shape::sphere(1.0).unwrap());
    b
}

#[test]
fn test_multipliers_stay_within_scaled_bounds() {
    let dt = 1.0 / 60.0;
    let mut world = World::new(WorldOptions {
        gravity: Vec3::new(0.0, 0.0, -9.82),
        ..Default::default()
    });
    world.add_body(sphere(1.0, Vec3::new(0.0, 0.0, 1.5), Vec3::new(0.0, 0.0, -5.0)));
    world.add_body({
        let mut b = Body::new(BodyOptions::default());
        b.add_shape_centered(Shape::plane());
        b
    });

    for _ in 0..120 {
        world.step(dt);
        for eq in world.contacts() {
            assert!(
                eq.multiplier >= eq.min_force * dt - 1e-4,
                "multiplier below bound: {}",
                eq.multiplier
            );
            assert!(
                eq.multiplier <= eq.max_force * dt + 1e-4,
                "multiplier above bound: {}",
                eq.multiplier
            );
        }
    }
}

#[test]
fn test_penetrating_contact_separates() {
    let mut world = World::default();
    // Two spheres overlapping by 0.5
    let a = world.add_body(sphere(1.0, Vec3::ZERO, Vec3::ZERO));
    let b = world.add_body(sphere(1.0, Vec3::new(1.5, 0.0, 0.0), Vec3::ZERO));

    for _ in 0..60 {
        world.step(1.0 / 60.0);
    }
    let pa = world.get_body_by_id(a).unwrap().position;
    let pb = world.get_body_by_id(b).unwrap().position;
    assert!(
        (pa - pb).length() >= 1.9,
        "spheres should have pushed apart, distance = {}",
        (pa - pb).length()
    );
}

#[test]
fn test_post_solve_normal_velocity_not_approaching() {
    let mut world = World::default();
    let a = world.add_body(sphere(1.0, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)));
    let b = world.add_body(sphere(1.0, Vec3::new(2.05, 0.0, 0.0), Vec3::new(-2.0, 0.0, 0.0)));

    for _ in 0..30 {
        world.step(1.0 / 60.0);
        if world.contacts().is_empty() {
            continue;
        }
        let va = world.get_body_by_id(a).unwrap().velocity;
        let vb = world.get_body_by_id(b).unwrap().velocity;
        // Normal points from a to b along +x
        let relative = (vb - va).x;
        assert!(relative > -1e-2, "pair still approaching after solve: {relative}");
    }
}

#[test]
fn test_restitution_bounces() {
    let mut world = World::new(WorldOptions {
        gravity: Vec3::new(0.0, 0.0, -9.82),
        ..Default::default()
    });
    world.default_contact_material.restitution = 0.8;

    let ball = world.add_body(sphere(1.0, Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO));
    world.add_body({
        let mut b = Body::new(BodyOptions::default());
        b.add_shape_centered(Shape::plane());
        b
    });

    let mut max_height_after_bounce = 0.0f32;
    let mut bounced = false;
    for _ in 0..600 {
        world.step(1.0 / 60.0);
        let z = world.get_body_by_id(ball).unwrap().position.z;
        let vz = world.get_body_by_id(ball).unwrap().velocity.z;
        if vz > 0.1 {
            bounced = true;
        }
        if bounced {
            max_height_after_bounce = max_height_after_bounce.max(z);
        }
    }
    assert!(bounced, "ball never bounced");
    assert!(
        max_height_after_bounce > 1.5,
        "restitution 0.8 should bounce well above the plane, got {max_height_after_bounce}"
    );
}

#[test]
fn test_filtered_pair_never_collides() {
    let mut world = World::default();
    let a = world.add_body({
        let mut b = sphere(1.0, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        b.collision_filter_group = 1;
        b.collision_filter_mask = 2;
        b
    });
    let b = world.add_body({
        let mut b = sphere(1.0, Vec3::new(3.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        b.collision_filter_group = 4;
        b.collision_filter_mask = 8;
        b
    });

    for _ in 0..240 {
        world.step(1.0 / 60.0);
        assert!(world.contacts().is_empty());
    }
    // They passed straight through each other
    assert!(world.get_body_by_id(a).unwrap().position.x > 2.0);
    assert!(world.get_body_by_id(b).unwrap().position.x < 1.0);
    assert!(!world
        .take_events()
        .iter()
        .any(|e| matches!(e, WorldEvent::Collide { .. })));
}

#[test]
fn test_kinematic_platform_carries_no_forces() {
    let mut world = World::new(WorldOptions {
        gravity: Vec3::new(0.0, 0.0, -9.82),
        ..Default::default()
    });
    let platform = world.add_body({
        let mut b = Body::new(BodyOptions {
            body_type: Some(BodyType::Kinematic),
            position: Vec3::new(0.0, 0.0, 0.0),
            velocity: Vec3::new(0.0, 0.0, 0.5),
            ..Default::default()
        });
        b.add_shape_centered(Shape::cuboid(Vec3::new(2.0, 2.0, 0.5)));
        b
    });

    for _ in 0..60 {
        world.step(1.0 / 60.0);
    }
    let body = world.get_body_by_id(platform).unwrap();
    // Moves by its velocity, ignores gravity
    assert!((body.position.z - 0.5).abs() < 1e-3);
    assert!((body.velocity.z - 0.5).abs() < 1e-6);
}
