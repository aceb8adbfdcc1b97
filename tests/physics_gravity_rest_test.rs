//! A sphere dropped onto a static plane must come to rest on it

use glam::Vec3;
use rigid3d::prelude::*;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn test_sphere_rests_on_plane() {
    init_logging();

    let mut world = World::new(WorldOptions {
        gravity: Vec3::new(0.0, 0.0, -9.82),
        ..Default::default()
    });

    let sphere = world.add_body({
        let mut b = Body::new(BodyOptions {
            mass: 1.0,
            position: Vec3::new(0.0, 0.0, 5.0),
            ..Default::default()
        });
        b.add_shape_centered(Shape::sphere(1.0).unwrap());
        b
    });
    world.add_body({
        let mut b = Body::new(BodyOptions::default());
        b.add_shape_centered(Shape::plane());
        b
    });

    let dt = 1.0 / 60.0;
    for _ in 0..600 {
        world.step(dt);
    }

    let body = world.get_body_by_id(sphere).unwrap();
    assert!(
        (body.position.z - 1.0).abs() < 0.05,
        "sphere should rest at z = 1, got {}",
        body.position.z
    );
    assert!(
        body.velocity.length() < 1e-2,
        "sphere should be at rest, |v| = {}",
        body.velocity.length()
    );
}

#[test]
fn test_static_bodies_never_move() {
    init_logging();

    let mut world = World::new(WorldOptions {
        gravity: Vec3::new(0.0, 0.0, -9.82),
        ..Default::default()
    });
    let plane = world.add_body({
        let mut b = Body::new(BodyOptions {
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Default::default()
        });
        b.add_shape_centered(Shape::cuboid(Vec3::ONE));
        b
    });
    // Hammer the static body with forces; they must be ignored
    for _ in 0..120 {
        world
            .get_body_by_id_mut(plane)
            .unwrap()
            .apply_force(Vec3::new(1000.0, 0.0, 0.0), Vec3::ZERO);
        world.step(1.0 / 60.0);
    }
    let body = world.get_body_by_id(plane).unwrap();
    assert_eq!(body.position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(body.quaternion, Quat::IDENTITY);
}

#[test]
fn test_determinism_across_runs() {
    init_logging();

    let run = || {
        let mut world = World::new(WorldOptions {
            gravity: Vec3::new(0.0, 0.0, -9.82),
            ..Default::default()
        });
        let ids: Vec<u32> = (0..4)
            .map(|i| {
                let mut b = Body::new(BodyOptions {
                    mass: 1.0,
                    position: Vec3::new(i as f32 * 0.8, 0.0, 3.0 + i as f32),
                    ..Default::default()
                });
                b.add_shape_centered(Shape::sphere(0.5).unwrap());
                world.add_body(b)
            })
            .collect();
        world.add_body({
            let mut b = Body::new(BodyOptions::default());
            b.add_shape_centered(Shape::plane());
            b
        });
        for _ in 0..300 {
            world.step(1.0 / 60.0);
        }
        ids.into_iter()
            .map(|id| world.get_body_by_id(id).unwrap().position)
            .collect::<Vec<_>>()
    };

    let first = run();
    let second = run();
    // Bit-identical, not merely close
    assert_eq!(first, second);
}
