//! Contact material resolution between shape pairs

use glam::Vec3;
use rigid3d::prelude::*;

fn dropped_ball(material: Material) -> Body {
    let mut b = Body::new(BodyOptions {
        mass: 1.0,
        position: Vec3::new(0.0, 0.0, 2.0),
        ..Default::default()
    });
    b.add_shape_centered(Shape::sphere(1.0).unwrap().with_material(material));
    b
}

fn ground(material: Material) -> Body {
    let mut b = Body::new(BodyOptions::default());
    b.add_shape_centered(Shape::plane().with_material(material));
    b
}

#[test]
fn test_registered_pair_is_found() {
    let mut world = World::default();
    let ice = Material::new("ice").with_friction(0.02);
    let rubber = Material::new("rubber").with_friction(0.9);
    let cm = ContactMaterial::new(&ice, &rubber)
        .with_friction(0.1)
        .with_restitution(0.05);
    world.add_material(ice.clone());
    world.add_material(rubber.clone());
    world.add_contact_material(cm);

    let found = world.get_contact_material(ice.id, rubber.id).unwrap();
    assert_eq!(found.friction, 0.1);
    // Lookup is unordered
    assert!(world.get_contact_material(rubber.id, ice.id).is_some());
    assert!(world.get_contact_material(ice.id, ice.id).is_none());
}

#[test]
fn test_dead_pair_restitution_kills_bounce() {
    let mut world = World::new(WorldOptions {
        gravity: Vec3::new(0.0, 0.0, -9.82),
        ..Default::default()
    });
    let ball_mat = Material::new("ball");
    let ground_mat = Material::new("ground");
    world.add_contact_material(
        ContactMaterial::new(&ball_mat, &ground_mat).with_restitution(0.0),
    );
    let ball = world.add_body(dropped_ball(ball_mat));
    world.add_body(ground(ground_mat));

    let mut max_upward = 0.0f32;
    let mut touched = false;
    for _ in 0..300 {
        world.step(1.0 / 60.0);
        if !world.contacts().is_empty() {
            touched = true;
        }
        if touched {
            max_upward = max_upward.max(world.get_body_by_id(ball).unwrap().velocity.z);
        }
    }
    assert!(touched);
    assert!(
        max_upward < 0.3,
        "restitution 0 should not bounce, got upward speed {max_upward}"
    );
}

#[test]
fn test_default_contact_material_applies_without_registration() {
    let mut world = World::new(WorldOptions {
        gravity: Vec3::new(0.0, 0.0, -9.82),
        ..Default::default()
    });
    world.default_contact_material.restitution = 0.9;
    let ball = world.add_body(dropped_ball(Material::new("loose")));
    world.add_body(ground(Material::new("stray")));

    let mut bounced = false;
    for _ in 0..300 {
        world.step(1.0 / 60.0);
        if world.get_body_by_id(ball).unwrap().velocity.z > 1.0 {
            bounced = true;
            break;
        }
    }
    assert!(bounced, "default restitution should apply to unregistered pairs");
}
