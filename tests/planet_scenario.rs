use nalgebra::{Point3, Vector3};
use planetforge::config::{ForgeSettings, LodSettings, PlanetConfig};
use planetforge::planet::constants::{CHUNK_SUBDIVISIONS, VERTICES_PER_CHUNK};
use planetforge::planet::{
    BuildRequest, ChunkLocation, ElevationField, Face, Generator, GeometryProvider, MeshBacking, PlanetKind,
    PlanetTerrain, SyncExecutor,
};
use planetforge::transform::{Rotation, Transformable};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn gas_giant(radius: f64, max_depth: usize) -> PlanetConfig {
    PlanetConfig {
        name: "Bubble".to_owned(),
        radius,
        kind: PlanetKind::Gas,
        seed: Vector3::zeros(),
        lod: Some(LodSettings { min_depth: 0, max_depth, render_distance_factor: 2.0 }),
        forge: ForgeSettings { workers: Some(4), max_retries: 1 },
    }
}

/// Runs frames until one full frame passes without any chunk being requested or applied
fn settle(planet: &mut PlanetTerrain<SyncExecutor<Generator>, MeshBacking>, observer: &Point3<f64>) {
    let mut quiet = 0;
    for _ in 0..2000 {
        planet.update_lod(observer).unwrap();
        quiet = if planet.is_settled() && planet.forge().is_idle() { quiet + 1 } else { 0 };
        if quiet == 2 {
            return;
        }
    }
    panic!("the planet did not settle");
}

#[test]
fn root_chunk_of_a_flat_planet() {
    let radius = 1_000_000.0;
    let request = BuildRequest::new(ChunkLocation::root(Face::Front), radius, Arc::new(ElevationField::flat()));
    let geometry = Generator::new().compute_geometry(&request).unwrap();

    assert_eq!(geometry.vertex_count(), VERTICES_PER_CHUNK);
    assert_eq!(geometry.triangle_count(), 2 * CHUNK_SUBDIVISIONS * CHUNK_SUBDIVISIONS);
    for index in 0..geometry.vertex_count() {
        let distance = geometry.planet_position(index).norm();
        assert!((distance - radius).abs() < 1.0, "vertex {} at {}", index, distance);
        assert!(geometry.normal(index).dot(&geometry.planet_position(index)) > 0.0);
    }
    // The center of the front face looks down the z axis
    assert!(geometry.origin.z > 0.0);
}

#[test]
fn observer_close_to_the_front_face_refines_it() {
    let radius = 1000.0;
    let mut planet = PlanetTerrain::synchronous(&gas_giant(radius, 3)).unwrap();
    settle(&mut planet, &Point3::new(0.0, 0.0, radius * 1.01));

    assert_eq!(planet.trees()[Face::Front.index()].max_depth(), 3);
    assert!(planet.trees()[Face::Back.index()].max_depth() < 3);

    // Every visible vertex sits on the sphere, and only leaves are on screen
    let mut visible = 0;
    for (_, mesh) in planet.meshes().visible() {
        let geometry = mesh.geometry.as_ref().unwrap();
        for index in 0..geometry.vertex_count() {
            assert!((geometry.planet_position(index).norm() - radius).abs() < 1e-2);
        }
        visible += 1;
    }
    assert_eq!(visible, planet.chunk_count());
    assert_eq!(planet.meshes().len(), planet.chunk_count());
}

#[test]
fn rotated_planet_refines_the_face_below_the_observer() {
    let radius = 1000.0;
    let mut planet = PlanetTerrain::synchronous(&gas_giant(radius, 3)).unwrap();
    // Half a turn around y brings the back face to the front
    planet.rotate_by(&Rotation::from_axis_angle(&Vector3::y_axis(), std::f64::consts::PI));
    settle(&mut planet, &Point3::new(0.0, 0.0, radius * 1.01));

    assert_eq!(planet.trees()[Face::Back.index()].max_depth(), 3);
    assert!(planet.trees()[Face::Front.index()].max_depth() < 3);
}

#[test]
fn surface_height_follows_the_terrain() {
    let radius = 6_371_000.0;
    let planet = PlanetTerrain::synchronous(&PlanetConfig {
        lod: Some(LodSettings { min_depth: 0, max_depth: 0, render_distance_factor: 2.0 }),
        ..PlanetConfig::telluric("Terra", radius)
    })
    .unwrap();

    assert!(planet.bounding_radius() > radius);
    for direction in &[Vector3::x(), Vector3::y(), Vector3::new(-1.0, 2.0, 0.5)] {
        let above = Point3::from(direction.normalize() * radius * 2.0);
        let height = planet.surface_height_at(&above);
        assert!(height >= radius - 1e-6 && height <= planet.bounding_radius(), "height {}", height);
        // The height does not depend on how far away the point is
        let closer = Point3::from(direction.normalize() * radius * 1.1);
        assert!((planet.surface_height_at(&closer) - height).abs() < 1e-6);
    }

    let gas = PlanetTerrain::synchronous(&gas_giant(radius, 0)).unwrap();
    assert_eq!(gas.surface_height_at(&Point3::new(0.0, radius * 3.0, 0.0)), radius);
    assert_eq!(gas.bounding_radius(), radius);
}

#[test]
fn translated_planet_uses_local_distances() {
    let radius = 1000.0;
    let mut planet = PlanetTerrain::synchronous(&gas_giant(radius, 3)).unwrap();
    let offset = Vector3::new(1e6, -2e6, 5e5);
    planet.translate_by(&offset);
    settle(&mut planet, &Point3::from(offset + Vector3::new(0.0, radius * 1.01, 0.0)));

    assert_eq!(planet.trees()[Face::Top.index()].max_depth(), 3);
    assert!(planet.trees()[Face::Bottom.index()].max_depth() < 3);
    assert_eq!(planet.world_position(), Point3::from(offset));
}

#[test]
fn threaded_planet_builds_in_the_background() {
    let radius = 1000.0;
    let config = PlanetConfig {
        forge: ForgeSettings { workers: Some(2), max_retries: 1 },
        ..gas_giant(radius, 1)
    };
    let mut planet = PlanetTerrain::threaded(&config).unwrap();
    assert_eq!(planet.forge().worker_count(), 2);

    let observer = Point3::new(0.0, 0.0, radius * 1.01);
    let deadline = Instant::now() + Duration::from_secs(60);
    let mut quiet = 0;
    while quiet < 2 {
        assert!(Instant::now() < deadline, "the planet did not settle in time");
        planet.update_lod(&observer).unwrap();
        quiet = if planet.is_settled() && planet.forge().is_idle() { quiet + 1 } else { 0 };
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(planet.trees()[Face::Front.index()].chunk_count(), 4);
    assert_eq!(planet.meshes().visible().count(), planet.chunk_count());
}

#[test]
fn reset_starts_over_from_the_roots() {
    let radius = 1000.0;
    let mut planet = PlanetTerrain::synchronous(&gas_giant(radius, 2)).unwrap();
    let observer = Point3::new(radius * 1.01, 0.0, 0.0);
    settle(&mut planet, &observer);
    assert!(planet.chunk_count() > 6);

    planet.reset().unwrap();
    assert_eq!(planet.chunk_count(), 6);
    assert!(!planet.is_settled());

    settle(&mut planet, &observer);
    assert_eq!(planet.trees()[Face::Right.index()].max_depth(), 2);
    assert_eq!(planet.meshes().len(), planet.chunk_count());
}
