#[macro_use]
extern crate log;

use nalgebra::{Point3, Vector3};
use planetforge::config::PlanetConfig;
use planetforge::planet::{MeshBacking, PlanetTerrain, ThreadpoolExecutor};
use planetforge::timeline::Timeline;
use planetforge::transform::{Rotation, Transformable};
use std::env;
use std::thread;
use std::time::Duration;

const FRAMES: usize = 2000;
const REPORT_INTERVAL: usize = 100;

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> planetforge::Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => PlanetConfig::load(path)?,
        None => PlanetConfig::telluric("Terra", 6_371_000.0),
    };
    let mut planet = PlanetTerrain::threaded(&config)?;
    info!(
        "generating the terrain of '{}' with radius {}, highest peaks up to {:.0} m",
        planet.description().name,
        planet.description().radius,
        planet.elevation_field().max_elevation()
    );
    let spin = Rotation::from_euler_angles(0.0, 1e-4, 0.0);

    // Fly in from four radii out and slow down close to the ground
    let mut altitude = 3.0 * planet.description().radius;
    let direction = Vector3::new(0.3, 0.4, 1.0).normalize();

    let mut timeline = Timeline::new();
    for frame in 0..FRAMES {
        altitude = (altitude * 0.99).max(100.0);
        let observer = Point3::from(direction * (planet.surface_height_at(&Point3::from(direction)) + altitude));

        planet.rotate_by(&spin);
        planet.update_lod(&observer)?;
        timeline.next_frame();

        if frame % REPORT_INTERVAL == 0 {
            report(&planet, altitude, &timeline);
        }

        // Leave the workers some room, like a render loop would
        thread::sleep(Duration::from_millis(1));
    }

    report(&planet, altitude, &timeline);
    info!(
        "{} frames, average {:?}, longest {:?}",
        timeline.frame_count(),
        timeline.average_frame_duration(),
        timeline.longest_frame_duration()
    );
    Ok(())
}

fn report(planet: &PlanetTerrain<ThreadpoolExecutor, MeshBacking>, altitude: f64, timeline: &Timeline) {
    let deepest = planet.trees().iter().map(|tree| tree.max_depth()).max().unwrap_or(0);
    let triangles: usize = planet.meshes().visible().filter_map(|(_, mesh)| mesh.geometry.as_ref()).map(|g| g.triangle_count()).sum();
    info!(
        "altitude {:.0} m: {} chunks up to depth {}, {} meshes visible ({} triangles), {} pending, {} to apply, {} to delete, frame {:?}",
        altitude,
        planet.chunk_count(),
        deepest,
        planet.meshes().visible().count(),
        triangles,
        planet.forge().pending_count(),
        planet.forge().completed_count(),
        planet.forge().trash_count(),
        timeline.previous_frame_duration()
    );
}
