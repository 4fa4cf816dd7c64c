mod common;

use common::FlakyProvider;
use nalgebra::Point3;
use planetforge::config::{ForgeSettings, LodSettings, PlanetConfig};
use planetforge::planet::{ChunkLocation, ChunkPath, ChunkState, Face, MeshBacking, PlanetTerrain, SyncExecutor};

type FlakyPlanet = PlanetTerrain<SyncExecutor<FlakyProvider>, MeshBacking>;

fn config(min_depth: usize, max_depth: usize) -> PlanetConfig {
    PlanetConfig {
        lod: Some(LodSettings { min_depth, max_depth, render_distance_factor: 2.0 }),
        forge: ForgeSettings { workers: Some(2), max_retries: 1 },
        ..PlanetConfig::telluric("Flaky", 1000.0)
    }
}

fn settle(planet: &mut FlakyPlanet, observer: &Point3<f64>) {
    let mut quiet = 0;
    for _ in 0..500 {
        planet.update_lod(observer).unwrap();
        quiet = if planet.is_settled() && planet.forge().is_idle() { quiet + 1 } else { 0 };
        if quiet == 2 {
            return;
        }
    }
    panic!("the planet did not settle");
}

fn far() -> Point3<f64> {
    Point3::new(0.0, 0.0, 1e9)
}

/// Depths of the visible meshes of a face
fn visible_depths(planet: &FlakyPlanet, face: Face) -> Vec<usize> {
    planet.meshes().visible().filter(|(_, mesh)| mesh.location.face == face).map(|(_, mesh)| mesh.location.depth()).collect()
}

#[test]
fn failed_builds_are_retried_once() {
    let provider = FlakyProvider::new(None, Some(Face::Top));
    let executor = SyncExecutor::with_workers(provider, 2);
    let mut planet = PlanetTerrain::new(&config(0, 0), executor, MeshBacking::new()).unwrap();
    settle(&mut planet, &far());

    for tree in planet.trees() {
        tree.for_each_chunk(|_, chunk| assert_eq!(chunk.state, ChunkState::Live));
    }
    assert_eq!(planet.meshes().visible().count(), 6);
    assert_eq!(planet.meshes().upload_count(), 6);
}

#[test]
fn broken_chunks_keep_the_coarser_mesh() {
    let provider = FlakyProvider::new(Some((Face::Back, 1)), None);
    let executor = SyncExecutor::with_workers(provider, 2);
    let mut planet = PlanetTerrain::new(&config(1, 1), executor, MeshBacking::new()).unwrap();
    settle(&mut planet, &far());

    // The root of the face comes back in place of its children and is not split again
    let back = &planet.trees()[Face::Back.index()];
    assert_eq!(back.chunk_count(), 1);
    back.for_each_chunk(|location, chunk| {
        assert_eq!(location.depth(), 0);
        assert!(chunk.is_live());
        assert!(chunk.split_failed);
        assert!(chunk.fallback.is_empty());
        assert!(planet.meshes().get(chunk.mesh).unwrap().is_visible());
    });
    assert_eq!(visible_depths(&planet, Face::Back), vec![0]);

    for face in Face::values().filter(|face| **face != Face::Back) {
        let tree = &planet.trees()[face.index()];
        assert_eq!(tree.chunk_count(), 4);
        tree.for_each_chunk(|_, chunk| assert!(chunk.is_live()));
    }
    assert_eq!(planet.meshes().visible().count(), 5 * 4 + 1);
    assert_eq!(planet.meshes().len(), planet.chunk_count());
}

#[test]
fn one_broken_child_brings_its_parent_back() {
    let broken = ChunkLocation { face: Face::Front, path: ChunkPath::from_indices(&[0]).unwrap() };
    let executor = SyncExecutor::with_workers(FlakyProvider::breaking(broken), 2);
    let mut planet = PlanetTerrain::new(&config(0, 1), executor, MeshBacking::new()).unwrap();
    let observer = Point3::new(0.0, 0.0, 1010.0);
    settle(&mut planet, &observer);

    let front = &planet.trees()[Face::Front.index()];
    assert_eq!(front.chunk_count(), 1);
    front.for_each_chunk(|_, chunk| {
        assert!(chunk.is_live());
        assert!(chunk.split_failed);
    });
    // Only one level of detail covers the face, the three healthy siblings are gone
    assert_eq!(visible_depths(&planet, Face::Front), vec![0]);
    assert_eq!(planet.meshes().visible().count(), 5 * 4 + 1);

    // Staying close does not try the split again
    let uploads = planet.meshes().upload_count();
    for _ in 0..10 {
        planet.update_lod(&observer).unwrap();
    }
    assert_eq!(planet.meshes().upload_count(), uploads);
    assert!(planet.forge().is_idle());
}

#[test]
fn failures_stay_on_their_own_face() {
    let provider = FlakyProvider::new(Some((Face::Back, 0)), None);
    let executor = SyncExecutor::with_workers(provider, 1);
    let mut planet = PlanetTerrain::new(&config(0, 1), executor, MeshBacking::new()).unwrap();
    settle(&mut planet, &Point3::new(0.0, 0.0, 1010.0));

    let left = &planet.trees()[Face::Left.index()];
    assert_eq!(left.chunk_count(), 4);
    left.for_each_chunk(|_, chunk| assert!(chunk.is_live()));
    assert_eq!(visible_depths(&planet, Face::Left), vec![1; 4]);

    for tree in planet.trees() {
        tree.for_each_chunk(|_, chunk| {
            for &mesh in chunk.fallback.iter() {
                assert_eq!(planet.meshes().get(mesh).unwrap().location.face, tree.face());
            }
        });
    }

    let back = &planet.trees()[Face::Back.index()];
    assert_eq!(back.chunk_count(), 1);
    back.for_each_chunk(|_, chunk| {
        assert_eq!(chunk.state, ChunkState::Failed);
        assert!(chunk.fallback.is_empty());
    });
    assert!(visible_depths(&planet, Face::Back).is_empty());
    assert_eq!(planet.meshes().visible().count(), 5 * 4);
}

#[test]
fn reset_retires_restored_parents() {
    let provider = FlakyProvider::new(Some((Face::Back, 1)), None);
    let executor = SyncExecutor::with_workers(provider, 2);
    let mut planet = PlanetTerrain::new(&config(1, 1), executor, MeshBacking::new()).unwrap();
    settle(&mut planet, &far());
    let before = planet.meshes().dispose_count();

    planet.reset().unwrap();
    assert_eq!(planet.chunk_count(), 6);
    planet.trees()[Face::Back.index()].for_each_chunk(|_, chunk| assert!(!chunk.split_failed));

    // Run until the six fresh roots are applied, before they subdivide again
    for _ in 0..20 {
        planet.update_lod(&far()).unwrap();
    }
    // The 20 leaves of the healthy faces and the restored root of the back face are gone
    assert!(planet.meshes().dispose_count() >= before + 21);
}
