use crate::config::PlanetConfig;
use crate::error::Result;
use crate::transform::{Transform, Transformable};
use nalgebra::{Point3, Vector3};
use std::sync::Arc;

/// Describes the basic properties of a planet.
#[derive(Clone, Debug)]
pub struct Description {
    pub name: String,
    pub radius: f64,
}

mod async_geometry_provider;
mod chunk_tree;
pub mod constants;
pub mod cube_sphere;
mod face;
mod forge;
mod generator;
mod geometry_provider;
mod mesh_store;
pub mod noise;
mod quad_tree;
pub mod terrain;

pub use self::async_geometry_provider::{BuildExecutor, Completion, SyncExecutor, ThreadpoolExecutor, WorkerId};
pub use self::chunk_tree::{Chunk, ChunkSink, ChunkState, ChunkTree};
pub use self::face::Face;
pub use self::forge::{ChunkForge, DeleteRequest, ForgeEvent};
pub use self::generator::Generator;
pub use self::geometry_provider::{BuildRequest, BuildResult, ChunkGeometry, ChunkLocation, GeometryProvider, RequestId};
pub use self::mesh_store::{Mesh, MeshBacking, MeshId, MeshStore};
pub use self::quad_tree::{Child, ChunkPath};
pub use self::terrain::{Crater, ElevationField, ElevationSample, PlanetKind, TerrainSettings};

/// The terrain of a single planet: six face trees sharing one forge and one mesh store.
pub struct PlanetTerrain<E: BuildExecutor, S: MeshStore> {
    description: Description,
    terrain: Arc<ElevationField>,
    trees: Vec<ChunkTree>,
    forge: ChunkForge<E>,
    store: S,
    transform: Transform,
}

impl PlanetTerrain<ThreadpoolExecutor, MeshBacking> {
    /// Builds chunks on a thread pool sized by the forge settings of the configuration
    pub fn threaded(config: &PlanetConfig) -> Result<Self> {
        let executor = ThreadpoolExecutor::new(Generator::new(), config.forge.worker_count())?;
        PlanetTerrain::new(config, executor, MeshBacking::new())
    }
}

impl PlanetTerrain<SyncExecutor<Generator>, MeshBacking> {
    /// Builds chunks on the calling thread
    pub fn synchronous(config: &PlanetConfig) -> Result<Self> {
        let executor = SyncExecutor::with_workers(Generator::new(), config.forge.worker_count());
        PlanetTerrain::new(config, executor, MeshBacking::new())
    }
}

impl<E: BuildExecutor, S: MeshStore> PlanetTerrain<E, S> {
    pub fn new(config: &PlanetConfig, executor: E, mut store: S) -> Result<Self> {
        let terrain = Arc::new(ElevationField::new(&config.kind, config.seed));
        let mut forge = ChunkForge::with_max_retries(executor, config.forge.max_retries);
        let lod = config.lod_settings();
        debug!(
            "planet '{}' with radius {} uses depths {} to {} and {} workers",
            config.name,
            config.radius,
            lod.min_depth,
            lod.max_depth,
            forge.worker_count()
        );

        let trees = {
            let mut sink = ChunkSink { forge: &mut forge, store: &mut store, terrain: &terrain };
            Face::values()
                .map(|face| ChunkTree::new(*face, config.radius, lod.clone(), &mut sink))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(PlanetTerrain {
            description: Description { name: config.name.clone(), radius: config.radius },
            terrain,
            trees,
            forge,
            store,
            transform: Transform::identity(),
        })
    }

    pub fn description(&self) -> &Description {
        &self.description
    }

    /// Radius of a sphere that contains all of the terrain
    pub fn bounding_radius(&self) -> f64 {
        self.description.radius + self.terrain.max_elevation()
    }

    /// Adapts the detail of the terrain to an observer at `observer` in world space, then applies
    /// at most one finished chunk.
    pub fn update_lod(&mut self, observer: &Point3<f64>) -> Result<()> {
        let local = self.transform.inverse_transform_point(observer);

        {
            let mut sink = ChunkSink { forge: &mut self.forge, store: &mut self.store, terrain: &self.terrain };
            for tree in self.trees.iter_mut() {
                tree.update(&local, &mut sink)?;
            }
        }

        self.forge.tick();
        self.forge.apply_next(&mut self.store);
        self.dispatch_events();
        Ok(())
    }

    fn dispatch_events(&mut self) {
        for event in self.forge.drain_events() {
            match event {
                ForgeEvent::Applied { location, mesh, .. } => self.trees[location.face.index()].on_applied(mesh),
                ForgeEvent::Failed { location, mesh, retained, .. } => {
                    let mut sink = ChunkSink { forge: &mut self.forge, store: &mut self.store, terrain: &self.terrain };
                    self.trees[location.face.index()].on_failed(mesh, retained, &mut sink);
                }
            }
        }
    }

    /// Distance from the planet center to the surface below `world_point`.
    pub fn surface_height_at(&self, world_point: &Point3<f64>) -> f64 {
        let local = self.transform.inverse_transform_point(world_point);
        let unit = local.coords.try_normalize(0.0).unwrap_or_else(Vector3::z);
        self.description.radius + self.terrain.evaluate(&unit, self.description.radius).elevation
    }

    /// Drops every chunk and starts over from the six face roots.
    pub fn reset(&mut self) -> Result<()> {
        info!("resetting the terrain of '{}'", self.description.name);
        let mut sink = ChunkSink { forge: &mut self.forge, store: &mut self.store, terrain: &self.terrain };
        for tree in self.trees.iter_mut() {
            tree.reset(&mut sink)?;
        }
        Ok(())
    }

    pub fn trees(&self) -> &[ChunkTree] {
        &self.trees
    }

    pub fn forge(&self) -> &ChunkForge<E> {
        &self.forge
    }

    pub fn meshes(&self) -> &S {
        &self.store
    }

    pub fn elevation_field(&self) -> &Arc<ElevationField> {
        &self.terrain
    }

    pub fn chunk_count(&self) -> usize {
        self.trees.iter().map(ChunkTree::chunk_count).sum()
    }

    /// Whether every chunk of every face has its geometry
    pub fn is_settled(&self) -> bool {
        self.trees.iter().all(ChunkTree::is_settled)
    }
}

impl<E: BuildExecutor, S: MeshStore> Transformable for PlanetTerrain<E, S> {
    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }
}
