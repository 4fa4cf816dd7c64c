use super::constants::MAX_MESH_COUNT;
use super::geometry_provider::{ChunkGeometry, ChunkLocation};
use crate::id_arena::{IdArena, IdGenerator, SimpleIdArena};

/// Handle of a render mesh. Owned by exactly one chunk, or by a deletion waiting in the forge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(usize);

impl MeshId {
    pub fn new(index: usize) -> MeshId {
        MeshId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// The side of the renderer that receives chunk geometry. Meshes are created empty when a chunk is
/// created, filled once its build is applied and disposed when its deletion is released.
pub trait MeshStore {
    /// Reserves a mesh for the chunk at `location`. Returns `None` when no more meshes are available.
    fn create(&mut self, location: &ChunkLocation) -> Option<MeshId>;

    /// Installs the geometry of a finished build into its mesh.
    fn upload(&mut self, mesh: MeshId, geometry: ChunkGeometry);

    /// Frees a mesh. The id may be handed out again by a later `create`.
    fn dispose(&mut self, mesh: MeshId);
}

pub struct Mesh {
    pub location: ChunkLocation,
    pub geometry: Option<ChunkGeometry>,
}

impl Mesh {
    /// Whether the mesh has geometry and would be drawn
    pub fn is_visible(&self) -> bool {
        self.geometry.is_some()
    }
}

/// Keeps the geometry of a fixed number of meshes in memory.
pub struct MeshBacking {
    id_generator: SimpleIdArena,
    meshes: Vec<Option<Mesh>>,
    upload_count: usize,
    dispose_count: usize,
}

impl MeshBacking {
    pub fn new() -> MeshBacking {
        MeshBacking::with_capacity(MAX_MESH_COUNT)
    }

    pub fn with_capacity(capacity: usize) -> MeshBacking {
        MeshBacking {
            id_generator: SimpleIdArena::with_capacity(capacity),
            meshes: Vec::new(),
            upload_count: 0,
            dispose_count: 0,
        }
    }

    pub fn get(&self, mesh: MeshId) -> Option<&Mesh> {
        self.meshes.get(mesh.0).and_then(Option::as_ref)
    }

    pub fn contains(&self, mesh: MeshId) -> bool {
        self.get(mesh).is_some()
    }

    /// All meshes that currently exist, with or without geometry
    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &Mesh)> {
        self.meshes
            .iter()
            .enumerate()
            .filter_map(|(index, mesh)| mesh.as_ref().map(|mesh| (MeshId(index), mesh)))
    }

    pub fn visible(&self) -> impl Iterator<Item = (MeshId, &Mesh)> {
        self.iter().filter(|(_, mesh)| mesh.is_visible())
    }

    pub fn len(&self) -> usize {
        self.id_generator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.id_generator.capacity()
    }

    /// Number of uploads since creation
    pub fn upload_count(&self) -> usize {
        self.upload_count
    }

    /// Number of disposals since creation
    pub fn dispose_count(&self) -> usize {
        self.dispose_count
    }
}

impl Default for MeshBacking {
    fn default() -> Self {
        MeshBacking::new()
    }
}

impl MeshStore for MeshBacking {
    fn create(&mut self, location: &ChunkLocation) -> Option<MeshId> {
        let index = self.id_generator.acquire()?;
        if self.meshes.len() <= index {
            self.meshes.resize_with(index + 1, || None);
        }
        self.meshes[index] = Some(Mesh { location: location.clone(), geometry: None });
        Some(MeshId(index))
    }

    fn upload(&mut self, mesh: MeshId, geometry: ChunkGeometry) {
        match self.meshes.get_mut(mesh.0).and_then(Option::as_mut) {
            Some(target) => {
                target.geometry = Some(geometry);
                self.upload_count += 1;
            }
            None => error!("upload to mesh {:?} which does not exist", mesh),
        }
    }

    fn dispose(&mut self, mesh: MeshId) {
        match self.meshes.get_mut(mesh.0).and_then(Option::take) {
            Some(_) => {
                self.id_generator.release(mesh.0);
                self.dispose_count += 1;
            }
            None => error!("dispose of mesh {:?} which does not exist", mesh),
        }
    }
}
