use super::async_geometry_provider::BuildExecutor;
use super::cube_sphere;
use super::forge::{ChunkForge, DeleteRequest};
use super::geometry_provider::{BuildRequest, ChunkLocation};
use super::mesh_store::{MeshId, MeshStore};
use super::quad_tree::{Child, NodeId, QuadTree};
use super::terrain::ElevationField;
use super::Face;
use crate::config::LodSettings;
use crate::error::{Error, Result};
use crate::id_arena::Arena;
use crate::transform::Rotation;
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// The build has been requested but its geometry has not been applied yet
    Pending,
    Live,
    /// The build failed for good, the chunk keeps showing the meshes it was meant to replace
    Failed,
}

/// A leaf of a face tree and the mesh it owns.
#[derive(Debug)]
pub struct Chunk {
    pub mesh: MeshId,
    pub state: ChunkState,
    pub fallback: Vec<MeshId>,
    /// One of its children could not be built, the chunk stays a leaf until it is replaced
    pub split_failed: bool,
}

impl Chunk {
    fn new(mesh: MeshId) -> Chunk {
        Chunk { mesh, state: ChunkState::Pending, fallback: Vec::new(), split_failed: false }
    }

    pub fn is_live(&self) -> bool {
        self.state == ChunkState::Live
    }
}

/// The leaf a branch replaced, kept until every child is live.
struct Split {
    chunk: Chunk,
    awaiting: Vec<MeshId>,
}

struct Node {
    location: ChunkLocation,
    /// Center on the undisplaced sphere, in planet space before the planet rotation
    center: Vector3<f64>,
    parent: Option<NodeId>,
    content: QuadTree<Chunk>,
    split: Option<Split>,
}

/// Everything a tree needs to request and retire geometry during an update.
pub struct ChunkSink<'a, E: BuildExecutor, S: MeshStore> {
    pub forge: &'a mut ChunkForge<E>,
    pub store: &'a mut S,
    pub terrain: &'a Arc<ElevationField>,
}

/// Enqueues the deletion of every mesh a chunk shows.
fn release<E: BuildExecutor, S: MeshStore>(chunk: &Chunk, sink: &mut ChunkSink<E, S>) {
    sink.forge.enqueue_delete(DeleteRequest::new(chunk.mesh));
    for &mesh in chunk.fallback.iter() {
        sink.forge.enqueue_delete(DeleteRequest::new(mesh));
    }
}

/// The quad tree of a single face of the cube that is the planet. Leaves are chunks, the tree
/// subdivides close to the observer and collapses away from it.
pub struct ChunkTree {
    face: Face,
    planet_radius: f64,
    lod: LodSettings,
    root: NodeId,
    nodes: Arena<Node>,
    chunks_by_mesh: HashMap<MeshId, NodeId>,
}

impl ChunkTree {
    /// Creates the tree with a single root chunk and requests its geometry.
    pub fn new<E: BuildExecutor, S: MeshStore>(
        face: Face,
        planet_radius: f64,
        lod: LodSettings,
        sink: &mut ChunkSink<E, S>,
    ) -> Result<ChunkTree> {
        let location = ChunkLocation::root(face);
        let mesh = sink.store.create(&location).ok_or(Error::MeshesExhausted)?;

        let mut tree = ChunkTree {
            face,
            planet_radius,
            lod,
            root: 0,
            nodes: Arena::new(),
            chunks_by_mesh: HashMap::new(),
        };
        sink.forge.begin_group();
        let request = tree.request(location, sink);
        tree.root = tree.insert_leaf(request, mesh, None, sink)?;
        Ok(tree)
    }

    pub fn face(&self) -> Face {
        self.face
    }

    pub fn lod(&self) -> &LodSettings {
        &self.lod
    }

    fn root_chunk_length(&self) -> f64 {
        self.planet_radius * 2.0
    }

    fn request<E: BuildExecutor, S: MeshStore>(&self, location: ChunkLocation, sink: &ChunkSink<E, S>) -> BuildRequest {
        BuildRequest::new(location, self.planet_radius, sink.terrain.clone())
    }

    /// Creates a pending leaf for an already reserved mesh and enqueues its build.
    fn insert_leaf<E: BuildExecutor, S: MeshStore>(
        &mut self,
        request: BuildRequest,
        mesh: MeshId,
        parent: Option<NodeId>,
        sink: &mut ChunkSink<E, S>,
    ) -> Result<NodeId> {
        let location = request.location.clone();
        sink.forge.enqueue_build(request, mesh)?;

        let center = cube_sphere::chunk_center(self.face, &location.path, self.root_chunk_length(), &Rotation::identity());
        let node = self.nodes.insert(Node {
            location,
            center,
            parent,
            content: QuadTree::Leaf(Chunk::new(mesh)),
            split: None,
        });
        self.chunks_by_mesh.insert(mesh, node);
        Ok(node)
    }

    /// Walks the tree top-down and subdivides or collapses nodes for an observer at `observer`,
    /// given in the unrotated frame of the planet.
    pub fn update<E: BuildExecutor, S: MeshStore>(&mut self, observer: &Point3<f64>, sink: &mut ChunkSink<E, S>) -> Result<()> {
        self.update_node(self.root, observer, sink)
    }

    fn should_subdivide(&self, node: &Node, observer: &Point3<f64>) -> bool {
        let depth = node.location.depth();
        let distance_squared = (node.center - observer.coords).norm_squared();
        let limit = self.lod.render_distance_factor * cube_sphere::chunk_length(self.root_chunk_length(), depth);
        (distance_squared < limit * limit && depth < self.lod.max_depth) || depth < self.lod.min_depth
    }

    fn update_node<E: BuildExecutor, S: MeshStore>(
        &mut self,
        id: NodeId,
        observer: &Point3<f64>,
        sink: &mut ChunkSink<E, S>,
    ) -> Result<()> {
        let (subdivide, depth, leaf, children) = match self.nodes.get(id) {
            Some(node) => {
                let subdivide = self.should_subdivide(node, observer);
                match &node.content {
                    QuadTree::Leaf(chunk) => (subdivide, node.location.depth(), Some((chunk.state, chunk.split_failed)), None),
                    QuadTree::Branch(children) => (subdivide, node.location.depth(), None, Some(*children)),
                }
            }
            None => return Ok(()),
        };

        match (leaf, children) {
            // Wait for the geometry before replacing it, or nothing would be on screen
            (Some((state, false)), _) if subdivide && state != ChunkState::Pending => self.subdivide(id, sink),
            (None, Some(children)) if subdivide => {
                for &child in children.iter() {
                    self.update_node(child, observer, sink)?;
                }
                Ok(())
            }
            (None, Some(_)) if depth >= self.lod.min_depth => self.replace_with_leaf(id, sink),
            _ => Ok(()),
        }
    }

    /// Replaces a leaf by a branch of four new leaves. Leaves the node untouched when the store
    /// cannot provide four meshes or a child would be out of range.
    fn subdivide<E: BuildExecutor, S: MeshStore>(&mut self, id: NodeId, sink: &mut ChunkSink<E, S>) -> Result<()> {
        let location = match self.nodes.get(id) {
            Some(node) => node.location.clone(),
            None => return Ok(()),
        };

        let shared: &ChunkSink<E, S> = sink;
        let requests: Vec<BuildRequest> = Child::values().map(|child| self.request(location.split(*child), shared)).collect();
        for request in requests.iter() {
            request.validate()?;
        }

        let mut meshes = Vec::with_capacity(4);
        for request in requests.iter() {
            match sink.store.create(&request.location) {
                Some(mesh) => meshes.push(mesh),
                None => {
                    warn!("out of meshes, {:?} {:?} stays at its current detail", self.face, location.path);
                    for mesh in meshes {
                        sink.store.dispose(mesh);
                    }
                    return Ok(());
                }
            }
        }

        debug!("subdividing {:?} {:?}", self.face, location.path);
        sink.forge.begin_group();
        let mut children = [0; 4];
        for ((child, request), &mesh) in Child::values().zip(requests.into_iter()).zip(meshes.iter()) {
            children[child.index()] = self.insert_leaf(request, mesh, Some(id), sink)?;
        }

        if let Some(node) = self.nodes.get_mut(id) {
            if let QuadTree::Leaf(chunk) = std::mem::replace(&mut node.content, QuadTree::Branch(children)) {
                self.chunks_by_mesh.remove(&chunk.mesh);
                release(&chunk, sink);
                node.split = Some(Split { chunk, awaiting: meshes });
            }
        }
        Ok(())
    }

    /// Replaces whatever is at `id` by a single new leaf and retires every chunk below it.
    fn replace_with_leaf<E: BuildExecutor, S: MeshStore>(&mut self, id: NodeId, sink: &mut ChunkSink<E, S>) -> Result<()> {
        let location = match self.nodes.get(id) {
            Some(node) => node.location.clone(),
            None => return Ok(()),
        };

        let mesh = match sink.store.create(&location) {
            Some(mesh) => mesh,
            None => {
                warn!("out of meshes, {:?} {:?} cannot be collapsed", self.face, location.path);
                return Ok(());
            }
        };

        debug!("collapsing {:?} {:?}", self.face, location.path);
        sink.forge.begin_group();
        let request = self.request(location, sink);
        sink.forge.enqueue_build(request, mesh)?;

        let previous = match self.nodes.get_mut(id) {
            Some(node) => {
                // The deletions of a replaced leaf now wait on this build
                node.split = None;
                std::mem::replace(&mut node.content, QuadTree::Leaf(Chunk::new(mesh)))
            }
            None => return Ok(()),
        };
        self.chunks_by_mesh.insert(mesh, id);
        self.retire_content(previous, sink);
        Ok(())
    }

    fn retire_content<E: BuildExecutor, S: MeshStore>(&mut self, content: QuadTree<Chunk>, sink: &mut ChunkSink<E, S>) {
        let mut retired = Vec::new();
        match content {
            QuadTree::Leaf(chunk) => retired.push(chunk),
            QuadTree::Branch(children) => {
                for &child in children.iter() {
                    self.remove_subtree(child, &mut retired);
                }
            }
        }
        for chunk in retired {
            self.retire(chunk, sink);
        }
    }

    fn remove_subtree(&mut self, id: NodeId, retired: &mut Vec<Chunk>) {
        match self.nodes.remove(id).map(|node| node.content) {
            Some(QuadTree::Leaf(chunk)) => retired.push(chunk),
            Some(QuadTree::Branch(children)) => {
                for &child in children.iter() {
                    self.remove_subtree(child, retired);
                }
            }
            None => error!("node {} of {:?} is missing", id, self.face),
        }
    }

    /// Hands the meshes of a chunk that is no longer part of the tree to the forge for deletion.
    fn retire<E: BuildExecutor, S: MeshStore>(&mut self, chunk: Chunk, sink: &mut ChunkSink<E, S>) {
        self.chunks_by_mesh.remove(&chunk.mesh);
        release(&chunk, sink);
    }

    /// Replaces the whole tree by a fresh root chunk.
    pub fn reset<E: BuildExecutor, S: MeshStore>(&mut self, sink: &mut ChunkSink<E, S>) -> Result<()> {
        self.replace_with_leaf(self.root, sink)
    }

    fn chunk_mut(&mut self, mesh: MeshId) -> Option<&mut Chunk> {
        let id = *self.chunks_by_mesh.get(&mesh)?;
        match self.nodes.get_mut(id).map(|node| &mut node.content) {
            Some(QuadTree::Leaf(chunk)) if chunk.mesh == mesh => Some(chunk),
            _ => None,
        }
    }

    /// The parent of the chunk owning `mesh`, if that parent is a split still waiting on it
    fn awaiting_parent(&self, mesh: MeshId) -> Option<NodeId> {
        let id = *self.chunks_by_mesh.get(&mesh)?;
        let parent = self.nodes.get(id)?.parent?;
        match &self.nodes.get(parent)?.split {
            Some(split) if split.awaiting.contains(&mesh) => Some(parent),
            _ => None,
        }
    }

    /// The geometry of the chunk owning `mesh` has been uploaded.
    pub fn on_applied(&mut self, mesh: MeshId) {
        let parent = self.awaiting_parent(mesh);
        match self.chunk_mut(mesh) {
            Some(chunk) => chunk.state = ChunkState::Live,
            None => {
                error!("applied mesh {:?} does not belong to a chunk of {:?}", mesh, self.face);
                return;
            }
        }

        if let Some(node) = parent.and_then(|parent| self.nodes.get_mut(parent)) {
            let complete = match node.split.as_mut() {
                Some(split) => {
                    split.awaiting.retain(|awaited| *awaited != mesh);
                    split.awaiting.is_empty()
                }
                None => false,
            };
            if complete {
                node.split = None;
            }
        }
    }

    /// The build of the chunk owning `mesh` failed for good; `retained` are the meshes it was meant
    /// to replace. A failed child of a split brings the parent leaf back. Any other chunk keeps
    /// showing `retained` in its place.
    pub fn on_failed<E: BuildExecutor, S: MeshStore>(&mut self, mesh: MeshId, retained: Vec<MeshId>, sink: &mut ChunkSink<E, S>) {
        if let Some(parent) = self.awaiting_parent(mesh) {
            self.restore(parent, retained, sink);
            return;
        }

        let face = self.face;
        match self.chunk_mut(mesh) {
            Some(chunk) => {
                warn!("keeping {} coarser meshes of {:?} after a failed build", retained.len(), face);
                chunk.state = ChunkState::Failed;
                chunk.fallback.extend(retained);
            }
            None => {
                // A sibling failing in the same round may already have retired it
                debug!("failed mesh {:?} no longer belongs to a chunk of {:?}", mesh, face);
                sink.forge.begin_group();
                for mesh in retained {
                    sink.forge.enqueue_delete(DeleteRequest::new(mesh));
                }
            }
        }
    }

    /// Turns the branch at `id` back into the leaf it replaced and retires its children. The leaf
    /// is not split again.
    fn restore<E: BuildExecutor, S: MeshStore>(&mut self, id: NodeId, retained: Vec<MeshId>, sink: &mut ChunkSink<E, S>) {
        let face = self.face;
        let (previous, kept) = match self.nodes.get_mut(id) {
            Some(node) => match node.split.take() {
                Some(Split { mut chunk, .. }) => {
                    warn!("a child of {:?} {:?} cannot be built, keeping the coarser chunk", face, node.location.path);
                    chunk.split_failed = true;
                    let mut kept = chunk.fallback.clone();
                    kept.push(chunk.mesh);
                    (std::mem::replace(&mut node.content, QuadTree::Leaf(chunk)), kept)
                }
                None => return,
            },
            None => return,
        };
        if let Some(&mesh) = kept.last() {
            self.chunks_by_mesh.insert(mesh, id);
        }

        sink.forge.begin_group();
        self.retire_content(previous, sink);
        for mesh in retained.into_iter().filter(|mesh| !kept.contains(mesh)) {
            sink.forge.enqueue_delete(DeleteRequest::new(mesh));
        }
    }

    /// Visits every leaf chunk together with its location.
    pub fn for_each_chunk<F: FnMut(&ChunkLocation, &Chunk)>(&self, mut visit: F) {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                match &node.content {
                    QuadTree::Leaf(chunk) => visit(&node.location, chunk),
                    QuadTree::Branch(children) => stack.extend(children.iter().rev()),
                }
            }
        }
    }

    pub fn chunk_count(&self) -> usize {
        let mut count = 0;
        self.for_each_chunk(|_, _| count += 1);
        count
    }

    pub fn max_depth(&self) -> usize {
        let mut depth = 0;
        self.for_each_chunk(|location, _| depth = depth.max(location.depth()));
        depth
    }

    /// Whether every chunk has received its geometry (or failed to)
    pub fn is_settled(&self) -> bool {
        let mut settled = true;
        self.for_each_chunk(|_, chunk| settled &= chunk.state != ChunkState::Pending);
        settled
    }
}
