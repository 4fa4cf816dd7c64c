use super::constants::MAX_CHUNK_DEPTH;
use super::cube_sphere;
use super::quad_tree::{Child, ChunkPath};
use super::terrain::ElevationField;
use super::Face;
use crate::error::{Error, Result};
use nalgebra::{Rotation3, Vector2, Vector3};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT: AtomicUsize = AtomicUsize::new(0);

/// Identifies a request handed to the forge
pub type RequestId = usize;

/// Hands out request ids, unique for the lifetime of the process
pub fn next_request_id() -> RequestId {
    NEXT.fetch_add(1, Ordering::SeqCst)
}

/// Location of a chunk: the face of the cube and the path in the quad tree of that face.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkLocation {
    pub face: Face,
    pub path: ChunkPath,
}

impl ChunkLocation {
    pub fn root(face: Face) -> ChunkLocation {
        ChunkLocation { face, path: ChunkPath::root() }
    }

    pub fn split(&self, child: Child) -> ChunkLocation {
        ChunkLocation {
            face: self.face,
            path: self.path.child(child),
        }
    }

    pub fn depth(&self) -> usize {
        self.path.depth()
    }
}

impl From<Face> for ChunkLocation {
    fn from(face: Face) -> ChunkLocation {
        ChunkLocation::root(face)
    }
}

/// Everything a worker needs to build the geometry of one chunk. Immutable once created, the
/// terrain is an immutable snapshot shared between all requests of a planet.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub id: RequestId,
    pub location: ChunkLocation,
    pub depth: usize,
    pub planet_radius: f64,
    pub face_rotation: Rotation3<f64>,
    /// Center of the chunk in the plane of its face
    pub offset: Vector2<f64>,
    pub terrain: Arc<ElevationField>,
}

impl BuildRequest {
    pub fn new(location: ChunkLocation, planet_radius: f64, terrain: Arc<ElevationField>) -> BuildRequest {
        let offset = cube_sphere::plane_offset(&location.path, planet_radius * 2.0);
        BuildRequest {
            id: next_request_id(),
            depth: location.depth(),
            face_rotation: location.face.orientation(),
            location,
            planet_radius,
            offset,
            terrain,
        }
    }

    /// Edge length of the root chunk of a face, the diameter of the planet
    pub fn root_chunk_length(&self) -> f64 {
        self.planet_radius * 2.0
    }

    /// Edge length of this chunk on the cube
    pub fn chunk_length(&self) -> f64 {
        cube_sphere::chunk_length(self.root_chunk_length(), self.depth)
    }

    /// Rejects requests that could never have been issued by a chunk tree.
    pub fn validate(&self) -> Result<()> {
        if self.depth != self.location.depth() {
            return Err(Error::DepthMismatch { depth: self.depth, path_len: self.location.depth() });
        }
        if self.depth > MAX_CHUNK_DEPTH {
            return Err(Error::DepthOutOfRange { depth: self.depth, max: MAX_CHUNK_DEPTH });
        }
        Ok(())
    }
}

/// Geometry of a single chunk. Positions are relative to `origin`, the center of the chunk on the
/// undisplaced sphere, to keep `f32` precision far away from the planet center.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkGeometry {
    pub origin: Vector3<f64>,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u16>,
}

impl ChunkGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Position of the vertex at `index` in planet space
    pub fn planet_position(&self, index: usize) -> Vector3<f64> {
        self.origin
            + Vector3::new(
                f64::from(self.positions[3 * index]),
                f64::from(self.positions[3 * index + 1]),
                f64::from(self.positions[3 * index + 2]),
            )
    }

    pub fn normal(&self, index: usize) -> Vector3<f64> {
        Vector3::new(
            f64::from(self.normals[3 * index]),
            f64::from(self.normals[3 * index + 1]),
            f64::from(self.normals[3 * index + 2]),
        )
    }
}

/// The outcome of a build, consumed exactly once when it is applied.
#[derive(Debug)]
pub struct BuildResult {
    pub id: RequestId,
    pub geometry: ChunkGeometry,
}

pub trait GeometryProvider {
    fn compute_geometry(&self, request: &BuildRequest) -> Result<ChunkGeometry>;
}

impl<T: GeometryProvider + ?Sized> GeometryProvider for Arc<T> {
    fn compute_geometry(&self, request: &BuildRequest) -> Result<ChunkGeometry> {
        (**self).compute_geometry(request)
    }
}
