//! Mapping from positions on the faces of the cube to the planet sphere.
//!
//! Every function here is pure, the same arguments always yield the same point. Build requests are
//! applied on a later frame than they are issued so chunk geometry must be reproducible.

use super::quad_tree::ChunkPath;
use super::Face;
use crate::transform::Rotation;
use nalgebra::{Rotation3, Vector2, Vector3};

/// Position of the center of the node at `path` relative to the center of its face plane.
pub fn plane_offset(path: &ChunkPath, root_chunk_length: f64) -> Vector2<f64> {
    let mut offset = Vector2::new(0.0, 0.0);
    let mut half_child_length = root_chunk_length / 2.0;
    for child in path.iter() {
        half_child_length *= 0.5;
        let (sign_x, sign_y) = child.signs();
        offset.x += sign_x * half_child_length;
        offset.y += sign_y * half_child_length;
    }
    offset
}

/// Edge length of a chunk at the given depth
pub fn chunk_length(root_chunk_length: f64, depth: usize) -> f64 {
    root_chunk_length / 2f64.powi(depth as i32)
}

/// Position of the grid vertex `(x, y)` of the chunk at `path`, relative to the center of its face.
/// Computed from the integer position of the vertex in the grid that covers the whole face, so a
/// vertex on the border between two chunks comes out the same from either side, also when the
/// chunks lie on different faces.
pub fn grid_to_plane(path: &ChunkPath, x: usize, y: usize, subdivisions: usize, root_chunk_length: f64) -> Vector2<f64> {
    let (cell_x, cell_y) = path.iter().fold((0u64, 0u64), |(cell_x, cell_y), child| {
        let (sign_x, sign_y) = child.signs();
        (2 * cell_x + (sign_x > 0.0) as u64, 2 * cell_y + (sign_y > 0.0) as u64)
    });
    let vertices_per_face = (subdivisions as u64) << path.depth();
    let to_plane = |cell: u64, vertex: usize| {
        let fraction = (cell * subdivisions as u64 + vertex as u64) as f64 / vertices_per_face as f64;
        (2.0 * fraction - 1.0) * (root_chunk_length / 2.0)
    };
    Vector2::new(to_plane(cell_x, x), to_plane(cell_y, y))
}

/// Maps a position in the plane of a face, relative to the center of that face, onto the cube.
pub fn plane_to_cube(face_orientation: &Rotation3<f64>, plane_position: Vector2<f64>, root_chunk_length: f64) -> Vector3<f64> {
    face_orientation * Vector3::new(plane_position.x, plane_position.y, root_chunk_length / 2.0)
}

/// Maps a position in the plane of a chunk, relative to its center, onto the cube.
pub fn face_plane_to_cube(
    face: Face,
    plane_position: Vector2<f64>,
    path: &ChunkPath,
    root_chunk_length: f64,
) -> Vector3<f64> {
    let offset = plane_offset(path, root_chunk_length) + plane_position;
    plane_to_cube(&face.orientation(), offset, root_chunk_length)
}

/// Maps a position in the plane of a chunk, relative to its center, onto the sphere that encloses
/// the cube and rotates the result with the planet.
pub fn face_plane_to_sphere(
    face: Face,
    plane_position: Vector2<f64>,
    path: &ChunkPath,
    root_chunk_length: f64,
    planet_rotation: &Rotation,
) -> Vector3<f64> {
    let cube_position = face_plane_to_cube(face, plane_position, path, root_chunk_length);
    planet_rotation * (cube_position.normalize() * (root_chunk_length / 2.0))
}

/// Center of the chunk at `path`, projected on the sphere in planet space.
pub fn chunk_center(face: Face, path: &ChunkPath, root_chunk_length: f64, planet_rotation: &Rotation) -> Vector3<f64> {
    face_plane_to_sphere(face, Vector2::zeros(), path, root_chunk_length, planet_rotation)
}
