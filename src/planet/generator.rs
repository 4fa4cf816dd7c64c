use super::constants::{CHUNK_SUBDIVISIONS, INDICES_PER_CHUNK, VERTICES_PER_CHUNK, VERTICES_PER_SIDE};
use super::cube_sphere;
use super::geometry_provider::{BuildRequest, ChunkGeometry, GeometryProvider};
use super::terrain::surface_normal;
use crate::error::Result;
use nalgebra::Vector3;

/// Builds the displaced triangle grid of a chunk. Holds no state, everything it needs travels
/// with the request, so a single instance can be shared by every worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct Generator;

impl Generator {
    pub fn new() -> Generator {
        Generator
    }

    /// Planet space position and normal of the grid vertex `(x, y)` of the requested chunk.
    pub fn compute_vertex(&self, request: &BuildRequest, x: usize, y: usize) -> (Vector3<f64>, Vector3<f64>) {
        let plane_position = cube_sphere::grid_to_plane(
            &request.location.path,
            x,
            y,
            CHUNK_SUBDIVISIONS,
            request.root_chunk_length(),
        );
        let on_cube = cube_sphere::plane_to_cube(&request.face_rotation, plane_position, request.root_chunk_length());
        let unit = on_cube.normalize();

        let sample = request.terrain.evaluate(&unit, request.planet_radius);
        let position = unit * request.planet_radius + unit * sample.elevation;
        let normal = surface_normal(&unit, &sample.gradient);

        (position, normal)
    }

    /// Center of the requested chunk on the undisplaced sphere
    pub fn origin(&self, request: &BuildRequest) -> Vector3<f64> {
        let on_cube = cube_sphere::plane_to_cube(&request.face_rotation, request.offset, request.root_chunk_length());
        on_cube.normalize() * request.planet_radius
    }
}

impl GeometryProvider for Generator {
    fn compute_geometry(&self, request: &BuildRequest) -> Result<ChunkGeometry> {
        request.validate()?;

        let origin = self.origin(request);

        let mut positions: Vec<f32> = Vec::with_capacity(VERTICES_PER_CHUNK * 3);
        let mut normals: Vec<f32> = Vec::with_capacity(VERTICES_PER_CHUNK * 3);
        let mut indices: Vec<u16> = Vec::with_capacity(INDICES_PER_CHUNK);

        for x in 0..VERTICES_PER_SIDE {
            for y in 0..VERTICES_PER_SIDE {
                let (position, normal) = self.compute_vertex(request, x, y);

                let relative = position - origin;
                positions.extend_from_slice(&[relative.x as f32, relative.y as f32, relative.z as f32]);
                normals.extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);

                // Triangles start once the first row and column are in place
                if x == 0 || y == 0 {
                    continue;
                }

                let vertex = (x * VERTICES_PER_SIDE + y) as u16;
                let row = VERTICES_PER_SIDE as u16;
                indices.extend_from_slice(&[vertex - 1, vertex, vertex - row - 1]);
                indices.extend_from_slice(&[vertex, vertex - row, vertex - row - 1]);
            }
        }

        trace!(
            "built chunk {:?} {:?} with {} vertices",
            request.location.face,
            request.location.path,
            positions.len() / 3
        );

        Ok(ChunkGeometry {
            origin,
            positions,
            normals,
            indices,
        })
    }
}
