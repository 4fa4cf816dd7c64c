pub const CHUNK_SUBDIVISIONS: usize = 64;
pub const VERTICES_PER_SIDE: usize = CHUNK_SUBDIVISIONS + 1; // One extra row and column to close the seam with the next chunk
pub const VERTICES_PER_CHUNK: usize = VERTICES_PER_SIDE * VERTICES_PER_SIDE;
pub const INDICES_PER_CHUNK: usize = CHUNK_SUBDIVISIONS * CHUNK_SUBDIVISIONS * 6;

pub const MAX_CHUNK_DEPTH: usize = 24;
pub const MAX_MESH_COUNT: usize = 4096;

pub const DEFAULT_RENDER_DISTANCE_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_RETRIES: u8 = 1;

// Indices are stored as u16
const _: () = assert!(VERTICES_PER_CHUNK <= u16::MAX as usize + 1);
