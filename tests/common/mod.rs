#![allow(dead_code)]

use nalgebra::Vector3;
use planetforge::planet::{
    BuildExecutor, BuildRequest, ChunkGeometry, ChunkLocation, Completion, Face, GeometryProvider, MeshId, MeshStore,
    RequestId, WorkerId,
};
use planetforge::{Error, Result};
use std::collections::HashSet;
use std::sync::Mutex;

/// Small deterministic generator for scenario tests
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Lcg {
        Lcg(seed)
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

/// Produces a single triangle, enough for scheduling tests.
pub struct TriangleProvider;

impl GeometryProvider for TriangleProvider {
    fn compute_geometry(&self, _request: &BuildRequest) -> Result<ChunkGeometry> {
        Ok(ChunkGeometry {
            origin: Vector3::zeros(),
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
        })
    }
}

/// Panics on every build of the `broken` face from the given depth on and on every build of
/// `broken_chunk`. Fails the first attempt of every build on `unreliable`.
pub struct FlakyProvider {
    pub broken: Option<(Face, usize)>,
    pub broken_chunk: Option<ChunkLocation>,
    pub unreliable: Option<Face>,
    seen: Mutex<HashSet<RequestId>>,
}

impl FlakyProvider {
    pub fn new(broken: Option<(Face, usize)>, unreliable: Option<Face>) -> FlakyProvider {
        FlakyProvider { broken, broken_chunk: None, unreliable, seen: Mutex::new(HashSet::new()) }
    }

    pub fn breaking(location: ChunkLocation) -> FlakyProvider {
        FlakyProvider { broken_chunk: Some(location), ..FlakyProvider::new(None, None) }
    }
}

impl GeometryProvider for FlakyProvider {
    fn compute_geometry(&self, request: &BuildRequest) -> Result<ChunkGeometry> {
        if let Some((face, depth)) = self.broken {
            if request.location.face == face && request.depth >= depth {
                panic!("the {:?} face is broken", face);
            }
        }
        if self.broken_chunk.as_ref() == Some(&request.location) {
            panic!("chunk {:?} {:?} is broken", request.location.face, request.location.path);
        }
        if self.unreliable == Some(request.location.face) {
            let first_attempt = self.seen.lock().map(|mut seen| seen.insert(request.id)).unwrap_or(false);
            if first_attempt {
                return Err(Error::BuildFailed("first attempts always fail".to_owned()));
            }
        }
        TriangleProvider.compute_geometry(request)
    }
}

/// Finishes builds after a latency that depends on the request id and hands them back newest
/// first, so completion order differs from submission order.
pub struct LaggyExecutor<P: GeometryProvider> {
    provider: P,
    workers: usize,
    running: Vec<(WorkerId, RequestId, u64, Result<ChunkGeometry>)>,
}

impl<P: GeometryProvider> LaggyExecutor<P> {
    pub fn new(provider: P, workers: usize) -> LaggyExecutor<P> {
        LaggyExecutor { provider, workers, running: Vec::new() }
    }
}

impl<P: GeometryProvider> BuildExecutor for LaggyExecutor<P> {
    fn capacity(&self) -> usize {
        self.workers
    }

    fn submit(&mut self, worker: WorkerId, request: BuildRequest) -> Result<()> {
        assert!(worker < self.workers);
        assert!(self.running.iter().all(|(busy, ..)| *busy != worker), "worker {} is busy", worker);
        let latency = 1 + (request.id as u64).wrapping_mul(2654435761) % 4;
        let outcome = self.provider.compute_geometry(&request);
        self.running.push((worker, request.id, latency, outcome));
        Ok(())
    }

    fn receive_all<F: FnMut(Completion)>(&mut self, mut drain: F) {
        let mut finished = Vec::new();
        let mut index = 0;
        while index < self.running.len() {
            self.running[index].2 -= 1;
            if self.running[index].2 == 0 {
                finished.push(self.running.remove(index));
            } else {
                index += 1;
            }
        }
        for (worker, id, _, outcome) in finished.into_iter().rev() {
            drain(Completion { worker, id, outcome });
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Create(MeshId),
    Upload(MeshId),
    Dispose(MeshId),
}

/// A mesh store that never reuses ids and records everything that happens to it.
#[derive(Default)]
pub struct RecordingStore {
    next: usize,
    pub ops: Vec<StoreOp>,
    pub alive: HashSet<MeshId>,
    pub uploaded: HashSet<MeshId>,
}

impl RecordingStore {
    pub fn new() -> RecordingStore {
        RecordingStore::default()
    }

    pub fn upload_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, StoreOp::Upload(_))).count()
    }

    pub fn dispose_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, StoreOp::Dispose(_))).count()
    }
}

impl MeshStore for RecordingStore {
    fn create(&mut self, _location: &ChunkLocation) -> Option<MeshId> {
        let mesh = MeshId::new(self.next);
        self.next += 1;
        self.alive.insert(mesh);
        self.ops.push(StoreOp::Create(mesh));
        Some(mesh)
    }

    fn upload(&mut self, mesh: MeshId, _geometry: ChunkGeometry) {
        assert!(self.alive.contains(&mesh), "upload to dead mesh {:?}", mesh);
        self.uploaded.insert(mesh);
        self.ops.push(StoreOp::Upload(mesh));
    }

    fn dispose(&mut self, mesh: MeshId) {
        assert!(self.alive.remove(&mesh), "double dispose of {:?}", mesh);
        self.ops.push(StoreOp::Dispose(mesh));
    }
}
