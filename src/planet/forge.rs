//! Scheduling of chunk builds and deletions.
//!
//! The forge lives on the controlling thread. Builds travel to the workers of an executor and come
//! back as completions; only `apply_next` ever touches a mesh. A deletion is held back until the
//! builds it was enqueued behind have been applied, so old geometry is never removed before its
//! replacement is visible.

use super::async_geometry_provider::{BuildExecutor, Completion};
use super::constants::DEFAULT_MAX_RETRIES;
use super::geometry_provider::{next_request_id, BuildRequest, BuildResult, ChunkLocation, RequestId};
use super::mesh_store::{MeshId, MeshStore};
use crate::error::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;

/// Asks the forge to dispose of a mesh once it is no longer needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub id: RequestId,
    pub mesh: MeshId,
}

impl DeleteRequest {
    pub fn new(mesh: MeshId) -> DeleteRequest {
        DeleteRequest { id: next_request_id(), mesh }
    }
}

/// What happened to a build, reported back to the owner of the chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ForgeEvent {
    /// The geometry has been uploaded into the mesh of the chunk
    Applied { id: RequestId, location: ChunkLocation, mesh: MeshId },
    /// The build failed more often than allowed. The deletions waiting on it were cancelled, the
    /// meshes they would have disposed are handed back in `retained`.
    Failed {
        id: RequestId,
        location: ChunkLocation,
        mesh: MeshId,
        retained: Vec<MeshId>,
    },
}

struct BuildTask {
    request: BuildRequest,
    mesh: MeshId,
    attempts: u8,
}

struct DeleteTask {
    request: DeleteRequest,
    /// Builds that must be applied before the mesh may go
    waiting_on: HashSet<RequestId>,
}

enum WorkerState {
    Idle,
    Busy(BuildTask),
}

struct Finished {
    mesh: MeshId,
    location: ChunkLocation,
    result: BuildResult,
}

pub struct ChunkForge<E: BuildExecutor> {
    executor: E,
    workers: Vec<WorkerState>,
    pending: VecDeque<BuildTask>,
    completed: VecDeque<Finished>,
    trash: Vec<DeleteTask>,

    /// Builds enqueued since the last run of deletions, the next deletion waits on these
    open_group: Vec<RequestId>,
    last_was_delete: bool,

    /// Builds that are pending, running or completed but not applied yet
    outstanding: HashMap<RequestId, MeshId>,
    builds_by_mesh: HashMap<MeshId, RequestId>,
    /// Running builds whose result must be thrown away
    superseded: HashSet<RequestId>,

    events: Vec<ForgeEvent>,
    max_retries: u8,
}

impl<E: BuildExecutor> ChunkForge<E> {
    pub fn new(executor: E) -> ChunkForge<E> {
        ChunkForge::with_max_retries(executor, DEFAULT_MAX_RETRIES)
    }

    pub fn with_max_retries(executor: E, max_retries: u8) -> ChunkForge<E> {
        let workers = (0..executor.capacity()).map(|_| WorkerState::Idle).collect();
        ChunkForge {
            executor,
            workers,
            pending: VecDeque::new(),
            completed: VecDeque::new(),
            trash: Vec::new(),
            open_group: Vec::new(),
            last_was_delete: false,
            outstanding: HashMap::new(),
            builds_by_mesh: HashMap::new(),
            superseded: HashSet::new(),
            events: Vec::new(),
            max_retries,
        }
    }

    /// Starts a new group: deletions enqueued from now on only wait on builds enqueued after this
    /// call. Every replacement in a chunk tree is its own group.
    pub fn begin_group(&mut self) {
        self.open_group.clear();
        self.last_was_delete = false;
    }

    /// Queues the build of the geometry for `mesh`. Requests that no chunk tree could have issued
    /// are rejected.
    pub fn enqueue_build(&mut self, request: BuildRequest, mesh: MeshId) -> Result<RequestId> {
        request.validate()?;

        let id = request.id;
        if self.last_was_delete {
            self.open_group.clear();
            self.last_was_delete = false;
        }
        self.open_group.push(id);

        // A second build for the same mesh replaces the first
        if let Some(&previous) = self.builds_by_mesh.get(&mesh) {
            let replacement = [id].iter().cloned().collect();
            self.supersede(previous, &replacement);
        }

        trace!("enqueue build {} of {:?} {:?}", id, request.location.face, request.location.path);
        self.outstanding.insert(id, mesh);
        self.builds_by_mesh.insert(mesh, id);
        self.pending.push_back(BuildTask { request, mesh, attempts: 0 });
        Ok(id)
    }

    /// Queues the disposal of a mesh. The mesh is disposed once every build enqueued directly
    /// before this deletion has been applied.
    pub fn enqueue_delete(&mut self, request: DeleteRequest) {
        self.last_was_delete = true;

        let mut waiting_on: HashSet<RequestId> =
            self.open_group.iter().filter(|id| self.outstanding.contains_key(*id)).cloned().collect();

        // The mesh is going away, so is any geometry still on its way to it
        if let Some(&build) = self.builds_by_mesh.get(&request.mesh) {
            waiting_on.remove(&build);
            self.supersede(build, &waiting_on);
        }

        trace!("enqueue delete {} of mesh {:?} after {} builds", request.id, request.mesh, waiting_on.len());
        self.trash.push(DeleteTask { request, waiting_on });
    }

    /// Removes a build that is no longer wanted. Deletions that were waiting on it wait on
    /// `replacement` instead.
    fn supersede(&mut self, id: RequestId, replacement: &HashSet<RequestId>) {
        if let Some(mesh) = self.outstanding.remove(&id) {
            if self.builds_by_mesh.get(&mesh) == Some(&id) {
                self.builds_by_mesh.remove(&mesh);
            }
        }

        if let Some(index) = self.pending.iter().position(|task| task.request.id == id) {
            self.pending.remove(index);
            trace!("dropped pending build {}", id);
        } else if let Some(index) = self.completed.iter().position(|finished| finished.result.id == id) {
            self.completed.remove(index);
            trace!("dropped completed build {}", id);
        } else {
            self.superseded.insert(id);
            trace!("build {} will be discarded on arrival", id);
        }

        for delete in self.trash.iter_mut() {
            if delete.waiting_on.remove(&id) {
                delete.waiting_on.extend(replacement.iter().cloned());
            }
        }
    }

    /// Collects finished builds from the workers and hands pending builds to idle workers. Never
    /// blocks.
    pub fn tick(&mut self) {
        let mut completions = Vec::new();
        self.executor.receive_all(|completion| completions.push(completion));
        for completion in completions {
            self.complete(completion);
        }

        self.dispatch();
    }

    fn complete(&mut self, completion: Completion) {
        let task = match self.workers.get_mut(completion.worker).map(|state| mem::replace(state, WorkerState::Idle)) {
            Some(WorkerState::Busy(task)) => task,
            _ => {
                error!("completion of build {} from worker {} that was not busy", completion.id, completion.worker);
                return;
            }
        };

        if task.request.id != completion.id {
            error!("worker {} returned build {} instead of {}", completion.worker, completion.id, task.request.id);
        }

        if self.superseded.remove(&task.request.id) {
            trace!("discarded superseded build {}", task.request.id);
            return;
        }

        match completion.outcome {
            Ok(geometry) => {
                trace!("build {} completed on worker {}", task.request.id, completion.worker);
                self.completed.push_back(Finished {
                    mesh: task.mesh,
                    location: task.request.location,
                    result: BuildResult { id: task.request.id, geometry },
                });
            }
            Err(e) if task.attempts < self.max_retries => {
                warn!(
                    "build {} of {:?} {:?} failed, retrying: {}",
                    task.request.id, task.request.location.face, task.request.location.path, e
                );
                self.pending.push_front(BuildTask { attempts: task.attempts + 1, ..task });
            }
            Err(e) => {
                error!(
                    "build {} of {:?} {:?} failed permanently: {}",
                    task.request.id, task.request.location.face, task.request.location.path, e
                );
                self.fail(task);
            }
        }
    }

    fn fail(&mut self, task: BuildTask) {
        let id = task.request.id;
        self.outstanding.remove(&id);
        if self.builds_by_mesh.get(&task.mesh) == Some(&id) {
            self.builds_by_mesh.remove(&task.mesh);
        }

        let (cancelled, kept): (Vec<DeleteTask>, Vec<DeleteTask>) =
            self.trash.drain(..).partition(|delete| delete.waiting_on.contains(&id));
        self.trash = kept;

        self.events.push(ForgeEvent::Failed {
            id,
            location: task.request.location,
            mesh: task.mesh,
            retained: cancelled.into_iter().map(|delete| delete.request.mesh).collect(),
        });
    }

    fn dispatch(&mut self) {
        for worker in 0..self.workers.len() {
            if let WorkerState::Busy(_) = self.workers[worker] {
                continue;
            }

            let task = match self.pending.pop_front() {
                Some(task) => task,
                None => break,
            };

            match self.executor.submit(worker, task.request.clone()) {
                Ok(()) => {
                    trace!("dispatched build {} to worker {}", task.request.id, worker);
                    self.workers[worker] = WorkerState::Busy(task);
                }
                Err(e) => {
                    error!("could not dispatch build {} to worker {}: {}", task.request.id, worker, e);
                    self.pending.push_front(task);
                    break;
                }
            }
        }
    }

    /// Uploads at most one completed build and disposes every mesh whose deletion is no longer
    /// waiting on anything. Returns whether a build was applied.
    pub fn apply_next<S: MeshStore>(&mut self, store: &mut S) -> bool {
        let applied = match self.completed.pop_front() {
            Some(finished) => {
                let id = finished.result.id;
                self.outstanding.remove(&id);
                if self.builds_by_mesh.get(&finished.mesh) == Some(&id) {
                    self.builds_by_mesh.remove(&finished.mesh);
                }

                store.upload(finished.mesh, finished.result.geometry);
                trace!("applied build {} to mesh {:?}", id, finished.mesh);
                self.events.push(ForgeEvent::Applied { id, location: finished.location, mesh: finished.mesh });

                for delete in self.trash.iter_mut() {
                    delete.waiting_on.remove(&id);
                }
                true
            }
            None => false,
        };

        let (ready, waiting): (Vec<DeleteTask>, Vec<DeleteTask>) =
            self.trash.drain(..).partition(|delete| delete.waiting_on.is_empty());
        self.trash = waiting;
        for delete in ready {
            trace!("disposing mesh {:?}", delete.request.mesh);
            store.dispose(delete.request.mesh);
        }

        applied
    }

    /// Takes the events produced since the last call
    pub fn drain_events(&mut self) -> Vec<ForgeEvent> {
        mem::replace(&mut self.events, Vec::new())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Builds waiting for a worker
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Builds running on a worker
    pub fn in_flight_count(&self) -> usize {
        self.workers.iter().filter(|state| matches!(state, WorkerState::Busy(_))).count()
    }

    /// Builds waiting to be applied
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Deletions waiting for their replacement
    pub fn trash_count(&self) -> usize {
        self.trash.len()
    }

    /// Whether there is nothing left to build, apply or dispose
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.completed.is_empty() && self.trash.is_empty() && self.in_flight_count() == 0
    }
}
