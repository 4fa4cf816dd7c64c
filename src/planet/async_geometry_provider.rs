use super::geometry_provider::{BuildRequest, ChunkGeometry, GeometryProvider, RequestId};
use crate::error::{Error, Result};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

/// Index of a worker of an executor, in `0..capacity()`
pub type WorkerId = usize;

/// A build that finished, successfully or not, on one of the workers.
#[derive(Debug)]
pub struct Completion {
    pub worker: WorkerId,
    pub id: RequestId,
    pub outcome: Result<ChunkGeometry>,
}

/// Runs builds outside of the controlling thread. Every worker executes at most one build at a
/// time, the forge only submits to workers it knows to be idle.
pub trait BuildExecutor {
    /// The number of workers
    fn capacity(&self) -> usize;

    /// Hands a request to an idle worker. Never blocks.
    fn submit(&mut self, worker: WorkerId, request: BuildRequest) -> Result<()>;

    /// Passes every build that finished since the last call to `drain`, without waiting for
    /// builds that are still running.
    fn receive_all<F: FnMut(Completion)>(&mut self, drain: F);
}

/// Runs the provider and turns a panic into a build failure.
fn run_build<P: GeometryProvider + ?Sized>(provider: &P, request: &BuildRequest) -> Result<ChunkGeometry> {
    panic::catch_unwind(AssertUnwindSafe(|| provider.compute_geometry(request)))
        .unwrap_or_else(|payload| Err(Error::BuildFailed(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_owned()
    }
}

/// Executes builds on a fixed set of threads. Every thread owns a request channel with room for a
/// single request, all threads share one result channel.
pub struct ThreadpoolExecutor {
    senders: Vec<SyncSender<BuildRequest>>,
    threads: Vec<thread::JoinHandle<()>>,
    receiver: Receiver<Completion>,
}

impl ThreadpoolExecutor {
    /// Create new instance, all threads are started and waiting for requests
    pub fn new<P: GeometryProvider + Send + Sync + 'static>(provider: P, workers: usize) -> Result<ThreadpoolExecutor> {
        if workers == 0 {
            return Err(Error::Worker("a thread pool needs at least one worker".to_owned()));
        }

        let provider = Arc::new(provider);
        let (result_sender, receiver) = sync_channel(workers);

        let mut executor = ThreadpoolExecutor {
            senders: Vec::with_capacity(workers),
            threads: Vec::with_capacity(workers),
            receiver,
        };

        for worker in 0..workers {
            let (sender, requests) = sync_channel::<BuildRequest>(1);
            let thread_provider = provider.clone();
            let thread_results = result_sender.clone();

            let handle = thread::Builder::new().name(format!("forge-worker-{}", worker)).spawn(move || {
                for request in requests.iter() {
                    let outcome = run_build(thread_provider.as_ref(), &request);
                    let completion = Completion { worker, id: request.id, outcome };
                    if thread_results.send(completion).is_err() {
                        break;
                    }
                }
            })?;

            executor.senders.push(sender);
            executor.threads.push(handle);
        }

        debug!("started {} forge workers", workers);
        Ok(executor)
    }
}

impl BuildExecutor for ThreadpoolExecutor {
    fn capacity(&self) -> usize {
        self.senders.len()
    }

    fn submit(&mut self, worker: WorkerId, request: BuildRequest) -> Result<()> {
        let sender = self
            .senders
            .get(worker)
            .ok_or_else(|| Error::Worker(format!("there is no worker {}", worker)))?;
        sender.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => Error::Worker(format!("worker {} is still busy", worker)),
            TrySendError::Disconnected(_) => Error::Worker(format!("worker {} has stopped", worker)),
        })
    }

    fn receive_all<F: FnMut(Completion)>(&mut self, mut drain: F) {
        for completion in self.receiver.try_iter() {
            drain(completion);
        }
    }
}

/// Closing the request channels stops the threads once their current build is done
impl Drop for ThreadpoolExecutor {
    fn drop(&mut self) {
        self.senders.clear();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("a forge worker terminated abnormally");
            }
        }
    }
}

/// This is an executor that acts like an asynchronous one but computes every build on the calling
/// thread the moment it is submitted. The results are only handed out on the next receive.
pub struct SyncExecutor<P: GeometryProvider> {
    provider: P,
    workers: usize,
    finished: VecDeque<Completion>,
}

impl<P: GeometryProvider> SyncExecutor<P> {
    pub fn new(provider: P) -> SyncExecutor<P> {
        SyncExecutor::with_workers(provider, 1)
    }

    /// Pretends to have `workers` workers, so that many builds finish per receive
    pub fn with_workers(provider: P, workers: usize) -> SyncExecutor<P> {
        SyncExecutor {
            provider,
            workers: workers.max(1),
            finished: VecDeque::new(),
        }
    }
}

impl<P: GeometryProvider> BuildExecutor for SyncExecutor<P> {
    fn capacity(&self) -> usize {
        self.workers
    }

    fn submit(&mut self, worker: WorkerId, request: BuildRequest) -> Result<()> {
        if worker >= self.workers {
            return Err(Error::Worker(format!("there is no worker {}", worker)));
        }
        let outcome = run_build(&self.provider, &request);
        self.finished.push_back(Completion { worker, id: request.id, outcome });
        Ok(())
    }

    fn receive_all<F: FnMut(Completion)>(&mut self, mut drain: F) {
        while let Some(completion) = self.finished.pop_front() {
            drain(completion);
        }
    }
}
