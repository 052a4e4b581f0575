//! # Affinity Pool
//!
//! A bounded pool of lazily spawned worker threads with object affinity.
//! Each adopted object lives on exactly one worker; the pool routes visit
//! closures to it there, keeps per-worker occupancy for greedy load
//! balancing, and stops a worker once its last object has been evicted.
//!
//! ## Key Concepts
//! - Lazy growth: a worker thread is spawned per adoption until the
//!   configured cap is reached, never afterwards.
//! - Least-loaded placement: at capacity, new objects land on the worker
//!   with the fewest residents; ties go to the oldest worker.
//! - Deferred destruction: eviction never drops the object on the calling
//!   thread. The drop is enqueued on the object's own worker, behind
//!   whatever that worker was already asked to do.
//!
//! All pool state sits behind one mutex; `adopt`, `visit` and `evict` from
//! any number of caller threads observe a single consistent interleaving.

mod worker;

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use tracing::{error, info, warn};

use roost_api::errors::{AdoptError, VisitError};
use roost_api::identity::{ResidentId, WorkerId};
use roost_api::resident::{BoxedResident, Resident};

use crate::config::PoolConfig;

use self::worker::{Task, Worker};

struct WorkerEntry {
    worker: Worker,
    /// Number of residents currently housed on this worker. Kept in sync
    /// with `homes` under the pool mutex; a worker reaching zero is stopped
    /// and removed immediately, so no entry ever stays at zero.
    residents: usize,
}

struct PoolState {
    /// Live workers, keyed by creation-ordered id. BTreeMap iteration is
    /// oldest-first, which makes the load-balancing tie-break deterministic.
    workers: BTreeMap<WorkerId, WorkerEntry>,
    /// Home worker of every adopted resident.
    homes: HashMap<ResidentId, WorkerId>,
    next_worker: u64,
}

/// Thread pool that gives every adopted object a home worker thread.
///
/// Dropping the pool evicts everything still housed in it, draining and
/// joining every worker.
pub struct AffinityPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl AffinityPool {
    /// Build a pool from an explicit configuration.
    ///
    /// # Panics
    /// If `config.max_workers` is zero; a zero-capacity pool can never
    /// house anything.
    pub fn new(config: PoolConfig) -> Self {
        assert!(
            config.max_workers > 0,
            "AffinityPool requires max_workers > 0"
        );
        Self {
            config,
            state: Mutex::new(PoolState {
                workers: BTreeMap::new(),
                homes: HashMap::new(),
                next_worker: 0,
            }),
        }
    }

    /// Default configuration with the worker cap overridden.
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self::new(PoolConfig {
            max_workers,
            ..PoolConfig::default()
        })
    }

    /// Take ownership of `resident` and house it on a worker.
    ///
    /// Below the worker cap this spawns a fresh thread (the only place
    /// workers are created); at the cap it picks the least-loaded existing
    /// worker, oldest first on ties. The resident's `attached` hook runs on
    /// the chosen worker before anything else the pool is asked to do with
    /// it.
    ///
    /// Rejections hand the box back inside the error: an id the pool
    /// already tracks is a caller bug and leaves the pool untouched.
    pub fn adopt(&self, resident: BoxedResident) -> Result<ResidentId, AdoptError> {
        let id = resident.id();
        let mut state = self.state.lock().unwrap();

        if state.homes.contains_key(&id) {
            error!(resident = %id, "adopt: resident already managed - bailing out");
            return Err(AdoptError::AlreadyManaged { id, resident });
        }

        let worker_id = if state.workers.len() < self.config.max_workers {
            let worker_id = WorkerId::new(state.next_worker);
            info!(worker = %worker_id, "adopt: creating new worker");
            let name = format!("{}-{}", self.config.thread_name_prefix, worker_id.index());
            let worker = match Worker::spawn(worker_id, name) {
                Ok(worker) => worker,
                Err(source) => {
                    error!(worker = %worker_id, error = %source, "adopt: failed to spawn worker thread");
                    return Err(AdoptError::SpawnFailed { resident, source });
                }
            };
            state.next_worker += 1;
            state.workers.insert(
                worker_id,
                WorkerEntry {
                    worker,
                    residents: 0,
                },
            );
            worker_id
        } else {
            // Least-loaded worker; iteration is creation order, so the
            // strict '<' keeps the oldest of equally loaded workers.
            let mut chosen: Option<(WorkerId, usize)> = None;
            for (worker_id, entry) in &state.workers {
                match chosen {
                    Some((_, best)) if best <= entry.residents => {}
                    _ => chosen = Some((*worker_id, entry.residents)),
                }
            }
            // max_workers > 0, so the map cannot be empty at capacity
            chosen.expect("worker selection found no worker").0
        };

        let entry = state
            .workers
            .get_mut(&worker_id)
            .expect("selected worker missing from registry");
        if let Err(task) = entry.worker.enqueue(Task::Adopt(id, resident)) {
            let resident = match task {
                Task::Adopt(_, resident) => resident,
                _ => unreachable!("adopt task came back as something else"),
            };
            error!(worker = %worker_id, resident = %id, "adopt: worker queue disconnected");
            return Err(AdoptError::WorkerUnavailable { id, resident });
        }
        entry.residents += 1;
        state.homes.insert(id, worker_id);

        Ok(id)
    }

    /// Run `visit` against the resident on its home worker, after everything
    /// already enqueued for that worker.
    pub fn visit<F>(&self, id: ResidentId, visit: F) -> Result<(), VisitError>
    where
        F: FnOnce(&mut dyn Resident) + Send + 'static,
    {
        let state = self.state.lock().unwrap();
        let worker_id = match state.homes.get(&id) {
            Some(worker_id) => *worker_id,
            None => return Err(VisitError::NotManaged(id)),
        };
        let entry = state
            .workers
            .get(&worker_id)
            .expect("home points at a missing worker");
        entry
            .worker
            .enqueue(Task::Visit(id, Box::new(visit)))
            .map_err(|_| VisitError::WorkerGone(id))
    }

    /// Schedule the resident's destruction on its home worker and stop the
    /// worker if this was its last resident.
    ///
    /// The drop itself is deferred: it runs on the worker, behind tasks
    /// already queued there. When the worker drains, the calling thread
    /// blocks until its thread has finished (bounded by the configured
    /// drain timeout; on expiry the thread is abandoned and the
    /// bookkeeping cleaned up regardless).
    ///
    /// An id the pool does not track is a logged no-op. This stays safe
    /// during process shutdown: with no subscriber installed the log call
    /// quietly does nothing.
    pub fn evict(&self, id: ResidentId) {
        let mut state = self.state.lock().unwrap();
        if !state.homes.contains_key(&id) {
            error!(resident = %id, "evict: resident not managed - bailing out");
            return;
        }
        self.evict_locked(&mut state, id);
    }

    /// Eviction body, called with the pool mutex already held. `Drop` runs
    /// this in a loop under a single lock acquisition, which is what keeps
    /// the pool free of reentrant locking.
    fn evict_locked(&self, state: &mut PoolState, id: ResidentId) {
        let worker_id = match state.homes.remove(&id) {
            Some(worker_id) => worker_id,
            None => return,
        };

        let drained = {
            let entry = state
                .workers
                .get_mut(&worker_id)
                .expect("home points at a missing worker");
            assert!(entry.residents > 0, "resident count underflow on {worker_id}");
            if entry.worker.enqueue(Task::Evict(id)).is_err() {
                // The thread died earlier (a resident panicked on it); its
                // residents went down with it, so only bookkeeping is left.
                warn!(worker = %worker_id, resident = %id, "evict: worker queue disconnected");
            }
            entry.residents -= 1;
            entry.residents == 0
        };

        if drained {
            let entry = state
                .workers
                .remove(&worker_id)
                .expect("drained worker missing from registry");
            if entry.worker.stop(self.config.drain_timeout) {
                info!(worker = %worker_id, "evict: stopped drained worker");
            } else {
                error!(
                    worker = %worker_id,
                    timeout = ?self.config.drain_timeout,
                    "evict: worker did not finish within the drain timeout, abandoning its thread"
                );
            }
        }
    }

    /// Number of currently live workers.
    pub fn worker_count(&self) -> usize {
        self.state.lock().unwrap().workers.len()
    }

    /// Number of currently housed residents.
    pub fn resident_count(&self) -> usize {
        self.state.lock().unwrap().homes.len()
    }

    /// Home worker of a resident, if the pool tracks it.
    pub fn home_of(&self, id: ResidentId) -> Option<WorkerId> {
        self.state.lock().unwrap().homes.get(&id).copied()
    }

    /// The configured worker cap.
    pub fn max_workers(&self) -> usize {
        self.config.max_workers
    }
}

impl Drop for AffinityPool {
    fn drop(&mut self) {
        // A poisoned mutex means a panic escaped mid-operation with the
        // lock held; the maps may be torn, so skip the orderly teardown.
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => return,
        };

        let ids: Vec<ResidentId> = state.homes.keys().copied().collect();
        for id in ids {
            self.evict_locked(&mut state, id);
        }

        assert!(state.homes.is_empty(), "residents left after pool teardown");
        assert!(state.workers.is_empty(), "workers left after pool teardown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Unit(ResidentId);

    impl Resident for Unit {
        fn id(&self) -> ResidentId {
            self.0
        }
    }

    #[test]
    #[should_panic(expected = "max_workers > 0")]
    fn zero_capacity_pool_is_refused() {
        let _ = AffinityPool::with_max_workers(0);
    }

    #[test]
    fn empty_pool_has_no_workers() {
        let pool = AffinityPool::with_max_workers(3);
        assert_eq!(pool.worker_count(), 0);
        assert_eq!(pool.resident_count(), 0);
        assert_eq!(pool.max_workers(), 3);
    }

    #[test]
    fn evict_of_unknown_resident_is_a_no_op() {
        let pool = AffinityPool::with_max_workers(2);
        let id = pool.adopt(Box::new(Unit(ResidentId::new()))).unwrap();
        pool.evict(ResidentId::new());
        assert_eq!(pool.resident_count(), 1);
        assert_eq!(pool.worker_count(), 1);
        pool.evict(id);
        assert_eq!(pool.resident_count(), 0);
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn double_adopt_returns_the_resident() {
        let pool = AffinityPool::with_max_workers(2);
        let id = ResidentId::new();
        pool.adopt(Box::new(Unit(id))).unwrap();

        let err = pool.adopt(Box::new(Unit(id))).unwrap_err();
        match &err {
            AdoptError::AlreadyManaged { id: rejected, .. } => assert_eq!(*rejected, id),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.into_resident().id(), id);
        assert_eq!(pool.resident_count(), 1);
        assert_eq!(pool.worker_count(), 1);
    }
}
